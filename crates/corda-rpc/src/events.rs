// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reconnecting event stream over a single WebSocket.
//!
//! One connection task owns the socket. It parses every inbound frame as a
//! [`StreamEvent`] and fans matching events out to per-subscription queues,
//! each drained by its own delivery task, so a slow callback only delays its
//! own subscription. Frames that fail to parse are dropped and counted.
//!
//! When the socket closes or errors the task waits `reconnect_delay` and
//! reconnects, up to `max_reconnect_attempts` consecutive tries. A failed
//! try counts as another close. A successful reconnect resets the counter
//! and re-announces every live subscription to the server. Once the ceiling
//! is reached the task logs, counts and stops; callers observe this through
//! [`EventStreamManager::is_connected`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use corda_vault_query::StateRef;
use futures::{SinkExt, StreamExt};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{Result, RpcError};
use crate::types::TransactionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Reconnect policy and delivery buffering.
#[derive(Debug, Clone)]
pub struct EventStreamConfig {
    /// Wait before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts after which the stream gives up.
    pub max_reconnect_attempts: u32,
    /// Events buffered per subscription before new ones are dropped.
    pub delivery_buffer: usize,
}

impl Default for EventStreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            delivery_buffer: 256,
        }
    }
}

impl EventStreamConfig {
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_delivery_buffer(mut self, capacity: usize) -> Self {
        self.delivery_buffer = capacity.max(1);
        self
    }
}

/// Kinds of events pushed by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    VaultUpdate,
    FlowStarted,
    FlowProgress,
    FlowCompleted,
    FlowFailed,
    StateMachineUpdate,
    NetworkMapUpdate,
    TransactionRecorded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VaultUpdate => "VAULT_UPDATE",
            Self::FlowStarted => "FLOW_STARTED",
            Self::FlowProgress => "FLOW_PROGRESS",
            Self::FlowCompleted => "FLOW_COMPLETED",
            Self::FlowFailed => "FLOW_FAILED",
            Self::StateMachineUpdate => "STATE_MACHINE_UPDATE",
            Self::NetworkMapUpdate => "NETWORK_MAP_UPDATE",
            Self::TransactionRecorded => "TRANSACTION_RECORDED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound frame: `{type, timestamp, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(with = "event_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: Value,
}

/// Timestamps arrive either as RFC 3339 strings or epoch milliseconds.
mod event_timestamp {
    use chrono::{DateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms))),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(D::Error::custom),
        }
    }
}

/// A state produced or consumed by a vault update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultUpdateEntry {
    pub state: TransactionState,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub state_ref: Option<StateRef>,
}

/// Typed view of a `VAULT_UPDATE` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultUpdate {
    #[serde(default)]
    pub produced: Vec<VaultUpdateEntry>,
    #[serde(default)]
    pub consumed: Vec<VaultUpdateEntry>,
}

impl VaultUpdate {
    /// Decode the payload of a vault update event. `None` for other event
    /// types or payloads of the wrong shape.
    pub fn from_event(event: &StreamEvent) -> Option<Self> {
        if event.event_type != EventType::VaultUpdate {
            return None;
        }
        Self::deserialize(&event.data).ok()
    }

    /// Whether any produced or consumed state is governed by `contract`.
    pub fn involves_contract(&self, contract: &str) -> bool {
        self.produced
            .iter()
            .chain(&self.consumed)
            .any(|entry| entry.state.contract == contract)
    }
}

/// Contract check on the raw payload. Entries of unexpected shape are
/// skipped rather than failing the whole update.
fn payload_involves_contract(data: &Value, contract: &str) -> bool {
    ["produced", "consumed"].iter().any(|side| {
        data[side].as_array().is_some_and(|entries| {
            entries
                .iter()
                .any(|entry| entry["state"]["contract"].as_str() == Some(contract))
        })
    })
}

/// What a subscriber wants to receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionConfig {
    pub event_type: EventType,
    /// Only honoured for vault updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_state_type: Option<String>,
}

impl SubscriptionConfig {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            contract_state_type: None,
        }
    }

    pub fn with_contract_state_type(mut self, contract: impl Into<String>) -> Self {
        self.contract_state_type = Some(contract.into());
        self
    }

    /// Exact type match; vault updates must also involve the configured
    /// contract when one is set.
    pub fn matches(&self, event: &StreamEvent) -> bool {
        if event.event_type != self.event_type {
            return false;
        }
        match (&self.contract_state_type, event.event_type) {
            (Some(contract), EventType::VaultUpdate) => {
                payload_involves_contract(&event.data, contract)
            }
            _ => true,
        }
    }
}

/// Counters describing the stream's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventStreamStats {
    pub active_subscriptions: usize,
    /// Inbound frames that did not parse as events.
    pub dropped_frames: u64,
    /// Events discarded because a subscriber's queue was full.
    pub lagged_events: u64,
    /// Consecutive reconnect attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Times the stream gave up reconnecting.
    pub reconnects_exhausted: u64,
}

type Callback = Box<dyn FnMut(StreamEvent) + Send + 'static>;

/// Delivery task of one subscription. Subscriptions made outside a runtime
/// stay parked until `connect()` starts them.
enum Delivery {
    Running(JoinHandle<()>),
    Parked(Option<(mpsc::Receiver<StreamEvent>, Callback)>),
}

impl Delivery {
    fn spawn(mut events: mpsc::Receiver<StreamEvent>, mut callback: Callback) -> Self {
        Delivery::Running(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                callback(event);
            }
        }))
    }

    /// Start a parked delivery task. Requires a runtime.
    fn start(&mut self) {
        if let Delivery::Parked(parked) = self
            && let Some((events, callback)) = parked.take()
        {
            *self = Delivery::spawn(events, callback);
        }
    }

    fn stop(self) {
        if let Delivery::Running(task) = self {
            task.abort();
        }
    }
}

struct Subscriber {
    config: SubscriptionConfig,
    queue: mpsc::Sender<StreamEvent>,
    delivery: Delivery,
}

struct Shared {
    config: ClientConfig,
    stream_config: EventStreamConfig,
    subscriptions: Mutex<HashMap<String, Subscriber>>,
    connected: AtomicBool,
    dropped_frames: AtomicU64,
    lagged_events: AtomicU64,
    reconnect_attempts: AtomicU32,
    reconnects_exhausted: AtomicU64,
}

impl Shared {
    fn subscriptions(&self) -> MutexGuard<'_, HashMap<String, Subscriber>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Parse one text frame and queue it for every matching subscriber.
    fn dispatch(&self, text: &str) {
        let event: StreamEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, "Dropping malformed event frame");
                return;
            }
        };

        let subscriptions = self.subscriptions();
        for (id, sub) in subscriptions.iter() {
            if !sub.config.matches(&event) {
                continue;
            }
            if let Err(mpsc::error::TrySendError::Full(_)) = sub.queue.try_send(event.clone()) {
                self.lagged_events.fetch_add(1, Ordering::Relaxed);
                warn!(subscription_id = %id, "Subscriber queue full; event dropped");
            }
        }
    }

    /// Subscribe frames for every live subscription. Control frames queued
    /// before the snapshot are already reflected in it and are discarded;
    /// `subscribe` and `unsubscribe` queue theirs under the same lock.
    fn announcements(&self, outbound: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
        let subscriptions = self.subscriptions();
        while outbound.try_recv().is_ok() {}
        subscriptions
            .iter()
            .map(|(id, sub)| subscribe_frame(id, &sub.config))
            .collect()
    }
}

fn subscribe_frame(id: &str, config: &SubscriptionConfig) -> Message {
    Message::Text(
        json!({
            "action": "subscribe",
            "subscriptionId": id,
            "config": config,
        })
        .to_string(),
    )
}

fn unsubscribe_frame(id: &str) -> Message {
    Message::Text(
        json!({
            "action": "unsubscribe",
            "subscriptionId": id,
        })
        .to_string(),
    )
}

/// Subscription id: `{type}-{epoch millis}-{random salt}`.
fn subscription_id(event_type: EventType) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{}-{}-{}", event_type, Utc::now().timestamp_millis(), salt)
}

/// Open the socket, sending the credentials in the handshake.
async fn open_socket(config: &ClientConfig) -> Result<WsStream> {
    let url = config.ws_url();
    debug!(url = %url, "Opening event stream");

    let mut request = url.as_str().into_client_request()?;
    if let Some(auth) = config.credentials.authorization_header() {
        let value = HeaderValue::from_str(&auth)
            .map_err(|e| RpcError::InvalidInput(format!("invalid authorization header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    match tokio::time::timeout(config.connect_timeout, connect_async(request)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(RpcError::Connection(format!(
            "event stream handshake timed out after {}ms",
            config.connect_timeout.as_millis()
        ))),
    }
}

/// Owns the socket for the lifetime of one `connect()`.
async fn connection_task(
    shared: Arc<Shared>,
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    token: CancellationToken,
) {
    let mut socket = Some(stream);

    loop {
        if let Some(mut ws) = socket.take() {
            for frame in shared.announcements(&mut outbound) {
                if let Err(e) = ws.send(frame).await {
                    warn!(error = %e, "Failed to announce subscription");
                }
            }

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        while let Ok(frame) = outbound.try_recv() {
                            let _ = ws.send(frame).await;
                        }
                        let _ = ws.close(None).await;
                        shared.connected.store(false, Ordering::SeqCst);
                        debug!("Event stream closed by caller");
                        return;
                    }

                    Some(frame) = outbound.recv() => {
                        if let Err(e) = ws.send(frame).await {
                            warn!(error = %e, "Failed to send control frame");
                            break;
                        }
                    }

                    inbound = ws.next() => match inbound {
                        Some(Ok(Message::Text(text))) => shared.dispatch(&text),
                        Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(text) => shared.dispatch(text),
                            Err(_) => {
                                shared.dropped_frames.fetch_add(1, Ordering::Relaxed);
                            }
                        },
                        Some(Ok(Message::Close(reason))) => {
                            info!(reason = ?reason, "Event stream closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "Event stream error");
                            break;
                        }
                        None => {
                            info!("Event stream ended");
                            break;
                        }
                    },
                }
            }

            shared.connected.store(false, Ordering::SeqCst);
        }

        let max = shared.stream_config.max_reconnect_attempts;
        let attempt = shared.reconnect_attempts.load(Ordering::SeqCst);
        if attempt >= max {
            shared.reconnects_exhausted.fetch_add(1, Ordering::Relaxed);
            warn!(attempts = attempt, "Giving up on event stream reconnection");
            return;
        }
        shared.reconnect_attempts.store(attempt + 1, Ordering::SeqCst);

        let delay = shared.stream_config.reconnect_delay;
        info!(
            attempt = attempt + 1,
            max,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting event stream"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        let reconnected = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            result = open_socket(&shared.config) => result,
        };

        match reconnected {
            Ok(ws) => {
                shared.reconnect_attempts.store(0, Ordering::SeqCst);
                shared.connected.store(true, Ordering::SeqCst);
                info!("Event stream reconnected");
                socket = Some(ws);
            }
            Err(e) => {
                warn!(attempt = attempt + 1, error = %e, "Reconnect attempt failed");
            }
        }
    }
}

struct Connection {
    outbound: mpsc::UnboundedSender<Message>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// Multiplexes one WebSocket into filtered, independently delivered
/// subscriptions.
pub struct EventStreamManager {
    shared: Arc<Shared>,
    connection: Mutex<Option<Connection>>,
}

impl EventStreamManager {
    pub fn new(config: ClientConfig, stream_config: EventStreamConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                stream_config,
                subscriptions: Mutex::new(HashMap::new()),
                connected: AtomicBool::new(false),
                dropped_frames: AtomicU64::new(0),
                lagged_events: AtomicU64::new(0),
                reconnect_attempts: AtomicU32::new(0),
                reconnects_exhausted: AtomicU64::new(0),
            }),
            connection: Mutex::new(None),
        }
    }

    fn connection(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the socket. Resolves once the handshake completes; handshake
    /// failures are returned. Does nothing while a live connection exists.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let stream = open_socket(&self.shared.config).await?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();

        self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
        self.shared.connected.store(true, Ordering::SeqCst);

        let previous = {
            let mut subscriptions = self.shared.subscriptions();
            for sub in subscriptions.values_mut() {
                sub.delivery.start();
            }

            let task = tokio::spawn(connection_task(
                Arc::clone(&self.shared),
                stream,
                outbound_rx,
                token.clone(),
            ));
            self.connection().replace(Connection {
                outbound,
                token,
                task,
            })
        };
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        info!(url = %self.shared.config.ws_url(), "Event stream connected");
        Ok(())
    }

    /// True while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Queue a control frame for the live connection. Callers hold the
    /// subscription lock so the frame orders correctly against announcements.
    fn send_control(&self, frame: Message) {
        if let Some(connection) = self.connection().as_ref() {
            let _ = connection.outbound.send(frame);
        }
    }

    /// Register `callback` for events matching `config` and return the new
    /// subscription id. Returns without waiting for the server.
    ///
    /// Outside a tokio runtime the delivery task is started by the next
    /// `connect()`.
    pub fn subscribe<F>(&self, config: SubscriptionConfig, callback: F) -> String
    where
        F: FnMut(StreamEvent) + Send + 'static,
    {
        let id = subscription_id(config.event_type);
        let (queue, events) = mpsc::channel(self.shared.stream_config.delivery_buffer);

        let callback: Callback = Box::new(callback);
        let delivery = match Handle::try_current() {
            Ok(_) => Delivery::spawn(events, callback),
            Err(_) => Delivery::Parked(Some((events, callback))),
        };

        let frame = subscribe_frame(&id, &config);
        let mut subscriptions = self.shared.subscriptions();
        subscriptions.insert(
            id.clone(),
            Subscriber {
                config,
                queue,
                delivery,
            },
        );
        self.send_control(frame);
        drop(subscriptions);

        debug!(subscription_id = %id, "Subscribed");
        id
    }

    /// Remove a subscription. Unknown ids are ignored; returns whether one
    /// was removed.
    pub fn unsubscribe(&self, id: &str) -> bool {
        let mut subscriptions = self.shared.subscriptions();
        let Some(sub) = subscriptions.remove(id) else {
            return false;
        };
        self.send_control(unsubscribe_frame(id));
        drop(subscriptions);

        sub.delivery.stop();
        debug!(subscription_id = %id, "Unsubscribed");
        true
    }

    /// Remove every subscription.
    pub fn unsubscribe_all(&self) {
        let mut subscriptions = self.shared.subscriptions();
        let removed: Vec<(String, Subscriber)> = subscriptions.drain().collect();
        for (id, _) in &removed {
            self.send_control(unsubscribe_frame(id));
        }
        drop(subscriptions);

        for (_, sub) in removed {
            sub.delivery.stop();
        }
    }

    /// Drop all subscriptions and close the socket. A later `connect()`
    /// starts over.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        self.unsubscribe_all();

        let connection = self.connection().take();
        if let Some(connection) = connection {
            connection.token.cancel();
            let _ = connection.task.await;
        }

        self.shared.connected.store(false, Ordering::SeqCst);
        info!("Event stream disconnected");
    }

    pub fn stats(&self) -> EventStreamStats {
        EventStreamStats {
            active_subscriptions: self.shared.subscriptions().len(),
            dropped_frames: self.shared.dropped_frames.load(Ordering::Relaxed),
            lagged_events: self.shared.lagged_events.load(Ordering::Relaxed),
            reconnect_attempts: self.shared.reconnect_attempts.load(Ordering::SeqCst),
            reconnects_exhausted: self.shared.reconnects_exhausted.load(Ordering::Relaxed),
        }
    }
}

impl Drop for EventStreamManager {
    fn drop(&mut self) {
        if let Some(connection) = self.connection().take() {
            connection.token.cancel();
        }
        let removed: Vec<Subscriber> = self
            .shared
            .subscriptions()
            .drain()
            .map(|(_, sub)| sub)
            .collect();
        for sub in removed {
            sub.delivery.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault_event(contracts: &[&str]) -> StreamEvent {
        let produced: Vec<Value> = contracts
            .iter()
            .map(|c| json!({"state": {"data": {}, "contract": c}}))
            .collect();
        StreamEvent {
            event_type: EventType::VaultUpdate,
            timestamp: Utc::now(),
            data: json!({"produced": produced, "consumed": []}),
        }
    }

    #[test]
    fn test_event_parses_rfc3339_and_millis() {
        let a: StreamEvent = serde_json::from_str(
            r#"{"type":"FLOW_STARTED","timestamp":"2024-05-01T10:00:00Z","data":{"flowId":"f1"}}"#,
        )
        .unwrap();
        let b: StreamEvent =
            serde_json::from_str(r#"{"type":"FLOW_STARTED","timestamp":1714557600000}"#).unwrap();

        assert_eq!(a.event_type, EventType::FlowStarted);
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(b.data, Value::Null);
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let parsed = serde_json::from_str::<StreamEvent>(
            r#"{"type":"SOMETHING_ELSE","timestamp":0,"data":{}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_contract_filter() {
        let config =
            SubscriptionConfig::new(EventType::VaultUpdate).with_contract_state_type("X");

        assert!(config.matches(&vault_event(&["Y", "X"])));
        assert!(!config.matches(&vault_event(&["Y", "Y"])));
        assert!(!config.matches(&vault_event(&[])));
    }

    #[test]
    fn test_contract_filter_skips_entries_without_contract() {
        let config =
            SubscriptionConfig::new(EventType::VaultUpdate).with_contract_state_type("X");
        let event = StreamEvent {
            event_type: EventType::VaultUpdate,
            timestamp: Utc::now(),
            data: json!({
                "produced": [{"state": {"data": {}}}],
                "consumed": [{"state": {"data": {}, "contract": "X"}}],
            }),
        };

        assert!(VaultUpdate::from_event(&event).is_none());
        assert!(config.matches(&event));
    }

    #[test]
    fn test_announcements_discard_already_queued_frames() {
        let shared = Shared {
            config: ClientConfig::new(crate::config::CordaCredentials::rpc(
                "localhost", 10050, "user", "pass",
            )),
            stream_config: EventStreamConfig::default(),
            subscriptions: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            dropped_frames: AtomicU64::new(0),
            lagged_events: AtomicU64::new(0),
            reconnect_attempts: AtomicU32::new(0),
            reconnects_exhausted: AtomicU64::new(0),
        };
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel();

        let config = SubscriptionConfig::new(EventType::FlowStarted);
        let (queue, _events) = mpsc::channel(1);
        shared.subscriptions().insert(
            "sub-1".to_string(),
            Subscriber {
                config: config.clone(),
                queue,
                delivery: Delivery::Parked(None),
            },
        );
        outbound.send(subscribe_frame("sub-1", &config)).unwrap();

        let frames = shared.announcements(&mut outbound_rx);
        assert_eq!(frames, vec![subscribe_frame("sub-1", &config)]);
        assert!(outbound_rx.try_recv().is_err());
    }

    #[test]
    fn test_filter_requires_exact_type() {
        let config = SubscriptionConfig::new(EventType::FlowCompleted);
        let mut event = vault_event(&["X"]);
        assert!(!config.matches(&event));

        event.event_type = EventType::FlowCompleted;
        assert!(config.matches(&event));
    }

    #[test]
    fn test_contract_filter_ignored_for_other_types() {
        let config =
            SubscriptionConfig::new(EventType::FlowFailed).with_contract_state_type("X");
        let event = StreamEvent {
            event_type: EventType::FlowFailed,
            timestamp: Utc::now(),
            data: json!({"flowId": "f1"}),
        };
        assert!(config.matches(&event));
    }

    #[test]
    fn test_subscription_id_shape() {
        let id = subscription_id(EventType::VaultUpdate);
        let parts: Vec<&str> = id.rsplitn(3, '-').collect();
        assert_eq!(parts[2], "VAULT_UPDATE");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[0].len(), 9);
        assert_ne!(id, subscription_id(EventType::VaultUpdate));
    }

    #[test]
    fn test_subscribe_frame_shape() {
        let config = SubscriptionConfig::new(EventType::VaultUpdate).with_contract_state_type("X");
        let Message::Text(text) = subscribe_frame("sub-1", &config) else {
            panic!("expected text frame");
        };
        let frame: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            frame,
            json!({
                "action": "subscribe",
                "subscriptionId": "sub-1",
                "config": {"eventType": "VAULT_UPDATE", "contractStateType": "X"},
            })
        );
    }
}
