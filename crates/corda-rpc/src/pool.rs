// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded pool of transport clients.
//!
//! Each slot moves through `created (probed) -> idle -> in use -> idle -> ...
//! -> evicted`. A connection whose first status probe fails is closed and
//! never enters the pool. Slot bookkeeping sits behind a mutex that is never
//! held across an `.await`; connection creation reserves its slot under the
//! lock first, so concurrent growth never exceeds `max_size`.
//!
//! A background task started by [`ConnectionPool::initialize`] evicts idle
//! connections every `idle_timeout / 2`, never shrinking the pool below
//! `min_size`. It is cancelled by [`ConnectionPool::shutdown`].

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::CordaRpcClient;
use crate::config::ClientConfig;
use crate::error::{Result, RpcError};

/// Pool sizing and timing.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections created by `initialize` and kept through eviction.
    pub min_size: usize,
    /// Upper bound on tracked connections.
    pub max_size: usize,
    /// How long `acquire` waits before giving up.
    pub acquire_timeout: Duration,
    /// Idle age after which a connection may be evicted.
    pub idle_timeout: Duration,
    /// Sleep between acquire attempts when the pool is saturated.
    pub acquire_retry_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(5 * 60),
            acquire_retry_interval: Duration::from_millis(100),
        }
    }
}

impl PoolConfig {
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_acquire_retry_interval(mut self, interval: Duration) -> Self {
        self.acquire_retry_interval = interval;
        self
    }

    /// Reject sizes and timings the pool cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(RpcError::Config("max_size must be at least 1".to_string()));
        }
        if self.min_size > self.max_size {
            return Err(RpcError::Config(format!(
                "min_size ({}) exceeds max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.idle_timeout.is_zero() {
            return Err(RpcError::Config("idle_timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// A connection the pool can probe and close.
#[async_trait]
pub trait PoolableConnection: Send + Sync + 'static {
    /// Probe the remote end. `false` keeps a fresh connection out of the pool.
    async fn test_connection(&self) -> bool;

    /// Release the connection's resources.
    async fn close(&self);
}

/// Creates connections on demand.
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    type Connection: PoolableConnection;

    async fn create(&self) -> Result<Self::Connection>;
}

#[async_trait]
impl PoolableConnection for CordaRpcClient {
    async fn test_connection(&self) -> bool {
        CordaRpcClient::test_connection(self).await
    }

    async fn close(&self) {
        CordaRpcClient::close(self)
    }
}

/// Factory producing [`CordaRpcClient`]s that share one configuration.
#[derive(Debug, Clone)]
pub struct RpcClientFactory {
    config: ClientConfig,
}

impl RpcClientFactory {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConnectionFactory for RpcClientFactory {
    type Connection = CordaRpcClient;

    async fn create(&self) -> Result<CordaRpcClient> {
        CordaRpcClient::new(self.config.clone())
    }
}

/// Pool of transport clients.
pub type RpcConnectionPool = ConnectionPool<RpcClientFactory>;

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub max_size: usize,
    /// Connections that passed their probe and joined the pool.
    pub created: u64,
    /// Connections closed by idle eviction.
    pub evicted: u64,
    /// Factory errors and failed first probes.
    pub failed_creations: u64,
    /// `release` calls for connections the pool does not track.
    pub untracked_releases: u64,
}

struct Slot<C> {
    conn: Arc<C>,
    in_use: bool,
    last_used_at: Instant,
}

struct PoolState<C> {
    slots: Vec<Slot<C>>,
    /// Slots reserved by creations still in flight.
    pending: usize,
    closed: bool,
    created: u64,
    evicted: u64,
    failed_creations: u64,
    untracked_releases: u64,
}

impl<C> PoolState<C> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            pending: 0,
            closed: false,
            created: 0,
            evicted: 0,
            failed_creations: 0,
            untracked_releases: 0,
        }
    }
}

struct PoolInner<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<F::Connection>>,
}

/// Slot reserved for a connection being created. Dropping it without
/// filling it returns the reservation, so a cancelled `acquire` does not
/// leak capacity.
struct Reservation<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
    count: usize,
}

impl<F: ConnectionFactory> Reservation<'_, F> {
    /// Add freshly created connections in one critical section. Returns the
    /// connections back when the pool was shut down in the meantime.
    fn fill(
        mut self,
        conns: Vec<Arc<F::Connection>>,
        in_use: bool,
    ) -> std::result::Result<(), Vec<Arc<F::Connection>>> {
        let mut state = self.inner.lock();
        state.pending -= self.count;
        self.count = 0;

        if state.closed {
            return Err(conns);
        }

        let now = Instant::now();
        state.created += conns.len() as u64;
        state.slots.extend(conns.into_iter().map(|conn| Slot {
            conn,
            in_use,
            last_used_at: now,
        }));
        Ok(())
    }
}

impl<F: ConnectionFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.count > 0 {
            self.inner.lock().pending -= self.count;
        }
    }
}

impl<F: ConnectionFactory> PoolInner<F> {
    fn lock(&self) -> MutexGuard<'_, PoolState<F::Connection>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create one connection and run its first probe.
    async fn create_connection(&self) -> Option<Arc<F::Connection>> {
        let conn = match self.factory.create().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Failed to create pooled connection");
                self.lock().failed_creations += 1;
                return None;
            }
        };

        if !conn.test_connection().await {
            warn!("Pooled connection failed its first probe; discarding");
            conn.close().await;
            self.lock().failed_creations += 1;
            return None;
        }

        Some(Arc::new(conn))
    }

    fn release(&self, conn: &Arc<F::Connection>) {
        let mut state = self.lock();
        match state.slots.iter_mut().find(|s| Arc::ptr_eq(&s.conn, conn)) {
            Some(slot) => {
                slot.in_use = false;
                slot.last_used_at = Instant::now();
            }
            None => {
                state.untracked_releases += 1;
                warn!("Released a connection the pool does not track");
            }
        }
    }

    /// Remove idle connections older than `idle_timeout`, keeping at least
    /// `min_size` tracked. Closing happens outside the lock.
    async fn evict_idle(&self) -> usize {
        let expired: Vec<Arc<F::Connection>> = {
            let mut state = self.lock();
            let mut removable = state.slots.len().saturating_sub(self.config.min_size);
            if removable == 0 {
                return 0;
            }

            let now = Instant::now();
            let mut expired = Vec::new();
            state.slots.retain(|slot| {
                let stale = !slot.in_use
                    && now.duration_since(slot.last_used_at) > self.config.idle_timeout;
                if stale && removable > 0 {
                    removable -= 1;
                    expired.push(Arc::clone(&slot.conn));
                    false
                } else {
                    true
                }
            });
            state.evicted += expired.len() as u64;
            expired
        };

        let count = expired.len();
        join_all(expired.iter().map(|conn| conn.close())).await;
        if count > 0 {
            debug!(evicted = count, "Evicted idle connections");
        }
        count
    }
}

/// Bounded pool handing out shared connections.
pub struct ConnectionPool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
    shutdown: CancellationToken,
    eviction_task: Mutex<Option<JoinHandle<()>>>,
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Create an empty pool. Call [`initialize`](Self::initialize) to warm
    /// it up and start eviction.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                state: Mutex::new(PoolState::new()),
            }),
            shutdown: CancellationToken::new(),
            eviction_task: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Create up to `min_size` connections concurrently and start the
    /// eviction task. Connections failing their probe are skipped.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let reservation = {
            let mut state = self.inner.lock();
            if state.closed {
                return Err(RpcError::PoolClosed);
            }
            let tracked = state.slots.len() + state.pending;
            let count = self
                .inner
                .config
                .min_size
                .saturating_sub(tracked)
                .min(self.inner.config.max_size.saturating_sub(tracked));
            state.pending += count;
            Reservation {
                inner: &*self.inner,
                count,
            }
        };

        let requested = reservation.count;
        let created: Vec<_> = join_all((0..requested).map(|_| self.inner.create_connection()))
            .await
            .into_iter()
            .flatten()
            .collect();
        let ready = created.len();

        if let Err(conns) = reservation.fill(created, false) {
            join_all(conns.iter().map(|conn| conn.close())).await;
            return Err(RpcError::PoolClosed);
        }

        self.start_eviction();

        info!(
            requested,
            ready,
            max_size = self.inner.config.max_size,
            "Connection pool initialized"
        );
        Ok(())
    }

    fn start_eviction(&self) {
        let mut task = self
            .eviction_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let token = self.shutdown.clone();
        let period = inner.config.idle_timeout / 2;

        *task = Some(tokio::spawn(async move {
            debug!(period_ms = period.as_millis() as u64, "Eviction task started");
            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        break;
                    }

                    _ = tokio::time::sleep(period) => {
                        inner.evict_idle().await;
                    }
                }
            }
            debug!("Eviction task stopped");
        }));
    }

    /// Get a connection for exclusive use.
    ///
    /// Returns an idle connection when one exists, otherwise grows the pool
    /// while below `max_size`, otherwise retries until `acquire_timeout`.
    pub async fn acquire(&self) -> Result<Arc<F::Connection>> {
        let config = &self.inner.config;
        let deadline = Instant::now() + config.acquire_timeout;

        loop {
            let reservation = {
                let mut state = self.inner.lock();
                if state.closed {
                    return Err(RpcError::PoolClosed);
                }

                if let Some(slot) = state.slots.iter_mut().find(|s| !s.in_use) {
                    slot.in_use = true;
                    slot.last_used_at = Instant::now();
                    return Ok(Arc::clone(&slot.conn));
                }

                if state.slots.len() + state.pending < config.max_size {
                    state.pending += 1;
                    Some(Reservation {
                        inner: &*self.inner,
                        count: 1,
                    })
                } else {
                    None
                }
            };

            if let Some(reservation) = reservation {
                let created =
                    tokio::time::timeout_at(deadline, self.inner.create_connection()).await;
                let Ok(created) = created else {
                    drop(reservation);
                    warn!(
                        timeout_ms = config.acquire_timeout.as_millis() as u64,
                        "Timed out creating a pooled connection"
                    );
                    return Err(RpcError::PoolTimeout(
                        config.acquire_timeout.as_millis() as u64,
                    ));
                };
                if let Some(conn) = created {
                    match reservation.fill(vec![Arc::clone(&conn)], true) {
                        Ok(()) => {
                            debug!("Pool grew by one connection");
                            return Ok(conn);
                        }
                        Err(_) => {
                            conn.close().await;
                            return Err(RpcError::PoolClosed);
                        }
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    timeout_ms = config.acquire_timeout.as_millis() as u64,
                    "Timed out waiting for a pooled connection"
                );
                return Err(RpcError::PoolTimeout(
                    config.acquire_timeout.as_millis() as u64,
                ));
            }
            tokio::time::sleep(config.acquire_retry_interval.min(deadline - now)).await;
        }
    }

    /// Return a connection to the pool. Unknown connections are ignored and
    /// counted in [`PoolStats::untracked_releases`].
    pub fn release(&self, conn: &Arc<F::Connection>) {
        self.inner.release(conn);
    }

    /// Run `op` with a pooled connection, releasing it on every exit path.
    pub async fn with_connection<T, Op, Fut>(&self, op: Op) -> Result<T>
    where
        Op: FnOnce(Arc<F::Connection>) -> Fut,
        Fut: Future<Output = T>,
    {
        let conn = self.acquire().await?;
        let lease = Lease {
            inner: &*self.inner,
            conn: Arc::clone(&conn),
        };
        let output = op(conn).await;
        drop(lease);
        Ok(output)
    }

    /// Run one eviction pass now. Returns the number of evicted connections.
    pub async fn evict_idle(&self) -> usize {
        self.inner.evict_idle().await
    }

    /// Stop eviction, close every connection and refuse further acquires.
    /// Safe to call more than once.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let task = self
            .eviction_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }

        let conns: Vec<Arc<F::Connection>> = {
            let mut state = self.inner.lock();
            state.closed = true;
            state.slots.drain(..).map(|slot| slot.conn).collect()
        };

        if conns.is_empty() {
            return;
        }

        let count = conns.len();
        join_all(conns.iter().map(|conn| conn.close())).await;
        info!(closed = count, "Connection pool shut down");
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let active = state.slots.iter().filter(|s| s.in_use).count();
        PoolStats {
            total: state.slots.len(),
            active,
            idle: state.slots.len() - active,
            max_size: self.inner.config.max_size,
            created: state.created,
            evicted: state.evicted,
            failed_creations: state.failed_creations,
            untracked_releases: state.untracked_releases,
        }
    }
}

impl<F: ConnectionFactory> Drop for ConnectionPool<F> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Releases its connection when dropped, including on panic or when the
/// enclosing future is cancelled.
struct Lease<'a, F: ConnectionFactory> {
    inner: &'a PoolInner<F>,
    conn: Arc<F::Connection>,
}

impl<F: ConnectionFactory> Drop for Lease<'_, F> {
    fn drop(&mut self) {
        self.inner.release(&self.conn);
    }
}
