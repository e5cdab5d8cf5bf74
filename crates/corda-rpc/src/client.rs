// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stateless request/response client for the Corda RPC proxy.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use corda_vault_query::{QuerySpec, compile_query};
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{Result, RpcFailure, RpcResult};
use crate::types::{
    AttachmentUpload, FlowHandle, NetworkParameters, NodeInfo, Party, RpcEnvelope, RpcRequest,
    StateMachineInfo, VaultPage,
};

/// Longest slice of an error body copied into a failure message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client for the proxy's RPC, status and attachment endpoints.
///
/// Every call is an independent HTTP request carrying the configured
/// credentials; no session state is kept between calls. Network and remote
/// failures come back as [`RpcFailure`] values and never as panics or
/// [`crate::RpcError`]s, so callers processing many items can branch on the
/// result and continue.
pub struct CordaRpcClient {
    http: reqwest::Client,
    config: ClientConfig,
    connected: AtomicBool,
}

impl CordaRpcClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            connected: AtomicBool::new(false),
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the last status probe succeeded and the client is not closed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Mark the client disconnected. Requests are independent, so there is
    /// no socket to tear down.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        debug!("RPC client closed");
    }

    /// Probe the proxy's status endpoint. Never fails; returns and records
    /// whether the proxy answered with a success status.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> bool {
        let ok = match self
            .authorize(self.http.get(self.config.status_url()))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Status probe rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Status probe failed");
                false
            }
        };

        self.connected.store(ok, Ordering::SeqCst);
        debug!(connected = ok, "Status probe finished");
        ok
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.credentials.authorization_header() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Turn a non-success response into a failure, preferring the proxy's
    /// own error message when the body is an envelope.
    async fn status_failure(response: Response) -> RpcFailure {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<RpcEnvelope>(&body) {
            Ok(RpcEnvelope {
                error: Some(error), ..
            }) => error,
            _ => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        };

        RpcFailure::http_status(status, &message)
    }

    async fn read_envelope(response: Response) -> RpcResult<Value> {
        if !response.status().is_success() {
            return Err(Self::status_failure(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcFailure::from_transport(&e))?;

        let envelope: RpcEnvelope = serde_json::from_slice(&bytes)
            .map_err(|e| RpcFailure::decode(format!("invalid response envelope: {}", e)))?;

        envelope.into_result()
    }

    /// Call an operation and decode its payload.
    async fn call<T: DeserializeOwned>(&self, operation: &str, arguments: Vec<Value>) -> RpcResult<T> {
        let data = self.execute_rpc(operation, arguments).await?;
        serde_json::from_value(data)
            .map_err(|e| RpcFailure::decode(format!("invalid {} payload: {}", operation, e)))
    }

    // =========================================================================
    // Generic RPC
    // =========================================================================

    /// Invoke `operation` on the proxy with positional `arguments`.
    ///
    /// Sends `{operation, arguments}` to the RPC endpoint and decodes the
    /// `{success, data, error, errorCode}` envelope. Transport failures are
    /// classified as `TIMEOUT`, `CONNECTION_ERROR`, `HTTP_<status>` or
    /// `DECODE_ERROR`.
    #[instrument(skip(self, arguments), fields(operation = %operation))]
    pub async fn execute_rpc(&self, operation: &str, arguments: Vec<Value>) -> RpcResult<Value> {
        debug!(args = arguments.len(), "Executing RPC");

        let body = RpcRequest {
            operation: operation.to_string(),
            arguments,
        };

        let response = match self
            .authorize(self.http.post(self.config.rpc_url()))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let failure = RpcFailure::from_transport(&e);
                warn!(code = %failure.code, error = %e, "RPC transport failure");
                return Err(failure);
            }
        };

        let result = Self::read_envelope(response).await;
        if let Err(failure) = &result {
            warn!(code = %failure.code, message = %failure.message, "RPC call failed");
        }
        result
    }

    // =========================================================================
    // Node & Network
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn node_info(&self) -> RpcResult<NodeInfo> {
        self.call("nodeInfo", vec![]).await
    }

    #[instrument(skip(self))]
    pub async fn network_map_snapshot(&self) -> RpcResult<Vec<NodeInfo>> {
        self.call("networkMapSnapshot", vec![]).await
    }

    #[instrument(skip(self))]
    pub async fn notary_identities(&self) -> RpcResult<Vec<Party>> {
        self.call("notaryIdentities", vec![]).await
    }

    #[instrument(skip(self))]
    pub async fn current_node_time(&self) -> RpcResult<DateTime<Utc>> {
        self.call("currentNodeTime", vec![]).await
    }

    #[instrument(skip(self))]
    pub async fn network_parameters(&self) -> RpcResult<NetworkParameters> {
        self.call("networkParameters", vec![]).await
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Resolve a well-known party. `Ok(None)` when the name is unknown.
    #[instrument(skip(self))]
    pub async fn well_known_party_from_x500_name(&self, name: &str) -> RpcResult<Option<Party>> {
        self.call("wellKnownPartyFromX500Name", vec![json!(name)])
            .await
    }

    #[instrument(skip(self))]
    pub async fn parties_from_name(&self, query: &str, exact_match: bool) -> RpcResult<Vec<Party>> {
        self.call("partiesFromName", vec![json!(query), json!(exact_match)])
            .await
    }

    // =========================================================================
    // Flows
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn registered_flows(&self) -> RpcResult<Vec<String>> {
        self.call("registeredFlows", vec![]).await
    }

    /// Start a flow by fully-qualified class name.
    #[instrument(skip(self, args), fields(flow_class = %flow_class))]
    pub async fn start_flow(&self, flow_class: &str, args: Vec<Value>) -> RpcResult<FlowHandle> {
        let handle: FlowHandle = self
            .call("startFlowDynamic", vec![json!(flow_class), Value::Array(args)])
            .await?;
        info!(flow_id = %handle.flow_id, "Flow started");
        Ok(handle)
    }

    /// Kill a running flow. `Ok(false)` when the flow was not found.
    #[instrument(skip(self))]
    pub async fn kill_flow(&self, flow_id: &str) -> RpcResult<bool> {
        self.call("killFlow", vec![json!(flow_id)]).await
    }

    #[instrument(skip(self))]
    pub async fn state_machines_snapshot(&self) -> RpcResult<Vec<StateMachineInfo>> {
        self.call("stateMachinesSnapshot", vec![]).await
    }

    // =========================================================================
    // Vault
    // =========================================================================

    /// Run a vault query built with [`corda_vault_query::VaultQueryBuilder`].
    #[instrument(skip(self, spec))]
    pub async fn vault_query(&self, spec: &QuerySpec) -> RpcResult<VaultPage> {
        let arguments = compile_query(spec).into_arguments().map_err(|e| {
            RpcFailure::new(
                format!("failed to encode query: {}", e),
                RpcFailure::REQUEST_ERROR,
            )
        })?;
        self.call("vaultQuery", arguments).await
    }

    // =========================================================================
    // Attachments
    // =========================================================================

    #[instrument(skip(self))]
    pub async fn attachment_exists(&self, attachment_id: &str) -> RpcResult<bool> {
        self.call("attachmentExists", vec![json!(attachment_id)])
            .await
    }

    /// Upload an attachment as multipart form data.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload_attachment(
        &self,
        data: Vec<u8>,
        filename: &str,
        uploader: Option<&str>,
    ) -> RpcResult<AttachmentUpload> {
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| RpcFailure::new(e.to_string(), RpcFailure::REQUEST_ERROR))?;

        let mut form = Form::new()
            .part("file", part)
            .text("filename", filename.to_string());
        if let Some(uploader) = uploader {
            form = form.text("uploader", uploader.to_string());
        }

        let response = self
            .authorize(self.http.post(self.config.attachments_url()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| RpcFailure::from_transport(&e))?;

        let data = Self::read_envelope(response).await?;
        let upload: AttachmentUpload = serde_json::from_value(data)
            .map_err(|e| RpcFailure::decode(format!("invalid upload payload: {}", e)))?;

        info!(attachment_id = %upload.attachment_id, "Attachment uploaded");
        Ok(upload)
    }

    /// Download an attachment's raw bytes. Ids must be hex attachment hashes.
    #[instrument(skip(self))]
    pub async fn download_attachment(&self, attachment_id: &str) -> RpcResult<Vec<u8>> {
        if attachment_id.is_empty() || !attachment_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RpcFailure::new(
                format!("invalid attachment id: {:?}", attachment_id),
                RpcFailure::REQUEST_ERROR,
            ));
        }
        let url = format!("{}/{}", self.config.attachments_url(), attachment_id);

        let response = self
            .authorize(self.http.get(url))
            .send()
            .await
            .map_err(|e| RpcFailure::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(Self::status_failure(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcFailure::from_transport(&e))?;

        debug!(size = bytes.len(), "Attachment downloaded");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CordaCredentials;

    #[test]
    fn test_new_client_starts_disconnected() {
        let client =
            CordaRpcClient::new(ClientConfig::new(CordaCredentials::rpc("localhost", 1, "u", "p")))
                .unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.config().rpc_url(), "http://localhost:1/api/rpc");
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_a_failure_value() {
        // Port 1 is reserved and refuses connections.
        let client =
            CordaRpcClient::new(ClientConfig::new(CordaCredentials::rpc("127.0.0.1", 1, "u", "p")))
                .unwrap();

        let failure = client.execute_rpc("nodeInfo", vec![]).await.unwrap_err();
        assert_eq!(failure.code, RpcFailure::CONNECTION_ERROR);
        assert!(!client.test_connection().await);
        assert!(!client.is_connected());
    }
}
