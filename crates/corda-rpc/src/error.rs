// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for corda-rpc.
//!
//! Two families live here. [`RpcError`] covers misuse and local failures
//! (bad configuration, pool exhaustion, socket handshakes) and is returned
//! as `Err` at the point of the problem. [`RpcFailure`] is the operational
//! failure of a single remote call; the transport client hands it back as a
//! value so batch callers can carry on past individual failures.

use std::fmt;

use corda_vault_query::QueryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;

/// Outcome of one remote call: typed payload or structured failure.
pub type RpcResult<T> = std::result::Result<T, RpcFailure>;

/// Errors raised by configuration, the pool and the event stream manager.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input rejected before any I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Query criteria failed validation.
    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    /// No pooled connection became available in time.
    #[error("timed out after {0}ms waiting for a pooled connection")]
    PoolTimeout(u64),

    /// The pool has been shut down.
    #[error("connection pool is shut down")]
    PoolClosed,

    /// Connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// WebSocket handshake or framing error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        RpcError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Connection(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RpcError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RpcError::WebSocket(err.to_string())
    }
}

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcFailure {
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code, either one of the transport codes below or
    /// whatever the proxy reported.
    pub code: String,
}

impl RpcFailure {
    /// The request exceeded the configured timeout.
    pub const TIMEOUT: &'static str = "TIMEOUT";
    /// The proxy could not be reached.
    pub const CONNECTION_ERROR: &'static str = "CONNECTION_ERROR";
    /// The response body could not be decoded.
    pub const DECODE_ERROR: &'static str = "DECODE_ERROR";
    /// The proxy reported failure without a code.
    pub const REMOTE_ERROR: &'static str = "REMOTE_ERROR";
    /// The request could not be built locally.
    pub const REQUEST_ERROR: &'static str = "REQUEST_ERROR";

    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Failure for a non-success HTTP status (`HTTP_<status>`).
    pub fn http_status(status: u16, body: &str) -> Self {
        let message = if body.is_empty() {
            format!("proxy responded with HTTP {}", status)
        } else {
            format!("proxy responded with HTTP {}: {}", status, body)
        };
        Self::new(message, format!("HTTP_{}", status))
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(message, Self::DECODE_ERROR)
    }

    /// Classify a transport-level error from the HTTP client.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            Self::TIMEOUT
        } else if err.is_connect() {
            Self::CONNECTION_ERROR
        } else if err.is_decode() {
            Self::DECODE_ERROR
        } else if err.is_builder() {
            Self::REQUEST_ERROR
        } else if let Some(status) = err.status() {
            return Self::http_status(status.as_u16(), "");
        } else {
            Self::CONNECTION_ERROR
        };
        Self::new(err.to_string(), code)
    }

    pub fn is_timeout(&self) -> bool {
        self.code == Self::TIMEOUT
    }
}

impl fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_code() {
        let failure = RpcFailure::http_status(503, "maintenance");
        assert_eq!(failure.code, "HTTP_503");
        assert!(failure.message.contains("maintenance"));

        let failure = RpcFailure::http_status(404, "");
        assert_eq!(failure.message, "proxy responded with HTTP 404");
    }

    #[test]
    fn test_failure_display() {
        let failure = RpcFailure::new("flow not found", "FLOW_NOT_FOUND");
        assert_eq!(failure.to_string(), "[FLOW_NOT_FOUND] flow not found");
    }

    #[test]
    fn test_query_error_converts() {
        let err: RpcError = QueryError::PageSizeTooSmall.into();
        assert!(matches!(err, RpcError::Query(_)));
        assert!(err.to_string().contains("page size"));
    }
}
