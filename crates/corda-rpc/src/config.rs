// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Connection configuration for the Corda RPC proxy.

use std::env;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcError};

/// How requests to a REST-style proxy authenticate.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    Basic { username: String, password: String },
    Bearer { token: String },
    None,
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"<redacted>").finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Credentials supplied by the host's credential provider.
///
/// The two shapes mirror the two credential types a workflow can be
/// configured with: direct node RPC details, or a REST proxy URL.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CordaCredentials {
    Rpc {
        host: String,
        port: u16,
        username: String,
        password: String,
        ssl: bool,
    },
    Rest {
        rest_api_url: String,
        auth: AuthMethod,
    },
}

impl std::fmt::Debug for CordaCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc {
                host,
                port,
                username,
                ssl,
                ..
            } => f
                .debug_struct("Rpc")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("password", &"<redacted>")
                .field("ssl", ssl)
                .finish(),
            Self::Rest { rest_api_url, auth } => f
                .debug_struct("Rest")
                .field("rest_api_url", rest_api_url)
                .field("auth", auth)
                .finish(),
        }
    }
}

impl CordaCredentials {
    /// Node RPC credentials over plain HTTP.
    pub fn rpc(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Rpc {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            ssl: false,
        }
    }

    /// REST proxy credentials.
    pub fn rest(rest_api_url: impl Into<String>, auth: AuthMethod) -> Self {
        Self::Rest {
            rest_api_url: rest_api_url.into(),
            auth,
        }
    }

    /// Base HTTP URL without a trailing slash.
    pub fn base_url(&self) -> String {
        match self {
            Self::Rpc {
                host, port, ssl, ..
            } => {
                let scheme = if *ssl { "https" } else { "http" };
                format!("{}://{}:{}", scheme, host, port)
            }
            Self::Rest { rest_api_url, .. } => rest_api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Value for the `Authorization` header, if any.
    pub fn authorization_header(&self) -> Option<String> {
        let auth = match self {
            Self::Rpc {
                username, password, ..
            } => return Some(basic_auth(username, password)),
            Self::Rest { auth, .. } => auth,
        };
        match auth {
            AuthMethod::Basic { username, password } => Some(basic_auth(username, password)),
            AuthMethod::Bearer { token } => Some(format!("Bearer {}", token)),
            AuthMethod::None => None,
        }
    }
}

fn basic_auth(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

/// Configuration shared by the transport client and the event stream manager.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Where and how to authenticate.
    pub credentials: CordaCredentials,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Path of the generic RPC endpoint.
    pub rpc_path: String,
    /// Path of the lightweight status probe.
    pub status_path: String,
    /// Path prefix for attachment upload and download.
    pub attachments_path: String,
    /// Path of the event WebSocket.
    pub ws_path: String,
}

impl ClientConfig {
    /// Create a configuration with default timeouts and paths.
    pub fn new(credentials: CordaCredentials) -> Self {
        Self {
            credentials,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            rpc_path: "/api/rpc".to_string(),
            status_path: "/api/status".to_string(),
            attachments_path: "/api/attachments".to_string(),
            ws_path: "/ws".to_string(),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CORDA_REST_API_URL`: REST proxy URL; when set, the REST credential shape is used
    /// - `CORDA_BEARER_TOKEN`: bearer token for the REST proxy
    /// - `CORDA_HOST`: node proxy host (default: "localhost")
    /// - `CORDA_PORT`: node proxy port (default: 8080)
    /// - `CORDA_USERNAME` / `CORDA_PASSWORD`: basic-auth credentials
    /// - `CORDA_SSL`: use HTTPS (default: "false")
    /// - `CORDA_CONNECT_TIMEOUT_MS`: connection timeout in milliseconds (default: 10000)
    /// - `CORDA_REQUEST_TIMEOUT_MS`: request timeout in milliseconds (default: 30000)
    pub fn from_env() -> Result<Self> {
        let username = env::var("CORDA_USERNAME").ok();
        let password = env::var("CORDA_PASSWORD").unwrap_or_default();

        let credentials = if let Ok(rest_api_url) = env::var("CORDA_REST_API_URL") {
            let auth = match (env::var("CORDA_BEARER_TOKEN"), username) {
                (Ok(token), _) => AuthMethod::Bearer { token },
                (Err(_), Some(username)) => AuthMethod::Basic { username, password },
                (Err(_), None) => AuthMethod::None,
            };
            CordaCredentials::rest(rest_api_url, auth)
        } else {
            let username = username
                .ok_or_else(|| RpcError::Config("CORDA_USERNAME is required".to_string()))?;
            let host = env::var("CORDA_HOST").unwrap_or_else(|_| "localhost".to_string());
            let port = env::var("CORDA_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|e| RpcError::Config(format!("invalid CORDA_PORT: {}", e)))?;
            let ssl = env::var("CORDA_SSL")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false);
            CordaCredentials::Rpc {
                host,
                port,
                username,
                password,
                ssl,
            }
        };

        let connect_timeout_ms: u64 = env::var("CORDA_CONNECT_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .map_err(|e| RpcError::Config(format!("invalid CORDA_CONNECT_TIMEOUT_MS: {}", e)))?;

        let request_timeout_ms: u64 = env::var("CORDA_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map_err(|e| RpcError::Config(format!("invalid CORDA_REQUEST_TIMEOUT_MS: {}", e)))?;

        Ok(Self::new(credentials)
            .with_connect_timeout(Duration::from_millis(connect_timeout_ms))
            .with_request_timeout(Duration::from_millis(request_timeout_ms)))
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_rpc_path(mut self, path: impl Into<String>) -> Self {
        self.rpc_path = path.into();
        self
    }

    pub fn with_status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = path.into();
        self
    }

    pub fn with_attachments_path(mut self, path: impl Into<String>) -> Self {
        self.attachments_path = path.into();
        self
    }

    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    pub fn rpc_url(&self) -> String {
        format!("{}{}", self.credentials.base_url(), self.rpc_path)
    }

    pub fn status_url(&self) -> String {
        format!("{}{}", self.credentials.base_url(), self.status_path)
    }

    pub fn attachments_url(&self) -> String {
        format!("{}{}", self.credentials.base_url(), self.attachments_path)
    }

    /// Event stream URL, switching `http(s)` to `ws(s)`.
    pub fn ws_url(&self) -> String {
        let base = self.credentials.base_url();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base
        };
        format!("{}{}", base, self.ws_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_credentials_urls() {
        let config = ClientConfig::new(CordaCredentials::rpc("node-a", 10050, "user", "pass"));
        assert_eq!(config.rpc_url(), "http://node-a:10050/api/rpc");
        assert_eq!(config.status_url(), "http://node-a:10050/api/status");
        assert_eq!(config.ws_url(), "ws://node-a:10050/ws");
    }

    #[test]
    fn test_ssl_switches_schemes() {
        let config = ClientConfig::new(CordaCredentials::Rpc {
            host: "node-b".to_string(),
            port: 443,
            username: "u".to_string(),
            password: "p".to_string(),
            ssl: true,
        });
        assert_eq!(config.rpc_url(), "https://node-b:443/api/rpc");
        assert_eq!(config.ws_url(), "wss://node-b:443/ws");
    }

    #[test]
    fn test_rest_url_trailing_slash_trimmed() {
        let config = ClientConfig::new(CordaCredentials::rest(
            "https://proxy.example.com/corda/",
            AuthMethod::None,
        ))
        .with_ws_path("/events");
        assert_eq!(config.rpc_url(), "https://proxy.example.com/corda/api/rpc");
        assert_eq!(config.ws_url(), "wss://proxy.example.com/corda/events");
    }

    #[test]
    fn test_authorization_headers() {
        let rpc = CordaCredentials::rpc("h", 1, "user", "pass");
        assert_eq!(
            rpc.authorization_header().as_deref(),
            Some("Basic dXNlcjpwYXNz")
        );

        let bearer = CordaCredentials::rest(
            "http://x",
            AuthMethod::Bearer {
                token: "abc".to_string(),
            },
        );
        assert_eq!(bearer.authorization_header().as_deref(), Some("Bearer abc"));

        let none = CordaCredentials::rest("http://x", AuthMethod::None);
        assert!(none.authorization_header().is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = CordaCredentials::rpc("h", 1, "user", "s3cret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new(CordaCredentials::rpc("h", 1, "u", "p"))
            .with_connect_timeout(Duration::from_secs(5))
            .with_request_timeout(Duration::from_secs(60))
            .with_rpc_path("/rpc")
            .with_status_path("/health")
            .with_attachments_path("/files");

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.rpc_url(), "http://h:1/rpc");
        assert_eq!(config.status_url(), "http://h:1/health");
        assert_eq!(config.attachments_url(), "http://h:1/files");
    }
}
