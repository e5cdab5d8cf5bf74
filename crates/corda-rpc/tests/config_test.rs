// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration tests for corda-rpc.

use std::env;
use std::time::Duration;

use corda_rpc::{AuthMethod, ClientConfig, CordaCredentials, EventStreamConfig, PoolConfig};

const VARS: &[&str] = &[
    "CORDA_REST_API_URL",
    "CORDA_BEARER_TOKEN",
    "CORDA_HOST",
    "CORDA_PORT",
    "CORDA_USERNAME",
    "CORDA_PASSWORD",
    "CORDA_SSL",
    "CORDA_CONNECT_TIMEOUT_MS",
    "CORDA_REQUEST_TIMEOUT_MS",
];

fn clear_env() {
    for var in VARS {
        unsafe { env::remove_var(var) };
    }
}

fn set_env(pairs: &[(&str, &str)]) {
    clear_env();
    for (key, value) in pairs {
        unsafe { env::set_var(key, value) };
    }
}

#[test]
fn test_new_config_defaults() {
    let config = ClientConfig::new(CordaCredentials::rpc("localhost", 10050, "user", "pass"));

    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.rpc_path, "/api/rpc");
    assert_eq!(config.status_path, "/api/status");
    assert_eq!(config.attachments_path, "/api/attachments");
    assert_eq!(config.ws_path, "/ws");
}

#[test]
fn test_stream_config_defaults() {
    let config = EventStreamConfig::default();
    assert_eq!(config.reconnect_delay, Duration::from_secs(5));
    assert_eq!(config.max_reconnect_attempts, 5);

    let config = config
        .with_reconnect_delay(Duration::from_millis(20))
        .with_max_reconnect_attempts(2)
        .with_delivery_buffer(0);
    assert_eq!(config.reconnect_delay, Duration::from_millis(20));
    assert_eq!(config.max_reconnect_attempts, 2);
    assert_eq!(config.delivery_buffer, 1);
}

#[test]
fn test_pool_config_builder_chain() {
    let config = PoolConfig::default()
        .with_min_size(1)
        .with_max_size(4)
        .with_acquire_timeout(Duration::from_secs(2))
        .with_idle_timeout(Duration::from_secs(60))
        .with_acquire_retry_interval(Duration::from_millis(10));

    assert_eq!(config.min_size, 1);
    assert_eq!(config.max_size, 4);
    assert_eq!(config.acquire_timeout, Duration::from_secs(2));
    assert_eq!(config.idle_timeout, Duration::from_secs(60));
    assert_eq!(config.acquire_retry_interval, Duration::from_millis(10));
    assert!(config.validate().is_ok());
}

// Environment variables are process-wide, so every from_env case runs in
// this one test.
#[test]
fn test_from_env() {
    set_env(&[
        ("CORDA_HOST", "node-a"),
        ("CORDA_PORT", "10050"),
        ("CORDA_USERNAME", "user"),
        ("CORDA_PASSWORD", "pass"),
        ("CORDA_SSL", "true"),
        ("CORDA_REQUEST_TIMEOUT_MS", "5000"),
    ]);
    let config = ClientConfig::from_env().unwrap();
    assert_eq!(config.rpc_url(), "https://node-a:10050/api/rpc");
    assert_eq!(config.request_timeout, Duration::from_millis(5000));
    assert_eq!(config.connect_timeout, Duration::from_secs(10));

    set_env(&[
        ("CORDA_REST_API_URL", "https://proxy.example.com"),
        ("CORDA_BEARER_TOKEN", "abc"),
    ]);
    let config = ClientConfig::from_env().unwrap();
    assert_eq!(
        config.credentials,
        CordaCredentials::rest(
            "https://proxy.example.com",
            AuthMethod::Bearer {
                token: "abc".to_string()
            }
        )
    );

    set_env(&[("CORDA_HOST", "node-a")]);
    assert!(ClientConfig::from_env().is_err());

    set_env(&[("CORDA_USERNAME", "user"), ("CORDA_PORT", "not-a-port")]);
    assert!(ClientConfig::from_env().is_err());

    clear_env();
}
