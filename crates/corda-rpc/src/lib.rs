// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corda RPC
//!
//! Client plumbing for a Corda node's HTTP RPC proxy.
//!
//! # Architecture
//!
//! - [`CordaRpcClient`] issues independent `{operation, arguments}` requests
//!   and returns every outcome as an [`RpcResult`]: typed payload or
//!   structured [`RpcFailure`]. Transport problems never surface as errors.
//! - [`ConnectionPool`] bounds how many clients exist, hands them out for
//!   exclusive use and evicts idle ones in the background.
//! - [`EventStreamManager`] owns one WebSocket, fans events out to filtered
//!   subscribers and reconnects with a bounded retry budget.
//!
//! Vault queries are built with [`corda_vault_query`], re-exported here as
//! [`query`].
//!
//! # Example
//!
//! ```ignore
//! use corda_rpc::{ClientConfig, PoolConfig, RpcClientFactory, RpcConnectionPool};
//! use corda_rpc::query::query_unconsumed;
//!
//! let pool = RpcConnectionPool::new(
//!     RpcClientFactory::new(ClientConfig::from_env()?),
//!     PoolConfig::default(),
//! )?;
//! pool.initialize().await?;
//!
//! let spec = query_unconsumed(Some("com.example.IOUState"));
//! let page = pool
//!     .with_connection(|client| async move { client.vault_query(&spec).await })
//!     .await?;
//!
//! match page {
//!     Ok(page) => println!("{} states", page.total_states_available),
//!     Err(failure) => eprintln!("query failed: {}", failure),
//! }
//! pool.shutdown().await;
//! ```

mod client;
mod config;
mod error;
mod events;
mod pool;
mod types;

pub use corda_vault_query as query;

pub use client::CordaRpcClient;
pub use config::{AuthMethod, ClientConfig, CordaCredentials};
pub use error::{Result, RpcError, RpcFailure, RpcResult};
pub use events::{
    EventStreamConfig, EventStreamManager, EventStreamStats, EventType, StreamEvent,
    SubscriptionConfig, VaultUpdate, VaultUpdateEntry,
};
pub use pool::{
    ConnectionFactory, ConnectionPool, PoolConfig, PoolStats, PoolableConnection,
    RpcClientFactory, RpcConnectionPool,
};
pub use types::{
    AttachmentUpload, FlowHandle, NetworkParameters, NodeInfo, Party, RpcEnvelope, RpcRequest,
    StateAndRef, StateMachineInfo, TransactionState, VaultPage,
};
