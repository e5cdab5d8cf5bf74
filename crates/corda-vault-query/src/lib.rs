// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corda Vault Query
//!
//! Criteria model, fluent builder and wire compiler for Corda vault queries
//! issued through an HTTP RPC proxy.
//!
//! # Architecture
//!
//! - [`VaultQueryBuilder`] accumulates status, type, identity, soft-lock and
//!   time-window filters plus paging and sorting, and produces immutable
//!   [`QuerySpec`] snapshots.
//! - [`compile_query`] flattens a snapshot into the shape the proxy expects,
//!   emitting every key with defaults so no field is ever omitted.
//!
//! Nothing in this crate performs I/O.
//!
//! # Example
//!
//! ```
//! use corda_vault_query::{VaultQueryBuilder, VaultStatus, compile_query};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = VaultQueryBuilder::new()
//!     .with_status(VaultStatus::Unconsumed)
//!     .with_contract_state_types(["com.example.IOUState"])
//!     .with_paging(1, 100)?
//!     .build();
//!
//! let args = compile_query(&spec).into_arguments()?;
//! assert_eq!(args[0]["status"], "UNCONSUMED");
//! # Ok(())
//! # }
//! ```

mod builder;
mod compiler;
mod error;
mod types;

pub use builder::{VaultQueryBuilder, query_all, query_consumed, query_unconsumed};
pub use compiler::{CompiledCriteria, CompiledQuery, compile_criteria, compile_query};
pub use error::{QueryError, Result};
pub use types::{
    DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageSpecification, QueryCriteria,
    QuerySpec, RelevancyStatus, SoftLockingCondition, SoftLockingType, SortColumn, SortDirection,
    StateRef, TimeCondition, TimeInstantType, TimePredicate, VaultStatus,
};
