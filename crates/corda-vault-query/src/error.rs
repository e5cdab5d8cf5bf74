// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for corda-vault-query.

use thiserror::Error;

/// Result type using QueryError.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Validation errors raised while assembling vault query criteria.
///
/// These are raised at the call that breaks the contract and are never
/// deferred to compile time or silently clamped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Page size above the proxy's maximum window.
    #[error("page size {size} exceeds maximum of {max}")]
    PageSizeTooLarge { size: u32, max: u32 },

    /// Page size of zero.
    #[error("page size must be at least 1")]
    PageSizeTooSmall,

    /// Page numbers are 1-based.
    #[error("page number must be at least 1, got {0}")]
    InvalidPageNumber(u32),

    /// State reference string could not be parsed.
    #[error("invalid state reference '{0}': expected HASH(index) or HASH:index")]
    InvalidStateRef(String),

    /// Soft-locking condition that requires lock ids was given none.
    #[error("soft locking condition {0} requires at least one lock id")]
    MissingLockIds(&'static str),
}
