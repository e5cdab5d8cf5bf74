// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Vault query criteria model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// First page of a paged query.
pub const DEFAULT_PAGE_NUMBER: u32 = 1;
/// Page size used when the caller does not request paging.
pub const DEFAULT_PAGE_SIZE: u32 = 200;
/// Largest page the proxy will serve.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Consumption status of a vault state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultStatus {
    /// States not yet consumed by a transaction.
    #[default]
    Unconsumed,
    /// States consumed by a later transaction.
    Consumed,
    /// Both consumed and unconsumed states.
    All,
}

/// Whether a state is relevant to the querying node's own keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelevancyStatus {
    Relevant,
    NotRelevant,
    #[default]
    All,
}

/// Reference to a transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRef {
    /// Transaction id (hex SHA-256).
    pub tx_hash: String,
    /// Output index within the transaction.
    pub output_index: u32,
}

impl StateRef {
    pub fn new(tx_hash: impl Into<String>, output_index: u32) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            output_index,
        }
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tx_hash, self.output_index)
    }
}

impl FromStr for StateRef {
    type Err = QueryError;

    /// Parse `HASH(index)` (Corda's own rendering) or `HASH:index`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || QueryError::InvalidStateRef(s.to_string());
        let trimmed = s.trim();

        let (hash, index) = if let Some(body) = trimmed.strip_suffix(')') {
            body.split_once('(').ok_or_else(invalid)?
        } else {
            trimmed.split_once(':').ok_or_else(invalid)?
        };

        let hash = hash.trim();
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let output_index = index.trim().parse::<u32>().map_err(|_| invalid())?;

        Ok(Self::new(hash.to_ascii_uppercase(), output_index))
    }
}

/// Kind of soft-lock filter applied to a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SoftLockingType {
    /// Only states locked by any flow.
    LockedOnly,
    /// Only states not locked.
    UnlockedOnly,
    /// Unlocked states plus states locked under the given ids.
    UnlockedAndSpecified,
    /// Only states locked under the given ids.
    Specified,
}

impl SoftLockingType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::LockedOnly => "LOCKED_ONLY",
            Self::UnlockedOnly => "UNLOCKED_ONLY",
            Self::UnlockedAndSpecified => "UNLOCKED_AND_SPECIFIED",
            Self::Specified => "SPECIFIED",
        }
    }
}

/// Soft-locking filter with its optional lock ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftLockingCondition {
    #[serde(rename = "type")]
    pub kind: SoftLockingType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lock_ids: Vec<String>,
}

impl SoftLockingCondition {
    pub fn locked_only() -> Self {
        Self {
            kind: SoftLockingType::LockedOnly,
            lock_ids: Vec::new(),
        }
    }

    pub fn unlocked_only() -> Self {
        Self {
            kind: SoftLockingType::UnlockedOnly,
            lock_ids: Vec::new(),
        }
    }

    /// States locked under one of `lock_ids`. Fails when no id is given.
    pub fn specified<I, S>(lock_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_ids(SoftLockingType::Specified, lock_ids)
    }

    /// Unlocked states plus those locked under `lock_ids`. Fails when no id is given.
    pub fn unlocked_and_specified<I, S>(lock_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_ids(SoftLockingType::UnlockedAndSpecified, lock_ids)
    }

    fn with_ids<I, S>(kind: SoftLockingType, lock_ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lock_ids: Vec<String> = dedup(lock_ids);
        if lock_ids.is_empty() {
            return Err(QueryError::MissingLockIds(kind.as_str()));
        }
        Ok(Self { kind, lock_ids })
    }
}

/// Which instant of a state's life a time condition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInstantType {
    Recorded,
    Consumed,
}

/// Comparison applied to the selected instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimePredicate {
    GreaterThan { value: DateTime<Utc> },
    LessThan { value: DateTime<Utc> },
    Between { from: DateTime<Utc>, to: DateTime<Utc> },
}

/// Time-window filter. A query carries at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeCondition {
    #[serde(rename = "type")]
    pub kind: TimeInstantType,
    pub predicate: TimePredicate,
}

/// Accumulated vault search criteria.
///
/// Every field stays `None` until explicitly set, so a snapshot only carries
/// what the caller asked for. The compiler fills in wire defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VaultStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_state_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_refs: Option<Vec<StateRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notary: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevancy_status: Option<RelevancyStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_locking_condition: Option<SoftLockingCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_condition: Option<TimeCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_types: Option<Vec<String>>,
}

impl QueryCriteria {
    /// True when no filter has been set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Page window requested from the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSpecification {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageSpecification {
    /// Create a page specification, rejecting out-of-range values immediately.
    pub fn new(page_number: u32, page_size: u32) -> Result<Self> {
        if page_size > MAX_PAGE_SIZE {
            return Err(QueryError::PageSizeTooLarge {
                size: page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if page_size == 0 {
            return Err(QueryError::PageSizeTooSmall);
        }
        if page_number < DEFAULT_PAGE_NUMBER {
            return Err(QueryError::InvalidPageNumber(page_number));
        }
        Ok(Self {
            page_number,
            page_size,
        })
    }
}

impl Default for PageSpecification {
    fn default() -> Self {
        Self {
            page_number: DEFAULT_PAGE_NUMBER,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key. Earlier columns take priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortColumn {
    pub sort_attribute: String,
    pub direction: SortDirection,
}

/// Immutable snapshot produced by [`crate::VaultQueryBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub criteria: QueryCriteria,
    pub paging: PageSpecification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<Vec<SortColumn>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_state_type: Option<String>,
}

/// Collect into a list keeping the first occurrence of each value.
pub(crate) fn dedup<I, S, T>(items: I) -> Vec<T>
where
    I: IntoIterator<Item = S>,
    S: Into<T>,
    T: PartialEq,
{
    let mut out: Vec<T> = Vec::new();
    for item in items {
        let item = item.into();
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
