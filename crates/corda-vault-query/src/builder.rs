// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fluent builder for vault queries.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    PageSpecification, QueryCriteria, QuerySpec, RelevancyStatus, SoftLockingCondition,
    SortColumn, SortDirection, StateRef, TimeCondition, TimeInstantType, TimePredicate,
    VaultStatus, dedup,
};

/// Accumulates filter, paging and sort state and produces [`QuerySpec`]
/// snapshots.
///
/// Every `with_*` setter replaces its field wholesale rather than merging
/// into what was there. Time conditions share one slot: the last
/// `recorded_*`/`consumed_*` call wins.
///
/// # Example
///
/// ```
/// use corda_vault_query::{SortDirection, VaultQueryBuilder, VaultStatus};
///
/// # fn main() -> Result<(), corda_vault_query::QueryError> {
/// let spec = VaultQueryBuilder::new()
///     .with_status(VaultStatus::Unconsumed)
///     .with_contract_state_types(["com.example.IOUState"])
///     .with_paging(2, 50)?
///     .order_by("recordedTime", SortDirection::Desc)
///     .build();
///
/// assert_eq!(spec.paging.page_size, 50);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct VaultQueryBuilder {
    criteria: QueryCriteria,
    paging: PageSpecification,
    sorting: Vec<SortColumn>,
    contract_state_type: Option<String>,
}

impl VaultQueryBuilder {
    /// Create a builder with empty criteria, page 1 / size 200 and no sorting.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: VaultStatus) -> Self {
        self.criteria.status = Some(status);
        self
    }

    /// Fully-qualified contract state class names.
    pub fn with_contract_state_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.contract_state_types = Some(dedup(types));
        self
    }

    pub fn with_state_refs<I>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = StateRef>,
    {
        self.criteria.state_refs = Some(dedup(refs));
        self
    }

    /// Notary X.500 names.
    pub fn with_notary<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.notary = Some(dedup(names));
        self
    }

    /// Participant X.500 names.
    pub fn with_participants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.participants = Some(dedup(names));
        self
    }

    pub fn with_external_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.external_ids = Some(dedup(ids));
        self
    }

    pub fn with_relevancy_status(mut self, status: RelevancyStatus) -> Self {
        self.criteria.relevancy_status = Some(status);
        self
    }

    pub fn with_soft_locking(mut self, condition: SoftLockingCondition) -> Self {
        self.criteria.soft_locking_condition = Some(condition);
        self
    }

    /// Attachment constraint type names (e.g. `HASH`, `SIGNATURE`).
    pub fn with_constraint_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.criteria.constraint_types = Some(dedup(types));
        self
    }

    /// Single contract state type carried next to the criteria.
    pub fn with_contract_state_type(mut self, contract_state_type: impl Into<String>) -> Self {
        self.contract_state_type = Some(contract_state_type.into());
        self
    }

    pub fn recorded_after(self, ts: DateTime<Utc>) -> Self {
        self.with_time_condition(
            TimeInstantType::Recorded,
            TimePredicate::GreaterThan { value: ts },
        )
    }

    pub fn recorded_before(self, ts: DateTime<Utc>) -> Self {
        self.with_time_condition(
            TimeInstantType::Recorded,
            TimePredicate::LessThan { value: ts },
        )
    }

    pub fn recorded_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.with_time_condition(TimeInstantType::Recorded, TimePredicate::Between { from, to })
    }

    pub fn consumed_after(self, ts: DateTime<Utc>) -> Self {
        self.with_time_condition(
            TimeInstantType::Consumed,
            TimePredicate::GreaterThan { value: ts },
        )
    }

    pub fn consumed_before(self, ts: DateTime<Utc>) -> Self {
        self.with_time_condition(
            TimeInstantType::Consumed,
            TimePredicate::LessThan { value: ts },
        )
    }

    pub fn consumed_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.with_time_condition(TimeInstantType::Consumed, TimePredicate::Between { from, to })
    }

    fn with_time_condition(mut self, kind: TimeInstantType, predicate: TimePredicate) -> Self {
        self.criteria.time_condition = Some(TimeCondition { kind, predicate });
        self
    }

    /// Replace paging. Fails immediately when `page_size` exceeds
    /// [`crate::MAX_PAGE_SIZE`], is zero, or `page_number` is zero.
    pub fn with_paging(mut self, page_number: u32, page_size: u32) -> Result<Self> {
        self.paging = PageSpecification::new(page_number, page_size)?;
        Ok(self)
    }

    /// Append a sort column. Repeated attributes are kept as separate entries.
    pub fn order_by(mut self, attribute: impl Into<String>, direction: SortDirection) -> Self {
        self.sorting.push(SortColumn {
            sort_attribute: attribute.into(),
            direction,
        });
        self
    }

    pub fn order_by_asc(self, attribute: impl Into<String>) -> Self {
        self.order_by(attribute, SortDirection::Asc)
    }

    /// Snapshot the current state.
    pub fn build(&self) -> QuerySpec {
        QuerySpec {
            criteria: self.criteria.clone(),
            paging: self.paging,
            sorting: (!self.sorting.is_empty()).then(|| self.sorting.clone()),
            contract_state_type: self.contract_state_type.clone(),
        }
    }

    /// Restore the freshly-constructed state.
    pub fn reset(self) -> Self {
        Self::default()
    }
}

fn single_status_query(status: VaultStatus, contract_state_type: Option<&str>) -> QuerySpec {
    let mut builder = VaultQueryBuilder::new().with_status(status);
    if let Some(ty) = contract_state_type {
        builder = builder.with_contract_state_type(ty);
    }
    builder.build()
}

/// Unconsumed states, optionally of one contract state type.
pub fn query_unconsumed(contract_state_type: Option<&str>) -> QuerySpec {
    single_status_query(VaultStatus::Unconsumed, contract_state_type)
}

/// Consumed states, optionally of one contract state type.
pub fn query_consumed(contract_state_type: Option<&str>) -> QuerySpec {
    single_status_query(VaultStatus::Consumed, contract_state_type)
}

/// All states regardless of status, optionally of one contract state type.
pub fn query_all(contract_state_type: Option<&str>) -> QuerySpec {
    single_status_query(VaultStatus::All, contract_state_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_setters_replace_rather_than_merge() {
        let spec = VaultQueryBuilder::new()
            .with_participants(["O=Alice,L=London,C=GB"])
            .with_participants(["O=Bob,L=Paris,C=FR"])
            .build();

        assert_eq!(
            spec.criteria.participants,
            Some(vec!["O=Bob,L=Paris,C=FR".to_string()])
        );
    }

    #[test]
    fn test_time_condition_last_write_wins() {
        let spec = VaultQueryBuilder::new()
            .recorded_after(ts(1))
            .recorded_between(ts(2), ts(3))
            .build();

        assert_eq!(
            spec.criteria.time_condition,
            Some(TimeCondition {
                kind: TimeInstantType::Recorded,
                predicate: TimePredicate::Between {
                    from: ts(2),
                    to: ts(3)
                },
            })
        );
    }

    #[test]
    fn test_consumed_overwrites_recorded() {
        let spec = VaultQueryBuilder::new()
            .recorded_before(ts(5))
            .consumed_after(ts(4))
            .build();

        let cond = spec.criteria.time_condition.unwrap();
        assert_eq!(cond.kind, TimeInstantType::Consumed);
        assert_eq!(cond.predicate, TimePredicate::GreaterThan { value: ts(4) });
    }

    #[test]
    fn test_with_paging_rejects_oversized_page() {
        let err = VaultQueryBuilder::new().with_paging(1, 10_001).unwrap_err();
        assert!(matches!(err, QueryError::PageSizeTooLarge { size: 10_001, .. }));
    }

    #[test]
    fn test_order_by_keeps_duplicates_in_order() {
        let spec = VaultQueryBuilder::new()
            .order_by("recordedTime", SortDirection::Desc)
            .order_by_asc("stateRef")
            .order_by_asc("recordedTime")
            .build();

        let sorting = spec.sorting.unwrap();
        let attrs: Vec<_> = sorting.iter().map(|c| c.sort_attribute.as_str()).collect();
        assert_eq!(attrs, vec!["recordedTime", "stateRef", "recordedTime"]);
        assert_eq!(sorting[0].direction, SortDirection::Desc);
        assert_eq!(sorting[2].direction, SortDirection::Asc);
    }

    #[test]
    fn test_build_omits_empty_sorting() {
        let spec = VaultQueryBuilder::new().build();
        assert!(spec.sorting.is_none());

        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("sorting").is_none());
        assert!(json.get("contractStateType").is_none());
    }

    #[test]
    fn test_build_is_a_snapshot() {
        let builder = VaultQueryBuilder::new().with_status(VaultStatus::Consumed);
        let first = builder.build();
        let builder = builder.with_status(VaultStatus::All);
        let second = builder.build();

        assert_eq!(first.criteria.status, Some(VaultStatus::Consumed));
        assert_eq!(second.criteria.status, Some(VaultStatus::All));
    }

    #[test]
    fn test_reset_matches_fresh_builder() {
        let dirty = VaultQueryBuilder::new()
            .with_status(VaultStatus::All)
            .with_notary(["O=Notary,L=Zurich,C=CH"])
            .with_soft_locking(SoftLockingCondition::locked_only())
            .recorded_after(ts(1))
            .with_paging(4, 20)
            .unwrap()
            .order_by_asc("recordedTime")
            .with_contract_state_type("com.example.X");

        assert_eq!(dirty.reset().build(), VaultQueryBuilder::new().build());
    }

    #[test]
    fn test_convenience_queries() {
        let unconsumed = query_unconsumed(Some("com.example.X"));
        assert_eq!(unconsumed.criteria.status, Some(VaultStatus::Unconsumed));
        assert_eq!(
            unconsumed.contract_state_type.as_deref(),
            Some("com.example.X")
        );

        let consumed = query_consumed(None);
        assert_eq!(consumed.criteria.status, Some(VaultStatus::Consumed));
        assert!(consumed.contract_state_type.is_none());

        let all = query_all(Some("com.example.Y"));
        assert_eq!(all.criteria.status, Some(VaultStatus::All));
        assert_eq!(all.contract_state_type.as_deref(), Some("com.example.Y"));
    }
}
