// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compilation of query snapshots into the proxy's wire shape.
//!
//! The proxy deserializes criteria into a fixed structure and rejects
//! payloads with missing keys, so every collection is emitted even when
//! empty and unset enums fall back to their documented defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    PageSpecification, QuerySpec, RelevancyStatus, SoftLockingCondition, SortColumn, StateRef,
    TimeCondition, VaultStatus,
};

/// Flat criteria object sent to `vaultQuery`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledCriteria {
    pub status: VaultStatus,
    pub contract_state_types: Vec<String>,
    pub state_refs: Vec<StateRef>,
    pub notary: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_locking_condition: Option<SoftLockingCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_condition: Option<TimeCondition>,
    pub relevancy_status: RelevancyStatus,
    pub constraint_types: Vec<String>,
    pub constraints: Vec<Value>,
    pub participants: Vec<String>,
    pub external_ids: Vec<String>,
}

/// Complete compiled query: criteria plus paging, sorting and state type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
    pub criteria: CompiledCriteria,
    pub paging: PageSpecification,
    pub sorting: Vec<SortColumn>,
    pub contract_state_type: Option<String>,
}

impl CompiledQuery {
    /// Positional arguments for `vaultQuery(criteria, paging, sorting, contractStateType)`.
    pub fn into_arguments(self) -> serde_json::Result<Vec<Value>> {
        Ok(vec![
            serde_json::to_value(self.criteria)?,
            serde_json::to_value(self.paging)?,
            serde_json::to_value(self.sorting)?,
            self.contract_state_type.map_or(Value::Null, Value::String),
        ])
    }
}

/// Flatten a snapshot's criteria, filling every optional field.
pub fn compile_criteria(spec: &QuerySpec) -> CompiledCriteria {
    let criteria = &spec.criteria;

    let mut contract_state_types = criteria.contract_state_types.clone().unwrap_or_default();
    if let Some(ty) = &spec.contract_state_type
        && !contract_state_types.contains(ty)
    {
        contract_state_types.push(ty.clone());
    }

    CompiledCriteria {
        status: criteria.status.unwrap_or_default(),
        contract_state_types,
        state_refs: criteria.state_refs.clone().unwrap_or_default(),
        notary: criteria.notary.clone().unwrap_or_default(),
        soft_locking_condition: criteria.soft_locking_condition.clone(),
        time_condition: criteria.time_condition.clone(),
        relevancy_status: criteria.relevancy_status.unwrap_or_default(),
        constraint_types: criteria.constraint_types.clone().unwrap_or_default(),
        constraints: Vec::new(),
        participants: criteria.participants.clone().unwrap_or_default(),
        external_ids: criteria.external_ids.clone().unwrap_or_default(),
    }
}

/// Compile the whole snapshot, emitting sorting as a (possibly empty) list.
pub fn compile_query(spec: &QuerySpec) -> CompiledQuery {
    CompiledQuery {
        criteria: compile_criteria(spec),
        paging: spec.paging,
        sorting: spec.sorting.clone().unwrap_or_default(),
        contract_state_type: spec.contract_state_type.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{VaultQueryBuilder, query_unconsumed};
    use crate::types::SortDirection;
    use serde_json::json;

    #[test]
    fn test_empty_spec_emits_every_key() {
        let compiled = compile_criteria(&VaultQueryBuilder::new().build());
        let json = serde_json::to_value(&compiled).unwrap();

        assert_eq!(
            json,
            json!({
                "status": "UNCONSUMED",
                "contractStateTypes": [],
                "stateRefs": [],
                "notary": [],
                "relevancyStatus": "ALL",
                "constraintTypes": [],
                "constraints": [],
                "participants": [],
                "externalIds": [],
            })
        );
    }

    #[test]
    fn test_set_fields_pass_through() {
        let spec = VaultQueryBuilder::new()
            .with_status(VaultStatus::All)
            .with_relevancy_status(RelevancyStatus::Relevant)
            .with_state_refs([StateRef::new("ABCD", 1)])
            .with_soft_locking(SoftLockingCondition::locked_only())
            .build();
        let compiled = compile_criteria(&spec);

        assert_eq!(compiled.status, VaultStatus::All);
        assert_eq!(compiled.relevancy_status, RelevancyStatus::Relevant);
        assert_eq!(compiled.state_refs, vec![StateRef::new("ABCD", 1)]);
        assert_eq!(
            compiled.soft_locking_condition,
            Some(SoftLockingCondition::locked_only())
        );
        assert!(compiled.time_condition.is_none());
    }

    #[test]
    fn test_convenience_type_merged_once() {
        let compiled = compile_criteria(&query_unconsumed(Some("com.example.X")));
        assert_eq!(compiled.contract_state_types, vec!["com.example.X"]);

        let spec = VaultQueryBuilder::new()
            .with_contract_state_types(["com.example.X", "com.example.Y"])
            .with_contract_state_type("com.example.X")
            .build();
        assert_eq!(
            compile_criteria(&spec).contract_state_types,
            vec!["com.example.X", "com.example.Y"]
        );
    }

    #[test]
    fn test_compile_does_not_mutate_input() {
        let spec = VaultQueryBuilder::new()
            .with_contract_state_type("com.example.X")
            .build();
        let before = spec.clone();
        let _ = compile_query(&spec);
        assert_eq!(spec, before);
        assert!(spec.criteria.contract_state_types.is_none());
    }

    #[test]
    fn test_into_arguments_is_positional() {
        let spec = VaultQueryBuilder::new()
            .with_paging(3, 25)
            .unwrap()
            .order_by("recordedTime", SortDirection::Desc)
            .build();

        let args = compile_query(&spec).into_arguments().unwrap();
        assert_eq!(args.len(), 4);
        assert_eq!(args[0]["status"], "UNCONSUMED");
        assert_eq!(args[1], json!({"pageNumber": 3, "pageSize": 25}));
        assert_eq!(
            args[2],
            json!([{"sortAttribute": "recordedTime", "direction": "DESC"}])
        );
        assert_eq!(args[3], Value::Null);
    }

    #[test]
    fn test_unsorted_query_sends_empty_sort_list() {
        let compiled = compile_query(&VaultQueryBuilder::new().build());
        assert!(compiled.sorting.is_empty());
    }
}
