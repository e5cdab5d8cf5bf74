// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire envelopes and typed payloads returned by the proxy.

use chrono::{DateTime, Utc};
use corda_vault_query::StateRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RpcFailure, RpcResult};

/// Body of a call to the generic RPC endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub operation: String,
    pub arguments: Vec<Value>,
}

/// Loose result envelope as it travels on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl RpcEnvelope {
    /// Convert into a tagged result. A successful envelope without data
    /// yields `Value::Null`.
    pub fn into_result(self) -> RpcResult<Value> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(RpcFailure::new(
                self.error
                    .unwrap_or_else(|| "proxy reported failure".to_string()),
                self.error_code
                    .unwrap_or_else(|| RpcFailure::REMOTE_ERROR.to_string()),
            ))
        }
    }
}

impl From<RpcResult<Value>> for RpcEnvelope {
    fn from(result: RpcResult<Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                ..Self::default()
            },
            Err(failure) => Self {
                success: false,
                data: None,
                error: Some(failure.message),
                error_code: Some(failure.code),
            },
        }
    }
}

/// A well-known identity on the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    /// X.500 name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_key: Option<String>,
}

/// Node identity and addressing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub legal_identities: Vec<Party>,
    #[serde(default)]
    pub platform_version: u32,
    #[serde(default)]
    pub serial: i64,
}

/// Network-wide parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParameters {
    pub minimum_platform_version: u32,
    #[serde(default)]
    pub notaries: Vec<Value>,
    #[serde(default)]
    pub max_message_size: Option<u64>,
    #[serde(default)]
    pub max_transaction_size: Option<u64>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub epoch: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Handle returned when a flow is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowHandle {
    /// State machine run id.
    #[serde(alias = "id")]
    pub flow_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<Value>,
}

/// A flow currently held by the node's state machine manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineInfo {
    #[serde(alias = "id")]
    pub flow_id: String,
    pub flow_logic_class_name: String,
    #[serde(default)]
    pub progress: Option<String>,
}

/// A state together with its notary and governing contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionState {
    #[serde(default)]
    pub data: Value,
    pub contract: String,
    #[serde(default)]
    pub notary: Option<Party>,
}

/// A state and the reference of the output that created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateAndRef {
    pub state: TransactionState,
    #[serde(rename = "ref")]
    pub state_ref: StateRef,
}

/// One page of vault query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultPage {
    #[serde(default)]
    pub states: Vec<StateAndRef>,
    #[serde(default)]
    pub states_metadata: Vec<Value>,
    #[serde(default)]
    pub total_states_available: i64,
    #[serde(default)]
    pub other_results: Vec<Value>,
}

/// Result of an attachment upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentUpload {
    /// SHA-256 of the stored attachment.
    #[serde(alias = "hash", alias = "id")]
    pub attachment_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_success_into_result() {
        let envelope: RpcEnvelope =
            serde_json::from_value(json!({"success": true, "data": {"a": 1}})).unwrap();
        assert_eq!(envelope.into_result().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_envelope_success_without_data_is_null() {
        let envelope: RpcEnvelope = serde_json::from_value(json!({"success": true})).unwrap();
        assert_eq!(envelope.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn test_envelope_failure_into_result() {
        let envelope: RpcEnvelope = serde_json::from_value(json!({
            "success": false,
            "error": "Flow class not registered",
            "errorCode": "FLOW_NOT_FOUND",
        }))
        .unwrap();
        let failure = envelope.into_result().unwrap_err();
        assert_eq!(failure.code, "FLOW_NOT_FOUND");
        assert_eq!(failure.message, "Flow class not registered");
    }

    #[test]
    fn test_envelope_failure_without_code() {
        let envelope = RpcEnvelope {
            success: false,
            ..Default::default()
        };
        assert_eq!(
            envelope.into_result().unwrap_err().code,
            RpcFailure::REMOTE_ERROR
        );
    }

    #[test]
    fn test_envelope_from_result() {
        let envelope = RpcEnvelope::from(Err(RpcFailure::new("boom", "TIMEOUT")));
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"success": false, "error": "boom", "errorCode": "TIMEOUT"})
        );
    }

    #[test]
    fn test_vault_page_decodes() {
        let page: VaultPage = serde_json::from_value(json!({
            "states": [{
                "state": {
                    "data": {"amount": 10},
                    "contract": "com.example.IOUContract",
                    "notary": {"name": "O=Notary,L=London,C=GB"}
                },
                "ref": {"txHash": "AB", "outputIndex": 0}
            }],
            "totalStatesAvailable": 1
        }))
        .unwrap();

        assert_eq!(page.states.len(), 1);
        assert_eq!(page.states[0].state.contract, "com.example.IOUContract");
        assert_eq!(page.states[0].state_ref, StateRef::new("AB", 0));
        assert_eq!(page.total_states_available, 1);
    }

    #[test]
    fn test_flow_handle_accepts_id_alias() {
        let handle: FlowHandle = serde_json::from_value(json!({"id": "run-1"})).unwrap();
        assert_eq!(handle.flow_id, "run-1");
    }
}
