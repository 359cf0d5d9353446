use alloy::primitives::TxHash;
use serde::Serialize;
use serde_json::Value;

use crate::models::{Role, WalletRequest};

/// Failure taxonomy surfaced at the dispatch boundary. Every variant renders
/// as a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local pre-check refused the operation before anything was built.
    #[error("{0}")]
    PolicyRejected(String),

    /// Revert reason from simulation or execution, passed through verbatim.
    #[error("Contract rejected: {0}")]
    ContractRejected(String),

    #[error("{role} wallet not configured. Assign a {role} address via wallet role assignment or set {}", .role.key_env())]
    SignerUnavailable { role: Role },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    #[error("Wallet command failed: {0}")]
    WalletRejected(String),

    #[error("receipt not yet available for {0}")]
    ReceiptTimeout(TxHash),
}

impl DispatchError {
    /// Timeouts only mean "not yet"; the caller may poll again.
    pub fn is_retryable_poll(&self) -> bool {
        matches!(self, DispatchError::ReceiptTimeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptFields {
    pub transaction_hash: TxHash,
    pub status: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
}

/// Unsigned request waiting on an external wallet, keyed by its sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTx {
    pub slot: String,
    pub sequence: u64,
    pub request: WalletRequest,
}

/// Uniform result of a dispatch. Exactly one variant is ever populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TxResult {
    Sent {
        transaction_hash: TxHash,
        receipt: Option<ReceiptFields>,
    },
    Pending(PendingTx),
    Failed {
        error: DispatchError,
    },
}

impl TxResult {
    pub fn failed(error: DispatchError) -> Self {
        TxResult::Failed { error }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, TxResult::Sent { .. })
    }

    pub fn as_pending(&self) -> Option<&PendingTx> {
        match self {
            TxResult::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            TxResult::Failed { error } => Some(error),
            _ => None,
        }
    }
}

impl From<DispatchError> for TxResult {
    fn from(error: DispatchError) -> Self {
        TxResult::failed(error)
    }
}

/// Envelope returned by every tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponse {
    Success { data: Value },
    Error { error: String },
}

impl ToolResponse {
    pub fn success(data: Value) -> Self {
        ToolResponse::Success { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResponse::Error { error: message.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResponse::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ToolResponse::Success { data } => Some(data),
            ToolResponse::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolResponse::Error { error } => Some(error),
            ToolResponse::Success { .. } => None,
        }
    }
}

impl From<DispatchError> for ToolResponse {
    fn from(error: DispatchError) -> Self {
        ToolResponse::error(error.to_string())
    }
}

impl From<TxResult> for ToolResponse {
    fn from(result: TxResult) -> Self {
        match result {
            TxResult::Failed { error } => error.into(),
            other => match serde_json::to_value(&other) {
                Ok(data) => ToolResponse::success(data),
                Err(e) => ToolResponse::error(format!("Unable to encode result: {}", e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_unavailable_names_the_key_variable() {
        let error = DispatchError::SignerUnavailable { role: Role::Borrower };
        let message = error.to_string();
        assert!(message.starts_with("Borrower wallet not configured"));
        assert!(message.ends_with("BORROWER_PRIVATE_KEY"));
    }

    #[test]
    fn test_failed_result_becomes_error_envelope() {
        let response: ToolResponse = TxResult::failed(DispatchError::ContractRejected("paused".into())).into();
        assert_eq!(response.error_message(), Some("Contract rejected: paused"));
    }

    #[test]
    fn test_sent_result_serializes_with_outcome_tag() {
        let result = TxResult::Sent {
            transaction_hash: TxHash::repeat_byte(0xab),
            receipt: None,
        };
        let response: ToolResponse = result.into();
        let data = response.data().unwrap();
        assert_eq!(data["outcome"], "sent");
        assert_eq!(data["transaction_hash"].as_str().unwrap().len(), 66);
    }

    #[test]
    fn test_receipt_timeout_is_retryable() {
        assert!(DispatchError::ReceiptTimeout(TxHash::ZERO).is_retryable_poll());
        assert!(!DispatchError::NetworkError("down".into()).is_retryable_poll());
    }
}
