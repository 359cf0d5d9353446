use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::models::{DispatchError, ReceiptFields};

/// Failures reported by an execution engine, already classified.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The node refused the call or transaction with a revert.
    #[error("{0}")]
    Reverted(String),

    /// The node already has this nonce (mined or queued).
    #[error("{0}")]
    NonceConflict(String),

    /// Transport or RPC failure unrelated to contract logic.
    #[error("{0}")]
    Rpc(String),
}

impl From<EngineError> for DispatchError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Reverted(reason) => DispatchError::ContractRejected(reason),
            EngineError::NonceConflict(message) => DispatchError::NonceConflict(message),
            EngineError::Rpc(message) => DispatchError::NetworkError(message),
        }
    }
}

/// Read-only call against current chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCall {
    pub to: Address,
    pub from: Option<Address>,
    pub data: Bytes,
    pub value: U256,
}

/// Low-level chain access used by the dispatcher and the view tools.
///
/// Engines never sign. Signing happens in the dispatcher, so an engine only
/// ever sees already-encoded raw transactions.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn chain_id(&self) -> Result<u64, EngineError>;

    async fn block_number(&self) -> Result<u64, EngineError>;

    /// Transaction count including pending transactions.
    async fn next_nonce(&self, account: Address) -> Result<u64, EngineError>;

    async fn gas_price(&self) -> Result<u128, EngineError>;

    async fn balance(&self, account: Address) -> Result<U256, EngineError>;

    /// `eth_call`. A revert surfaces as [`EngineError::Reverted`].
    async fn static_call(&self, call: StaticCall) -> Result<Bytes, EngineError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, EngineError>;

    /// `None` while the transaction is not mined yet.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptFields>, EngineError>;

    fn description(&self) -> &str;
}
