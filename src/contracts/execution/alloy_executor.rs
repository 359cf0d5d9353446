use alloy::{
    network::{ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    sol_types::{decode_revert_reason, Revert, SolError},
    transports::TransportError,
};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::config::ChainDetails;
use crate::contracts::execution::traits::{EngineError, ExecutionEngine, StaticCall};
use crate::models::ReceiptFields;

/// JSON-RPC engine over HTTP.
pub struct AlloyExecutor {
    provider: DynProvider,
    description: String,
}

impl AlloyExecutor {
    pub fn new(chain: &ChainDetails) -> Result<Self> {
        info!("🔧 Initializing AlloyExecutor");
        let url = chain
            .rpc_url
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid RPC URL '{}': {}", chain.rpc_url, e))?;

        // No fillers: nonce, fees and chain id are set explicitly by the dispatcher.
        let provider = ProviderBuilder::default().connect_http(url).erased();

        info!("✅ AlloyExecutor initialized");
        info!("  RPC URL: {}", chain.rpc_url);
        info!("  Expected chain ID: {}", chain.chain_id);

        Ok(Self {
            provider,
            description: format!("AlloyExecutor: JSON-RPC over HTTP ({})", chain.rpc_url),
        })
    }

    fn classify(&self, operation: &str, err: TransportError) -> EngineError {
        let (message, revert_data) = match err.as_error_resp() {
            Some(payload) => (payload.message.to_string(), payload.as_revert_data()),
            None => (err.to_string(), None),
        };
        let classified = classify_rpc_failure(&message, revert_data.as_ref().map(|data| &data[..]));

        match &classified {
            EngineError::Rpc(_) => error!("❌ {} failed: {}", operation, message),
            _ => warn!("⚠️ {} rejected: {}", operation, message),
        }
        classified
    }
}

const NONCE_CONFLICT_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "already known",
    "replacement transaction underpriced",
];

/// `Error(string)` payloads yield the bare reason. Panics and custom errors
/// keep alloy's rendering.
fn revert_reason(data: &[u8]) -> Option<String> {
    match Revert::abi_decode(data) {
        Ok(revert) => Some(revert.reason),
        Err(_) => decode_revert_reason(data),
    }
}

/// Sorts an RPC failure into revert, nonce conflict or plain transport error.
pub(crate) fn classify_rpc_failure(message: &str, revert_data: Option<&[u8]>) -> EngineError {
    if let Some(reason) = revert_data.and_then(revert_reason) {
        return EngineError::Reverted(reason);
    }

    let lowered = message.to_lowercase();
    if NONCE_CONFLICT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return EngineError::NonceConflict(message.to_string());
    }
    if lowered.contains("revert") {
        let reason = message
            .split_once("execution reverted:")
            .map(|(_, reason)| reason.trim())
            .filter(|reason| !reason.is_empty())
            .unwrap_or(message);
        return EngineError::Reverted(reason.to_string());
    }

    EngineError::Rpc(message.to_string())
}

#[async_trait]
impl ExecutionEngine for AlloyExecutor {
    async fn chain_id(&self) -> Result<u64, EngineError> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| self.classify("eth_chainId", e))
    }

    async fn block_number(&self) -> Result<u64, EngineError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| self.classify("eth_blockNumber", e))
    }

    async fn next_nonce(&self, account: Address) -> Result<u64, EngineError> {
        self.provider
            .get_transaction_count(account)
            .pending()
            .await
            .map_err(|e| self.classify("eth_getTransactionCount", e))
    }

    async fn gas_price(&self) -> Result<u128, EngineError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| self.classify("eth_gasPrice", e))
    }

    async fn balance(&self, account: Address) -> Result<U256, EngineError> {
        self.provider
            .get_balance(account)
            .await
            .map_err(|e| self.classify("eth_getBalance", e))
    }

    async fn static_call(&self, call: StaticCall) -> Result<Bytes, EngineError> {
        debug!("🔍 eth_call to {} ({} bytes)", call.to, call.data.len());

        let mut request = TransactionRequest::default()
            .with_to(call.to)
            .with_input(call.data)
            .with_value(call.value);
        if let Some(from) = call.from {
            request = request.with_from(from);
        }

        self.provider
            .call(request)
            .await
            .map_err(|e| self.classify("eth_call", e))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, EngineError> {
        info!("🚀 Broadcasting raw transaction ({} bytes)", raw.len());
        let pending = self
            .provider
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| self.classify("eth_sendRawTransaction", e))?;

        Ok(*pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptFields>, EngineError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| self.classify("eth_getTransactionReceipt", e))?;

        Ok(receipt.map(|receipt| ReceiptFields {
            transaction_hash: receipt.transaction_hash(),
            status: receipt.status(),
            block_number: receipt.block_number(),
            gas_used: receipt.gas_used(),
            cumulative_gas_used: receipt.cumulative_gas_used(),
        }))
    }

    fn description(&self) -> &str {
        &self.description
    }
}
