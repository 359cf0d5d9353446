use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, Bytes, Selector, TxHash, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::contracts::execution::traits::{EngineError, ExecutionEngine, StaticCall};
use crate::models::ReceiptFields;

/// In-memory engine for tests. Records every call by RPC method name.
pub struct MockExecutor {
    chain_id: u64,
    calls: Mutex<Vec<&'static str>>,
    views: Mutex<HashMap<Selector, Result<Bytes, EngineError>>>,
    sent: Mutex<Vec<Bytes>>,
    receipts: Mutex<HashMap<TxHash, ReceiptFields>>,
    mine_on_send: Option<bool>,
    send_error: Option<EngineError>,
    gas_price: u128,
    balance: U256,
}

pub fn selector_of(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

impl MockExecutor {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            calls: Mutex::new(Vec::new()),
            views: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            receipts: Mutex::new(HashMap::new()),
            mine_on_send: None,
            send_error: None,
            gas_price: 1_000_000_000,
            balance: U256::ZERO,
        }
    }

    /// Every broadcast transaction gets a receipt with `status` immediately.
    pub fn mining(mut self, status: bool) -> Self {
        self.mine_on_send = Some(status);
        self
    }

    pub fn failing_send(mut self, error: EngineError) -> Self {
        self.send_error = Some(error);
        self
    }

    pub fn with_balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    /// Answer `eth_call`s to `signature` (e.g. `"previewWithdraw(address)"`).
    pub fn on_call(&self, signature: &str, outputs: Vec<DynSolValue>) {
        let data = DynSolValue::Tuple(outputs).abi_encode_params();
        self.views
            .lock()
            .unwrap()
            .insert(selector_of(signature), Ok(Bytes::from(data)));
    }

    pub fn revert_on(&self, signature: &str, reason: &str) {
        self.views
            .lock()
            .unwrap()
            .insert(selector_of(signature), Err(EngineError::Reverted(reason.to_string())));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| **m == method).count()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }
}

#[async_trait]
impl ExecutionEngine for MockExecutor {
    async fn chain_id(&self) -> Result<u64, EngineError> {
        self.record("eth_chainId");
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> Result<u64, EngineError> {
        self.record("eth_blockNumber");
        Ok(100 + self.sent.lock().unwrap().len() as u64)
    }

    async fn next_nonce(&self, _account: Address) -> Result<u64, EngineError> {
        self.record("eth_getTransactionCount");
        Ok(self.sent.lock().unwrap().len() as u64)
    }

    async fn gas_price(&self) -> Result<u128, EngineError> {
        self.record("eth_gasPrice");
        Ok(self.gas_price)
    }

    async fn balance(&self, _account: Address) -> Result<U256, EngineError> {
        self.record("eth_getBalance");
        Ok(self.balance)
    }

    async fn static_call(&self, call: StaticCall) -> Result<Bytes, EngineError> {
        self.record("eth_call");
        if call.data.len() < 4 {
            return Err(EngineError::Rpc("call data shorter than a selector".to_string()));
        }
        let selector = Selector::from_slice(&call.data[..4]);
        self.views
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .unwrap_or_else(|| Err(EngineError::Rpc(format!("no mock response for 0x{}", hex::encode(selector)))))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, EngineError> {
        self.record("eth_sendRawTransaction");
        if let Some(error) = &self.send_error {
            return Err(error.clone());
        }

        let hash = keccak256(&raw);
        let mut sent = self.sent.lock().unwrap();
        sent.push(raw);
        if let Some(status) = self.mine_on_send {
            self.receipts.lock().unwrap().insert(
                hash,
                ReceiptFields {
                    transaction_hash: hash,
                    status,
                    block_number: Some(100 + sent.len() as u64),
                    gas_used: 21_000,
                    cumulative_gas_used: 21_000,
                },
            );
        }
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<ReceiptFields>, EngineError> {
        self.record("eth_getTransactionReceipt");
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    fn description(&self) -> &str {
        "MockExecutor"
    }
}
