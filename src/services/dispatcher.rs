use alloy::dyn_abi::DynSolValue;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256, U64};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ReceiptConfig;
use crate::contracts::encoding::CallDataEncoder;
use crate::contracts::execution::{ExecutionEngine, StaticCall};
use crate::models::{
    CallSpec, DispatchError, FeeParams, FeePricing, PendingCommand, PendingTx, Role, SessionContext, Signer,
    TxResult, UnsignedTx, WalletCommand, WalletInfo, WalletOutcome, WalletRequest, SEND_TRANSACTION_ACTION,
};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolicy {
    /// Wait applied right after a local broadcast. Zero returns immediately.
    pub wait_after_send: Duration,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl ReceiptPolicy {
    pub fn from_config(config: &ReceiptConfig) -> Self {
        Self {
            wait_after_send: Duration::from_secs(config.wait_after_send_seconds),
            poll_interval: Duration::from_millis(config.poll_interval_millis).max(MIN_POLL_INTERVAL),
            max_wait: Duration::from_secs(config.max_wait_seconds),
        }
    }
}

/// Result of feeding a wallet outcome back into a session slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reconciliation", rename_all = "snake_case")]
pub enum Reconciliation {
    /// Sequence does not match the slot's latest command. Nothing changed.
    Stale { expected: Option<u64>, received: u64 },
    /// Same sequence delivered again after the slot was already resolved.
    Duplicate { sequence: u64 },
    Transaction { result: TxResult },
    Command { wallet: WalletInfo, status: Option<String> },
    CommandFailed { error: DispatchError },
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainStatus {
    pub chain_id: u64,
    pub expected_chain_id: u64,
    pub block_number: u64,
}

/// Turns contract calls into signed broadcasts or wallet requests.
///
/// Nothing is retried here. Every failure surfaces once as `TxResult::Failed`
/// and the caller decides what to do next.
pub struct TransactionDispatcher {
    engine: Arc<dyn ExecutionEngine>,
    encoder: Arc<dyn CallDataEncoder>,
    chain_id: u64,
    receipts: ReceiptPolicy,
}

impl TransactionDispatcher {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        encoder: Arc<dyn CallDataEncoder>,
        chain_id: u64,
        receipts: ReceiptPolicy,
    ) -> Self {
        info!("🏭 Initializing TransactionDispatcher");
        info!("  Engine: {}", engine.description());
        info!("  Encoder: {}", encoder.description());
        info!("  Chain ID: {}", chain_id);
        Self {
            engine,
            encoder,
            chain_id,
            receipts,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn receipt_policy(&self) -> ReceiptPolicy {
        self.receipts
    }

    pub fn supports(&self, call: &CallSpec) -> bool {
        self.encoder.supports(call)
    }

    /// Dispatch a state-changing call as `role`.
    ///
    /// A missing signer fails before any RPC. Local signers get a fresh
    /// pending nonce, a simulation and a broadcast. Delegated signers get an
    /// unsigned request parked in `slot` under a newly minted sequence.
    pub async fn dispatch(
        &self,
        session: &mut SessionContext,
        slot: &str,
        call: &CallSpec,
        role: Role,
        fees: &FeeParams,
    ) -> TxResult {
        let signer = match session.signer(role).cloned() {
            Some(signer) => signer,
            None => {
                warn!("⚠️ {} requested without a {} signer", call.description, role);
                return TxResult::failed(DispatchError::SignerUnavailable { role });
            }
        };

        if fees.gas_limit == 0 {
            return TxResult::failed(DispatchError::InvalidInput("gas limit must be greater than zero".to_string()));
        }

        let call_data = match self.encoder.encode_call(call) {
            Ok(data) => data,
            Err(e) => return TxResult::failed(e),
        };

        info!("🚀 Dispatching {} as {} ({})", call.description, role, signer.mode());
        match signer {
            Signer::Local(key) => match self.send_local(&key, call, call_data, fees).await {
                Ok(result) => result,
                Err(e) => {
                    error!("❌ {} failed: {}", call.description, e);
                    TxResult::failed(e)
                }
            },
            Signer::Delegated(from) => self.park_for_wallet(session, slot, call, call_data, from, fees),
        }
    }

    async fn send_local(
        &self,
        key: &PrivateKeySigner,
        call: &CallSpec,
        call_data: Bytes,
        fees: &FeeParams,
    ) -> Result<TxResult, DispatchError> {
        let from = key.address();
        let value = call.attached_value();

        let nonce = self.engine.next_nonce(from).await?;

        self.engine
            .static_call(StaticCall {
                to: call.contract.address,
                from: Some(from),
                data: call_data.clone(),
                value,
            })
            .await?;
        debug!("✅ Simulation passed for {}", call.description);

        let mut request = TransactionRequest::default()
            .with_from(from)
            .with_to(call.contract.address)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id)
            .with_value(value)
            .with_gas_limit(fees.gas_limit)
            .with_input(call_data);

        match fees.pricing {
            FeePricing::Legacy { gas_price } => request.set_gas_price(gas_price),
            FeePricing::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                request.set_max_fee_per_gas(max_fee_per_gas);
                request.set_max_priority_fee_per_gas(max_priority_fee_per_gas);
            }
            FeePricing::Network => request.set_gas_price(self.engine.gas_price().await?),
        }

        let wallet = EthereumWallet::from(key.clone());
        let envelope = request
            .build(&wallet)
            .await
            .map_err(|e| DispatchError::InvalidInput(format!("cannot sign {}: {}", call.description, e)))?;
        let raw = Bytes::from(envelope.encoded_2718());

        let hash = self.engine.send_raw_transaction(raw).await?;
        info!("✅ {} sent: {} (nonce {})", call.description, hash, nonce);

        if self.receipts.wait_after_send.is_zero() {
            return Ok(TxResult::Sent {
                transaction_hash: hash,
                receipt: None,
            });
        }

        // A receipt that is slow to appear does not undo the broadcast.
        match self.wait_for_receipt(hash, self.receipts.wait_after_send).await {
            TxResult::Sent { receipt, .. } => Ok(TxResult::Sent {
                transaction_hash: hash,
                receipt,
            }),
            _ => Ok(TxResult::Sent {
                transaction_hash: hash,
                receipt: None,
            }),
        }
    }

    fn park_for_wallet(
        &self,
        session: &mut SessionContext,
        slot: &str,
        call: &CallSpec,
        call_data: Bytes,
        from: Address,
        fees: &FeeParams,
    ) -> TxResult {
        let request = WalletRequest {
            tx_request: UnsignedTx {
                from: Some(from),
                to: call.contract.address,
                data: call_data,
                value: call.attached_value(),
                gas: Some(U64::from(fees.gas_limit)),
                chain_id: U64::from(self.chain_id),
            },
            action: SEND_TRANSACTION_ACTION.to_string(),
            chain_id: self.chain_id,
            from: Some(from),
            hint: call.description.clone(),
        };

        let sequence = session.mint_sequence(slot);
        session.set_pending(
            slot,
            PendingCommand {
                sequence,
                command: WalletCommand::SendTransaction {
                    request: request.clone(),
                },
            },
        );
        info!("⏳ {} waiting on wallet (slot {}, sequence {})", call.description, slot, sequence);

        TxResult::Pending(PendingTx {
            slot: slot.to_string(),
            sequence,
            request,
        })
    }

    /// Issue a non-transaction wallet command in `slot`, superseding anything
    /// pending there.
    pub fn issue_command(&self, session: &mut SessionContext, slot: &str, command: WalletCommand) -> PendingCommand {
        let sequence = session.mint_sequence(slot);
        let pending = PendingCommand { sequence, command };
        session.set_pending(slot, pending.clone());
        info!("📨 Wallet command issued (slot {}, sequence {})", slot, sequence);
        pending
    }

    /// Resolve a parked transaction with what the wallet reported. `None`
    /// when the outcome belongs to another sequence.
    pub fn reconcile(pending: &PendingTx, outcome: &WalletOutcome) -> Option<TxResult> {
        if outcome.command_sequence != pending.sequence {
            debug!(
                "Ignoring stale wallet outcome {} for slot {} (pending {})",
                outcome.command_sequence, pending.slot, pending.sequence
            );
            return None;
        }

        if let Some(error) = outcome.error.as_deref().filter(|e| !e.is_empty()) {
            return Some(TxResult::failed(DispatchError::WalletRejected(error.to_string())));
        }

        let result = match outcome.tx_hash.as_deref() {
            Some(raw) => match raw.trim().parse::<TxHash>() {
                Ok(hash) => TxResult::Sent {
                    transaction_hash: hash,
                    receipt: None,
                },
                Err(_) => TxResult::failed(DispatchError::WalletRejected(format!(
                    "wallet returned an invalid transaction hash: {}",
                    raw
                ))),
            },
            None => TxResult::failed(DispatchError::WalletRejected(
                "wallet returned neither a transaction hash nor an error".to_string(),
            )),
        };
        Some(result)
    }

    /// Apply a wallet outcome to the session slot it was issued for.
    pub fn reconcile_slot(&self, session: &mut SessionContext, slot: &str, outcome: &WalletOutcome) -> Reconciliation {
        let expected = session.last_issued(slot);
        if expected != Some(outcome.command_sequence) {
            debug!(
                "Stale wallet outcome for slot {}: got {}, expected {:?}",
                slot, outcome.command_sequence, expected
            );
            return Reconciliation::Stale {
                expected,
                received: outcome.command_sequence,
            };
        }

        let pending = match session.slot(slot).and_then(|state| state.pending.clone()) {
            Some(pending) => pending,
            None => {
                return Reconciliation::Duplicate {
                    sequence: outcome.command_sequence,
                }
            }
        };

        let reconciliation = match pending.command {
            WalletCommand::SendTransaction { request } => {
                let parked = PendingTx {
                    slot: slot.to_string(),
                    sequence: pending.sequence,
                    request,
                };
                match Self::reconcile(&parked, outcome) {
                    Some(result) => Reconciliation::Transaction { result },
                    None => Reconciliation::Stale {
                        expected,
                        received: outcome.command_sequence,
                    },
                }
            }
            WalletCommand::Connect | WalletCommand::SwitchNetwork { .. } => {
                match outcome.error.as_deref().filter(|e| !e.is_empty()) {
                    Some(error) => Reconciliation::CommandFailed {
                        error: DispatchError::WalletRejected(error.to_string()),
                    },
                    None => Reconciliation::Command {
                        wallet: WalletInfo::default(),
                        status: outcome.status.clone(),
                    },
                }
            }
        };

        session.complete_slot(slot, outcome);
        info!("🔁 Slot {} resolved by sequence {}", slot, outcome.command_sequence);

        match reconciliation {
            Reconciliation::Command { status, .. } => Reconciliation::Command {
                wallet: session.wallet().clone(),
                status,
            },
            other => other,
        }
    }

    /// Poll for a receipt for at most `timeout`. Dropping the future cancels
    /// the poll. A timeout is `Failed(ReceiptTimeout)` and may be retried.
    pub async fn wait_for_receipt(&self, hash: TxHash, timeout: Duration) -> TxResult {
        let timeout = timeout.min(self.receipts.max_wait);
        let poll_interval = self.receipts.poll_interval;
        let engine = self.engine.clone();

        let poll = async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                ticker.tick().await;
                match engine.transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => debug!("Receipt for {} not available yet", hash),
                    Err(e) => warn!("⚠️ Receipt poll for {} failed: {}", hash, e),
                }
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(receipt) => {
                if !receipt.status {
                    warn!("⚠️ Transaction {} reverted in block {:?}", hash, receipt.block_number);
                }
                TxResult::Sent {
                    transaction_hash: hash,
                    receipt: Some(receipt),
                }
            }
            Err(_) => {
                info!("⏳ Receipt for {} not available after {:?}", hash, timeout);
                TxResult::failed(DispatchError::ReceiptTimeout(hash))
            }
        }
    }

    /// Read-only call decoded against the ABI. Single tuple outputs are
    /// flattened into their fields.
    pub async fn read(&self, call: &CallSpec) -> Result<Vec<DynSolValue>, DispatchError> {
        let data = self.encoder.encode_call(call)?;
        let output = self
            .engine
            .static_call(StaticCall {
                to: call.contract.address,
                from: None,
                data,
                value: U256::ZERO,
            })
            .await?;

        let mut values = self.encoder.decode_output(call, &output)?;
        if values.len() == 1 {
            if let DynSolValue::Tuple(_) = &values[0] {
                if let Some(DynSolValue::Tuple(fields)) = values.pop() {
                    return Ok(fields);
                }
            }
        }
        Ok(values)
    }

    pub async fn balance(&self, account: Address) -> Result<U256, DispatchError> {
        Ok(self.engine.balance(account).await?)
    }

    pub async fn chain_status(&self) -> Result<ChainStatus, DispatchError> {
        let chain_id = self.engine.chain_id().await?;
        let block_number = self.engine.block_number().await?;
        if chain_id != self.chain_id {
            warn!("⚠️ RPC reports chain {} but {} is configured", chain_id, self.chain_id);
        }
        Ok(ChainStatus {
            chain_id,
            expected_chain_id: self.chain_id,
            block_number,
        })
    }
}
