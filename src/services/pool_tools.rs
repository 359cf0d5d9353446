use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{AppConfig, AssetConfig, GasConfig};
use crate::contracts::units::{from_base_units, parse_address, parse_positive_amount};
use crate::models::{
    CallSpec, ContractKind, ContractRef, DispatchError, FeeParams, Role, SessionContext, ToolResponse,
};
use crate::services::dispatcher::TransactionDispatcher;

/// Deployed contracts the tools talk to.
#[derive(Debug, Clone, Copy)]
pub struct PoolContracts {
    pub lending_pool: Address,
    pub trust_mint_sbt: Option<Address>,
    pub asset_token: Option<Address>,
}

impl PoolContracts {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let optional = |raw: &Option<String>, name: &str| -> Result<Option<Address>> {
            match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => Ok(Some(
                    raw.parse()
                        .map_err(|e| anyhow::anyhow!("Invalid {} address '{}': {}", name, raw, e))?,
                )),
                None => Ok(None),
            }
        };

        Ok(Self {
            lending_pool: config.contracts.lending_pool.trim().parse().map_err(|e| {
                anyhow::anyhow!("Invalid LendingPool address '{}': {}", config.contracts.lending_pool, e)
            })?,
            trust_mint_sbt: optional(&config.contracts.trust_mint_sbt, "TrustMint SBT")?,
            asset_token: optional(&config.contracts.asset_token, "asset token")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LoanSnapshot {
    active: bool,
    principal: U256,
    outstanding: U256,
    start_time: U256,
    due_time: U256,
    banned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LenderSnapshot {
    total_deposited: U256,
    total_withdrawn: U256,
    balance: U256,
    unlockable: U256,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LenderStatusView {
    lender: Address,
    total_deposited: String,
    total_withdrawn: String,
    current_balance: String,
    current_balance_human: String,
    unlockable: String,
    unlockable_human: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoanView {
    borrower: Address,
    principal: String,
    outstanding: String,
    outstanding_human: String,
    start_time: String,
    due_time: String,
    active: bool,
    banned: bool,
}

/// LendingPool tool runner. Each method maps one dashboard tool to reads
/// and, for writes, a single dispatched transaction.
///
/// Pool amounts (deposits, principal, repayments) are native-currency units
/// and use `native_decimals`.
pub struct LendingPoolTools {
    dispatcher: Arc<TransactionDispatcher>,
    pool: ContractRef,
    sbt: Option<ContractRef>,
    token: Option<ContractRef>,
    gas: GasConfig,
    assets: AssetConfig,
}

impl LendingPoolTools {
    pub fn new(dispatcher: Arc<TransactionDispatcher>, contracts: PoolContracts, gas: GasConfig, assets: AssetConfig) -> Self {
        info!("🧰 Lending pool tools ready for {}", contracts.lending_pool);
        Self {
            dispatcher,
            pool: ContractRef::new(ContractKind::LendingPool, contracts.lending_pool),
            sbt: contracts
                .trust_mint_sbt
                .map(|address| ContractRef::new(ContractKind::TrustMintSbt, address)),
            token: contracts
                .asset_token
                .map(|address| ContractRef::new(ContractKind::AssetToken, address)),
            gas,
            assets,
        }
    }

    fn native(&self, units: U256) -> String {
        from_base_units(units, self.assets.native_decimals).unwrap_or_else(|_| units.to_string())
    }

    fn pool_call(&self, function: &str) -> CallSpec {
        CallSpec::new(self.pool, function)
    }

    async fn read_pool(&self, call: CallSpec) -> Result<Vec<DynSolValue>, DispatchError> {
        self.dispatcher.read(&call).await
    }

    async fn read_uint(&self, call: CallSpec) -> Result<U256, DispatchError> {
        let values = self.read_pool(call).await?;
        uint_at(&values, 0)
    }

    async fn read_bool(&self, call: CallSpec) -> Result<bool, DispatchError> {
        let values = self.read_pool(call).await?;
        bool_at(&values, 0)
    }

    async fn submit(&self, session: &mut SessionContext, role: Role, call: CallSpec) -> ToolResponse {
        let fees = match FeeParams::from_config(&self.gas) {
            Ok(fees) => fees,
            Err(e) => return e.into(),
        };
        let slot = call.function.clone();
        self.dispatcher.dispatch(session, &slot, &call, role, &fees).await.into()
    }

    fn require_signer(session: &SessionContext, role: Role) -> Result<Address, DispatchError> {
        session
            .signer(role)
            .map(|signer| signer.address())
            .ok_or(DispatchError::SignerUnavailable { role })
    }

    async fn loan_status(&self, borrower: Address) -> Result<LoanSnapshot, DispatchError> {
        let status = self.pool_call("loanStatus").arg(DynSolValue::Address(borrower));
        if self.dispatcher.supports(&status) {
            let values = self.read_pool(status).await?;
            return Ok(LoanSnapshot {
                active: bool_at(&values, 0)?,
                principal: uint_at(&values, 1)?,
                outstanding: uint_at(&values, 2)?,
                start_time: uint_at(&values, 3)?,
                due_time: uint_at(&values, 4)?,
                banned: bool_at(&values, 5)?,
            });
        }

        let loan = self
            .read_pool(self.pool_call("getLoan").arg(DynSolValue::Address(borrower)))
            .await?;
        let banned = self
            .read_bool(self.pool_call("isBanned").arg(DynSolValue::Address(borrower)))
            .await?;
        Ok(LoanSnapshot {
            principal: uint_at(&loan, 0)?,
            outstanding: uint_at(&loan, 1)?,
            start_time: uint_at(&loan, 2)?,
            due_time: uint_at(&loan, 3)?,
            active: bool_at(&loan, 4)?,
            banned,
        })
    }

    async fn lender_position(&self, lender: Address) -> Result<LenderSnapshot, DispatchError> {
        let status = self.pool_call("lenderStatus").arg(DynSolValue::Address(lender));
        if self.dispatcher.supports(&status) {
            let values = self.read_pool(status).await?;
            return Ok(LenderSnapshot {
                total_deposited: uint_at(&values, 0)?,
                total_withdrawn: uint_at(&values, 1)?,
                balance: uint_at(&values, 2)?,
                unlockable: uint_at(&values, 3)?,
            });
        }

        let lender_arg = DynSolValue::Address(lender);
        Ok(LenderSnapshot {
            total_deposited: self
                .read_uint(self.pool_call("totalDeposited").arg(lender_arg.clone()))
                .await?,
            total_withdrawn: self
                .read_uint(self.pool_call("totalWithdrawn").arg(lender_arg.clone()))
                .await?,
            balance: self
                .read_uint(self.pool_call("lenderBalance").arg(lender_arg.clone()))
                .await?,
            unlockable: self.read_uint(self.pool_call("previewWithdraw").arg(lender_arg)).await?,
        })
    }

    fn outstanding_rejection(&self, outstanding: U256) -> DispatchError {
        DispatchError::PolicyRejected(format!(
            "Cannot open loan: borrower has an active loan outstanding ({} native units).",
            self.native(outstanding)
        ))
    }

    /// Local gate before `openLoan`. Uses the pool's own `canOpenLoan` when
    /// the ABI has it.
    async fn ensure_can_open_loan(&self, borrower: Address, principal: U256) -> Result<(), DispatchError> {
        let checker = self
            .pool_call("canOpenLoan")
            .arg(DynSolValue::Address(borrower))
            .arg(DynSolValue::Uint(principal, 256));

        if self.dispatcher.supports(&checker) {
            let values = self
                .read_pool(checker)
                .await
                .map_err(|e| DispatchError::PolicyRejected(format!("Cannot open loan: Unable to evaluate loan conditions: {}", e)))?;
            if bool_at(&values, 0)? {
                return Ok(());
            }
            let reason = values
                .get(1)
                .map(render_reason)
                .unwrap_or_else(|| "rejected by pool".to_string());
            if reason.to_lowercase().contains("active loan") {
                if let Ok(loan) = self.loan_status(borrower).await {
                    return Err(self.outstanding_rejection(loan.outstanding));
                }
            }
            return Err(DispatchError::PolicyRejected(format!("Cannot open loan: {}", reason)));
        }

        let loan = self
            .loan_status(borrower)
            .await
            .map_err(|_| DispatchError::PolicyRejected("Cannot open loan: Unable to read loan status".to_string()))?;
        if loan.banned {
            return Err(DispatchError::PolicyRejected("Cannot open loan: Borrower is banned".to_string()));
        }
        if loan.active && !loan.outstanding.is_zero() {
            return Err(self.outstanding_rejection(loan.outstanding));
        }

        let available = self
            .read_uint(self.pool_call("availableLiquidity"))
            .await
            .map_err(|e| DispatchError::PolicyRejected(format!("Cannot open loan: Unable to evaluate loan conditions: {}", e)))?;
        if available < principal {
            return Err(DispatchError::PolicyRejected(
                "Cannot open loan: Insufficient pool liquidity".to_string(),
            ));
        }
        Ok(())
    }

    // ---- views ----

    pub async fn available_liquidity(&self) -> ToolResponse {
        match self.read_uint(self.pool_call("availableLiquidity")).await {
            Ok(amount) => ToolResponse::success(json!({
                "availableLiquidity": amount.to_string(),
                "availableLiquidityHuman": self.native(amount),
            })),
            Err(e) => read_failed(e),
        }
    }

    pub async fn lender_balance(&self, lender: &str) -> ToolResponse {
        let lender = match parse_address(lender) {
            Ok(lender) => lender,
            Err(e) => return e.into(),
        };
        match self
            .read_uint(self.pool_call("lenderBalance").arg(DynSolValue::Address(lender)))
            .await
        {
            Ok(balance) => ToolResponse::success(json!({
                "lender": lender,
                "balance": balance.to_string(),
                "balanceHuman": self.native(balance),
            })),
            Err(e) => read_failed(e),
        }
    }

    pub async fn lender_status(&self, lender: &str) -> ToolResponse {
        let lender = match parse_address(lender) {
            Ok(lender) => lender,
            Err(_) => return ToolResponse::error("Invalid lender address supplied."),
        };
        match self.lender_position(lender).await {
            Ok(position) => to_response(&LenderStatusView {
                lender,
                total_deposited: position.total_deposited.to_string(),
                total_withdrawn: position.total_withdrawn.to_string(),
                current_balance: position.balance.to_string(),
                current_balance_human: self.native(position.balance),
                unlockable: position.unlockable.to_string(),
                unlockable_human: self.native(position.unlockable),
            }),
            Err(e) => {
                warn!("⚠️ lenderStatus for {} failed: {}", lender, e);
                ToolResponse::error("Unable to read lender status; ensure contract is upgraded.")
            }
        }
    }

    pub async fn get_loan(&self, borrower: &str) -> ToolResponse {
        let borrower = match parse_address(borrower) {
            Ok(borrower) => borrower,
            Err(e) => return e.into(),
        };
        match self.loan_status(borrower).await {
            Ok(loan) => to_response(&LoanView {
                borrower,
                principal: loan.principal.to_string(),
                outstanding: loan.outstanding.to_string(),
                outstanding_human: self.native(loan.outstanding),
                start_time: loan.start_time.to_string(),
                due_time: loan.due_time.to_string(),
                active: loan.active,
                banned: loan.banned,
            }),
            Err(e) => {
                warn!("⚠️ Loan status for {} failed: {}", borrower, e);
                ToolResponse::error("Unable to read loan status for borrower.")
            }
        }
    }

    pub async fn is_banned(&self, borrower: &str) -> ToolResponse {
        let borrower = match parse_address(borrower) {
            Ok(borrower) => borrower,
            Err(e) => return e.into(),
        };
        match self
            .read_bool(self.pool_call("isBanned").arg(DynSolValue::Address(borrower)))
            .await
        {
            Ok(banned) => ToolResponse::success(json!({ "borrower": borrower, "banned": banned })),
            Err(e) => read_failed(e),
        }
    }

    pub async fn credit_score(&self, account: &str) -> ToolResponse {
        let Some(sbt) = self.sbt else {
            return ToolResponse::error("TrustMint SBT address not configured (set TRUSTMINT_SBT_ADDRESS).");
        };
        let account = match parse_address(account) {
            Ok(account) => account,
            Err(e) => return e.into(),
        };

        let call = CallSpec::new(sbt, "scores").arg(DynSolValue::Address(account));
        match self.dispatcher.read(&call).await {
            Ok(values) => {
                let score = values.first().map(render_value).unwrap_or(Value::Null);
                let details: Vec<Value> = values.iter().skip(1).map(render_value).collect();
                ToolResponse::success(json!({
                    "account": account,
                    "score": score,
                    "details": details,
                }))
            }
            Err(e) => read_failed(e),
        }
    }

    pub async fn wallet_balance(&self, account: &str) -> ToolResponse {
        let account = match parse_address(account) {
            Ok(account) => account,
            Err(e) => return e.into(),
        };
        match self.dispatcher.balance(account).await {
            Ok(balance) => ToolResponse::success(json!({
                "account": account,
                "balance": balance.to_string(),
                "balanceHuman": self.native(balance),
            })),
            Err(e) => read_failed(e),
        }
    }

    pub async fn token_balance(&self, account: &str) -> ToolResponse {
        let Some(token) = self.token else {
            return ToolResponse::error("Asset token address not configured.");
        };
        let account = match parse_address(account) {
            Ok(account) => account,
            Err(e) => return e.into(),
        };

        let call = CallSpec::new(token, "balanceOf").arg(DynSolValue::Address(account));
        match self.dispatcher.read(&call).await.and_then(|values| uint_at(&values, 0)) {
            Ok(balance) => ToolResponse::success(json!({
                "account": account,
                "balance": balance.to_string(),
                "balanceHuman": from_base_units(balance, self.assets.token_decimals)
                    .unwrap_or_else(|_| balance.to_string()),
            })),
            Err(e) => read_failed(e),
        }
    }

    // ---- writes ----

    pub async fn deposit(&self, session: &mut SessionContext, amount: &str) -> ToolResponse {
        let units = match parse_positive_amount(amount, self.assets.native_decimals) {
            Ok(units) => units,
            Err(e) => return e.into(),
        };
        let call = self
            .pool_call("deposit")
            .arg(DynSolValue::Uint(units, 256))
            .with_value(units)
            .describe(format!("Deposit {} native units into the pool.", self.native(units)));
        self.submit(session, Role::Lender, call).await
    }

    pub async fn withdraw(&self, session: &mut SessionContext, amount: &str) -> ToolResponse {
        let units = match parse_positive_amount(amount, self.assets.native_decimals) {
            Ok(units) => units,
            Err(e) => return e.into(),
        };
        let lender = match Self::require_signer(session, Role::Lender) {
            Ok(lender) => lender,
            Err(e) => return e.into(),
        };

        match self.lender_position(lender).await {
            Ok(position) if units > position.unlockable => {
                return DispatchError::PolicyRejected(format!(
                    "Requested withdrawal exceeds unlocked balance ({} available).",
                    self.native(position.unlockable)
                ))
                .into();
            }
            Ok(_) => {}
            Err(e) => warn!("⚠️ Unlockable balance for {} unavailable, skipping pre-check: {}", lender, e),
        }

        let call = self
            .pool_call("withdraw")
            .arg(DynSolValue::Uint(units, 256))
            .describe("Withdraw unlocked funds from the pool.");
        self.submit(session, Role::Lender, call).await
    }

    pub async fn open_loan(
        &self,
        session: &mut SessionContext,
        borrower: &str,
        principal: &str,
        term_seconds: u64,
    ) -> ToolResponse {
        let borrower = match parse_address(borrower) {
            Ok(borrower) => borrower,
            Err(_) => return ToolResponse::error("Invalid borrower address supplied."),
        };
        let principal = match parse_positive_amount(principal, self.assets.native_decimals) {
            Ok(principal) => principal,
            Err(e) => return e.into(),
        };
        if let Err(e) = Self::require_signer(session, Role::Owner) {
            return e.into();
        }
        if let Err(e) = self.ensure_can_open_loan(borrower, principal).await {
            info!("🚫 openLoan for {} refused: {}", borrower, e);
            return e.into();
        }

        let call = self
            .pool_call("openLoan")
            .arg(DynSolValue::Address(borrower))
            .arg(DynSolValue::Uint(principal, 256))
            .arg(DynSolValue::Uint(U256::from(term_seconds), 256))
            .describe(format!("Open a {} native unit loan for {}.", self.native(principal), borrower));
        self.submit(session, Role::Owner, call).await
    }

    /// Full payoff only: the whole outstanding amount is attached as value.
    pub async fn repay(&self, session: &mut SessionContext) -> ToolResponse {
        let borrower = match Self::require_signer(session, Role::Borrower) {
            Ok(borrower) => borrower,
            Err(e) => return e.into(),
        };

        let loan = match self.loan_status(borrower).await {
            Ok(loan) => loan,
            Err(e) => {
                warn!("⚠️ Loan status for {} failed: {}", borrower, e);
                return ToolResponse::error("Unable to read borrower loan status; ensure contract is upgraded.");
            }
        };
        if loan.banned {
            return DispatchError::PolicyRejected("Borrower is banned; repay unavailable until unbanned.".to_string())
                .into();
        }
        if !loan.active || loan.outstanding.is_zero() {
            return DispatchError::PolicyRejected("No active loan to repay.".to_string()).into();
        }

        let call = self
            .pool_call("repay")
            .arg(DynSolValue::Uint(loan.outstanding, 256))
            .with_value(loan.outstanding)
            .describe(format!(
                "Repay outstanding balance ({} in native units).",
                self.native(loan.outstanding)
            ));
        self.submit(session, Role::Borrower, call).await
    }

    pub async fn check_default_and_ban(&self, session: &mut SessionContext, borrower: &str) -> ToolResponse {
        let borrower = match parse_address(borrower) {
            Ok(borrower) => borrower,
            Err(_) => return ToolResponse::error("Invalid borrower address supplied."),
        };
        let call = self
            .pool_call("checkDefaultAndBan")
            .arg(DynSolValue::Address(borrower))
            .describe("Check default and ban overdue borrower.");
        self.submit(session, Role::Owner, call).await
    }

    pub async fn set_deposit_lock_seconds(&self, session: &mut SessionContext, seconds: u64) -> ToolResponse {
        let call = self
            .pool_call("setDepositLockSeconds")
            .arg(DynSolValue::Uint(U256::from(seconds), 256))
            .describe("Update deposit lock duration.");
        self.submit(session, Role::Owner, call).await
    }

    /// The zero address disables score gating.
    pub async fn set_trust_mint_sbt(&self, session: &mut SessionContext, sbt: &str) -> ToolResponse {
        let sbt = match parse_address(sbt) {
            Ok(sbt) => sbt,
            Err(_) => return ToolResponse::error("Invalid SBT address supplied."),
        };
        let call = self
            .pool_call("setTrustMintSbt")
            .arg(DynSolValue::Address(sbt))
            .describe("Set TrustMint SBT address (0x0 to disable).");
        self.submit(session, Role::Owner, call).await
    }

    pub async fn set_min_score_to_borrow(&self, session: &mut SessionContext, new_min_score: u64) -> ToolResponse {
        let call = self
            .pool_call("setMinScoreToBorrow")
            .arg(DynSolValue::Uint(U256::from(new_min_score), 256))
            .describe("Set minimum score for borrowing.");
        self.submit(session, Role::Owner, call).await
    }

    pub async fn unban(&self, session: &mut SessionContext, borrower: &str) -> ToolResponse {
        let borrower = match parse_address(borrower) {
            Ok(borrower) => borrower,
            Err(_) => return ToolResponse::error("Invalid borrower address supplied."),
        };
        let call = self
            .pool_call("unban")
            .arg(DynSolValue::Address(borrower))
            .describe("Unban borrower after remedy.");
        self.submit(session, Role::Owner, call).await
    }
}

fn read_failed(error: DispatchError) -> ToolResponse {
    ToolResponse::error(format!("Read failed: {}", error))
}

fn to_response<T: Serialize>(view: &T) -> ToolResponse {
    match serde_json::to_value(view) {
        Ok(data) => ToolResponse::success(data),
        Err(e) => ToolResponse::error(format!("Unable to encode result: {}", e)),
    }
}

fn uint_at(values: &[DynSolValue], index: usize) -> Result<U256, DispatchError> {
    values
        .get(index)
        .and_then(|value| value.as_uint())
        .map(|(value, _)| value)
        .ok_or_else(|| DispatchError::InvalidInput(format!("expected uint at output {}", index)))
}

fn bool_at(values: &[DynSolValue], index: usize) -> Result<bool, DispatchError> {
    values
        .get(index)
        .and_then(|value| value.as_bool())
        .ok_or_else(|| DispatchError::InvalidInput(format!("expected bool at output {}", index)))
}

/// Revert-style reasons may come back as a string or as padded bytes.
fn render_reason(value: &DynSolValue) -> String {
    match value {
        DynSolValue::String(reason) => reason.clone(),
        DynSolValue::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map(|s| s.trim_end_matches('\0').to_string())
            .unwrap_or_else(|_| hex::encode(bytes)),
        DynSolValue::FixedBytes(word, size) => String::from_utf8(word[..*size].to_vec())
            .map(|s| s.trim_end_matches('\0').to_string())
            .unwrap_or_else(|_| hex::encode(&word[..*size])),
        other => render_value(other).to_string(),
    }
}

fn render_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(flag) => Value::Bool(*flag),
        DynSolValue::Uint(n, _) => Value::String(n.to_string()),
        DynSolValue::Int(n, _) => Value::String(n.to_string()),
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, size) => Value::String(format!("0x{}", hex::encode(&word[..*size]))),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            Value::Array(items.iter().map(render_value).collect())
        }
        other => Value::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignerConfig;
    use crate::contracts::abi::{AbiRegistry, LENDING_POOL_UPGRADE_SIGNATURES};
    use crate::contracts::encoding::AlloyEncoder;
    use crate::contracts::execution::mock_executor::MockExecutor;
    use crate::models::{RoleAddresses, RoleSigners};
    use crate::services::dispatcher::ReceiptPolicy;
    use std::time::Duration;

    const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const LENDER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const BORROWER: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
    const POOL: &str = "0x5FC8d32690cc91D4c39d9d3abcBD16989F875707";
    const SBT: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";
    const TOKEN: &str = "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0";

    fn uint(n: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(n), 256)
    }

    fn tools_with(engine: Arc<MockExecutor>, abi: AbiRegistry) -> LendingPoolTools {
        let encoder = Arc::new(AlloyEncoder::new(Arc::new(abi)));
        let receipts = ReceiptPolicy {
            wait_after_send: Duration::ZERO,
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(1),
        };
        let dispatcher = Arc::new(TransactionDispatcher::new(engine, encoder, 31337, receipts));
        LendingPoolTools::new(
            dispatcher,
            PoolContracts {
                lending_pool: POOL.parse().unwrap(),
                trust_mint_sbt: Some(SBT.parse().unwrap()),
                asset_token: Some(TOKEN.parse().unwrap()),
            },
            GasConfig {
                default_gas_limit: 300_000,
                gas_price_gwei: Some("1".to_string()),
                max_fee_gwei: None,
                max_priority_fee_gwei: None,
            },
            AssetConfig {
                token_decimals: 6,
                native_decimals: 0,
            },
        )
    }

    fn tools(engine: Arc<MockExecutor>) -> LendingPoolTools {
        tools_with(engine, AbiRegistry::new())
    }

    fn session(config: SignerConfig) -> SessionContext {
        SessionContext::new(RoleSigners::resolve(&config, &RoleAddresses::default()))
    }

    fn lender_session() -> SessionContext {
        session(SignerConfig {
            lender_private_key: Some(LENDER_KEY.to_string()),
            ..SignerConfig::default()
        })
    }

    fn owner_session() -> SessionContext {
        session(SignerConfig {
            private_key: Some(OWNER_KEY.to_string()),
            ..SignerConfig::default()
        })
    }

    fn mock_lender_position(engine: &MockExecutor, unlockable: u64) {
        engine.on_call("totalDeposited(address)", vec![uint(100)]);
        engine.on_call("totalWithdrawn(address)", vec![uint(0)]);
        engine.on_call("lenderBalance(address)", vec![uint(100)]);
        engine.on_call("previewWithdraw(address)", vec![uint(unlockable)]);
    }

    #[tokio::test]
    async fn test_withdraw_over_unlockable_is_rejected_without_broadcast() {
        let engine = Arc::new(MockExecutor::new(31337));
        mock_lender_position(&engine, 50);
        let tools = tools(engine.clone());
        let mut session = lender_session();

        let response = tools.withdraw(&mut session, "51").await;

        assert!(!response.is_success());
        assert_eq!(
            response.error_message(),
            Some("Requested withdrawal exceeds unlocked balance (50 available).")
        );
        assert_eq!(engine.count("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn test_withdraw_within_unlockable_is_sent() {
        let engine = Arc::new(MockExecutor::new(31337));
        mock_lender_position(&engine, 50);
        engine.on_call("withdraw(uint256)", vec![]);
        let tools = tools(engine.clone());
        let mut session = lender_session();

        let response = tools.withdraw(&mut session, "50").await;

        assert!(response.is_success(), "{:?}", response);
        assert_eq!(response.data().unwrap()["outcome"], "sent");
        assert_eq!(engine.count("eth_sendRawTransaction"), 1);
    }

    #[tokio::test]
    async fn test_open_loan_with_outstanding_balance_is_refused() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call(
            "getLoan(address)",
            vec![uint(10), uint(10), uint(1_700_000_000), uint(1_700_604_800), DynSolValue::Bool(true)],
        );
        engine.on_call("isBanned(address)", vec![DynSolValue::Bool(false)]);
        engine.on_call("availableLiquidity()", vec![uint(1_000)]);
        let tools = tools(engine.clone());
        let mut session = owner_session();

        let response = tools.open_loan(&mut session, BORROWER, "5", 604_800).await;

        let message = response.error_message().expect("openLoan refused");
        assert!(message.contains("active loan outstanding"), "{}", message);
        assert_eq!(engine.count("eth_getTransactionCount"), 0);
        assert_eq!(engine.count("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn test_open_loan_uses_pool_checker_when_available() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call(
            "canOpenLoan(address,uint256)",
            vec![DynSolValue::Bool(false), DynSolValue::String("Score too low".to_string())],
        );
        let abi = AbiRegistry::new().with_signatures(ContractKind::LendingPool, LENDING_POOL_UPGRADE_SIGNATURES);
        let tools = tools_with(engine.clone(), abi);
        let mut session = owner_session();

        let response = tools.open_loan(&mut session, BORROWER, "5", 604_800).await;

        assert_eq!(response.error_message(), Some("Cannot open loan: Score too low"));
        assert_eq!(engine.count("eth_sendRawTransaction"), 0);
    }

    #[tokio::test]
    async fn test_open_loan_checks_liquidity() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call("getLoan(address)", vec![uint(0), uint(0), uint(0), uint(0), DynSolValue::Bool(false)]);
        engine.on_call("isBanned(address)", vec![DynSolValue::Bool(false)]);
        engine.on_call("availableLiquidity()", vec![uint(4)]);
        let tools = tools(engine.clone());
        let mut session = owner_session();

        let response = tools.open_loan(&mut session, BORROWER, "5", 604_800).await;

        assert_eq!(response.error_message(), Some("Cannot open loan: Insufficient pool liquidity"));
    }

    #[tokio::test]
    async fn test_repay_without_signer_makes_no_calls() {
        let engine = Arc::new(MockExecutor::new(31337));
        let tools = tools(engine.clone());
        let mut session = session(SignerConfig::default());

        let response = tools.repay(&mut session).await;

        let message = response.error_message().unwrap();
        assert!(message.starts_with("Borrower wallet not configured"));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_check_default_and_ban_without_signer_makes_no_calls() {
        let engine = Arc::new(MockExecutor::new(31337));
        let tools = tools(engine.clone());
        let mut session = session(SignerConfig::default());

        let response = tools.check_default_and_ban(&mut session, BORROWER).await;

        assert!(response.error_message().unwrap().starts_with("Owner wallet not configured"));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repay_attaches_full_outstanding_for_delegated_borrower() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call("getLoan(address)", vec![uint(10), uint(12), uint(1), uint(2), DynSolValue::Bool(true)]);
        engine.on_call("isBanned(address)", vec![DynSolValue::Bool(false)]);
        let tools = tools(engine.clone());
        let assigned = RoleAddresses {
            borrower: Some(BORROWER.to_string()),
            ..RoleAddresses::default()
        };
        let mut session = SessionContext::new(RoleSigners::resolve(&SignerConfig::default(), &assigned));

        let response = tools.repay(&mut session).await;

        let data = response.data().expect("pending wallet request");
        assert_eq!(data["outcome"], "pending");
        assert_eq!(data["request"]["tx_request"]["value"], "0xc");
        assert_eq!(data["request"]["hint"], "Repay outstanding balance (12 in native units).");
    }

    #[tokio::test]
    async fn test_repay_refuses_banned_borrower() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call("getLoan(address)", vec![uint(10), uint(12), uint(1), uint(2), DynSolValue::Bool(true)]);
        engine.on_call("isBanned(address)", vec![DynSolValue::Bool(true)]);
        let tools = tools(engine.clone());
        let mut session = session(SignerConfig {
            borrower_private_key: Some(LENDER_KEY.to_string()),
            ..SignerConfig::default()
        });

        let response = tools.repay(&mut session).await;

        assert_eq!(
            response.error_message(),
            Some("Borrower is banned; repay unavailable until unbanned.")
        );
    }

    #[tokio::test]
    async fn test_deposit_rejects_zero_and_junk() {
        let engine = Arc::new(MockExecutor::new(31337));
        let tools = tools(engine.clone());
        let mut session = lender_session();

        let zero = tools.deposit(&mut session, "0").await;
        assert!(zero.error_message().unwrap().contains("greater than zero"));
        let junk = tools.deposit(&mut session, "ten").await;
        assert!(junk.error_message().unwrap().starts_with("Invalid amount"));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_lender_status_falls_back_to_individual_views() {
        let engine = Arc::new(MockExecutor::new(31337));
        mock_lender_position(&engine, 40);
        let tools = tools(engine.clone());

        let response = tools.lender_status("0x70997970C51812dc3A010C7d01b50e0d17dc79C8").await;

        let data = response.data().unwrap();
        assert_eq!(data["totalDeposited"], "100");
        assert_eq!(data["currentBalance"], "100");
        assert_eq!(data["unlockableHuman"], "40");
        assert_eq!(engine.count("eth_call"), 4);
    }

    #[tokio::test]
    async fn test_get_loan_prefers_loan_status() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call(
            "loanStatus(address)",
            vec![DynSolValue::Bool(true), uint(10), uint(7), uint(1), uint(2), DynSolValue::Bool(false)],
        );
        let abi = AbiRegistry::new().with_signatures(ContractKind::LendingPool, LENDING_POOL_UPGRADE_SIGNATURES);
        let tools = tools_with(engine.clone(), abi);

        let response = tools.get_loan(BORROWER).await;

        let data = response.data().unwrap();
        assert_eq!(data["outstanding"], "7");
        assert_eq!(data["active"], true);
        assert_eq!(data["banned"], false);
        assert_eq!(engine.count("eth_call"), 1);
    }

    #[tokio::test]
    async fn test_credit_score_reads_sbt() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call("scores(address)", vec![uint(720), uint(1_700_000_000)]);
        let tools = tools(engine);

        let response = tools.credit_score(BORROWER).await;

        let data = response.data().unwrap();
        assert_eq!(data["score"], "720");
        assert_eq!(data["details"][0], "1700000000");
    }

    #[tokio::test]
    async fn test_view_with_bad_address_is_invalid_address() {
        let engine = Arc::new(MockExecutor::new(31337));
        let tools = tools(engine.clone());

        let response = tools.is_banned("0x1234").await;

        assert!(response.error_message().unwrap().starts_with("Invalid address"));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_balance_reads_native_balance() {
        let engine = Arc::new(MockExecutor::new(31337).with_balance(U256::from(42u64)));
        let tools = tools(engine.clone());

        let response = tools.wallet_balance(BORROWER).await;

        let data = response.data().unwrap();
        assert_eq!(data["balance"], "42");
        assert_eq!(data["balanceHuman"], "42");
        assert_eq!(engine.calls(), vec!["eth_getBalance"]);
    }

    #[tokio::test]
    async fn test_token_balance_uses_token_decimals() {
        let engine = Arc::new(MockExecutor::new(31337));
        engine.on_call("balanceOf(address)", vec![uint(2_500_000)]);
        let tools = tools(engine.clone());

        let response = tools.token_balance(BORROWER).await;

        let data = response.data().unwrap();
        assert_eq!(data["balance"], "2500000");
        assert_eq!(data["balanceHuman"], "2.5");
        assert_eq!(engine.count("eth_call"), 1);
    }

    #[test]
    fn test_render_reason_trims_padded_bytes() {
        let mut word = alloy::primitives::B256::ZERO;
        word[..2].copy_from_slice(b"no");
        assert_eq!(render_reason(&DynSolValue::FixedBytes(word, 32)), "no");
        assert_eq!(render_reason(&DynSolValue::String("ok".into())), "ok");
    }
}
