use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{DispatchError, SessionContext, ToolResponse};
use crate::services::pool_tools::LendingPoolTools;

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// Tool definition in function-calling format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDefinition,
}

fn define(name: &'static str, description: &'static str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        kind: "function",
        function: FunctionDefinition {
            name,
            description,
            parameters,
        },
    }
}

fn address_param(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { name: { "type": "string", "description": description } },
        "required": [name],
    })
}

fn no_params() -> Value {
    json!({ "type": "object", "properties": {}, "required": [] })
}

fn definitions() -> Vec<ToolDefinition> {
    vec![
        define(
            "availableLiquidity",
            "Read pool's available liquidity.",
            no_params(),
        ),
        define(
            "lenderBalance",
            "Read net balance (deposits - withdrawals) for a lender.",
            address_param("lender_address", "Lender wallet address."),
        ),
        define(
            "lenderStatus",
            "Read aggregated lender metrics (deposited, withdrawn, unlockable).",
            address_param("lender_address", "Lender wallet address."),
        ),
        define(
            "getLoan",
            "Read loan struct for a borrower (principal, outstanding, startTime, dueTime, active, banned).",
            address_param("borrower_address", "Borrower wallet address."),
        ),
        define(
            "isBanned",
            "Check if a borrower is banned due to default.",
            address_param("borrower_address", "Borrower wallet address."),
        ),
        define(
            "creditScore",
            "Read the TrustMint SBT score for an account.",
            address_param("account", "Wallet address."),
        ),
        define(
            "walletBalance",
            "Read the native balance of an address.",
            address_param("account", "Wallet address."),
        ),
        define(
            "tokenBalance",
            "Read the asset token balance of an address.",
            address_param("account", "Wallet address."),
        ),
        define(
            "deposit",
            "Lender: deposit native funds into the LendingPool.",
            json!({
                "type": "object",
                "properties": { "amount": { "type": ["number", "string"], "description": "Amount in human units (e.g., 100)." } },
                "required": ["amount"],
            }),
        ),
        define(
            "withdraw",
            "Lender: withdraw unlocked funds from the LendingPool.",
            json!({
                "type": "object",
                "properties": { "amount": { "type": ["number", "string"], "description": "Amount in human units." } },
                "required": ["amount"],
            }),
        ),
        define(
            "openLoan",
            "Owner-only: open a loan for borrower and transfer principal.",
            json!({
                "type": "object",
                "properties": {
                    "borrower_address": { "type": "string", "description": "Borrower wallet address." },
                    "principal": { "type": ["number", "string"], "description": "Principal in human units (e.g., 50)." },
                    "term_seconds": { "type": "integer", "description": "Loan term in seconds (e.g., 604800 for 7 days)." },
                },
                "required": ["borrower_address", "principal", "term_seconds"],
            }),
        ),
        define(
            "repay",
            "Borrower: repay outstanding loan balance (full payoff only).",
            no_params(),
        ),
        define(
            "checkDefaultAndBan",
            "Check if borrower defaulted and ban if overdue.",
            address_param("borrower_address", "Borrower wallet address."),
        ),
        define(
            "setDepositLockSeconds",
            "Owner-only: set global deposit lock duration in seconds.",
            json!({
                "type": "object",
                "properties": { "seconds": { "type": "integer", "description": "Lock duration in seconds (0 to disable)." } },
                "required": ["seconds"],
            }),
        ),
        define(
            "setTrustMintSbt",
            "Owner-only: set TrustMint SBT address for score gating (0x0 to disable).",
            address_param("sbt_address", "SBT contract address or 0x000... to disable."),
        ),
        define(
            "setMinScoreToBorrow",
            "Owner-only: set minimum score threshold for borrowing.",
            json!({
                "type": "object",
                "properties": { "new_min_score": { "type": "integer", "description": "Minimum score required." } },
                "required": ["new_min_score"],
            }),
        ),
        define(
            "unban",
            "Owner-only: unban a borrower after remedy.",
            address_param("borrower_address", "Borrower wallet address."),
        ),
    ]
}

/// Named entry points over [`LendingPoolTools`] with JSON arguments.
pub struct ToolRegistry {
    tools: Arc<LendingPoolTools>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(tools: Arc<LendingPoolTools>) -> Self {
        let definitions = definitions();
        info!("🧰 Registered {} tools", definitions.len());
        Self { tools, definitions }
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.iter().any(|tool| tool.function.name == name)
    }

    pub async fn invoke(&self, session: &mut SessionContext, name: &str, args: &Value) -> ToolResponse {
        if !self.contains(name) {
            warn!("⚠️ Unknown tool requested: {}", name);
            return ToolResponse::error(format!("Unknown tool: {}", name));
        }

        let empty = Map::new();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return ToolResponse::error("Tool arguments must be a JSON object."),
        };

        info!("🔧 Invoking tool {} for session {}", name, session.id);
        match self.route(session, name, args).await {
            Ok(response) => response,
            Err(e) => e.into(),
        }
    }

    async fn route(
        &self,
        session: &mut SessionContext,
        name: &str,
        args: &Map<String, Value>,
    ) -> Result<ToolResponse, DispatchError> {
        let tools = &self.tools;
        let response = match name {
            "availableLiquidity" => tools.available_liquidity().await,
            "lenderBalance" => tools.lender_balance(&string_arg(args, "lender_address")?).await,
            "lenderStatus" => tools.lender_status(&string_arg(args, "lender_address")?).await,
            "getLoan" => tools.get_loan(&string_arg(args, "borrower_address")?).await,
            "isBanned" => tools.is_banned(&string_arg(args, "borrower_address")?).await,
            "creditScore" => tools.credit_score(&string_arg(args, "account")?).await,
            "walletBalance" => tools.wallet_balance(&string_arg(args, "account")?).await,
            "tokenBalance" => tools.token_balance(&string_arg(args, "account")?).await,
            "deposit" => tools.deposit(session, &amount_arg(args, "amount")?).await,
            "withdraw" => tools.withdraw(session, &amount_arg(args, "amount")?).await,
            "openLoan" => {
                let borrower = string_arg(args, "borrower_address")?;
                let principal = amount_arg(args, "principal")?;
                let term_seconds = u64_arg(args, "term_seconds")?;
                tools.open_loan(session, &borrower, &principal, term_seconds).await
            }
            "repay" => tools.repay(session).await,
            "checkDefaultAndBan" => {
                tools
                    .check_default_and_ban(session, &string_arg(args, "borrower_address")?)
                    .await
            }
            "setDepositLockSeconds" => {
                tools
                    .set_deposit_lock_seconds(session, u64_arg(args, "seconds")?)
                    .await
            }
            "setTrustMintSbt" => tools.set_trust_mint_sbt(session, &string_arg(args, "sbt_address")?).await,
            "setMinScoreToBorrow" => {
                tools
                    .set_min_score_to_borrow(session, u64_arg(args, "new_min_score")?)
                    .await
            }
            "unban" => tools.unban(session, &string_arg(args, "borrower_address")?).await,
            other => ToolResponse::error(format!("Unknown tool: {}", other)),
        };
        Ok(response)
    }
}

fn missing(key: &str) -> DispatchError {
    DispatchError::InvalidInput(format!("missing required argument '{}'", key))
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Result<String, DispatchError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(DispatchError::InvalidInput(format!("'{}' must be a string, got {}", key, other))),
        None => Err(missing(key)),
    }
}

/// Amounts stay textual so they can be converted exactly. JSON numbers keep
/// serde_json's rendering, which may be exponent notation (`1e-6`); unit
/// conversion expands it.
fn amount_arg(args: &Map<String, Value>, key: &str) -> Result<String, DispatchError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(DispatchError::InvalidAmount(format!("'{}' must be numeric, got {}", key, other))),
        None => Err(missing(key)),
    }
}

fn u64_arg(args: &Map<String, Value>, key: &str) -> Result<u64, DispatchError> {
    let invalid = || DispatchError::InvalidInput(format!("'{}' must be a non-negative integer", key));
    match args.get(key) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
        None => Err(missing(key)),
    }
}
