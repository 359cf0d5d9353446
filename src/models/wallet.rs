use alloy::primitives::{Address, Bytes, U256, U64};
use serde::{Deserialize, Serialize};

use crate::config::parse_chain_id;

pub const SEND_TRANSACTION_ACTION: &str = "eth_sendTransaction";

/// Transaction fields handed to the browser wallet. Quantities are hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTx {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    pub chain_id: U64,
}

/// Request direction of the wallet bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletRequest {
    pub tx_request: UnsignedTx,
    pub action: String,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub hint: String,
}

/// Commands a slot can send to the wallet component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WalletCommand {
    Connect,
    SwitchNetwork { require_chain_id: u64 },
    SendTransaction { request: WalletRequest },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCommand {
    pub sequence: u64,
    #[serde(flatten)]
    pub command: WalletCommand,
}

/// Wallets report chain ids either as numbers or as hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportedChainId {
    Number(u64),
    Text(String),
}

impl ReportedChainId {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ReportedChainId::Number(id) => Some(*id),
            ReportedChainId::Text(raw) => parse_chain_id(raw),
        }
    }
}

/// Response direction of the wallet bridge, supplied by the browser component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOutcome {
    pub command_sequence: u64,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub chain_id: Option<ReportedChainId>,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the session remembers about the connected browser wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
}
