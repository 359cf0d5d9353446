use alloy::json_abi::{Function, JsonAbi};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::ContractConfig;
use crate::models::{ContractKind, DispatchError};

/// LendingPool surface every deployment has. `lenderStatus`, `loanStatus` and
/// `canOpenLoan` only exist on upgraded pools and come from an ABI file.
pub const LENDING_POOL_SIGNATURES: &[&str] = &[
    "function availableLiquidity() view returns (uint256)",
    "function lenderBalance(address lender) view returns (uint256)",
    "function totalDeposited(address lender) view returns (uint256)",
    "function totalWithdrawn(address lender) view returns (uint256)",
    "function previewWithdraw(address lender) view returns (uint256)",
    "function getLoan(address borrower) view returns (uint256 principal, uint256 outstanding, uint256 startTime, uint256 dueTime, bool active)",
    "function isBanned(address borrower) view returns (bool)",
    "function deposit(uint256 amount) payable",
    "function withdraw(uint256 amount)",
    "function openLoan(address borrower, uint256 principal, uint256 termSeconds)",
    "function repay(uint256 amount) payable",
    "function checkDefaultAndBan(address borrower)",
    "function setDepositLockSeconds(uint256 lockSeconds)",
    "function setTrustMintSbt(address sbt)",
    "function setMinScoreToBorrow(uint256 newMinScore)",
    "function unban(address borrower)",
];

/// Views added by the upgraded pool.
pub const LENDING_POOL_UPGRADE_SIGNATURES: &[&str] = &[
    "function lenderStatus(address lender) view returns (uint256 totalDeposited, uint256 totalWithdrawn, uint256 balance, uint256 unlockable)",
    "function loanStatus(address borrower) view returns (bool active, uint256 principal, uint256 outstanding, uint256 startTime, uint256 dueTime, bool banned)",
    "function canOpenLoan(address borrower, uint256 principal) view returns (bool ok, string reason)",
];

pub const TRUST_MINT_SBT_SIGNATURES: &[&str] = &[
    "function scores(address account) view returns (uint256 score, uint256 updatedAt)",
    "function balanceOf(address owner) view returns (uint256)",
];

pub const ASSET_TOKEN_SIGNATURES: &[&str] = &[
    "function balanceOf(address account) view returns (uint256)",
    "function decimals() view returns (uint8)",
];

pub trait AbiProvider: Send + Sync {
    fn get_contract_abi(&self, contract: ContractKind) -> Result<&JsonAbi, DispatchError>;

    /// First overload of `function` taking `arity` arguments.
    fn get_function(&self, contract: ContractKind, function: &str, arity: usize) -> Result<&Function, DispatchError>;

    fn has_function(&self, contract: ContractKind, function: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct AbiRegistry {
    abis: HashMap<ContractKind, JsonAbi>,
}

impl AbiRegistry {
    /// Registry seeded with the built-in signatures.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.insert_signatures(ContractKind::LendingPool, LENDING_POOL_SIGNATURES);
        registry.insert_signatures(ContractKind::TrustMintSbt, TRUST_MINT_SBT_SIGNATURES);
        registry.insert_signatures(ContractKind::AssetToken, ASSET_TOKEN_SIGNATURES);
        registry
    }

    /// Built-in signatures, with any configured ABI file replacing the
    /// corresponding contract's entry.
    pub fn from_config(contracts: &ContractConfig) -> Result<Self> {
        let mut registry = Self::new();

        let files = [
            (ContractKind::LendingPool, &contracts.lending_pool_abi_path),
            (ContractKind::TrustMintSbt, &contracts.trust_mint_sbt_abi_path),
            (ContractKind::AssetToken, &contracts.asset_token_abi_path),
        ];
        for (kind, path) in files {
            if let Some(path) = path {
                registry.load_file(kind, path)?;
            }
        }

        Ok(registry)
    }

    pub fn with_signatures(mut self, contract: ContractKind, signatures: &[&str]) -> Self {
        self.insert_signatures(contract, signatures);
        self
    }

    fn insert_signatures(&mut self, contract: ContractKind, signatures: &[&str]) {
        let abi = self.abis.entry(contract).or_default();
        for signature in signatures {
            match Function::parse(signature) {
                Ok(function) => abi.functions.entry(function.name.clone()).or_default().push(function),
                Err(e) => warn!("Skipping unparsable {} signature '{}': {}", contract, signature, e),
            }
        }
    }

    /// Loads a plain ABI array or a build artifact with an `abi` field.
    pub fn load_file(&mut self, contract: ContractKind, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {} ABI from {}: {}", contract, path.display(), e))?;
        let abi = parse_abi_json(&text)
            .map_err(|e| anyhow::anyhow!("Invalid {} ABI in {}: {}", contract, path.display(), e))?;

        info!("📜 Loaded {} ABI from {} ({} functions)", contract, path.display(), abi.functions.len());
        self.abis.insert(contract, abi);
        Ok(())
    }
}

pub fn parse_abi_json(text: &str) -> Result<JsonAbi> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let abi_value = match value {
        serde_json::Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| anyhow::anyhow!("artifact object has no 'abi' field"))?,
        other => other,
    };
    Ok(serde_json::from_value(abi_value)?)
}

impl AbiProvider for AbiRegistry {
    fn get_contract_abi(&self, contract: ContractKind) -> Result<&JsonAbi, DispatchError> {
        self.abis
            .get(&contract)
            .ok_or_else(|| DispatchError::InvalidInput(format!("No ABI registered for {}", contract)))
    }

    fn get_function(&self, contract: ContractKind, function: &str, arity: usize) -> Result<&Function, DispatchError> {
        let abi = self.get_contract_abi(contract)?;
        let overloads = abi
            .function(function)
            .ok_or_else(|| DispatchError::InvalidInput(format!("Function not found: {}::{}", contract, function)))?;

        overloads.iter().find(|f| f.inputs.len() == arity).ok_or_else(|| {
            DispatchError::InvalidInput(format!(
                "{}::{} does not take {} argument(s)",
                contract, function, arity
            ))
        })
    }

    fn has_function(&self, contract: ContractKind, function: &str) -> bool {
        self.abis
            .get(&contract)
            .and_then(|abi| abi.function(function))
            .map_or(false, |overloads| !overloads.is_empty())
    }
}
