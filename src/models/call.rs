use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{utils::parse_units, Address, U256};
use serde::Serialize;
use std::fmt;

use crate::config::GasConfig;
use crate::models::DispatchError;

/// Contracts the console knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ContractKind {
    LendingPool,
    TrustMintSbt,
    AssetToken,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractKind::LendingPool => "LendingPool",
            ContractKind::TrustMintSbt => "TrustMintSBT",
            ContractKind::AssetToken => "AssetToken",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractRef {
    pub kind: ContractKind,
    pub address: Address,
}

impl ContractRef {
    pub fn new(kind: ContractKind, address: Address) -> Self {
        Self { kind, address }
    }
}

/// A single contract call: function name plus positional arguments.
///
/// Built once per tool invocation and never mutated after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec {
    pub contract: ContractRef,
    pub function: String,
    pub args: Vec<DynSolValue>,
    /// Native amount attached to the call. `None` means zero.
    pub value: Option<U256>,
    pub description: String,
}

impl CallSpec {
    pub fn new(contract: ContractRef, function: impl Into<String>) -> Self {
        let function = function.into();
        Self {
            contract,
            description: format!("{}.{}", contract.kind, function),
            function,
            args: Vec::new(),
            value: None,
        }
    }

    pub fn arg(mut self, value: DynSolValue) -> Self {
        self.args.push(value);
        self
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn attached_value(&self) -> U256 {
        self.value.unwrap_or(U256::ZERO)
    }
}

/// How the fee fields of a locally signed transaction are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePricing {
    Legacy { gas_price: u128 },
    Eip1559 { max_fee_per_gas: u128, max_priority_fee_per_gas: u128 },
    /// Read the node's gas price when the transaction is built.
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeParams {
    pub gas_limit: u64,
    pub pricing: FeePricing,
}

impl FeeParams {
    /// Derive fee parameters from configuration. Called for every write so
    /// that `Network` pricing is re-read per transaction.
    pub fn from_config(gas: &GasConfig) -> Result<Self, DispatchError> {
        let pricing = match (&gas.max_fee_gwei, &gas.max_priority_fee_gwei, &gas.gas_price_gwei) {
            (Some(max_fee), Some(priority), _) => FeePricing::Eip1559 {
                max_fee_per_gas: gwei_to_wei(max_fee)?,
                max_priority_fee_per_gas: gwei_to_wei(priority)?,
            },
            (_, _, Some(price)) => FeePricing::Legacy {
                gas_price: gwei_to_wei(price)?,
            },
            _ => FeePricing::Network,
        };

        Ok(Self {
            gas_limit: gas.default_gas_limit,
            pricing,
        })
    }
}

fn gwei_to_wei(raw: &str) -> Result<u128, DispatchError> {
    let parsed = parse_units(raw.trim(), "gwei")
        .map_err(|e| DispatchError::InvalidInput(format!("gas price '{}' is not a gwei amount: {}", raw, e)))?;
    if parsed.is_negative() {
        return Err(DispatchError::InvalidInput(format!("gas price '{}' is negative", raw)));
    }
    let wei: U256 = parsed.get_absolute();
    u128::try_from(wei).map_err(|_| DispatchError::InvalidInput(format!("gas price '{}' is too large", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gas_config() -> GasConfig {
        GasConfig {
            default_gas_limit: 250_000,
            gas_price_gwei: None,
            max_fee_gwei: None,
            max_priority_fee_gwei: None,
        }
    }

    #[test]
    fn test_fee_params_prefer_eip1559_when_both_fields_set() {
        let mut gas = gas_config();
        gas.gas_price_gwei = Some("3".to_string());
        gas.max_fee_gwei = Some("40".to_string());
        gas.max_priority_fee_gwei = Some("1.5".to_string());

        let fees = FeeParams::from_config(&gas).unwrap();
        assert_eq!(fees.gas_limit, 250_000);
        assert_eq!(
            fees.pricing,
            FeePricing::Eip1559 {
                max_fee_per_gas: 40_000_000_000,
                max_priority_fee_per_gas: 1_500_000_000,
            }
        );
    }

    #[test]
    fn test_fee_params_legacy_and_network() {
        let mut gas = gas_config();
        assert_eq!(FeeParams::from_config(&gas).unwrap().pricing, FeePricing::Network);

        gas.gas_price_gwei = Some("50".to_string());
        assert_eq!(
            FeeParams::from_config(&gas).unwrap().pricing,
            FeePricing::Legacy { gas_price: 50_000_000_000 }
        );

        gas.gas_price_gwei = Some("fast".to_string());
        assert!(matches!(FeeParams::from_config(&gas), Err(DispatchError::InvalidInput(_))));
    }

    #[test]
    fn test_call_spec_builder() {
        let pool = ContractRef::new(ContractKind::LendingPool, Address::ZERO);
        let call = CallSpec::new(pool, "deposit")
            .arg(DynSolValue::Uint(U256::from(5u64), 256))
            .with_value(U256::from(5u64));

        assert_eq!(call.description, "LendingPool.deposit");
        assert_eq!(call.args.len(), 1);
        assert_eq!(call.attached_value(), U256::from(5u64));
        assert_eq!(CallSpec::new(pool, "withdraw").attached_value(), U256::ZERO);
    }
}
