use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::primitives::{Bytes, Selector};
use std::sync::Arc;
use tracing::debug;

use crate::contracts::abi::AbiProvider;
use crate::contracts::encoding::CallDataEncoder;
use crate::models::{CallSpec, DispatchError};

/// Alloy-based encoder driven by JSON ABIs
///
/// Functions are resolved by name and arity at call time, so ABI files can
/// be swapped without recompiling.
#[derive(Clone)]
pub struct AlloyEncoder {
    abi_provider: Arc<dyn AbiProvider>,
}

impl AlloyEncoder {
    pub fn new(abi_provider: Arc<dyn AbiProvider>) -> Self {
        Self { abi_provider }
    }
}

impl CallDataEncoder for AlloyEncoder {
    fn encode_call(&self, call: &CallSpec) -> Result<Bytes, DispatchError> {
        let function = self
            .abi_provider
            .get_function(call.contract.kind, &call.function, call.args.len())?;

        let call_data = function.abi_encode_input(&call.args).map_err(|e| {
            DispatchError::InvalidInput(format!("Cannot encode {}: {}", call.description, e))
        })?;

        debug!(
            "🔧 Encoded {} ({} bytes, selector 0x{})",
            call.description,
            call_data.len(),
            hex::encode(function.selector())
        );
        Ok(Bytes::from(call_data))
    }

    fn decode_output(&self, call: &CallSpec, data: &[u8]) -> Result<Vec<DynSolValue>, DispatchError> {
        let function = self
            .abi_provider
            .get_function(call.contract.kind, &call.function, call.args.len())?;

        function.abi_decode_output(data).map_err(|e| {
            DispatchError::InvalidInput(format!("Unexpected return data from {}: {}", call.description, e))
        })
    }

    fn selector(&self, call: &CallSpec) -> Result<Selector, DispatchError> {
        Ok(self
            .abi_provider
            .get_function(call.contract.kind, &call.function, call.args.len())?
            .selector())
    }

    fn supports(&self, call: &CallSpec) -> bool {
        self.abi_provider.has_function(call.contract.kind, &call.function)
    }

    fn description(&self) -> &str {
        "AlloyEncoder: JSON-ABI driven encoding via alloy dyn-abi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::abi::AbiRegistry;
    use crate::models::{ContractKind, ContractRef};
    use alloy::primitives::{Address, U256};
    use std::str::FromStr;

    fn encoder() -> AlloyEncoder {
        AlloyEncoder::new(Arc::new(AbiRegistry::new()))
    }

    fn pool() -> ContractRef {
        ContractRef::new(
            ContractKind::LendingPool,
            Address::from_str("0x5FC8d32690cc91D4c39d9d3abcBD16989F875707").unwrap(),
        )
    }

    #[test]
    fn test_encode_open_loan() {
        let borrower = Address::from_str("0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC").unwrap();
        let call = CallSpec::new(pool(), "openLoan")
            .arg(DynSolValue::Address(borrower))
            .arg(DynSolValue::Uint(U256::from(5_000_000u64), 256))
            .arg(DynSolValue::Uint(U256::from(604_800u64), 256));

        let data = encoder().encode_call(&call).unwrap();
        assert_eq!(data.len(), 4 + 3 * 32);
        assert_eq!(&data[..4], encoder().selector(&call).unwrap().as_slice());
        // Address is left-padded into the first word.
        assert_eq!(&data[16..36], borrower.as_slice());
    }

    #[test]
    fn test_type_mismatch_is_invalid_input() {
        let call = CallSpec::new(pool(), "unban").arg(DynSolValue::Bool(true));
        assert!(matches!(encoder().encode_call(&call), Err(DispatchError::InvalidInput(_))));
    }

    #[test]
    fn test_decode_getloan_output() {
        let call = CallSpec::new(pool(), "getLoan").arg(DynSolValue::Address(Address::ZERO));
        let words = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(10u64), 256),
            DynSolValue::Uint(U256::from(7u64), 256),
            DynSolValue::Uint(U256::from(1u64), 256),
            DynSolValue::Uint(U256::from(2u64), 256),
            DynSolValue::Bool(true),
        ])
        .abi_encode_params();

        let values = encoder().decode_output(&call, &words).unwrap();
        assert_eq!(values.len(), 5);
        assert_eq!(values[1], DynSolValue::Uint(U256::from(7u64), 256));
        assert_eq!(values[4], DynSolValue::Bool(true));
    }

    #[test]
    fn test_supports_reflects_abi() {
        let call = CallSpec::new(pool(), "loanStatus");
        assert!(!encoder().supports(&call));
        assert!(encoder().supports(&CallSpec::new(pool(), "isBanned")));
    }
}
