use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Bytes, Selector};

use crate::models::{CallSpec, DispatchError};

/// Abstract trait for call data encoding
///
/// Turns a [`CallSpec`] into ABI-encoded call data and decodes view results
/// back into dynamic values. Implementations own the ABI lookup.
pub trait CallDataEncoder: Send + Sync {
    /// Encode selector + arguments. Unknown functions and argument/type
    /// mismatches are `InvalidInput`.
    fn encode_call(&self, call: &CallSpec) -> Result<Bytes, DispatchError>;

    /// Decode the return data of a view call described by `call`.
    fn decode_output(&self, call: &CallSpec, data: &[u8]) -> Result<Vec<DynSolValue>, DispatchError>;

    fn selector(&self, call: &CallSpec) -> Result<Selector, DispatchError>;

    /// Whether the target contract's ABI exposes `function` at all.
    fn supports(&self, call: &CallSpec) -> bool;

    fn description(&self) -> &str;
}
