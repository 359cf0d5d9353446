pub mod abi;
pub mod encoding;
pub mod execution;
pub mod units;
