pub mod alloy_executor;
#[cfg(test)]
pub mod mock_executor;
pub mod traits;

pub use alloy_executor::AlloyExecutor;
pub use traits::*;
