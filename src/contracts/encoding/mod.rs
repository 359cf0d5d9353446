pub mod alloy_encoder;
pub mod traits;

pub use alloy_encoder::AlloyEncoder;
pub use traits::*;
