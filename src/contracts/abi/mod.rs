pub mod definitions;

pub use definitions::*;
