pub mod dispatcher;
pub mod pool_tools;
pub mod tool_registry;

pub use dispatcher::*;
pub use pool_tools::*;
pub use tool_registry::*;
