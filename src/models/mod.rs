pub mod call;
pub mod result;
pub mod session;
pub mod signer;
pub mod wallet;

pub use call::*;
pub use result::*;
pub use session::*;
pub use signer::*;
pub use wallet::*;
