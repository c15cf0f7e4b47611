pub mod env;
pub mod error;
pub mod juju;
pub mod provider;
pub mod retry;

pub use env::*;
pub use error::*;
pub use juju::*;
pub use provider::*;
pub use retry::*;
