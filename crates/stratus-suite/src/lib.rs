pub mod error;
pub mod runner;

pub use error::*;
pub use runner::*;
