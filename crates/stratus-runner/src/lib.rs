pub mod args;
pub mod render;
pub mod run;

pub use args::*;
pub use run::*;
