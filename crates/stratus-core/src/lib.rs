pub mod index;
pub mod plan;
pub mod report;
pub mod state;
pub mod time;

pub use index::*;
pub use plan::*;
pub use report::*;
pub use state::*;
