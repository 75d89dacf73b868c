//! Project configurations and the evaluation data delivered for them.

mod types;

pub use types::*;
