//! Storage module - Binary checkpoints of evolved networks.

mod format;
mod store;

pub use format::*;
pub use store::*;
