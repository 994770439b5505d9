//! Schema module - Parameter and scheme types for flow network evolution.

mod config;
mod scheme;

pub use config::*;
pub use scheme::*;
