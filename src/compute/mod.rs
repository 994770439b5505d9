//! Compute module - Flow networks, their evaluation and evolution.

mod linalg;
mod mutation;
mod network;
pub mod numeric;
mod pattern;
mod robustness;
pub mod solver;
mod topology;
mod wiring;

pub mod evolution;

pub use linalg::*;
pub use mutation::*;
pub use network::*;
pub use pattern::*;
pub use robustness::*;
pub use topology::*;
pub use wiring::*;
