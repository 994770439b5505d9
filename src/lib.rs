//! Robust flow networks - Evolution of functional flow distribution networks.
//!
//! A flow network routes a unit of flow from each input node through a layer
//! of middle nodes to the output nodes, splitting it evenly over outgoing
//! links. Evolution searches for a topology whose output distribution matches
//! an ideal pattern, and optionally for one that keeps doing so when links
//! or nodes fail or link weights are perturbed.
//!
//! # Architecture
//!
//! - `schema`: Parameters, layer layout and scheme tags
//! - `compute`: Topology, patterns, flow solver, robustness and evolution
//! - `storage`: Binary checkpoints and their destinations
//!
//! # Example
//!
//! ```rust,no_run
//! use robust_flow::{
//!     compute::evolution::EvolutionDriver,
//!     schema::Parameters,
//!     storage::DirectoryStore,
//! };
//!
//! let params = Parameters {
//!     max_time: 10_000,
//!     ..Default::default()
//! };
//! params.validate().unwrap();
//!
//! let mut driver = EvolutionDriver::new(&params, "net", 7, 0.3);
//! let mut network = driver.generate_network().unwrap();
//! let mut store = DirectoryStore::new(".");
//! let outcome = driver.run(&mut network, &mut store).unwrap();
//!
//! println!("Flow error after {} ticks: {}", outcome.final_time, outcome.flow_error);
//! ```

pub mod compute;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use compute::FlowNetwork;
pub use compute::evolution::{EvolutionDriver, EvolutionError, EvolutionOutcome, StopReason};
pub use schema::{Layout, NetworkType, Parameters};
