//! Evolutionary optimisation of flow networks.
//!
//! A run repeatedly copies the current network, mutates the copy and keeps
//! it according to a simulated annealing rule:
//!
//! - **Acceptance** (`acceptance`): annealing rules on flow error and robustness
//! - **History** (`history`): snapshots taken at fixed simulated times
//! - **Driver** (`driver`): the tick loop, stop criteria and checkpointing
//!
//! Flow runs stop once the flow error falls below the error threshold. Robust
//! runs first evolve for function and then for robustness, stopping once the
//! robustness reaches the configured minimum. Every run also stops after
//! `max_time` ticks.
//!
//! # Example
//!
//! ```rust,no_run
//! use robust_flow::compute::evolution::EvolutionDriver;
//! use robust_flow::schema::Parameters;
//! use robust_flow::storage::MemoryStore;
//!
//! let params = Parameters::default();
//! let mut driver = EvolutionDriver::new(&params, "example", 42, 0.3);
//! let mut network = driver.generate_network().unwrap();
//! let mut store = MemoryStore::new();
//! let outcome = driver.run(&mut network, &mut store).unwrap();
//! println!("stopped at {} ({:?})", outcome.final_time, outcome.stop_reason);
//! ```

mod acceptance;
mod driver;
mod history;

pub use acceptance::*;
pub use driver::*;
pub use history::*;
