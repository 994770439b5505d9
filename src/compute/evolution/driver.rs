//! The evolution loop.

use std::cmp::Ordering;

use rand::prelude::*;

use crate::compute::numeric::{definitely_less, fcmp};
use crate::compute::{
    FlowNetwork, MutationOperator, PatternError, SolveError, WiringError, mutation_operator,
};
use crate::schema::{ConfigError, Parameters};
use crate::storage::{CheckpointError, CheckpointKind, CheckpointSink};

use super::acceptance::{accept_flow, accept_robustness};
use super::history::History;

/// Ticks between progress reports of flow runs.
pub const FLOW_PROGRESS_INTERVAL: u64 = 200;

/// Ticks between progress reports of robust runs.
pub const ROBUST_PROGRESS_INTERVAL: u64 = 100;

/// Any error that aborts a run.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Converged,
    TimedOut,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Flow error (flow runs) or robustness (robust runs) reached its target.
    Converged,
    /// The maximum evolution time passed.
    TimedOut,
}

impl From<StopReason> for RunState {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Converged => RunState::Converged,
            StopReason::TimedOut => RunState::TimedOut,
        }
    }
}

/// Progress report passed to callbacks.
#[derive(Debug, Clone)]
pub struct EvolutionProgress {
    pub time: u64,
    pub flow_error: f64,
    pub robustness: Option<f64>,
    pub links: usize,
    pub accepted: u64,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct EvolutionOutcome {
    pub name: String,
    pub stop_reason: StopReason,
    /// Simulated time stored in the final record.
    pub final_time: u64,
    /// Flow error when the run stopped, before pruning.
    pub flow_error: f64,
    /// Robustness when the run stopped, before pruning.
    pub robustness: Option<f64>,
    /// Links in the final, pruned network.
    pub links: usize,
    /// Number of snapshots persisted.
    pub snapshots: usize,
    /// Number of accepted mutations.
    pub accepted: u64,
}

/// Evolves one named network.
///
/// Owns the random state of the run: `rng` drives wiring, patterns,
/// mutations and acceptance; `noise_rng` feeds noise robustness trials only.
pub struct EvolutionDriver<'a> {
    params: &'a Parameters,
    name: String,
    seed: u32,
    connectivity: f64,
    rng: StdRng,
    noise_rng: StdRng,
    operator: Box<dyn MutationOperator>,
    history: History,
    time: u64,
    accepted: u64,
    state: RunState,
}

impl<'a> EvolutionDriver<'a> {
    pub fn new(params: &'a Parameters, name: impl Into<String>, seed: u32, connectivity: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let noise_rng = StdRng::seed_from_u64(rng.r#gen());
        Self {
            params,
            name: name.into(),
            seed,
            connectivity,
            rng,
            noise_rng,
            operator: mutation_operator(params.mutation, params.layout(), params.add_probability),
            history: History::new(),
            time: 0,
            accepted: 0,
            state: RunState::Running,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Build the starting network from the run's generator.
    pub fn generate_network(&mut self) -> Result<FlowNetwork, EvolutionError> {
        FlowNetwork::generate(self.params, self.connectivity, &mut self.rng)
    }

    /// Evolve `network` until it converges or time runs out, then persist it.
    pub fn run<S>(
        &mut self,
        network: &mut FlowNetwork,
        sink: &mut S,
    ) -> Result<EvolutionOutcome, EvolutionError>
    where
        S: CheckpointSink + ?Sized,
    {
        self.run_with_callback(network, sink, |_| {})
    }

    /// Like [`run`](Self::run), reporting progress at a fixed tick interval.
    pub fn run_with_callback<S, F>(
        &mut self,
        network: &mut FlowNetwork,
        sink: &mut S,
        mut callback: F,
    ) -> Result<EvolutionOutcome, EvolutionError>
    where
        S: CheckpointSink + ?Sized,
        F: FnMut(&EvolutionProgress),
    {
        let max_time = self.params.max_time;
        let robust = network.is_robust();
        let snapshot_interval = self.params.snapshot_interval();
        let progress_interval = if robust {
            ROBUST_PROGRESS_INTERVAL
        } else {
            FLOW_PROGRESS_INTERVAL
        };
        let mut awaiting_function = robust;

        log::info!(
            "Evolving '{}' ({}, seed {}, connectivity {:.4})",
            self.name,
            self.params.network_type,
            self.seed,
            self.connectivity
        );

        let stop_reason = loop {
            if self.time > max_time {
                break StopReason::TimedOut;
            }

            if let Some(interval) = snapshot_interval
                && self.time % interval == 0
            {
                self.history.record(self.time, network);
            }

            if self.time % progress_interval == 0 {
                let progress = self.progress(network)?;
                log::debug!(
                    "time: {} flow error: {:.6} robustness: {:?} links: {}",
                    progress.time,
                    progress.flow_error,
                    progress.robustness,
                    progress.links
                );
                callback(&progress);
            }

            if self.step(network)? {
                self.accepted += 1;
            }

            if robust {
                let robustness = network.robustness(&mut self.noise_rng)?;
                if fcmp(robustness, self.params.robust.min_robustness) != Ordering::Less {
                    break StopReason::Converged;
                }
                if awaiting_function
                    && definitely_less(network.flow_error()?, self.params.error_threshold)
                {
                    let record =
                        network.to_record(self.time, self.seed, self.connectivity, &mut self.noise_rng)?;
                    sink.store(&self.name, CheckpointKind::Flow, &record)?;
                    awaiting_function = false;
                }
            } else if definitely_less(network.flow_error()?, self.params.error_threshold) {
                break StopReason::Converged;
            }

            self.time += 1;
        };
        self.state = stop_reason.into();

        let flow_error = network.flow_error()?;
        let robustness = if robust {
            Some(network.robustness(&mut self.noise_rng)?)
        } else {
            None
        };

        let pruned = network.prune();
        if pruned > 0 {
            log::debug!("Pruned {} middle nodes of '{}'", pruned, self.name);
        }

        let snapshots = self.history.len();
        for (time, mut snapshot) in self.history.drain() {
            let record =
                snapshot.to_record(time, self.seed, self.connectivity, &mut self.noise_rng)?;
            sink.store(&self.name, CheckpointKind::Snapshot(time), &record)?;
        }

        let final_time = self.time.min(max_time);
        let record =
            network.to_record(final_time, self.seed, self.connectivity, &mut self.noise_rng)?;
        sink.store(&self.name, CheckpointKind::Final, &record)?;

        log::info!(
            "Finished '{}' at time {} ({:?}): flow error {:.6}, {} links",
            self.name,
            final_time,
            stop_reason,
            record.flow_error,
            record.edges.len()
        );

        Ok(EvolutionOutcome {
            name: self.name.clone(),
            stop_reason,
            final_time,
            flow_error,
            robustness,
            links: record.edges.len(),
            snapshots,
            accepted: self.accepted,
        })
    }

    fn progress(&mut self, network: &mut FlowNetwork) -> Result<EvolutionProgress, SolveError> {
        let robustness = if network.is_robust() {
            Some(network.robustness(&mut self.noise_rng)?)
        } else {
            None
        };
        Ok(EvolutionProgress {
            time: self.time,
            flow_error: network.flow_error()?,
            robustness,
            links: network.num_links(),
            accepted: self.accepted,
        })
    }

    /// Mutate a copy of `network` and replace it if accepted.
    fn step(&mut self, network: &mut FlowNetwork) -> Result<bool, SolveError> {
        let mut candidate = network.clone();
        let operator = &self.operator;
        let rng = &mut self.rng;
        candidate.modify_topology(|topology| operator.mutate(topology, rng));

        let accept = if network.is_robust() {
            self.accept_robust(network, &mut candidate)?
        } else {
            self.accept_functional(network, &mut candidate)?
        };
        if accept {
            *network = candidate;
        }
        Ok(accept)
    }

    fn accept_functional(
        &mut self,
        current: &mut FlowNetwork,
        candidate: &mut FlowNetwork,
    ) -> Result<bool, SolveError> {
        let error = current.flow_error()?;
        let candidate_error = candidate.flow_error()?;
        Ok(accept_flow(
            error,
            candidate_error,
            self.params.annealing_factor,
            &mut self.rng,
        ))
    }

    fn accept_robust(
        &mut self,
        current: &mut FlowNetwork,
        candidate: &mut FlowNetwork,
    ) -> Result<bool, SolveError> {
        let threshold = self.params.error_threshold;
        if !definitely_less(current.flow_error()?, threshold) {
            return self.accept_functional(current, candidate);
        }
        if !definitely_less(candidate.flow_error()?, threshold) {
            return Ok(false);
        }
        let candidate_robustness = candidate.robustness(&mut self.noise_rng)?;
        let robustness = current.robustness(&mut self.noise_rng)?;
        Ok(accept_robustness(
            robustness,
            candidate_robustness,
            self.params.robust.robust_factor,
            &mut self.rng,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NetworkType;
    use crate::storage::MemoryStore;

    fn small(network_type: NetworkType) -> Parameters {
        Parameters {
            nodes_in: 2,
            nodes_middle: 6,
            nodes_out: 2,
            activated_k: 1,
            max_time: 400,
            network_type,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_same_run() {
        let params = small(NetworkType::Flow);
        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let mut driver = EvolutionDriver::new(&params, "net", 17, 0.3);
            let mut network = driver.generate_network().unwrap();
            let mut store = MemoryStore::new();
            let outcome = driver.run(&mut network, &mut store).unwrap();
            let record = store.get("net", CheckpointKind::Final).unwrap().clone();
            outcomes.push((outcome.final_time, outcome.accepted, record));
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }

    #[test]
    fn test_flow_run_writes_final_record() {
        let params = small(NetworkType::Flow);
        let mut driver = EvolutionDriver::new(&params, "net", 3, 0.3);
        let mut network = driver.generate_network().unwrap();
        let mut store = MemoryStore::new();
        let outcome = driver.run(&mut network, &mut store).unwrap();

        assert!(outcome.final_time <= params.max_time);
        assert_eq!(store.len(), 1);
        let record = store.get("net", CheckpointKind::Final).unwrap();
        assert_eq!(record.iteration, outcome.final_time);
        assert_eq!(record.seed, 3);
        assert!(record.robustness.is_none());
        match outcome.stop_reason {
            StopReason::Converged => {
                assert!(definitely_less(outcome.flow_error, params.error_threshold));
                assert_eq!(driver.state(), RunState::Converged);
            }
            StopReason::TimedOut => {
                assert_eq!(outcome.final_time, params.max_time);
                assert_eq!(driver.state(), RunState::TimedOut);
            }
        }
    }

    #[test]
    fn test_snapshots_persisted() {
        let mut params = small(NetworkType::Flow);
        params.snapshots = 4;
        // unreachable threshold forces the full time budget
        params.error_threshold = 0.0;
        let mut driver = EvolutionDriver::new(&params, "net", 5, 0.3);
        let mut network = driver.generate_network().unwrap();
        let mut store = MemoryStore::new();
        let outcome = driver.run(&mut network, &mut store).unwrap();

        assert_eq!(outcome.stop_reason, StopReason::TimedOut);
        assert_eq!(outcome.final_time, 400);
        assert_eq!(outcome.snapshots, 5);
        for t in [0, 100, 200, 300, 400] {
            let record = store.get("net", CheckpointKind::Snapshot(t)).unwrap();
            assert_eq!(record.iteration, t);
        }
    }

    #[test]
    fn test_progress_callback() {
        let mut params = small(NetworkType::Flow);
        params.error_threshold = 0.0;
        let mut driver = EvolutionDriver::new(&params, "net", 5, 0.3);
        let mut network = driver.generate_network().unwrap();
        let mut store = MemoryStore::new();
        let mut times = Vec::new();
        driver
            .run_with_callback(&mut network, &mut store, |p| times.push(p.time))
            .unwrap();
        assert_eq!(times, vec![0, 200, 400]);
    }

    #[test]
    fn test_node_robust_run() {
        let params = small(NetworkType::NodeRobust);
        let mut driver = EvolutionDriver::new(&params, "net", 11, 0.3);
        let mut network = driver.generate_network().unwrap();
        let mut store = MemoryStore::new();
        let outcome = driver.run(&mut network, &mut store).unwrap();

        let robustness = outcome.robustness.unwrap();
        assert!((0.0..=1.0).contains(&robustness));
        let record = store.get("net", CheckpointKind::Final).unwrap();
        assert!(record.robustness.is_some_and(|r| (0.0..=1.0).contains(&r)));
        if outcome.stop_reason == StopReason::Converged {
            assert_eq!(robustness, 1.0);
        }
        if let Some(flow) = store.get("net", CheckpointKind::Flow) {
            assert!(definitely_less(flow.flow_error, params.error_threshold));
            assert!(flow.iteration <= outcome.final_time);
        }
    }
}
