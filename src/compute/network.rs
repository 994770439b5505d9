//! The flow distribution network aggregate.

use std::sync::Arc;

use rand::prelude::*;

use crate::compute::evolution::EvolutionError;
use crate::compute::numeric::definitely_less;
use crate::compute::pattern::{complexity, init_pattern};
use crate::compute::solver::{build_system, flow_error, solve_or_recover};
use crate::compute::wiring::initial_topology;
use crate::compute::{Pattern, RobustnessEvaluator, SolveError, Topology};
use crate::schema::{Layout, Parameters};
use crate::storage::{CheckpointError, NetworkRecord};

/// A candidate network: topology, target pattern and cached evaluations.
///
/// The ideal pattern is shared between clones. Flow error and robustness are
/// computed on first read and invalidated by every topology change.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    layout: Layout,
    topology: Topology,
    ideal: Arc<Pattern>,
    output: Pattern,
    flow_error: Option<f64>,
    recovered: bool,
    evaluator: Option<RobustnessEvaluator>,
    robustness: Option<f64>,
}

impl FlowNetwork {
    /// Create a plain flow network.
    pub fn new(layout: Layout, topology: Topology, ideal: Arc<Pattern>) -> Self {
        debug_assert_eq!(topology.num_nodes(), layout.total());
        debug_assert_eq!(ideal.dim(), (layout.nodes_out, layout.nodes_in));
        Self {
            layout,
            topology,
            ideal,
            output: Pattern::zeros((layout.nodes_out, layout.nodes_in)),
            flow_error: None,
            recovered: false,
            evaluator: None,
            robustness: None,
        }
    }

    /// Attach a robustness evaluator, turning this into a robust network.
    pub fn with_evaluator(mut self, evaluator: RobustnessEvaluator) -> Self {
        self.evaluator = Some(evaluator);
        self.robustness = None;
        self
    }

    /// Build the initial network for a run: wiring first, then the ideal pattern.
    pub fn generate(
        params: &Parameters,
        connectivity: f64,
        rng: &mut StdRng,
    ) -> Result<Self, EvolutionError> {
        let layout = params.layout();
        let topology = initial_topology(params, connectivity, rng)?;
        let ideal = init_pattern(params.pattern_init, params, rng)?;
        let network = Self::new(layout, topology, Arc::new(ideal));
        Ok(match RobustnessEvaluator::for_parameters(params) {
            Some(evaluator) => network.with_evaluator(evaluator),
            None => network,
        })
    }

    /// Rebuild a network from a stored record.
    ///
    /// The record also carries the seed and connectivity of the run that
    /// produced it.
    pub fn from_record(record: &NetworkRecord, params: &Parameters) -> Result<Self, CheckpointError> {
        let layout = params.layout();
        if record.ideal.dim() != (layout.nodes_out, layout.nodes_in) {
            return Err(CheckpointError::ShapeMismatch {
                expected: (layout.nodes_out, layout.nodes_in),
                got: record.ideal.dim(),
            });
        }

        let total = layout.total();
        let mut topology = Topology::new(total);
        for &(src, tar) in &record.edges {
            let (src, tar) = (src as usize, tar as usize);
            if src >= total || tar >= total {
                return Err(CheckpointError::EdgeOutOfRange { src, tar, total });
            }
            topology.add_edge(src, tar);
        }

        log::debug!(
            "Loaded network at iteration {} (seed {}, connectivity {:.4})",
            record.iteration,
            record.seed,
            record.connectivity
        );

        let network = Self::new(layout, topology, Arc::new(record.ideal.clone()));
        Ok(match RobustnessEvaluator::for_parameters(params) {
            Some(evaluator) => network.with_evaluator(evaluator),
            None => network,
        })
    }

    /// Snapshot as a storable record, evaluating anything not yet cached.
    pub fn to_record(
        &mut self,
        iteration: u64,
        seed: u32,
        connectivity: f64,
        rng: &mut StdRng,
    ) -> Result<NetworkRecord, SolveError> {
        let flow_error = self.flow_error()?;
        let robustness = if self.is_robust() {
            Some(self.robustness(rng)?)
        } else {
            None
        };
        Ok(NetworkRecord {
            iteration,
            seed,
            connectivity,
            flow_error,
            edges: self
                .topology
                .edges()
                .map(|(src, tar)| (src as u32, tar as u32))
                .collect(),
            ideal: self.ideal.as_ref().clone(),
            robustness,
        })
    }

    /// Copy used for perturbation trials: same topology and ideal, no robustness tracking.
    pub fn perturbation_copy(&self) -> Self {
        Self {
            evaluator: None,
            robustness: None,
            ..self.clone()
        }
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    pub fn ideal(&self) -> &Pattern {
        &self.ideal
    }

    /// Output pattern of the last flow computation.
    #[inline]
    pub fn output(&self) -> &Pattern {
        &self.output
    }

    /// Whether the last flow computation hit a singular system.
    #[inline]
    pub fn recovered(&self) -> bool {
        self.recovered
    }

    #[inline]
    pub fn is_robust(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn evaluator(&self) -> Option<&RobustnessEvaluator> {
        self.evaluator.as_ref()
    }

    pub fn num_nodes(&self) -> usize {
        self.topology.num_nodes()
    }

    pub fn num_links(&self) -> usize {
        self.topology.num_edges()
    }

    /// Complexity of the ideal pattern.
    pub fn complexity(&self) -> f64 {
        complexity(&self.ideal)
    }

    /// Cached flow error, if it is current.
    pub fn cached_flow_error(&self) -> Option<f64> {
        self.flow_error
    }

    /// Cached robustness, if it is current.
    pub fn cached_robustness(&self) -> Option<f64> {
        self.robustness
    }

    #[inline]
    fn invalidate(&mut self) {
        self.flow_error = None;
        self.robustness = None;
    }

    /// Apply `f` to the topology and drop cached evaluations.
    pub fn modify_topology<T>(&mut self, f: impl FnOnce(&mut Topology) -> T) -> T {
        self.invalidate();
        f(&mut self.topology)
    }

    pub fn add_link(&mut self, src: usize, tar: usize) -> bool {
        self.modify_topology(|t| t.add_edge(src, tar))
    }

    pub fn remove_link(&mut self, src: usize, tar: usize) -> bool {
        self.modify_topology(|t| t.remove_edge(src, tar))
    }

    /// Disconnect `node` from the rest of the network.
    pub fn clear_node(&mut self, node: usize) {
        self.modify_topology(|t| t.clear_node(node))
    }

    /// Flow error against the ideal pattern, solving the flow system if needed.
    pub fn flow_error(&mut self) -> Result<f64, SolveError> {
        if let Some(error) = self.flow_error {
            return Ok(error);
        }
        let system = build_system(&self.topology, self.layout);
        let (output, recovered) = solve_or_recover(system, self.layout)?;
        let error = flow_error(&self.ideal, &output);
        self.output = output;
        self.recovered = recovered;
        self.flow_error = Some(error);
        Ok(error)
    }

    /// Robustness score in `[0, 1]`.
    ///
    /// Exactly zero, without any perturbation trial, while the flow error is
    /// not below the robustness threshold. Plain flow networks always score
    /// zero. `rng` feeds the noise model.
    pub fn robustness(&mut self, rng: &mut StdRng) -> Result<f64, SolveError> {
        if let Some(score) = self.robustness {
            return Ok(score);
        }
        let Some(evaluator) = self.evaluator else {
            return Ok(0.0);
        };
        let error = self.flow_error()?;
        let score = if definitely_less(error, evaluator.threshold) {
            evaluator.evaluate(self, rng)?
        } else {
            0.0
        };
        self.robustness = Some(score);
        Ok(score)
    }

    /// Remove middle nodes that cannot carry flow.
    ///
    /// A middle node is cleared if no input reaches it or if it lacks incoming
    /// or outgoing links. Nodes are checked in index order against the
    /// current topology, so clearing one node can strand a later one within
    /// the same pass. Returns the number of nodes cleared.
    pub fn prune(&mut self) -> usize {
        let layout = self.layout;
        let reached = self.topology.reachable_from(0..layout.nodes_in);
        let mut cleared = 0;
        self.modify_topology(|topology| {
            for node in layout.nodes_in..layout.end_middle() {
                if topology.in_degree(node) == 0 && topology.out_degree(node) == 0 {
                    continue;
                }
                if !reached[node] || topology.in_degree(node) == 0 || topology.out_degree(node) == 0
                {
                    topology.clear_node(node);
                    cleared += 1;
                }
            }
        });
        cleared
    }
}
