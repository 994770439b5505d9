//! Robustness scoring by perturb-and-recompute.
//!
//! A functional network is perturbed many times (a link removed, a node
//! removed, or all link weights jittered) and the score is the share of
//! perturbations after which the flow error stays below the robustness
//! threshold.

use rand::prelude::*;

use crate::compute::numeric::definitely_less;
use crate::compute::solver::{build_noisy_system, flow_error, solve_or_recover};
use crate::compute::{FlowNetwork, SolveError};
use crate::schema::{NetworkType, Parameters};

/// Noise trials per middle node.
pub const NOISE_TRIALS_PER_NODE: usize = 10;

/// Which perturbation a robust network must withstand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobustnessModel {
    /// Removal of any single link.
    Link,
    /// Removal of any single active middle node.
    Node,
    /// Random jitter of all link weights.
    Noise { noise_level: f64 },
}

/// Scores a network under one [`RobustnessModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustnessEvaluator {
    pub model: RobustnessModel,
    /// Flow error a perturbed network must stay below.
    pub threshold: f64,
}

impl RobustnessEvaluator {
    pub fn new(model: RobustnessModel, threshold: f64) -> Self {
        Self { model, threshold }
    }

    /// Evaluator for the configured network type, `None` for plain flow networks.
    pub fn for_parameters(params: &Parameters) -> Option<Self> {
        let model = match params.network_type {
            NetworkType::Flow => return None,
            NetworkType::LinkRobust => RobustnessModel::Link,
            NetworkType::NodeRobust => RobustnessModel::Node,
            NetworkType::NoiseRobust { noise_level } => RobustnessModel::Noise { noise_level },
        };
        Some(Self::new(model, params.robust.robust_threshold))
    }

    /// Score `network` in `[0, 1]`.
    ///
    /// The network itself is never modified; perturbations run on copies.
    /// Only the noise model draws from `rng`.
    pub fn evaluate(&self, network: &FlowNetwork, rng: &mut StdRng) -> Result<f64, SolveError> {
        match self.model {
            RobustnessModel::Link => self.link_robustness(network),
            RobustnessModel::Node => self.node_robustness(network),
            RobustnessModel::Noise { noise_level } => {
                self.noise_robustness(network, noise_level, rng)
            }
        }
    }

    fn link_robustness(&self, network: &FlowNetwork) -> Result<f64, SolveError> {
        let layout = network.layout();
        let topology = network.topology();

        let links: Vec<(usize, usize)> = (0..layout.end_middle())
            .filter(|&n| {
                layout.is_input(n) || (topology.in_degree(n) > 0 && topology.out_degree(n) > 0)
            })
            .flat_map(move |n| topology.out_neighbors(n).map(move |tar| (n, tar)))
            .collect();
        if links.is_empty() {
            return Ok(0.0);
        }

        let mut scratch = network.perturbation_copy();
        let mut robust = 0usize;
        for &(src, tar) in &links {
            scratch.remove_link(src, tar);
            if definitely_less(scratch.flow_error()?, self.threshold) {
                robust += 1;
            }
            scratch.add_link(src, tar);
        }
        Ok(robust as f64 / links.len() as f64)
    }

    fn node_robustness(&self, network: &FlowNetwork) -> Result<f64, SolveError> {
        let layout = network.layout();
        let topology = network.topology();

        let mut tested = 0usize;
        let mut robust = 0usize;
        for node in layout.nodes_in..layout.end_middle() {
            if topology.in_degree(node) == 0 || topology.out_degree(node) == 0 {
                continue;
            }
            let mut scratch = network.perturbation_copy();
            scratch.clear_node(node);
            if definitely_less(scratch.flow_error()?, self.threshold) {
                robust += 1;
            }
            tested += 1;
        }
        if tested == 0 {
            return Ok(0.0);
        }
        Ok(robust as f64 / tested as f64)
    }

    fn noise_robustness(
        &self,
        network: &FlowNetwork,
        noise_level: f64,
        rng: &mut StdRng,
    ) -> Result<f64, SolveError> {
        let layout = network.layout();
        let trials = NOISE_TRIALS_PER_NODE * layout.nodes_middle;
        if trials == 0 {
            return Ok(0.0);
        }

        let mut robust = 0usize;
        for _ in 0..trials {
            let system = build_noisy_system(network.topology(), layout, noise_level, rng);
            let (output, _) = solve_or_recover(system, layout)?;
            if definitely_less(flow_error(network.ideal(), &output), self.threshold) {
                robust += 1;
            }
        }
        Ok(robust as f64 / trials as f64)
    }
}
