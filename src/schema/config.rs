//! Configuration types for flow network evolution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{MutationScheme, NetworkInit, NetworkType, PatternInit};

fn default_nodes_in() -> u16 {
    8
}
fn default_nodes_middle() -> u16 {
    20
}
fn default_nodes_out() -> u16 {
    8
}
fn default_activated_k() -> u16 {
    4
}
fn default_error_threshold() -> f64 {
    0.007
}
fn default_annealing_factor() -> f64 {
    0.0001
}
fn default_max_time() -> u64 {
    100_000
}
fn default_add_probability() -> f64 {
    0.5
}

/// Node counts of the three layers.
///
/// Node indices are laid out as `[0, nodes_in)` input, `[nodes_in,
/// end_middle)` middle and `[end_middle, total)` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub nodes_in: usize,
    pub nodes_middle: usize,
    pub nodes_out: usize,
}

impl Layout {
    pub fn new(nodes_in: usize, nodes_middle: usize, nodes_out: usize) -> Self {
        Self {
            nodes_in,
            nodes_middle,
            nodes_out,
        }
    }

    /// First index past the middle layer.
    #[inline]
    pub fn end_middle(&self) -> usize {
        self.nodes_in + self.nodes_middle
    }

    /// Total number of nodes.
    #[inline]
    pub fn total(&self) -> usize {
        self.end_middle() + self.nodes_out
    }

    #[inline]
    pub fn is_input(&self, n: usize) -> bool {
        n < self.nodes_in
    }

    #[inline]
    pub fn is_middle(&self, n: usize) -> bool {
        n >= self.nodes_in && n < self.end_middle()
    }

    #[inline]
    pub fn is_output(&self, n: usize) -> bool {
        n >= self.end_middle() && n < self.total()
    }

    /// Whether a link `src -> tar` is architecturally legal.
    ///
    /// Links only run input -> middle, middle -> middle or middle -> output,
    /// never from a node to itself.
    pub fn regards_structure(&self, src: usize, tar: usize) -> bool {
        if src == tar {
            return false;
        }
        (self.is_input(src) && self.is_middle(tar))
            || (self.is_middle(src) && self.is_middle(tar))
            || (self.is_middle(src) && self.is_output(tar))
    }

    /// All legal `(src, tar)` pairs, ordered by source then target.
    pub fn legal_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.end_middle()).flat_map(move |src| {
            (self.nodes_in..self.total())
                .filter(move |&tar| self.regards_structure(src, tar))
                .map(move |tar| (src, tar))
        })
    }
}

/// Robustness settings shared by the link, node and noise variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustParameters {
    /// Robustness at which a robust evolution stops (0.0-1.0).
    #[serde(default = "default_min_robustness")]
    pub min_robustness: f64,
    /// Flow error a perturbed network must stay below to count as robust.
    #[serde(default = "default_error_threshold")]
    pub robust_threshold: f64,
    /// Annealing temperature for robustness-worsening mutations.
    #[serde(default = "default_annealing_factor")]
    pub robust_factor: f64,
}

fn default_min_robustness() -> f64 {
    1.0
}

impl Default for RobustParameters {
    fn default() -> Self {
        Self {
            min_robustness: default_min_robustness(),
            robust_threshold: default_error_threshold(),
            robust_factor: default_annealing_factor(),
        }
    }
}

/// Complete parameter set of one batch of named simulations.
///
/// Built once at startup, then only read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameters {
    /// Number of input layer nodes.
    #[serde(default = "default_nodes_in")]
    pub nodes_in: u16,
    /// Number of middle layer nodes.
    #[serde(default = "default_nodes_middle")]
    pub nodes_middle: u16,
    /// Number of output layer nodes.
    #[serde(default = "default_nodes_out")]
    pub nodes_out: u16,
    /// Number of activated output nodes per input in the ideal pattern.
    #[serde(default = "default_activated_k")]
    pub activated_k: u16,
    /// Flow error below which a network counts as functional.
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,
    /// Annealing temperature for flow-error-worsening mutations.
    #[serde(default = "default_annealing_factor")]
    pub annealing_factor: f64,
    /// Maximum number of evolution ticks.
    #[serde(default = "default_max_time")]
    pub max_time: u64,
    /// Number of evenly spaced snapshots to record (0 = none).
    #[serde(default)]
    pub snapshots: u16,
    /// Seed for random number generation. Absent or zero picks one at startup.
    #[serde(default)]
    pub seed: Option<u32>,
    /// Link density of the initial random network. Absent draws one per run.
    #[serde(default)]
    pub connectivity: Option<f64>,
    /// Probability that a mutation adds rather than removes links.
    #[serde(default = "default_add_probability", alias = "add_to")]
    pub add_probability: f64,
    /// Lower complexity bound for the `complexity` pattern scheme.
    #[serde(default)]
    pub lower_bound: f64,
    /// Upper complexity bound for the `complexity` pattern scheme.
    #[serde(default)]
    pub upper_bound: f64,
    /// Network variant being evolved.
    #[serde(default)]
    pub network_type: NetworkType,
    /// Initial topology scheme.
    #[serde(default)]
    pub network_init: NetworkInit,
    /// Edge list file for the `fixed` network scheme.
    #[serde(default)]
    pub edge_list: Option<PathBuf>,
    /// Ideal pattern scheme.
    #[serde(default)]
    pub pattern_init: PatternInit,
    /// Mutation scheme.
    #[serde(default)]
    pub mutation: MutationScheme,
    /// Robustness settings (ignored by flow networks).
    #[serde(default)]
    pub robust: RobustParameters,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            nodes_in: default_nodes_in(),
            nodes_middle: default_nodes_middle(),
            nodes_out: default_nodes_out(),
            activated_k: default_activated_k(),
            error_threshold: default_error_threshold(),
            annealing_factor: default_annealing_factor(),
            max_time: default_max_time(),
            snapshots: 0,
            seed: None,
            connectivity: None,
            add_probability: default_add_probability(),
            lower_bound: 0.0,
            upper_bound: 0.0,
            network_type: NetworkType::default(),
            network_init: NetworkInit::default(),
            edge_list: None,
            pattern_init: PatternInit::default(),
            mutation: MutationScheme::default(),
            robust: RobustParameters::default(),
        }
    }
}

impl Parameters {
    /// Layer layout derived from the node counts.
    #[inline]
    pub fn layout(&self) -> Layout {
        Layout::new(
            self.nodes_in as usize,
            self.nodes_middle as usize,
            self.nodes_out as usize,
        )
    }

    /// Ticks between two snapshots, if snapshots are enabled.
    pub fn snapshot_interval(&self) -> Option<u64> {
        if self.snapshots == 0 {
            return None;
        }
        Some((self.max_time / self.snapshots as u64).max(1))
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes_in == 0 || self.nodes_middle == 0 || self.nodes_out == 0 {
            return Err(ConfigError::EmptyLayer);
        }
        if self.activated_k == 0 || self.activated_k > self.nodes_out {
            return Err(ConfigError::InvalidActivated {
                k: self.activated_k,
                nodes_out: self.nodes_out,
            });
        }
        if !(self.error_threshold > 0.0) {
            return Err(ConfigError::NonPositive("flow threshold"));
        }
        if !(self.annealing_factor > 0.0) {
            return Err(ConfigError::NonPositive("flow factor"));
        }
        if let Some(c) = self.connectivity
            && !(0.0..=1.0).contains(&c)
        {
            return Err(ConfigError::OutOfUnitRange {
                name: "connectivity",
                value: c,
            });
        }
        if !(0.0..=1.0).contains(&self.add_probability) {
            return Err(ConfigError::OutOfUnitRange {
                name: "add-to",
                value: self.add_probability,
            });
        }
        if self.pattern_init == PatternInit::Complexity && self.lower_bound > self.upper_bound {
            return Err(ConfigError::InvertedBounds {
                lower: self.lower_bound,
                upper: self.upper_bound,
            });
        }
        if self.network_init == NetworkInit::Fixed && self.edge_list.is_none() {
            return Err(ConfigError::MissingEdgeList);
        }
        if self.network_type.is_robust() {
            if !(0.0..=1.0).contains(&self.robust.min_robustness) {
                return Err(ConfigError::OutOfUnitRange {
                    name: "min-robustness",
                    value: self.robust.min_robustness,
                });
            }
            if !(self.robust.robust_threshold > 0.0) {
                return Err(ConfigError::NonPositive("robust threshold"));
            }
            if !(self.robust.robust_factor > 0.0) {
                return Err(ConfigError::NonPositive("robust factor"));
            }
        }
        if let Some(level) = self.network_type.noise_level()
            && !(level >= 0.0)
        {
            return Err(ConfigError::NonPositive("noise level"));
        }
        Ok(())
    }

    /// Advisory messages about legal but questionable settings.
    pub fn advisories(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if self.nodes_in >= self.nodes_middle || self.nodes_out >= self.nodes_middle {
            notes.push(
                "It is advisable that the network middle layer contains the most nodes."
                    .to_string(),
            );
        }
        if let Some(level) = self.network_type.noise_level() {
            if level == 0.0 {
                notes.push(
                    "Noise robust networks with zero noise intensity reduce to node robust networks."
                        .to_string(),
                );
            }
            if level >= 1.0 {
                notes.push(
                    "Noise robust networks with such high noise intensity are unlikely to evolve properly."
                        .to_string(),
                );
            }
        }
        if self.pattern_init != PatternInit::Complexity
            && (self.lower_bound != 0.0 || self.upper_bound != 0.0)
        {
            notes.push(format!(
                "Complexity bounds are ignored by the '{}' pattern scheme.",
                self.pattern_init
            ));
        }
        notes
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Layer sizes (input, middle, output) must be non-zero")]
    EmptyLayer,
    #[error("Activated nodes {k} must lie in 1..={nodes_out}")]
    InvalidActivated { k: u16, nodes_out: u16 },
    #[error("The {0} must be positive")]
    NonPositive(&'static str),
    #[error("The {name} must lie between 0 and 1, got {value}")]
    OutOfUnitRange { name: &'static str, value: f64 },
    #[error("Complexity lower bound {lower} exceeds upper bound {upper}")]
    InvertedBounds { lower: f64, upper: f64 },
    #[error("The fixed network scheme requires an edge list file")]
    MissingEdgeList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_ranges() {
        let layout = Layout::new(2, 3, 2);
        assert_eq!(layout.end_middle(), 5);
        assert_eq!(layout.total(), 7);
        assert!(layout.is_input(1));
        assert!(layout.is_middle(2));
        assert!(layout.is_middle(4));
        assert!(layout.is_output(5));
        assert!(!layout.is_output(7));
    }

    #[test]
    fn test_regards_structure() {
        let layout = Layout::new(2, 3, 2);
        assert!(layout.regards_structure(0, 2));
        assert!(layout.regards_structure(2, 3));
        assert!(layout.regards_structure(4, 6));
        assert!(!layout.regards_structure(0, 1));
        assert!(!layout.regards_structure(0, 5));
        assert!(!layout.regards_structure(3, 3));
        assert!(!layout.regards_structure(3, 0));
        assert!(!layout.regards_structure(5, 6));
        assert!(!layout.regards_structure(6, 2));
    }

    #[test]
    fn test_legal_pairs_count() {
        let layout = Layout::new(2, 3, 2);
        // 2*3 input->middle, 3*2 middle->middle, 3*2 middle->output
        assert_eq!(layout.legal_pairs().count(), 18);
        assert!(layout.legal_pairs().all(|(s, t)| layout.regards_structure(s, t)));
    }

    #[test]
    fn test_default_is_valid() {
        let params = Parameters::default();
        assert!(params.validate().is_ok());
        assert!(params.advisories().is_empty());
        assert_eq!(params.layout().total(), 36);
    }

    #[test]
    fn test_validation_errors() {
        let params = Parameters {
            activated_k: 9,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::InvalidActivated { k: 9, nodes_out: 8 })
        ));

        let params = Parameters {
            network_init: NetworkInit::Fixed,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(ConfigError::MissingEdgeList)));

        let params = Parameters {
            connectivity: Some(1.5),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_advisories() {
        let params = Parameters {
            nodes_middle: 4,
            network_type: NetworkType::NoiseRobust { noise_level: 0.0 },
            ..Default::default()
        };
        assert_eq!(params.advisories().len(), 2);
    }

    #[test]
    fn test_snapshot_interval() {
        let mut params = Parameters::default();
        assert_eq!(params.snapshot_interval(), None);
        params.snapshots = 4;
        assert_eq!(params.snapshot_interval(), Some(25_000));
        params.max_time = 2;
        assert_eq!(params.snapshot_interval(), Some(1));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: Parameters =
            serde_json::from_str(r#"{"nodes_middle": 30, "mutation": "link"}"#).unwrap();
        assert_eq!(params.nodes_middle, 30);
        assert_eq!(params.nodes_in, 8);
        assert_eq!(params.mutation, MutationScheme::Link);
        assert_eq!(params.robust.min_robustness, 1.0);
    }
}
