//! Initial network wiring.
//!
//! Either a random Bernoulli wiring of every legal link, or a fixed edge list
//! read from a text file.

use std::fs;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand_distr::Bernoulli;

use crate::compute::Topology;
use crate::schema::{Layout, NetworkInit, Parameters};

/// Errors from building the initial topology.
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("Failed to read edge list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Bad line format in edge list at line {line}: '{content}'")]
    MalformedLine { line: usize, content: String },
    #[error("Invalid node index '{field}' in edge list at line {line}")]
    InvalidIndex { line: usize, field: String },
    #[error("Node index {index} at line {line} exceeds network size {total}")]
    OutOfRange {
        line: usize,
        index: usize,
        total: usize,
    },
    #[error("Connectivity {0} is not a probability")]
    InvalidConnectivity(f64),
    #[error("The fixed network scheme requires an edge list file")]
    MissingEdgeList,
}

/// Build the initial topology selected by `params.network_init`.
pub fn initial_topology(
    params: &Parameters,
    connectivity: f64,
    rng: &mut StdRng,
) -> Result<Topology, WiringError> {
    let layout = params.layout();
    match params.network_init {
        NetworkInit::Random => random_wiring(layout, connectivity, rng),
        NetworkInit::Fixed => {
            let path = params
                .edge_list
                .as_deref()
                .ok_or(WiringError::MissingEdgeList)?;
            Ok(EdgeList::from_path(path, layout)?.to_topology(layout))
        }
    }
}

/// Add every legal link independently with probability `connectivity`.
///
/// Pairs are visited by source, then target, one draw each.
pub fn random_wiring(
    layout: Layout,
    connectivity: f64,
    rng: &mut StdRng,
) -> Result<Topology, WiringError> {
    let coin =
        Bernoulli::new(connectivity).map_err(|_| WiringError::InvalidConnectivity(connectivity))?;
    let mut topology = Topology::new(layout.total());
    for (src, tar) in layout.legal_pairs() {
        if coin.sample(rng) {
            topology.add_edge(src, tar);
        }
    }
    Ok(topology)
}

/// Parsed `src tar` pairs from an edge list file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdgeList {
    pub edges: Vec<(usize, usize)>,
}

impl EdgeList {
    /// Parse edge list text.
    ///
    /// One edge per line, fields split on spaces, tabs or commas. Blank
    /// lines and lines starting with `#` are skipped. Extra fields after the
    /// first two are ignored.
    pub fn parse(text: &str, layout: Layout) -> Result<Self, WiringError> {
        let total = layout.total();
        let mut edges = Vec::new();

        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed
                .split([' ', '\t', ','])
                .filter(|f| !f.is_empty())
                .collect();
            if fields.len() < 2 {
                return Err(WiringError::MalformedLine {
                    line,
                    content: trimmed.to_string(),
                });
            }

            let mut pair = [0usize; 2];
            for (slot, field) in pair.iter_mut().zip(&fields) {
                let index: usize = field.parse().map_err(|_| WiringError::InvalidIndex {
                    line,
                    field: field.to_string(),
                })?;
                if index >= total {
                    return Err(WiringError::OutOfRange { line, index, total });
                }
                *slot = index;
            }
            edges.push((pair[0], pair[1]));
        }

        Ok(Self { edges })
    }

    pub fn from_path(path: &Path, layout: Layout) -> Result<Self, WiringError> {
        let text = fs::read_to_string(path).map_err(|source| WiringError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, layout)
    }

    /// Build a topology from the listed edges.
    ///
    /// Edges outside the layered structure are kept but reported.
    pub fn to_topology(&self, layout: Layout) -> Topology {
        let mut topology = Topology::new(layout.total());
        for &(src, tar) in &self.edges {
            if !layout.regards_structure(src, tar) {
                log::warn!(
                    "Edge {} -> {} does not follow the layered structure",
                    src,
                    tar
                );
            }
            topology.add_edge(src, tar);
        }
        topology
    }
}
