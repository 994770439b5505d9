//! Snapshots of a run keyed by simulated time.

use std::collections::BTreeMap;

use crate::compute::FlowNetwork;

/// Deep copies of the evolving network taken at snapshot times.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: BTreeMap<u64, FlowNetwork>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `network` at `time`, replacing any earlier snapshot at that time.
    pub fn record(&mut self, time: u64, network: &FlowNetwork) {
        self.snapshots.insert(time, network.clone());
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, time: u64) -> Option<&FlowNetwork> {
        self.snapshots.get(&time)
    }

    /// Snapshot times in ascending order.
    pub fn times(&self) -> impl Iterator<Item = u64> + '_ {
        self.snapshots.keys().copied()
    }

    /// Remove and return all snapshots in time order.
    pub fn drain(&mut self) -> impl Iterator<Item = (u64, FlowNetwork)> {
        std::mem::take(&mut self.snapshots).into_iter()
    }
}
