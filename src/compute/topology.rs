//! Directed, unweighted network topology over indexed nodes.

use std::collections::VecDeque;

/// Dense adjacency matrix of a directed graph without self loops.
///
/// Networks here are small (tens of nodes) and cloned on every evolution
/// step, so a flat boolean matrix beats an adjacency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    num_nodes: usize,
    /// Row-major `adjacency[src * num_nodes + tar]`.
    adjacency: Vec<bool>,
    num_edges: usize,
}

impl Topology {
    /// Create an edgeless topology.
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            adjacency: vec![false; num_nodes * num_nodes],
            num_edges: 0,
        }
    }

    /// Build from an edge iterator. Self loops are ignored.
    pub fn from_edges(num_nodes: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut topology = Self::new(num_nodes);
        for (src, tar) in edges {
            topology.add_edge(src, tar);
        }
        topology
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    #[inline]
    fn index(&self, src: usize, tar: usize) -> usize {
        debug_assert!(src < self.num_nodes && tar < self.num_nodes);
        src * self.num_nodes + tar
    }

    #[inline]
    pub fn has_edge(&self, src: usize, tar: usize) -> bool {
        self.adjacency[self.index(src, tar)]
    }

    /// Insert `src -> tar`. Returns `true` if the edge was not present before.
    pub fn add_edge(&mut self, src: usize, tar: usize) -> bool {
        if src == tar {
            return false;
        }
        let idx = self.index(src, tar);
        if self.adjacency[idx] {
            return false;
        }
        self.adjacency[idx] = true;
        self.num_edges += 1;
        true
    }

    /// Delete `src -> tar`. Returns `true` if the edge existed.
    pub fn remove_edge(&mut self, src: usize, tar: usize) -> bool {
        let idx = self.index(src, tar);
        if !self.adjacency[idx] {
            return false;
        }
        self.adjacency[idx] = false;
        self.num_edges -= 1;
        true
    }

    /// Remove every edge touching `node`.
    pub fn clear_node(&mut self, node: usize) {
        for other in 0..self.num_nodes {
            self.remove_edge(node, other);
            self.remove_edge(other, node);
        }
    }

    /// Targets of edges leaving `node`, ascending.
    pub fn out_neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        let row = &self.adjacency[node * self.num_nodes..(node + 1) * self.num_nodes];
        row.iter()
            .enumerate()
            .filter_map(|(tar, &present)| present.then_some(tar))
    }

    /// Sources of edges entering `node`, ascending.
    pub fn in_neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_nodes).filter(move |&src| self.has_edge(src, node))
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.out_neighbors(node).count()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.in_neighbors(node).count()
    }

    /// All edges ordered by source, then target.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .filter_map(|(idx, &present)| {
                present.then_some((idx / self.num_nodes, idx % self.num_nodes))
            })
    }

    /// Nodes reachable by a forward breadth-first search from any of `sources`.
    ///
    /// The sources themselves count as reached.
    pub fn reachable_from(&self, sources: impl IntoIterator<Item = usize>) -> Vec<bool> {
        let mut reached = vec![false; self.num_nodes];
        let mut queue = VecDeque::new();
        for src in sources {
            if !reached[src] {
                reached[src] = true;
                queue.push_back(src);
            }
        }
        while let Some(node) = queue.pop_front() {
            for next in self.out_neighbors(node) {
                if !reached[next] {
                    reached[next] = true;
                    queue.push_back(next);
                }
            }
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove_edge() {
        let mut topology = Topology::new(4);
        assert!(topology.add_edge(0, 1));
        assert!(!topology.add_edge(0, 1));
        assert!(!topology.add_edge(2, 2));
        assert_eq!(topology.num_edges(), 1);
        assert!(topology.has_edge(0, 1));
        assert!(!topology.has_edge(1, 0));

        assert!(topology.remove_edge(0, 1));
        assert!(!topology.remove_edge(0, 1));
        assert_eq!(topology.num_edges(), 0);
    }

    #[test]
    fn test_degrees_and_neighbors() {
        let topology = Topology::from_edges(5, [(0, 2), (1, 2), (2, 3), (2, 4)]);
        assert_eq!(topology.in_degree(2), 2);
        assert_eq!(topology.out_degree(2), 2);
        assert_eq!(topology.out_neighbors(2).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(topology.in_neighbors(2).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(
            topology.edges().collect::<Vec<_>>(),
            vec![(0, 2), (1, 2), (2, 3), (2, 4)]
        );
    }

    #[test]
    fn test_clear_node() {
        let mut topology = Topology::from_edges(4, [(0, 1), (1, 2), (2, 1), (2, 3)]);
        topology.clear_node(1);
        assert_eq!(topology.edges().collect::<Vec<_>>(), vec![(2, 3)]);
        assert_eq!(topology.num_edges(), 1);
    }

    #[test]
    fn test_reachable_from() {
        let topology = Topology::from_edges(6, [(0, 2), (2, 3), (4, 5)]);
        let reached = topology.reachable_from([0, 1]);
        assert_eq!(reached, vec![true, true, true, true, false, false]);
    }
}
