//! Stochastic topology mutation operators.

use rand::prelude::*;

use crate::compute::Topology;
use crate::schema::{Layout, MutationScheme};

/// What a single mutation did to the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Edges the operator added or removed, in the order they were visited.
    pub edges: Vec<(usize, usize)>,
    /// `true` for an adding mutation, `false` for a removing one.
    pub added: bool,
}

/// A strategy for perturbing a candidate topology.
pub trait MutationOperator {
    /// Perturb `topology` in place.
    fn mutate(&self, topology: &mut Topology, rng: &mut StdRng) -> MutationRecord;

    /// Scheme tag this operator implements.
    fn scheme(&self) -> MutationScheme;
}

/// Create the operator registered for `scheme`.
pub fn mutation_operator(
    scheme: MutationScheme,
    layout: Layout,
    add_probability: f64,
) -> Box<dyn MutationOperator> {
    match scheme {
        MutationScheme::Link => Box::new(LinkMutation::new(layout, add_probability)),
        MutationScheme::Path => Box::new(PathMutation::new(layout, add_probability)),
    }
}

#[inline]
fn apply(topology: &mut Topology, src: usize, tar: usize, add: bool) {
    if add {
        topology.add_edge(src, tar);
    } else {
        topology.remove_edge(src, tar);
    }
}

/// Toggle a single legal link.
#[derive(Debug, Clone)]
pub struct LinkMutation {
    layout: Layout,
    add_probability: f64,
}

impl LinkMutation {
    pub fn new(layout: Layout, add_probability: f64) -> Self {
        Self {
            layout,
            add_probability,
        }
    }
}

impl MutationOperator for LinkMutation {
    fn mutate(&self, topology: &mut Topology, rng: &mut StdRng) -> MutationRecord {
        let total = self.layout.total();

        let mut src = rng.gen_range(0..total);
        while self.layout.is_output(src) {
            src = rng.gen_range(0..total);
        }
        let mut tar = rng.gen_range(0..total);
        while !self.layout.regards_structure(src, tar) {
            tar = rng.gen_range(0..total);
        }

        let added = rng.r#gen::<f64>() < self.add_probability;
        apply(topology, src, tar, added);

        MutationRecord {
            edges: vec![(src, tar)],
            added,
        }
    }

    fn scheme(&self) -> MutationScheme {
        MutationScheme::Link
    }
}

/// Add or remove every link along a random input-to-output path.
///
/// The path starts at an input node, visits between one and `nodes_middle`
/// middle nodes (consecutive nodes differ, repeats are allowed) and ends at
/// an output node.
#[derive(Debug, Clone)]
pub struct PathMutation {
    layout: Layout,
    add_probability: f64,
}

impl PathMutation {
    pub fn new(layout: Layout, add_probability: f64) -> Self {
        Self {
            layout,
            add_probability,
        }
    }
}

impl MutationOperator for PathMutation {
    fn mutate(&self, topology: &mut Topology, rng: &mut StdRng) -> MutationRecord {
        let layout = &self.layout;

        let length = rng.gen_range(1..=layout.nodes_middle);
        let end = rng.gen_range(layout.end_middle()..layout.total());
        let mut src = rng.gen_range(0..layout.nodes_in);
        let added = rng.r#gen::<f64>() < self.add_probability;

        let mut edges = Vec::with_capacity(length + 1);
        for _ in 0..length {
            let mut tar = rng.gen_range(layout.nodes_in..layout.end_middle());
            while tar == src {
                tar = rng.gen_range(layout.nodes_in..layout.end_middle());
            }
            apply(topology, src, tar, added);
            edges.push((src, tar));
            src = tar;
        }
        apply(topology, src, end, added);
        edges.push((src, end));

        MutationRecord { edges, added }
    }

    fn scheme(&self) -> MutationScheme {
        MutationScheme::Path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn layout() -> Layout {
        Layout::new(3, 5, 3)
    }

    #[test]
    fn test_registry() {
        for scheme in [MutationScheme::Link, MutationScheme::Path] {
            assert_eq!(mutation_operator(scheme, layout(), 0.5).scheme(), scheme);
        }
    }

    #[test]
    fn test_link_add_and_remove() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut topology = Topology::new(layout().total());

        let adder = LinkMutation::new(layout(), 1.0);
        let record = adder.mutate(&mut topology, &mut rng);
        assert!(record.added);
        let (src, tar) = record.edges[0];
        assert!(topology.has_edge(src, tar));

        let remover = LinkMutation::new(layout(), 0.0);
        let mut full = Topology::from_edges(layout().total(), layout().legal_pairs());
        let record = remover.mutate(&mut full, &mut rng);
        assert!(!record.added);
        assert_eq!(full.num_edges(), layout().legal_pairs().count() - 1);
    }

    #[test]
    fn test_path_is_connected() {
        let mut rng = StdRng::seed_from_u64(9);
        let op = PathMutation::new(layout(), 1.0);
        let mut topology = Topology::new(layout().total());
        let record = op.mutate(&mut topology, &mut rng);

        let (first, _) = record.edges[0];
        let (_, last) = *record.edges.last().unwrap();
        assert!(layout().is_input(first));
        assert!(layout().is_output(last));
        for pair in record.edges.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        assert!(record.edges.iter().all(|&(s, t)| topology.has_edge(s, t)));
    }

    #[test]
    fn test_single_middle_node_path() {
        let layout = Layout::new(1, 1, 1);
        let mut rng = StdRng::seed_from_u64(2);
        let op = PathMutation::new(layout, 1.0);
        let mut topology = Topology::new(layout.total());
        let record = op.mutate(&mut topology, &mut rng);
        assert_eq!(record.edges, vec![(0, 1), (1, 2)]);
    }

    proptest! {
        #[test]
        fn prop_mutations_stay_legal(
            seed in any::<u64>(),
            steps in 1usize..60,
            add_probability in 0.0f64..=1.0,
            path in any::<bool>(),
        ) {
            let scheme = if path { MutationScheme::Path } else { MutationScheme::Link };
            let op = mutation_operator(scheme, layout(), add_probability);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut topology = Topology::new(layout().total());
            for _ in 0..steps {
                op.mutate(&mut topology, &mut rng);
            }
            for (s, t) in topology.edges() {
                prop_assert!(layout().regards_structure(s, t));
            }
        }
    }
}
