//! Flow computation.
//!
//! A unit of flow injected at an input node is split evenly over the node's
//! outgoing links, every middle node passes on everything it receives, and
//! output nodes absorb. The steady state `x` for input `n` solves `M x = e_n`
//! with `M = I - W`, where `W[i, s]` is the share of node `s`'s flow sent to
//! node `i`. The output slice of `x` is column `n` of the output pattern.

use ndarray::{Array1, Array2, s};
use rand::prelude::*;

use crate::compute::{LuDecomposition, Pattern, SolveError, Topology};
use crate::schema::Layout;

/// Output value written to every cell when the system is singular.
pub const RECOVERY_SENTINEL: f64 = 2.0;

/// System matrix for an unweighted topology.
///
/// Rows are filled from the last input node on, so flow an edge list routes
/// into that input is passed on.
pub fn build_system(topology: &Topology, layout: Layout) -> Array2<f64> {
    let total = layout.total();
    let out_degree: Vec<usize> = (0..total).map(|n| topology.out_degree(n)).collect();

    let mut system = Array2::eye(total);
    for tar in layout.nodes_in.saturating_sub(1)..total {
        for src in topology.in_neighbors(tar) {
            system[[tar, src]] = -1.0 / out_degree[src] as f64;
        }
    }
    system
}

/// System matrix with every legal link weighted by noise.
///
/// Present links get weight `1 - level * U`, absent links `level * U`, so a
/// noise level of zero reproduces [`build_system`]. Weights leaving a node are
/// normalised by their sum.
pub fn build_noisy_system(
    topology: &Topology,
    layout: Layout,
    noise_level: f64,
    rng: &mut StdRng,
) -> Array2<f64> {
    let total = layout.total();
    let mut weights = Array2::<f64>::zeros((total, total));
    for src in 0..layout.end_middle() {
        for tar in layout.nodes_in..total {
            if !layout.regards_structure(src, tar) {
                continue;
            }
            let u = rng.r#gen::<f64>();
            weights[[tar, src]] = if topology.has_edge(src, tar) {
                1.0 - noise_level * u
            } else {
                noise_level * u
            };
        }
    }

    let outflow: Array1<f64> = weights.sum_axis(ndarray::Axis(0));
    let mut system = Array2::eye(total);
    for ((tar, src), &w) in weights.indexed_iter() {
        if w != 0.0 {
            system[[tar, src]] = -w / outflow[src];
        }
    }
    system
}

/// Solve the system once per input node and gather the output pattern.
///
/// Returns [`SolveError::Singular`] when a pivot vanishes; the caller decides
/// how to recover.
pub fn solve_output(system: Array2<f64>, layout: Layout) -> Result<Pattern, SolveError> {
    let lu = LuDecomposition::new(system)?;
    let mut output = Pattern::zeros((layout.nodes_out, layout.nodes_in));
    for n in 0..layout.nodes_in {
        let x = lu.solve_unit(n)?;
        output
            .column_mut(n)
            .assign(&x.slice(s![layout.end_middle()..]));
    }
    Ok(output)
}

/// Like [`solve_output`], but a singular system yields the sentinel output.
///
/// The flag is `true` when the sentinel was used.
pub fn solve_or_recover(system: Array2<f64>, layout: Layout) -> Result<(Pattern, bool), SolveError> {
    match solve_output(system, layout) {
        Ok(output) => Ok((output, false)),
        Err(err) if err.is_singular() => {
            log::debug!("{}, recovering with sentinel output", err);
            Ok((sentinel_output(layout), true))
        }
        Err(err) => Err(err),
    }
}

/// Output pattern with every entry set to [`RECOVERY_SENTINEL`].
pub fn sentinel_output(layout: Layout) -> Pattern {
    Pattern::from_elem((layout.nodes_out, layout.nodes_in), RECOVERY_SENTINEL)
}

/// Squared deviation between `ideal` and `output`, halved and averaged over inputs.
pub fn flow_error(ideal: &Pattern, output: &Pattern) -> f64 {
    let sum: f64 = ideal
        .iter()
        .zip(output.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum();
    sum / (2.0 * ideal.ncols() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::EdgeList;
    use ndarray::array;

    /// 2 inputs, 2 middle, 2 outputs. Input 0 feeds both middles, input 1
    /// feeds middle 3, middle 2 feeds output 4, middle 3 splits over both.
    fn diamond() -> (Topology, Layout) {
        let layout = Layout::new(2, 2, 2);
        let topology =
            Topology::from_edges(layout.total(), [(0, 2), (0, 3), (1, 3), (2, 4), (3, 4), (3, 5)]);
        (topology, layout)
    }

    #[test]
    fn test_build_system() {
        let (topology, layout) = diamond();
        let m = build_system(&topology, layout);
        assert_eq!(m[[2, 0]], -0.5);
        assert_eq!(m[[3, 1]], -1.0);
        assert_eq!(m[[5, 3]], -0.5);
        assert_eq!(m[[0, 0]], 1.0);
        assert_eq!(m.diag().sum(), 6.0);
    }

    #[test]
    fn test_solve_output_diamond() {
        let (topology, layout) = diamond();
        let output = solve_output(build_system(&topology, layout), layout).unwrap();
        let expected = array![[0.75, 0.5], [0.25, 0.5]];
        for (a, b) in output.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        // all flow reaches the outputs
        for col in output.columns() {
            assert!((col.sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_flow_into_last_input_is_passed_on() {
        // 0 -> 1 is input to input; 1 is the last input
        let layout = Layout::new(2, 1, 1);
        let edges = EdgeList::parse("0 1\n1 2\n0 2\n2 3\n", layout).unwrap();
        let topology = edges.to_topology(layout);
        assert!(topology.has_edge(0, 1));

        let system = build_system(&topology, layout);
        assert_eq!(system[[1, 0]], -0.5);

        let output = solve_output(system, layout).unwrap();
        assert!((output[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((output[[0, 1]] - 1.0).abs() < 1e-12);
        assert_eq!(flow_error(&array![[1.0, 1.0]], &output), 0.0);
    }

    #[test]
    fn test_zero_noise_matches_plain_system() {
        let (topology, layout) = diamond();
        let mut rng = StdRng::seed_from_u64(8);
        let noisy = build_noisy_system(&topology, layout, 0.0, &mut rng);
        let plain = build_system(&topology, layout);
        for (a, b) in noisy.iter().zip(plain.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_noisy_columns_normalised() {
        let (topology, layout) = diamond();
        let mut rng = StdRng::seed_from_u64(8);
        let noisy = build_noisy_system(&topology, layout, 0.3, &mut rng);
        let output = solve_output(noisy, layout).unwrap();
        for col in output.columns() {
            assert!((col.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_singular_cycle() {
        let layout = Layout::new(1, 2, 1);
        // 1 <-> 2 closed cycle reached from the input, nothing leaves it
        let topology = Topology::from_edges(layout.total(), [(0, 1), (1, 2), (2, 1)]);
        let err = solve_output(build_system(&topology, layout), layout).unwrap_err();
        assert!(err.is_singular());

        let (output, recovered) =
            solve_or_recover(build_system(&topology, layout), layout).unwrap();
        assert!(recovered);
        assert!(output.iter().all(|&v| v == RECOVERY_SENTINEL));
    }

    #[test]
    fn test_flow_error() {
        let ideal = array![[1.0, 0.0], [0.0, 1.0]];
        assert_eq!(flow_error(&ideal, &ideal), 0.0);
        let output = array![[0.0, 0.0], [0.0, 0.0]];
        assert_eq!(flow_error(&ideal, &output), 0.5);
        let sentinel = sentinel_output(Layout::new(2, 1, 2));
        assert_eq!(flow_error(&ideal, &sentinel), (1.0 + 4.0 + 4.0 + 1.0) / 4.0);
    }
}
