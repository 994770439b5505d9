//! Ideal output patterns.
//!
//! A pattern is a `nodes_out x nodes_in` matrix. Column `j` is the share of
//! the unit flow injected at input `j` that should arrive at each output
//! node, so every column sums to one.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use ndarray::Array2;
use rand::prelude::*;

use crate::compute::numeric::fcmp;
use crate::schema::{Parameters, PatternInit};

/// Dense `nodes_out x nodes_in` flow distribution.
pub type Pattern = Array2<f64>;

/// Upper limit on resampling for the bounded complexity scheme.
pub const MAX_COMPLEXITY_ATTEMPTS: u32 = 1_000_000;

/// Errors from pattern initialisation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PatternError {
    #[error(
        "No pattern with complexity in [{lower}, {upper}] found after {attempts} attempts"
    )]
    ComplexityExhausted { lower: f64, upper: f64, attempts: u32 },
}

/// Build the ideal pattern selected by `scheme`.
pub fn init_pattern(
    scheme: PatternInit,
    params: &Parameters,
    rng: &mut StdRng,
) -> Result<Pattern, PatternError> {
    let nodes_out = params.nodes_out as usize;
    let nodes_in = params.nodes_in as usize;
    let k = params.activated_k as usize;

    let pattern = match scheme {
        PatternInit::Random => random_pattern(nodes_out, nodes_in, k, rng),
        PatternInit::Complexity => bounded_complexity_pattern(
            nodes_out,
            nodes_in,
            k,
            params.lower_bound,
            params.upper_bound,
            rng,
        )?,
        PatternInit::HighComplexity => {
            dominant_pattern(nodes_out, nodes_in, k, params.error_threshold, true)
        }
        PatternInit::LowComplexity => {
            dominant_pattern(nodes_out, nodes_in, k, params.error_threshold, false)
        }
        PatternInit::EqualComplexity => equal_pattern(nodes_out, nodes_in, k, false),
        PatternInit::EqualSpread => equal_pattern(nodes_out, nodes_in, k, true),
    };
    Ok(pattern)
}

/// Sum over all column pairs `i < j` of their dot products.
///
/// Zero when no two inputs share an output node, large when every input
/// targets the same outputs.
pub fn complexity(pattern: &Pattern) -> f64 {
    let cols = pattern.ncols();
    let mut total = 0.0;
    for i in 0..cols {
        for j in (i + 1)..cols {
            total += pattern.column(i).dot(&pattern.column(j));
        }
    }
    total
}

/// `k` distinct random rows per column with random weights normalised to one.
pub fn random_pattern(nodes_out: usize, nodes_in: usize, k: usize, rng: &mut StdRng) -> Pattern {
    let mut pattern = Pattern::zeros((nodes_out, nodes_in));
    for col in 0..nodes_in {
        let values: Vec<f64> = (0..k).map(|_| rng.r#gen::<f64>()).collect();
        let sum: f64 = values.iter().sum();

        let mut rows = BTreeSet::new();
        while rows.len() < k {
            rows.insert(rng.gen_range(0..nodes_out));
        }

        for (row, value) in rows.into_iter().zip(values) {
            pattern[[row, col]] = value / sum;
        }
    }
    pattern
}

fn bounded_complexity_pattern(
    nodes_out: usize,
    nodes_in: usize,
    k: usize,
    lower: f64,
    upper: f64,
    rng: &mut StdRng,
) -> Result<Pattern, PatternError> {
    for _ in 0..MAX_COMPLEXITY_ATTEMPTS {
        let pattern = random_pattern(nodes_out, nodes_in, k, rng);
        let c = complexity(&pattern);
        if fcmp(c, upper) != Ordering::Greater && fcmp(c, lower) != Ordering::Less {
            return Ok(pattern);
        }
    }
    Err(PatternError::ComplexityExhausted {
        lower,
        upper,
        attempts: MAX_COMPLEXITY_ATTEMPTS,
    })
}

/// One dominant weight plus `k - 1` weights of `sqrt(2 * error_threshold)`.
///
/// `spread` shifts the row window by one per column, otherwise every column
/// uses rows `0..k`.
fn dominant_pattern(
    nodes_out: usize,
    nodes_in: usize,
    k: usize,
    error_threshold: f64,
    spread: bool,
) -> Pattern {
    let epsilon = (2.0 * error_threshold).sqrt();
    let mut values = vec![epsilon; k];
    values[0] = 1.0 - (k as f64 - 1.0) * epsilon;
    fill_window(nodes_out, nodes_in, &values, spread)
}

fn equal_pattern(nodes_out: usize, nodes_in: usize, k: usize, spread: bool) -> Pattern {
    let values = vec![1.0 / k as f64; k];
    fill_window(nodes_out, nodes_in, &values, spread)
}

fn fill_window(nodes_out: usize, nodes_in: usize, values: &[f64], spread: bool) -> Pattern {
    let mut pattern = Pattern::zeros((nodes_out, nodes_in));
    for col in 0..nodes_in {
        for (i, &value) in values.iter().enumerate() {
            let row = if spread { (i + col) % nodes_out } else { i };
            pattern[[row, col]] = value;
        }
    }
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params(nodes_in: u16, nodes_out: u16, k: u16) -> Parameters {
        Parameters {
            nodes_in,
            nodes_out,
            activated_k: k,
            ..Default::default()
        }
    }

    fn assert_columns_sum_to_one(pattern: &Pattern) {
        for col in pattern.columns() {
            assert!((col.sum() - 1.0).abs() < 1e-9, "column sum {}", col.sum());
        }
    }

    #[test]
    fn test_random_pattern_support() {
        let mut rng = StdRng::seed_from_u64(3);
        let pattern = random_pattern(8, 8, 4, &mut rng);
        assert_eq!(pattern.dim(), (8, 8));
        for col in pattern.columns() {
            assert_eq!(col.iter().filter(|&&v| v > 0.0).count(), 4);
        }
        assert_columns_sum_to_one(&pattern);
    }

    #[test]
    fn test_every_scheme_normalised() {
        let p = params(6, 5, 3);
        let mut rng = StdRng::seed_from_u64(11);
        for scheme in [
            PatternInit::Random,
            PatternInit::HighComplexity,
            PatternInit::LowComplexity,
            PatternInit::EqualComplexity,
            PatternInit::EqualSpread,
        ] {
            let pattern = init_pattern(scheme, &p, &mut rng).unwrap();
            assert_eq!(pattern.dim(), (5, 6));
            assert_columns_sum_to_one(&pattern);
        }
    }

    #[test]
    fn test_equal_spread_layout() {
        let pattern = equal_pattern(3, 3, 2, true);
        // column 2 wraps around to rows 2 and 0
        assert_eq!(pattern[[2, 2]], 0.5);
        assert_eq!(pattern[[0, 2]], 0.5);
        assert_eq!(pattern[[1, 2]], 0.0);
    }

    #[test]
    fn test_complexity_ordering() {
        let low = dominant_pattern(8, 8, 4, 0.007, false);
        let high = dominant_pattern(8, 8, 4, 0.007, true);
        assert!(complexity(&low) > complexity(&high));

        // identical columns with one active row: every pair contributes 1
        let same = equal_pattern(4, 3, 1, false);
        assert!((complexity(&same) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounded_complexity() {
        let mut p = params(4, 4, 2);
        p.pattern_init = PatternInit::Complexity;
        p.lower_bound = 0.0;
        p.upper_bound = 10.0;
        let mut rng = StdRng::seed_from_u64(5);
        let pattern = init_pattern(PatternInit::Complexity, &p, &mut rng).unwrap();
        let c = complexity(&pattern);
        assert!((0.0..=10.0).contains(&c));
    }

    #[test]
    fn test_unreachable_complexity_bounds() {
        let mut rng = StdRng::seed_from_u64(5);
        // Two inputs, one output: the only pattern has complexity exactly 1.
        let err = bounded_complexity_pattern(1, 2, 1, 5.0, 6.0, &mut rng).unwrap_err();
        assert!(matches!(err, PatternError::ComplexityExhausted { .. }));
    }

    proptest! {
        #[test]
        fn prop_random_columns_sum_to_one(
            nodes_out in 1usize..12,
            nodes_in in 1usize..12,
            k_frac in 0.0f64..1.0,
            seed in any::<u64>(),
        ) {
            let k = 1 + ((nodes_out - 1) as f64 * k_frac) as usize;
            let mut rng = StdRng::seed_from_u64(seed);
            let pattern = random_pattern(nodes_out, nodes_in, k, &mut rng);
            for col in pattern.columns() {
                prop_assert!((col.sum() - 1.0).abs() < 1e-9);
                prop_assert!(col.iter().all(|&v| (0.0..=1.0).contains(&v)));
            }
        }
    }
}
