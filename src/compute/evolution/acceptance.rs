//! Simulated annealing acceptance rules.
//!
//! Improvements are always accepted. A worsening candidate is accepted with
//! probability `exp(-delta / temperature)`, where the temperature scales with
//! how far the current network is from perfect.

use std::cmp::Ordering;

use rand::prelude::*;

use crate::compute::numeric::fcmp;

/// Accept `candidate` over `current` flow error.
///
/// Temperature is `annealing_factor * current`; a current error of zero
/// rejects every non-improving candidate.
pub fn accept_flow(current: f64, candidate: f64, annealing_factor: f64, rng: &mut StdRng) -> bool {
    if fcmp(candidate, current) == Ordering::Less {
        return true;
    }
    anneal(current - candidate, annealing_factor * current, rng)
}

/// Accept `candidate` over `current` robustness (higher is better).
///
/// Temperature is `robust_factor * (1 - current)`; a current robustness of
/// one rejects every non-improving candidate.
pub fn accept_robustness(
    current: f64,
    candidate: f64,
    robust_factor: f64,
    rng: &mut StdRng,
) -> bool {
    if fcmp(candidate, current) == Ordering::Greater {
        return true;
    }
    anneal(candidate - current, robust_factor * (1.0 - current), rng)
}

/// Draw `U` and accept iff `U < exp(gain / temperature)`. `gain` is not positive.
fn anneal(gain: f64, temperature: f64, rng: &mut StdRng) -> bool {
    if !(temperature > 0.0) {
        return false;
    }
    let u = rng.r#gen::<f64>();
    fcmp(u, (gain / temperature).exp()) == Ordering::Less
}
