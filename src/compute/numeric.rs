//! Tolerant floating point comparison.
//!
//! Threshold checks throughout the evolution compare values relative to their
//! magnitude instead of exactly, so that accumulated rounding in the flow
//! solve does not decide whether a network counts as functional.

use std::cmp::Ordering;

/// Compare `a` and `b` up to a relative tolerance of one machine epsilon.
///
/// The tolerance is `EPSILON * 2^e` where `e` is the binary exponent of the
/// operand with the larger magnitude (`max = m * 2^e`, `0.5 <= m < 1`).
/// Returns `Equal` when the difference lies inside the tolerance. Any NaN
/// operand also yields `Equal`.
pub fn fcmp(a: f64, b: f64) -> Ordering {
    let max = if a.abs() > b.abs() { a } else { b };
    let delta = f64::EPSILON * 2f64.powi(frexp_exponent(max));
    let difference = a - b;
    if difference > delta {
        Ordering::Greater
    } else if difference < -delta {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// `a` is below `b` by more than the tolerance.
#[inline]
pub fn definitely_less(a: f64, b: f64) -> bool {
    fcmp(a, b) == Ordering::Less
}

/// Binary exponent `e` with `x = m * 2^e` and `0.5 <= |m| < 1`; zero for zero.
fn frexp_exponent(x: f64) -> i32 {
    if x == 0.0 || !x.is_finite() {
        return 0;
    }
    let bits = x.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    if biased == 0 {
        // subnormal: scale into the normal range first
        return frexp_exponent(x * 2f64.powi(54)) - 54;
    }
    biased - 1022
}
