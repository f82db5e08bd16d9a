//! Commitment Balance Checks
//!
//! ```text
//! A = B + C + ...
//! ```
//!
//! Confirms that committed inputs equal committed outputs plus fee without
//! revealing any amount.

use crate::curve::CurvePoint;

/// `points[0] == points[1] + points[2] + ...`
///
/// Fewer than two points cannot be verified and yield `false`. The sum is
/// seeded from the first term, never from a default point.
pub fn check_sum_equal(points: &[CurvePoint]) -> bool {
    let Some((target, terms)) = points.split_first() else {
        return false;
    };
    match CurvePoint::sum(terms) {
        Some(sum) => sum.equal(target),
        None => false,
    }
}
