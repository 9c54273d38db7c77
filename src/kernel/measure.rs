//! Measurement projector (spec §4.B "Measurement projector").
//!
//! Collapsing a qubit is a single conditional-multiply pass over the packed
//! triangle: entries whose row and column both land in the surviving
//! `|outcome>` subspace are rescaled by `1/p_b`; everything else is zeroed.
//! Division by a near-zero `p_b` is not trapped (spec §7): a caller who
//! measures a qubit with probability ~0 of the observed outcome gets NaNs,
//! as documented.

use rayon::prelude::*;

use crate::kernel::DIM_THRESHOLD;
use crate::math::{tri_get, N, C, R};
use rand::Rng;

/// `p1 = sum_{r : bit q of r == 1} rho[r, r]`.
pub fn probability_one(rho: &[C], d: N, q: N) -> R {
    let bit = 1usize << q;
    (0..d).filter(|r| r & bit != 0).map(|r| tri_get(rho, r, r).re).sum()
}

/// Split packed lower-triangular storage into one mutable slice per row.
/// Row `r` occupies a contiguous run of `r + 1` entries (`idx_map(r, 0..=r)`),
/// so this is a sequence of disjoint `split_at_mut` calls, not aliasing.
fn split_rows(rho: &mut [C], d: N) -> Vec<&mut [C]> {
    let mut rows = Vec::with_capacity(d);
    let mut rest = rho;
    for r in 0..d {
        let (head, tail) = rest.split_at_mut(r + 1);
        rows.push(head);
        rest = tail;
    }
    rows
}

fn collapse_row(row: &mut [C], r: N, bit: usize, want: usize, p_b: R) {
    for (c, v) in row.iter_mut().enumerate() {
        if (r & bit) == want && (c & bit) == want {
            *v /= p_b;
        } else {
            *v = C::new(0.0, 0.0);
        }
    }
}

/// Draw an outcome for qubit `q` against `rho`'s diagonal marginal, collapse
/// and renormalize in place, and return the observed bit. Above `DIM_THRESHOLD`
/// rows collapse in parallel — each row's entries are independent of every
/// other row's (spec §5 "Intra-kernel data parallelism").
pub fn apply(rho: &mut [C], d: N, q: N, rng: &mut impl Rng) -> u8 {
    let bit = 1usize << q;
    let p1 = probability_one(rho, d, q);
    let u: R = rng.gen();
    let outcome: u8 = if u < p1 { 1 } else { 0 };
    let p_b = if outcome == 1 { p1 } else { 1.0 - p1 };
    let want = (outcome as usize) << q;

    if d >= DIM_THRESHOLD {
        let rows = split_rows(rho, d);
        rows.into_par_iter()
            .enumerate()
            .for_each(|(r, row)| collapse_row(row, r, bit, want, p_b));
    } else {
        for (r, row) in split_rows(rho, d).into_iter().enumerate() {
            collapse_row(row, r, bit, want, p_b);
        }
    }
    outcome
}
