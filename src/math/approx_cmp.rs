pub use float_cmp::*;

use super::types::*;

const ULPS: i64 = 4;

/// Epsilon floor used alongside ULPS comparison so that values near zero
/// (e.g. a damped-out off-diagonal entry) compare equal to exact zero.
pub const EPS: R = 1e-10;

#[inline]
pub fn approx_cmp(x: R, y: R) -> bool {
    approx_eq!(R, x, y, ulps = ULPS) || (x - y).abs() < EPS
}

#[inline]
pub fn approx_real(x: &C) -> bool {
    approx_cmp(x.im, 0.0)
}

#[inline]
pub fn approx_eq(a: &C, b: &C) -> bool {
    approx_cmp(a.re, b.re) && approx_cmp(a.im, b.im)
}

#[inline]
pub fn approx_eq_conj(a: &C, b: &C) -> bool {
    approx_cmp(a.re, b.re) && approx_cmp(a.im, -b.im)
}
