//! Per-gate-family matrix builders (spec §4.B "Key kernel families").
//!
//! Every fixed or angle-parametric single-/two-qubit gate reduces to a
//! small dense unitary (`M1` = flat row-major 2x2, `M2` = flat row-major
//! 4x4); the generic block appliers in [`super::single`] and
//! [`super::double`] consume whichever matrix this module hands them. Angle
//! convention throughout: `cos(θ/2)`, `sin(θ/2)` (spec §4.B).

use crate::math::{C, M1, M2, R};

const FRAC_1_SQRT_2: R = std::f64::consts::FRAC_1_SQRT_2;

#[inline]
fn c(re: R, im: R) -> C {
    C::new(re, im)
}

pub fn identity() -> M1 {
    [c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(1.0, 0.0)]
}

pub fn x() -> M1 {
    [c(0.0, 0.0), c(1.0, 0.0), c(1.0, 0.0), c(0.0, 0.0)]
}

pub fn y() -> M1 {
    [c(0.0, 0.0), c(0.0, -1.0), c(0.0, 1.0), c(0.0, 0.0)]
}

pub fn z() -> M1 {
    [c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), c(-1.0, 0.0)]
}

pub fn h() -> M1 {
    [
        c(FRAC_1_SQRT_2, 0.0),
        c(FRAC_1_SQRT_2, 0.0),
        c(FRAC_1_SQRT_2, 0.0),
        c(-FRAC_1_SQRT_2, 0.0),
    ]
}

/// Z-like diagonal gate with `v` on the `|1>` projection (spec §4.B
/// "Z-like"): covers S, S†, T, T†, and PS(θ) = z_like(e^{iθ}).
pub fn z_like(v: C) -> M1 {
    [c(1.0, 0.0), c(0.0, 0.0), c(0.0, 0.0), v]
}

pub fn s() -> M1 {
    z_like(C::i())
}

pub fn sdg() -> M1 {
    z_like(-C::i())
}

pub fn t() -> M1 {
    z_like(C::from_polar(1.0, std::f64::consts::FRAC_PI_4))
}

pub fn tdg() -> M1 {
    z_like(C::from_polar(1.0, -std::f64::consts::FRAC_PI_4))
}

pub fn ps(theta: R) -> M1 {
    z_like(C::from_polar(1.0, theta))
}

/// Derivative of `z_like(e^{i*theta})` w.r.t. theta, i.e. PS'(θ).
pub fn ps_diff(theta: R) -> M1 {
    [
        c(0.0, 0.0),
        c(0.0, 0.0),
        c(0.0, 0.0),
        C::i() * C::from_polar(1.0, theta),
    ]
}

pub fn rx(theta: R) -> M1 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    [
        c(half_cos, 0.0),
        c(0.0, -half_sin),
        c(0.0, -half_sin),
        c(half_cos, 0.0),
    ]
}

pub fn rx_diff(theta: R) -> M1 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    [
        c(-0.5 * half_sin, 0.0),
        c(0.0, -0.5 * half_cos),
        c(0.0, -0.5 * half_cos),
        c(-0.5 * half_sin, 0.0),
    ]
}

pub fn ry(theta: R) -> M1 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    [
        c(half_cos, 0.0),
        c(-half_sin, 0.0),
        c(half_sin, 0.0),
        c(half_cos, 0.0),
    ]
}

pub fn ry_diff(theta: R) -> M1 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    [
        c(-0.5 * half_sin, 0.0),
        c(-0.5 * half_cos, 0.0),
        c(0.5 * half_cos, 0.0),
        c(-0.5 * half_sin, 0.0),
    ]
}

pub fn rz(theta: R) -> M1 {
    [
        C::from_polar(1.0, -theta / 2.0),
        c(0.0, 0.0),
        c(0.0, 0.0),
        C::from_polar(1.0, theta / 2.0),
    ]
}

pub fn rz_diff(theta: R) -> M1 {
    [
        C::i() * -0.5 * C::from_polar(1.0, -theta / 2.0),
        c(0.0, 0.0),
        c(0.0, 0.0),
        C::i() * 0.5 * C::from_polar(1.0, theta / 2.0),
    ]
}

/// Basis order for two-qubit matrices throughout this module: index
/// `b = (bit_q1 << 1) | bit_q0`, i.e. `|q1 q0>` with `q0` the fast-varying
/// axis.
pub fn swap() -> M2 {
    let mut m = [c(0.0, 0.0); 16];
    m[0 * 4 + 0] = c(1.0, 0.0);
    m[3 * 4 + 3] = c(1.0, 0.0);
    m[1 * 4 + 2] = c(1.0, 0.0);
    m[2 * 4 + 1] = c(1.0, 0.0);
    m
}

pub fn iswap() -> M2 {
    let mut m = [c(0.0, 0.0); 16];
    m[0 * 4 + 0] = c(1.0, 0.0);
    m[3 * 4 + 3] = c(1.0, 0.0);
    m[1 * 4 + 2] = C::i();
    m[2 * 4 + 1] = C::i();
    m
}

pub fn rxx(theta: R) -> M2 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    let mut m = [c(0.0, 0.0); 16];
    for b in 0..4 {
        m[b * 4 + b] = c(half_cos, 0.0);
    }
    let off = c(0.0, -half_sin);
    m[0 * 4 + 3] = off;
    m[3 * 4 + 0] = off;
    m[1 * 4 + 2] = off;
    m[2 * 4 + 1] = off;
    m
}

pub fn rxx_diff(theta: R) -> M2 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    let mut m = [c(0.0, 0.0); 16];
    for b in 0..4 {
        m[b * 4 + b] = c(-0.5 * half_sin, 0.0);
    }
    let off = c(0.0, -0.5 * half_cos);
    m[0 * 4 + 3] = off;
    m[3 * 4 + 0] = off;
    m[1 * 4 + 2] = off;
    m[2 * 4 + 1] = off;
    m
}

pub fn ryy(theta: R) -> M2 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    let mut m = [c(0.0, 0.0); 16];
    for b in 0..4 {
        m[b * 4 + b] = c(half_cos, 0.0);
    }
    let corner = c(0.0, half_sin);
    m[3 * 4 + 0] = corner;
    m[0 * 4 + 3] = corner;
    let cross = c(0.0, -half_sin);
    m[2 * 4 + 1] = cross;
    m[1 * 4 + 2] = cross;
    m
}

pub fn ryy_diff(theta: R) -> M2 {
    let (half_sin, half_cos) = (theta / 2.0).sin_cos();
    let mut m = [c(0.0, 0.0); 16];
    for b in 0..4 {
        m[b * 4 + b] = c(-0.5 * half_sin, 0.0);
    }
    let corner = c(0.0, 0.5 * half_cos);
    m[3 * 4 + 0] = corner;
    m[0 * 4 + 3] = corner;
    let cross = c(0.0, -0.5 * half_cos);
    m[2 * 4 + 1] = cross;
    m[1 * 4 + 2] = cross;
    m
}

pub fn rzz(theta: R) -> M2 {
    let even = C::from_polar(1.0, -theta / 2.0);
    let odd = C::from_polar(1.0, theta / 2.0);
    let mut m = [c(0.0, 0.0); 16];
    m[0 * 4 + 0] = even;
    m[3 * 4 + 3] = even;
    m[1 * 4 + 1] = odd;
    m[2 * 4 + 2] = odd;
    m
}

pub fn rzz_diff(theta: R) -> M2 {
    let even = C::i() * -0.5 * C::from_polar(1.0, -theta / 2.0);
    let odd = C::i() * 0.5 * C::from_polar(1.0, theta / 2.0);
    let mut m = [c(0.0, 0.0); 16];
    m[0 * 4 + 0] = even;
    m[3 * 4 + 3] = even;
    m[1 * 4 + 1] = odd;
    m[2 * 4 + 2] = odd;
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_cmp::approx_eq;

    #[test]
    fn rx_at_zero_is_identity() {
        let m = rx(0.0);
        for (got, want) in m.iter().zip(identity().iter()) {
            assert!(approx_eq(got, want));
        }
    }

    #[test]
    fn s_squared_is_z_on_the_diagonal() {
        let sv = s();
        // S is diagonal; s[1,1]^2 should equal Z[1,1] = -1.
        let got = sv[3] * sv[3];
        assert!(approx_eq(&got, &C::new(-1.0, 0.0)));
    }

    #[test]
    fn swap_and_iswap_fix_the_computational_basis_corners() {
        let sw = swap();
        assert!(approx_eq(&sw[0], &C::new(1.0, 0.0)));
        assert!(approx_eq(&sw[15], &C::new(1.0, 0.0)));
        let isw = iswap();
        assert!(approx_eq(&isw[1 * 4 + 2], &C::i()));
    }
}
