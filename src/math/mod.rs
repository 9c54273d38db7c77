pub use std::f64::consts::*;

pub use self::{consts::*, types::*};

pub mod approx_cmp;
pub mod bits_iter;
pub mod mask;

mod consts {
    use super::types::*;

    pub const C_ONE: C = C { re: 1., im: 0. };
    pub const C_ZERO: C = C { re: 0., im: 0. };
    pub const C_IMAG: C = C { re: 0., im: 1. };

    pub const I_POW_TABLE: [C; 4] = [
        C { re: 1., im: 0. },
        C { re: 0., im: 1. },
        C { re: -1., im: 0. },
        C { re: 0., im: -1. },
    ];
}

mod types {
    pub type N = usize;
    pub type Z = isize;

    /// Bit-mask over qubit indices; bit `q` set means qubit `q` is addressed.
    pub type Mask = usize;

    pub type R = f64;
    pub type C = num_complex::Complex<R>;

    pub type M1 = [C; 4];
    pub type M2 = [C; 16];
}

#[inline]
pub fn count_bits(n: N) -> N {
    n.count_ones() as N
}

/// Linear offset of `(r, c)` in a packed, row-major, lower-triangular buffer.
///
/// Callers must guarantee `r >= c`; for `r < c` read `idx_map(c, r)` and
/// conjugate the stored value instead.
#[inline]
pub fn idx_map(r: N, c: N) -> N {
    debug_assert!(r >= c, "idx_map requires r >= c, got r={r} c={c}");
    r * (r + 1) / 2 + c
}

/// Number of complex entries in the packed lower triangle of a `d x d` matrix.
#[inline]
pub fn tri_len(d: N) -> N {
    d * (d + 1) / 2
}

/// Read `rho[r, c]` from packed lower-triangular storage, following the
/// Hermiticity contract for the upper triangle.
#[inline]
pub fn tri_get(rho: &[C], r: N, c: N) -> C {
    if r >= c {
        rho[idx_map(r, c)]
    } else {
        rho[idx_map(c, r)].conj()
    }
}

/// Write a new value for `rho[r, c]` into packed lower-triangular storage,
/// routing to the conjugate slot when `r < c`.
#[inline]
pub fn tri_set(rho: &mut [C], r: N, c: N, val: C) {
    if r >= c {
        rho[idx_map(r, c)] = val;
    } else {
        rho[idx_map(c, r)] = val.conj();
    }
}

#[inline]
pub fn phase_from_rad(rad: R) -> C {
    C::from_polar(1.0, rad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idx_map_packs_lower_triangle() {
        // d=3: rows 0,1,2 -> offsets 0 | 1,2 | 3,4,5
        assert_eq!(idx_map(0, 0), 0);
        assert_eq!(idx_map(1, 0), 1);
        assert_eq!(idx_map(1, 1), 2);
        assert_eq!(idx_map(2, 0), 3);
        assert_eq!(idx_map(2, 1), 4);
        assert_eq!(idx_map(2, 2), 5);
        assert_eq!(tri_len(3), 6);
    }

    #[test]
    fn tri_get_conjugates_upper_triangle() {
        let mut rho = vec![C_ZERO; tri_len(2)];
        rho[idx_map(1, 0)] = C::new(1.0, 2.0);
        assert_eq!(tri_get(&rho, 1, 0), C::new(1.0, 2.0));
        assert_eq!(tri_get(&rho, 0, 1), C::new(1.0, -2.0));
    }
}
