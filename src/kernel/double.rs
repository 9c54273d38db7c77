//! Two-qubit gate application on packed lower-triangular storage (spec
//! §4.A, §4.B: SWAP, iSWAP, Rxx, Ryy, Rzz). Basis order within a 4x4 block
//! matches [`super::unitary`]: `b = (bit_q1 << 1) | bit_q0`.

use rayon::prelude::*;

use crate::kernel::block::{dagger4, transform4, transform4_diff};
use crate::kernel::DIM_THRESHOLD;
use crate::math::mask::DoubleQubitMask;
use crate::math::{tri_get, tri_set, M2, N, C};

/// Every entry one outer-loop index `k` touches, across all of its `l`. As in
/// `kernel::single`, distinct `k` land on disjoint sets of 4 rows (`mask`'s
/// object-qubit bijection), so batches can be computed in parallel and
/// committed in any order.
type Writes = Vec<(N, N, C)>;

fn unitary_block(rho: &[C], mask: &DoubleQubitMask, u: M2, ud: M2, k: N) -> Writes {
    let rbase = mask.expand(k);
    let row_ctrl = mask.satisfies_ctrl(rbase);
    let r: [N; 4] = std::array::from_fn(|b| mask.amplitude(rbase, b));
    let mut out = Writes::with_capacity(16 * (k + 1));
    for l in 0..=k {
        let cbase = mask.expand(l);
        let col_ctrl = mask.satisfies_ctrl(cbase);
        let c: [N; 4] = std::array::from_fn(|b| mask.amplitude(cbase, b));
        let mut block = [C::new(0.0, 0.0); 16];
        for br in 0..4 {
            for bc in 0..4 {
                block[br * 4 + bc] = tri_get(rho, r[br], c[bc]);
            }
        }
        let new_block = transform4(block, u, ud, row_ctrl, col_ctrl);
        for br in 0..4 {
            for bc in 0..4 {
                out.push((r[br], c[bc], new_block[br * 4 + bc]));
            }
        }
    }
    out
}

fn diff_block(rho: &[C], mask: &DoubleQubitMask, u: M2, u_diff: M2, k: N) -> Writes {
    let rbase = mask.expand(k);
    let row_ctrl = mask.satisfies_ctrl(rbase);
    let r: [N; 4] = std::array::from_fn(|b| mask.amplitude(rbase, b));
    let mut out = Writes::with_capacity(16 * (k + 1));
    for l in 0..=k {
        let cbase = mask.expand(l);
        let col_ctrl = mask.satisfies_ctrl(cbase);
        let c: [N; 4] = std::array::from_fn(|b| mask.amplitude(cbase, b));
        let mut block = [C::new(0.0, 0.0); 16];
        for br in 0..4 {
            for bc in 0..4 {
                block[br * 4 + bc] = tri_get(rho, r[br], c[bc]);
            }
        }
        let new_block = transform4_diff(block, u, u_diff, row_ctrl && col_ctrl);
        for br in 0..4 {
            for bc in 0..4 {
                out.push((r[br], c[bc], new_block[br * 4 + bc]));
            }
        }
    }
    out
}

fn commit(rho: &mut [C], writes: Writes) {
    for (r, c, v) in writes {
        tri_set(rho, r, c, v);
    }
}

pub fn apply_unitary(rho: &mut [C], d: N, mask: &DoubleQubitMask, u: M2) {
    let ud = dagger4(u);
    let half = mask.base_count(d);
    if half >= DIM_THRESHOLD {
        let batches: Vec<Writes> = (0..half).into_par_iter().map(|k| unitary_block(rho, mask, u, ud, k)).collect();
        for batch in batches {
            commit(rho, batch);
        }
        return;
    }
    for k in 0..half {
        commit(rho, unitary_block(rho, mask, u, ud, k));
    }
}

pub fn apply_diff(rho: &mut [C], d: N, mask: &DoubleQubitMask, u: M2, u_diff: M2) {
    let half = mask.base_count(d);
    if half >= DIM_THRESHOLD {
        let batches: Vec<Writes> = (0..half).into_par_iter().map(|k| diff_block(rho, mask, u, u_diff, k)).collect();
        for batch in batches {
            commit(rho, batch);
        }
        return;
    }
    for k in 0..half {
        commit(rho, diff_block(rho, mask, u, u_diff, k));
    }
}
