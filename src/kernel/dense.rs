//! Dense `d x d` matrix kernels used only by the gradient engine's `ρ_H`
//! sidecar (spec §4.D) — a matrix that is generally not Hermitian once a
//! derivative gate has acted on one side, so it cannot live in packed
//! lower-triangular storage the way `ρ_S` does.

use crate::channel::ChannelKind;
use crate::error::SimResult;
use crate::hamiltonian::DenseMat;
use crate::kernel::block::{dagger2, dagger4, transform2, transform4};
use crate::kernel::channel::{amplitude_damping_ops, pauli_ops, phase_damping_ops, sum_kraus2};
use crate::math::mask::{DoubleQubitMask, SingleQubitMask};
use crate::math::{M1, M2, N, C};

/// Embed a single-qubit operator as a full `d x d` matrix: the 2x2 block is
/// written at every base index satisfying the control condition; everywhere
/// else is `identity_elsewhere ? I : 0` (spec §4.B "Rotations...diff==true"
/// generalized to a standalone embedding used by `ExpectDiffGate`).
pub fn embed_single(d: N, mask: &SingleQubitMask, u: M1, identity_elsewhere: bool) -> DenseMat {
    let mut m = if identity_elsewhere {
        DenseMat::identity(d)
    } else {
        DenseMat::zeros(d)
    };
    let half = mask.base_count(d);
    for k in 0..half {
        let r0 = mask.expand(k);
        let r1 = r0 | mask.obj_mask;
        if mask.satisfies_ctrl(r0) {
            m.set(r0, r0, u[0]);
            m.set(r0, r1, u[1]);
            m.set(r1, r0, u[2]);
            m.set(r1, r1, u[3]);
        }
    }
    m
}

pub fn embed_double(d: N, mask: &DoubleQubitMask, u: M2, identity_elsewhere: bool) -> DenseMat {
    let mut m = if identity_elsewhere {
        DenseMat::identity(d)
    } else {
        DenseMat::zeros(d)
    };
    let half = mask.base_count(d);
    for k in 0..half {
        let rbase = mask.expand(k);
        if mask.satisfies_ctrl(rbase) {
            let idx: [N; 4] = std::array::from_fn(|b| mask.amplitude(rbase, b));
            for br in 0..4 {
                for bc in 0..4 {
                    m.set(idx[br], idx[bc], u[br * 4 + bc]);
                }
            }
        }
    }
    m
}

/// `M ← U M U†` over the full (non-triangular) dense buffer, for stepping
/// the `ρ_H` sidecar through a unitary gate.
pub fn apply_unitary_single(mat: &mut DenseMat, mask: &SingleQubitMask, u: M1) {
    let ud = dagger2(u);
    let half = mask.base_count(mat.d);
    for k in 0..half {
        let r0 = mask.expand(k);
        let r1 = r0 | mask.obj_mask;
        let row_ctrl = mask.satisfies_ctrl(r0);
        for l in 0..half {
            let c0 = mask.expand(l);
            let c1 = c0 | mask.obj_mask;
            let col_ctrl = mask.satisfies_ctrl(c0);
            let block = [mat.get(r0, c0), mat.get(r0, c1), mat.get(r1, c0), mat.get(r1, c1)];
            let new_block = transform2(block, u, ud, row_ctrl, col_ctrl);
            mat.set(r0, c0, new_block[0]);
            mat.set(r0, c1, new_block[1]);
            mat.set(r1, c0, new_block[2]);
            mat.set(r1, c1, new_block[3]);
        }
    }
}

pub fn apply_unitary_double(mat: &mut DenseMat, mask: &DoubleQubitMask, u: M2) {
    let ud = dagger4(u);
    let half = mask.base_count(mat.d);
    for k in 0..half {
        let rbase = mask.expand(k);
        let row_ctrl = mask.satisfies_ctrl(rbase);
        let r: [N; 4] = std::array::from_fn(|b| mask.amplitude(rbase, b));
        for l in 0..half {
            let cbase = mask.expand(l);
            let col_ctrl = mask.satisfies_ctrl(cbase);
            let c: [N; 4] = std::array::from_fn(|b| mask.amplitude(cbase, b));
            let mut block = [C::new(0.0, 0.0); 16];
            for br in 0..4 {
                for bc in 0..4 {
                    block[br * 4 + bc] = mat.get(r[br], c[bc]);
                }
            }
            let new_block = transform4(block, u, ud, row_ctrl, col_ctrl);
            for br in 0..4 {
                for bc in 0..4 {
                    mat.set(r[br], c[bc], new_block[br * 4 + bc]);
                }
            }
        }
    }
}

fn apply_kraus_dense_single(mat: &mut DenseMat, mask: &SingleQubitMask, ops: &[M1], adjoint_order: bool) {
    let half = mask.base_count(mat.d);
    for k in 0..half {
        let r0 = mask.expand(k);
        let r1 = r0 | mask.obj_mask;
        for l in 0..half {
            let c0 = mask.expand(l);
            let c1 = c0 | mask.obj_mask;
            let block = [mat.get(r0, c0), mat.get(r0, c1), mat.get(r1, c0), mat.get(r1, c1)];
            let new_block = sum_kraus2(block, ops, adjoint_order);
            mat.set(r0, c0, new_block[0]);
            mat.set(r0, c1, new_block[1]);
            mat.set(r1, c0, new_block[2]);
            mat.set(r1, c1, new_block[3]);
        }
    }
}

/// Step the `ρ_H` sidecar through a channel gate (spec §4.D notes the
/// engine must be able to propagate `H` "backwards through" an AD channel,
/// which is exactly `HermitianAmplitudeDamping`, the adjoint-order case).
pub fn apply_channel(mat: &mut DenseMat, objs: &[N], kind: &ChannelKind) -> SimResult<()> {
    match kind {
        ChannelKind::AmplitudeDamping { gamma } => {
            let mask = SingleQubitMask::new(objs[0], 0);
            apply_kraus_dense_single(mat, &mask, &amplitude_damping_ops(*gamma), false);
            Ok(())
        }
        ChannelKind::HermitianAmplitudeDamping { gamma } => {
            let mask = SingleQubitMask::new(objs[0], 0);
            apply_kraus_dense_single(mat, &mask, &amplitude_damping_ops(*gamma), true);
            Ok(())
        }
        ChannelKind::PhaseDamping { gamma } => {
            let mask = SingleQubitMask::new(objs[0], 0);
            apply_kraus_dense_single(mat, &mask, &phase_damping_ops(*gamma), false);
            Ok(())
        }
        ChannelKind::Pauli { px, py, pz } => {
            let mask = SingleQubitMask::new(objs[0], 0);
            apply_kraus_dense_single(mat, &mask, &pauli_ops(*px, *py, *pz), false);
            Ok(())
        }
        ChannelKind::GeneralKraus { .. } => Err(crate::error::SimError::InvalidArgument(
            "GeneralKraus is not supported on the gradient sidecar".into(),
        )),
    }
}
