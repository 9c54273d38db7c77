//! Kraus-channel kernels (spec §4.B "Channels").
//!
//! Every channel reduces to a weighted sum of 2x2 (or, for a two-object-qubit
//! `GeneralKraus` set, 4x4) Kraus operators applied as `Σ_i K_i ρ K_i†`; the
//! block-enumeration loop is identical in shape to [`super::single`] and
//! [`super::double`], just summing over several matrices per block instead
//! of conjugating by one.

use rayon::prelude::*;

use crate::channel::ChannelKind;
use crate::error::{SimError, SimResult};
use crate::kernel::block::{dagger2, dagger4, matmul2, matmul4};
use crate::kernel::unitary;
use crate::kernel::DIM_THRESHOLD;
use crate::math::mask::{DoubleQubitMask, SingleQubitMask};
use crate::math::{tri_get, tri_set, M1, M2, N, C, R};

/// Every entry one outer-loop index `k` touches in `apply_kraus_single`/
/// `apply_kraus_double`, batched the same way as `kernel::single` and
/// `kernel::double` so the threshold-gated `rayon` path can compute batches
/// in parallel before committing them serially.
type Writes = Vec<(N, N, C)>;

fn commit(rho: &mut [C], writes: Writes) {
    for (r, c, v) in writes {
        tri_set(rho, r, c, v);
    }
}

fn scale1(u: M1, s: R) -> M1 {
    let sc = C::new(s, 0.0);
    [u[0] * sc, u[1] * sc, u[2] * sc, u[3] * sc]
}

pub(crate) fn amplitude_damping_ops(gamma: f64) -> Vec<M1> {
    let k0 = [C::new(1.0, 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0), C::new((1.0 - gamma).sqrt(), 0.0)];
    let k1 = [C::new(0.0, 0.0), C::new(gamma.sqrt(), 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0)];
    vec![k0, k1]
}

pub(crate) fn phase_damping_ops(gamma: f64) -> Vec<M1> {
    let k0 = [C::new(1.0, 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0), C::new((1.0 - gamma).sqrt(), 0.0)];
    let k1 = [C::new(0.0, 0.0), C::new(0.0, 0.0), C::new(0.0, 0.0), C::new(gamma.sqrt(), 0.0)];
    vec![k0, k1]
}

pub(crate) fn pauli_ops(px: f64, py: f64, pz: f64) -> Vec<M1> {
    let p = px + py + pz;
    vec![
        scale1(unitary::identity(), (1.0 - p).max(0.0).sqrt()),
        scale1(unitary::x(), px.max(0.0).sqrt()),
        scale1(unitary::y(), py.max(0.0).sqrt()),
        scale1(unitary::z(), pz.max(0.0).sqrt()),
    ]
}

fn kraus_ops_to_m1(ops: &[Vec<Vec<C>>]) -> SimResult<Vec<M1>> {
    ops.iter()
        .map(|k| {
            if k.len() != 2 || k[0].len() != 2 || k[1].len() != 2 {
                return Err(SimError::InvalidArgument("GeneralKraus operator on 1 object qubit must be 2x2".into()));
            }
            Ok([k[0][0], k[0][1], k[1][0], k[1][1]])
        })
        .collect()
}

fn kraus_ops_to_m2(ops: &[Vec<Vec<C>>]) -> SimResult<Vec<M2>> {
    ops.iter()
        .map(|k| {
            if k.len() != 4 || k.iter().any(|row| row.len() != 4) {
                return Err(SimError::InvalidArgument("GeneralKraus operator on 2 object qubits must be 4x4".into()));
            }
            let mut m = [C::new(0.0, 0.0); 16];
            for r in 0..4 {
                for c in 0..4 {
                    m[r * 4 + c] = k[r][c];
                }
            }
            Ok(m)
        })
        .collect()
}

pub(crate) fn sum_kraus2(block: M1, ops: &[M1], adjoint_order: bool) -> M1 {
    let mut out = [C::new(0.0, 0.0); 4];
    for &k in ops {
        let kd = dagger2(k);
        let t = if adjoint_order {
            matmul2(matmul2(kd, block), k)
        } else {
            matmul2(matmul2(k, block), kd)
        };
        for i in 0..4 {
            out[i] += t[i];
        }
    }
    out
}

pub(crate) fn sum_kraus4(block: M2, ops: &[M2]) -> M2 {
    let mut out = [C::new(0.0, 0.0); 16];
    for &k in ops {
        let kd = dagger4(k);
        let t = matmul4(matmul4(k, block), kd);
        for i in 0..16 {
            out[i] += t[i];
        }
    }
    out
}

fn kraus_single_block(rho: &[C], mask: &SingleQubitMask, ops: &[M1], adjoint_order: bool, k: N) -> Writes {
    let r0 = mask.expand(k);
    let r1 = r0 | mask.obj_mask;
    let mut out = Writes::with_capacity(3 + 4 * k);

    let rho10 = tri_get(rho, r1, r0);
    let block = [tri_get(rho, r0, r0), rho10.conj(), rho10, tri_get(rho, r1, r1)];
    let new_block = sum_kraus2(block, ops, adjoint_order);
    out.push((r0, r0, new_block[0]));
    out.push((r1, r0, new_block[2]));
    out.push((r1, r1, new_block[3]));

    for l in 0..k {
        let c0 = mask.expand(l);
        let c1 = c0 | mask.obj_mask;
        let block = [
            tri_get(rho, r0, c0),
            tri_get(rho, r0, c1),
            tri_get(rho, r1, c0),
            tri_get(rho, r1, c1),
        ];
        let new_block = sum_kraus2(block, ops, adjoint_order);
        out.push((r0, c0, new_block[0]));
        out.push((r0, c1, new_block[1]));
        out.push((r1, c0, new_block[2]));
        out.push((r1, c1, new_block[3]));
    }
    out
}

fn apply_kraus_single(rho: &mut [C], d: N, mask: &SingleQubitMask, ops: &[M1], adjoint_order: bool) {
    let half = mask.base_count(d);
    if half >= DIM_THRESHOLD {
        let batches: Vec<Writes> = (0..half)
            .into_par_iter()
            .map(|k| kraus_single_block(rho, mask, ops, adjoint_order, k))
            .collect();
        for batch in batches {
            commit(rho, batch);
        }
        return;
    }
    for k in 0..half {
        commit(rho, kraus_single_block(rho, mask, ops, adjoint_order, k));
    }
}

fn kraus_double_block(rho: &[C], mask: &DoubleQubitMask, ops: &[M2], k: N) -> Writes {
    let rbase = mask.expand(k);
    let r: [N; 4] = std::array::from_fn(|b| mask.amplitude(rbase, b));
    let mut out = Writes::with_capacity(16 * (k + 1));
    for l in 0..=k {
        let cbase = mask.expand(l);
        let c: [N; 4] = std::array::from_fn(|b| mask.amplitude(cbase, b));
        let mut block = [C::new(0.0, 0.0); 16];
        for br in 0..4 {
            for bc in 0..4 {
                block[br * 4 + bc] = tri_get(rho, r[br], c[bc]);
            }
        }
        let new_block = sum_kraus4(block, ops);
        for br in 0..4 {
            for bc in 0..4 {
                out.push((r[br], c[bc], new_block[br * 4 + bc]));
            }
        }
    }
    out
}

fn apply_kraus_double(rho: &mut [C], d: N, mask: &DoubleQubitMask, ops: &[M2]) {
    let half = mask.base_count(d);
    if half >= DIM_THRESHOLD {
        let batches: Vec<Writes> = (0..half).into_par_iter().map(|k| kraus_double_block(rho, mask, ops, k)).collect();
        for batch in batches {
            commit(rho, batch);
        }
        return;
    }
    for k in 0..half {
        commit(rho, kraus_double_block(rho, mask, ops, k));
    }
}

/// Apply a channel to `rho` over the given object qubits (spec §4.B
/// "Channels"). Channels are never controlled.
pub fn apply(rho: &mut [C], d: N, objs: &[N], kind: &ChannelKind) -> SimResult<()> {
    match kind {
        ChannelKind::AmplitudeDamping { gamma } => {
            let mask = SingleQubitMask::new(single_obj(objs)?, 0);
            apply_kraus_single(rho, d, &mask, &amplitude_damping_ops(*gamma), false);
            Ok(())
        }
        ChannelKind::HermitianAmplitudeDamping { gamma } => {
            let mask = SingleQubitMask::new(single_obj(objs)?, 0);
            apply_kraus_single(rho, d, &mask, &amplitude_damping_ops(*gamma), true);
            Ok(())
        }
        ChannelKind::PhaseDamping { gamma } => {
            let mask = SingleQubitMask::new(single_obj(objs)?, 0);
            apply_kraus_single(rho, d, &mask, &phase_damping_ops(*gamma), false);
            Ok(())
        }
        ChannelKind::Pauli { px, py, pz } => {
            let mask = SingleQubitMask::new(single_obj(objs)?, 0);
            apply_kraus_single(rho, d, &mask, &pauli_ops(*px, *py, *pz), false);
            Ok(())
        }
        ChannelKind::GeneralKraus { ops } => match objs.len() {
            1 => {
                let mask = SingleQubitMask::new(objs[0], 0);
                apply_kraus_single(rho, d, &mask, &kraus_ops_to_m1(ops)?, false);
                Ok(())
            }
            2 => {
                let (q0, q1) = ordered_pair(objs)?;
                let mask = DoubleQubitMask::new(q0, q1, 0);
                apply_kraus_double(rho, d, &mask, &kraus_ops_to_m2(ops)?);
                Ok(())
            }
            n => Err(SimError::InvalidArgument(format!(
                "GeneralKraus supports 1 or 2 object qubits, got {n}"
            ))),
        },
    }
}

fn single_obj(objs: &[N]) -> SimResult<N> {
    match objs {
        [q] => Ok(*q),
        _ => Err(SimError::InvalidArgument(format!(
            "expected exactly one object qubit for this channel, got {}",
            objs.len()
        ))),
    }
}

fn ordered_pair(objs: &[N]) -> SimResult<(N, N)> {
    match objs {
        [a, b] if a < b => Ok((*a, *b)),
        [a, b] => Ok((*b, *a)),
        _ => Err(SimError::InvalidArgument(format!(
            "expected exactly two object qubits for this channel, got {}",
            objs.len()
        ))),
    }
}
