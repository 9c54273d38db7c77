//! Dispatcher (spec §4.F): a pure match from a resolved [`GateOp`] to the
//! kernel call its family needs. Everything above this layer only ever
//! talks about circuits and parameter bindings; everything below only ever
//! talks about flat matrices and bitmasks.

use crate::error::{SimError, SimResult};
use crate::gate::{GateKind, GateOp};
use crate::kernel::block::dagger4;
use crate::kernel::{channel as kchannel, double, single, unitary};
use crate::math::mask::{DoubleQubitMask, SingleQubitMask};
use crate::math::{C, M1, M2, N, R};
use crate::param::ParamResolver;

/// Evaluate a gate's angle expression against a binding, folding the
/// dagger flag in as the sign flip every rotation family's adjoint is
/// (`RX(θ)† = RX(-θ)`, and likewise for RY/RZ/PS/Rxx/Ryy/Rzz).
pub(crate) fn resolve_angle(op: &GateOp, binding: &ParamResolver) -> R {
    let raw = op.angle.as_ref().map(|e| e.combination(binding)).unwrap_or(0.0);
    if op.daggered {
        -raw
    } else {
        raw
    }
}

pub(crate) fn single_mask(op: &GateOp) -> SingleQubitMask {
    SingleQubitMask::new(op.objs[0], op.ctrl_mask())
}

pub(crate) fn double_mask(op: &GateOp) -> DoubleQubitMask {
    let (q0, q1) = if op.objs[0] < op.objs[1] {
        (op.objs[0], op.objs[1])
    } else {
        (op.objs[1], op.objs[0])
    };
    DoubleQubitMask::new(q0, q1, op.ctrl_mask())
}

fn scale1(u: M1, s: R) -> M1 {
    let sc = C::new(s, 0.0);
    [u[0] * sc, u[1] * sc, u[2] * sc, u[3] * sc]
}

fn scale2(u: M2, s: R) -> M2 {
    let sc = C::new(s, 0.0);
    let mut out = [C::new(0.0, 0.0); 16];
    for i in 0..16 {
        out[i] = u[i] * sc;
    }
    out
}

/// The gate's matrix at `theta` (already dagger-signed by [`resolve_angle`]
/// for rotation families; fixed families swap to their named adjoint
/// instead since negating an angle means nothing for them).
pub(crate) fn single_matrix(kind: GateKind, theta: R, daggered: bool) -> Option<M1> {
    use GateKind::*;
    Some(match kind {
        I => unitary::identity(),
        X => unitary::x(),
        Y => unitary::y(),
        Z => unitary::z(),
        H => unitary::h(),
        S => {
            if daggered {
                unitary::sdg()
            } else {
                unitary::s()
            }
        }
        Sdg => {
            if daggered {
                unitary::s()
            } else {
                unitary::sdg()
            }
        }
        T => {
            if daggered {
                unitary::tdg()
            } else {
                unitary::t()
            }
        }
        Tdg => {
            if daggered {
                unitary::t()
            } else {
                unitary::tdg()
            }
        }
        Ps => unitary::ps(theta),
        Rx => unitary::rx(theta),
        Ry => unitary::ry(theta),
        Rz => unitary::rz(theta),
        _ => return None,
    })
}

pub(crate) fn double_matrix(kind: GateKind, theta: R, daggered: bool) -> Option<M2> {
    use GateKind::*;
    Some(match kind {
        Swap => unitary::swap(),
        ISwap => {
            let m = unitary::iswap();
            if daggered {
                dagger4(m)
            } else {
                m
            }
        }
        Rxx => unitary::rxx(theta),
        Ryy => unitary::ryy(theta),
        Rzz => unitary::rzz(theta),
        _ => return None,
    })
}

/// `(U(θ), ∂U/∂θ)` for the differentiable single-qubit families (spec
/// §4.D), `∂U/∂θ` already carrying the chain-rule sign from a dagger flip.
fn single_diff(kind: GateKind, theta: R, sign: R) -> Option<(M1, M1)> {
    use GateKind::*;
    Some(match kind {
        Ps => (unitary::ps(theta), scale1(unitary::ps_diff(theta), sign)),
        Rx => (unitary::rx(theta), scale1(unitary::rx_diff(theta), sign)),
        Ry => (unitary::ry(theta), scale1(unitary::ry_diff(theta), sign)),
        Rz => (unitary::rz(theta), scale1(unitary::rz_diff(theta), sign)),
        _ => return None,
    })
}

fn double_diff(kind: GateKind, theta: R, sign: R) -> Option<(M2, M2)> {
    use GateKind::*;
    Some(match kind {
        Rxx => (unitary::rxx(theta), scale2(unitary::rxx_diff(theta), sign)),
        Ryy => (unitary::ryy(theta), scale2(unitary::ryy_diff(theta), sign)),
        Rzz => (unitary::rzz(theta), scale2(unitary::rzz_diff(theta), sign)),
        _ => return None,
    })
}

/// Apply one resolved gate or channel record to `rho` (spec §4.F).
/// Measurement is handled by the state container directly, since it needs
/// an RNG and produces an outcome bit rather than a pure transform.
pub fn apply(rho: &mut [C], d: N, op: &GateOp, binding: &ParamResolver) -> SimResult<()> {
    let theta = resolve_angle(op, binding);
    match op.kind {
        GateKind::Measure => Err(SimError::InvalidArgument(
            "Measure must be applied through DensityState::apply_measure".into(),
        )),
        GateKind::Channel => {
            let kind = op
                .channel
                .as_ref()
                .ok_or_else(|| SimError::InvalidArgument("Channel record missing its ChannelKind".into()))?;
            kchannel::apply(rho, d, &op.objs, kind)
        }
        kind if op.objs.len() == 1 => {
            let u = single_matrix(kind, theta, op.daggered).ok_or_else(|| SimError::UnknownGate(kind.name().into()))?;
            let mask = single_mask(op);
            single::apply_unitary(rho, d, &mask, u);
            Ok(())
        }
        kind if op.objs.len() == 2 => {
            let u = double_matrix(kind, theta, op.daggered).ok_or_else(|| SimError::UnknownGate(kind.name().into()))?;
            let mask = double_mask(op);
            double::apply_unitary(rho, d, &mask, u);
            Ok(())
        }
        kind => Err(SimError::UnknownGate(kind.name().into())),
    }
}

/// `(U, ∂U/∂θ)` for a resolved 1-qubit differentiable gate record, at its
/// own angle and dagger convention. Shared by [`apply_diff`] and the
/// gradient engine's `ExpectDiffGate` (spec §4.D), which embeds these
/// matrices densely instead of applying them to a packed buffer.
pub(crate) fn single_diff_matrices(op: &GateOp, pr: &ParamResolver) -> Option<(M1, M1)> {
    let theta = resolve_angle(op, pr);
    let sign = if op.daggered { -1.0 } else { 1.0 };
    single_diff(op.kind, theta, sign)
}

pub(crate) fn double_diff_matrices(op: &GateOp, pr: &ParamResolver) -> Option<(M2, M2)> {
    let theta = resolve_angle(op, pr);
    let sign = if op.daggered { -1.0 } else { 1.0 };
    double_diff(op.kind, theta, sign)
}

/// Overwrite `rho` with `∂ρ/∂θ` for a single differentiable gate record
/// (spec §4.D "ExpectDiffGate"), at the point in the circuit it occupies.
pub fn apply_diff(rho: &mut [C], d: N, op: &GateOp, binding: &ParamResolver) -> SimResult<()> {
    let raw = op.angle.as_ref().map(|e| e.combination(binding)).unwrap_or(0.0);
    let theta = if op.daggered { -raw } else { raw };
    let sign = if op.daggered { -1.0 } else { 1.0 };
    match op.objs.len() {
        1 => {
            let (u, u_diff) =
                single_diff(op.kind, theta, sign).ok_or_else(|| SimError::UnknownGate(op.kind.name().into()))?;
            let mask = single_mask(op);
            single::apply_diff(rho, d, &mask, u, u_diff);
            Ok(())
        }
        2 => {
            let (u, u_diff) =
                double_diff(op.kind, theta, sign).ok_or_else(|| SimError::UnknownGate(op.kind.name().into()))?;
            let mask = double_mask(op);
            double::apply_diff(rho, d, &mask, u, u_diff);
            Ok(())
        }
        n => Err(SimError::InvalidArgument(format!(
            "a differentiable gate must act on 1 or 2 qubits, got {n}"
        ))),
    }
}
