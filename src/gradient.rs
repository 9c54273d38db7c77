//! Gradient engine (spec §4.D): reversible-mode and noise-mode analytic
//! parameter-shift-style differentiation via derivative gates, plus the
//! `OneOne`/`OneMulti`/`MultiMulti` batching scheme over parameter bindings
//! and Hamiltonians.
//!
//! Both modes compute the same quantity per differentiable gate `g` acting
//! at circuit position `m`: `Tr(ρ_H · ∂g/∂θ · ρ_{m-1} · g†)`, where `ρ_{m-1}`
//! is the forward state just before `g` acted and `ρ_H` is `H` conjugated by
//! every gate *after* `g`. Reversible mode gets `ρ_{m-1}` by peeling the
//! fully-evolved `ρ_S` backward through each gate's own adjoint (only valid
//! when every gate is unitary); noise mode gets it by replaying the prefix
//! of the forward circuit from scratch, since a channel has no inverse.
//!
//! `GradConfig`'s `batch_threads`/`mea_threads` are this module's own
//! task-level fan-out (over parameter bindings, and over Hamiltonians
//! sharing one backward walk). The packed-`ρ_S` peeling this module drives
//! through `dispatch::apply` additionally picks up `kernel`'s own
//! intra-kernel `rayon` path once a circuit's dimension crosses
//! `kernel::DIM_THRESHOLD`, so a large-qubit-count batch gets both levels
//! of parallelism at once; the dense `ρ_H` sidecar `step_dense_sidecar`
//! drives (`kernel::dense`) has no such threshold and stays serial: it is
//! `O(d^2)` per gate rather than packed-triangular `O(d^2/2)`, and
//! splitting it the same way is unexplored.

use rayon::prelude::*;

use crate::dispatch;
use crate::error::{SimError, SimResult};
use crate::gate::{Circuit, GateKind, GateOp};
use crate::hamiltonian::{DenseMat, Hamiltonian};
use crate::kernel;
use crate::math::{C, N};
use crate::param::ParamResolver;
use crate::state::DensityState;

/// Tunable concurrency knobs for [`gradients`] (spec §4.D "Batching", §5).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradConfig {
    /// OS-thread fan-out over parameter bindings in `MultiMulti`.
    pub batch_threads: N,
    /// Fan-out over Hamiltonians sharing one backward walk in `OneMulti`,
    /// clamped to `min(15, M)` regardless of what is configured here.
    pub mea_threads: N,
}

impl Default for GradConfig {
    fn default() -> Self {
        Self {
            batch_threads: 1,
            mea_threads: 1,
        }
    }
}

impl GradConfig {
    fn mea_threads_for(&self, m: N) -> N {
        self.mea_threads.max(1).min(15).min(m.max(1))
    }
}

/// One binding's, one Hamiltonian's `(f, ∂f/∂θ)` (spec §4.D "Return shape").
#[derive(Clone, Debug, PartialEq)]
pub struct GradResult {
    pub value: C,
    pub grad: Vec<C>,
}

fn run_chunked_ref<T, F, R>(items: &[T], threads: N, f: F) -> SimResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> SimResult<R> + Sync,
{
    if threads <= 1 || items.len() <= 1 {
        return items.iter().map(&f).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("qdm-mea-{i}"))
        .build()
        .map_err(|e| SimError::AllocationFailure(e.to_string()))?;
    pool.install(|| items.par_iter().map(&f).collect())
}

fn run_chunked_mut<T, F>(items: &mut [T], threads: N, f: F) -> SimResult<()>
where
    T: Send,
    F: Fn(&mut T) -> SimResult<()> + Sync,
{
    if threads <= 1 || items.len() <= 1 {
        for t in items.iter_mut() {
            f(t)?;
        }
        return Ok(());
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("qdm-mea-{i}"))
        .build()
        .map_err(|e| SimError::AllocationFailure(e.to_string()))?;
    pool.install(|| items.par_iter_mut().try_for_each(&f))
}

/// `Tr(ρ_H · ∂g/∂θ · ρ_S · g†)` for one differentiable gate record, via
/// dense embeddings of its own `(U, ∂U/∂θ)` (spec §4.D "ExpectDiffGate").
fn expect_diff_gate(rho_s: &[C], rho_h: &DenseMat, d: N, op: &GateOp, pr: &ParamResolver) -> SimResult<C> {
    match op.objs.len() {
        1 => {
            let mask = dispatch::single_mask(op);
            let (u, u_diff) =
                dispatch::single_diff_matrices(op, pr).ok_or_else(|| SimError::UnknownGate(op.kind.name().into()))?;
            let du_embed = kernel::dense::embed_single(d, &mask, u_diff, false);
            let udag_embed = kernel::dense::embed_single(d, &mask, kernel::block::dagger2(u), true);
            let step1 = rho_h.mul_dense(&du_embed);
            let step2 = step1.mul_packed(rho_s);
            Ok(step2.trace_mul(&udag_embed))
        }
        2 => {
            let mask = dispatch::double_mask(op);
            let (u, u_diff) =
                dispatch::double_diff_matrices(op, pr).ok_or_else(|| SimError::UnknownGate(op.kind.name().into()))?;
            let du_embed = kernel::dense::embed_double(d, &mask, u_diff, false);
            let udag_embed = kernel::dense::embed_double(d, &mask, kernel::block::dagger4(u), true);
            let step1 = rho_h.mul_dense(&du_embed);
            let step2 = step1.mul_packed(rho_s);
            Ok(step2.trace_mul(&udag_embed))
        }
        n => Err(SimError::InvalidArgument(format!(
            "a differentiable gate must act on 1 or 2 qubits, got {n}"
        ))),
    }
}

/// Step the dense `ρ_H` sidecar through any gate or channel record.
fn step_dense_sidecar(mat: &mut DenseMat, g: &GateOp, pr: &ParamResolver) -> SimResult<()> {
    match g.kind {
        GateKind::Channel => {
            let kind = g
                .channel
                .as_ref()
                .ok_or_else(|| SimError::InvalidArgument("Channel record missing its ChannelKind".into()))?;
            kernel::dense::apply_channel(mat, &g.objs, kind)
        }
        GateKind::Measure => Err(SimError::InvalidArgument(
            "Measure cannot act on the gradient sidecar".into(),
        )),
        kind if g.objs.len() == 1 => {
            let theta = dispatch::resolve_angle(g, pr);
            let mask = dispatch::single_mask(g);
            let u = dispatch::single_matrix(kind, theta, g.daggered).ok_or_else(|| SimError::UnknownGate(kind.name().into()))?;
            kernel::dense::apply_unitary_single(mat, &mask, u);
            Ok(())
        }
        kind if g.objs.len() == 2 => {
            let theta = dispatch::resolve_angle(g, pr);
            let mask = dispatch::double_mask(g);
            let u = dispatch::double_matrix(kind, theta, g.daggered).ok_or_else(|| SimError::UnknownGate(kind.name().into()))?;
            kernel::dense::apply_unitary_double(mat, &mask, u);
            Ok(())
        }
        kind => Err(SimError::UnknownGate(kind.name().into())),
    }
}

fn accumulate(grads: &mut [Vec<C>], j: N, order: &[String], expr: &crate::param::Expr, names: &[&str], term: C) {
    for name in names {
        if let Some(slot) = order.iter().position(|p| p == name) {
            let coeff = expr.coefficient(name);
            grads[j][slot] += C::new(2.0 * term.re * coeff, 0.0);
        }
    }
}

/// `OneMulti` under reversible mode: one forward evolution, `ρ_S` peeled
/// backward through each gate's own adjoint in lock-step with `ρ_H`, shared
/// across every Hamiltonian (spec §4.D "Reversible mode"). Rejects any
/// circuit containing a channel — reversible mode has no way to invert one.
fn reversible_one_multi(
    n_qubits: N,
    circuit: &Circuit,
    herm_circuit: &Circuit,
    pr: &ParamResolver,
    hamiltonians: &[Hamiltonian],
    order: &[String],
    seed: u64,
    config: &GradConfig,
) -> SimResult<Vec<GradResult>> {
    if circuit.iter().any(|g| g.kind == GateKind::Channel) {
        return Err(SimError::InvalidArgument(
            "reversible-mode gradients do not support channels; use noise-mode gradients".into(),
        ));
    }
    let mut state = DensityState::new(n_qubits, seed);
    state.apply_circuit(circuit, pr)?;
    let values: Vec<C> = hamiltonians.iter().map(|h| state.get_expectation(h)).collect();
    let d = state.d();
    let mut rho_s = state.packed().to_vec();
    let mut rho_hs: Vec<DenseMat> = hamiltonians.iter().map(|h| h.to_dense(d)).collect();
    let mut grads = vec![vec![C::new(0.0, 0.0); order.len()]; hamiltonians.len()];
    let mea_threads = config.mea_threads_for(hamiltonians.len());
    let len = circuit.len();

    for i in 0..len {
        let m = len - 1 - i;
        let peel_gate = &herm_circuit[i];
        let fwd_gate = &circuit[m];

        dispatch::apply(&mut rho_s, d, peel_gate, pr)?;

        if fwd_gate.kind.is_differentiable_family() {
            if let Some(expr) = &fwd_gate.angle {
                let names: Vec<&str> = expr.requires_grad_names(pr).collect();
                if !names.is_empty() {
                    let rho_s_ref = &rho_s;
                    let terms = run_chunked_ref(&rho_hs, mea_threads, |rho_h| {
                        expect_diff_gate(rho_s_ref, rho_h, d, fwd_gate, pr)
                    })?;
                    for (j, term) in terms.into_iter().enumerate() {
                        accumulate(&mut grads, j, order, expr, &names, term);
                    }
                }
            }
        }

        run_chunked_mut(&mut rho_hs, mea_threads, |rho_h| step_dense_sidecar(rho_h, peel_gate, pr))?;
    }

    Ok(values
        .into_iter()
        .zip(grads)
        .map(|(value, grad)| GradResult { value, grad })
        .collect())
}

/// `OneMulti` under noise mode: `ρ_S` cannot be peeled backward through a
/// channel, so every differentiable gate's contribution is computed against
/// a fresh replay of the forward circuit's prefix (spec §4.D "Noise mode").
/// `O(|C|²)` in gate count, correct under arbitrary channels.
fn noise_one_multi(
    n_qubits: N,
    circuit: &Circuit,
    herm_circuit: &Circuit,
    pr: &ParamResolver,
    hamiltonians: &[Hamiltonian],
    order: &[String],
    seed: u64,
    config: &GradConfig,
) -> SimResult<Vec<GradResult>> {
    let len = circuit.len();
    let mut state = DensityState::new(n_qubits, seed);
    state.apply_circuit(circuit, pr)?;
    let values: Vec<C> = hamiltonians.iter().map(|h| state.get_expectation(h)).collect();
    let d = state.d();
    let mut rho_hs: Vec<DenseMat> = hamiltonians.iter().map(|h| h.to_dense(d)).collect();
    let mut grads = vec![vec![C::new(0.0, 0.0); order.len()]; hamiltonians.len()];
    let mea_threads = config.mea_threads_for(hamiltonians.len());

    for (i, peel_gate) in herm_circuit.iter().enumerate() {
        let m = len - 1 - i;
        let fwd_gate = &circuit[m];

        if fwd_gate.kind.is_differentiable_family() {
            if let Some(expr) = &fwd_gate.angle {
                let names: Vec<&str> = expr.requires_grad_names(pr).collect();
                if !names.is_empty() {
                    let mut replay = DensityState::new(n_qubits, seed);
                    replay.apply_circuit(&circuit[..m], pr)?;
                    let rho_s = replay.packed();
                    let terms = run_chunked_ref(&rho_hs, mea_threads, |rho_h| {
                        expect_diff_gate(rho_s, rho_h, d, fwd_gate, pr)
                    })?;
                    for (j, term) in terms.into_iter().enumerate() {
                        accumulate(&mut grads, j, order, expr, &names, term);
                    }
                }
            }
        }

        run_chunked_mut(&mut rho_hs, mea_threads, |rho_h| step_dense_sidecar(rho_h, peel_gate, pr))?;
    }

    Ok(values
        .into_iter()
        .zip(grads)
        .map(|(value, grad)| GradResult { value, grad })
        .collect())
}

fn gradients(
    n_qubits: N,
    circuit: &Circuit,
    herm_circuit: &Circuit,
    bindings: &[ParamResolver],
    hamiltonians: &[Hamiltonian],
    param_order: &[String],
    seed: u64,
    config: &GradConfig,
    noise: bool,
) -> SimResult<Vec<Vec<GradResult>>> {
    if circuit.len() != herm_circuit.len() {
        return Err(SimError::CircuitLengthMismatch {
            forward: circuit.len(),
            adjoint: herm_circuit.len(),
        });
    }
    tracing::debug!(
        n_qubits,
        gates = circuit.len(),
        bindings = bindings.len(),
        hamiltonians = hamiltonians.len(),
        noise,
        "gradient batch starting"
    );

    let one_multi = |pr: &ParamResolver| -> SimResult<Vec<GradResult>> {
        if noise {
            noise_one_multi(n_qubits, circuit, herm_circuit, pr, hamiltonians, param_order, seed, config)
        } else {
            reversible_one_multi(n_qubits, circuit, herm_circuit, pr, hamiltonians, param_order, seed, config)
        }
    };

    let batch_threads = config.batch_threads.max(1).min(bindings.len().max(1));
    let result = if bindings.len() <= 1 || batch_threads <= 1 {
        bindings.iter().map(one_multi).collect::<SimResult<Vec<_>>>()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(batch_threads)
            .thread_name(|i| format!("qdm-batch-{i}"))
            .build()
            .map_err(|e| SimError::AllocationFailure(e.to_string()))?;
        pool.install(|| bindings.par_iter().map(one_multi).collect::<SimResult<Vec<_>>>())
    };

    tracing::trace!("gradient batch finished");
    result
}

/// Reversible-mode gradients (spec §4.D): `circuit` must contain no
/// channels. `herm_circuit` is `circuit`'s element-wise Hermitian adjoint,
/// reversed (see [`crate::gate::hermitian_adjoint`]).
pub fn reversible_gradients(
    n_qubits: N,
    circuit: &Circuit,
    herm_circuit: &Circuit,
    bindings: &[ParamResolver],
    hamiltonians: &[Hamiltonian],
    param_order: &[String],
    seed: u64,
    config: &GradConfig,
) -> SimResult<Vec<Vec<GradResult>>> {
    gradients(
        n_qubits,
        circuit,
        herm_circuit,
        bindings,
        hamiltonians,
        param_order,
        seed,
        config,
        false,
    )
}

/// Noise-mode gradients (spec §4.D): `circuit` may contain channels.
/// `O(|C|²)` in gate count.
pub fn noise_gradients(
    n_qubits: N,
    circuit: &Circuit,
    herm_circuit: &Circuit,
    bindings: &[ParamResolver],
    hamiltonians: &[Hamiltonian],
    param_order: &[String],
    seed: u64,
    config: &GradConfig,
) -> SimResult<Vec<Vec<GradResult>>> {
    gradients(
        n_qubits,
        circuit,
        herm_circuit,
        bindings,
        hamiltonians,
        param_order,
        seed,
        config,
        true,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;
    use crate::gate::hermitian_adjoint;
    use crate::hamiltonian::{Pauli, PauliTerm};
    use crate::param::Expr;
    use std::f64::consts::PI;

    #[test]
    fn rx_expectation_gradient_matches_the_analytic_derivative() {
        // f(theta) = <Z> for RX(theta)|0>  =  cos(theta); df/dtheta = -sin(theta).
        let circuit: Circuit = vec![GateOp::rotation(GateKind::Rx, vec![0], vec![], Expr::linear("theta", 1.0))];
        let herm = hermitian_adjoint(&circuit);
        let pr = ParamResolver::new().with_value("theta", PI / 3.0, true);
        let h = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)])]);
        let order = vec!["theta".to_string()];
        let config = GradConfig::default();

        let out = reversible_gradients(1, &circuit, &herm, &[pr], &[h], &order, 1, &config).unwrap();
        let r = &out[0][0];
        assert!((r.value.re - 0.5).abs() < 1e-9);
        assert!((r.grad[0].re - (-(3f64).sqrt() / 2.0)).abs() < 1e-9);
    }

    #[test]
    fn reversible_and_noise_mode_agree_on_a_noiseless_circuit() {
        let circuit: Circuit = vec![GateOp::rotation(GateKind::Ry, vec![0], vec![], Expr::linear("phi", 1.0))];
        let herm = hermitian_adjoint(&circuit);
        let pr = ParamResolver::new().with_value("phi", 0.9, true);
        let h = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)])]);
        let order = vec!["phi".to_string()];
        let config = GradConfig::default();

        let reversible = reversible_gradients(1, &circuit, &herm, &[pr.clone()], &[h.clone()], &order, 5, &config).unwrap();
        let noisy = noise_gradients(1, &circuit, &herm, &[pr], &[h], &order, 5, &config).unwrap();
        assert!((reversible[0][0].grad[0] - noisy[0][0].grad[0]).norm() < 1e-9);
    }

    #[test]
    fn noise_mode_gradient_propagates_through_an_amplitude_damping_channel() {
        // Rx(theta)|0> followed by amplitude damping with decay `gamma`:
        // f(theta) = Tr(Z rho) = (1 - gamma)*cos(theta) + gamma, worked by hand
        // from the channel's Kraus operators. The channel sits between the
        // differentiable gate and the Hamiltonian, so this pins down that
        // `step_dense_sidecar` propagates `rho_H` through the channel's
        // *adjoint*, not its forward map.
        let gamma = 0.3;
        let theta = 0.8;
        let circuit: Circuit = vec![
            GateOp::rotation(GateKind::Rx, vec![0], vec![], Expr::linear("theta", 1.0)),
            GateOp::channel(vec![0], ChannelKind::AmplitudeDamping { gamma }),
        ];
        let herm = hermitian_adjoint(&circuit);
        let pr = ParamResolver::new().with_value("theta", theta, true);
        let h = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)])]);
        let order = vec!["theta".to_string()];
        let config = GradConfig::default();

        let out = noise_gradients(1, &circuit, &herm, &[pr], &[h], &order, 3, &config).unwrap();
        let r = &out[0][0];
        let expected_value = (1.0 - gamma) * theta.cos() + gamma;
        let expected_grad = -(1.0 - gamma) * theta.sin();
        assert!((r.value.re - expected_value).abs() < 1e-9);
        assert!((r.grad[0].re - expected_grad).abs() < 1e-9);
    }

    #[test]
    fn reversible_mode_rejects_channels() {
        let circuit: Circuit = vec![GateOp::channel(vec![0], ChannelKind::AmplitudeDamping { gamma: 0.1 })];
        let herm = hermitian_adjoint(&circuit);
        let pr = ParamResolver::new();
        let h = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)])]);
        let config = GradConfig::default();
        assert!(reversible_gradients(1, &circuit, &herm, &[pr], &[h], &[], 0, &config).is_err());
    }

    #[test]
    fn circuit_length_mismatch_is_a_proper_error() {
        let circuit: Circuit = vec![GateOp::fixed(GateKind::H, vec![0], vec![])];
        let herm: Circuit = vec![];
        let pr = ParamResolver::new();
        let h = Hamiltonian::from_terms(vec![]);
        let config = GradConfig::default();
        let err = reversible_gradients(1, &circuit, &herm, &[pr], &[h], &[], 0, &config).unwrap_err();
        assert!(matches!(err, SimError::CircuitLengthMismatch { .. }));
    }

    #[test]
    fn multiple_hamiltonians_share_one_forward_evolution() {
        let circuit: Circuit = vec![GateOp::fixed(GateKind::H, vec![0], vec![])];
        let herm = hermitian_adjoint(&circuit);
        let pr = ParamResolver::new();
        let hz = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)])]);
        let hx = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::X)])]);
        let config = GradConfig::default();
        let out = reversible_gradients(1, &circuit, &herm, &[pr], &[hz, hx], &[], 2, &config).unwrap();
        assert!((out[0][0].value.re - 0.0).abs() < 1e-9);
        assert!((out[0][1].value.re - 1.0).abs() < 1e-9);
    }
}
