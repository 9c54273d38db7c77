//! Integration suite: end-to-end scenarios, round-trip laws and algebraic
//! identities over the public API, one test per property rather than per
//! module (module-local behavior is covered by each module's own `#[cfg(test)]`).

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::channel::ChannelKind;
use crate::gate::{hermitian_adjoint, GateKind, GateOp};
use crate::gradient::{reversible_gradients, GradConfig};
use crate::hamiltonian::{Hamiltonian, Pauli, PauliTerm};
use crate::math::{approx_cmp::approx_eq, C};
use crate::param::{Expr, ParamResolver};
use crate::sampling::{sample, SampleConfig};
use crate::state::DensityState;

fn z_on(q: usize) -> Hamiltonian {
    Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(q, Pauli::Z)])])
}

fn x_on(q: usize) -> Hamiltonian {
    Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(q, Pauli::X)])])
}

fn assert_physical(state: &DensityState) {
    let d = state.d();
    let mut trace = C::new(0.0, 0.0);
    for r in 0..d {
        trace += state.get_qs(r, r);
        for c in 0..d {
            let upper = state.get_qs(r, c);
            let lower = state.get_qs(c, r);
            assert!((upper - lower.conj()).norm() < 1e-9, "rho[{r},{c}] not Hermitian");
        }
    }
    assert!((trace.re - 1.0).abs() < 1e-9, "trace != 1: {trace:?}");
    assert!(trace.im.abs() < 1e-9);
}

// --- Concrete end-to-end scenarios (spec §8) ---------------------------------

#[test]
fn scenario_1_empty_circuit_z_expectation_is_one() {
    let state = DensityState::new(1, 1);
    let e = state.get_expectation(&z_on(0));
    assert!((e.re - 1.0).abs() < 1e-10);
    assert_physical(&state);
}

#[test]
fn scenario_2_hadamard_gives_the_plus_state() {
    let mut state = DensityState::new(1, 2);
    let circuit = vec![GateOp::fixed(GateKind::H, vec![0], vec![])];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    for (r, c) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        assert!(approx_eq(&state.get_qs(r, c), &C::new(0.5, 0.0)), "rho[{r},{c}]");
    }
    assert!(state.get_expectation(&z_on(0)).re.abs() < 1e-10);
    assert!((state.get_expectation(&x_on(0)).re - 1.0).abs() < 1e-10);
    assert_physical(&state);
}

#[test]
fn scenario_3_bell_pair_and_sampling() {
    let mut state = DensityState::new(2, 3);
    let circuit = vec![
        GateOp::fixed(GateKind::H, vec![0], vec![]),
        GateOp::fixed(GateKind::X, vec![1], vec![0]),
    ];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    assert!(approx_eq(&state.get_qs(0, 0), &C::new(0.5, 0.0)));
    assert!(approx_eq(&state.get_qs(3, 3), &C::new(0.5, 0.0)));
    assert!(approx_eq(&state.get_qs(3, 0), &C::new(0.5, 0.0)));
    assert!(approx_eq(&state.get_qs(0, 3), &C::new(0.5, 0.0)));
    assert!(state.get_qs(1, 1).norm() < 1e-10);
    assert!(state.get_qs(2, 2).norm() < 1e-10);
    assert_physical(&state);

    let measuring: Vec<GateOp> = vec![GateOp::measure(0, "q0"), GateOp::measure(1, "q1")];
    let mut key_map = HashMap::new();
    key_map.insert("q0".to_string(), 0);
    key_map.insert("q1".to_string(), 1);
    let shots = 10_000;
    let out = sample(&state, &measuring, &ParamResolver::new(), shots, &key_map, &SampleConfig::default()).unwrap();

    let mut ones_q0 = 0usize;
    for row in out.chunks_exact(2) {
        assert_eq!(row[0], row[1], "Bell outcome must be correlated");
        ones_q0 += row[0] as usize;
    }
    let frac = ones_q0 as f64 / shots as f64;
    assert!((frac - 0.5).abs() < 0.05, "expected roughly 50/50 split, got {frac}");
}

#[test]
fn scenario_4_rx_gradient_matches_the_worked_example() {
    let theta = PI / 3.0;
    let circuit = vec![GateOp::rotation(GateKind::Rx, vec![0], vec![], Expr::linear("theta", 1.0))];
    let herm = hermitian_adjoint(&circuit);
    let binding = ParamResolver::new().with_value("theta", theta, true);
    let order = vec!["theta".to_string()];

    let results = reversible_gradients(1, &circuit, &herm, &[binding], &[z_on(0)], &order, 1, &GradConfig::default()).unwrap();
    let r = &results[0][0];
    assert!((r.value.re - 0.5).abs() < 1e-8, "value = {:?}", r.value);
    assert!((r.grad[0].re - (-0.8660254)).abs() < 1e-6, "grad = {:?}", r.grad[0]);
}

#[test]
fn scenario_5_amplitude_damping_after_x() {
    let mut state = DensityState::new(1, 5);
    let circuit = vec![
        GateOp::fixed(GateKind::X, vec![0], vec![]),
        GateOp::channel(vec![0], ChannelKind::AmplitudeDamping { gamma: 0.3 }),
    ];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    assert!(approx_eq(&state.get_qs(0, 0), &C::new(0.3, 0.0)));
    assert!(approx_eq(&state.get_qs(1, 1), &C::new(0.7, 0.0)));
    assert!((state.get_expectation(&z_on(0)).re - (-0.4)).abs() < 1e-9);
    assert_physical(&state);
}

#[test]
fn scenario_6_phase_damping_after_hadamard() {
    let mut state = DensityState::new(1, 6);
    let circuit = vec![
        GateOp::fixed(GateKind::H, vec![0], vec![]),
        GateOp::channel(vec![0], ChannelKind::PhaseDamping { gamma: 0.5 }),
    ];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    let off = 0.5 * 0.5f64.sqrt();
    assert!(approx_eq(&state.get_qs(0, 0), &C::new(0.5, 0.0)));
    assert!(approx_eq(&state.get_qs(1, 1), &C::new(0.5, 0.0)));
    assert!(approx_eq(&state.get_qs(1, 0), &C::new(off, 0.0)));
    assert!(approx_eq(&state.get_qs(0, 1), &C::new(off, 0.0)));
    assert_physical(&state);
}

// --- Round-trip laws ----------------------------------------------------------

#[test]
fn apply_then_adjoint_returns_rho_to_original() {
    let mut state = DensityState::new(2, 11);
    let circuit = vec![
        GateOp::fixed(GateKind::H, vec![0], vec![]),
        GateOp::rotation(GateKind::Rz, vec![1], vec![], Expr::constant(0.7)),
        GateOp::fixed(GateKind::X, vec![1], vec![0]),
    ];
    let pr = ParamResolver::new();
    state.apply_circuit(&circuit, &pr).unwrap();
    let adjoint = hermitian_adjoint(&circuit);
    state.apply_circuit(&adjoint, &pr).unwrap();

    let fresh = DensityState::new(2, 11);
    for r in 0..4 {
        for c in 0..4 {
            assert!(
                (state.get_qs(r, c) - fresh.get_qs(r, c)).norm() < 1e-8,
                "rho[{r},{c}] did not return to the zero projector"
            );
        }
    }
}

#[test]
fn two_hadamards_on_the_same_qubit_is_identity() {
    let mut state = DensityState::new(1, 12);
    let circuit = vec![
        GateOp::fixed(GateKind::H, vec![0], vec![]),
        GateOp::fixed(GateKind::H, vec![0], vec![]),
    ];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    assert!(approx_eq(&state.get_qs(0, 0), &C::new(1.0, 0.0)));
    assert!(state.get_qs(1, 1).norm() < 1e-10);
}

#[test]
fn measuring_a_qubit_twice_returns_the_same_outcome() {
    let mut state = DensityState::new(1, 13);
    state.apply_circuit(&vec![GateOp::fixed(GateKind::H, vec![0], vec![])], &ParamResolver::new()).unwrap();
    let first = state.apply_measure(&GateOp::measure(0, "m")).unwrap();
    let second = state.apply_measure(&GateOp::measure(0, "m")).unwrap();
    assert_eq!(first, second);
}

// --- Algebraic identities ------------------------------------------------------

#[test]
fn swap_twice_is_identity() {
    let mut state = DensityState::new(2, 14);
    state.apply_circuit(&vec![GateOp::fixed(GateKind::X, vec![0], vec![])], &ParamResolver::new()).unwrap();
    let circuit = vec![
        GateOp::fixed(GateKind::Swap, vec![0, 1], vec![]),
        GateOp::fixed(GateKind::Swap, vec![0, 1], vec![]),
    ];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    assert!(approx_eq(&state.get_qs(1, 1), &C::new(1.0, 0.0)));
}

#[test]
fn rx_composes_additively() {
    let theta = 0.4;
    let phi = 0.9;
    let pr = ParamResolver::new();

    let mut composed = DensityState::new(1, 15);
    composed
        .apply_circuit(
            &vec![GateOp::rotation(GateKind::Rx, vec![0], vec![], Expr::constant(theta + phi))],
            &pr,
        )
        .unwrap();

    let mut sequential = DensityState::new(1, 15);
    sequential
        .apply_circuit(
            &vec![
                GateOp::rotation(GateKind::Rx, vec![0], vec![], Expr::constant(theta)),
                GateOp::rotation(GateKind::Rx, vec![0], vec![], Expr::constant(phi)),
            ],
            &pr,
        )
        .unwrap();

    for r in 0..2 {
        for c in 0..2 {
            assert!((composed.get_qs(r, c) - sequential.get_qs(r, c)).norm() < 1e-9);
        }
    }
}

#[test]
fn get_expectation_matches_a_dense_recomputation() {
    let mut state = DensityState::new(2, 16);
    state
        .apply_circuit(
            &vec![
                GateOp::fixed(GateKind::H, vec![0], vec![]),
                GateOp::fixed(GateKind::X, vec![1], vec![0]),
            ],
            &ParamResolver::new(),
        )
        .unwrap();
    let h = Hamiltonian::from_terms(vec![
        PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)]),
        PauliTerm::new(C::new(0.5, 0.0), vec![(1, Pauli::X)]),
    ]);
    let via_api = state.get_expectation(&h);

    let dense = h.to_dense(4);
    let mut dense_trace = C::new(0.0, 0.0);
    for r in 0..4 {
        for c in 0..4 {
            dense_trace += dense.get(r, c) * state.get_qs(c, r);
        }
    }
    assert!((via_api - dense_trace).norm() < 1e-9);
}

// --- Universal invariants spot-check across a mixed circuit --------------------

#[test]
fn a_noisy_mixed_circuit_stays_physical() {
    let mut state = DensityState::new(2, 17);
    let circuit = vec![
        GateOp::fixed(GateKind::H, vec![0], vec![]),
        GateOp::channel(vec![0], ChannelKind::AmplitudeDamping { gamma: 0.2 }),
        GateOp::fixed(GateKind::X, vec![1], vec![0]),
        GateOp::channel(vec![1], ChannelKind::Pauli { px: 0.05, py: 0.05, pz: 0.05 }),
    ];
    state.apply_circuit(&circuit, &ParamResolver::new()).unwrap();
    assert_physical(&state);
}
