//! Kraus-channel payloads (spec §4.B "Channels", §6 "channel_params").
//!
//! Channels act only on density matrices, never on state vectors — there is
//! no equivalent "apply to psi" path anywhere in this crate.

use crate::math::C;

/// A dense `2^k x 2^k` operator acting on the `k` object qubits of a channel,
/// row-major.
pub type KrausOp = Vec<Vec<C>>;

#[derive(Clone, Debug, PartialEq)]
pub enum ChannelKind {
    /// Single-qubit amplitude damping with decay probability `gamma`.
    AmplitudeDamping { gamma: f64 },
    /// Single-qubit phase damping with dephasing probability `gamma`.
    PhaseDamping { gamma: f64 },
    /// Single-qubit depolarizing-style Pauli mixture.
    Pauli { px: f64, py: f64, pz: f64 },
    /// Caller-supplied Kraus operator set. The engine trusts
    /// `sum_i K_i^dagger K_i == I` and does not re-verify it (spec
    /// Non-goals).
    GeneralKraus { ops: Vec<KrausOp> },
    /// Adjoint of amplitude damping (`sum_i K_i^dagger (.) K_i`), used by the
    /// gradient engine to step the Hamiltonian sidecar backwards through an
    /// AD channel it cannot invert.
    HermitianAmplitudeDamping { gamma: f64 },
}

impl ChannelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::AmplitudeDamping { .. } => "cAD",
            ChannelKind::PhaseDamping { .. } => "cPD",
            ChannelKind::Pauli { .. } => "cPL",
            ChannelKind::GeneralKraus { .. } => "Kraus",
            ChannelKind::HermitianAmplitudeDamping { .. } => "hcAD",
        }
    }

    /// The adjoint channel `Φ†(ρ) = Σ_i K_i† ρ K_i` (glossary "Hermitian
    /// adjoint circuit"). Phase damping and Pauli mixtures are self-adjoint
    /// (their Kraus operators are already Hermitian), so they pass through
    /// unchanged; amplitude damping is not (Φ ≠ Φ†) and swaps into the
    /// dedicated `HermitianAmplitudeDamping` marker the kernels dispatch on.
    pub fn adjoint(&self) -> ChannelKind {
        match self {
            ChannelKind::AmplitudeDamping { gamma } => ChannelKind::HermitianAmplitudeDamping { gamma: *gamma },
            ChannelKind::HermitianAmplitudeDamping { gamma } => ChannelKind::AmplitudeDamping { gamma: *gamma },
            ChannelKind::PhaseDamping { gamma } => ChannelKind::PhaseDamping { gamma: *gamma },
            ChannelKind::Pauli { px, py, pz } => ChannelKind::Pauli {
                px: *px,
                py: *py,
                pz: *pz,
            },
            ChannelKind::GeneralKraus { ops } => ChannelKind::GeneralKraus {
                ops: ops.iter().map(|k| conjugate_transpose(k)).collect(),
            },
        }
    }
}

fn conjugate_transpose(k: &KrausOp) -> KrausOp {
    let n = k.len();
    let mut out = vec![vec![C::new(0.0, 0.0); n]; n];
    for (i, row) in k.iter().enumerate() {
        for (j, v) in row.iter().enumerate() {
            out[j][i] = v.conj();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplitude_damping_adjoint_is_the_hermitian_marker() {
        let fwd = ChannelKind::AmplitudeDamping { gamma: 0.2 };
        assert_eq!(fwd.adjoint(), ChannelKind::HermitianAmplitudeDamping { gamma: 0.2 });
        assert_eq!(fwd.adjoint().adjoint(), fwd);
    }

    #[test]
    fn phase_damping_and_pauli_are_self_adjoint() {
        let pd = ChannelKind::PhaseDamping { gamma: 0.3 };
        assert_eq!(pd.adjoint(), pd);
        let pauli = ChannelKind::Pauli { px: 0.1, py: 0.2, pz: 0.3 };
        assert_eq!(pauli.adjoint(), pauli);
    }

    #[test]
    fn general_kraus_adjoint_conjugate_transposes_each_operator() {
        let ops = vec![vec![
            vec![C::new(1.0, 2.0), C::new(0.0, 0.0)],
            vec![C::new(3.0, -1.0), C::new(0.0, 5.0)],
        ]];
        let adj = ChannelKind::GeneralKraus { ops: ops.clone() }.adjoint();
        match adj {
            ChannelKind::GeneralKraus { ops: adj_ops } => {
                assert_eq!(adj_ops[0][0][0], C::new(1.0, -2.0));
                assert_eq!(adj_ops[0][0][1], C::new(3.0, 1.0));
                assert_eq!(adj_ops[0][1][0], C::new(0.0, 0.0));
                assert_eq!(adj_ops[0][1][1], C::new(0.0, -5.0));
            }
            _ => panic!("expected GeneralKraus"),
        }
    }
}
