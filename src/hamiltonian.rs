//! Hamiltonian data model (spec §3 "Hamiltonian", §4.B "Hamiltonian action
//! `ApplyTerms`", "Expectation `GetExpectation`").
//!
//! A Hamiltonian is either a sum of weighted Pauli strings or a dense
//! `d x d` matrix; the engine can materialize the former into the latter.
//! Both representations answer the same two questions a gradient worker
//! needs: `Tr(Hρ)` and the dense sidecar `H·ρ`.

use crate::math::{tri_get, N, C, R};

/// A single-qubit Pauli factor inside a weighted Pauli string. Qubits not
/// named in a term's `ops` act as identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pauli {
    X,
    Y,
    Z,
}

/// `coeff * P_{q0} ⊗ P_{q1} ⊗ ...`, identity on every qubit not listed.
#[derive(Clone, Debug, PartialEq)]
pub struct PauliTerm {
    pub coeff: C,
    pub ops: Vec<(N, Pauli)>,
}

impl PauliTerm {
    pub fn new(coeff: C, ops: Vec<(N, Pauli)>) -> Self {
        Self { coeff, ops }
    }

    /// The `(col, value)` pair such that this term contributes `value` at
    /// matrix position `(row, col)` — every Pauli string has exactly one
    /// nonzero column per row.
    fn row_entry(&self, row: N) -> (N, C) {
        let mut col = row;
        let mut factor = self.coeff;
        for &(q, p) in &self.ops {
            let bit_row = (row >> q) & 1;
            match p {
                Pauli::Z => {
                    if bit_row == 1 {
                        factor = -factor;
                    }
                }
                Pauli::X => {
                    col ^= 1 << q;
                }
                Pauli::Y => {
                    col ^= 1 << q;
                    factor *= if bit_row == 1 { C::i() } else { -C::i() };
                }
            }
        }
        (col, factor)
    }
}

/// A dense `d x d` matrix, row-major. Used for materialized Hamiltonians and
/// for the gradient engine's `ρ_H` sidecar, which is generally not Hermitian
/// and so cannot live in packed lower-triangular storage.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMat {
    pub d: N,
    pub data: Vec<C>,
}

impl DenseMat {
    pub fn zeros(d: N) -> Self {
        Self {
            d,
            data: vec![C::new(0.0, 0.0); d * d],
        }
    }

    pub fn identity(d: N) -> Self {
        let mut m = Self::zeros(d);
        for i in 0..d {
            m.set(i, i, C::new(1.0, 0.0));
        }
        m
    }

    #[inline]
    pub fn get(&self, r: N, c: N) -> C {
        self.data[r * self.d + c]
    }

    #[inline]
    pub fn set(&mut self, r: N, c: N, v: C) {
        self.data[r * self.d + c] = v;
    }

    #[inline]
    pub fn add(&mut self, r: N, c: N, v: C) {
        self.data[r * self.d + c] += v;
    }

    /// `Tr(M · rho)` where `rho` is a packed lower-triangular buffer of the
    /// same dimension.
    pub fn trace_with_packed(&self, rho: &[C]) -> C {
        let mut acc = C::new(0.0, 0.0);
        for r in 0..self.d {
            for c in 0..self.d {
                let m = self.get(r, c);
                if m == C::new(0.0, 0.0) {
                    continue;
                }
                acc += m * tri_get(rho, c, r);
            }
        }
        acc
    }

    /// `M · rho`, read from packed lower-triangular storage, as a dense
    /// `d x d` result.
    pub fn mul_packed(&self, rho: &[C]) -> DenseMat {
        let mut out = DenseMat::zeros(self.d);
        for r in 0..self.d {
            for k in 0..self.d {
                let m = self.get(r, k);
                if m == C::new(0.0, 0.0) {
                    continue;
                }
                for col in 0..self.d {
                    out.add(r, col, m * tri_get(rho, k, col));
                }
            }
        }
        out
    }

    /// Dense `self * other`, both `d x d`.
    pub fn mul_dense(&self, other: &DenseMat) -> DenseMat {
        debug_assert_eq!(self.d, other.d);
        let mut out = DenseMat::zeros(self.d);
        for r in 0..self.d {
            for k in 0..self.d {
                let a = self.get(r, k);
                if a == C::new(0.0, 0.0) {
                    continue;
                }
                for col in 0..self.d {
                    out.add(r, col, a * other.get(k, col));
                }
            }
        }
        out
    }

    /// `Tr(self * other)` for two dense `d x d` matrices.
    pub fn trace_mul(&self, other: &DenseMat) -> C {
        debug_assert_eq!(self.d, other.d);
        let mut acc = C::new(0.0, 0.0);
        for r in 0..self.d {
            for c in 0..self.d {
                acc += self.get(r, c) * other.get(c, r);
            }
        }
        acc
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Hamiltonian {
    Terms(Vec<PauliTerm>),
    Dense(DenseMat),
}

impl Hamiltonian {
    pub fn from_terms(terms: Vec<PauliTerm>) -> Self {
        Hamiltonian::Terms(terms)
    }

    pub fn from_dense(mat: DenseMat) -> Self {
        Hamiltonian::Dense(mat)
    }

    /// Materialize a dense `d x d` matrix from either representation.
    pub fn to_dense(&self, d: N) -> DenseMat {
        match self {
            Hamiltonian::Terms(terms) => {
                let mut out = DenseMat::zeros(d);
                for term in terms {
                    for r in 0..d {
                        let (c, v) = term.row_entry(r);
                        out.add(r, c, v);
                    }
                }
                out
            }
            Hamiltonian::Dense(mat) => {
                debug_assert_eq!(mat.d, d, "Hamiltonian dimension does not match state dimension");
                mat.clone()
            }
        }
    }

    /// `GetExpectation`: `Tr(Hρ)`, read directly from packed storage without
    /// materializing a dense `H` when the term-list form is used.
    pub fn expectation(&self, rho: &[C], d: N) -> C {
        match self {
            Hamiltonian::Terms(terms) => {
                let mut acc = C::new(0.0, 0.0);
                for term in terms {
                    for r in 0..d {
                        let (c, v) = term.row_entry(r);
                        acc += v * tri_get(rho, c, r);
                    }
                }
                acc
            }
            Hamiltonian::Dense(mat) => mat.trace_with_packed(rho),
        }
    }

    /// `ApplyTerms`: `H · ρ`, materialized densely to seed a gradient
    /// worker's `ρ_H` sidecar.
    pub fn apply_to(&self, rho: &[C], d: N) -> DenseMat {
        match self {
            Hamiltonian::Terms(terms) => {
                let mut out = DenseMat::zeros(d);
                for r in 0..d {
                    for term in terms {
                        let (c, v) = term.row_entry(r);
                        for col in 0..d {
                            out.add(r, col, v * tri_get(rho, c, col));
                        }
                    }
                }
                out
            }
            Hamiltonian::Dense(mat) => mat.mul_packed(rho),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{idx_map, tri_len};

    fn z_projector_rho() -> Vec<C> {
        // n=1, |0><0|
        let mut rho = vec![C::new(0.0, 0.0); tri_len(2)];
        rho[idx_map(0, 0)] = C::new(1.0, 0.0);
        rho
    }

    #[test]
    fn single_qubit_z_expectation_matches_diagonal_projector() {
        let rho = z_projector_rho();
        let h = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Z)])]);
        let e = h.expectation(&rho, 2);
        assert!((e.re - 1.0).abs() < 1e-12);
        assert!(e.im.abs() < 1e-12);
    }

    #[test]
    fn dense_materialization_matches_term_expectation() {
        let rho = z_projector_rho();
        let h = Hamiltonian::from_terms(vec![PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::X)])]);
        let dense = h.to_dense(2);
        let from_terms = h.expectation(&rho, 2);
        let from_dense = dense.trace_with_packed(&rho);
        assert!((from_terms - from_dense).norm() < 1e-12);
    }

    #[test]
    fn y_row_entry_matches_pauli_matrix() {
        // Y|0> = i|1>: row=1 (output bit 1), col should be 0, factor +i.
        let term = PauliTerm::new(C::new(1.0, 0.0), vec![(0, Pauli::Y)]);
        let (col, v) = term.row_entry(1);
        assert_eq!(col, 0);
        assert!((v - C::i()).norm() < 1e-12);
        // Y|1> = -i|0>: row=0, col=1, factor -i.
        let (col, v) = term.row_entry(0);
        assert_eq!(col, 1);
        assert!((v - (-C::i())).norm() < 1e-12);
    }
}
