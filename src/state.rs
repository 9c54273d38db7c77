//! Density-matrix state container (spec §4.C).
//!
//! Owns the packed lower-triangular `ρ` buffer, its dimension, and an
//! independent RNG seeded deterministically at construction — mirroring the
//! way `qvnt::register::quant::Reg` owns its backend's wavefunction buffer,
//! except here the RNG lives on the state itself rather than reaching for
//! `rand::thread_rng()` per call, since sampling needs every shot's stream
//! to be reproducible from one seed (spec §4.C, §4.E).

use std::collections::HashMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::dispatch;
use crate::error::{SimError, SimResult};
use crate::gate::{Circuit, GateKind, GateOp};
use crate::hamiltonian::{DenseMat, Hamiltonian};
use crate::kernel::measure;
use crate::math::{idx_map, tri_get, tri_len, tri_set, C, N};
use crate::param::ParamResolver;

const MAX_LEN_TO_DISPLAY: N = 8;

pub struct DensityState {
    n: N,
    d: N,
    seed: u64,
    rho: Vec<C>,
    rng: StdRng,
}

impl DensityState {
    /// `ρ = |0...0><0...0|` over `n` qubits, dimension `d = 2^n`.
    pub fn new(n: N, seed: u64) -> Self {
        let d = 1usize << n;
        let mut rho = vec![C::new(0.0, 0.0); tri_len(d)];
        rho[idx_map(0, 0)] = C::new(1.0, 0.0);
        Self {
            n,
            d,
            seed,
            rho,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Construct from an owned buffer already in packed lower-triangular
    /// form. The engine trusts it is Hermitian, positive semi-definite and
    /// trace 1 (spec §3 "by contract") and does not re-validate.
    pub fn from_packed(n: N, seed: u64, rho: Vec<C>) -> SimResult<Self> {
        let d = 1usize << n;
        if rho.len() != tri_len(d) {
            return Err(SimError::InvalidArgument(format!(
                "expected a packed buffer of length {} for n={n}, got {}",
                tri_len(d),
                rho.len()
            )));
        }
        Ok(Self {
            n,
            d,
            seed,
            rho,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn n(&self) -> N {
        self.n
    }

    pub fn d(&self) -> N {
        self.d
    }

    /// The seed this state (and any `copy_qs()` of it) was constructed
    /// with — the sampling engine mixes this with a shot index rather than
    /// reusing it verbatim (spec §4.E, §9 REDESIGN FLAG 3).
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Re-seed the RNG in place without touching `ρ`, for callers (the
    /// sampling engine) that need an independent stream per shot rather
    /// than the deterministic-from-construction stream `reset`/`copy_qs`
    /// give back.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn packed(&self) -> &[C] {
        &self.rho
    }

    /// Back to `|0...0><0...0|`, re-seeding the RNG deterministically from
    /// the stored seed (spec §4.C).
    pub fn reset(&mut self) {
        for v in self.rho.iter_mut() {
            *v = C::new(0.0, 0.0);
        }
        self.rho[idx_map(0, 0)] = C::new(1.0, 0.0);
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    /// Deep copy of `ρ`, with a freshly re-seeded RNG rather than a clone of
    /// the live RNG stream (spec §4.C "Copy and move are deep on ρ and
    /// re-seed the RNG from the stored seed (deterministic)").
    pub fn copy_qs(&self) -> Self {
        Self {
            n: self.n,
            d: self.d,
            seed: self.seed,
            rho: self.rho.clone(),
            rng: StdRng::seed_from_u64(self.seed),
        }
    }

    /// Unpack `ρ[r,c]`, conjugating for `r < c`.
    pub fn get_qs(&self, r: N, c: N) -> C {
        tri_get(&self.rho, r, c)
    }

    /// Overwrite `ρ[r,c]`; routed to the conjugate storage slot when `r < c`.
    pub fn set_qs(&mut self, r: N, c: N, val: C) {
        tri_set(&mut self.rho, r, c, val);
    }

    /// Dispatch one gate record (spec §4.C "ApplyGate(g, pr, diff=false)").
    /// `Measure` records are rejected; use [`Self::apply_measure`] for those.
    pub fn apply_gate(&mut self, g: &GateOp, pr: &ParamResolver, diff: bool) -> SimResult<()> {
        if diff {
            dispatch::apply_diff(&mut self.rho, self.d, g, pr)
        } else {
            dispatch::apply(&mut self.rho, self.d, g, pr)
        }
    }

    /// Collapse the qubit a `Measure` record names, returning its outcome.
    pub fn apply_measure(&mut self, g: &GateOp) -> SimResult<u8> {
        if g.kind != GateKind::Measure {
            return Err(SimError::InvalidArgument("apply_measure requires a Measure record".into()));
        }
        let q = g.objs[0];
        Ok(measure::apply(&mut self.rho, self.d, q, &mut self.rng))
    }

    /// Run a whole circuit in order, collecting measurement outcomes keyed
    /// by each `Measure` record's name (spec §4.C "ApplyCircuit").
    pub fn apply_circuit(&mut self, circuit: &Circuit, pr: &ParamResolver) -> SimResult<HashMap<String, u8>> {
        tracing::trace!(n = self.n, gates = circuit.len(), "applying circuit");
        let mut outcomes = HashMap::new();
        for g in circuit {
            g.check_qubit_conflict()?;
            if g.kind == GateKind::Measure {
                let bit = self.apply_measure(g)?;
                if let Some(name) = &g.measure_name {
                    outcomes.insert(name.clone(), bit);
                }
            } else {
                self.apply_gate(g, pr, false)?;
            }
        }
        Ok(outcomes)
    }

    /// `ρ_H ← H·ρ` (spec §4.B "ApplyTerms"), materialized as a dense sidecar
    /// rather than mutating `self` — `ρ_H` is generally not Hermitian and
    /// cannot live in packed storage.
    pub fn apply_hamiltonian(&self, h: &Hamiltonian) -> DenseMat {
        h.apply_to(&self.rho, self.d)
    }

    /// `Tr(Hρ)`.
    pub fn get_expectation(&self, h: &Hamiltonian) -> C {
        h.expectation(&self.rho, self.d)
    }
}

impl fmt::Debug for DensityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diag_len = self.d.min(MAX_LEN_TO_DISPLAY);
        let mut dbg = f.debug_struct("DensityState");
        dbg.field("n", &self.n);
        for i in 0..diag_len {
            dbg.field(&format!("rho[{i},{i}]"), &self.get_qs(i, i));
        }
        if self.d > MAX_LEN_TO_DISPLAY {
            dbg.finish_non_exhaustive()
        } else {
            dbg.finish()
        }
    }
}
