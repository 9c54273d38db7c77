//! Error kinds surfaced by the simulation core (spec §7).
//!
//! Every fallible public entry point returns `Result<T, SimError>`; kernels
//! never catch and always propagate. There is no partial-result path: a
//! failure midway through `apply_circuit` leaves the state mutated up to
//! that point, exactly as the caller's own sequential application would.

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("unknown gate identifier: {0}")]
    UnknownGate(String),

    #[error("unknown channel identifier: {0}")]
    UnknownChannel(String),

    #[error("qubit {qubit} used as both object and control, or listed twice")]
    QubitConflict { qubit: usize },

    #[error("adjoint gradient requires circ.len() == herm_circ.len(), got {forward} vs {adjoint}")]
    CircuitLengthMismatch { forward: usize, adjoint: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("allocation failure: {0}")]
    AllocationFailure(String),
}

pub type SimResult<T> = Result<T, SimError>;
