#![allow(dead_code)]
#![warn(clippy::cargo)]
#![allow(clippy::comparison_chain)]
#![doc = include_str!("../README.md")]

pub mod channel;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod gradient;
pub mod hamiltonian;
pub mod kernel;
pub mod math;
pub mod param;
pub mod sampling;
pub mod state;

#[cfg(test)]
mod tests;

#[doc(hidden)]
pub mod prelude {
    pub use crate::channel::ChannelKind;
    pub use crate::error::{SimError, SimResult};
    pub use crate::gate::{hermitian_adjoint, Circuit, GateKind, GateOp};
    pub use crate::gradient::{noise_gradients, reversible_gradients, GradConfig, GradResult};
    pub use crate::hamiltonian::{DenseMat, Hamiltonian, Pauli, PauliTerm};
    pub use crate::math::{C, N, R};
    pub use crate::param::{Expr, ParamResolver};
    pub use crate::sampling::{sample, SampleConfig};
    pub use crate::state::DensityState;
}
