//! Dense-policy kernels (spec §4.B): the layer that actually mutates a
//! packed density-matrix buffer (or, for the gradient sidecar, a dense one)
//! for one gate, channel, or measurement at a time. Nothing above this
//! layer knows about bit masks or flat matrix storage.

use crate::math::N;

pub mod block;
pub mod channel;
pub mod dense;
pub mod double;
pub mod measure;
pub mod single;
pub mod unitary;

/// Outer-loop iteration count above which a kernel switches from its plain
/// serial loop to a `rayon`-backed one (spec §5 "Intra-kernel data
/// parallelism"). Below this, thread spin-up cost dominates the O(iterations)
/// work and the serial path wins.
pub(crate) const DIM_THRESHOLD: N = 2048;
