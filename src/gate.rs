//! Circuit record shape (spec §3 "Circuit", §6 "Gate record shape").
//!
//! A `GateOp` is a tagged-variant record, not a class hierarchy: the
//! dispatcher (`dispatch`) is an exhaustive match over [`GateKind`], the way
//! `qvnt::operator::atomic::AtomicOpDispatch` is an exhaustive
//! `enum_dispatch` over its own gate-family enum. Here the variant payload
//! is still unresolved (angles may be symbolic), so dispatch is a two-step
//! "resolve, then match" rather than a single enum_dispatch call.

use crate::{channel::ChannelKind, param::Expr};

/// Closed gate-identifier enumeration (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateKind {
    I,
    X,
    Y,
    Z,
    H,
    S,
    Sdg,
    T,
    Tdg,
    Swap,
    ISwap,
    Rx,
    Ry,
    Rz,
    Rxx,
    Ryy,
    Rzz,
    Ps,
    Measure,
    Channel,
}

impl GateKind {
    pub fn name(self) -> &'static str {
        match self {
            GateKind::I => "I",
            GateKind::X => "X",
            GateKind::Y => "Y",
            GateKind::Z => "Z",
            GateKind::H => "H",
            GateKind::S => "S",
            GateKind::Sdg => "Sdg",
            GateKind::T => "T",
            GateKind::Tdg => "Tdg",
            GateKind::Swap => "SWAP",
            GateKind::ISwap => "iSWAP",
            GateKind::Rx => "RX",
            GateKind::Ry => "RY",
            GateKind::Rz => "RZ",
            GateKind::Rxx => "Rxx",
            GateKind::Ryy => "Ryy",
            GateKind::Rzz => "Rzz",
            GateKind::Ps => "PS",
            GateKind::Measure => "Measure",
            GateKind::Channel => "Channel",
        }
    }

    /// Angle-parametric gate families that the gradient engine can
    /// differentiate (spec §4.D: RX/RY/RZ/Rxx/Ryy/Rzz/PS).
    pub fn is_differentiable_family(self) -> bool {
        matches!(
            self,
            GateKind::Rx | GateKind::Ry | GateKind::Rz | GateKind::Rxx | GateKind::Ryy | GateKind::Rzz | GateKind::Ps
        )
    }
}

/// One circuit record: a gate identifier, the qubits it acts on and is
/// gated by, and whichever payload its family needs.
#[derive(Clone, Debug, PartialEq)]
pub struct GateOp {
    pub kind: GateKind,
    pub objs: Vec<usize>,
    pub ctrls: Vec<usize>,
    /// Present for angle-parametric families; `None` for fixed gates,
    /// measurement and channels.
    pub angle: Option<Expr>,
    /// Measurement outcome key, used only when `kind == GateKind::Measure`.
    pub measure_name: Option<String>,
    /// Channel payload, used only when `kind == GateKind::Channel`.
    pub channel: Option<ChannelKind>,
    pub daggered: bool,
}

impl GateOp {
    pub fn fixed(kind: GateKind, objs: Vec<usize>, ctrls: Vec<usize>) -> Self {
        Self {
            kind,
            objs,
            ctrls,
            angle: None,
            measure_name: None,
            channel: None,
            daggered: false,
        }
    }

    pub fn rotation(kind: GateKind, objs: Vec<usize>, ctrls: Vec<usize>, angle: Expr) -> Self {
        Self {
            kind,
            objs,
            ctrls,
            angle: Some(angle),
            measure_name: None,
            channel: None,
            daggered: false,
        }
    }

    pub fn measure(qubit: usize, name: impl Into<String>) -> Self {
        Self {
            kind: GateKind::Measure,
            objs: vec![qubit],
            ctrls: vec![],
            angle: None,
            measure_name: Some(name.into()),
            channel: None,
            daggered: false,
        }
    }

    pub fn channel(objs: Vec<usize>, channel: ChannelKind) -> Self {
        Self {
            kind: GateKind::Channel,
            objs,
            ctrls: vec![],
            angle: None,
            measure_name: None,
            channel: Some(channel),
            daggered: false,
        }
    }

    /// Build the Hermitian adjoint of this single gate record: daggering
    /// negates a rotation angle's constant shift is left to the resolver
    /// (the angle expression's sign is tracked via `daggered`), leaves
    /// controls/objects untouched, and — for a channel record — replaces the
    /// Kraus set with its adjoint (spec GLOSSARY "the adjoint circuit ...
    /// transposes the Kraus set").
    pub fn dgr(&self) -> Self {
        Self {
            daggered: !self.daggered,
            channel: self.channel.as_ref().map(ChannelKind::adjoint),
            ..self.clone()
        }
    }

    pub fn obj_mask(&self) -> usize {
        self.objs.iter().fold(0usize, |m, &q| m | (1usize << q))
    }

    pub fn ctrl_mask(&self) -> usize {
        self.ctrls.iter().fold(0usize, |m, &q| m | (1usize << q))
    }

    /// Validate that no qubit is listed as both object and control, or
    /// twice within the same role (spec §7 `QubitConflict`).
    pub fn check_qubit_conflict(&self) -> Result<(), crate::error::SimError> {
        let mut seen = 0usize;
        for &q in self.objs.iter().chain(self.ctrls.iter()) {
            let bit = 1usize << q;
            if seen & bit != 0 {
                return Err(crate::error::SimError::QubitConflict { qubit: q });
            }
            seen |= bit;
        }
        Ok(())
    }
}

/// A finite ordered sequence of gate records (spec §3 "Circuit").
pub type Circuit = Vec<GateOp>;

/// Build `[g_n†, ..., g_1†]` from `[g_1, ..., g_n]` (spec GLOSSARY "Hermitian
/// adjoint circuit").
pub fn hermitian_adjoint(circuit: &[GateOp]) -> Circuit {
    circuit.iter().rev().map(GateOp::dgr).collect()
}
