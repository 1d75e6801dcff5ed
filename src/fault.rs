//! Fault model: what a fault is, where it sits and how it is named.
//!
//! A [`Fault`] is resolved against a [`Netlist`] once, which fixes its [`TargetRole`]:
//! - [`TargetRole::Input`]: the node is a primary input, every reader sees the faulty value;
//! - [`TargetRole::Output`]: the node drives a primary output, only the primary outputs
//!   see the faulty value (the gate's other readers still see the good one);
//! - [`TargetRole::Internal`]: any other gate or DFF, every reader sees the faulty value.
//!
//! The roles are checked in that order. Redirect faults replace the function of the
//! target gate and therefore reach every reader whatever the role.
//!
//! Faults become circuits through [`inject`].

pub mod inject;

use std::{fmt, str::FromStr};

use tracing::warn;

use crate::{
    FaultError, Result,
    library::{CellLibrary, CellRef},
    netlist::{Evaluator, GateFn, NetId, Netlist, NodeKind},
};

/// Fault identifier, 1-based and stable: it is the one reported in the results.
pub type FaultId = u32;

/// The defect a fault models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    StuckAt0,
    StuckAt1,
    Invert,
    RedirectAnd,
    RedirectNand,
    RedirectOr,
    RedirectNor,
    RedirectXor,
    RedirectNxor,
    RedirectNot,
    RedirectBuffer,
    /// Substitution by a technology cell of the same pin count (mapped circuits).
    RedirectCell(CellRef),
}

impl FaultKind {
    /// Every kind that does not depend on a cell library, in vocabulary order.
    pub const BASIC: [FaultKind; 11] = [
        FaultKind::StuckAt0,
        FaultKind::StuckAt1,
        FaultKind::Invert,
        FaultKind::RedirectAnd,
        FaultKind::RedirectNand,
        FaultKind::RedirectOr,
        FaultKind::RedirectNor,
        FaultKind::RedirectXor,
        FaultKind::RedirectNxor,
        FaultKind::RedirectNot,
        FaultKind::RedirectBuffer,
    ];

    /// The substituted function of a redirect fault.
    pub fn redirect_fn(&self) -> Option<GateFn> {
        match self {
            FaultKind::StuckAt0 | FaultKind::StuckAt1 | FaultKind::Invert => None,
            FaultKind::RedirectAnd => Some(GateFn::And),
            FaultKind::RedirectNand => Some(GateFn::Nand),
            FaultKind::RedirectOr => Some(GateFn::Or),
            FaultKind::RedirectNor => Some(GateFn::Nor),
            FaultKind::RedirectXor => Some(GateFn::Xor),
            FaultKind::RedirectNxor => Some(GateFn::Xnor),
            FaultKind::RedirectNot => Some(GateFn::Not),
            FaultKind::RedirectBuffer => Some(GateFn::Buf),
            FaultKind::RedirectCell(cell) => Some(GateFn::Cell(*cell)),
        }
    }

    /// Stuck-at and inversion faults act on the node's value rather than on its function.
    pub fn is_value_fault(&self) -> bool {
        self.redirect_fn().is_none()
    }

    /// The faulty value of a node computing `good` from `fanins`.
    pub fn apply<E: Evaluator>(&self, e: &mut E, good: &E::Value, fanins: &[E::Value]) -> E::Value {
        match self {
            FaultKind::StuckAt0 => e.constant(false),
            FaultKind::StuckAt1 => e.constant(true),
            FaultKind::Invert => e.not(good),
            redirect => match redirect.redirect_fn() {
                Some(f) => f.eval(e, fanins),
                None => good.clone(),
            },
        }
    }

    /// Parses a vocabulary token, falling back to library cell names for redirect faults.
    pub fn parse_with_library(token: &str, library: Option<&CellLibrary>) -> Result<FaultKind> {
        match token.parse::<FaultKind>() {
            Ok(kind) => Ok(kind),
            Err(e) => library
                .and_then(|lib| lib.lookup(token))
                .map(FaultKind::RedirectCell)
                .ok_or(e),
        }
    }
}

impl FromStr for FaultKind {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "SA0" => FaultKind::StuckAt0,
            "SA1" => FaultKind::StuckAt1,
            "NEG" => FaultKind::Invert,
            "RDOB_AND" => FaultKind::RedirectAnd,
            "RDOB_NAND" => FaultKind::RedirectNand,
            "RDOB_OR" => FaultKind::RedirectOr,
            "RDOB_NOR" => FaultKind::RedirectNor,
            "RDOB_XOR" => FaultKind::RedirectXor,
            "RDOB_NXOR" => FaultKind::RedirectNxor,
            "RDOB_NOT" => FaultKind::RedirectNot,
            "RDOB_BUFF" => FaultKind::RedirectBuffer,
            _ => return Err(FaultError::UnknownFaultKind(s.to_string())),
        })
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::StuckAt0 => write!(f, "SA0"),
            FaultKind::StuckAt1 => write!(f, "SA1"),
            FaultKind::Invert => write!(f, "NEG"),
            FaultKind::RedirectAnd => write!(f, "RDOB_AND"),
            FaultKind::RedirectNand => write!(f, "RDOB_NAND"),
            FaultKind::RedirectOr => write!(f, "RDOB_OR"),
            FaultKind::RedirectNor => write!(f, "RDOB_NOR"),
            FaultKind::RedirectXor => write!(f, "RDOB_XOR"),
            FaultKind::RedirectNxor => write!(f, "RDOB_NXOR"),
            FaultKind::RedirectNot => write!(f, "RDOB_NOT"),
            FaultKind::RedirectBuffer => write!(f, "RDOB_BUFF"),
            FaultKind::RedirectCell(cell) => write!(f, "RDOB_CELL#{}", cell.id),
        }
    }
}

/// Where the faulty value of a node is observed, see the module documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRole {
    Input,
    Output,
    Internal,
}

/// A fault resolved against a netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub id: FaultId,
    pub node: NetId,
    pub kind: FaultKind,
    pub role: TargetRole,
}

impl Fault {
    /// Resolves the fault `kind` on `node`, checking redirect arity.
    pub fn new(netlist: &Netlist, id: FaultId, node: NetId, kind: FaultKind) -> Result<Fault> {
        if node >= netlist.len() {
            return Err(FaultError::UnknownFaultTarget(format!("#{}", node)));
        }
        let target = netlist.node(node);

        if let Some(f) = kind.redirect_fn() {
            let fits = matches!(target.kind, NodeKind::Gate(_))
                && f.accepts_arity(target.fanins.len());
            if !fits {
                return Err(FaultError::FaultArityMismatch {
                    kind: kind.to_string(),
                    node: target.name.clone(),
                    found: target.fanins.len(),
                });
            }
        }

        let role = if target.is_input() {
            TargetRole::Input
        } else if netlist.drives_output(node) {
            TargetRole::Output
        } else {
            TargetRole::Internal
        };

        Ok(Fault {
            id,
            node,
            kind,
            role,
        })
    }

    /// The fault changes the value every reader of `id` sees.
    pub fn overrides_node(&self, id: NetId) -> bool {
        self.node == id && (self.role != TargetRole::Output || !self.kind.is_value_fault())
    }

    /// The fault changes the value the primary outputs driven by `driver` see.
    pub fn overrides_output(&self, driver: NetId) -> bool {
        self.node == driver && self.role == TargetRole::Output && self.kind.is_value_fault()
    }
}

/// A fault as written in a fault list: `<id> <target name> <kind token>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultRecord {
    pub id: FaultId,
    pub target: String,
    pub kind: String,
}

/// A fault that could not be resolved, and why.
#[derive(Debug)]
pub struct SkippedFault {
    pub id: FaultId,
    pub error: FaultError,
}

/// Outcome of [`resolve_records`].
#[derive(Debug, Default)]
pub struct ResolvedFaults {
    pub faults: Vec<Fault>,
    pub skipped: Vec<SkippedFault>,
}

/// The single node carrying `name`.
pub fn resolve_target(netlist: &Netlist, name: &str) -> Result<NetId> {
    match netlist.lookup(name) {
        [] => Err(FaultError::UnknownFaultTarget(name.to_string())),
        [id] => Ok(*id),
        ids => Err(FaultError::AmbiguousFaultTarget {
            name: name.to_string(),
            count: ids.len(),
        }),
    }
}

fn resolve_record(
    netlist: &Netlist,
    record: &FaultRecord,
    library: Option<&CellLibrary>,
) -> Result<Fault> {
    let node = resolve_target(netlist, &record.target)?;
    let kind = FaultKind::parse_with_library(&record.kind, library)?;
    Fault::new(netlist, record.id, node, kind)
}

/// Resolves fault records, skipping (and reporting) the ones that do not fit the netlist.
pub fn resolve_records(
    netlist: &Netlist,
    records: &[FaultRecord],
    library: Option<&CellLibrary>,
) -> ResolvedFaults {
    let mut resolved = ResolvedFaults::default();
    for record in records {
        match resolve_record(netlist, record, library) {
            Ok(fault) => resolved.faults.push(fault),
            Err(error) => {
                warn!(
                    id = record.id,
                    target = %record.target,
                    kind = %record.kind,
                    %error,
                    "skipping fault"
                );
                resolved.skipped.push(SkippedFault {
                    id: record.id,
                    error,
                });
            }
        }
    }
    resolved
}

/// Every stuck-at and inversion fault on inputs, gates and DFFs, plus every redirect fault
/// that changes the function of a gate. Mapped gates are redirected to the library cells
/// with the same pin count.
pub fn generate_faults(netlist: &Netlist, library: Option<&CellLibrary>) -> Vec<Fault> {
    let mut kinds_per_node: Vec<(NetId, FaultKind)> = Vec::new();
    for (id, node) in netlist.nodes().iter().enumerate() {
        for kind in [FaultKind::StuckAt0, FaultKind::StuckAt1, FaultKind::Invert] {
            kinds_per_node.push((id, kind));
        }
        match node.kind {
            NodeKind::Gate(GateFn::Cell(cell)) => {
                let Some(library) = library else { continue };
                for other in library.cells_with_pins(cell.pins) {
                    if other.truth != cell.truth {
                        kinds_per_node.push((id, FaultKind::RedirectCell(other)));
                    }
                }
            }
            NodeKind::Gate(f) => {
                for kind in &FaultKind::BASIC[3..] {
                    if let Some(g) = kind.redirect_fn() {
                        if g != f && g.accepts_arity(node.fanins.len()) {
                            kinds_per_node.push((id, *kind));
                        }
                    }
                }
            }
            _ => (),
        }
    }

    kinds_per_node
        .into_iter()
        .zip(1..)
        .filter_map(|((node, kind), id)| Fault::new(netlist, id, node, kind).ok())
        .collect()
}
