//! An [`AigEdge`] points at an [`AigNode`] and can be complemented (indicates the presence
//! of a NOT gate).
//!
//! [`AigNode`]: crate::aig::AigNode

use std::ops::Not;

use super::{AigNodeRef, NodeId};

/// A directed edge representing a fanin for AIG nodes, or a signal handed out by the
/// [`Aig`] builder.
///
/// The edge can carry an inverter according to the value of `complement`.
///
/// For example:
///
/// ```rust
/// use faultclasses::aig::Aig;
/// let mut aig = Aig::new();
/// let fanin_false = aig.constant(false);
/// let fanin_true = aig.constant(true);
/// assert_eq!(fanin_false, !&fanin_true);
/// assert!(fanin_true.is_cst_true());
/// ```
///
/// [`Aig`]: super::Aig
#[derive(Clone, Debug, Eq)]
pub struct AigEdge {
    /// The node the edge is refering to.
    /// It is wrapped in Rc<RefCell<_>> to allow multiple nodes refering to it.
    pub(super) node: AigNodeRef,
    /// Set to true if signal should be inverted.
    pub(super) complement: bool,
}

impl Not for AigEdge {
    type Output = Self;

    fn not(mut self) -> Self::Output {
        self.complement = !self.complement;
        self
    }
}

impl Not for &AigEdge {
    type Output = AigEdge;

    fn not(self) -> Self::Output {
        !self.clone()
    }
}

impl PartialEq for AigEdge {
    fn eq(&self, other: &Self) -> bool {
        self.complement == other.complement && self.get_node_id() == other.get_node_id()
    }
}

impl From<&AigEdge> for (NodeId, bool) {
    fn from(edge: &AigEdge) -> Self {
        (edge.get_node_id(), edge.get_complement())
    }
}

impl AigEdge {
    pub fn new(node: AigNodeRef, complement: bool) -> Self {
        AigEdge { node, complement }
    }

    pub fn get_node(&self) -> AigNodeRef {
        self.node.clone()
    }

    pub fn get_node_id(&self) -> NodeId {
        self.node.borrow().get_id()
    }

    pub fn get_complement(&self) -> bool {
        self.complement
    }

    pub fn is_cst_false(&self) -> bool {
        self.get_node_id() == 0 && !self.complement
    }

    pub fn is_cst_true(&self) -> bool {
        self.get_node_id() == 0 && self.complement
    }

    pub fn is_complement_of(&self, other: &AigEdge) -> bool {
        self.get_node_id() == other.get_node_id() && self.get_complement() ^ other.get_complement()
    }
}
