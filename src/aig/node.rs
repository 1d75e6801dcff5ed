use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use super::AigEdge;

/// A node id.
///
/// The constant node [`AigNode::False`] has id 0 by convention. Also, id must be unique.
/// Ids are handed out by the owning [`Aig`] in creation order.
///
/// [`Aig`]: super::Aig
pub type NodeId = u64;

/// An AIG node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AigNode {
    /// The constant low/false signal.
    False,
    /// A primary input.
    Input(NodeId),
    /// An AND gate with two fanins.
    And {
        id: NodeId,
        fanin0: AigEdge,
        fanin1: AigEdge,
    },
}

/// A wrapper for AIG nodes to allow multiple references to it.
pub type AigNodeRef = Rc<RefCell<AigNode>>;

/// A non-counting reference to an AIG node - used internally.
pub(crate) type AigNodeWeak = Weak<RefCell<AigNode>>;

impl AigNode {
    /// Returns a new and gate.
    pub fn and(id: NodeId, fanin0: AigEdge, fanin1: AigEdge) -> Self {
        if id == 0 {
            panic!(
                "Hey, you are trying to create an AND gate with id=0. \
                Id=0 is reserved for the constant node AigNode::False."
            )
        }
        AigNode::And { id, fanin0, fanin1 }
    }

    pub fn is_false(&self) -> bool {
        matches!(self, AigNode::False)
    }

    pub fn is_input(&self) -> bool {
        matches!(self, AigNode::Input(_))
    }

    pub fn is_and(&self) -> bool {
        matches!(self, AigNode::And { .. })
    }

    pub fn get_id(&self) -> NodeId {
        match *self {
            AigNode::False => 0,
            AigNode::Input(id) => id,
            AigNode::And { id, .. } => id,
        }
    }

    pub fn get_fanins(&self) -> Vec<AigEdge> {
        match self {
            AigNode::And { fanin0, fanin1, .. } => vec![fanin0.clone(), fanin1.clone()],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[should_panic]
    fn and_with_id_zero_test() {
        let f = Rc::new(RefCell::new(AigNode::False));
        _ = AigNode::and(0, AigEdge::new(f.clone(), false), AigEdge::new(f, true));
    }

    #[test]
    fn get_fanins_test() {
        let i1 = Rc::new(RefCell::new(AigNode::Input(1)));
        let i2 = Rc::new(RefCell::new(AigNode::Input(2)));
        let and = AigNode::and(
            3,
            AigEdge::new(i1.clone(), false),
            AigEdge::new(i2.clone(), true),
        );
        assert!(and.is_and());
        assert_eq!(and.get_id(), 3);
        assert_eq!(
            and.get_fanins(),
            vec![AigEdge::new(i1.clone(), false), AigEdge::new(i2, true)]
        );
        assert!(i1.borrow().get_fanins().is_empty());
        assert!(i1.borrow().is_input());
        assert!(AigNode::False.is_false());
    }
}
