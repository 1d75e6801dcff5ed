use std::ops::Deref;

use super::{Aig, AigEdge, AigError, AigNode, AigNodeRef, NodeId, Result};

impl Aig {
    /// Checking if the AIG structure is correct.
    /// This function was written for debug purposes, as the builder is supposed to maintain
    /// integrity of the AIG at any moment.
    pub fn check_integrity(&self) -> Result<()> {
        // Checking that all nodes have relevant id
        // and perform some individual integrity checks
        for (&id, weak_node) in &self.nodes {
            if let Some(node) = weak_node.upgrade() {
                if node.borrow().get_id() != id {
                    return Err(AigError::InvalidState("incoherent node id".to_string()));
                }

                self.check_node_integrity(node)?;
            }
        }

        // Every live entry of the structural hash must point at the gate it describes
        for (&(id0, c0, id1, c1), weak_node) in &self.strash {
            if let Some(node) = weak_node.upgrade() {
                match node.borrow().deref() {
                    AigNode::And { fanin0, fanin1, .. }
                        if (id0, c0) == <(NodeId, bool)>::from(fanin0)
                            && (id1, c1) == <(NodeId, bool)>::from(fanin1) => {}
                    _ => {
                        return Err(AigError::InvalidState(format!(
                            "structural hash entry ({}, {}, {}, {}) does not match node {}",
                            id0,
                            c0,
                            id1,
                            c1,
                            node.borrow().get_id()
                        )));
                    }
                }
            }
        }

        // Checking that all outputs are registered as nodes
        for output in &self.outputs {
            self.check_edge_integrity(output)?;
        }

        // Checks for acyclicity
        self.get_topological_sort()?;

        Ok(())
    }

    /// Check the integrity for an individual node, that is:
    /// - check that only `False` have id 0
    /// - check that fanins (`AigEdge`) of and gates are valid too
    ///   (ie they refer to a known node for this AIG)
    fn check_node_integrity(&self, node: AigNodeRef) -> Result<()> {
        match node.borrow().deref() {
            AigNode::False => (),
            AigNode::Input(id) => {
                if *id == 0 {
                    return Err(AigError::IdZeroButNotFalse);
                }
            }
            AigNode::And { id, fanin0, fanin1 } => {
                if *id == 0 {
                    return Err(AigError::IdZeroButNotFalse);
                }
                self.check_edge_integrity(fanin0)?;
                self.check_edge_integrity(fanin1)?;
            }
        }
        Ok(())
    }

    fn check_edge_integrity(&self, fanin: &AigEdge) -> Result<()> {
        let id = fanin.get_node_id();
        self.get_node(id).ok_or(AigError::InvalidState(format!(
            "edge pointing at node {} which is not in the AIG anymore",
            id
        )))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::aig::Aig;

    #[test]
    fn integrity_after_build_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let x = aig.xor(&a, &b);
        let m = aig.mux(&c, &x, &a);
        aig.add_output(m);
        assert!(aig.check_integrity().is_ok());
        aig.update();
        assert!(aig.check_integrity().is_ok());
    }
}
