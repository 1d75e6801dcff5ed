//! Module defining the [`Aig`] struct, as well as [`AigNode`], [`AigEdge`] and some others
//! relevant structs.
//!
//! The AIG is the scratch representation every equivalence query is lowered to: a fault
//! miter (see [`crate::miter`]) or a bounded unrolling of two mutants (see [`crate::seq`])
//! is built here, cleaned up and then handed to [`crate::cnf`].

pub mod dfs;
pub mod edge;
pub mod error;
mod integrity;
pub mod node;

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    ops::Deref,
    rc::Rc,
};

pub use edge::AigEdge;
pub use error::{AigError, Result};
pub(crate) use node::AigNodeWeak;
pub use node::{AigNode, AigNodeRef, NodeId};

/// Structural hashing key of an AND gate: both fanins as `(id, complement)`, smallest first.
type StrashKey = (NodeId, bool, NodeId, bool);

/// A whole AIG, built through a structurally hashed gate builder.
///
/// Gates are created with [`.and(a, b)`], [`.or(a, b)`], [`.xor(a, b)`] and [`.mux(s, t, e)`];
/// negation is free and carried by [`AigEdge`]. Trivial cases (constant fanins, identical or
/// complementary fanins) are folded away, and asking twice for the same AND gate returns the
/// same node.
///
/// Nodes are kept alive artificially while the AIG is being built. Once you are done (ie
/// all the outputs you care about have been registered with [`.add_output(edge)`]), call
/// [`.update()`] to drop every node no longer reachable from an output or still held by the
/// caller.
///
/// [`.and(a, b)`]: Aig::and
/// [`.or(a, b)`]: Aig::or
/// [`.xor(a, b)`]: Aig::xor
/// [`.mux(s, t, e)`]: Aig::mux
/// [`.add_output(edge)`]: Aig::add_output
/// [`.update()`]: Aig::update
///
/// ```rust
/// use faultclasses::aig::Aig;
/// let mut aig = Aig::new();
/// let a = aig.add_input();
/// let b = aig.add_input();
/// let x = aig.xor(&a, &b);
/// let y = aig.xor(&b, &a);
/// assert_eq!(x, y);
/// aig.add_output(x);
/// aig.update();
/// assert_eq!(aig.eval(&[true, false]).unwrap(), vec![true]);
/// assert_eq!(aig.eval(&[true, true]).unwrap(), vec![false]);
/// ```
#[derive(Debug)]
pub struct Aig {
    nodes: HashMap<NodeId, AigNodeWeak>,
    /// Inputs must be kept artificially alive as
    /// we don't want to remove them even if the outputs do not depend on them.
    /// They are stored in creation order, which is the order of evaluation vectors and witnesses.
    inputs: Vec<AigNodeRef>,
    outputs: Vec<AigEdge>,
    keep_nodes_alive: Vec<AigNodeRef>,
    strash: HashMap<StrashKey, AigNodeWeak>,
    next_id: NodeId,
    // Keep alive node false.
    node_false: AigNodeRef,
}

impl Default for Aig {
    fn default() -> Self {
        Aig::new()
    }
}

impl Aig {
    /// Create a brand new AIG (constant node [`AigNode::False`] included).
    pub fn new() -> Self {
        let node_false = Rc::new(RefCell::new(AigNode::False));
        let nodes = HashMap::from([(0, Rc::downgrade(&node_false))]);
        Aig {
            nodes,
            inputs: Vec::new(),
            outputs: Vec::new(),
            keep_nodes_alive: Vec::new(),
            strash: HashMap::new(),
            next_id: 1,
            node_false,
        }
    }

    /// Retrieves a node from its id.
    pub fn get_node(&self, id: NodeId) -> Option<AigNodeRef> {
        self.nodes.get(&id)?.upgrade()
    }

    /// Call this function when you are done building.
    /// All nodes that are not part of the AIG anymore (ie not reachable from an output,
    /// nor referenced from outside) will be deleted.
    pub fn update(&mut self) {
        // Stop keeping nodes artificially alive
        self.keep_nodes_alive.clear();

        // Removing no longer valid entries from the nodes and the structural hash
        self.nodes
            .retain(|_, weak_node| weak_node.upgrade().is_some());
        self.strash
            .retain(|_, weak_node| weak_node.upgrade().is_some());
    }

    /// Number of live nodes, constant node included.
    pub fn len(&self) -> usize {
        self.nodes
            .values()
            .filter(|weak| weak.upgrade().is_some())
            .count()
    }

    /// Only the constant node is alive.
    pub fn is_empty(&self) -> bool {
        self.len() == 1
    }

    /// Number of live and gates.
    pub fn num_ands(&self) -> usize {
        self.nodes
            .values()
            .filter_map(|weak| weak.upgrade())
            .filter(|node| node.borrow().is_and())
            .count()
    }

    /// Retrieves inputs id, in creation order.
    pub fn get_inputs_id(&self) -> Vec<NodeId> {
        self.inputs
            .iter()
            .map(|input| input.borrow().get_id())
            .collect()
    }

    /// Retrieves outputs reference.
    pub fn get_outputs(&self) -> Vec<AigEdge> {
        self.outputs.clone()
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Creates a new primary input.
    pub fn add_input(&mut self) -> AigEdge {
        let id = self.fresh_id();
        let node = Rc::new(RefCell::new(AigNode::Input(id)));
        self.nodes.insert(id, Rc::downgrade(&node));
        self.inputs.push(node.clone());
        AigEdge::new(node, false)
    }

    /// The constant signal `value`.
    pub fn constant(&self, value: bool) -> AigEdge {
        AigEdge::new(self.node_false.clone(), value)
    }

    /// Returns `a & b`, reusing an existing gate when one computes the same thing.
    pub fn and(&mut self, a: &AigEdge, b: &AigEdge) -> AigEdge {
        if a.is_cst_false() || b.is_cst_false() || a.is_complement_of(b) {
            return self.constant(false);
        }
        if a.is_cst_true() || a == b {
            return b.clone();
        }
        if b.is_cst_true() {
            return a.clone();
        }

        let rank = |e: &AigEdge| (e.get_node_id(), e.get_complement());
        let (a, b) = if rank(a) <= rank(b) {
            (a, b)
        } else {
            (b, a)
        };
        let key = (
            a.get_node_id(),
            a.get_complement(),
            b.get_node_id(),
            b.get_complement(),
        );
        if let Some(node) = self.strash.get(&key).and_then(|weak| weak.upgrade()) {
            return AigEdge::new(node, false);
        }

        let id = self.fresh_id();
        let node = Rc::new(RefCell::new(AigNode::and(id, a.clone(), b.clone())));
        self.nodes.insert(id, Rc::downgrade(&node));
        self.strash.insert(key, Rc::downgrade(&node));
        self.keep_nodes_alive.push(node.clone());
        AigEdge::new(node, false)
    }

    /// Returns `a | b`.
    pub fn or(&mut self, a: &AigEdge, b: &AigEdge) -> AigEdge {
        !self.and(&!a, &!b)
    }

    /// Returns `a ^ b`.
    pub fn xor(&mut self, a: &AigEdge, b: &AigEdge) -> AigEdge {
        let l = self.and(a, &!b);
        let r = self.and(&!a, b);
        self.or(&l, &r)
    }

    /// Returns `s ? t : e`.
    pub fn mux(&mut self, s: &AigEdge, t: &AigEdge, e: &AigEdge) -> AigEdge {
        if t == e {
            return t.clone();
        }
        let l = self.and(s, t);
        let r = self.and(&!s, e);
        self.or(&l, &r)
    }

    /// Registers a new output.
    pub fn add_output(&mut self, output: AigEdge) {
        self.outputs.push(output);
    }

    fn topological_visit(
        &self,
        node: AigNodeRef,
        sort: &mut Vec<AigNodeRef>,
        seen: &mut HashSet<NodeId>,
        done: &mut HashSet<NodeId>,
    ) -> Result<()> {
        let mut stack: Vec<(AigNodeRef, bool)> = Vec::new();
        stack.push((node, false));

        while let Some((node, last_time)) = stack.pop() {
            let id = node.borrow().get_id();

            // Post order check
            if last_time {
                done.insert(id);
                sort.push(node);
                continue;
            }

            if done.contains(&id) {
                continue;
            } else if seen.contains(&id) {
                return Err(AigError::InvalidState("found a cycle".to_string()));
            }

            seen.insert(id);
            stack.push((node.clone(), true));

            if let AigNode::And { fanin0, fanin1, .. } = node.borrow().deref() {
                for fanin in [fanin0, fanin1] {
                    if !done.contains(&fanin.get_node_id()) {
                        stack.push((fanin.get_node(), false));
                    }
                }
            }
        }

        Ok(())
    }

    /// Returns a topological sort of the nodes reachable from the outputs,
    /// will error if a cycle is detected.
    pub fn get_topological_sort(&self) -> Result<Vec<AigNodeRef>> {
        let mut sort = Vec::new();
        let mut seen = HashSet::new();
        let mut done = HashSet::new();

        for output in &self.outputs {
            self.topological_visit(output.get_node(), &mut sort, &mut seen, &mut done)?;
        }
        Ok(sort)
    }

    /// Evaluates the outputs under the given input assignment (in input creation order).
    pub fn eval(&self, inputs: &[bool]) -> Result<Vec<bool>> {
        if inputs.len() != self.inputs.len() {
            return Err(AigError::InputCountMismatch {
                expected: self.inputs.len(),
                found: inputs.len(),
            });
        }

        let mut values: HashMap<NodeId, bool> = self
            .inputs
            .iter()
            .zip(inputs)
            .map(|(node, &value)| (node.borrow().get_id(), value))
            .collect();
        values.insert(0, false);

        let edge_value = |values: &HashMap<NodeId, bool>, edge: &AigEdge| -> Result<bool> {
            let id = edge.get_node_id();
            let v = values.get(&id).ok_or(AigError::NodeDoesNotExist(id))?;
            Ok(v ^ edge.get_complement())
        };

        for node in self.get_topological_sort()? {
            if let AigNode::And { id, fanin0, fanin1 } = node.borrow().deref() {
                let v = edge_value(&values, fanin0)? && edge_value(&values, fanin1)?;
                values.insert(*id, v);
            }
        }

        self.outputs
            .iter()
            .map(|output| edge_value(&values, output))
            .collect()
    }
}
