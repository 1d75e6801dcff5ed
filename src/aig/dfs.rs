//! Provides a DFS visitor to allow simple AIG traversal.
//!
//! See [`Dfs`] for details.

use std::collections::HashSet;

use super::{Aig, AigNodeRef, NodeId};

/// A simple DFS visitor.
///
/// Nodes are yielded in preorder. You can:
/// - start a DFS from a node using [`from_node`]
/// - or visit all the AIG by starting from the outputs using [`from_outputs`].
///
/// In the latter case, it will start by the fanin of the last output,
/// then explore all non-previously-explored nodes from the fanin of the previous one,
/// and so on until all the outputs have been processed.
///
/// [`from_node`]: Dfs::from_node
/// [`from_outputs`]: Dfs::from_outputs
///
/// Example:
///
/// ```rust
/// use faultclasses::aig::{Aig, dfs::Dfs};
/// let mut aig = Aig::new();
/// let a = aig.add_input();
/// let b = aig.add_input();
/// let y = aig.and(&a, &b);
/// aig.add_output(y);
/// let mut dfs = Dfs::from_outputs(&aig);
/// let mut count = 0;
/// while let Some(_node) = dfs.next(&aig) {
///     count += 1;
/// }
/// assert_eq!(count, 3);
/// ```
///
/// Inspired by [petgraph DFS](https://docs.rs/petgraph/latest/petgraph/visit/struct.Dfs.html).
pub struct Dfs {
    /// Must maintain the following invariant:
    /// - all nodes on the stack have not been visited yet
    /// - their `seen` flag is set to true to avoid adding them one more time to the stack
    /// - the different outputs from which to start a DFS are in starts
    ///   (they might have been visited already by the time we start the DFS from them,
    ///   and will simply be discarded if that's the case).
    stack: Vec<NodeId>,
    seen: HashSet<NodeId>,
    starts: Vec<NodeId>,
}

impl Dfs {
    /// Create a DFS from the initial start node.
    /// You will only browse the fanin of this node.
    pub fn from_node(start: AigNodeRef) -> Self {
        let start_id = start.borrow().get_id();
        Dfs {
            stack: vec![start_id],
            seen: HashSet::from([start_id]),
            starts: Vec::new(),
        }
    }

    /// Create a DFS from the outputs of the given AIG.
    pub fn from_outputs(aig: &Aig) -> Self {
        let mut ids: Vec<NodeId> = aig
            .get_outputs()
            .iter()
            .map(|fanin| fanin.get_node_id())
            .collect();

        match ids.pop() {
            None => Dfs {
                stack: Vec::new(),
                seen: HashSet::new(),
                starts: Vec::new(),
            },
            Some(start_id) => Dfs {
                stack: vec![start_id],
                seen: HashSet::from([start_id]),
                starts: ids,
            },
        }
    }

    /// Returns true if we are ready to start again! Else false, we are done.
    /// Should only be called when stack is empty (ie we are done with the current fanin).
    fn new_start(&mut self) -> bool {
        while let Some(id) = self.starts.pop() {
            if self.seen.insert(id) {
                self.stack.push(id);
                return true;
            }
        }
        false
    }

    /// Yield the next node of the DFS, or None if it is done.
    /// Ids that no longer refer to a live node are skipped.
    pub fn next(&mut self, aig: &Aig) -> Option<AigNodeRef> {
        loop {
            while let Some(id) = self.stack.pop() {
                let Some(node) = aig.get_node(id) else {
                    continue;
                };
                for child in node.borrow().get_fanins() {
                    let child_id = child.get_node_id();
                    if self.seen.insert(child_id) {
                        self.stack.push(child_id);
                    }
                }
                return Some(node);
            }

            // Maybe we can start from a different output?
            if !self.new_start() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_node_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let n = aig.and(&a, &!&b);

        let mut dfs = Dfs::from_node(n.get_node());
        assert_eq!(dfs.next(&aig).unwrap(), n.get_node()); // first node is known
        let mut rest: Vec<NodeId> = Vec::new();
        while let Some(node) = dfs.next(&aig) {
            rest.push(node.borrow().get_id());
        }
        rest.sort();
        assert_eq!(rest, vec![a.get_node_id(), b.get_node_id()]);
        // Now there shouldn't be anything
        assert!(dfs.next(&aig).is_none());
    }

    #[test]
    fn from_outputs_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let c = aig.add_input();
        let ab = aig.and(&a, &b);
        let abc = aig.and(&ab, &c);
        aig.add_output(ab.clone());
        aig.add_output(!abc.clone());

        let mut visited: Vec<NodeId> = Vec::new();
        let mut dfs = Dfs::from_outputs(&aig);
        while let Some(node) = dfs.next(&aig) {
            visited.push(node.borrow().get_id());
        }
        // Every node shows up once, the shared gate included.
        visited.sort();
        let mut expected = vec![
            a.get_node_id(),
            b.get_node_id(),
            c.get_node_id(),
            ab.get_node_id(),
            abc.get_node_id(),
        ];
        expected.sort();
        assert_eq!(visited, expected);
    }

    #[test]
    fn repeated_node() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let ab = aig.and(&a, &b);
        let n = aig.and(&ab, &!&a);
        let mut dfs = Dfs::from_node(n.get_node());
        let mut count = 0;
        while dfs.next(&aig).is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn empty_test() {
        let aig = Aig::new();
        let mut dfs = Dfs::from_outputs(&aig);
        assert!(dfs.next(&aig).is_none());
    }
}
