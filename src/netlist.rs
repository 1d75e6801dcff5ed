//! The gate-level circuit model.
//!
//! A [`Netlist`] owns its nodes in a vector and nodes refer to their fanins by [`NetId`].
//! Fanouts are never stored, they are derived on demand with [`Netlist::fanouts`].
//!
//! Combinational inputs (CIs) are the primary inputs followed by the DFF outputs.
//! Combinational outputs (COs) are numbered: the primary outputs first, in registration
//! order, then the DFF next-state inputs, in DFF registration order.

pub mod gate;

use std::collections::HashMap;

pub use gate::{Evaluator, GateFn, Words};

use crate::{FaultError, Result};

/// Index of a node in its [`Netlist`].
pub type NetId = usize;

/// What a node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A primary input.
    Input,
    /// A D flip-flop with its initial value. Its single fanin is the next-state signal.
    Dff { init: bool },
    /// A combinational gate.
    Gate(GateFn),
}

/// A netlist node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetNode {
    pub name: String,
    pub kind: NodeKind,
    pub fanins: Vec<NetId>,
}

impl NetNode {
    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input)
    }

    pub fn is_dff(&self) -> bool {
        matches!(self.kind, NodeKind::Dff { .. })
    }

    /// Primary inputs and DFFs: their value does not depend on the current frame's gates.
    pub fn is_ci(&self) -> bool {
        self.is_input() || self.is_dff()
    }

    pub fn gate_fn(&self) -> Option<GateFn> {
        match self.kind {
            NodeKind::Gate(f) => Some(f),
            _ => None,
        }
    }
}

/// A gate-level circuit.
///
/// ```rust
/// use faultclasses::netlist::{GateFn, Netlist};
/// let mut n = Netlist::new();
/// let a = n.add_input("a");
/// let b = n.add_input("b");
/// let y = n.add_gate("y", GateFn::And, &[a, b]).unwrap();
/// n.add_output(y).unwrap();
/// assert_eq!(n.lookup("y"), &[y]);
/// assert_eq!(n.comb_order().unwrap(), vec![y]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netlist {
    nodes: Vec<NetNode>,
    inputs: Vec<NetId>,
    dffs: Vec<NetId>,
    outputs: Vec<NetId>,
    names: HashMap<String, Vec<NetId>>,
}

impl Netlist {
    pub fn new() -> Self {
        Netlist::default()
    }

    fn push_node(&mut self, name: String, kind: NodeKind, fanins: Vec<NetId>) -> NetId {
        let id = self.nodes.len();
        self.names.entry(name.clone()).or_default().push(id);
        self.nodes.push(NetNode { name, kind, fanins });
        id
    }

    fn check_exists(&self, id: NetId) -> Result<()> {
        if id < self.nodes.len() {
            Ok(())
        } else {
            Err(FaultError::InvalidNetlist(format!("node {} does not exist", id)))
        }
    }

    /// Adds a primary input.
    pub fn add_input(&mut self, name: impl Into<String>) -> NetId {
        let id = self.push_node(name.into(), NodeKind::Input, Vec::new());
        self.inputs.push(id);
        id
    }

    /// Adds a gate. Fanins must exist and their count must suit the function.
    pub fn add_gate(
        &mut self,
        name: impl Into<String>,
        f: GateFn,
        fanins: &[NetId],
    ) -> Result<NetId> {
        let name = name.into();
        for &fanin in fanins {
            self.check_exists(fanin)?;
        }
        if !f.accepts_arity(fanins.len()) {
            return Err(FaultError::InvalidNetlist(format!(
                "gate `{}` ({}) cannot have {} fanin(s)",
                name,
                f,
                fanins.len()
            )));
        }
        Ok(self.push_node(name, NodeKind::Gate(f), fanins.to_vec()))
    }

    /// Adds a DFF, its next-state input is connected later with [`Netlist::connect_dff`].
    pub fn add_dff(&mut self, name: impl Into<String>, init: bool) -> NetId {
        let id = self.push_node(name.into(), NodeKind::Dff { init }, Vec::new());
        self.dffs.push(id);
        id
    }

    /// Sets the next-state input of a DFF.
    pub fn connect_dff(&mut self, dff: NetId, next: NetId) -> Result<()> {
        self.check_exists(dff)?;
        self.check_exists(next)?;
        let node = &mut self.nodes[dff];
        if !node.is_dff() {
            return Err(FaultError::InvalidNetlist(format!(
                "`{}` is not a DFF",
                node.name
            )));
        }
        node.fanins = vec![next];
        Ok(())
    }

    /// Registers a primary output driven by `driver`, returns its output index.
    pub fn add_output(&mut self, driver: NetId) -> Result<usize> {
        self.check_exists(driver)?;
        self.outputs.push(driver);
        Ok(self.outputs.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NetId) -> &NetNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[NetNode] {
        &self.nodes
    }

    pub fn inputs(&self) -> &[NetId] {
        &self.inputs
    }

    pub fn dffs(&self) -> &[NetId] {
        &self.dffs
    }

    /// Drivers of the primary outputs.
    pub fn outputs(&self) -> &[NetId] {
        &self.outputs
    }

    pub fn is_sequential(&self) -> bool {
        !self.dffs.is_empty()
    }

    /// Every node with the given name.
    pub fn lookup(&self, name: &str) -> &[NetId] {
        self.names.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn drives_output(&self, id: NetId) -> bool {
        self.outputs.contains(&id)
    }

    /// Number of combinational outputs.
    pub fn num_cos(&self) -> usize {
        self.outputs.len() + self.dffs.len()
    }

    /// The node driving combinational output `co`.
    pub fn co_driver(&self, co: usize) -> Result<NetId> {
        if co < self.outputs.len() {
            return Ok(self.outputs[co]);
        }
        let dff = *self.dffs.get(co - self.outputs.len()).ok_or_else(|| {
            FaultError::InvalidNetlist(format!("combinational output {} does not exist", co))
        })?;
        self.nodes[dff].fanins.first().copied().ok_or_else(|| {
            FaultError::InvalidNetlist(format!(
                "DFF `{}` has no next-state input",
                self.nodes[dff].name
            ))
        })
    }

    /// Combinational output `co` is a primary output (not a DFF next-state input).
    pub fn co_is_output(&self, co: usize) -> bool {
        co < self.outputs.len()
    }

    /// For every node, the gates and DFFs reading it, in increasing id order.
    pub fn fanouts(&self) -> Vec<Vec<NetId>> {
        let mut fanouts = vec![Vec::new(); self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for &fanin in &node.fanins {
                let list: &mut Vec<NetId> = &mut fanouts[fanin];
                if list.last() != Some(&id) {
                    list.push(id);
                }
            }
        }
        fanouts
    }

    fn topological_visit(
        &self,
        start: NetId,
        sort: &mut Vec<NetId>,
        seen: &mut [bool],
        done: &mut [bool],
    ) -> Result<()> {
        let mut stack: Vec<(NetId, bool)> = vec![(start, false)];

        while let Some((id, last_time)) = stack.pop() {
            // Post order check
            if last_time {
                done[id] = true;
                sort.push(id);
                continue;
            }

            if done[id] {
                continue;
            } else if seen[id] {
                return Err(FaultError::InvalidNetlist(format!(
                    "combinational cycle through `{}`",
                    self.nodes[id].name
                )));
            }

            seen[id] = true;
            stack.push((id, true));

            for &fanin in &self.nodes[id].fanins {
                // DFFs and inputs are sources, no need to go through them
                if !done[fanin] && !self.nodes[fanin].is_ci() {
                    stack.push((fanin, false));
                }
            }
        }

        Ok(())
    }

    /// All the gates, fanins first. Fails on a combinational cycle.
    pub fn comb_order(&self) -> Result<Vec<NetId>> {
        let mut sort = Vec::new();
        let mut seen = vec![false; self.nodes.len()];
        let mut done = vec![false; self.nodes.len()];
        for id in 0..self.nodes.len() {
            if !done[id] && !self.nodes[id].is_ci() {
                self.topological_visit(id, &mut sort, &mut seen, &mut done)?;
            }
        }
        Ok(sort)
    }

    /// Checks the netlist can be classified: every DFF is connected and the gates are acyclic.
    pub fn validate(&self) -> Result<()> {
        for &dff in &self.dffs {
            if self.nodes[dff].fanins.len() != 1 {
                return Err(FaultError::InvalidNetlist(format!(
                    "DFF `{}` has no next-state input",
                    self.nodes[dff].name
                )));
            }
        }
        self.comb_order()?;
        Ok(())
    }

    /// Collects the transitive fanin of the given combinational outputs.
    ///
    /// `marks` is reused across calls, each call starts a fresh traversal.
    pub fn cone(&self, cos: &[usize], marks: &mut TravMarks) -> Result<Cone> {
        marks.start(self.nodes.len());
        let mut cone = Cone {
            cos: cos.to_vec(),
            cis: Vec::new(),
            nodes: Vec::new(),
        };

        for &co in cos {
            let mut stack: Vec<(NetId, bool)> = vec![(self.co_driver(co)?, false)];
            while let Some((id, last_time)) = stack.pop() {
                if last_time {
                    cone.nodes.push(id);
                    continue;
                }
                if !marks.visit(id) {
                    continue;
                }
                if self.nodes[id].is_ci() {
                    cone.cis.push(id);
                    continue;
                }
                stack.push((id, true));
                for &fanin in self.nodes[id].fanins.iter().rev() {
                    if !marks.is_visited(fanin) {
                        stack.push((fanin, false));
                    }
                }
            }
        }

        Ok(cone)
    }

    /// Points every gate and DFF reading `from` at `to` instead, `keep` excepted.
    pub(crate) fn rewire_fanins(&mut self, from: NetId, to: NetId, keep: NetId) {
        for (id, node) in self.nodes.iter_mut().enumerate() {
            if id == keep {
                continue;
            }
            for fanin in node.fanins.iter_mut() {
                if *fanin == from {
                    *fanin = to;
                }
            }
        }
    }

    /// Points every primary output driven by `from` at `to` instead.
    pub(crate) fn rewire_outputs(&mut self, from: NetId, to: NetId) {
        for output in self.outputs.iter_mut() {
            if *output == from {
                *output = to;
            }
        }
    }

    pub(crate) fn set_gate_fn(&mut self, id: NetId, f: GateFn) {
        self.nodes[id].kind = NodeKind::Gate(f);
    }

    /// Adds a gate without checks, for fault injection.
    pub(crate) fn push_gate(&mut self, name: String, f: GateFn, fanins: Vec<NetId>) -> NetId {
        self.push_node(name, NodeKind::Gate(f), fanins)
    }
}

/// Visited marks for repeated traversals, reset in O(1) by bumping a generation counter.
#[derive(Debug, Clone, Default)]
pub struct TravMarks {
    stamps: Vec<u32>,
    current: u32,
}

impl TravMarks {
    pub fn new() -> Self {
        TravMarks::default()
    }

    /// Starts a new traversal over `len` nodes, forgetting every previous mark.
    pub fn start(&mut self, len: usize) {
        if self.stamps.len() < len {
            self.stamps.resize(len, 0);
        }
        self.current = match self.current.checked_add(1) {
            Some(c) => c,
            None => {
                self.stamps.iter_mut().for_each(|s| *s = 0);
                1
            }
        };
    }

    /// Marks `id`, returns false if it was already marked in this traversal.
    pub fn visit(&mut self, id: NetId) -> bool {
        if self.stamps[id] == self.current {
            false
        } else {
            self.stamps[id] = self.current;
            true
        }
    }

    pub fn is_visited(&self, id: NetId) -> bool {
        self.stamps[id] == self.current
    }
}

/// The transitive fanin of a set of combinational outputs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cone {
    /// Combinational output indices, as requested.
    pub cos: Vec<usize>,
    /// Combinational inputs of the cone, in discovery order.
    pub cis: Vec<NetId>,
    /// Gates of the cone, fanins first.
    pub nodes: Vec<NetId>,
}

impl Cone {
    pub fn contains(&self, id: NetId) -> bool {
        self.cis.contains(&id) || self.nodes.contains(&id)
    }
}
