//! Structural pre-partitioning of fault targets.
//!
//! The signature of a node is the set of combinational outputs its value can reach. Two
//! faults whose targets have different signatures can only be told apart by different
//! outputs, so the exact refinement is only ever run within a signature class.
//!
//! Signatures are hash-consed: every distinct set is stored once in a [`SetInterner`] and
//! nodes carry its id, so comparing signatures is comparing integers.

use std::collections::HashMap;

use crate::{
    FaultError, Result,
    netlist::{NetId, Netlist},
};

/// Id of an interned set. `0` is always the empty set.
pub type SetId = usize;

/// Content-addressed table of sorted integer sets.
///
/// ```rust
/// use faultclasses::partition::SetInterner;
/// let mut sets = SetInterner::new();
/// let a = sets.intern(vec![1, 3]);
/// assert_eq!(sets.intern(vec![1, 3]), a);
/// assert_eq!(sets.intern(vec![]), 0);
/// assert_eq!(sets.get(a), &[1, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct SetInterner {
    sets: Vec<Vec<usize>>,
    ids: HashMap<Vec<usize>, SetId>,
}

impl Default for SetInterner {
    fn default() -> Self {
        SetInterner::new()
    }
}

impl SetInterner {
    pub fn new() -> Self {
        SetInterner {
            sets: vec![Vec::new()],
            ids: HashMap::from([(Vec::new(), 0)]),
        }
    }

    /// Id of `set`, which must be sorted without duplicates.
    pub fn intern(&mut self, set: Vec<usize>) -> SetId {
        if let Some(&id) = self.ids.get(&set) {
            return id;
        }
        let id = self.sets.len();
        self.sets.push(set.clone());
        self.ids.insert(set, id);
        id
    }

    pub fn get(&self, id: SetId) -> &[usize] {
        &self.sets[id]
    }

    /// Number of distinct sets, the empty one included.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Id of the union of two interned sets.
    pub fn union(&mut self, a: SetId, b: SetId) -> SetId {
        if a == b || b == 0 {
            return a;
        }
        if a == 0 {
            return b;
        }
        let merged = merge_sorted(&self.sets[a], &self.sets[b]);
        self.intern(merged)
    }
}

/// Union of two sorted sets, sorted.
pub fn merge_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            merged.push(a[i]);
            i += 1;
        } else if b[j] < a[i] {
            merged.push(b[j]);
            j += 1;
        } else {
            merged.push(a[i]);
            i += 1;
            j += 1;
        }
    }
    merged.extend_from_slice(&a[i..]);
    merged.extend_from_slice(&b[j..]);
    merged
}

/// Targets grouped by signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructuralPartition {
    /// Target nodes of each class, ascending.
    pub classes: Vec<Vec<NetId>>,
    /// Combinational outputs reachable from the targets of each class, ascending.
    pub co_sets: Vec<Vec<usize>>,
}

impl StructuralPartition {
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

struct Signatures<'a> {
    netlist: &'a Netlist,
    fanouts: Vec<Vec<NetId>>,
    /// Combinational outputs read directly from each node.
    direct_cos: Vec<Vec<usize>>,
    memo: Vec<Option<SetId>>,
    sets: SetInterner,
}

impl<'a> Signatures<'a> {
    fn new(netlist: &'a Netlist) -> Self {
        let mut direct_cos = vec![Vec::new(); netlist.len()];
        for (co, &driver) in netlist.outputs().iter().enumerate() {
            direct_cos[driver].push(co);
        }
        let n_po = netlist.outputs().len();
        for (i, &dff) in netlist.dffs().iter().enumerate() {
            if let Some(&next) = netlist.node(dff).fanins.first() {
                direct_cos[next].push(n_po + i);
            }
        }
        Signatures {
            netlist,
            fanouts: netlist.fanouts(),
            direct_cos,
            memo: vec![None; netlist.len()],
            sets: SetInterner::new(),
        }
    }

    /// Gates reading `id`. DFFs reading it are combinational outputs, not consumers.
    fn gate_consumers(&self, id: NetId) -> impl Iterator<Item = NetId> + '_ {
        self.fanouts[id]
            .iter()
            .copied()
            .filter(|&c| !self.netlist.node(c).is_dff())
    }

    fn combine(&mut self, id: NetId) -> Result<SetId> {
        let mut sig = 0;
        for k in 0..self.direct_cos[id].len() {
            let co = self.sets.intern(vec![self.direct_cos[id][k]]);
            sig = self.sets.union(sig, co);
        }
        let consumers: Vec<NetId> = self.gate_consumers(id).collect();
        for c in consumers {
            let s = self.memo[c].ok_or_else(|| {
                FaultError::InvalidState(format!(
                    "signature of `{}` used before being computed",
                    self.netlist.node(c).name
                ))
            })?;
            sig = self.sets.union(sig, s);
        }
        Ok(sig)
    }

    fn signature(&mut self, start: NetId) -> Result<SetId> {
        let mut stack: Vec<(NetId, bool)> = vec![(start, false)];
        while let Some((id, last_time)) = stack.pop() {
            if self.memo[id].is_some() {
                continue;
            }
            if last_time {
                self.memo[id] = Some(self.combine(id)?);
                continue;
            }
            stack.push((id, true));
            let pending: Vec<NetId> = self
                .gate_consumers(id)
                .filter(|&c| self.memo[c].is_none())
                .collect();
            stack.extend(pending.into_iter().map(|c| (c, false)));
        }
        self.memo[start]
            .ok_or_else(|| FaultError::InvalidState(format!("no signature for node {}", start)))
    }
}

/// Groups `targets` by the set of combinational outputs they reach.
///
/// Targets are deduplicated and classes are listed by smallest target, so the result does
/// not depend on the order of `targets`. A target no output depends on gets the empty set.
pub fn partition(netlist: &Netlist, targets: &[NetId]) -> Result<StructuralPartition> {
    netlist.validate()?;
    let mut targets = targets.to_vec();
    targets.sort_unstable();
    targets.dedup();
    if let Some(&bad) = targets.iter().find(|&&t| t >= netlist.len()) {
        return Err(FaultError::UnknownFaultTarget(format!("#{}", bad)));
    }

    let mut signatures = Signatures::new(netlist);
    let mut class_of: HashMap<SetId, usize> = HashMap::new();
    let mut result = StructuralPartition::default();
    for target in targets {
        let sig = signatures.signature(target)?;
        let class = *class_of.entry(sig).or_insert_with(|| {
            result.classes.push(Vec::new());
            result.co_sets.push(signatures.sets.get(sig).to_vec());
            result.classes.len() - 1
        });
        result.classes[class].push(target);
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::netlist::{
        GateFn,
        test::{c17, shift2},
    };
    use proptest::prelude::*;

    #[test]
    fn merge_sorted_test() {
        assert_eq!(merge_sorted(&[1, 4, 6], &[2, 4, 7, 9]), vec![1, 2, 4, 6, 7, 9]);
        assert_eq!(merge_sorted(&[], &[3]), vec![3]);
        assert!(merge_sorted(&[], &[]).is_empty());
    }

    #[test]
    fn interner_test() {
        let mut sets = SetInterner::new();
        assert_eq!(sets.len(), 1);
        let a = sets.intern(vec![0]);
        let b = sets.intern(vec![2]);
        let ab = sets.union(a, b);
        assert_eq!(sets.get(ab), &[0, 2]);
        assert_eq!(sets.union(b, a), ab);
        assert_eq!(sets.union(ab, a), ab);
        assert_eq!(sets.union(0, b), b);
        assert_eq!(sets.len(), 4);
    }

    #[test]
    fn and_gate_test() {
        let mut n = Netlist::new();
        let a = n.add_input("a");
        let b = n.add_input("b");
        let y = n.add_gate("y", GateFn::And, &[a, b]).unwrap();
        n.add_output(y).unwrap();
        let p = partition(&n, &[y, a, b]).unwrap();
        assert_eq!(p.classes, vec![vec![a, b, y]]);
        assert_eq!(p.co_sets, vec![vec![0]]);
    }

    #[test]
    fn c17_test() {
        let n = c17();
        let all: Vec<NetId> = (0..n.len()).collect();
        let p = partition(&n, &all).unwrap();
        assert_eq!(
            p.classes,
            vec![vec![0, 5, 9], vec![1, 2, 3, 6, 7], vec![4, 8, 10]]
        );
        assert_eq!(p.co_sets, vec![vec![0], vec![0, 1], vec![1]]);
    }

    #[test]
    fn dead_node_test() {
        let mut n = Netlist::new();
        let a = n.add_input("a");
        let y = n.add_gate("y", GateFn::Not, &[a]).unwrap();
        let dead = n.add_gate("dead", GateFn::Buf, &[a]).unwrap();
        n.add_output(y).unwrap();
        let p = partition(&n, &[dead, y, a]).unwrap();
        assert_eq!(p.classes, vec![vec![a, y], vec![dead]]);
        assert!(p.co_sets[1].is_empty());
        assert!(partition(&n, &[42]).is_err());
    }

    #[test]
    fn dff_outputs_test() {
        // d(0) q0(1) q1(2) b0(3) b1(4) y(5), COs: y, next q0, next q1
        let n = shift2();
        let all: Vec<NetId> = (0..n.len()).collect();
        let p = partition(&n, &all).unwrap();
        assert_eq!(p.classes, vec![vec![0, 3], vec![1, 4], vec![2, 5]]);
        assert_eq!(p.co_sets, vec![vec![1], vec![2], vec![0]]);
    }

    proptest! {
        #[test]
        fn order_independence(targets in proptest::collection::vec(0usize..11, 0..30)) {
            let n = c17();
            let p = partition(&n, &targets).unwrap();
            let mut reversed = targets.clone();
            reversed.reverse();
            prop_assert_eq!(&p, &partition(&n, &reversed).unwrap());
            // Every class lies within a class of the full partition
            let all: Vec<NetId> = (0..n.len()).collect();
            let full = partition(&n, &all).unwrap();
            for class in &p.classes {
                prop_assert!(full.classes.iter().any(|f| class.iter().all(|t| f.contains(t))));
            }
        }
    }
}
