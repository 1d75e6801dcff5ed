//! Exact combinational refinement.
//!
//! Faults are first grouped by [`partition`]. Every structural class is then split into
//! equivalence classes by checking each member against its class anchor with a [`Miter`].
//! A distinguishing witness is not only used for the pair it was found for: it is
//! simulated once over the whole batch with a [`FaultSim`] and every class is split by it,
//! which saves the SAT queries of the pairs it separates.
//!
//! Simulation only ever removes members from a class. A member stays in its anchor's class
//! only if its miter was proven unsatisfiable, or was left unresolved by the oracle.

use std::collections::HashMap;

use tracing::{debug, trace, warn};

use crate::{
    FaultError, Result,
    fault::Fault,
    miter::{Miter, MiterVerdict},
    netlist::{Cone, Netlist, TravMarks},
    partition::partition,
    report::{EquivalenceClass, MemberStatus, Stats},
    sat::SatOracle,
    sim::FaultSim,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    Proven,
    Unresolved,
}

/// A class being refined. Members are batch indices, the first one is the anchor.
#[derive(Debug, Clone)]
struct WorkClass {
    members: Vec<(usize, Status)>,
}

impl WorkClass {
    fn anchor(&self) -> usize {
        self.members[0].0
    }

    fn next_pending(&self) -> Option<usize> {
        self.members
            .iter()
            .skip(1)
            .position(|&(_, status)| status == Status::Pending)
            .map(|p| p + 1)
    }
}

/// Refines one structural class.
struct Batch<'a, O> {
    netlist: &'a Netlist,
    cone: &'a Cone,
    faults: &'a [Fault],
    sim: FaultSim<'a>,
    classes: Vec<WorkClass>,
    oracle: &'a mut O,
    conflict_limit: Option<u32>,
    sat_calls: usize,
}

impl<'a, O: SatOracle> Batch<'a, O> {
    fn new(
        netlist: &'a Netlist,
        cone: &'a Cone,
        faults: &'a [Fault],
        oracle: &'a mut O,
        conflict_limit: Option<u32>,
    ) -> Self {
        let mut sim = FaultSim::new(netlist, cone, faults);
        sim.reset();
        Batch {
            netlist,
            cone,
            faults,
            sim,
            classes: vec![WorkClass {
                members: (0..faults.len()).map(|i| (i, Status::Pending)).collect(),
            }],
            oracle,
            conflict_limit,
            sat_calls: 0,
        }
    }

    fn run(&mut self) -> Result<()> {
        // Classes created by splits are appended, so this also visits them
        let mut c = 0;
        while c < self.classes.len() {
            while let Some(k) = self.classes[c].next_pending() {
                self.check_pair(c, k)?;
            }
            c += 1;
        }
        Ok(())
    }

    /// Checks member `k` of class `c` against the class anchor.
    fn check_pair(&mut self, c: usize, k: usize) -> Result<()> {
        let anchor = self.faults[self.classes[c].anchor()];
        let candidate_index = self.classes[c].members[k].0;
        let candidate = self.faults[candidate_index];

        let miter = Miter::new(self.netlist, self.cone, &anchor, &candidate)?;
        self.sat_calls += 1;
        match miter.solve(&mut *self.oracle, self.conflict_limit)? {
            MiterVerdict::Equivalent => {
                trace!(anchor = anchor.id, fault = candidate.id, "proven equivalent");
                self.classes[c].members[k].1 = Status::Proven;
            }
            MiterVerdict::Unresolved => {
                warn!(anchor = anchor.id, fault = candidate.id, "equivalence check gave up");
                self.classes[c].members[k].1 = Status::Unresolved;
            }
            MiterVerdict::Distinguished(witness) => {
                trace!(anchor = anchor.id, fault = candidate.id, "distinguished");
                self.sim.simulate(&witness)?;
                self.split()?;
                if self.classes[c].members.iter().any(|&(i, _)| i == candidate_index) {
                    return Err(FaultError::InvalidState(format!(
                        "the witness for faults {} and {} does not split them in simulation",
                        anchor.id, candidate.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Splits every class by the last simulated pattern: members disagreeing with their
    /// anchor leave for a new class, one new class per split class.
    fn split(&mut self) -> Result<()> {
        let mut spawned = Vec::new();
        for class in self.classes.iter_mut() {
            let anchor = class.anchor();
            let (stay, leave): (Vec<(usize, Status)>, Vec<(usize, Status)>) = class
                .members
                .iter()
                .partition(|&&(i, _)| i == anchor || self.sim.agree(anchor, i));
            if leave.is_empty() {
                continue;
            }
            if let Some(&(i, _)) = leave.iter().find(|&&(_, s)| s == Status::Proven) {
                return Err(FaultError::InvalidState(format!(
                    "fault {} was proven equivalent to fault {} but simulation tells them apart",
                    self.faults[i].id, self.faults[anchor].id
                )));
            }
            class.members = stay;
            spawned.push(WorkClass {
                members: leave.into_iter().map(|(i, _)| (i, Status::Pending)).collect(),
            });
        }
        self.classes.extend(spawned);
        Ok(())
    }

    fn into_classes(self) -> Vec<EquivalenceClass> {
        self.classes
            .into_iter()
            .map(|class| {
                let mut eq = EquivalenceClass::new(self.faults[class.anchor()].id);
                for &(i, status) in &class.members[1..] {
                    let status = match status {
                        Status::Proven => MemberStatus::Proven,
                        _ => MemberStatus::Unresolved,
                    };
                    eq.push(self.faults[i].id, status);
                }
                eq
            })
            .collect()
    }
}

/// Splits `faults` into equivalence classes over the combinational outputs of `netlist`.
///
/// DFF outputs are treated as free inputs and DFF next-state inputs as outputs, so this is
/// also a (conservative) check for sequential netlists: faults proven equivalent here are
/// equivalent over any sequence, faults told apart may still be sequentially equivalent.
pub fn refine_combinational<O: SatOracle>(
    netlist: &Netlist,
    faults: &[Fault],
    oracle: &mut O,
    conflict_limit: Option<u32>,
) -> Result<(Vec<EquivalenceClass>, Stats)> {
    let mut stats = Stats::default();
    let mut classes = Vec::new();
    if faults.is_empty() {
        return Ok((classes, stats));
    }

    let mut faults = faults.to_vec();
    faults.sort_by_key(|f| f.id);
    let targets: Vec<_> = faults.iter().map(|f| f.node).collect();
    let structure = partition(netlist, &targets)?;
    stats.groups = structure.len();

    let mut class_of_node = HashMap::new();
    for (c, nodes) in structure.classes.iter().enumerate() {
        for &node in nodes {
            class_of_node.insert(node, c);
        }
    }
    let mut batches: Vec<Vec<Fault>> = vec![Vec::new(); structure.len()];
    for fault in &faults {
        let c = class_of_node.get(&fault.node).ok_or_else(|| {
            FaultError::InvalidState(format!("fault {} has no structural class", fault.id))
        })?;
        batches[*c].push(*fault);
    }

    let mut marks = TravMarks::new();
    for (batch_faults, cos) in batches.iter().zip(&structure.co_sets) {
        if let [single] = batch_faults.as_slice() {
            classes.push(EquivalenceClass::new(single.id));
            continue;
        }
        let cone = netlist.cone(cos, &mut marks)?;
        let mut batch = Batch::new(netlist, &cone, batch_faults, oracle, conflict_limit);
        batch.run()?;
        debug!(
            faults = batch_faults.len(),
            cis = cone.cis.len(),
            cos = cone.cos.len(),
            nodes = cone.nodes.len(),
            sat_calls = batch.sat_calls,
            classes = batch.classes.len(),
            "structural class refined"
        );
        stats.sat_calls += batch.sat_calls;
        stats.sim_rounds += batch.sim.rounds();
        classes.extend(batch.into_classes());
    }

    Ok((classes, stats))
}
