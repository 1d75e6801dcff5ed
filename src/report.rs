//! Classification results and their serialization.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{
    Result,
    fault::{FaultId, SkippedFault},
};

/// How firmly a member belongs to its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberStatus {
    /// An oracle proved the member equivalent to the anchor.
    Proven,
    /// The oracle gave up: the member was never told apart from the anchor, but never
    /// proven equivalent either.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassMember {
    pub fault: FaultId,
    pub status: MemberStatus,
}

/// A set of faults with the same observable behavior.
///
/// Every member was checked against the anchor, never against another member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceClass {
    pub anchor: FaultId,
    /// The other faults of the class, ascending.
    pub members: Vec<ClassMember>,
}

impl EquivalenceClass {
    pub fn new(anchor: FaultId) -> Self {
        EquivalenceClass {
            anchor,
            members: Vec::new(),
        }
    }

    pub fn push(&mut self, fault: FaultId, status: MemberStatus) {
        self.members.push(ClassMember { fault, status });
    }

    /// Number of faults, anchor included.
    pub fn len(&self) -> usize {
        self.members.len() + 1
    }

    /// Never empty: there is always an anchor.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Anchor then members.
    pub fn fault_ids(&self) -> impl Iterator<Item = FaultId> + '_ {
        std::iter::once(self.anchor).chain(self.members.iter().map(|m| m.fault))
    }

    pub fn contains(&self, fault: FaultId) -> bool {
        self.fault_ids().any(|f| f == fault)
    }

    /// Smallest fault id of the class.
    pub fn min_id(&self) -> FaultId {
        self.fault_ids().min().unwrap_or(self.anchor)
    }

    pub fn unresolved(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.status == MemberStatus::Unresolved)
            .count()
    }
}

/// Work counters of a classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Structural classes (combinational) or pregroup clusters (sequential).
    pub groups: usize,
    /// Miters checked.
    pub sat_calls: usize,
    /// Patterns resimulated after a distinguishing witness.
    pub sim_rounds: usize,
    /// Pregrouping iterations.
    pub pregroup_iterations: usize,
    /// Sequential equivalence oracle queries.
    pub oracle_calls: usize,
    /// Members left unresolved.
    pub unresolved_pairs: usize,
}

/// Every resolved fault in exactly one class, plus the faults that were skipped.
#[derive(Debug, Default)]
pub struct Classification {
    /// Ordered by smallest member id.
    pub classes: Vec<EquivalenceClass>,
    pub stats: Stats,
    pub skipped: Vec<SkippedFault>,
}

impl Classification {
    /// Sorts members and classes, and counts unresolved members.
    pub fn new(
        mut classes: Vec<EquivalenceClass>,
        mut stats: Stats,
        skipped: Vec<SkippedFault>,
    ) -> Self {
        for class in classes.iter_mut() {
            class.members.sort_by_key(|m| m.fault);
        }
        classes.sort_by_key(EquivalenceClass::min_id);
        stats.unresolved_pairs = classes.iter().map(EquivalenceClass::unresolved).sum();
        Classification {
            classes,
            stats,
            skipped,
        }
    }

    /// Number of `<anchor> <member>` pairs, that is `Σ (|class| - 1)`.
    pub fn pair_count(&self) -> usize {
        self.classes.iter().map(|c| c.members.len()).sum()
    }

    /// The class of `fault`, if it was classified.
    pub fn class_of(&self, fault: FaultId) -> Option<&EquivalenceClass> {
        self.classes.iter().find(|c| c.contains(fault))
    }

    /// Writes one `<anchor> <member>` line per pair, suffixed by ` unresolved` for pairs
    /// that were not proven.
    ///
    /// ```rust
    /// use faultclasses::report::{Classification, EquivalenceClass, MemberStatus, Stats};
    /// let mut class = EquivalenceClass::new(1);
    /// class.push(4, MemberStatus::Unresolved);
    /// class.push(2, MemberStatus::Proven);
    /// let classes = vec![EquivalenceClass::new(3), class];
    /// let result = Classification::new(classes, Stats::default(), vec![]);
    /// let mut out = Vec::new();
    /// result.write_to(&mut out).unwrap();
    /// assert_eq!(String::from_utf8(out).unwrap(), "1 2\n1 4 unresolved\n");
    /// ```
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        for class in &self.classes {
            for member in &class.members {
                match member.status {
                    MemberStatus::Proven => writeln!(writer, "{} {}", class.anchor, member.fault)?,
                    MemberStatus::Unresolved => {
                        writeln!(writer, "{} {} unresolved", class.anchor, member.fault)?
                    }
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))
    }
}
