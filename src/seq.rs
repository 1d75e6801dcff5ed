//! Sequential classification.
//!
//! Exact sequential checks are expensive, so faults are first clustered by [`pregroup`]:
//! every mutant is simulated under the same seeded random input sequences, and faults whose
//! output trajectories differ are certainly not equivalent. Clusters are then split into
//! equivalence classes by [`refine_sequential`] with a [`SeqEquivOracle`].
//!
//! Pregrouping only ever separates faults that behave differently, it never asserts that
//! two faults are equivalent.

pub mod bmc;

pub use bmc::{BmcOracle, SeqEquivOracle, SeqVerdict};

use tracing::{debug, trace, warn};

use crate::{
    FaultError, Result,
    config::PregroupConfig,
    fault::Fault,
    netlist::Netlist,
    report::{EquivalenceClass, MemberStatus, Stats},
    sim::SeqSim,
};

/// Clusters of mutant indices.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pregrouping {
    pub groups: Vec<Vec<usize>>,
    /// Refinement iterations run after the first pass.
    pub iterations: usize,
}

struct Pregrouper<'a> {
    sims: Vec<SeqSim<'a>>,
    words: usize,
    groups: Vec<Vec<usize>>,
}

impl Pregrouper<'_> {
    /// Splits group `row` by output trajectory. Members matching the first one stay, the
    /// others go to the groups spun off during this call. Returns true if nothing split.
    fn split(&mut self, row: usize, frames: usize, seed: u64) -> Result<bool> {
        let members = std::mem::take(&mut self.groups[row]);
        let Some(&first) = members.first() else {
            return Ok(true);
        };
        let trajectories = members
            .iter()
            .map(|&m| self.sims[m].run(frames, self.words, seed))
            .collect::<Result<Vec<_>>>()?;

        let rows = self.groups.len();
        self.groups[row].push(first);
        // Member of `members` heading each spun off group
        let mut heads: Vec<usize> = Vec::new();
        for i in 1..members.len() {
            if trajectories[i] == trajectories[0] {
                self.groups[row].push(members[i]);
                continue;
            }
            match heads.iter().position(|&h| trajectories[h] == trajectories[i]) {
                Some(p) => self.groups[rows + p].push(members[i]),
                None => {
                    heads.push(i);
                    self.groups.push(vec![members[i]]);
                }
            }
        }
        Ok(heads.is_empty())
    }

    /// Size of the largest group still worth splitting.
    fn largest_active(&self, stalls: &[usize], threshold: usize) -> usize {
        self.groups
            .iter()
            .zip(stalls)
            .filter(|&(group, &stall)| group.len() >= 2 && stall < threshold)
            .map(|(group, _)| group.len())
            .max()
            .unwrap_or(0)
    }
}

/// Clusters `mutants` by random simulation.
///
/// A first pass of `initial_frames` frames splits the whole set. Then, while the largest
/// active group has at least `max_group_size` members and the iteration budget lasts, every
/// group of at least `min_group_size` members is simulated again with a fresh seed and one
/// more `frame_step` frames. A group that does not split `stall_threshold` times in a row is
/// left alone.
pub fn pregroup(mutants: &[Netlist], config: &PregroupConfig) -> Result<Pregrouping> {
    if mutants.is_empty() {
        return Ok(Pregrouping::default());
    }
    let sims = mutants.iter().map(SeqSim::new).collect::<Result<Vec<_>>>()?;
    let mut p = Pregrouper {
        sims,
        words: config.sim_words,
        groups: vec![(0..mutants.len()).collect()],
    };

    p.split(0, config.initial_frames, config.seed)?;
    let mut stalls = vec![0; p.groups.len()];
    let mut largest = p.largest_active(&stalls, config.stall_threshold);
    let mut iterations = 0;

    for i in 0..config.max_iterations {
        if largest < config.max_group_size {
            break;
        }
        iterations += 1;
        let frames = config.frames + i * config.frame_step;
        // Groups spun off during this iteration are visited too
        let mut j = 0;
        while j < p.groups.len() {
            stalls.resize(p.groups.len(), 0);
            if p.groups[j].len() >= config.min_group_size && stalls[j] < config.stall_threshold {
                let seed = config.seed.wrapping_add(((i + 1) * (j + 1) + 10) as u64);
                if p.split(j, frames, seed)? {
                    stalls[j] += 1;
                } else {
                    stalls[j] = 0;
                }
            }
            j += 1;
        }
        stalls.resize(p.groups.len(), 0);
        largest = p.largest_active(&stalls, config.stall_threshold);
        debug!(iteration = i, frames, groups = p.groups.len(), largest, "pregroup iteration");
    }

    Ok(Pregrouping {
        groups: p.groups,
        iterations,
    })
}

/// A class of the cluster being refined, with the mutant index of its anchor.
struct ClusterClass {
    anchor: usize,
    class: EquivalenceClass,
}

/// Splits every cluster into equivalence classes with `oracle`.
///
/// `mutants[i]` is the materialized mutant of `faults[i]`. Within a cluster, members are
/// checked against the smallest fault id. A member told apart joins the first class spun
/// off from the same cluster its anchor is proven equivalent to, or starts a new one.
/// Oracle answers that are not conclusive never separate faults: such a member stays with
/// the anchor it could not be told apart from, marked unresolved.
pub fn refine_sequential<S: SeqEquivOracle>(
    faults: &[Fault],
    mutants: &[Netlist],
    groups: &[Vec<usize>],
    oracle: &mut S,
) -> Result<(Vec<EquivalenceClass>, Stats)> {
    if faults.len() != mutants.len() {
        return Err(FaultError::InvalidState(format!(
            "{} faults for {} mutants",
            faults.len(),
            mutants.len()
        )));
    }
    let mut stats = Stats {
        groups: groups.len(),
        ..Stats::default()
    };
    let mut classes = Vec::new();

    for group in groups {
        let mut members = group.clone();
        members.sort_by_key(|&m| faults[m].id);
        let Some((&anchor, rest)) = members.split_first() else {
            continue;
        };
        let mut cluster = vec![ClusterClass {
            anchor,
            class: EquivalenceClass::new(faults[anchor].id),
        }];
        let calls_before = stats.oracle_calls;

        for &m in rest {
            let id = faults[m].id;
            stats.oracle_calls += 1;
            match oracle.check(&mutants[anchor], &mutants[m])? {
                SeqVerdict::Equivalent => {
                    trace!(anchor = faults[anchor].id, fault = id, "proven equivalent");
                    cluster[0].class.push(id, MemberStatus::Proven);
                    continue;
                }
                SeqVerdict::Unknown => {
                    warn!(anchor = faults[anchor].id, fault = id, "sequential check gave up");
                    cluster[0].class.push(id, MemberStatus::Unresolved);
                    continue;
                }
                SeqVerdict::NotEquivalent => (),
            }

            let mut undecided = None;
            let mut placed = false;
            for (k, other) in cluster.iter_mut().enumerate().skip(1) {
                stats.oracle_calls += 1;
                match oracle.check(&mutants[other.anchor], &mutants[m])? {
                    SeqVerdict::Equivalent => {
                        other.class.push(id, MemberStatus::Proven);
                        placed = true;
                        break;
                    }
                    SeqVerdict::Unknown if undecided.is_none() => undecided = Some(k),
                    SeqVerdict::Unknown | SeqVerdict::NotEquivalent => (),
                }
            }
            if placed {
                continue;
            }
            match undecided {
                Some(k) => {
                    warn!(anchor = cluster[k].class.anchor, fault = id, "sequential check gave up");
                    cluster[k].class.push(id, MemberStatus::Unresolved);
                }
                None => cluster.push(ClusterClass {
                    anchor: m,
                    class: EquivalenceClass::new(id),
                }),
            }
        }

        debug!(
            faults = members.len(),
            classes = cluster.len(),
            oracle_calls = stats.oracle_calls - calls_before,
            "pregroup cluster refined"
        );
        classes.extend(cluster.into_iter().map(|c| c.class));
    }

    Ok((classes, stats))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cnf::Cnf,
        fault::{FaultKind, generate_faults, inject::materialize},
        netlist::{NetId, test::shift2},
        sat::{CadicalOracle, SatError, SatOracle, SatOutcome},
    };

    struct GiveUp;

    impl SatOracle for GiveUp {
        fn solve(&mut self, _: &Cnf, _: Option<u32>) -> std::result::Result<SatOutcome, SatError> {
            Ok(SatOutcome::Timeout)
        }
    }

    fn mutants(n: &Netlist, faults: &[Fault]) -> Vec<Netlist> {
        faults.iter().map(|f| materialize(n, f).unwrap()).collect()
    }

    fn eager() -> PregroupConfig {
        PregroupConfig {
            initial_frames: 4,
            frames: 4,
            frame_step: 2,
            max_iterations: 5,
            min_group_size: 2,
            max_group_size: 2,
            stall_threshold: 2,
            seed: 3,
            sim_words: 1,
        }
    }

    #[test]
    fn pregroup_test() {
        let n = shift2();
        let faults = generate_faults(&n, None);
        let mutants = mutants(&n, &faults);
        let p = pregroup(&mutants, &eager()).unwrap();

        let mut all: Vec<usize> = p.groups.iter().flatten().copied().collect();
        all.sort();
        assert_eq!(all, (0..faults.len()).collect::<Vec<_>>());
        assert!(p.iterations <= 5);
        assert_eq!(p, pregroup(&mutants, &eager()).unwrap());

        // Stuck-at-0 anywhere along the chain blanks the output: never separated
        let group_of = |i: usize| p.groups.iter().position(|g| g.contains(&i)).unwrap();
        let sa0: Vec<usize> = (0..faults.len())
            .filter(|&i| faults[i].kind == FaultKind::StuckAt0)
            .collect();
        assert_eq!(sa0.len(), 6);
        assert!(sa0.iter().all(|&i| group_of(i) == group_of(sa0[0])));
        // Stuck-at-0 and stuck-at-1 on the output are told apart at the first frame
        let y = |kind| {
            (0..faults.len())
                .find(|&i| faults[i].node == 5 && faults[i].kind == kind)
                .unwrap()
        };
        assert_ne!(group_of(y(FaultKind::StuckAt0)), group_of(y(FaultKind::StuckAt1)));
    }

    #[test]
    fn pregroup_small_test() {
        assert!(pregroup(&[], &eager()).unwrap().groups.is_empty());
        let n = shift2();
        let p = pregroup(std::slice::from_ref(&n), &eager()).unwrap();
        assert_eq!(p.groups, vec![vec![0]]);
        assert_eq!(p.iterations, 0);
    }

    fn chain_faults(n: &Netlist) -> Vec<Fault> {
        // d SA0, b0 NEG, d NEG
        let chain: [(u32, NetId, FaultKind); 3] = [
            (1, 0, FaultKind::StuckAt0),
            (2, 3, FaultKind::Invert),
            (3, 0, FaultKind::Invert),
        ];
        chain
            .iter()
            .map(|&(id, node, kind)| Fault::new(n, id, node, kind).unwrap())
            .collect()
    }

    #[test]
    fn refine_sequential_test() {
        let n = shift2();
        let faults = chain_faults(&n);
        let mutants = mutants(&n, &faults);
        let mut oracle = BmcOracle::new(CadicalOracle::new(), 4, None);
        let (classes, stats) =
            refine_sequential(&faults, &mutants, &[vec![2, 1, 0]], &mut oracle).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].anchor, 1);
        assert!(classes[0].members.is_empty());
        assert_eq!(classes[1].anchor, 2);
        assert_eq!(classes[1].fault_ids().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(classes[1].unresolved(), 0);
        assert_eq!(stats.oracle_calls, 3);
        assert_eq!(stats.groups, 1);
    }

    #[test]
    fn refine_sequential_unknown_test() {
        let n = shift2();
        let faults = chain_faults(&n);
        let mutants = mutants(&n, &faults);
        let mut oracle = BmcOracle::new(GiveUp, 4, None);
        let (classes, stats) =
            refine_sequential(&faults, &mutants, &[vec![0, 1, 2]], &mut oracle).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].unresolved(), 2);
        assert_eq!(stats.oracle_calls, 2);

        assert!(refine_sequential(&faults, &mutants[..1], &[], &mut oracle).is_err());
    }

    /// Answers queries from a script, in order.
    struct Scripted(std::collections::VecDeque<SeqVerdict>);

    impl SeqEquivOracle for Scripted {
        fn check(&mut self, _: &Netlist, _: &Netlist) -> Result<SeqVerdict> {
            self.0
                .pop_front()
                .ok_or_else(|| FaultError::InvalidState("script exhausted".to_string()))
        }
    }

    #[test]
    fn refine_sequential_scripted_test() {
        use SeqVerdict::*;
        let n = shift2();
        let faults: Vec<Fault> = (1..=4)
            .map(|id| Fault::new(&n, id, 0, FaultKind::StuckAt0).unwrap())
            .collect();
        let mutants = vec![n.clone(); 4];
        // 2 vs 1; 3 vs 1, 3 vs 2; 4 vs 1, 4 vs 2
        let mut oracle = Scripted(
            [NotEquivalent, NotEquivalent, Unknown, NotEquivalent, NotEquivalent].into(),
        );
        let (classes, stats) =
            refine_sequential(&faults, &mutants, &[vec![0, 1, 2, 3]], &mut oracle).unwrap();
        assert_eq!(stats.oracle_calls, 5);
        assert_eq!(classes.len(), 3);
        assert_eq!(classes[1].fault_ids().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(classes[1].unresolved(), 1);
        assert_eq!(classes[2].anchor, 4);
        assert!(oracle.0.is_empty());
    }

    #[test]
    fn pregroup_then_refine_test() {
        let n = shift2();
        let faults = generate_faults(&n, None);
        let mutants = mutants(&n, &faults);
        let groups = pregroup(&mutants, &eager()).unwrap().groups;
        let mut oracle = BmcOracle::new(CadicalOracle::new(), 6, None);
        let (classes, _) = refine_sequential(&faults, &mutants, &groups, &mut oracle).unwrap();
        assert_eq!(classes.iter().map(EquivalenceClass::len).sum::<usize>(), faults.len());

        let index = |id: u32| faults.iter().position(|f| f.id == id).unwrap();
        let mut check = BmcOracle::new(CadicalOracle::new(), 6, None);
        for class in &classes {
            for member in &class.members {
                let (a, b) = (index(class.anchor), index(member.fault));
                assert_eq!(
                    check.check(&mutants[a], &mutants[b]).unwrap(),
                    SeqVerdict::Equivalent
                );
            }
        }
        for (i, a) in classes.iter().enumerate() {
            for b in &classes[i + 1..] {
                assert_eq!(
                    check.check(&mutants[index(a.anchor)], &mutants[index(b.anchor)]).unwrap(),
                    SeqVerdict::NotEquivalent
                );
            }
        }
    }
}
