//! The classification pipeline.
//!
//! - combinational flow: [`refine_combinational`] (structural partition, then SAT miters
//!   with counterexample resimulation);
//! - sequential flow: every fault is injected as a materialized mutant, the mutants are
//!   clustered by [`pregroup`] and the clusters refined by [`refine_sequential`].
//!
//! ```rust
//! use faultclasses::{
//!     classify::classify,
//!     config::ClassifyConfig,
//!     fault::FaultRecord,
//!     netlist::{GateFn, Netlist},
//! };
//! let mut n = Netlist::new();
//! let a = n.add_input("a");
//! let b = n.add_input("b");
//! let y = n.add_gate("y", GateFn::And, &[a, b]).unwrap();
//! n.add_output(y).unwrap();
//!
//! let faults = [(1, "a", "SA0"), (2, "b", "SA0"), (3, "y", "SA0"), (4, "a", "SA1")];
//! let records: Vec<FaultRecord> = faults
//!     .iter()
//!     .map(|&(id, target, kind)| FaultRecord {
//!         id,
//!         target: target.to_string(),
//!         kind: kind.to_string(),
//!     })
//!     .collect();
//! let result = classify(&n, &records, None, &ClassifyConfig::default()).unwrap();
//! let mut out = Vec::new();
//! result.write_to(&mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "1 2\n1 3\n");
//! ```

use std::collections::HashSet;

use tracing::info;

use crate::{
    FaultError, Result,
    config::{ClassifyConfig, Mode},
    fault::{
        Fault, FaultRecord, ResolvedFaults,
        inject::{InjectionStrategy, MutatedCircuit, inject},
        resolve_records,
    },
    library::CellLibrary,
    netlist::Netlist,
    refine::refine_combinational,
    report::Classification,
    sat::{CadicalOracle, SatOracle},
    seq::{BmcOracle, SeqEquivOracle, pregroup, refine_sequential},
};

/// Resolves `records` against `netlist` and classifies the faults with the CaDiCaL-backed
/// oracles. Records that do not fit the netlist are reported in
/// [`Classification::skipped`].
pub fn classify(
    netlist: &Netlist,
    records: &[FaultRecord],
    library: Option<&CellLibrary>,
    config: &ClassifyConfig,
) -> Result<Classification> {
    let resolved = resolve_records(netlist, records, library);
    let mut sat = CadicalOracle::new();
    let mut seq = BmcOracle::new(CadicalOracle::new(), config.seq_bound, config.seq_conflict_limit);
    classify_with(netlist, resolved, config, &mut sat, &mut seq)
}

/// Classifies already resolved faults with the CaDiCaL-backed oracles.
pub fn classify_faults(
    netlist: &Netlist,
    faults: Vec<Fault>,
    config: &ClassifyConfig,
) -> Result<Classification> {
    let resolved = ResolvedFaults {
        faults,
        skipped: Vec::new(),
    };
    let mut sat = CadicalOracle::new();
    let mut seq = BmcOracle::new(CadicalOracle::new(), config.seq_bound, config.seq_conflict_limit);
    classify_with(netlist, resolved, config, &mut sat, &mut seq)
}

/// Whether `config` selects the sequential flow for `netlist`.
pub fn is_sequential_flow(netlist: &Netlist, config: &ClassifyConfig) -> bool {
    match config.mode {
        Mode::Auto => netlist.is_sequential(),
        Mode::Combinational => false,
        Mode::Sequential => true,
    }
}

/// Classifies the faults with the given oracles.
pub fn classify_with<O: SatOracle, S: SeqEquivOracle>(
    netlist: &Netlist,
    resolved: ResolvedFaults,
    config: &ClassifyConfig,
    sat: &mut O,
    seq: &mut S,
) -> Result<Classification> {
    config.validate()?;
    netlist.validate()?;

    let ResolvedFaults { mut faults, skipped } = resolved;
    faults.sort_by_key(|f| f.id);
    let mut ids = HashSet::new();
    if let Some(dup) = faults.iter().find(|f| !ids.insert(f.id)) {
        return Err(FaultError::InvalidConfig(format!("fault id {} is used twice", dup.id)));
    }

    let (classes, stats) = if is_sequential_flow(netlist, config) {
        let mutants = faults
            .iter()
            .map(|f| {
                inject(netlist, f, InjectionStrategy::Materialized)
                    .and_then(MutatedCircuit::into_netlist)
            })
            .collect::<Result<Vec<_>>>()?;
        let pregrouping = pregroup(&mutants, &config.pregroup)?;
        info!(
            faults = faults.len(),
            clusters = pregrouping.groups.len(),
            largest = pregrouping.groups.iter().map(Vec::len).max().unwrap_or(0),
            iterations = pregrouping.iterations,
            "pregrouping done"
        );
        let (classes, mut stats) = refine_sequential(&faults, &mutants, &pregrouping.groups, seq)?;
        stats.pregroup_iterations = pregrouping.iterations;
        (classes, stats)
    } else {
        refine_combinational(netlist, &faults, sat, config.conflict_limit)?
    };

    let result = Classification::new(classes, stats, skipped);
    info!(
        groups = result.stats.groups,
        sat_calls = result.stats.sat_calls,
        sim_rounds = result.stats.sim_rounds,
        oracle_calls = result.stats.oracle_calls,
        unresolved = result.stats.unresolved_pairs,
        skipped = result.skipped.len(),
        "computed {} equivalence classes with {} item pairs",
        result.classes.iter().filter(|c| !c.members.is_empty()).count(),
        result.pair_count()
    );
    Ok(result)
}
