//! Fault-equivalence classification of gate-level netlists.
//!
//! Two faults are equivalent when the circuits they produce cannot be told apart at the
//! primary outputs. Given a [`Netlist`] and a list of faults, [`classify`] groups the faults
//! into equivalence classes:
//! - combinational circuits are partitioned structurally, then every class is split with
//!   SAT miters whose counterexamples are resimulated against the whole class;
//! - sequential circuits are pregrouped by random multi-frame simulation, then every
//!   cluster is refined with a bounded sequential equivalence oracle.
//!
//! The result is written as `<anchor> <member>` pairs with [`Classification::write_to`].

pub mod aig;
pub mod classify;
pub mod cnf;
pub mod config;
pub mod error;
pub mod fault;
pub mod library;
pub mod miter;
pub mod netlist;
pub mod partition;
pub mod refine;
pub mod report;
pub mod sat;
pub mod seq;
pub mod sim;

// Re-exporting symbols.
pub use classify::{classify, classify_faults, classify_with};
pub use config::{ClassifyConfig, Mode, PregroupConfig};
pub use error::{FaultError, Result};
pub use fault::{Fault, FaultId, FaultKind, FaultRecord};
pub use library::CellLibrary;
pub use netlist::{GateFn, NetId, Netlist};
pub use report::{Classification, EquivalenceClass, MemberStatus, Stats};
pub use sat::{CadicalOracle, SatOracle};
pub use seq::{BmcOracle, SeqEquivOracle, SeqVerdict};
