//! The SAT oracle contract and its CaDiCaL-backed implementation.
//!
//! A query is a [`Cnf`] plus an optional conflict ceiling. The ceiling is a soft timeout:
//! a query that exhausts it answers [`SatOutcome::Timeout`] rather than failing.

use thiserror::Error;
use tracing::trace;

use crate::cnf::{Cnf, Lit};

/// Error returned when the SAT oracle could not process a query.
#[derive(Debug, Error)]
pub enum SatError {
    /// The variable does not fit the solver's literal representation.
    #[error("variable {0} does not fit a 32-bit solver literal")]
    VariableOverflow(i64),

    /// The solver refused one of its options.
    #[error("the SAT solver rejected an option: {0}")]
    Option(String),
}

/// A satisfying assignment, indexed by variable.
///
/// Variables unknown to the solver (they appear in no clause) read as `false`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Model(Vec<bool>);

impl Model {
    /// Builds a model from the values of variables `1..=values.len()`.
    pub fn from_values(values: Vec<bool>) -> Self {
        let mut model = Vec::with_capacity(values.len() + 1);
        model.push(false);
        model.extend(values);
        Model(model)
    }

    /// Value of the literal under this assignment.
    pub fn value(&self, lit: Lit) -> bool {
        let v = usize::try_from(lit.var())
            .ok()
            .and_then(|var| self.0.get(var).copied())
            .unwrap_or(false);
        v ^ lit.is_negative()
    }
}

/// Answer of a SAT query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    /// No assignment satisfies the formula.
    Unsat,
    /// The formula is satisfied by the given witness.
    Sat(Model),
    /// The resource ceiling was hit before an answer was found.
    Timeout,
}

/// The query contract every SAT backend must fulfill.
pub trait SatOracle {
    /// Solves `cnf`, giving up after `conflict_limit` conflicts if a limit is given.
    fn solve(&mut self, cnf: &Cnf, conflict_limit: Option<u32>) -> Result<SatOutcome, SatError>;
}

impl<O: SatOracle + ?Sized> SatOracle for &mut O {
    fn solve(&mut self, cnf: &Cnf, conflict_limit: Option<u32>) -> Result<SatOutcome, SatError> {
        (**self).solve(cnf, conflict_limit)
    }
}

/// [`SatOracle`] backed by [CaDiCaL](https://github.com/arminbiere/cadical).
///
/// A fresh solver instance is used for every query.
#[derive(Debug, Default, Clone, Copy)]
pub struct CadicalOracle;

impl CadicalOracle {
    pub fn new() -> Self {
        CadicalOracle
    }
}

fn to_cadical(lit: Lit) -> Result<i32, SatError> {
    i32::try_from(lit.get()).map_err(|_| SatError::VariableOverflow(lit.var()))
}

impl SatOracle for CadicalOracle {
    fn solve(&mut self, cnf: &Cnf, conflict_limit: Option<u32>) -> Result<SatOutcome, SatError> {
        let mut solver: cadical::Solver = cadical::Solver::new();
        if let Some(limit) = conflict_limit {
            let limit = i32::try_from(limit).unwrap_or(i32::MAX);
            solver
                .set_limit("conflicts", limit)
                .map_err(|e| SatError::Option(format!("{:?}", e)))?;
        }

        for clause in cnf.clauses() {
            let lits = clause
                .lits()
                .iter()
                .map(|&lit| to_cadical(lit))
                .collect::<Result<Vec<i32>, SatError>>()?;
            solver.add_clause(lits);
        }

        let outcome = match solver.solve() {
            Some(false) => SatOutcome::Unsat,
            None => SatOutcome::Timeout,
            Some(true) => {
                let known = solver.max_variable();
                let max_var = i32::try_from(cnf.max_var())
                    .map_err(|_| SatError::VariableOverflow(cnf.max_var()))?;
                let values = (1..=max_var)
                    .map(|var| var <= known && solver.value(var).unwrap_or(false))
                    .collect();
                SatOutcome::Sat(Model::from_values(values))
            }
        };
        trace!(
            clauses = cnf.len(),
            vars = cnf.max_var(),
            ?conflict_limit,
            sat = matches!(outcome, SatOutcome::Sat(_)),
            timeout = matches!(outcome, SatOutcome::Timeout),
            "sat query"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cnf::Clause;

    fn lit(v: i64) -> Lit {
        Lit::from(v)
    }

    #[test]
    fn model_value_test() {
        let model = Model::from_values(vec![true, false]);
        assert!(model.value(lit(1)));
        assert!(!model.value(lit(-1)));
        assert!(!model.value(lit(2)));
        assert!(model.value(lit(-2)));
        // Unknown variables read as false
        assert!(!model.value(lit(7)));
    }

    #[test]
    fn cadical_sat_test() {
        let mut cnf = Cnf::new();
        cnf.add_clause(Clause::from(vec![lit(1), lit(2)]));
        cnf.add_clause(Clause::from(vec![lit(-1)]));
        match CadicalOracle::new().solve(&cnf, Some(1000)).unwrap() {
            SatOutcome::Sat(model) => {
                assert!(!model.value(lit(1)));
                assert!(model.value(lit(2)));
            }
            other => panic!("expected SAT, got {:?}", other),
        }
    }

    #[test]
    fn cadical_unsat_test() {
        let mut cnf = Cnf::new();
        cnf.add_clause(Clause::from(vec![lit(1), lit(2)]));
        cnf.add_clause(Clause::from(vec![lit(-1)]));
        cnf.add_clause(Clause::from(vec![lit(-2)]));
        assert_eq!(
            CadicalOracle::new().solve(&cnf, None).unwrap(),
            SatOutcome::Unsat
        );
    }

    #[test]
    fn cadical_empty_clause_test() {
        let mut cnf = Cnf::new();
        cnf.add_clause(Clause::new());
        assert_eq!(
            CadicalOracle::new().solve(&cnf, None).unwrap(),
            SatOutcome::Unsat
        );
    }
}
