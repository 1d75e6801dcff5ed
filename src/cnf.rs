//! Tseitin encoding of an AIG cone into a SAT formula in conjunctive normal form.
//!
//! Every live AIG node is given the SAT variable equal to its [`NodeId`], the constant node
//! excepted (it never shows up in a clause, see [`Lit`]). To ask whether an AIG output can be
//! raised:
//! - build the circuit with [`Aig`]
//! - extract the CNF of the output cone, output asserted, with [`Cnf::from_aig_output`]
//! - hand it over to a [`SatOracle`].
//!
//! [`SatOracle`]: crate::sat::SatOracle

use std::{num::TryFromIntError, ops::Deref, ops::Not};

use crate::aig::{Aig, AigEdge, AigNode, NodeId, Result, dfs::Dfs};

/// A SAT literal in DIMACS convention: a non-zero integer, negative when complemented.
///
/// The constant AIG node has no literal. An edge to it is a constant `LitRes`: false
/// literals are dropped from their clause and a clause holding a true literal is not
/// emitted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lit(i64);

impl Not for Lit {
    type Output = Self;

    fn not(self) -> Self::Output {
        Lit(-self.0)
    }
}

impl From<i64> for Lit {
    fn from(value: i64) -> Self {
        if value == 0 {
            panic!("Tried to create a Lit from 0. 0 is not a valid literal in DIMACS format.");
        }
        Lit(value)
    }
}

impl TryFrom<NodeId> for Lit {
    type Error = TryFromIntError;

    fn try_from(value: NodeId) -> std::result::Result<Self, Self::Error> {
        Ok(Lit::from(i64::try_from(value)?))
    }
}

impl Lit {
    /// The DIMACS value of the literal.
    pub fn get(&self) -> i64 {
        self.0
    }

    /// The variable of the literal (always positive).
    pub fn var(&self) -> i64 {
        self.0.abs()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LitRes {
    False,
    True,
    Lit(Lit),
}

impl Not for LitRes {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            LitRes::False => LitRes::True,
            LitRes::True => LitRes::False,
            LitRes::Lit(lit) => LitRes::Lit(!lit),
        }
    }
}

impl From<Lit> for LitRes {
    fn from(value: Lit) -> Self {
        LitRes::Lit(value)
    }
}

/// A SAT clause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Clause(Vec<Lit>);

impl Clause {
    /// A new empty clause.
    pub fn new() -> Self {
        Clause(Vec::new())
    }

    pub fn lits(&self) -> &[Lit] {
        &self.0
    }

    /// Returns the true SAT clause once we got rid of `True` and `False` literals.
    /// If there is a `True`, then the Clause is obviously satisfied, so we return None.
    /// `False` literals are omitted, and real literals are added to the clause.
    /// If only `False` literals were given, the empty (unsatisfiable) clause is returned.
    fn from_lit_res(lits: Vec<LitRes>) -> Option<Clause> {
        let mut literals = Vec::new();

        for lit_res in lits {
            match lit_res {
                LitRes::True => return None,
                LitRes::False => (),
                LitRes::Lit(lit) => literals.push(lit),
            }
        }

        Some(Clause(literals))
    }
}

impl From<Vec<Lit>> for Clause {
    fn from(value: Vec<Lit>) -> Self {
        Clause(value)
    }
}

/// A SAT CNF that can be passed to a SAT solver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cnf(Vec<Clause>);

impl Cnf {
    /// A new empty CNF.
    pub fn new() -> Self {
        Cnf(Vec::new())
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Largest variable used by a clause.
    pub fn max_var(&self) -> i64 {
        self.0
            .iter()
            .flat_map(|clause| clause.0.iter())
            .map(Lit::var)
            .max()
            .unwrap_or(0)
    }

    /// Add the given clause to the CNF.
    pub fn add_clause(&mut self, clause: Clause) {
        self.0.push(clause);
    }

    /// Add the given clause to the CNF, else does nothing.
    pub fn add_clause_if(&mut self, clause: Option<Clause>) {
        if let Some(c) = clause {
            self.add_clause(c);
        }
    }

    /// Add clauses induced by the node: `z = AND(a, b)` for and gates, nothing otherwise.
    pub fn add_clauses_node(&mut self, node: &AigNode) -> Result<()> {
        if let AigNode::And { id, fanin0, fanin1 } = node {
            let a = fanin0.get_literal_res()?;
            let b = fanin1.get_literal_res()?;
            let z = LitRes::from(Lit::try_from(*id)?);

            self.add_clause_if(Clause::from_lit_res(vec![a, !z]));
            self.add_clause_if(Clause::from_lit_res(vec![b, !z]));
            self.add_clause_if(Clause::from_lit_res(vec![!a, !b, z]));
        }
        Ok(())
    }

    /// Encodes the cone of `output` and asserts `output` is true.
    ///
    /// The formula is satisfiable iff some assignment of the AIG inputs raises `output`;
    /// a satisfying assignment read on the input variables is such an assignment.
    pub fn from_aig_output(aig: &Aig, output: &AigEdge) -> Result<Cnf> {
        let mut cnf = Cnf::new();
        let mut dfs = Dfs::from_node(output.get_node());
        while let Some(node) = dfs.next(aig) {
            cnf.add_clauses_node(node.borrow().deref())?;
        }
        cnf.add_clause_if(Clause::from_lit_res(vec![output.get_literal_res()?]));
        Ok(cnf)
    }
}

impl AigEdge {
    fn get_literal_res(&self) -> Result<LitRes> {
        let lit = if self.get_node().borrow().is_false() {
            LitRes::False
        } else {
            LitRes::from(Lit::try_from(self.get_node_id())?)
        };
        Ok(if self.get_complement() { !lit } else { lit })
    }

    /// The SAT literal of this edge, `None` for the constant signals.
    pub fn get_literal(&self) -> Result<Option<Lit>> {
        Ok(match self.get_literal_res()? {
            LitRes::Lit(lit) => Some(lit),
            _ => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn not_lit_test() {
        let l1 = Lit(1);
        assert_eq!(!l1, Lit(-1));
        assert_eq!((!l1).var(), 1);
        assert!((!l1).is_negative());
    }

    #[test]
    fn add_clause_test() {
        let c = Clause::from(vec![Lit(1), Lit(-3)]);
        let mut cnf = Cnf::new();
        cnf.add_clause(c.clone());
        cnf.add_clause_if(None);
        cnf.add_clause_if(Clause::from_lit_res(vec![!LitRes::False, LitRes::Lit(Lit(2))]));
        assert_eq!(cnf.clauses(), &[c]);
        assert_eq!(cnf.max_var(), 3);
    }

    #[test]
    fn xor_cone_test() {
        use crate::sat::{CadicalOracle, SatOracle, SatOutcome};

        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let x = aig.xor(&a, &b);
        let cnf = Cnf::from_aig_output(&aig, &x).unwrap();
        // Three and gates, then the unit clause of the output
        assert_eq!(cnf.len(), 10);

        let SatOutcome::Sat(model) = CadicalOracle::new().solve(&cnf, None).unwrap() else {
            panic!("a xor is satisfiable");
        };
        let va = model.value(a.get_literal().unwrap().unwrap());
        let vb = model.value(b.get_literal().unwrap().unwrap());
        assert_ne!(va, vb);

        // x & (a == b) cannot hold
        let same = aig.xor(&a, &b);
        let both = aig.and(&x, &!&same);
        let cnf = Cnf::from_aig_output(&aig, &both).unwrap();
        assert_eq!(CadicalOracle::new().solve(&cnf, None).unwrap(), SatOutcome::Unsat);
    }

    #[test]
    fn from_aig_output_test() {
        let mut aig = Aig::new();
        let a = aig.add_input();
        let b = aig.add_input();
        let y = aig.and(&a, &!&b);
        let cnf = Cnf::from_aig_output(&aig, &y).unwrap();

        // Three clauses for the gate, one unit clause for the output.
        assert_eq!(cnf.len(), 4);
        let ylit = y.get_literal().unwrap().unwrap();
        assert_eq!(cnf.clauses()[3], Clause(vec![ylit]));
        assert_eq!(cnf.max_var(), ylit.var());
    }

    #[test]
    fn constant_output_test() {
        let aig = Aig::new();
        let cnf = Cnf::from_aig_output(&aig, &aig.constant(false)).unwrap();
        assert_eq!(cnf.clauses(), &[Clause::new()]);
        let cnf = Cnf::from_aig_output(&aig, &aig.constant(true)).unwrap();
        assert!(cnf.is_empty());
    }

    #[test]
    #[should_panic]
    fn invalid_lit_from_test() {
        _ = Lit::from(0);
    }

    #[test]
    #[should_panic]
    fn invalid_lit_tryfrom_test() {
        _ = Lit::try_from(0 as NodeId);
    }
}
