//! Sequential equivalence of two circuits.
//!
//! [`BmcOracle`] decides bounded equivalence: both circuits start from their DFF initial
//! values, receive the same primary input values at every frame, and must produce the same
//! primary outputs over the first `bound` frames. The two unrollings share one AIG, so
//! the parts the mutants have in common are hashed together.

use tracing::trace;

use crate::{
    FaultError, Result,
    aig::{Aig, AigEdge},
    fault::inject::eval_frame,
    miter::{MiterVerdict, solve_miter},
    netlist::{NetId, Netlist, NodeKind},
    sat::SatOracle,
};

/// Answer of a sequential equivalence query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqVerdict {
    Equivalent,
    NotEquivalent,
    /// The oracle could not conclude.
    Unknown,
}

/// The query contract of sequential equivalence checkers.
pub trait SeqEquivOracle {
    /// Compares the primary outputs of `a` and `b`, which share their primary inputs.
    fn check(&mut self, a: &Netlist, b: &Netlist) -> Result<SeqVerdict>;
}

impl<S: SeqEquivOracle + ?Sized> SeqEquivOracle for &mut S {
    fn check(&mut self, a: &Netlist, b: &Netlist) -> Result<SeqVerdict> {
        (**self).check(a, b)
    }
}

/// Bounded model checking over a [`SatOracle`].
#[derive(Debug, Clone)]
pub struct BmcOracle<O> {
    sat: O,
    bound: usize,
    conflict_limit: Option<u32>,
}

impl<O: SatOracle> BmcOracle<O> {
    pub fn new(sat: O, bound: usize, conflict_limit: Option<u32>) -> Self {
        BmcOracle {
            sat,
            bound,
            conflict_limit,
        }
    }

    pub fn bound(&self) -> usize {
        self.bound
    }
}

/// One circuit being unrolled.
struct Unrolling<'a> {
    netlist: &'a Netlist,
    order: Vec<NetId>,
    state: Vec<AigEdge>,
}

impl<'a> Unrolling<'a> {
    fn new(netlist: &'a Netlist, aig: &Aig) -> Result<Self> {
        netlist.validate()?;
        let state = netlist
            .dffs()
            .iter()
            .map(|&dff| {
                let init = matches!(netlist.node(dff).kind, NodeKind::Dff { init: true });
                aig.constant(init)
            })
            .collect();
        Ok(Unrolling {
            netlist,
            order: netlist.comb_order()?,
            state,
        })
    }

    /// Evaluates the next frame, returns its primary outputs.
    fn step(&mut self, aig: &mut Aig, inputs: &[AigEdge]) -> Result<Vec<AigEdge>> {
        let ci: Vec<AigEdge> = inputs.iter().chain(&self.state).cloned().collect();
        let (outputs, next) = eval_frame(self.netlist, None, aig, &self.order, &ci)?;
        self.state = next;
        Ok(outputs)
    }
}

impl<O: SatOracle> SeqEquivOracle for BmcOracle<O> {
    fn check(&mut self, a: &Netlist, b: &Netlist) -> Result<SeqVerdict> {
        if a.inputs().len() != b.inputs().len() || a.outputs().len() != b.outputs().len() {
            return Err(FaultError::InvalidNetlist(format!(
                "cannot compare {} inputs and {} outputs to {} inputs and {} outputs",
                a.inputs().len(),
                a.outputs().len(),
                b.inputs().len(),
                b.outputs().len()
            )));
        }

        let mut aig = Aig::new();
        let mut ua = Unrolling::new(a, &aig)?;
        let mut ub = Unrolling::new(b, &aig)?;
        let mut miter = aig.constant(false);
        for _ in 0..self.bound {
            let inputs: Vec<AigEdge> = a.inputs().iter().map(|_| aig.add_input()).collect();
            let oa = ua.step(&mut aig, &inputs)?;
            let ob = ub.step(&mut aig, &inputs)?;
            for (x, y) in oa.iter().zip(&ob) {
                let diff = aig.xor(x, y);
                miter = aig.or(&miter, &diff);
            }
        }
        aig.add_output(miter.clone());
        aig.update();

        let verdict = match solve_miter(&aig, &miter, &mut self.sat, self.conflict_limit)? {
            MiterVerdict::Equivalent => SeqVerdict::Equivalent,
            MiterVerdict::Distinguished(_) => SeqVerdict::NotEquivalent,
            MiterVerdict::Unresolved => SeqVerdict::Unknown,
        };
        trace!(bound = self.bound, ands = aig.num_ands(), ?verdict, "bounded sequential check");
        Ok(verdict)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        cnf::Cnf,
        fault::{Fault, FaultKind, inject::materialize},
        netlist::{GateFn, test::shift2},
        sat::{CadicalOracle, SatError, SatOutcome},
    };

    struct GiveUp;

    impl SatOracle for GiveUp {
        fn solve(&mut self, _: &Cnf, _: Option<u32>) -> std::result::Result<SatOutcome, SatError> {
            Ok(SatOutcome::Timeout)
        }
    }

    fn mutant(n: &Netlist, node: NetId, kind: FaultKind) -> Netlist {
        materialize(n, &Fault::new(n, 1, node, kind).unwrap()).unwrap()
    }

    #[test]
    fn shift_register_test() {
        // d(0) q0(1) q1(2) b0(3) b1(4) y(5)
        let n = shift2();
        let mut bmc = BmcOracle::new(CadicalOracle::new(), 6, None);
        assert_eq!(bmc.bound(), 6);

        // Stuck-at-0 anywhere along the chain blanks the output
        let d0 = mutant(&n, 0, FaultKind::StuckAt0);
        let q10 = mutant(&n, 2, FaultKind::StuckAt0);
        assert_eq!(bmc.check(&d0, &q10).unwrap(), SeqVerdict::Equivalent);

        // Inverting the chain is seen two frames later
        let inv = mutant(&n, 3, FaultKind::Invert);
        assert_eq!(bmc.check(&n, &inv).unwrap(), SeqVerdict::NotEquivalent);
        let d_neg = mutant(&n, 0, FaultKind::Invert);
        assert_eq!(bmc.check(&inv, &d_neg).unwrap(), SeqVerdict::Equivalent);

        assert_eq!(bmc.check(&n, &n).unwrap(), SeqVerdict::Equivalent);
    }

    #[test]
    fn bound_test() {
        // A stuck-at-1 at the end of the chain is seen at frame 0, one at the input only
        // from frame 2 on
        let n = shift2();
        let y1 = mutant(&n, 5, FaultKind::StuckAt1);
        let d1 = mutant(&n, 0, FaultKind::StuckAt1);
        let mut short = BmcOracle::new(CadicalOracle::new(), 2, None);
        assert_eq!(short.check(&n, &d1).unwrap(), SeqVerdict::Equivalent);
        assert_eq!(short.check(&n, &y1).unwrap(), SeqVerdict::NotEquivalent);
        let mut long = BmcOracle::new(CadicalOracle::new(), 3, None);
        assert_eq!(long.check(&n, &d1).unwrap(), SeqVerdict::NotEquivalent);
    }

    #[test]
    fn unknown_and_mismatch_test() {
        let n = shift2();
        let mut bmc = BmcOracle::new(GiveUp, 4, Some(1));

        // The miter of a stuck-at-1 on the input reduces to `!d(0) | !d(1)`: the solver is
        // queried and gives up
        let d1 = mutant(&n, 0, FaultKind::StuckAt1);
        assert_eq!(bmc.check(&n, &d1).unwrap(), SeqVerdict::Unknown);

        // y(2) is d(0) against !d(0): the miter folds to true before any query
        let inv = mutant(&n, 3, FaultKind::Invert);
        assert_eq!(bmc.check(&n, &inv).unwrap(), SeqVerdict::NotEquivalent);

        let mut other = Netlist::new();
        let a = other.add_input("a");
        let b = other.add_input("b");
        let y = other.add_gate("y", GateFn::Xor, &[a, b]).unwrap();
        other.add_output(y).unwrap();
        assert!(matches!(bmc.check(&n, &other), Err(FaultError::InvalidNetlist(_))));
    }
}
