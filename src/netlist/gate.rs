//! Gate functions and the value algebras they are evaluated in.
//!
//! The same [`GateFn::eval`] builds AIG logic (for miters and unrollings) and computes
//! 64 patterns at once on machine words (for simulation), so both always agree on what a
//! gate computes.

use std::fmt;

use crate::{
    aig::{Aig, AigEdge},
    library::{CellRef, truth_mask},
};

/// A boolean algebra gate functions can be evaluated in.
pub trait Evaluator {
    type Value: Clone;

    fn constant(&mut self, value: bool) -> Self::Value;
    fn not(&mut self, a: &Self::Value) -> Self::Value;
    fn and(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    fn or(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        let na = self.not(a);
        let nb = self.not(b);
        let n = self.and(&na, &nb);
        self.not(&n)
    }

    fn xor(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value {
        let nb = self.not(b);
        let l = self.and(a, &nb);
        let na = self.not(a);
        let r = self.and(&na, b);
        self.or(&l, &r)
    }

    /// `s ? t : e`
    fn mux(&mut self, s: &Self::Value, t: &Self::Value, e: &Self::Value) -> Self::Value {
        let l = self.and(s, t);
        let ns = self.not(s);
        let r = self.and(&ns, e);
        self.or(&l, &r)
    }
}

impl Evaluator for Aig {
    type Value = AigEdge;

    fn constant(&mut self, value: bool) -> AigEdge {
        Aig::constant(self, value)
    }

    fn not(&mut self, a: &AigEdge) -> AigEdge {
        !a
    }

    fn and(&mut self, a: &AigEdge, b: &AigEdge) -> AigEdge {
        Aig::and(self, a, b)
    }

    fn or(&mut self, a: &AigEdge, b: &AigEdge) -> AigEdge {
        Aig::or(self, a, b)
    }

    fn xor(&mut self, a: &AigEdge, b: &AigEdge) -> AigEdge {
        Aig::xor(self, a, b)
    }

    fn mux(&mut self, s: &AigEdge, t: &AigEdge, e: &AigEdge) -> AigEdge {
        Aig::mux(self, s, t, e)
    }
}

/// Bit-parallel evaluation, one pattern per bit of a 64-bit word.
#[derive(Debug, Default, Clone, Copy)]
pub struct Words;

impl Evaluator for Words {
    type Value = u64;

    fn constant(&mut self, value: bool) -> u64 {
        if value { u64::MAX } else { 0 }
    }

    fn not(&mut self, a: &u64) -> u64 {
        !a
    }

    fn and(&mut self, a: &u64, b: &u64) -> u64 {
        a & b
    }

    fn or(&mut self, a: &u64, b: &u64) -> u64 {
        a | b
    }

    fn xor(&mut self, a: &u64, b: &u64) -> u64 {
        a ^ b
    }

    fn mux(&mut self, s: &u64, t: &u64, e: &u64) -> u64 {
        (s & t) | (!s & e)
    }
}

/// The function computed by a gate from its ordered fanins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateFn {
    Const0,
    Const1,
    Buf,
    Not,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
    /// A technology cell, evaluated from its truth table.
    Cell(CellRef),
}

impl fmt::Display for GateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateFn::Const0 => write!(f, "CONST0"),
            GateFn::Const1 => write!(f, "CONST1"),
            GateFn::Buf => write!(f, "BUFF"),
            GateFn::Not => write!(f, "NOT"),
            GateFn::And => write!(f, "AND"),
            GateFn::Nand => write!(f, "NAND"),
            GateFn::Or => write!(f, "OR"),
            GateFn::Nor => write!(f, "NOR"),
            GateFn::Xor => write!(f, "XOR"),
            GateFn::Xnor => write!(f, "NXOR"),
            GateFn::Cell(cell) => write!(f, "CELL#{}", cell.id),
        }
    }
}

impl GateFn {
    /// The basic (non-cell) functions.
    pub const BASIC: [GateFn; 10] = [
        GateFn::Const0,
        GateFn::Const1,
        GateFn::Buf,
        GateFn::Not,
        GateFn::And,
        GateFn::Nand,
        GateFn::Or,
        GateFn::Nor,
        GateFn::Xor,
        GateFn::Xnor,
    ];

    /// Whether a gate with `n` fanins can compute this function.
    pub fn accepts_arity(&self, n: usize) -> bool {
        match self {
            GateFn::Const0 | GateFn::Const1 => n == 0,
            GateFn::Buf | GateFn::Not => n == 1,
            GateFn::Cell(cell) => n == cell.pins,
            _ => n >= 2,
        }
    }

    /// Evaluates the gate in the algebra `e`.
    pub fn eval<E: Evaluator>(&self, e: &mut E, fanins: &[E::Value]) -> E::Value {
        match self {
            GateFn::Const0 => e.constant(false),
            GateFn::Const1 => e.constant(true),
            GateFn::Buf => match fanins.first() {
                Some(a) => a.clone(),
                None => e.constant(false),
            },
            GateFn::Not => match fanins.first() {
                Some(a) => e.not(a),
                None => e.constant(true),
            },
            GateFn::And => fold(e, fanins, true, E::and),
            GateFn::Nand => {
                let v = fold(e, fanins, true, E::and);
                e.not(&v)
            }
            GateFn::Or => fold(e, fanins, false, E::or),
            GateFn::Nor => {
                let v = fold(e, fanins, false, E::or);
                e.not(&v)
            }
            GateFn::Xor => fold(e, fanins, false, E::xor),
            GateFn::Xnor => {
                let v = fold(e, fanins, false, E::xor);
                e.not(&v)
            }
            GateFn::Cell(cell) => shannon(e, cell.truth, cell.pins.min(fanins.len()), fanins),
        }
    }

    /// Evaluates the gate on single booleans.
    pub fn eval_bits(&self, fanins: &[bool]) -> bool {
        let words: Vec<u64> = fanins
            .iter()
            .map(|&b| if b { u64::MAX } else { 0 })
            .collect();
        self.eval(&mut Words, &words) & 1 == 1
    }
}

fn fold<E: Evaluator>(
    e: &mut E,
    fanins: &[E::Value],
    empty: bool,
    op: fn(&mut E, &E::Value, &E::Value) -> E::Value,
) -> E::Value {
    let Some((first, rest)) = fanins.split_first() else {
        return e.constant(empty);
    };
    rest.iter()
        .fold(first.clone(), |acc, fanin| op(e, &acc, fanin))
}

/// Builds the function of the `n`-input truth table by Shannon expansion on the last pin.
fn shannon<E: Evaluator>(e: &mut E, truth: u64, n: usize, fanins: &[E::Value]) -> E::Value {
    let mask = truth_mask(n);
    let truth = truth & mask;
    if truth == 0 {
        return e.constant(false);
    }
    if truth == mask {
        return e.constant(true);
    }
    let v = n - 1;
    let half = 1u32 << v;
    let lo = truth & truth_mask(v);
    let hi = (truth >> half) & truth_mask(v);
    let lo = shannon(e, lo, v, fanins);
    let hi = shannon(e, hi, v, fanins);
    e.mux(&fanins[v], &hi, &lo)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn cell(pins: usize, truth: u64) -> GateFn {
        GateFn::Cell(CellRef { id: 0, pins, truth })
    }

    #[test]
    fn basic_gates_test() {
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            let v = [a, b];
            assert_eq!(GateFn::And.eval_bits(&v), a & b);
            assert_eq!(GateFn::Nand.eval_bits(&v), !(a & b));
            assert_eq!(GateFn::Or.eval_bits(&v), a | b);
            assert_eq!(GateFn::Nor.eval_bits(&v), !(a | b));
            assert_eq!(GateFn::Xor.eval_bits(&v), a ^ b);
            assert_eq!(GateFn::Xnor.eval_bits(&v), !(a ^ b));
        }
        assert!(GateFn::Not.eval_bits(&[false]));
        assert!(GateFn::Buf.eval_bits(&[true]));
        assert!(GateFn::Const1.eval_bits(&[]));
        assert!(!GateFn::Const0.eval_bits(&[]));
        assert!(GateFn::Xor.eval_bits(&[true, true, true]));
        assert!(!GateFn::And.eval_bits(&[true, true, false]));
    }

    #[test]
    fn arity_test() {
        assert!(GateFn::Const0.accepts_arity(0));
        assert!(!GateFn::Not.accepts_arity(2));
        assert!(GateFn::Buf.accepts_arity(1));
        assert!(!GateFn::And.accepts_arity(1));
        assert!(GateFn::Xnor.accepts_arity(4));
        assert!(cell(3, 0x80).accepts_arity(3));
        assert!(!cell(3, 0x80).accepts_arity(2));
    }

    #[test]
    fn cell_eval_test() {
        // AOI21: !((a & b) | c)
        let mut truth = 0u64;
        for m in 0..8u64 {
            let (a, b, c) = (m & 1 != 0, m & 2 != 0, m & 4 != 0);
            if !((a && b) || c) {
                truth |= 1 << m;
            }
        }
        let aoi = cell(3, truth);
        for m in 0..8u64 {
            let (a, b, c) = (m & 1 != 0, m & 2 != 0, m & 4 != 0);
            assert_eq!(aoi.eval_bits(&[a, b, c]), !((a && b) || c));
        }
    }

    proptest! {
        #[test]
        fn aig_and_words_agree(truth in any::<u64>(), pins in 0usize..=6, basic in 0usize..10) {
            let gates = [cell(pins, truth), GateFn::BASIC[basic]];
            for gate in gates {
                let n = match gate {
                    GateFn::Cell(c) => c.pins,
                    GateFn::Const0 | GateFn::Const1 => 0,
                    GateFn::Buf | GateFn::Not => 1,
                    _ => 3,
                };
                let mut aig = Aig::new();
                let inputs: Vec<AigEdge> = (0..n).map(|_| aig.add_input()).collect();
                let out = gate.eval(&mut aig, &inputs);
                aig.add_output(out);
                for m in 0..(1u64 << n) {
                    let bits: Vec<bool> = (0..n).map(|i| (m >> i) & 1 == 1).collect();
                    prop_assert_eq!(aig.eval(&bits).unwrap()[0], gate.eval_bits(&bits));
                    if let GateFn::Cell(c) = gate {
                        prop_assert_eq!(gate.eval_bits(&bits), (c.truth >> m) & 1 == 1);
                    }
                }
            }
        }
    }
}
