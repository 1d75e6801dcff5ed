//! Turning a fault into a faulty circuit.
//!
//! Two strategies are provided:
//! - [`InjectionStrategy::Virtual`] keeps the good netlist and overrides the target's value
//!   while the caller evaluates it (see [`VirtualMutation`]). This is what miters use: the
//!   faulty circuit only exists inside one disposable AIG.
//! - [`InjectionStrategy::Materialized`] returns an independent copy of the netlist with the
//!   fault baked in. This is what sequential checking uses, since the mutant is simulated
//!   and unrolled many times.
//!
//! Both agree on every observable output for every input sequence.

use crate::{
    FaultError, Result,
    fault::{Fault, FaultKind, TargetRole},
    netlist::{Evaluator, GateFn, NetId, Netlist, NodeKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStrategy {
    Virtual,
    Materialized,
}

/// A faulty circuit.
#[derive(Debug, Clone)]
pub enum MutatedCircuit<'a> {
    Virtual(VirtualMutation<'a>),
    Materialized(Netlist),
}

impl MutatedCircuit<'_> {
    /// An independent netlist of the faulty circuit, materializing a virtual mutation.
    pub fn into_netlist(self) -> Result<Netlist> {
        match self {
            MutatedCircuit::Virtual(v) => materialize(v.netlist(), v.fault()),
            MutatedCircuit::Materialized(n) => Ok(n),
        }
    }
}

/// Injects `fault` into `netlist` following `strategy`.
///
/// This is the entry point of fault injection; the classification pipeline builds its
/// sequential mutants through it.
pub fn inject<'a>(
    netlist: &'a Netlist,
    fault: &Fault,
    strategy: InjectionStrategy,
) -> Result<MutatedCircuit<'a>> {
    Ok(match strategy {
        InjectionStrategy::Virtual => {
            MutatedCircuit::Virtual(VirtualMutation::new(netlist, *fault)?)
        }
        InjectionStrategy::Materialized => {
            MutatedCircuit::Materialized(materialize(netlist, fault)?)
        }
    })
}

fn check_target(netlist: &Netlist, fault: &Fault) -> Result<()> {
    if fault.node >= netlist.len() {
        return Err(FaultError::UnknownFaultTarget(format!("#{}", fault.node)));
    }
    let target = netlist.node(fault.node);
    if let Some(f) = fault.kind.redirect_fn() {
        if !matches!(target.kind, NodeKind::Gate(_)) || !f.accepts_arity(target.fanins.len()) {
            return Err(FaultError::FaultArityMismatch {
                kind: fault.kind.to_string(),
                node: target.name.clone(),
                found: target.fanins.len(),
            });
        }
    }
    Ok(())
}

/// Copies `netlist` with `fault` built in.
///
/// Value faults append one gate computing the faulty value from the target: `XOR(t, t)`
/// for stuck-at-0, `XNOR(t, t)` for stuck-at-1, `NOT(t)` for an inversion. Readers of the
/// target are then pointed at it: every gate, DFF and primary output for input and internal
/// targets, the primary outputs only for output targets. Redirect faults replace the
/// target's gate function in place.
pub fn materialize(netlist: &Netlist, fault: &Fault) -> Result<Netlist> {
    check_target(netlist, fault)?;
    let mut mutant = netlist.clone();
    let target = fault.node;

    if let Some(f) = fault.kind.redirect_fn() {
        mutant.set_gate_fn(target, f);
        return Ok(mutant);
    }

    let (f, fanins) = match fault.kind {
        FaultKind::StuckAt0 => (GateFn::Xor, vec![target, target]),
        FaultKind::StuckAt1 => (GateFn::Xnor, vec![target, target]),
        _ => (GateFn::Not, vec![target]),
    };
    let name = format!("{}_fault{}", netlist.node(target).name, fault.id);
    let faulty = mutant.push_gate(name, f, fanins);

    if fault.role != TargetRole::Output {
        mutant.rewire_fanins(target, faulty, faulty);
    }
    mutant.rewire_outputs(target, faulty);
    Ok(mutant)
}

/// A fault applied on the fly while evaluating the good netlist.
#[derive(Debug, Clone, Copy)]
pub struct VirtualMutation<'a> {
    netlist: &'a Netlist,
    fault: Fault,
}

impl<'a> VirtualMutation<'a> {
    pub fn new(netlist: &'a Netlist, fault: Fault) -> Result<Self> {
        check_target(netlist, &fault)?;
        Ok(VirtualMutation { netlist, fault })
    }

    pub fn netlist(&self) -> &'a Netlist {
        self.netlist
    }

    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    /// The value readers of `id` see, `good` being the fault-free value computed from `fanins`.
    pub fn node_value<E: Evaluator>(
        &self,
        e: &mut E,
        id: NetId,
        good: E::Value,
        fanins: &[E::Value],
    ) -> E::Value {
        if self.fault.overrides_node(id) {
            self.fault.kind.apply(e, &good, fanins)
        } else {
            good
        }
    }

    /// The value a primary output driven by `driver` sees, `value` being what readers of
    /// `driver` see.
    pub fn output_value<E: Evaluator>(
        &self,
        e: &mut E,
        driver: NetId,
        value: E::Value,
    ) -> E::Value {
        if self.fault.overrides_output(driver) {
            self.fault.kind.apply(e, &value, &[])
        } else {
            value
        }
    }

    /// Evaluates one frame of the mutant, see [`eval_frame`].
    pub fn eval_frame<E: Evaluator>(
        &self,
        e: &mut E,
        order: &[NetId],
        ci_values: &[E::Value],
    ) -> Result<(Vec<E::Value>, Vec<E::Value>)> {
        eval_frame(self.netlist, Some(&self.fault), e, order, ci_values)
    }
}

/// Evaluates one frame of `netlist`, with `fault` applied on the fly if given.
///
/// `order` is [`Netlist::comb_order`] and `ci_values` holds the values of
/// [`Netlist::inputs`] then [`Netlist::dffs`]. Returns the primary outputs and the next
/// DFF state.
pub fn eval_frame<E: Evaluator>(
    netlist: &Netlist,
    fault: Option<&Fault>,
    e: &mut E,
    order: &[NetId],
    ci_values: &[E::Value],
) -> Result<(Vec<E::Value>, Vec<E::Value>)> {
    let node_value = |e: &mut E, id: NetId, good: E::Value, fanins: &[E::Value]| match fault {
        Some(fault) if fault.overrides_node(id) => fault.kind.apply(e, &good, fanins),
        _ => good,
    };
    let read = |values: &[Option<E::Value>], id: NetId| {
        values[id].clone().ok_or_else(|| {
            FaultError::InvalidState(format!("`{}` read before evaluation", netlist.node(id).name))
        })
    };

    let mut values: Vec<Option<E::Value>> = vec![None; netlist.len()];
    for (&ci, value) in netlist
        .inputs()
        .iter()
        .chain(netlist.dffs())
        .zip(ci_values)
    {
        values[ci] = Some(node_value(e, ci, value.clone(), &[]));
    }

    let mut fanins = Vec::new();
    for &id in order {
        let node = netlist.node(id);
        let Some(f) = node.gate_fn() else { continue };
        fanins.clear();
        for &fanin in &node.fanins {
            fanins.push(read(&values, fanin)?);
        }
        let good = f.eval(e, &fanins);
        values[id] = Some(node_value(e, id, good, &fanins));
    }

    let mut outputs = Vec::with_capacity(netlist.outputs().len());
    for &driver in netlist.outputs() {
        let v = read(&values, driver)?;
        outputs.push(match fault {
            Some(fault) if fault.overrides_output(driver) => fault.kind.apply(e, &v, &[]),
            _ => v,
        });
    }
    let mut next = Vec::with_capacity(netlist.dffs().len());
    for co in netlist.outputs().len()..netlist.num_cos() {
        next.push(read(&values, netlist.co_driver(co)?)?);
    }
    Ok((outputs, next))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        fault::generate_faults,
        netlist::{
            Words,
            test::{c17, exhaustive},
        },
        sim::simulate_comb,
    };

    fn and2() -> Netlist {
        let mut n = Netlist::new();
        let a = n.add_input("a");
        let b = n.add_input("b");
        let y = n.add_gate("y", GateFn::And, &[a, b]).unwrap();
        n.add_output(y).unwrap();
        n
    }

    #[test]
    fn materialize_input_test() {
        let n = and2();
        let f = Fault::new(&n, 1, 0, FaultKind::StuckAt1).unwrap();
        let m = materialize(&n, &f).unwrap();
        assert_eq!(m.len(), 4);
        assert_eq!(m.node(2).fanins, vec![3, 1]);
        assert_eq!(m.node(3).fanins, vec![0, 0]);
        assert_eq!(m.node(3).gate_fn(), Some(GateFn::Xnor));
        // The original netlist is untouched
        assert_eq!(n.node(2).fanins, vec![0, 1]);
        // y = b
        let outs = simulate_comb(&m, &exhaustive(2)).unwrap();
        assert_eq!(outs[0] & 0xF, 0b1100);
    }

    #[test]
    fn materialize_output_test() {
        let mut n = and2();
        // y also feeds another gate, which must keep seeing the good value
        let z = n.add_gate("z", GateFn::Not, &[2]).unwrap();
        n.add_output(z).unwrap();
        let f = Fault::new(&n, 1, 2, FaultKind::Invert).unwrap();
        assert_eq!(f.role, TargetRole::Output);
        let m = materialize(&n, &f).unwrap();
        assert_eq!(m.outputs(), &[4, 3]);
        assert_eq!(m.node(3).fanins, vec![2]);
        let outs = simulate_comb(&m, &exhaustive(2)).unwrap();
        assert_eq!(outs[0] & 0xF, 0b0111);
        assert_eq!(outs[1] & 0xF, 0b0111);
    }

    #[test]
    fn materialize_redirect_test() {
        let n = and2();
        let f = Fault::new(&n, 1, 2, FaultKind::RedirectXor).unwrap();
        let m = materialize(&n, &f).unwrap();
        assert_eq!(m.len(), 3);
        assert_eq!(m.node(2).gate_fn(), Some(GateFn::Xor));
    }

    #[test]
    fn stuck_at_round_trip_test() {
        // SA0 and SA1 on the same observable node never both match the good circuit
        let n = c17();
        let words = exhaustive(5);
        let good = simulate_comb(&n, &words).unwrap();
        for node in 0..n.len() {
            let sa0 = Fault::new(&n, 1, node, FaultKind::StuckAt0).unwrap();
            let sa1 = Fault::new(&n, 2, node, FaultKind::StuckAt1).unwrap();
            let sa0 = materialize(&n, &sa0).unwrap();
            let sa1 = materialize(&n, &sa1).unwrap();
            let o0 = simulate_comb(&sa0, &words).unwrap();
            let o1 = simulate_comb(&sa1, &words).unwrap();
            assert!(o0 != good || o1 != good);
            assert_ne!(o0, o1);
        }
    }

    #[test]
    fn virtual_matches_materialized_test() {
        let n = c17();
        let words = exhaustive(5);
        let order = n.comb_order().unwrap();
        for fault in generate_faults(&n, None) {
            let m = materialize(&n, &fault).unwrap();
            let expected = simulate_comb(&m, &words).unwrap();
            let v = VirtualMutation::new(&n, fault).unwrap();
            let (outputs, next) = v.eval_frame(&mut Words, &order, &words).unwrap();
            assert!(next.is_empty());
            assert_eq!(outputs, expected, "fault {} {}", fault.node, fault.kind);
        }
    }

    #[test]
    fn inject_strategies_test() {
        let n = and2();
        let f = Fault::new(&n, 1, 1, FaultKind::Invert).unwrap();
        let virt = inject(&n, &f, InjectionStrategy::Virtual).unwrap();
        let mat = inject(&n, &f, InjectionStrategy::Materialized).unwrap();
        assert!(matches!(virt, MutatedCircuit::Virtual(_)));
        assert!(matches!(mat, MutatedCircuit::Materialized(_)));

        // Both strategies give the same circuit: y = a & !b
        let words = exhaustive(2);
        let from_virt = simulate_comb(&virt.into_netlist().unwrap(), &words).unwrap();
        let from_mat = simulate_comb(&mat.into_netlist().unwrap(), &words).unwrap();
        assert_eq!(from_virt, from_mat);
        assert_eq!(from_virt[0] & 0xF, words[0] & !words[1] & 0xF);

        let bad = Fault {
            id: 2,
            node: 0,
            kind: FaultKind::RedirectOr,
            role: TargetRole::Input,
        };
        assert!(inject(&n, &bad, InjectionStrategy::Virtual).is_err());
    }
}
