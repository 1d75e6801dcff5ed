//! Bit-parallel simulation.
//!
//! Two flavors are provided:
//! - [`FaultSim`]: fault-parallel combinational simulation of one pattern. Bit `j` of every
//!   word carries the circuit with fault `j` injected, so one pass tells which faults a
//!   counterexample separates.
//! - [`SeqSim`]: pattern-parallel multi-frame simulation of one circuit under seeded random
//!   stimulus, producing output trajectories.

use std::collections::HashMap;

use rand::{RngCore, SeedableRng, rngs::StdRng};

use crate::{
    FaultError, Result,
    fault::{Fault, inject::eval_frame},
    netlist::{Cone, NetId, Netlist, NodeKind, Words},
};

/// Simulates one frame of `netlist` with DFFs at their initial value.
/// `inputs` holds one word per primary input; one word per primary output is returned.
pub fn simulate_comb(netlist: &Netlist, inputs: &[u64]) -> Result<Vec<u64>> {
    let order = netlist.comb_order()?;
    let ci: Vec<u64> = inputs
        .iter()
        .copied()
        .chain(init_state(netlist, 1))
        .collect();
    let (outputs, _) = eval_frame(netlist, None, &mut Words, &order, &ci)?;
    Ok(outputs)
}

/// Initial DFF values, `words` words per DFF.
fn init_state(netlist: &Netlist, words: usize) -> Vec<u64> {
    let mut state = Vec::with_capacity(netlist.dffs().len() * words);
    for &dff in netlist.dffs() {
        let init = matches!(netlist.node(dff).kind, NodeKind::Dff { init: true });
        state.extend(std::iter::repeat_n(if init { u64::MAX } else { 0 }, words));
    }
    state
}

fn bit(word: u64, bit: usize) -> bool {
    (word >> (bit % 64)) & 1 == 1
}

/// Fault-parallel simulator scoped to one cone and one batch of faults.
///
/// Fault `faults[j]` lives in bit `j`. The buffers are allocated once for the batch and
/// overwritten by every [`FaultSim::simulate`].
pub struct FaultSim<'a> {
    netlist: &'a Netlist,
    cone: &'a Cone,
    faults: &'a [Fault],
    words: usize,
    values: Vec<u64>,
    co_values: Vec<u64>,
    node_faults: HashMap<NetId, Vec<usize>>,
    output_faults: HashMap<NetId, Vec<usize>>,
    rounds: usize,
}

impl<'a> FaultSim<'a> {
    pub fn new(netlist: &'a Netlist, cone: &'a Cone, faults: &'a [Fault]) -> Self {
        let words = faults.len().div_ceil(64).max(1);
        let mut node_faults: HashMap<NetId, Vec<usize>> = HashMap::new();
        let mut output_faults: HashMap<NetId, Vec<usize>> = HashMap::new();
        for (bit, fault) in faults.iter().enumerate() {
            if fault.overrides_node(fault.node) {
                node_faults.entry(fault.node).or_default().push(bit);
            } else if fault.overrides_output(fault.node) {
                output_faults.entry(fault.node).or_default().push(bit);
            }
        }
        FaultSim {
            netlist,
            cone,
            faults,
            words,
            values: vec![0; netlist.len() * words],
            co_values: vec![0; cone.cos.len() * words],
            node_faults,
            output_faults,
            rounds: 0,
        }
    }

    /// Forgets every simulated value.
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|w| *w = 0);
        self.co_values.iter_mut().for_each(|w| *w = 0);
    }

    /// Number of patterns simulated so far.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Overwrites, in the value words of `id`, the bits of the faults overriding `id`.
    fn override_node(&mut self, id: NetId) {
        let Some(bits) = self.node_faults.get(&id) else {
            return;
        };
        let netlist = self.netlist;
        let fanin_ids = &netlist.node(id).fanins;
        for &b in bits {
            let (w, mask) = (b / 64, 1u64 << (b % 64));
            let fanins: Vec<u64> = fanin_ids
                .iter()
                .map(|&f| self.values[f * self.words + w])
                .collect();
            let slot = id * self.words + w;
            let good = self.values[slot];
            let faulty = self.faults[b].kind.apply(&mut Words, &good, &fanins);
            self.values[slot] = (good & !mask) | (faulty & mask);
        }
    }

    /// Simulates the pattern (one value per cone CI, in [`Cone::cis`] order) on every
    /// faulty circuit of the batch at once.
    pub fn simulate(&mut self, pattern: &[bool]) -> Result<()> {
        if pattern.len() != self.cone.cis.len() {
            return Err(FaultError::InvalidState(format!(
                "pattern has {} values for {} inputs",
                pattern.len(),
                self.cone.cis.len()
            )));
        }
        self.rounds += 1;
        let words = self.words;
        let (netlist, cone) = (self.netlist, self.cone);

        for (&ci, &value) in cone.cis.iter().zip(pattern) {
            let v = if value { u64::MAX } else { 0 };
            self.values[ci * words..(ci + 1) * words].fill(v);
            self.override_node(ci);
        }

        let mut fanins = Vec::new();
        for &id in &cone.nodes {
            let node = netlist.node(id);
            let f = node.gate_fn().ok_or_else(|| {
                FaultError::InvalidState(format!("`{}` is not a gate", node.name))
            })?;
            for w in 0..words {
                fanins.clear();
                fanins.extend(node.fanins.iter().map(|&f| self.values[f * words + w]));
                self.values[id * words + w] = f.eval(&mut Words, &fanins);
            }
            self.override_node(id);
        }

        for (k, &co) in cone.cos.iter().enumerate() {
            let driver = netlist.co_driver(co)?;
            let out = &mut self.co_values[k * words..(k + 1) * words];
            out.copy_from_slice(&self.values[driver * words..(driver + 1) * words]);
            if !netlist.co_is_output(co) {
                continue;
            }
            if let Some(bits) = self.output_faults.get(&driver) {
                for &b in bits {
                    let (w, mask) = (b / 64, 1u64 << (b % 64));
                    let faulty = self.faults[b].kind.apply(&mut Words, &out[w], &[]);
                    out[w] = (out[w] & !mask) | (faulty & mask);
                }
            }
        }
        Ok(())
    }

    /// Faults `a` and `b` (batch indices) produce the same value on every output of the cone
    /// under the last simulated pattern.
    pub fn agree(&self, a: usize, b: usize) -> bool {
        (0..self.cone.cos.len()).all(|k| {
            let base = k * self.words;
            bit(self.co_values[base + a / 64], a) == bit(self.co_values[base + b / 64], b)
        })
    }
}

/// Output words of every frame, frame-major then output-major then word.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Trajectory(Vec<u64>);

impl Trajectory {
    pub fn words(&self) -> &[u64] {
        &self.0
    }
}

/// Multi-frame simulator of one (possibly mutated) netlist.
#[derive(Debug, Clone)]
pub struct SeqSim<'a> {
    netlist: &'a Netlist,
    order: Vec<NetId>,
}

impl<'a> SeqSim<'a> {
    pub fn new(netlist: &'a Netlist) -> Result<Self> {
        netlist.validate()?;
        Ok(SeqSim {
            netlist,
            order: netlist.comb_order()?,
        })
    }

    /// Simulates `frames` frames of `words * 64` random input sequences from the initial state.
    ///
    /// The stimulus only depends on the seed, the number of primary inputs, `frames` and
    /// `words`: circuits sharing their primary inputs get the same sequences.
    pub fn run(&self, frames: usize, words: usize, seed: u64) -> Result<Trajectory> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n_inputs = self.netlist.inputs().len();
        let stimulus: Vec<Vec<u64>> = (0..frames)
            .map(|_| (0..n_inputs * words).map(|_| rng.next_u64()).collect())
            .collect();
        self.run_with(&stimulus, words)
    }

    /// Simulates one frame per entry of `stimulus`, which holds `words` words per primary
    /// input (input-major).
    pub fn run_with(&self, stimulus: &[Vec<u64>], words: usize) -> Result<Trajectory> {
        let n_inputs = self.netlist.inputs().len();
        let n_outputs = self.netlist.outputs().len();
        let n_dffs = self.netlist.dffs().len();
        let mut state = init_state(self.netlist, words);
        let mut trajectory = Vec::with_capacity(stimulus.len() * n_outputs * words);

        for inputs in stimulus {
            if inputs.len() != n_inputs * words {
                return Err(FaultError::InvalidState(format!(
                    "stimulus frame has {} words, expected {}",
                    inputs.len(),
                    n_inputs * words
                )));
            }
            let mut outputs = vec![0; n_outputs * words];
            let mut next_state = vec![0; n_dffs * words];
            for w in 0..words {
                let ci: Vec<u64> = (0..n_inputs)
                    .map(|i| inputs[i * words + w])
                    .chain((0..n_dffs).map(|d| state[d * words + w]))
                    .collect();
                let (o, next) = eval_frame(self.netlist, None, &mut Words, &self.order, &ci)?;
                for (k, v) in o.into_iter().enumerate() {
                    outputs[k * words + w] = v;
                }
                for (d, v) in next.into_iter().enumerate() {
                    next_state[d * words + w] = v;
                }
            }
            trajectory.extend(outputs);
            state = next_state;
        }

        Ok(Trajectory(trajectory))
    }
}
