//! Technology-cell library used by mapped netlists.
//!
//! A cell is a named single-output function of at most [`MAX_PINS`] inputs, given by its
//! truth table: bit `m` of [`Cell::truth`] is the output for the input minterm `m`, pin `i`
//! being bit `i` of `m`.

use std::collections::HashMap;

use crate::{FaultError, Result};

/// Largest supported pin count (a 64-bit truth table).
pub const MAX_PINS: usize = 6;

/// Index of a cell in its [`CellLibrary`].
pub type CellId = usize;

/// Mask of the meaningful truth-table bits for `pins` inputs.
pub(crate) fn truth_mask(pins: usize) -> u64 {
    if pins >= MAX_PINS {
        u64::MAX
    } else {
        (1u64 << (1u64 << pins)) - 1
    }
}

/// A library cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub name: String,
    pub pins: usize,
    pub truth: u64,
}

/// The function of a library cell as carried by netlist gates and redirect faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub id: CellId,
    pub pins: usize,
    pub truth: u64,
}

/// A set of technology cells, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct CellLibrary {
    cells: Vec<Cell>,
    by_name: HashMap<String, CellId>,
}

impl CellLibrary {
    pub fn new() -> Self {
        CellLibrary::default()
    }

    /// Registers a cell. Names must be unique and cells have at most [`MAX_PINS`] pins.
    pub fn add_cell(&mut self, name: impl Into<String>, pins: usize, truth: u64) -> Result<CellId> {
        let name = name.into();
        if pins > MAX_PINS {
            return Err(FaultError::InvalidNetlist(format!(
                "cell `{}` has {} pins, at most {} are supported",
                name, pins, MAX_PINS
            )));
        }
        if self.by_name.contains_key(&name) {
            return Err(FaultError::InvalidNetlist(format!(
                "cell `{}` is defined twice",
                name
            )));
        }
        let id = self.cells.len();
        self.by_name.insert(name.clone(), id);
        self.cells.push(Cell {
            name,
            pins,
            truth: truth & truth_mask(pins),
        });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn cell_id(&self, name: &str) -> Option<CellId> {
        self.by_name.get(name).copied()
    }

    pub fn pin_count(&self, name: &str) -> Option<usize> {
        Some(self.cells[self.cell_id(name)?].pins)
    }

    /// The function of the cell with the given id.
    pub fn cell_ref(&self, id: CellId) -> Option<CellRef> {
        self.cells.get(id).map(|cell| CellRef {
            id,
            pins: cell.pins,
            truth: cell.truth,
        })
    }

    /// The function of the cell with the given name.
    pub fn lookup(&self, name: &str) -> Option<CellRef> {
        self.cell_ref(self.cell_id(name)?)
    }

    /// Two cells compute the same function (same pin count, same truth table).
    pub fn functionally_equivalent(&self, a: CellId, b: CellId) -> bool {
        match (self.cells.get(a), self.cells.get(b)) {
            (Some(a), Some(b)) => a.pins == b.pins && a.truth == b.truth,
            _ => false,
        }
    }

    /// Cells with the given pin count, in registration order.
    pub fn cells_with_pins(&self, pins: usize) -> impl Iterator<Item = CellRef> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, cell)| cell.pins == pins)
            .map(|(id, cell)| CellRef {
                id,
                pins: cell.pins,
                truth: cell.truth,
            })
    }
}
