//! The shared circular core.
//!
//! Every address is folded into `[0, size)` before use, so reads and writes
//! never go out of bounds: negative and over-range addresses wrap around.

use serde::{Deserialize, Serialize};

use crate::mars::instruction::Instruction;

/// Default number of cells in the core.
pub const DEFAULT_CORE_SIZE: usize = 8192;

/// Fixed-size circular memory of instructions.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Core {
    cells: Vec<Instruction>,
}

impl Core {
    /// Create a core of `size` cleared cells.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "core size must be non-zero");
        Self {
            cells: vec![Instruction::default(); size],
        }
    }

    /// Number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Reduce any logical address into `[0, size)`.
    #[inline]
    pub fn fold(&self, address: i64) -> usize {
        fold(address, self.cells.len())
    }

    /// Read the cell at `address` (folded).
    #[inline]
    pub fn read(&self, address: i64) -> &Instruction {
        let index = self.fold(address);
        &self.cells[index]
    }

    /// Mutable access to the live cell at `address` (folded).
    #[inline]
    pub fn read_mut(&mut self, address: i64) -> &mut Instruction {
        let index = self.fold(address);
        &mut self.cells[index]
    }

    /// Replace the cell at `address` (folded).
    #[inline]
    pub fn write(&mut self, address: i64, instruction: Instruction) {
        let index = self.fold(address);
        self.cells[index] = instruction;
    }

    /// Copy a program into consecutive cells starting at `start`, wrapping
    /// around the end of the core.
    pub fn load(&mut self, start: usize, program: &[Instruction]) {
        for (i, instr) in program.iter().enumerate() {
            self.write(start as i64 + i as i64, *instr);
        }
    }

    /// Cells in `[start, start + count)` (folded) that differ from the
    /// cleared value, with their addresses.
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Instruction)> {
        (0..count)
            .map(|i| self.fold(start as i64 + i as i64))
            .map(|addr| (addr, self.cells[addr]))
            .filter(|(_, cell)| !cell.is_cleared())
            .collect()
    }

    /// All cells in address order.
    pub fn cells(&self) -> &[Instruction] {
        &self.cells
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new(DEFAULT_CORE_SIZE)
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let occupied = self.cells.iter().filter(|cell| !cell.is_cleared()).count();

        f.debug_struct("Core")
            .field("occupied_cells", &occupied)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// `((address mod size) + size) mod size`, as an index.
#[inline]
pub fn fold(address: i64, size: usize) -> usize {
    address.rem_euclid(size as i64) as usize
}
