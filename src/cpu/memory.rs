//! Core memory.
//!
//! A flat, word-addressable array of 32-bit cells. Accesses outside the
//! array never fault: reads return zero and writes are dropped.

use log::trace;
use serde::{Serialize, Deserialize};

/// Default number of memory cells (the full 16-bit address space).
pub const DEFAULT_MEMORY_SIZE: usize = 65536;

/// Core memory: `size` 32-bit cells, zero-initialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u32>,
}

impl Memory {
    /// Create a memory of `size` zeroed cells.
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0; size],
        }
    }

    /// Number of cells.
    #[inline]
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Read a cell. Out-of-range addresses read as zero.
    #[inline]
    pub fn read(&self, addr: usize) -> u32 {
        self.cells.get(addr).copied().unwrap_or(0)
    }

    /// Write a cell. Out-of-range addresses are ignored.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u32) {
        if let Some(cell) = self.cells.get_mut(addr) {
            *cell = value;
        }
    }

    /// Copy `words` into memory starting at `start`.
    ///
    /// Words that would land past the end are dropped. Returns how many
    /// words were stored.
    pub fn load(&mut self, words: &[u32], start: usize) -> usize {
        let available = self.size().saturating_sub(start);
        let stored = words.len().min(available);
        if stored < words.len() {
            trace!(
                "load at {}: dropped {} of {} words past end of memory",
                start,
                words.len() - stored,
                words.len()
            );
        }
        if stored > 0 {
            self.cells[start..start + stored].copy_from_slice(&words[..stored]);
        }
        stored
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u32)> {
        let end = start.saturating_add(count).min(self.size());
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero cells
        let non_zero = self.cells.iter().filter(|cell| **cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new(16);
        mem.write(10, 42);
        assert_eq!(mem.read(10), 42);
        assert_eq!(mem.read(11), 0);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new(16);
        mem.write(16, 7);
        mem.write(usize::MAX, 7);
        assert_eq!(mem.read(16), 0);
        assert_eq!(mem.read(usize::MAX), 0);
        assert!(mem.dump(0, 16).iter().all(|(_, v)| *v == 0));
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new(16);
        let stored = mem.load(&[1, 2, 3], 4);

        assert_eq!(stored, 3);
        assert_eq!(mem.read(4), 1);
        assert_eq!(mem.read(5), 2);
        assert_eq!(mem.read(6), 3);
    }

    #[test]
    fn test_load_truncates_at_end() {
        let mut mem = Memory::new(8);
        assert_eq!(mem.load(&[9, 8, 7, 6], 6), 2);
        assert_eq!(mem.read(6), 9);
        assert_eq!(mem.read(7), 8);

        assert_eq!(mem.load(&[1], 8), 0);
        assert_eq!(mem.load(&[1], usize::MAX), 0);
    }

    #[test]
    fn test_load_overwrites_only_targets() {
        let mut mem = Memory::new(8);
        mem.load(&[1, 1, 1, 1], 0);
        mem.load(&[5], 2);
        assert_eq!(mem.dump(0, 4), vec![(0, 1), (1, 1), (2, 5), (3, 1)]);
    }

    #[test]
    fn test_dump_clamps() {
        let mem = Memory::new(4);
        assert_eq!(mem.dump(2, 100).len(), 2);
        assert!(mem.dump(10, 3).is_empty());
    }
}
