//! Register file.
//!
//! - A: 32-bit accumulator
//! - I: index register (loop counter and address offset)
//! - P: program counter
//!
//! The execution engine is the only mutator.

use crate::cpu::decode::{decode, ADDRESS_MASK};
use serde::{Serialize, Deserialize};

/// Compute the address an instruction word actually touches.
///
/// With the index flag set the result is `(base + index) mod 65536`, for any
/// index value including negative ones. Without it the index register is
/// ignored.
pub fn resolve(word: u32, index: i64) -> u16 {
    let d = decode(word);
    if d.indexed {
        ((d.address as i64).wrapping_add(index) & ADDRESS_MASK as i64) as u16
    } else {
        d.address
    }
}

/// The register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// A: accumulator
    pub a: i32,

    /// I: index register
    pub i: i64,

    /// P: address of the next instruction to fetch
    pub p: usize,

    /// Set by HLT, unknown opcodes, or running off the end of memory.
    pub halted: bool,

    /// Instructions executed since reset.
    pub instructions: u64,

    /// Cycles elapsed since reset. One per instruction.
    pub cycles: u64,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers and counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Increment the program counter by 1.
    pub fn advance_pc(&mut self) {
        self.p += 1;
    }

    /// Transfer control. Targets past the end of memory park the PC at the
    /// boundary so the next fetch halts.
    pub fn jump(&mut self, addr: u16, memory_size: usize) {
        self.p = (addr as usize).min(memory_size);
    }

    /// Effective address of `word` under the current index register.
    pub fn effective_address(&self, word: u32) -> u16 {
        resolve(word, self.i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode_op, Opcode};
    use proptest::prelude::*;

    #[test]
    fn test_effective_address() {
        let mut regs = Registers::new();
        regs.i = 10;

        let direct = encode_op(Opcode::Lda, 50, false);
        let indexed = encode_op(Opcode::Lda, 50, true);

        assert_eq!(regs.effective_address(direct), 50);
        assert_eq!(regs.effective_address(indexed), 60);
    }

    #[test]
    fn test_effective_address_wraps() {
        let word = encode_op(Opcode::Lda, 0xFFFF, true);
        assert_eq!(resolve(word, 1), 0);
        assert_eq!(resolve(word, 0x1_0002), 1);

        let word = encode_op(Opcode::Lda, 5, true);
        assert_eq!(resolve(word, -6), 0xFFFF);
        assert_eq!(resolve(word, -5), 0);
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();
        regs.p = 10;

        regs.advance_pc();
        regs.advance_pc();
        assert_eq!(regs.p, 12);
    }

    #[test]
    fn test_jump_clamps_to_memory_size() {
        let mut regs = Registers::new();
        regs.jump(40, 256);
        assert_eq!(regs.p, 40);
        regs.jump(0x1000, 256);
        assert_eq!(regs.p, 256);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers {
            a: -7,
            i: 3,
            p: 99,
            halted: true,
            instructions: 5,
            cycles: 5,
        };
        regs.reset();
        assert_eq!(regs, Registers::new());
    }

    proptest! {
        #[test]
        fn indexed_resolve_is_mod_65536(base in 0u32..=0xFFFF, index in any::<i64>()) {
            let word = encode_op(Opcode::Add, base, true);
            let expected = (base as i128 + index as i128).rem_euclid(65536);
            prop_assert_eq!(resolve(word, index) as i128, expected);
        }

        #[test]
        fn direct_resolve_ignores_index(base in 0u32..=0xFFFF, index in any::<i64>()) {
            let word = encode_op(Opcode::Add, base, false);
            prop_assert_eq!(resolve(word, index) as u32, base);
        }
    }
}
