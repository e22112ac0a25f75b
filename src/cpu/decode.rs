//! Instruction codec.
//!
//! An instruction is a single 32-bit word:
//! - bits 31-24: opcode
//! - bit 17: indexed-addressing flag
//! - bits 15-0: base address
//!
//! Decoding is total. Any word yields an opcode byte, an address and a flag;
//! whether the opcode byte names a real instruction is decided at dispatch.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Mask for the 16-bit base address field.
pub const ADDRESS_MASK: u32 = 0x0000_FFFF;

/// Indexed-addressing flag.
pub const INDEX_FLAG: u32 = 0x0002_0000;

/// Bit position of the opcode byte.
pub const OPCODE_SHIFT: u32 = 24;

/// The instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(TryFromPrimitive, IntoPrimitive)]
#[num_enum(error_type(name = UnknownOpcode, constructor = UnknownOpcode))]
#[repr(u8)]
pub enum Opcode {
    // ==================== Control ====================

    /// Halt: stop until reset
    Hlt = 0x00,

    // ==================== Data Transfer ====================

    /// Load accumulator: A := [ea]
    Lda = 0x01,

    /// Store accumulator: [ea] := A
    Sto = 0x02,

    // ==================== Arithmetic ====================

    /// Add: A := A + [ea]
    Add = 0x03,

    /// Subtract: A := A - [ea]
    Sub = 0x04,

    /// Multiply: A := A × [ea] (low 32 bits)
    Mpy = 0x05,

    /// Divide: A := A ÷ [ea], saturating on a zero divisor
    Dvh = 0x06,

    // ==================== Transfer of Control ====================

    /// Unconditional transfer: P := ea
    Tra = 0x10,

    /// Transfer on non-zero: if A ≠ 0 then P := ea
    Tnz = 0x11,

    /// Transfer on minus: if A < 0 then P := ea
    Tmi = 0x12,

    /// Transfer and set index: I := P, P := ea
    Tsx = 0x13,

    /// Transfer on index: I := I - 1, if I > 0 then P := ea
    Tix = 0x14,

    /// Transfer with index incremented: I := I + inc, if I ≤ limit then P := ea
    Txi = 0x15,
}

impl Opcode {
    /// Every defined opcode, in numeric order.
    pub const ALL: [Opcode; 13] = [
        Opcode::Hlt,
        Opcode::Lda,
        Opcode::Sto,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mpy,
        Opcode::Dvh,
        Opcode::Tra,
        Opcode::Tnz,
        Opcode::Tmi,
        Opcode::Tsx,
        Opcode::Tix,
        Opcode::Txi,
    ];

    /// The assembler mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Lda => "LDA",
            Opcode::Sto => "STO",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mpy => "MPY",
            Opcode::Dvh => "DVH",
            Opcode::Tra => "TRA",
            Opcode::Tnz => "TNZ",
            Opcode::Tmi => "TMI",
            Opcode::Tsx => "TSX",
            Opcode::Tix => "TIX",
            Opcode::Txi => "TXI",
        }
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    /// Whether the instruction touches or jumps to its address operand.
    /// HLT ignores it.
    pub fn takes_address(self) -> bool {
        self != Opcode::Hlt
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The raw fields of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoded {
    pub opcode: u8,
    pub address: u16,
    pub indexed: bool,
}

impl Decoded {
    /// The opcode, if it names a defined instruction.
    pub fn opcode(&self) -> Result<Opcode, UnknownOpcode> {
        Opcode::try_from(self.opcode)
    }

    /// TXI operands packed into the raw address field: `(increment, limit)`.
    pub fn txi_fields(&self) -> (u8, u8) {
        ((self.address >> 8) as u8, (self.address & 0xFF) as u8)
    }
}

/// Pack an instruction word. The address is masked to 16 bits.
pub fn encode(opcode: u8, address: u32, indexed: bool) -> u32 {
    let mut word = (opcode as u32) << OPCODE_SHIFT;
    word |= address & ADDRESS_MASK;
    if indexed {
        word |= INDEX_FLAG;
    }
    word
}

/// Pack a defined instruction.
pub fn encode_op(opcode: Opcode, address: u32, indexed: bool) -> u32 {
    encode(opcode.into(), address, indexed)
}

/// Unpack an instruction word.
pub fn decode(word: u32) -> Decoded {
    Decoded {
        opcode: (word >> OPCODE_SHIFT) as u8,
        address: (word & ADDRESS_MASK) as u16,
        indexed: word & INDEX_FLAG != 0,
    }
}

/// The HLT word substituted when the program counter runs off the end of memory.
pub const HALT_WORD: u32 = (Opcode::Hlt as u32) << OPCODE_SHIFT;

/// An opcode byte with no instruction behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown opcode: 0x{0:02X}")]
pub struct UnknownOpcode(pub u8);
