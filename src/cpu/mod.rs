//! CPU emulation for the AN/FSQ-7 instruction core.
//!
//! This module implements a single-address machine with:
//! - a flat memory of 32-bit words (65536 cells by default)
//! - A (accumulator), I (index), P (program counter) registers
//! - 13 instructions, any of which may use indexed addressing

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod trace;

pub use memory::{Memory, DEFAULT_MEMORY_SIZE};
pub use registers::{Registers, resolve};
pub use decode::{Decoded, Opcode, UnknownOpcode, decode, encode, encode_op};
pub use execute::{Cpu, CpuConfig, CpuCore, CpuState, RTC_HZ};
pub use trace::{TraceEntry, TraceRecorder};
