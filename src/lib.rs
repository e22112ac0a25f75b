//! # FSQ-7 Emulator
//!
//! An emulator of the instruction core of the AN/FSQ-7, the vacuum-tube
//! computer at the heart of the SAGE air-defense network.
//!
//! The machine modeled here is the small part of the FSQ-7 that shows off
//! indexed addressing: a 32-bit accumulator, an index register, a flat
//! word-addressed memory and thirteen single-address instructions. Timing,
//! drum storage and I/O are not emulated.

pub mod arith;
pub mod cpu;
pub mod asm;
pub mod programs;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use arith::wrap32;
pub use cpu::{Cpu, CpuConfig, CpuCore, CpuState, Memory, Registers, Opcode, TraceEntry};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, load_image, save_image};
pub use programs::ExampleProgram;

#[cfg(feature = "tui")]
pub use tui::run_debugger;
