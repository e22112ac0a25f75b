//! TUI debugger for the FSQ-7 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register panel fed from the CPU state snapshot
//! - Memory view
//! - Live execution trace
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
