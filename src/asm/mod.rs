//! Assembler and disassembler for FSQ-7 programs.
//!
//! This module provides:
//! - A simple two-pass assembler (text → program image)
//! - A disassembler (words → readable text)
//! - The JSON program image format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_word};
pub use image::{ProgramImage, Segment, ImageError, load_image, save_image};
