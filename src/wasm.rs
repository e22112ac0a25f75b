//! WebAssembly bindings for the FSQ-7 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.
//! State crosses the boundary as JSON.

use wasm_bindgen::prelude::*;
use crate::{Cpu, ProgramImage};
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_word;
use crate::programs;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    image: ProgramImage,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance with `memory_size` cells.
    #[wasm_bindgen(constructor)]
    pub fn new(memory_size: usize) -> Self {
        Self {
            cpu: Cpu::new(memory_size),
            image: ProgramImage::new(),
        }
    }

    /// Load a program from assembly source code. Returns the word count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let image = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        self.install(image);
        Ok(self.image.len())
    }

    /// Load one of the bundled example programs by name.
    #[wasm_bindgen]
    pub fn load_example(&mut self, name: &str) -> Result<usize, JsError> {
        let program = programs::by_name(name)
            .ok_or_else(|| JsError::new(&format!("no example named {}", name)))?;

        self.install(program.image);
        Ok(self.image.len())
    }

    fn install(&mut self, image: ProgramImage) {
        self.cpu.reset();
        self.cpu.load_image(&image);
        self.image = image;
    }

    /// Step one instruction. Returns whether execution may continue.
    #[wasm_bindgen]
    pub fn step(&mut self) -> bool {
        self.cpu.step()
    }

    /// Run until halt or `max_instructions`. Returns instructions executed.
    #[wasm_bindgen]
    pub fn run(&mut self, max_instructions: u32) -> u32 {
        self.cpu.run(max_instructions as u64) as u32
    }

    /// Reset registers and reload the current program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.load_image(&self.image);
    }

    #[wasm_bindgen]
    pub fn tick_rtc(&mut self, delta_seconds: f64) {
        self.cpu.tick_rtc(delta_seconds);
    }

    #[wasm_bindgen]
    pub fn set_trace_enabled(&mut self, enabled: bool) {
        self.cpu.set_trace_enabled(enabled);
    }

    #[wasm_bindgen]
    pub fn clear_trace(&mut self) {
        self.cpu.clear_trace();
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Last diagnostic, or an empty string.
    #[wasm_bindgen]
    pub fn diagnostic(&self) -> String {
        self.cpu.diagnostic().unwrap_or_default().to_string()
    }

    /// Get memory cell value.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: usize) -> u32 {
        self.cpu.read_memory(addr)
    }

    /// Disassemble the memory cell at `addr`.
    #[wasm_bindgen]
    pub fn disassemble_at(&self, addr: usize) -> String {
        disassemble_word(self.cpu.read_memory(addr))
    }

    /// Get CPU state as JSON string.
    #[wasm_bindgen]
    pub fn state_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.get_state())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }

    /// Get the recorded trace as a JSON array.
    #[wasm_bindgen]
    pub fn trace_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.get_trace())
            .map_err(|e| JsError::new(&format!("{}", e)))
    }

    #[wasm_bindgen]
    pub fn rtc_ticks(&self) -> u64 {
        self.cpu.rtc_ticks()
    }
}

/// Names of the bundled example programs.
#[wasm_bindgen]
pub fn wasm_examples() -> Vec<String> {
    programs::all().into_iter().map(|p| p.name.to_string()).collect()
}

/// Disassemble a single word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u32) -> String {
    disassemble_word(word)
}
