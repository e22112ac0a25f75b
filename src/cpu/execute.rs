//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//! Nothing here returns an error: every anomaly ends in the halted state or
//! a saturated accumulator.

use crate::arith::{self, as_signed, wrap32};
use crate::asm::image::ProgramImage;
use crate::cpu::decode::{decode, Decoded, Opcode, HALT_WORD};
use crate::cpu::memory::{Memory, DEFAULT_MEMORY_SIZE};
use crate::cpu::registers::Registers;
use crate::cpu::trace::{TraceEntry, TraceRecorder};
use log::{debug, info, warn};
use serde::{Serialize, Deserialize};

/// Real-time clock rate, in ticks per simulated second.
pub const RTC_HZ: f64 = 32.0;

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Number of memory cells.
    pub memory_size: usize,
    /// Record a trace entry per executed instruction.
    pub trace_enabled: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            trace_enabled: false,
        }
    }
}

/// Read-only register snapshot for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuState {
    pub accumulator: i32,
    pub index_register: i64,
    pub program_counter: usize,
    pub halted: bool,
    pub instruction_count: u64,
    pub cycle_count: u64,
}

/// The CPU: register file, memory and trace, driven by [`Cpu::step`].
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    regs: Registers,
    mem: Memory,
    trace: TraceRecorder,
    rtc_ticks: u64,
    /// Fraction of a tick carried between `tick_rtc` calls.
    rtc_residue: f64,
    /// Most recent diagnostic (unknown opcode, boundary halt).
    diagnostic: Option<String>,
}

/// Name used by callers that drive the core from a simulation loop.
pub type CpuCore = Cpu;

impl Cpu {
    /// Create a CPU with `memory_size` zeroed cells and zeroed registers.
    pub fn new(memory_size: usize) -> Self {
        Self::with_config(CpuConfig {
            memory_size,
            ..CpuConfig::default()
        })
    }

    pub fn with_config(config: CpuConfig) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(config.memory_size),
            trace: TraceRecorder::new(config.trace_enabled),
            rtc_ticks: 0,
            rtc_residue: 0.0,
            diagnostic: None,
        }
    }

    /// Zero registers, counters, the halted flag, the clock and the trace.
    /// Memory is left untouched.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.trace.clear();
        self.rtc_ticks = 0;
        self.rtc_residue = 0.0;
        self.diagnostic = None;
        info!("reset");
    }

    /// Copy `words` into memory at `start`. Registers and the halted flag
    /// are not touched. Returns the number of words stored.
    pub fn load_program(&mut self, words: &[u32], start: usize) -> usize {
        let stored = self.mem.load(words, start);
        info!("loaded {} words at {}", stored, start);
        stored
    }

    /// Load every segment of an image.
    pub fn load_image(&mut self, image: &ProgramImage) -> usize {
        image
            .segments
            .iter()
            .map(|seg| self.load_program(&seg.words, seg.start))
            .sum()
    }

    /// Execute a single instruction.
    ///
    /// Returns `false` once the CPU is halted, whether by this step or an
    /// earlier one.
    pub fn step(&mut self) -> bool {
        if self.regs.halted {
            return false;
        }

        // Fetch
        let pc = self.regs.p;
        let word = if pc >= self.mem.size() {
            self.regs.halted = true;
            self.report(format!("program counter {} reached end of memory", pc));
            HALT_WORD
        } else {
            self.regs.advance_pc();
            self.mem.read(pc)
        };

        // Decode and resolve against the pre-dispatch index register
        let decoded = decode(word);
        let ea = self.regs.effective_address(word);

        self.trace.record(TraceEntry {
            pc,
            word,
            decoded,
            effective_address: ea,
            accumulator: self.regs.a,
            index_register: self.regs.i,
        });

        // Dispatch
        match decoded.opcode() {
            Ok(op) => self.execute(op, decoded, ea),
            Err(e) => {
                self.regs.halted = true;
                self.report(format!("{} at {}", e, pc));
            }
        }

        self.regs.instructions += 1;
        self.regs.cycles += 1;

        !self.regs.halted
    }

    /// Step until halted or `max_instructions` have run.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, max_instructions: u64) -> u64 {
        let start = self.regs.instructions;

        let mut remaining = max_instructions;
        while remaining > 0 && self.step() {
            remaining -= 1;
        }

        self.regs.instructions - start
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, op: Opcode, decoded: Decoded, ea: u16) {
        let size = self.mem.size();

        match op {
            // ==================== Data Transfer ====================

            Opcode::Lda => {
                self.regs.a = as_signed(self.mem.read(ea as usize));
            }

            Opcode::Sto => {
                self.mem.write(ea as usize, self.regs.a as u32);
            }

            // ==================== Arithmetic ====================

            Opcode::Add => {
                self.regs.a = arith::add(self.regs.a, self.operand(ea));
            }

            Opcode::Sub => {
                self.regs.a = arith::subtract(self.regs.a, self.operand(ea));
            }

            Opcode::Mpy => {
                self.regs.a = arith::multiply(self.regs.a, self.operand(ea));
            }

            Opcode::Dvh => {
                self.regs.a = arith::divide(self.regs.a, self.operand(ea));
            }

            // ==================== Transfer of Control ====================

            Opcode::Tra => {
                self.regs.jump(ea, size);
            }

            Opcode::Tnz => {
                if self.regs.a != 0 {
                    self.regs.jump(ea, size);
                }
            }

            Opcode::Tmi => {
                if self.regs.a < 0 {
                    self.regs.jump(ea, size);
                }
            }

            Opcode::Tsx => {
                // P already points past the TSX
                self.regs.i = self.regs.p as i64;
                self.regs.jump(ea, size);
            }

            Opcode::Tix => {
                self.regs.i = wrap32(self.regs.i.wrapping_sub(1)) as i64;
                if self.regs.i > 0 {
                    self.regs.jump(ea, size);
                }
            }

            Opcode::Txi => {
                let (increment, limit) = decoded.txi_fields();
                self.regs.i = self.regs.i.wrapping_add(increment as i64);
                if self.regs.i <= limit as i64 {
                    self.regs.jump(ea, size);
                }
            }

            Opcode::Hlt => {
                self.regs.halted = true;
            }
        }

        debug!(
            "{} ea={} A={} I={} P={}",
            op, ea, self.regs.a, self.regs.i, self.regs.p
        );
    }

    /// Memory word at `ea` as a signed operand.
    fn operand(&self, ea: u16) -> i32 {
        as_signed(self.mem.read(ea as usize))
    }

    fn report(&mut self, message: String) {
        warn!("{}", message);
        self.diagnostic = Some(message);
    }

    /// Read a memory cell. Out-of-range reads return 0.
    pub fn read_memory(&self, addr: usize) -> u32 {
        self.mem.read(addr)
    }

    /// Write a memory cell. Out-of-range writes are ignored.
    pub fn write_memory(&mut self, addr: usize, value: u32) {
        self.mem.write(addr, value);
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn memory_size(&self) -> usize {
        self.mem.size()
    }

    /// Snapshot of the registers and counters.
    pub fn get_state(&self) -> CpuState {
        CpuState {
            accumulator: self.regs.a,
            index_register: self.regs.i,
            program_counter: self.regs.p,
            halted: self.regs.halted,
            instruction_count: self.regs.instructions,
            cycle_count: self.regs.cycles,
        }
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace.is_enabled()
    }

    pub fn set_trace_enabled(&mut self, enabled: bool) {
        self.trace.set_enabled(enabled);
    }

    /// A copy of the recorded trace.
    pub fn get_trace(&self) -> Vec<TraceEntry> {
        self.trace.snapshot()
    }

    /// The most recent `count` trace entries.
    pub fn recent_trace(&self, count: usize) -> &[TraceEntry] {
        self.trace.tail(count)
    }

    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Advance the real-time clock. Has no effect on execution.
    pub fn tick_rtc(&mut self, delta_seconds: f64) {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return;
        }
        let elapsed = self.rtc_residue + delta_seconds * RTC_HZ;
        let whole = elapsed.floor();
        self.rtc_ticks = self.rtc_ticks.saturating_add(whole as u64);
        self.rtc_residue = elapsed - whole;
    }

    pub fn rtc_ticks(&self) -> u64 {
        self.rtc_ticks
    }

    /// The last diagnostic emitted since reset.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        !self.regs.halted
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::with_config(CpuConfig::default())
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.get_state())
            .field("mem", &self.mem)
            .field("trace_entries", &self.trace.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, encode_op};
    use proptest::prelude::*;

    fn cpu_with(program: &[u32]) -> Cpu {
        let mut cpu = Cpu::new(256);
        cpu.load_program(program, 0);
        cpu
    }

    fn op(opcode: Opcode, addr: u32) -> u32 {
        encode_op(opcode, addr, false)
    }

    fn opx(opcode: Opcode, addr: u32) -> u32 {
        encode_op(opcode, addr, true)
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = cpu_with(&[op(Opcode::Hlt, 0)]);

        let executed = cpu.run(100);

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.get_state().program_counter, 1);
    }

    #[test]
    fn test_step_when_halted_is_noop() {
        let mut cpu = cpu_with(&[op(Opcode::Hlt, 0)]);
        assert!(!cpu.step());
        let before = cpu.get_state();
        assert!(!cpu.step());
        assert_eq!(cpu.get_state(), before);
    }

    #[test]
    fn test_cpu_load_store() {
        let mut cpu = cpu_with(&[op(Opcode::Lda, 100), op(Opcode::Sto, 101), op(Opcode::Hlt, 0)]);
        cpu.write_memory(100, 42);

        cpu.run(100);

        assert_eq!(cpu.get_state().accumulator, 42);
        assert_eq!(cpu.read_memory(101), 42);
    }

    #[test]
    fn test_cpu_arithmetic() {
        let mut cpu = cpu_with(&[
            op(Opcode::Lda, 100),
            op(Opcode::Add, 101),
            op(Opcode::Mpy, 102),
            op(Opcode::Sub, 103),
            op(Opcode::Dvh, 104),
            op(Opcode::Hlt, 0),
        ]);
        cpu.write_memory(100, 10);
        cpu.write_memory(101, 5);
        cpu.write_memory(102, 4);
        cpu.write_memory(103, (-3i32) as u32);
        cpu.write_memory(104, 9);

        cpu.run(100);

        // ((10 + 5) * 4 - -3) / 9
        assert_eq!(cpu.get_state().accumulator, 7);
    }

    #[test]
    fn test_add_overflow_wraps() {
        let mut cpu = cpu_with(&[op(Opcode::Lda, 100), op(Opcode::Add, 101), op(Opcode::Hlt, 0)]);
        cpu.write_memory(100, 0x7FFF_FFFF);
        cpu.write_memory(101, 1);

        cpu.run(100);

        assert_eq!(cpu.get_state().accumulator, i32::MIN);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_store_negative_masks_to_32_bits() {
        let mut cpu = cpu_with(&[op(Opcode::Lda, 100), op(Opcode::Sto, 101), op(Opcode::Hlt, 0)]);
        cpu.write_memory(100, 0xFFFF_FFFF);

        cpu.run(100);

        assert_eq!(cpu.get_state().accumulator, -1);
        assert_eq!(cpu.read_memory(101), 0xFFFF_FFFF);
    }

    #[test]
    fn test_divide_by_zero_saturates() {
        let mut cpu = cpu_with(&[op(Opcode::Lda, 100), op(Opcode::Dvh, 101), op(Opcode::Hlt, 0)]);
        cpu.write_memory(100, 12);

        assert!(cpu.step());
        assert!(cpu.step());
        assert_eq!(cpu.get_state().accumulator, 0x7FFF_FFFF);
        assert!(!cpu.is_halted());
        assert!(!cpu.step());
    }

    #[test]
    fn test_unknown_opcode_halts() {
        let mut cpu = cpu_with(&[encode(0xEE, 5, false), op(Opcode::Lda, 100)]);

        assert!(!cpu.step());
        assert!(cpu.is_halted());
        assert_eq!(cpu.get_state().instruction_count, 1);
        assert!(cpu.diagnostic().is_some_and(|d| d.contains("0xEE")));
        assert!(!cpu.step());
        assert_eq!(cpu.get_state().instruction_count, 1);
    }

    #[test]
    fn test_out_of_range_operands_are_ignored() {
        let mut cpu = Cpu::new(5);
        cpu.load_program(
            &[op(Opcode::Lda, 4), op(Opcode::Sto, 1000), op(Opcode::Lda, 1000), op(Opcode::Hlt, 0), 7],
            0,
        );

        assert!(cpu.step());
        assert_eq!(cpu.get_state().accumulator, 7);

        // STO past the end changes nothing and does not halt
        let before: Vec<u32> = (0..5).map(|a| cpu.read_memory(a)).collect();
        assert!(cpu.step());
        assert_eq!((0..5).map(|a| cpu.read_memory(a)).collect::<Vec<_>>(), before);

        // LDA past the end reads zero
        assert!(cpu.step());
        assert_eq!(cpu.get_state().accumulator, 0);
        assert!(cpu.diagnostic().is_none());

        assert!(!cpu.step());
        assert_eq!(cpu.get_state().instruction_count, 4);
    }

    #[test]
    fn test_halt_at_memory_boundary() {
        let mut cpu = Cpu::new(2);
        cpu.set_trace_enabled(true);
        cpu.load_program(&[op(Opcode::Lda, 0), op(Opcode::Add, 0)], 0);

        assert!(cpu.step());
        assert!(cpu.step());
        assert!(!cpu.step());

        let state = cpu.get_state();
        assert!(state.halted);
        assert_eq!(state.program_counter, 2);
        assert_eq!(state.instruction_count, 3);

        let trace = cpu.get_trace();
        assert_eq!(trace.len(), 3);
        assert_eq!(trace[2].pc, 2);
        assert_eq!(trace[2].word, HALT_WORD);
    }

    #[test]
    fn test_transfer_past_memory_clamps_pc() {
        let mut cpu = cpu_with(&[op(Opcode::Tra, 0x8000)]);

        assert!(cpu.step());
        assert_eq!(cpu.get_state().program_counter, 256);
        assert!(!cpu.step());
    }

    #[test]
    fn test_cpu_conditional_transfers() {
        let mut cpu = cpu_with(&[
            op(Opcode::Lda, 100),
            op(Opcode::Tnz, 3),
            op(Opcode::Hlt, 0), // skipped
            op(Opcode::Tmi, 6),
            op(Opcode::Lda, 101),
            op(Opcode::Tmi, 7),
            op(Opcode::Hlt, 0),
            op(Opcode::Hlt, 0),
        ]);
        cpu.write_memory(100, 1);
        cpu.write_memory(101, (-1i32) as u32);

        let executed = cpu.run(100);

        // LDA, TNZ, TMI (not taken), LDA, TMI (taken), HLT at 7
        assert_eq!(executed, 6);
        assert_eq!(cpu.get_state().program_counter, 8);
    }

    #[test]
    fn test_tnz_not_taken_on_zero() {
        let mut cpu = cpu_with(&[op(Opcode::Tnz, 5), op(Opcode::Hlt, 0)]);
        cpu.run(10);
        assert_eq!(cpu.get_state().program_counter, 2);
    }

    #[test]
    fn test_tsx_saves_return_address() {
        let mut cpu = cpu_with(&[
            op(Opcode::Tsx, 10),
            op(Opcode::Hlt, 0),
        ]);
        // Subroutine returns through the index register with an indexed TRA
        cpu.load_program(&[op(Opcode::Lda, 100), opx(Opcode::Tra, 0)], 10);
        cpu.write_memory(100, 77);

        cpu.run(100);

        let state = cpu.get_state();
        assert_eq!(state.index_register, 1);
        assert_eq!(state.accumulator, 77);
        assert_eq!(state.program_counter, 2);
        assert_eq!(state.instruction_count, 4);
    }

    #[test]
    fn test_tix_counts_down() {
        let mut cpu = cpu_with(&[op(Opcode::Txi, 0x0300), op(Opcode::Tix, 1), op(Opcode::Hlt, 0)]);

        cpu.run(100);

        // TXI, then TIX with I = 3, 2, 1 (taken, taken, not taken)
        let state = cpu.get_state();
        assert_eq!(state.index_register, 0);
        assert_eq!(state.instruction_count, 1 + 3 + 1);
    }

    #[test]
    fn test_tix_from_zero_wraps_negative_and_falls_through() {
        let mut cpu = cpu_with(&[op(Opcode::Tix, 0), op(Opcode::Hlt, 0)]);
        cpu.run(10);
        assert_eq!(cpu.get_state().index_register, -1);
        assert_eq!(cpu.get_state().instruction_count, 2);
    }

    #[test]
    fn test_txi_uses_raw_address_fields() {
        // inc = 2, limit = 6: taken while I <= 6, target is the raw field (0x0206)
        let mut cpu = Cpu::new(0x300);
        cpu.load_program(&[op(Opcode::Txi, 0x0206)], 0);
        cpu.load_program(&[op(Opcode::Tra, 0)], 0x0206);

        // I: 2, 4, 6 taken; 8 falls through to the HLT at 1
        cpu.run(100);

        let state = cpu.get_state();
        assert_eq!(state.index_register, 8);
        assert!(state.halted);
        assert_eq!(state.program_counter, 2);
    }

    #[test]
    fn test_indexed_addressing() {
        let mut cpu = cpu_with(&[op(Opcode::Txi, 0x0300), opx(Opcode::Lda, 100), op(Opcode::Hlt, 0)]);
        cpu.write_memory(103, 55);

        cpu.run(10);

        assert_eq!(cpu.get_state().accumulator, 55);
    }

    #[test]
    fn test_trace_captures_pre_dispatch_values() {
        let mut cpu = cpu_with(&[op(Opcode::Lda, 100), op(Opcode::Txi, 0x0100), opx(Opcode::Add, 100), op(Opcode::Hlt, 0)]);
        cpu.write_memory(100, 4);
        cpu.write_memory(101, 6);
        cpu.set_trace_enabled(true);

        cpu.run(10);

        let trace = cpu.get_trace();
        assert_eq!(trace.len(), 4);
        assert_eq!(trace[0].accumulator, 0);
        assert_eq!(trace[1].accumulator, 4);
        assert_eq!(trace[1].index_register, 0);
        assert_eq!(trace[2].pc, 2);
        assert!(trace[2].decoded.indexed);
        assert_eq!(trace[2].effective_address, 101);
        assert_eq!(trace[2].index_register, 1);
        assert_eq!(trace[3].accumulator, 10);

        cpu.clear_trace();
        assert!(cpu.get_trace().is_empty());
    }

    #[test]
    fn test_trace_disabled_by_default() {
        let mut cpu = cpu_with(&[op(Opcode::Hlt, 0)]);
        cpu.run(10);
        assert!(!cpu.trace_enabled());
        assert!(cpu.get_trace().is_empty());
    }

    #[test]
    fn test_reset_preserves_memory() {
        let mut cpu = cpu_with(&[op(Opcode::Lda, 100), op(Opcode::Hlt, 0)]);
        cpu.write_memory(100, 9);
        cpu.set_trace_enabled(true);
        cpu.run(10);
        cpu.tick_rtc(1.0);

        cpu.reset();

        assert_eq!(cpu.get_state(), CpuState::default());
        assert!(cpu.get_trace().is_empty());
        assert_eq!(cpu.rtc_ticks(), 0);
        assert_eq!(cpu.read_memory(100), 9);
        assert_eq!(cpu.read_memory(0), op(Opcode::Lda, 100));
    }

    #[test]
    fn test_load_does_not_reset_registers() {
        let mut cpu = cpu_with(&[op(Opcode::Hlt, 0)]);
        cpu.run(10);
        cpu.load_program(&[op(Opcode::Lda, 100), op(Opcode::Hlt, 0)], 0);
        assert!(cpu.is_halted());
        assert_eq!(cpu.get_state().program_counter, 1);

        cpu.write_memory(100, 3);
        cpu.reset();
        cpu.run(10);
        assert_eq!(cpu.get_state().accumulator, 3);
    }

    #[test]
    fn test_run_respects_limit() {
        // TRA 0: infinite loop
        let mut cpu = cpu_with(&[op(Opcode::Tra, 0)]);
        assert_eq!(cpu.run(50), 50);
        assert!(cpu.is_running());
        assert_eq!(cpu.get_state().cycle_count, 50);
        assert_eq!(cpu.run(0), 0);
    }

    #[test]
    fn test_tick_rtc() {
        let mut cpu = Cpu::new(4);
        cpu.tick_rtc(0.5);
        assert_eq!(cpu.rtc_ticks(), 16);
        cpu.tick_rtc(1.0 / 64.0);
        cpu.tick_rtc(1.0 / 64.0);
        assert_eq!(cpu.rtc_ticks(), 17);
        cpu.tick_rtc(-1.0);
        cpu.tick_rtc(f64::NAN);
        assert_eq!(cpu.rtc_ticks(), 17);
        assert_eq!(cpu.get_state().instruction_count, 0);
    }

    #[test]
    fn test_zero_sized_memory_halts_immediately() {
        let mut cpu = Cpu::new(0);
        assert!(!cpu.step());
        assert_eq!(cpu.read_memory(0), 0);
    }

    proptest! {
        #[test]
        fn step_returns_not_halted(words in prop::collection::vec(any::<u32>(), 1..64)) {
            let mut cpu = Cpu::new(64);
            cpu.load_program(&words, 0);
            for _ in 0..200 {
                let cont = cpu.step();
                prop_assert_eq!(cont, !cpu.is_halted());
            }
        }

        #[test]
        fn engine_never_panics(words in prop::collection::vec(any::<u32>(), 1..256), size in 0usize..300) {
            let mut cpu = Cpu::new(size);
            cpu.set_trace_enabled(true);
            cpu.load_program(&words, 0);
            let executed = cpu.run(1000);
            prop_assert!(executed <= 1000);
            prop_assert!(cpu.get_state().program_counter <= size);
            prop_assert_eq!(cpu.get_trace().len() as u64, cpu.get_state().instruction_count);
        }
    }
}
