//! Debugger application state and logic.

use crate::{Cpu, CpuConfig, ProgramImage};
use crate::asm::disasm::{disassemble_memory, disassemble_word};
use crossterm::event::KeyCode;
use std::collections::HashSet;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reloading on reset.
    pub image: ProgramImage,
    config: CpuConfig,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(image: ProgramImage, config: CpuConfig) -> Self {
        let mut cpu = Cpu::with_config(CpuConfig { trace_enabled: true, ..config });
        cpu.load_image(&image);
        let mem_scroll = image.segments.first().map_or(0, |s| s.start);

        Self {
            cpu,
            image,
            config,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into(),
            mem_scroll,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if self.cpu.is_halted() {
            self.status = self.halt_message();
            self.running = false;
            return;
        }

        let pc = self.cpu.get_state().program_counter;
        let word = self.cpu.read_memory(pc);
        if self.cpu.step() {
            self.status = format!("P={:05}: {}", pc, disassemble_word(word));
        } else {
            self.status = self.halt_message();
            self.running = false;
        }
    }

    fn halt_message(&self) -> String {
        match self.cpu.diagnostic() {
            Some(diag) => format!("Halted: {}", diag),
            None => format!("Halted after {} instructions", self.cpu.get_state().instruction_count),
        }
    }

    /// Run until halt or breakpoint.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if self.cpu.is_halted() {
            self.running = false;
            self.status = self.halt_message();
            return;
        }

        // Check for breakpoint
        let pc = self.cpu.get_state().program_counter;
        if self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at P={}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.get_state().program_counter;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at P={}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at P={}", pc);
        }
    }

    /// Reset CPU to initial state and reload the program.
    pub fn reset(&mut self) {
        self.cpu = Cpu::with_config(CpuConfig { trace_enabled: true, ..self.config });
        self.cpu.load_image(&self.image);
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    pub fn scroll_up(&mut self) {
        self.mem_scroll = self.mem_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if self.mem_scroll + 1 < self.cpu.memory_size() {
            self.mem_scroll += 1;
        }
    }

    /// Get disassembly around current PC.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let pc = self.cpu.get_state().program_counter;
        let start = pc.saturating_sub(lines / 2);

        disassemble_memory(self.cpu.memory(), start, lines)
            .into_iter()
            .map(|(addr, text)| (addr, text, addr == pc))
            .collect()
    }
}

/// Run the debugger with a program.
///
/// The terminal is restored even when drawing or input handling fails.
pub fn run_debugger(image: ProgramImage, config: CpuConfig) -> std::io::Result<()> {
    use crossterm::{
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;

    enable_raw_mode()?;
    if let Err(e) = stdout().execute(EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e);
    }

    let mut app = DebuggerApp::new(image, config);
    let result = Terminal::new(CrosstermBackend::new(stdout()))
        .and_then(|mut terminal| event_loop(&mut terminal, &mut app));

    let restored = disable_raw_mode().and(stdout().execute(LeaveAlternateScreen).map(|_| ()));
    result.and(restored)
}

fn event_loop<B: ratatui::backend::Backend>(
    terminal: &mut ratatui::Terminal<B>,
    app: &mut DebuggerApp,
) -> std::io::Result<()> {
    use crossterm::event::{self, Event, KeyEventKind};
    use std::time::Duration;

    while !app.should_quit {
        terminal.draw(|frame| super::ui::draw(frame, app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code);
                }
            }
        }

        if app.running {
            app.tick();
        }
    }
    Ok(())
}

fn handle_key(app: &mut DebuggerApp, code: KeyCode) {
    match code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('s') => {
            app.running = false;
            app.step();
        }
        KeyCode::Char('r') => app.run(),
        KeyCode::Char('p') => {
            app.running = false;
            app.status = "Paused.".into();
        }
        KeyCode::Char('b') => app.toggle_breakpoint(),
        KeyCode::Char('x') => app.reset(),
        KeyCode::Up => app.scroll_up(),
        KeyCode::Down => app.scroll_down(),
        _ => {}
    }
}
