//! FSQ-7 Emulator - CLI Entry Point
//!
//! Commands:
//! - `fsq7-emu run <program>` - Run a JSON image or ASM file
//! - `fsq7-emu debug <program>` - Interactive debugger
//! - `fsq7-emu asm <source>` - Assemble to a JSON image
//! - `fsq7-emu disasm <image>` - Disassemble a JSON image
//! - `fsq7-emu demo [name]` - Run the bundled example programs
//! - `fsq7-emu test` - Built-in self-test

use clap::{Parser, Subcommand};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fsq7-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of the AN/FSQ-7 (1958) instruction core")]
struct Cli {
    /// Number of memory cells
    #[arg(long, global = true, default_value = "65536")]
    memory_size: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the JSON image or ASM file to execute
        program: String,
        /// Maximum number of instructions to run
        #[arg(short, long, default_value = "10000")]
        max_instructions: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the JSON image or ASM file to debug
        program: String,
    },
    /// Assemble source to a JSON image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a JSON image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
    /// Run bundled example programs and check their results
    Demo {
        /// Name of a single example (default: all)
        name: Option<String>,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = fsq7::CpuConfig {
        memory_size: cli.memory_size,
        ..fsq7::CpuConfig::default()
    };

    match cli.command {
        Some(Commands::Run { program, max_instructions, trace, json }) => {
            run_program(&program, config, max_instructions, trace, json);
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program, config);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Demo { name }) => {
            run_demo(name.as_deref(), config);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("FSQ-7 Emulator v0.1.0");
            println!("An AN/FSQ-7 instruction core emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            run_demo(Some("array-sum"), config);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("❌ Failed to initialize logging: {}", e);
    }
}

fn fail(message: String) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

/// Load a program (either JSON image or ASM source).
fn load_program(path: &str) -> fsq7::ProgramImage {
    use fsq7::{assemble, load_image};

    let image = if path.ends_with(".asm") {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));

        let image = assemble(&source)
            .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));
        println!("📝 Assembled {} words", image.len());
        image
    } else {
        let image = load_image(path)
            .unwrap_or_else(|e| fail(format!("Failed to load image: {}", e)));
        println!("📂 Loaded {} words", image.len());
        image
    };

    if image.is_empty() {
        fail("No instructions to execute".into());
    }
    image
}

fn run_program(path: &str, config: fsq7::CpuConfig, max_instructions: u64, trace: bool, json: bool) {
    use fsq7::Cpu;
    use fsq7::asm::disasm::disassemble_word;

    println!("🔧 Running: {}", path);
    let image = load_program(path);

    let mut cpu = Cpu::with_config(fsq7::CpuConfig { trace_enabled: trace, ..config });
    cpu.load_image(&image);

    println!();
    println!("━━━ Execution ━━━");

    let executed = cpu.run(max_instructions);

    if trace {
        for entry in cpu.get_trace() {
            println!(
                "{:05}: {:<14} ea={:05} A={} I={}",
                entry.pc,
                disassemble_word(entry.word),
                entry.effective_address,
                entry.accumulator,
                entry.index_register
            );
        }
    }

    let state = cpu.get_state();

    println!();
    println!("━━━ Result ━━━");
    if json {
        match serde_json::to_string_pretty(&state) {
            Ok(text) => println!("{}", text),
            Err(e) => fail(format!("Failed to encode state: {}", e)),
        }
    } else {
        println!("Instructions: {}", executed);
        println!("State: {}", if state.halted { "HALTED" } else { "RUNNING" });
        println!("A (accumulator): {} (0x{:08X})", state.accumulator, state.accumulator as u32);
        println!("I (index):       {}", state.index_register);
        println!("P (counter):     {}", state.program_counter);
    }
    if let Some(diag) = cpu.diagnostic() {
        println!("Diagnostic: {}", diag);
    }

    if !state.halted {
        println!();
        println!("⚠️  Reached instruction limit ({}). Use --max-instructions to increase.", max_instructions);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: fsq7::CpuConfig) {
    use fsq7::tui::run_debugger;

    println!("🔍 Loading: {}", path);
    let image = load_program(path);

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(image, config) {
        fail(format!("Debugger error: {}", e));
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str, _config: fsq7::CpuConfig) {
    fail("Debugger not available: built without the `tui` feature".into());
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use fsq7::{assemble, save_image};

    let out_path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output_path(source_path));
    if out_path == Path::new(source_path) {
        fail(format!("Refusing to overwrite source {}; pass --output", source_path));
    }
    let out_path = out_path.display().to_string();

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail(format!("Failed to read file: {}", e)));

    let image = assemble(&source)
        .unwrap_or_else(|e| fail(format!("Assembly error: {}", e)));

    println!("✓ Assembled {} words in {} segments", image.len(), image.segments.len());

    if let Err(e) = save_image(&out_path, &image) {
        fail(format!("Failed to save image: {}", e));
    }

    println!("✓ Saved to {}", out_path);
}

/// Image path used when `asm` gets no `--output`: the source with a `.json` extension.
fn default_output_path(source_path: &str) -> PathBuf {
    Path::new(source_path).with_extension("json")
}

fn disassemble_file(image_path: &str) {
    use fsq7::{load_image, disassemble};

    println!("📖 Disassembling: {}", image_path);
    println!();

    let image = load_image(image_path)
        .unwrap_or_else(|e| fail(format!("Failed to load image: {}", e)));

    for segment in &image.segments {
        println!("{}", disassemble(&segment.words, segment.start));
    }
}

fn run_demo(name: Option<&str>, config: fsq7::CpuConfig) {
    use fsq7::{programs, Cpu};

    let selected = match name {
        Some(name) => match programs::by_name(name) {
            Some(program) => vec![program],
            None => fail(format!("No example named '{}'", name)),
        },
        None => programs::all(),
    };

    println!("━━━ Example Programs ━━━");
    println!();

    let mut cpu = Cpu::with_config(config);
    let mut failed = 0;

    for program in &selected {
        let executed = program.run_on(&mut cpu, programs::EXAMPLE_BUDGET);
        let mismatches = program.mismatches(&cpu);

        println!("{} - {}", program.name, program.description);
        println!("  {} instructions, A = {}", executed, cpu.get_state().accumulator);
        if mismatches.is_empty() {
            println!("  ✓ results match");
        } else {
            failed += 1;
            for m in mismatches {
                println!("  ✗ [{}] = {} (expected {})", m.address, m.actual, m.expected);
            }
        }
        println!();
    }

    if failed > 0 {
        std::process::exit(1);
    }
}

fn run_self_test() {
    use fsq7::{Cpu, wrap32};
    use fsq7::cpu::{decode, encode, encode_op, resolve, Opcode};

    println!("━━━ FSQ-7 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    // Test 1: Codec round-trip
    let ok = [0x00u8, 0x03, 0x15, 0xFF].iter().all(|&op| {
        [0u32, 1, 0xFFFF, 0x1_2345].iter().all(|&addr| {
            [false, true].iter().all(|&idx| {
                let d = decode(encode(op, addr, idx));
                d.opcode == op && d.address as u32 == addr & 0xFFFF && d.indexed == idx
            })
        })
    });
    check("Instruction codec round-trip", ok);

    // Test 2: Indexed addressing wraps modulo 65536
    let word = encode_op(Opcode::Lda, 0xFFF0, true);
    check(
        "Indexed address wraparound",
        resolve(word, 0x20) == 0x10 && resolve(word, -0xFFF1) == 0xFFFF,
    );

    // Test 3: 32-bit wraparound
    check(
        "32-bit wraparound",
        wrap32(0xFFFF_FFFF) == -1 && wrap32(0x7FFF_FFFF + 1) == i32::MIN,
    );

    // Test 4: Division by zero saturates
    let mut cpu = Cpu::new(16);
    cpu.load_program(&[encode_op(Opcode::Lda, 10, false), encode_op(Opcode::Dvh, 11, false)], 0);
    cpu.write_memory(10, 5);
    cpu.run(2);
    check(
        "DVH by zero saturates",
        cpu.get_state().accumulator == 0x7FFF_FFFF && cpu.is_running(),
    );

    // Test 5: Unknown opcode halts
    let mut cpu = Cpu::new(16);
    cpu.load_program(&[encode(0xFF, 0, false)], 0);
    check("Unknown opcode halts", !cpu.step() && cpu.is_halted());

    // Test 6: Array sum example
    let cpu = fsq7::programs::array_sum().execute();
    check("Array sum example stores 270", cpu.read_memory(200) == 270);

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
