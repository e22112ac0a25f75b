//! Bundled example programs.
//!
//! Each generator returns a ready-to-load image together with the memory
//! cells a correct run leaves behind. The index register has no load
//! instruction; programs prime it with `TXI n,0`, which adds `n` to the
//! zeroed register and falls through because `n > 0`.

use crate::asm::image::ProgramImage;
use crate::cpu::decode::{encode_op, Opcode};
use crate::cpu::Cpu;

/// Default instruction budget for running an example.
pub const EXAMPLE_BUDGET: u64 = 10_000;

/// A runnable demonstration program.
#[derive(Debug, Clone)]
pub struct ExampleProgram {
    pub name: &'static str,
    pub description: &'static str,
    pub image: ProgramImage,
    /// `(address, value)` pairs expected after the program halts.
    pub expected: Vec<(usize, u32)>,
}

/// A cell that did not hold its expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub address: usize,
    pub expected: u32,
    pub actual: u32,
}

impl ExampleProgram {
    /// Reset `cpu`, load the image and run until halt or `budget` instructions.
    pub fn run_on(&self, cpu: &mut Cpu, budget: u64) -> u64 {
        cpu.reset();
        cpu.load_image(&self.image);
        cpu.run(budget)
    }

    /// Run on a fresh CPU with the default memory size.
    pub fn execute(&self) -> Cpu {
        let mut cpu = Cpu::default();
        self.run_on(&mut cpu, EXAMPLE_BUDGET);
        cpu
    }

    /// Cells whose contents differ from `expected`.
    pub fn mismatches(&self, cpu: &Cpu) -> Vec<Mismatch> {
        self.expected
            .iter()
            .filter_map(|&(address, expected)| {
                let actual = cpu.read_memory(address);
                (actual != expected).then_some(Mismatch { address, expected, actual })
            })
            .collect()
    }
}

fn op(opcode: Opcode, addr: u32) -> u32 {
    encode_op(opcode, addr, false)
}

fn opx(opcode: Opcode, addr: u32) -> u32 {
    encode_op(opcode, addr, true)
}

/// TXI operand packing: `(increment << 8) | limit`.
fn txi(increment: u8, limit: u8) -> u32 {
    op(Opcode::Txi, ((increment as u32) << 8) | limit as u32)
}

/// Sum a ten-element array with indexed ADD and a TIX loop.
///
/// The loop starts with I equal to the array length, so it reads
/// `101..=110` instead of `100..=109`: it skips the first element and adds
/// the zero cell after the last. The stored sum is 270, not 275.
pub fn array_sum() -> ExampleProgram {
    const ARRAY: u32 = 100;
    const SUM: u32 = 200;

    let mut image = ProgramImage::from_words(
        0,
        vec![
            txi(10, 0),
            op(Opcode::Lda, SUM), // LOOP
            opx(Opcode::Add, ARRAY),
            op(Opcode::Sto, SUM),
            op(Opcode::Tix, 1),
            op(Opcode::Hlt, 0),
        ],
    );
    image.push(ARRAY as usize, (1..=10).map(|n| n * 5).collect());
    image.push(SUM as usize, vec![0]);

    ExampleProgram {
        name: "array-sum",
        description: "Indexed LDA/ADD/STO over [5, 10, .., 50] with TIX loop control",
        image,
        expected: vec![(SUM as usize, 270)],
    }
}

/// 7 × 6 by repeated addition.
pub fn multiply() -> ExampleProgram {
    let mut image = ProgramImage::from_words(
        0,
        vec![
            txi(6, 0),
            op(Opcode::Add, 200), // LOOP
            op(Opcode::Tix, 1),
            op(Opcode::Sto, 201),
            op(Opcode::Hlt, 0),
        ],
    );
    image.push(200, vec![7]);

    ExampleProgram {
        name: "multiply",
        description: "Multiply by repeated addition, counting down with TIX",
        image,
        expected: vec![(201, 42)],
    }
}

/// Square a number in a subroutine entered with TSX.
///
/// TSX leaves the return address in I, so the subroutine returns with an
/// indexed `TRA 0,X`.
pub fn subroutine() -> ExampleProgram {
    let mut image = ProgramImage::from_words(
        0,
        vec![
            op(Opcode::Lda, 200),
            op(Opcode::Tsx, 10),
            op(Opcode::Sto, 201),
            op(Opcode::Hlt, 0),
        ],
    );
    image.push(10, vec![op(Opcode::Mpy, 200), opx(Opcode::Tra, 0)]);
    image.push(200, vec![12]);

    ExampleProgram {
        name: "subroutine",
        description: "TSX call and indexed TRA return computing 12 squared",
        image,
        expected: vec![(201, 144)],
    }
}

/// Copy eight words from 100 to 120, last element first.
pub fn block_copy() -> ExampleProgram {
    let data = vec![3, 1, 4, 1, 5, 9, 2, 6];

    let mut image = ProgramImage::from_words(
        0,
        vec![
            txi(8, 0),
            opx(Opcode::Lda, 99), // LOOP
            opx(Opcode::Sto, 119),
            op(Opcode::Tix, 1),
            op(Opcode::Hlt, 0),
        ],
    );
    image.push(100, data.clone());

    let expected = data
        .into_iter()
        .enumerate()
        .map(|(offset, value)| (120 + offset, value))
        .collect();

    ExampleProgram {
        name: "block-copy",
        description: "Indexed LDA/STO pair moving an eight-word table",
        image,
        expected,
    }
}

/// Count I upward with TXI, adding 3 on each pass.
///
/// TXI transfers to its raw address field, so the loop body lives at
/// `(1 << 8) | 5 = 261`.
pub fn count_up() -> ExampleProgram {
    const BODY: usize = (1 << 8) | 5;

    let mut image = ProgramImage::from_words(
        0,
        vec![
            txi(1, 5),
            op(Opcode::Sto, 300),
            op(Opcode::Hlt, 0),
        ],
    );
    image.push(BODY, vec![op(Opcode::Add, 301), op(Opcode::Tra, 0)]);
    image.push(301, vec![3]);

    ExampleProgram {
        name: "count-up",
        description: "TXI incrementing I from 1 to 5 and branching to its packed address",
        image,
        expected: vec![(300, 15)],
    }
}

/// DVH with a zero divisor saturates; a normal division follows.
pub fn division() -> ExampleProgram {
    let mut image = ProgramImage::from_words(
        0,
        vec![
            op(Opcode::Lda, 200),
            op(Opcode::Dvh, 201),
            op(Opcode::Sto, 202),
            op(Opcode::Lda, 200),
            op(Opcode::Dvh, 203),
            op(Opcode::Sto, 204),
            op(Opcode::Hlt, 0),
        ],
    );
    image.push(200, vec![100, 0]);
    image.push(203, vec![7]);

    ExampleProgram {
        name: "division",
        description: "DVH by zero saturating to 0x7FFFFFFF, then 100 / 7",
        image,
        expected: vec![(202, 0x7FFF_FFFF), (204, 14)],
    }
}

/// Every bundled program.
pub fn all() -> Vec<ExampleProgram> {
    vec![
        array_sum(),
        multiply(),
        subroutine(),
        block_copy(),
        count_up(),
        division(),
    ]
}

/// Look up a bundled program by name.
pub fn by_name(name: &str) -> Option<ExampleProgram> {
    all().into_iter().find(|p| p.name.eq_ignore_ascii_case(name))
}
