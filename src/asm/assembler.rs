//! Simple assembler for FSQ-7 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LOOP:               ; Define a label
//!     LDA SUM         ; Load from label SUM
//!     ADD 100,X       ; Indexed: address 100 + I
//!     STO SUM
//!     TIX LOOP        ; I := I - 1, repeat while I > 0
//!     TXI 10,0        ; I := I + 10, transfer if I <= 0
//!     HLT
//!
//!     ORG 200         ; Start a new segment at 200
//! SUM: DAT 0          ; Define a data word
//!      DAT ARRAY+1    ; Labels with an offset are allowed anywhere
//! ```

use crate::asm::image::{ProgramImage, Segment};
use crate::cpu::decode::{encode_op, Opcode, ADDRESS_MASK};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<ProgramImage, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// What a forward reference patches once its label is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixupKind {
    /// The 16-bit address field of an instruction.
    Address,
    /// A whole data word.
    Data,
}

#[derive(Debug, Clone)]
struct Fixup {
    segment: usize,
    offset: usize,
    label: String,
    addend: i64,
    kind: FixupKind,
    line: usize,
}

/// An operand value: either known now or waiting for a label.
enum Value {
    Known(i64),
    Label { name: String, addend: i64 },
}

/// The assembler state.
struct Assembler {
    /// Current address (origin).
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Pending references, patched in pass 2.
    pending: Vec<Fixup>,
    /// Output segments.
    segments: Vec<Segment>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            segments: vec![Segment { start: 0, words: Vec::new() }],
        }
    }

    fn assemble(&mut self, source: &str) -> Result<ProgramImage, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        let segments = std::mem::take(&mut self.segments)
            .into_iter()
            .filter(|s| !s.words.is_empty())
            .collect();
        Ok(ProgramImage { segments })
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove inline comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !is_identifier(&label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            if self.symbols.insert(label.clone(), self.current_addr).is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("duplicate label '{}'", label),
                });
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, operand) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m.to_uppercase(), Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (line.to_uppercase(), None),
        };

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let op = operand.ok_or_else(|| syntax(line_num, "ORG requires address"))?;
                let addr = match self.parse_value(op, line_num)? {
                    Value::Known(v) => v,
                    Value::Label { .. } => return Err(syntax(line_num, "ORG requires a numeric address")),
                };
                if !(0..=ADDRESS_MASK as i64).contains(&addr) {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr });
                }
                self.current_addr = addr as usize;
                self.segments.push(Segment { start: self.current_addr, words: Vec::new() });
            }

            "DAT" | "DATA" => {
                let op = operand.ok_or_else(|| syntax(line_num, "DAT requires value"))?;
                match self.parse_value(op, line_num)? {
                    Value::Known(v) => {
                        if v < i32::MIN as i64 || v > u32::MAX as i64 {
                            return Err(AssemblerError::ValueOutOfRange { line: line_num, value: v });
                        }
                        self.emit(v as u32);
                    }
                    Value::Label { name, addend } => {
                        self.defer(name, addend, FixupKind::Data, line_num);
                        self.emit(0);
                    }
                }
            }

            // Instructions
            _ => {
                let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic {
                        line: line_num,
                        mnemonic: mnemonic.clone(),
                    }
                })?;
                self.emit_instruction(opcode, operand, line_num)?;
            }
        }

        Ok(())
    }

    fn emit_instruction(
        &mut self,
        opcode: Opcode,
        operand: Option<&str>,
        line_num: usize,
    ) -> Result<(), AssemblerError> {
        let Some(operand) = operand else {
            if opcode.takes_address() {
                return Err(syntax(line_num, &format!("{} requires an operand", opcode)));
            }
            self.emit(encode_op(opcode, 0, false));
            return Ok(());
        };

        // Check for index suffix: ,X
        let (body, indexed) = match operand.rsplit_once(',') {
            Some((head, tail)) if tail.trim().eq_ignore_ascii_case("X") => (head.trim(), true),
            _ => (operand, false),
        };

        if opcode == Opcode::Txi {
            let field = self.parse_txi_fields(body, line_num)?;
            self.emit(encode_op(opcode, field, indexed));
            return Ok(());
        }

        match self.parse_value(body, line_num)? {
            Value::Known(addr) => {
                check_address(addr, line_num)?;
                self.emit(encode_op(opcode, addr as u32, indexed));
            }
            Value::Label { name, addend } => {
                self.defer(name, addend, FixupKind::Address, line_num);
                self.emit(encode_op(opcode, 0, indexed));
            }
        }
        Ok(())
    }

    /// `inc,limit`, each 0-255, packed as `(inc << 8) | limit`.
    fn parse_txi_fields(&self, body: &str, line_num: usize) -> Result<u32, AssemblerError> {
        let (inc, limit) = body
            .split_once(',')
            .ok_or_else(|| syntax(line_num, "TXI requires increment,limit"))?;

        let byte = |text: &str| -> Result<u32, AssemblerError> {
            match self.parse_value(text, line_num)? {
                Value::Known(v) if (0..=0xFF).contains(&v) => Ok(v as u32),
                Value::Known(v) => Err(AssemblerError::ValueOutOfRange { line: line_num, value: v }),
                Value::Label { .. } => Err(syntax(line_num, "TXI fields must be numeric")),
            }
        };

        Ok((byte(inc)? << 8) | byte(limit)?)
    }

    fn parse_value(&self, operand: &str, line_num: usize) -> Result<Value, AssemblerError> {
        let operand = operand.trim();

        if let Some(v) = parse_number(operand) {
            return Ok(Value::Known(v));
        }

        // LABEL, LABEL+n or LABEL-n
        let (name, addend) = match operand.find(['+', '-']) {
            Some(idx) => {
                let n = parse_number(operand[idx + 1..].trim())
                    .ok_or_else(|| syntax(line_num, &format!("invalid offset in '{}'", operand)))?;
                let n = if operand.as_bytes()[idx] == b'-' { -n } else { n };
                (operand[..idx].trim(), n)
            }
            None => (operand, 0),
        };

        let name = name.to_uppercase();
        if !is_identifier(&name) {
            return Err(syntax(line_num, &format!("invalid operand '{}'", operand)));
        }
        Ok(Value::Label { name, addend })
    }

    fn defer(&mut self, label: String, addend: i64, kind: FixupKind, line: usize) {
        let segment = self.segments.len() - 1;
        let offset = self.segments[segment].words.len();
        self.pending.push(Fixup { segment, offset, label, addend, kind, line });
    }

    fn emit(&mut self, word: u32) {
        if let Some(segment) = self.segments.last_mut() {
            segment.words.push(word);
        }
        self.current_addr += 1;
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for fixup in &self.pending {
            let addr = self.symbols.get(&fixup.label).ok_or_else(|| {
                AssemblerError::UndefinedLabel {
                    line: fixup.line,
                    label: fixup.label.clone(),
                }
            })?;
            let value = *addr as i64 + fixup.addend;

            let word = &mut self.segments[fixup.segment].words[fixup.offset];
            match fixup.kind {
                FixupKind::Address => {
                    check_address(value, fixup.line)?;
                    *word = (*word & !ADDRESS_MASK) | value as u32;
                }
                FixupKind::Data => {
                    if value < 0 {
                        return Err(AssemblerError::ValueOutOfRange { line: fixup.line, value });
                    }
                    *word = value as u32;
                }
            }
        }
        Ok(())
    }
}

fn syntax(line: usize, message: &str) -> AssemblerError {
    AssemblerError::SyntaxError {
        line,
        message: message.to_string(),
    }
}

fn check_address(addr: i64, line: usize) -> Result<(), AssemblerError> {
    if (0..=ADDRESS_MASK as i64).contains(&addr) {
        Ok(())
    } else {
        Err(AssemblerError::ValueOutOfRange { line, value: addr })
    }
}

/// Decimal (optionally signed) or `0x` hex.
fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if negative { -value } else { value })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}
