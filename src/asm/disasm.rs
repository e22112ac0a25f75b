//! Disassembler for FSQ-7 programs.
//!
//! Converts instruction words back to the assembler's syntax.

use crate::cpu::decode::{decode, Opcode};
use crate::cpu::Memory;

/// Disassemble a single word to text.
pub fn disassemble_word(word: u32) -> String {
    let d = decode(word);
    let suffix = if d.indexed { ",X" } else { "" };

    match d.opcode() {
        Ok(Opcode::Hlt) if d.address == 0 && !d.indexed => "HLT".to_string(),
        Ok(Opcode::Txi) => {
            let (inc, limit) = d.txi_fields();
            format!("TXI {},{}{}", inc, limit, suffix)
        }
        Ok(op) => format!("{} {}{}", op, d.address, suffix),
        Err(_) => format!("??? 0x{:02X} {}{}", d.opcode, d.address, suffix),
    }
}

/// Disassemble a slice of words placed at `origin`.
pub fn disassemble(words: &[u32], origin: usize) -> String {
    let mut output = String::new();
    output.push_str("; FSQ-7 Disassembly\n");
    output.push_str("; -----------------\n\n");

    for (offset, word) in words.iter().enumerate() {
        output.push_str(&listing_line(origin + offset, *word));
        output.push('\n');
    }

    output
}

/// One listing line: address, mnemonic, raw word.
pub fn listing_line(addr: usize, word: u32) -> String {
    format!("{:05}: {:<16} ; {:08X}", addr, disassemble_word(word), word)
}

/// Disassemble `count` cells of memory starting at `start`.
pub fn disassemble_memory(mem: &Memory, start: usize, count: usize) -> Vec<(usize, String)> {
    mem.dump(start, count)
        .into_iter()
        .map(|(addr, word)| (addr, disassemble_word(word)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::decode::{encode, encode_op};

    #[test]
    fn test_disassemble_hlt() {
        assert_eq!(disassemble_word(0), "HLT");
    }

    #[test]
    fn test_disassemble_data_cells() {
        assert_eq!(disassemble_word(5), "HLT 5");
        assert_eq!(disassemble_word(encode_op(Opcode::Hlt, 0, true)), "HLT 0,X");

        let words = [5, 50, encode_op(Opcode::Hlt, 0, true)];
        let text: Vec<String> = words.iter().map(|w| disassemble_word(*w)).collect();
        let back = assemble(&text.join("\n")).unwrap();
        assert_eq!(back.segments[0].words, words);
    }

    #[test]
    fn test_disassemble_memory() {
        let mut mem = Memory::new(4);
        mem.load(&[encode_op(Opcode::Lda, 3, false), 0], 1);
        assert_eq!(
            disassemble_memory(&mem, 2, 10),
            vec![(2, "HLT".to_string()), (3, "HLT".to_string())]
        );
        assert_eq!(disassemble_memory(&mem, 0, 2)[1], (1, "LDA 3".to_string()));
    }

    #[test]
    fn test_disassemble_with_index() {
        let word = encode_op(Opcode::Lda, 100, true);
        assert_eq!(disassemble_word(word), "LDA 100,X");
        assert_eq!(disassemble_word(encode_op(Opcode::Sto, 7, false)), "STO 7");
    }

    #[test]
    fn test_disassemble_txi() {
        assert_eq!(disassemble_word(encode_op(Opcode::Txi, 0x0A00, false)), "TXI 10,0");
    }

    #[test]
    fn test_disassemble_unknown() {
        assert_eq!(disassemble_word(encode(0xAB, 3, false)), "??? 0xAB 3");
    }

    #[test]
    fn test_reassembles() {
        let source = "LDA 200\nADD 100,X\nSTO 200\nTIX 0\nTXI 3,4\nHLT";
        let image = assemble(source).unwrap();
        let words = &image.segments[0].words;
        let text: Vec<String> = words.iter().map(|w| disassemble_word(*w)).collect();
        let back = assemble(&text.join("\n")).unwrap();
        assert_eq!(&back.segments[0].words, words);
    }

    #[test]
    fn test_listing() {
        let listing = disassemble(&[encode_op(Opcode::Tra, 5, false)], 10);
        assert!(listing.contains("00010: TRA 5"));
        assert!(listing.contains("10000005"));
    }
}
