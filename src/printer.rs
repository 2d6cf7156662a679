//! Renders an `IrProgram` back to assembly text, in two flavors: "clean"
//! (re-assemblable source, no addresses) and "listing" (each line prefixed
//! with its address, for reading alongside a hex dump).
//!
//! Number formatting is grounded on
//! `original_source/chidasm8/src/utils.cc`'s `format_register`/
//! `format_byte`/`format_address`/`format_mnemonic` helpers; the `.DB`
//! byte-run rendering is grounded on
//! `original_source/chidasm8/src/data_bytes.h`'s `DataBytes::print`.

use std::collections::HashMap;

use crate::encoder;
use crate::ir::{IrElement, IrProgram, Operand};
use crate::opcode::{self, Opcode};

/// Whether rendered lines carry their address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Clean,
    Listing,
}

/// Render a whole program. `labels` maps addresses to synthesized label
/// names (from `disassembler::disassemble`); pass an empty map to print
/// bare addresses everywhere, as the assembler's own `EQU`/label names
/// aren't recoverable from an `IrProgram` alone.
pub fn print_program(program: &IrProgram, labels: &HashMap<u16, String>, mode: Mode) -> String {
    let mut out = String::new();

    for element in &program.elements {
        if let Some(name) = labels.get(&element.address()) {
            out.push_str(name);
            out.push_str(":\n");
        }

        let body = match element {
            IrElement::Instruction { opcode, operands, .. } => render_instruction(*opcode, operands, labels),
            IrElement::Data { bytes, .. } => render_data(bytes),
        };

        push_line(&mut out, mode, element, &body);
    }

    out
}

fn push_line(out: &mut String, mode: Mode, element: &IrElement, body: &str) {
    if mode == Mode::Listing {
        out.push_str(&format_address(element.address()));
        out.push('\t');
        out.push_str(&raw_bytes_column(element));
        out.push('\t');
    }
    out.push_str(body);
    out.push('\n');
}

/// The listing's raw-byte column: naked (no `0x`) hex digits for every
/// byte the element occupies, matching
/// `original_source/chidasm8/src/utils.cc`'s `format_naked_byte`. An
/// instruction's bytes are re-derived from its resolved operands since
/// `IrElement::Instruction` doesn't keep the encoded word around.
fn raw_bytes_column(element: &IrElement) -> String {
    match element {
        IrElement::Instruction { opcode, operands, .. } => match encoder::encode_instruction(*opcode, operands) {
            Ok(word) => format!("{:04X}", word),
            Err(_) => "????".to_string(),
        },
        IrElement::Data { bytes, .. } => bytes.iter().map(|b| format!("{:02X}", b)).collect(),
    }
}

pub fn format_register(reg: u8) -> String {
    format!("V{:X}", reg)
}

pub fn format_byte(byte: u8) -> String {
    format!("0x{:02X}", byte)
}

pub fn format_address(address: u16) -> String {
    format!("0x{:03X}", address)
}

pub fn format_nibble(nibble: u8) -> String {
    format!("0x{:X}", nibble)
}

fn format_mnemonic(mnemonic: &str) -> String {
    format!("{:<4}", mnemonic)
}

fn addr_text(address: u16, labels: &HashMap<u16, String>) -> String {
    labels.get(&address).cloned().unwrap_or_else(|| format_address(address))
}

fn render_data(bytes: &[u8]) -> String {
    let mut text = format_mnemonic(".DB");
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            text.push(' ');
        }
        text.push_str(&format_byte(*byte));
    }
    text
}

fn render_instruction(opcode: Opcode, operands: &[Operand], labels: &HashMap<u16, String>) -> String {
    let mnemonic = opcode::info(opcode).mnemonic;
    let operand_text = render_operands(opcode, operands, labels);

    if operand_text.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{}{}", format_mnemonic(mnemonic), operand_text)
    }
}

fn render_operands(opcode: Opcode, operands: &[Operand], labels: &HashMap<u16, String>) -> String {
    let addr = |op: &Operand| match op {
        Operand::Addr(a) => addr_text(*a, labels),
        _ => unreachable!("operand shape mismatch for {:?}", opcode),
    };
    let reg = |op: &Operand| match op {
        Operand::Reg(r) | Operand::Key(r) | Operand::RegCount(r) => format_register(*r),
        _ => unreachable!("operand shape mismatch for {:?}", opcode),
    };
    let imm = |op: &Operand| match op {
        Operand::Imm(v) => format_byte(*v),
        _ => unreachable!("operand shape mismatch for {:?}", opcode),
    };
    let nibble = |op: &Operand| match op {
        Operand::Nibble(v) => format_nibble(*v),
        _ => unreachable!("operand shape mismatch for {:?}", opcode),
    };

    match opcode {
        Opcode::Cls | Opcode::Ret => String::new(),
        Opcode::Sys | Opcode::Jp | Opcode::Call => addr(&operands[0]),
        Opcode::JpV0 => format!("V0, {}", addr(&operands[0])),
        Opcode::SeImm | Opcode::SneImm | Opcode::LdImm | Opcode::AddImm | Opcode::Rnd => {
            format!("{}, {}", reg(&operands[0]), imm(&operands[1]))
        }
        Opcode::SeReg
        | Opcode::LdReg
        | Opcode::Or
        | Opcode::And
        | Opcode::Xor
        | Opcode::AddReg
        | Opcode::Sub
        | Opcode::Shr
        | Opcode::Subn
        | Opcode::Shl
        | Opcode::SneReg => format!("{}, {}", reg(&operands[0]), reg(&operands[1])),
        Opcode::LdI => format!("I, {}", addr(&operands[0])),
        Opcode::Drw => format!("{}, {}, {}", reg(&operands[0]), reg(&operands[1]), nibble(&operands[2])),
        Opcode::Skp | Opcode::Sknp => reg(&operands[0]),
        Opcode::LdDt => format!("DT, {}", reg(&operands[0])),
        Opcode::LdSt => format!("ST, {}", reg(&operands[0])),
        Opcode::StDt => format!("{}, DT", reg(&operands[0])),
        Opcode::StKey => format!("{}, K", reg(&operands[0])),
        Opcode::AddI => format!("I, {}", reg(&operands[0])),
        Opcode::LdSprite => format!("F, {}", reg(&operands[0])),
        Opcode::Bcd => format!("B, {}", reg(&operands[0])),
        Opcode::StRegs => format!("[I], {}", reg(&operands[0])),
        Opcode::LdRegs => format!("{}, [I]", reg(&operands[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::SymbolTable;

    fn program_with(elements: Vec<IrElement>) -> IrProgram {
        IrProgram { origin: 0x200, elements, symbols: SymbolTable::new() }
    }

    #[test]
    fn formats_registers_bytes_and_addresses() {
        assert_eq!(format_register(0xA), "VA");
        assert_eq!(format_byte(0x07), "0x07");
        assert_eq!(format_address(0x2A), "0x02A");
    }

    #[test]
    fn clean_mode_omits_addresses() {
        let program = program_with(vec![IrElement::Instruction { address: 0x200, opcode: Opcode::Cls, operands: vec![] }]);
        let text = print_program(&program, &HashMap::new(), Mode::Clean);
        assert_eq!(text, "CLS\n");
    }

    #[test]
    fn listing_mode_prefixes_addresses() {
        let program = program_with(vec![IrElement::Instruction { address: 0x200, opcode: Opcode::Ret, operands: vec![] }]);
        let text = print_program(&program, &HashMap::new(), Mode::Listing);
        assert_eq!(text, "0x200\t00EE\tRET\n");
    }

    #[test]
    fn renders_ld_i_with_label_substitution() {
        let program = program_with(vec![IrElement::Instruction {
            address: 0x200,
            opcode: Opcode::LdI,
            operands: vec![Operand::Addr(0x210)],
        }]);
        let mut labels = HashMap::new();
        labels.insert(0x210, "DATA_0".to_string());
        let text = print_program(&program, &labels, Mode::Clean);
        assert_eq!(text, "LD  I, DATA_0\n");
    }

    #[test]
    fn renders_data_byte_run() {
        let program = program_with(vec![IrElement::Data { address: 0x200, bytes: vec![0x01, 0x02, 0xFF] }]);
        let text = print_program(&program, &HashMap::new(), Mode::Clean);
        assert_eq!(text, ".DB 0x01 0x02 0xFF\n");
    }

    #[test]
    fn label_definitions_are_printed_before_their_element() {
        let program = program_with(vec![IrElement::Instruction { address: 0x200, opcode: Opcode::Ret, operands: vec![] }]);
        let mut labels = HashMap::new();
        labels.insert(0x200, "FUNC_0".to_string());
        let text = print_program(&program, &labels, Mode::Clean);
        assert_eq!(text, "FUNC_0:\nRET\n");
    }

    #[test]
    fn renders_drw_with_nibble() {
        let program = program_with(vec![IrElement::Instruction {
            address: 0x200,
            opcode: Opcode::Drw,
            operands: vec![Operand::Reg(0), Operand::Reg(1), Operand::Nibble(5)],
        }]);
        let text = print_program(&program, &HashMap::new(), Mode::Clean);
        assert_eq!(text, "DRW V0, V1, 0x5\n");
    }
}
