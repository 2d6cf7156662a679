//! Lowers a resolved `IrProgram` into the flat binary image a CHIP-8
//! interpreter loads at its origin.
//!
//! Grounded on `original_source/chip8ir/src/ir/encoder.cc`'s
//! `encode_element`: each opcode's base pattern is OR'd with its operands
//! shifted into the nibble(s) the opcode table reserves for them. Gaps
//! between elements (from `.ORG` jumping the program counter forward) are
//! filled with zero bytes so the image has no holes.

use crate::error::Error;
use crate::ir::{IrElement, IrProgram, Operand};
use crate::opcode::{self, Opcode, OperandShape};

/// Encode a program into its binary image, starting at byte 0 of the
/// returned vector representing `program.origin`.
pub fn encode(program: &IrProgram) -> Result<Vec<u8>, Error> {
    let mut image = vec![0u8; (program.end() - program.origin) as usize];

    for element in &program.elements {
        let offset = (element.address() - program.origin) as usize;
        match element {
            IrElement::Instruction { opcode, operands, .. } => {
                let word = encode_instruction(*opcode, operands)?;
                image[offset] = (word >> 8) as u8;
                image[offset + 1] = (word & 0xFF) as u8;
            }
            IrElement::Data { bytes, .. } => {
                image[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
        }
    }

    Ok(image)
}

/// Encode a single instruction's opcode + operands into its 16-bit word.
/// Exposed crate-wide so the listing printer can render an instruction's
/// raw bytes without re-deriving the encoding rules.
pub(crate) fn encode_instruction(opcode: Opcode, operands: &[Operand]) -> Result<u16, Error> {
    let info = opcode::info(opcode);
    let word = match (info.shape, operands) {
        (OperandShape::None, []) => info.base,
        (OperandShape::Addr, [Operand::Addr(addr)]) => info.base | addr,
        (OperandShape::Reg, [Operand::Reg(reg)]) => info.base | ((*reg as u16) << 8),
        (OperandShape::Key, [Operand::Key(reg)]) => info.base | ((*reg as u16) << 8),
        (OperandShape::RegCount, [Operand::RegCount(reg)]) => info.base | ((*reg as u16) << 8),
        (OperandShape::RegImm, [Operand::Reg(reg), Operand::Imm(imm)]) => {
            info.base | ((*reg as u16) << 8) | (*imm as u16)
        }
        (OperandShape::RegReg, [Operand::Reg(r1), Operand::Reg(r2)]) => {
            info.base | ((*r1 as u16) << 8) | ((*r2 as u16) << 4)
        }
        (OperandShape::RegRegNibble, [Operand::Reg(r1), Operand::Reg(r2), Operand::Nibble(n)]) => {
            info.base | ((*r1 as u16) << 8) | ((*r2 as u16) << 4) | (*n as u16)
        }
        _ => {
            return Err(Error::InvalidOperandShape {
                line: 0,
                column: 0,
                mnemonic: info.mnemonic.to_string(),
            });
        }
    };
    Ok(word)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast;
    use crate::source;
    use crate::symbol_table;
    use crate::token;

    fn assemble(text: &str) -> Vec<u8> {
        let lines = source::load(text);
        let tokens = token::significant(&token::tokenize(&lines));
        let (elements, errors) = ast::parse(&tokens);
        assert!(errors.is_empty());
        let program = symbol_table::build_program(&elements, 0x200).unwrap();
        encode(&program).unwrap()
    }

    #[test]
    fn encodes_cls_and_ret() {
        assert_eq!(assemble("CLS\nRET\n"), vec![0x00, 0xE0, 0x00, 0xEE]);
    }

    #[test]
    fn encodes_ld_immediate_and_add() {
        assert_eq!(assemble("LD V3, 0x42\nADD V3, 0x01\n"), vec![0x63, 0x42, 0x73, 0x01]);
    }

    #[test]
    fn encodes_reg_reg_low_nibble_variants() {
        assert_eq!(assemble("OR V1, V2\n"), vec![0x81, 0x21]);
        assert_eq!(assemble("SHL V1, V2\n"), vec![0x81, 0x2E]);
    }

    #[test]
    fn encodes_jump_to_forward_label() {
        assert_eq!(assemble("JP there\nCLS\nthere:\nRET\n"), vec![0x12, 0x04, 0x00, 0xE0, 0x00, 0xEE]);
    }

    #[test]
    fn encodes_drw_with_nibble() {
        assert_eq!(assemble("DRW V0, V1, 5\n"), vec![0xD0, 0x15]);
    }

    #[test]
    fn fills_org_gaps_with_zero() {
        assert_eq!(assemble("CLS\n.ORG 0x204\nRET\n"), vec![0x00, 0xE0, 0x00, 0x00, 0x00, 0xEE]);
    }
}
