//! Two-pass address resolution: labels and `EQU` constants on one side,
//! instruction/directive encoding on the other.
//!
//! Pass 1 walks the AST once, assigning every label its program counter and
//! evaluating every `EQU` immediately (so later lines can reference earlier
//! constants, but not the reverse — see DESIGN.md). `.ORG` is evaluated here
//! too, which means its argument can only reference symbols already visible
//! at that point in the file. Pass 2 re-walks the same elements with the
//! now-complete symbol table and lowers instructions and `.DB`/`.DW`
//! directives into `IrElement`s, so forward references inside instruction
//! operands and data directives resolve correctly.
//!
//! Symbol resolution fails fast on the first error, unlike the lexer and
//! parser, which collect as many diagnostics as they can.

use std::collections::HashMap;

use crate::ast::{AstElement, BinaryOp, ElementBody, Expr, ExprKind};
use crate::error::Error;
use crate::ir::{IrElement, IrProgram, Operand};
use crate::opcode::Opcode;

/// Whether a symbol came from a label (`:`) or an `EQU`/`=` definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Label,
    Equ,
}

/// One named value in the symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub value: u16,
    pub kind: SymbolKind,
}

/// Labels and `EQU` constants, keyed by their (already upper-cased) name
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable { symbols: HashMap::new() }
    }

    /// Define a symbol, failing if the name is already taken. Lookups are
    /// case-insensitive in practice because the lexer upper-cases every
    /// identifier and label before it ever reaches here.
    pub fn define(
        &mut self,
        name: String,
        value: u16,
        kind: SymbolKind,
        line: usize,
        column: usize,
    ) -> Result<(), Error> {
        if self.symbols.contains_key(&name) {
            return Err(Error::Symbol {
                line,
                column,
                message: format!("symbol \"{}\" is already defined", name),
            });
        }
        self.symbols.insert(name.clone(), Symbol { name, value, kind });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }
}

/// Run both passes and produce a complete `IrProgram`, or the first error
/// encountered.
pub fn build_program(elements: &[AstElement], origin: u16) -> Result<IrProgram, Error> {
    let mut symbols = SymbolTable::new();
    let addresses = pass_one(elements, origin, &mut symbols)?;

    let mut program = IrProgram::new(origin, symbols);
    pass_two(elements, &addresses, &mut program)?;
    Ok(program)
}

fn pass_one(elements: &[AstElement], origin: u16, symbols: &mut SymbolTable) -> Result<Vec<u16>, Error> {
    let mut pc = origin;
    let mut addresses = Vec::with_capacity(elements.len());

    for element in elements {
        addresses.push(pc);

        if let Some(label) = &element.label {
            symbols.define(label.clone(), pc, SymbolKind::Label, element.line, 1)?;
        }

        match &element.body {
            None => {}
            Some(ElementBody::Equ { name, value }) => {
                let resolved = evaluate(value, element.line, symbols)?;
                let resolved = expect_addr(resolved, element.line, value.column)?;
                symbols.define(name.clone(), resolved, SymbolKind::Equ, element.line, 1)?;
            }
            Some(ElementBody::Instruction { .. }) => pc += 2,
            Some(ElementBody::Directive { name, args }) => match name.as_str() {
                ".ORG" => {
                    let arg = args.get(0).ok_or_else(|| Error::InvalidOperandShape {
                        line: element.line,
                        column: 1,
                        mnemonic: name.clone(),
                    })?;
                    let resolved = evaluate(arg, element.line, symbols)?;
                    pc = expect_addr(resolved, element.line, arg.column)?;
                }
                ".DB" => pc += args.len() as u16,
                ".DW" => pc += args.len() as u16 * 2,
                _ => {}
            },
        }
    }

    Ok(addresses)
}

fn pass_two(elements: &[AstElement], addresses: &[u16], program: &mut IrProgram) -> Result<(), Error> {
    for (element, &address) in elements.iter().zip(addresses) {
        match &element.body {
            None | Some(ElementBody::Equ { .. }) => {}
            Some(ElementBody::Instruction { mnemonic, operands }) => {
                let (opcode, resolved) =
                    resolve_instruction(mnemonic, operands, element.line, &program.symbols)?;
                program.elements.push(IrElement::Instruction { address, opcode, operands: resolved });
            }
            Some(ElementBody::Directive { name, args }) => match name.as_str() {
                ".DB" => {
                    let mut bytes = Vec::with_capacity(args.len());
                    for arg in args {
                        let value = evaluate(arg, element.line, &program.symbols)?;
                        bytes.push(expect_byte(value, element.line, arg.column)?);
                    }
                    program.elements.push(IrElement::Data { address, bytes });
                }
                ".DW" => {
                    let mut bytes = Vec::with_capacity(args.len() * 2);
                    for arg in args {
                        let value = evaluate(arg, element.line, &program.symbols)?;
                        let word = expect_word(value, element.line, arg.column)?;
                        bytes.push((word >> 8) as u8);
                        bytes.push((word & 0xFF) as u8);
                    }
                    program.elements.push(IrElement::Data { address, bytes });
                }
                ".ORG" => {}
                _ => {
                    return Err(Error::Parse {
                        line: element.line,
                        column: 1,
                        message: format!("unknown directive \"{}\"", name),
                    });
                }
            },
        }
    }

    Ok(())
}

fn evaluate(expr: &Expr, line: usize, symbols: &SymbolTable) -> Result<i64, Error> {
    match &expr.kind {
        ExprKind::Number(n) => Ok(*n as i64),
        ExprKind::Identifier(name) => symbols
            .lookup(name)
            .map(|s| s.value as i64)
            .ok_or_else(|| Error::Symbol {
                line,
                column: expr.column,
                message: format!("undefined symbol \"{}\"", name),
            }),
        ExprKind::Binary { op, lhs, rhs } => {
            let l = evaluate(lhs, line, symbols)?;
            let r = evaluate(rhs, line, symbols)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    if r == 0 {
                        Err(Error::Symbol { line, column: expr.column, message: "division by zero".to_string() })
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
    }
}

fn expect_addr(value: i64, line: usize, column: usize) -> Result<u16, Error> {
    if (0..=0x0FFF).contains(&value) {
        Ok(value as u16)
    } else {
        Err(Error::Range { line, column, value, max_bits: 12 })
    }
}

/// `SYS nnn` addresses only the range RCA 1802 routines could occupy below
/// the CHIP-8 interpreter itself (`0x000..=0x1FF`), a narrower slot than
/// the general 12-bit address operand every other `Addr`-shaped opcode
/// accepts.
fn expect_sys_addr(value: i64, line: usize, column: usize) -> Result<u16, Error> {
    if (0..=0x01FF).contains(&value) {
        Ok(value as u16)
    } else {
        Err(Error::Range { line, column, value, max_bits: 9 })
    }
}

fn expect_byte(value: i64, line: usize, column: usize) -> Result<u8, Error> {
    if (0..=0xFF).contains(&value) {
        Ok(value as u8)
    } else {
        Err(Error::Range { line, column, value, max_bits: 8 })
    }
}

fn expect_word(value: i64, line: usize, column: usize) -> Result<u16, Error> {
    if (0..=0xFFFF).contains(&value) {
        Ok(value as u16)
    } else {
        Err(Error::Range { line, column, value, max_bits: 16 })
    }
}

fn expect_nibble(value: i64, line: usize, column: usize) -> Result<u8, Error> {
    if (0..=0x0F).contains(&value) {
        Ok(value as u8)
    } else {
        Err(Error::Range { line, column, value, max_bits: 4 })
    }
}

/// Parse a register operand name (`V0`..`VF`) into its nibble value
fn register_number(name: &str) -> Option<u8> {
    if name.len() == 2 && name.as_bytes()[0] == b'V' {
        name.as_bytes()[1].is_ascii_hexdigit().then(|| ())?;
        u8::from_str_radix(&name[1..], 16).ok()
    } else {
        None
    }
}

fn try_register(expr: &Expr) -> Option<u8> {
    match &expr.kind {
        ExprKind::Identifier(name) => register_number(name),
        _ => None,
    }
}

fn is_keyword(expr: &Expr, keyword: &str) -> bool {
    matches!(&expr.kind, ExprKind::Identifier(name) if name == keyword)
}

fn require_operand<'a>(
    operands: &'a [Expr],
    index: usize,
    mnemonic: &str,
    line: usize,
) -> Result<&'a Expr, Error> {
    operands.get(index).ok_or_else(|| Error::InvalidOperandShape {
        line,
        column: 1,
        mnemonic: mnemonic.to_string(),
    })
}

fn shape_error(mnemonic: &str, line: usize) -> Error {
    Error::InvalidOperandShape { line, column: 1, mnemonic: mnemonic.to_string() }
}

fn require_register(expr: &Expr, mnemonic: &str, line: usize) -> Result<u8, Error> {
    try_register(expr).ok_or_else(|| shape_error(mnemonic, line))
}

/// Dispatch a parsed `mnemonic` plus its raw operand expressions to the
/// concrete `Opcode` it encodes, resolving register/keyword operands
/// structurally and evaluating everything else against `symbols`.
fn resolve_instruction(
    mnemonic: &str,
    operands: &[Expr],
    line: usize,
    symbols: &SymbolTable,
) -> Result<(Opcode, Vec<Operand>), Error> {
    match mnemonic {
        "CLS" => Ok((Opcode::Cls, vec![])),
        "RET" => Ok((Opcode::Ret, vec![])),
        "SYS" => {
            let addr = require_operand(operands, 0, mnemonic, line)?;
            let value = evaluate(addr, line, symbols)?;
            Ok((Opcode::Sys, vec![Operand::Addr(expect_sys_addr(value, line, addr.column)?)]))
        }
        "CALL" => {
            let addr = require_operand(operands, 0, mnemonic, line)?;
            let value = evaluate(addr, line, symbols)?;
            Ok((Opcode::Call, vec![Operand::Addr(expect_addr(value, line, addr.column)?)]))
        }
        "JP" => {
            if operands.len() == 1 {
                let addr = &operands[0];
                let value = evaluate(addr, line, symbols)?;
                Ok((Opcode::Jp, vec![Operand::Addr(expect_addr(value, line, addr.column)?)]))
            } else if operands.len() == 2 && try_register(&operands[0]) == Some(0) {
                let addr = &operands[1];
                let value = evaluate(addr, line, symbols)?;
                Ok((Opcode::JpV0, vec![Operand::Addr(expect_addr(value, line, addr.column)?)]))
            } else {
                Err(shape_error(mnemonic, line))
            }
        }
        "SE" | "SNE" => {
            let reg_expr = require_operand(operands, 0, mnemonic, line)?;
            let reg = require_register(reg_expr, mnemonic, line)?;
            let rhs = require_operand(operands, 1, mnemonic, line)?;

            if let Some(reg2) = try_register(rhs) {
                let opcode = if mnemonic == "SE" { Opcode::SeReg } else { Opcode::SneReg };
                Ok((opcode, vec![Operand::Reg(reg), Operand::Reg(reg2)]))
            } else {
                let value = evaluate(rhs, line, symbols)?;
                let imm = expect_byte(value, line, rhs.column)?;
                let opcode = if mnemonic == "SE" { Opcode::SeImm } else { Opcode::SneImm };
                Ok((opcode, vec![Operand::Reg(reg), Operand::Imm(imm)]))
            }
        }
        "LD" => resolve_ld(operands, line, symbols),
        "ADD" => resolve_add(operands, line, symbols),
        "OR" | "AND" | "XOR" | "SUB" | "SHR" | "SUBN" | "SHL" => {
            let reg1 = require_register(require_operand(operands, 0, mnemonic, line)?, mnemonic, line)?;
            let reg2 = require_register(require_operand(operands, 1, mnemonic, line)?, mnemonic, line)?;
            let opcode = match mnemonic {
                "OR" => Opcode::Or,
                "AND" => Opcode::And,
                "XOR" => Opcode::Xor,
                "SUB" => Opcode::Sub,
                "SHR" => Opcode::Shr,
                "SUBN" => Opcode::Subn,
                "SHL" => Opcode::Shl,
                _ => unreachable!(),
            };
            Ok((opcode, vec![Operand::Reg(reg1), Operand::Reg(reg2)]))
        }
        "RND" => {
            let reg = require_register(require_operand(operands, 0, mnemonic, line)?, mnemonic, line)?;
            let imm_expr = require_operand(operands, 1, mnemonic, line)?;
            let value = evaluate(imm_expr, line, symbols)?;
            let imm = expect_byte(value, line, imm_expr.column)?;
            Ok((Opcode::Rnd, vec![Operand::Reg(reg), Operand::Imm(imm)]))
        }
        "DRW" => {
            let reg1 = require_register(require_operand(operands, 0, mnemonic, line)?, mnemonic, line)?;
            let reg2 = require_register(require_operand(operands, 1, mnemonic, line)?, mnemonic, line)?;
            let nibble_expr = require_operand(operands, 2, mnemonic, line)?;
            let value = evaluate(nibble_expr, line, symbols)?;
            let nibble = expect_nibble(value, line, nibble_expr.column)?;
            Ok((Opcode::Drw, vec![Operand::Reg(reg1), Operand::Reg(reg2), Operand::Nibble(nibble)]))
        }
        "SKP" => {
            let reg = require_register(require_operand(operands, 0, mnemonic, line)?, mnemonic, line)?;
            Ok((Opcode::Skp, vec![Operand::Key(reg)]))
        }
        "SKNP" => {
            let reg = require_register(require_operand(operands, 0, mnemonic, line)?, mnemonic, line)?;
            Ok((Opcode::Sknp, vec![Operand::Key(reg)]))
        }
        _ => Err(Error::Parse { line, column: 1, message: format!("unknown mnemonic \"{}\"", mnemonic) }),
    }
}

fn resolve_ld(operands: &[Expr], line: usize, symbols: &SymbolTable) -> Result<(Opcode, Vec<Operand>), Error> {
    let first = require_operand(operands, 0, "LD", line)?;

    if is_keyword(first, "I") {
        let addr = require_operand(operands, 1, "LD", line)?;
        let value = evaluate(addr, line, symbols)?;
        return Ok((Opcode::LdI, vec![Operand::Addr(expect_addr(value, line, addr.column)?)]));
    }
    if is_keyword(first, "DT") {
        let reg = require_register(require_operand(operands, 1, "LD", line)?, "LD", line)?;
        return Ok((Opcode::LdDt, vec![Operand::Reg(reg)]));
    }
    if is_keyword(first, "ST") {
        let reg = require_register(require_operand(operands, 1, "LD", line)?, "LD", line)?;
        return Ok((Opcode::LdSt, vec![Operand::Reg(reg)]));
    }
    if is_keyword(first, "F") {
        let reg = require_register(require_operand(operands, 1, "LD", line)?, "LD", line)?;
        return Ok((Opcode::LdSprite, vec![Operand::Reg(reg)]));
    }
    if is_keyword(first, "B") {
        let reg = require_register(require_operand(operands, 1, "LD", line)?, "LD", line)?;
        return Ok((Opcode::Bcd, vec![Operand::Reg(reg)]));
    }
    if is_keyword(first, "[I]") {
        let reg = require_register(require_operand(operands, 1, "LD", line)?, "LD", line)?;
        return Ok((Opcode::StRegs, vec![Operand::RegCount(reg)]));
    }

    let reg0 = require_register(first, "LD", line)?;
    let second = require_operand(operands, 1, "LD", line)?;

    if is_keyword(second, "DT") {
        return Ok((Opcode::StDt, vec![Operand::Reg(reg0)]));
    }
    if is_keyword(second, "K") {
        return Ok((Opcode::StKey, vec![Operand::Reg(reg0)]));
    }
    if is_keyword(second, "[I]") {
        return Ok((Opcode::LdRegs, vec![Operand::RegCount(reg0)]));
    }
    if let Some(reg1) = try_register(second) {
        return Ok((Opcode::LdReg, vec![Operand::Reg(reg0), Operand::Reg(reg1)]));
    }

    let value = evaluate(second, line, symbols)?;
    let imm = expect_byte(value, line, second.column)?;
    Ok((Opcode::LdImm, vec![Operand::Reg(reg0), Operand::Imm(imm)]))
}

fn resolve_add(operands: &[Expr], line: usize, symbols: &SymbolTable) -> Result<(Opcode, Vec<Operand>), Error> {
    let first = require_operand(operands, 0, "ADD", line)?;

    if is_keyword(first, "I") {
        let reg = require_register(require_operand(operands, 1, "ADD", line)?, "ADD", line)?;
        return Ok((Opcode::AddI, vec![Operand::Reg(reg)]));
    }

    let reg0 = require_register(first, "ADD", line)?;
    let second = require_operand(operands, 1, "ADD", line)?;

    if let Some(reg1) = try_register(second) {
        return Ok((Opcode::AddReg, vec![Operand::Reg(reg0), Operand::Reg(reg1)]));
    }

    let value = evaluate(second, line, symbols)?;
    let imm = expect_byte(value, line, second.column)?;
    Ok((Opcode::AddImm, vec![Operand::Reg(reg0), Operand::Imm(imm)]))
}
