//! Reachability-driven disassembly: a worklist sweep follows static control
//! flow from the entry point instead of naively decoding every two bytes,
//! so interleaved data (sprites, jump tables, string literals) doesn't get
//! misread as instructions.
//!
//! Grounded on
//! `original_source/chip8ir/test/disassembler_integration_test.cc`'s five
//! scenarios: a straight line ending in an invalid opcode, a conditional
//! skip that must explore both successors, a jump that leaves the bytes it
//! skips over as data, the no-overlap/full-coverage invariant, and the
//! invalid-opcode-terminates-the-path case.

use std::collections::{BTreeMap, HashMap};

use crate::ir::{IrElement, IrProgram, Operand};
use crate::memory::DisasmMemory;
use crate::opcode::{self, Opcode, OperandShape};
use crate::symbol_table::SymbolTable;

/// Why an address was recorded as a jump/call/data target, used to pick a
/// label prefix. Ranked `ITarget < Subroutine < Jump < Indexed < Unknown`
/// (lower is higher precedence): an address named by `LD I, addr` is data
/// regardless of whatever else also points at it, so `ITarget` outranks
/// every other classification an address reached more than one way might
/// otherwise pick up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TargetKind {
    ITarget,
    Subroutine,
    Jump,
    Indexed,
    Unknown,
}

impl TargetKind {
    fn prefix(self) -> &'static str {
        match self {
            TargetKind::Subroutine => "FUNC",
            TargetKind::Jump => "LABEL",
            TargetKind::ITarget => "DATA",
            TargetKind::Indexed => "TABLE",
            TargetKind::Unknown => "UNK",
        }
    }
}

/// A synthesized name for an address the sweep identified as a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub address: u16,
    pub name: String,
    pub kind: TargetKind,
}

/// The complete output of disassembling one binary image
#[derive(Debug, Clone)]
pub struct DisasmResult {
    pub program: IrProgram,
    pub labels: Vec<Label>,
    by_address: HashMap<u16, String>,
}

impl DisasmResult {
    pub fn label_at(&self, address: u16) -> Option<&str> {
        self.by_address.get(&address).map(String::as_str)
    }
}

/// Disassemble `image`, loaded at `origin`, into an `IrProgram` plus the
/// labels synthesized for every jump/call/data target found.
pub fn disassemble(image: Vec<u8>, origin: u16) -> DisasmResult {
    let mut memory = DisasmMemory::new();
    memory.bind_at(origin, image);

    let mut targets: BTreeMap<u16, TargetKind> = BTreeMap::new();
    sweep(&mut memory, &mut targets);
    demote_instruction_targets_to_data(&mut memory, &targets);

    let elements = build_elements(&memory);
    let labels = synthesize_labels(&targets);
    let by_address = labels.iter().map(|l| (l.address, l.name.clone())).collect();

    DisasmResult { program: IrProgram { origin, elements, symbols: SymbolTable::new() }, labels, by_address }
}

fn record_target(targets: &mut BTreeMap<u16, TargetKind>, address: u16, kind: TargetKind) {
    targets
        .entry(address)
        .and_modify(|existing| {
            if kind < *existing {
                *existing = kind;
            }
        })
        .or_insert(kind);
}

fn sweep(memory: &mut DisasmMemory, targets: &mut BTreeMap<u16, TargetKind>) {
    let mut worklist = vec![memory.start()];

    while let Some(address) = worklist.pop() {
        if !memory.contains(address) || !memory.contains(address + 1) {
            continue;
        }
        if (address - memory.start()) % 2 != 0 {
            continue;
        }
        if memory.is_visited(address) {
            continue;
        }
        memory.mark_visited(address);
        memory.mark_visited(address + 1);

        let word = memory.get_word(address);
        let Some(info) = opcode::decode(word) else { continue };
        memory.mark_instruction(address);

        let operand_addr = || word & 0x0FFF;

        match info.opcode {
            Opcode::Ret => {}
            Opcode::Jp => {
                let target = operand_addr();
                record_target(targets, target, TargetKind::Jump);
                worklist.push(target);
            }
            Opcode::JpV0 => {
                // the effective target depends on V0 at runtime and can't
                // be known statically; record it for labeling only, don't
                // follow it as code.
                record_target(targets, operand_addr(), TargetKind::Indexed);
            }
            Opcode::Call => {
                let target = operand_addr();
                record_target(targets, target, TargetKind::Subroutine);
                worklist.push(target);
                worklist.push(address + 2);
            }
            Opcode::LdI => {
                record_target(targets, operand_addr(), TargetKind::ITarget);
                worklist.push(address + 2);
            }
            Opcode::SeImm | Opcode::SneImm | Opcode::SeReg | Opcode::SneReg | Opcode::Skp | Opcode::Sknp => {
                worklist.push(address + 2);
                worklist.push(address + 4);
            }
            _ => {
                worklist.push(address + 2);
            }
        }
    }
}

/// An `I_TARGET` address wins over any code classification the sweep also
/// gave it: `LD I, addr` naming a location means that location holds data
/// (a sprite, a jump table), even if some other, spurious path also landed
/// on it as an instruction start.
fn demote_instruction_targets_to_data(memory: &mut DisasmMemory, targets: &BTreeMap<u16, TargetKind>) {
    for (&address, &kind) in targets {
        if kind == TargetKind::ITarget && memory.contains(address) && memory.is_instruction(address) {
            memory.clear_marks(address);
        }
    }
}

fn decode_operands(shape: OperandShape, word: u16) -> Vec<Operand> {
    let reg_hi = ((word >> 8) & 0xF) as u8;
    let reg_lo = ((word >> 4) & 0xF) as u8;
    let nibble = (word & 0xF) as u8;
    let imm = (word & 0xFF) as u8;
    let addr = word & 0x0FFF;

    match shape {
        OperandShape::None => vec![],
        OperandShape::Addr => vec![Operand::Addr(addr)],
        OperandShape::Reg => vec![Operand::Reg(reg_hi)],
        OperandShape::Key => vec![Operand::Key(reg_hi)],
        OperandShape::RegCount => vec![Operand::RegCount(reg_hi)],
        OperandShape::RegImm => vec![Operand::Reg(reg_hi), Operand::Imm(imm)],
        OperandShape::RegReg => vec![Operand::Reg(reg_hi), Operand::Reg(reg_lo)],
        OperandShape::RegRegNibble => vec![Operand::Reg(reg_hi), Operand::Reg(reg_lo), Operand::Nibble(nibble)],
    }
}

/// Final linear scan: every byte the sweep marked is an instruction start;
/// every other byte belongs to the maximal data run up to the next marked
/// byte. This is where the worklist's bitmap becomes the ordered `IrElement`
/// sequence.
fn build_elements(memory: &DisasmMemory) -> Vec<IrElement> {
    let mut elements = Vec::new();
    let mut address = memory.start();

    while address < memory.end() {
        if memory.is_instruction(address) && memory.contains(address + 1) {
            let word = memory.get_word(address);
            let info = opcode::decode(word).expect("marked instruction bytes must still decode");
            let operands = decode_operands(info.shape, word);
            elements.push(IrElement::Instruction { address, opcode: info.opcode, operands });
            address += 2;
        } else {
            let start = address;
            let mut bytes = Vec::new();
            while address < memory.end() && !memory.is_instruction(address) {
                bytes.push(memory.get_byte(address));
                address += 1;
            }
            elements.push(IrElement::Data { address: start, bytes });
        }
    }

    elements
}

fn synthesize_labels(targets: &BTreeMap<u16, TargetKind>) -> Vec<Label> {
    let mut counters: HashMap<&'static str, u32> = HashMap::new();
    targets
        .iter()
        .map(|(&address, &kind)| {
            let prefix = kind.prefix();
            let rank = counters.entry(prefix).or_insert(0);
            let name = format!("{}_{}", prefix, rank);
            *rank += 1;
            Label { address, name, kind }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_ends_at_invalid_opcode() {
        let result = disassemble(vec![0x60, 0x01, 0x61, 0x02, 0xFF, 0xFF, 0xAA, 0xBB], 0x200);
        assert_eq!(result.program.elements.len(), 3);
        assert_eq!(result.program.elements[0].address(), 0x200);
        assert_eq!(result.program.elements[1].address(), 0x202);
        match &result.program.elements[2] {
            IrElement::Data { address, bytes } => {
                assert_eq!(*address, 0x204);
                assert_eq!(bytes.len(), 4);
            }
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[test]
    fn conditional_skip_explores_both_successors() {
        let result = disassemble(vec![0x30, 0x00, 0x60, 0x01, 0x60, 0x02], 0x200);
        assert_eq!(result.program.elements.len(), 3);
        for (element, expected) in result.program.elements.iter().zip([0x200, 0x202, 0x204]) {
            assert_eq!(element.address(), expected);
            assert!(matches!(element, IrElement::Instruction { .. }));
        }
    }

    #[test]
    fn jump_leaves_skipped_bytes_as_data() {
        let result = disassemble(vec![0x12, 0x06, 0xAA, 0xBB, 0xCC, 0xDD, 0x60, 0x01], 0x200);
        assert_eq!(result.program.elements.len(), 3);
        assert_eq!(result.program.elements[0].address(), 0x200);
        match &result.program.elements[1] {
            IrElement::Data { address, bytes } => {
                assert_eq!(*address, 0x202);
                assert_eq!(bytes.len(), 4);
            }
            other => panic!("expected data, got {:?}", other),
        }
        assert_eq!(result.program.elements[2].address(), 0x206);
    }

    #[test]
    fn elements_cover_the_image_with_no_overlap() {
        let result = disassemble(vec![0x12, 0x06, 0xAA, 0xBB, 0xCC, 0xDD, 0x60, 0x01], 0x200);
        let mut covered = std::collections::HashSet::new();
        for element in &result.program.elements {
            for offset in 0..element.len() as u16 {
                assert!(covered.insert(element.address() + offset), "overlap at {:#x}", element.address() + offset);
            }
        }
        assert_eq!(covered.len(), 8);
    }

    #[test]
    fn invalid_opcode_terminates_code_path() {
        let result = disassemble(vec![0x60, 0x01, 0x61, 0x02, 0xFF, 0xFF], 0x200);
        assert_eq!(result.program.elements.len(), 3);
        assert!(matches!(result.program.elements[0], IrElement::Instruction { .. }));
        assert!(matches!(result.program.elements[1], IrElement::Instruction { .. }));
        assert!(matches!(result.program.elements[2], IrElement::Data { .. }));
    }

    #[test]
    fn i_target_wins_over_a_spurious_code_path() {
        // LD I, 0x206 then an unconditional JP that (wrongly, if followed)
        // would decode 0x206.. as code; the I_TARGET should still force
        // 0x206 to be treated as data once both paths have run.
        let result = disassemble(
            vec![
                0xA2, 0x06, // LD I, 0x206
                0x12, 0x06, // JP 0x206
                0xAA, 0xBB, // unreachable padding
                0x00, 0x00, // data living at the I_TARGET address
            ],
            0x200,
        );
        let data_covers_target = result.program.elements.iter().any(|e| match e {
            IrElement::Data { address, bytes } => (*address..*address + bytes.len() as u16).contains(&0x206),
            IrElement::Instruction { .. } => false,
        });
        assert!(data_covers_target, "expected 0x206 to be classified as data: {:?}", result.program.elements);
    }

    #[test]
    fn odd_jump_target_is_not_followed_as_code() {
        // JP 0x203 targets an odd offset from origin 0x200. Bytes 0x203.. happen
        // to also decode as a valid instruction (LD V0, 1) if wrongly followed,
        // which would misalign every element after it. The sweep must refuse to
        // decode at an odd-aligned address and leave those bytes as data.
        let result = disassemble(vec![0x12, 0x03, 0xAA, 0x60, 0x01, 0xFF], 0x200);

        assert_eq!(result.program.elements.len(), 2);
        assert_eq!(result.program.elements[0].address(), 0x200);
        assert!(matches!(result.program.elements[0], IrElement::Instruction { .. }));
        match &result.program.elements[1] {
            IrElement::Data { address, bytes } => {
                assert_eq!(*address, 0x202);
                assert_eq!(bytes.len(), 4);
            }
            other => panic!("expected data, got {:?}", other),
        }

        for element in &result.program.elements {
            if matches!(element, IrElement::Instruction { .. }) {
                assert_eq!((element.address() - 0x200) % 2, 0, "instruction at odd offset: {:?}", element);
            }
        }
    }

    #[test]
    fn labels_are_deduplicated_and_ranked_in_address_order() {
        let result = disassemble(
            vec![
                0x22, 0x06, // CALL 0x206
                0x22, 0x06, // CALL 0x206 again, same target
                0x00, 0xEE, // RET (unreachable padding to keep addresses aligned)
                0x00, 0xEE, // target: RET
            ],
            0x200,
        );
        let func_labels: Vec<&Label> = result.labels.iter().filter(|l| l.kind == TargetKind::Subroutine).collect();
        assert_eq!(func_labels.len(), 1);
        assert_eq!(func_labels[0].name, "FUNC_0");
        assert_eq!(func_labels[0].address, 0x206);
    }
}
