//! A CHIP-8 toolchain core: assembler, disassembler and the IR that sits
//! between them.
//!
//! The pipeline round-trips in both directions:
//!
//! ```text
//! text -> source -> token -> ast -> symbol_table -> ir -> encoder -> binary
//! binary -> memory -> disassembler -> ir -> printer -> text
//! ```
//!
//! `assembler` wires the forward direction end to end; `disassembler` wires
//! the reverse direction. Everything else is a single-purpose stage that can
//! be used on its own.

pub mod assembler;
pub mod ast;
pub mod disassembler;
pub mod encoder;
pub mod error;
pub mod ir;
pub mod logging;
pub mod memory;
pub mod opcode;
pub mod printer;
pub mod source;
pub mod symbol_table;
pub mod token;
