//! Wires the forward pipeline end to end: source text in, a binary image
//! (plus any diagnostics) out. The individual stages — `source`, `token`,
//! `ast`, `symbol_table`, `encoder` — are usable on their own; this module
//! is just the glue the CLI drivers call, generalized from the teacher's
//! own `src/bin/assembler.rs` (read file, call one function, report
//! errors, write file).

use crate::encoder;
use crate::error::{Diagnostic, Error};
use crate::ir::IrProgram;
use crate::memory::DEFAULT_ORIGIN;
use crate::source;
use crate::symbol_table;
use crate::token;

/// Everything assembling one source file produced
pub struct AssembleOutput {
    pub program: IrProgram,
    pub image: Vec<u8>,
}

/// Assemble `source_text` into a binary image loaded at `origin`.
///
/// Lex and parse errors are collected and returned together as
/// diagnostics (so a source file with several mistakes gets reported in
/// one pass); a symbol-resolution or encoding error stops the pipeline
/// immediately, per the fail-fast policy for later stages.
pub fn assemble(source_text: &str, origin: u16) -> Result<AssembleOutput, Vec<Diagnostic>> {
    let lines = source::load(source_text);
    let raw_tokens = token::tokenize(&lines);
    let significant = token::significant(&raw_tokens);

    let invalid: Vec<Diagnostic> = raw_tokens
        .iter()
        .filter(|t| t.kind == token::TokenKind::Invalid)
        .map(|t| Error::Lex { line: t.line, column: t.column, lexeme: t.lexeme.clone() }.to_diagnostic())
        .collect();

    let (elements, parse_errors) = crate::ast::parse(&significant);
    let mut diagnostics: Vec<Diagnostic> = invalid;
    diagnostics.extend(parse_errors.iter().map(Error::to_diagnostic));

    if !diagnostics.is_empty() {
        Diagnostic::sort_by_position(&mut diagnostics);
        return Err(diagnostics);
    }

    let program = symbol_table::build_program(&elements, origin).map_err(|e| vec![e.to_diagnostic()])?;
    let image = encoder::encode(&program).map_err(|e| vec![e.to_diagnostic()])?;

    Ok(AssembleOutput { program, image })
}

/// Assemble using the conventional CHIP-8 load address
pub fn assemble_default(source_text: &str) -> Result<AssembleOutput, Vec<Diagnostic>> {
    assemble(source_text, DEFAULT_ORIGIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_small_program() {
        let output = assemble_default("start:\n  LD V0, 1\n  JP start\n").unwrap();
        assert_eq!(output.image, vec![0x60, 0x01, 0x12, 0x00]);
    }

    #[test]
    fn collects_multiple_parse_errors() {
        let result = assemble_default("LD V0, )\nADD V1, (\n");
        let diagnostics = result.unwrap_err();
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn reports_undefined_symbol_as_a_single_diagnostic() {
        let result = assemble_default("JP nowhere\n");
        let diagnostics = result.unwrap_err();
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn invalid_characters_become_lex_diagnostics() {
        let result = assemble_default("LD V0, @@\n");
        let diagnostics = result.unwrap_err();
        assert!(!diagnostics.is_empty());
    }
}
