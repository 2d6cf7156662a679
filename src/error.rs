//! Uniform diagnostics for every pipeline stage.
//!
//! Every error the pipeline can produce carries a source location, so the
//! CLI drivers can print `(file, line, column, kind, message)` the same way
//! regardless of which stage raised it. This generalizes the teacher's
//! hand-rolled `assembler::Error` (manual `Display`, no `thiserror`) across
//! lexing, parsing, symbol resolution and encoding.

use std::fmt;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// What stage produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Lex,
    Parse,
    Symbol,
    Range,
    InvalidOperandShape,
    Decode,
    Io,
}

/// A single diagnostic with enough context to print a helpful message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub kind: Kind,
    pub message: String,
}

impl Diagnostic {
    pub fn error(kind: Kind, line: usize, column: usize, message: impl Into<String>) -> Diagnostic {
        Diagnostic { severity: Severity::Error, line, column, kind, message: message.into() }
    }

    pub fn warning(kind: Kind, line: usize, column: usize, message: impl Into<String>) -> Diagnostic {
        Diagnostic { severity: Severity::Warning, line, column, kind, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{} at line {}, column {}: {}", label, self.line, self.column, self.message)
    }
}

/// Sort diagnostics by source position, matching the reporter's
/// line/column-order printing policy
pub fn sort_by_position(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by_key(|d| (d.line, d.column));
}

/// Errors that can occur while assembling a program. Analogous to the
/// teacher's `assembler::Error`, generalized to the token/AST pipeline
/// and extended with `Decode` for disassembly.
#[derive(Debug, Clone)]
pub enum Error {
    /// Invalid character encountered by the lexer
    Lex { line: usize, column: usize, lexeme: String },
    /// Unexpected token, missing operand, unbalanced parenthesis, ...
    Parse { line: usize, column: usize, message: String },
    /// Duplicate definition or unresolved label/EQU reference
    Symbol { line: usize, column: usize, message: String },
    /// A numeric literal or computed value doesn't fit its operand slot
    Range { line: usize, column: usize, value: i64, max_bits: u32 },
    /// A mnemonic was given an operand combination it doesn't support
    InvalidOperandShape { line: usize, column: usize, mnemonic: String },
    /// A binary word decoded to no known opcode (non-fatal; the sweep
    /// stops following this path and the bytes become data)
    Decode { address: u16, word: u16 },
    /// Failure reading or writing a file
    Io { path: String, message: String },
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex { line, column, lexeme } => write!(
                f, "line {}, column {}: invalid character '{}'", line, column, lexeme
            ),
            Error::Parse { line, column, message } => write!(
                f, "line {}, column {}: {}", line, column, message
            ),
            Error::Symbol { line, column, message } => write!(
                f, "line {}, column {}: {}", line, column, message
            ),
            Error::Range { line, column, value, max_bits } => write!(
                f,
                "line {}, column {}: value {} does not fit in {} bits (max {})",
                line, column, value, max_bits, (1u32 << max_bits) - 1
            ),
            Error::InvalidOperandShape { line, column, mnemonic } => write!(
                f, "line {}, column {}: unsupported operands for \"{}\"", line, column, mnemonic
            ),
            Error::Decode { address, word } => write!(
                f, "address 0x{:03X}: word 0x{:04X} matches no opcode", address, word
            ),
            Error::Io { path, message } => write!(f, "{}: {}", path, message),
        }
    }
}

impl Error {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Error::Lex { line, column, .. } => {
                Diagnostic::error(Kind::Lex, *line, *column, self.to_string())
            }
            Error::Parse { line, column, .. } => {
                Diagnostic::error(Kind::Parse, *line, *column, self.to_string())
            }
            Error::Symbol { line, column, .. } => {
                Diagnostic::error(Kind::Symbol, *line, *column, self.to_string())
            }
            Error::Range { line, column, .. } => {
                Diagnostic::error(Kind::Range, *line, *column, self.to_string())
            }
            Error::InvalidOperandShape { line, column, .. } => {
                Diagnostic::error(Kind::InvalidOperandShape, *line, *column, self.to_string())
            }
            Error::Decode { .. } => Diagnostic::error(Kind::Decode, 0, 0, self.to_string()),
            Error::Io { .. } => Diagnostic::error(Kind::Io, 0, 0, self.to_string()),
        }
    }
}
