//! Recursive-descent parser: tokens -> AST.
//!
//! Grammar (see SPEC_FULL.md component 4), grounded on
//! `original_source/chip8ir/src/assembler/asm_parser.h`:
//!
//! ```text
//! line           := [LABEL] [ body ]
//! body           := instruction | directive | equ
//! instruction    := IDENTIFIER [ operand { COMMA operand } ]
//! directive      := DIRECTIVE  [ operand { COMMA operand } ]
//! equ            := IDENTIFIER ASSIGNMENT expression
//! operand        := expression
//! expression     := additive
//! additive       := multiplicative { (PLUS|MINUS) multiplicative }
//! multiplicative := primary { (STAR|SLASH) primary }
//! primary        := NUMBER | IDENTIFIER | LPAREN expression RPAREN
//! ```

use crate::error::Error;
use crate::token::{Token, TokenKind};

/// An arithmetic operator in an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// An expression appearing as an operand, `EQU` value, or `.ORG`/`.DB`/`.DW`
/// argument
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(u32),
    Identifier(String),
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

/// An expression node, carrying the column it starts at for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub column: usize,
}

/// The body of one assembly-source element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementBody {
    Instruction { mnemonic: String, operands: Vec<Expr> },
    Directive { name: String, args: Vec<Expr> },
    Equ { name: String, value: Expr },
}

/// One logical line of source: an optional label and an optional body. A
/// label-only line (`body = None`) is valid.
#[derive(Debug, Clone, PartialEq)]
pub struct AstElement {
    pub line: usize,
    pub label: Option<String>,
    pub body: Option<ElementBody>,
}

/// Parse a full, already-lexed token stream (as produced by
/// `token::significant`) into a program. Collects as many `ParseError`s as
/// possible instead of stopping at the first one, per the error-handling
/// policy in SPEC_FULL.md: lex/parse collect, later stages fail fast.
pub fn parse(tokens: &[Token]) -> (Vec<AstElement>, Vec<Error>) {
    let mut elements = Vec::new();
    let mut errors = Vec::new();
    let mut index = 0;

    while index < tokens.len() && tokens[index].kind != TokenKind::EndOfInput {
        let line_no = tokens[index].line;
        let line_end = tokens[index..]
            .iter()
            .position(|t| t.line != line_no || t.kind == TokenKind::EndOfInput)
            .map(|offset| index + offset)
            .unwrap_or(tokens.len());

        let line_tokens = &tokens[index..line_end];
        match parse_line(line_tokens, line_no) {
            Ok(element) => elements.push(element),
            Err(error) => errors.push(error),
        }
        index = line_end;
    }

    (elements, errors)
}

fn parse_line(tokens: &[Token], line_no: usize) -> Result<AstElement, Error> {
    let mut cursor = Cursor::new(tokens);

    let label = if cursor.check(TokenKind::Label) {
        Some(cursor.advance().lexeme.clone())
    } else {
        None
    };

    if cursor.is_at_end() {
        return Ok(AstElement { line: line_no, label, body: None });
    }

    let body = parse_body(&mut cursor)?;

    if !cursor.is_at_end() {
        let token = cursor.peek();
        return Err(Error::Parse {
            line: token.line,
            column: token.column,
            message: format!("unexpected trailing token \"{}\"", token.lexeme),
        });
    }

    Ok(AstElement { line: line_no, label, body: Some(body) })
}

fn parse_body(cursor: &mut Cursor) -> Result<ElementBody, Error> {
    let head = cursor.advance().clone();

    match head.kind {
        TokenKind::Directive => {
            let args = parse_operand_list(cursor)?;
            Ok(ElementBody::Directive { name: head.lexeme, args })
        }
        TokenKind::Identifier => {
            if cursor.check(TokenKind::Assignment) {
                cursor.advance();
                let value = parse_expression(cursor)?;
                Ok(ElementBody::Equ { name: head.lexeme, value })
            } else {
                let operands = parse_operand_list(cursor)?;
                Ok(ElementBody::Instruction { mnemonic: head.lexeme, operands })
            }
        }
        _ => Err(Error::Parse {
            line: head.line,
            column: head.column,
            message: format!("expected an instruction, directive or label, found \"{}\"", head.lexeme),
        }),
    }
}

fn parse_operand_list(cursor: &mut Cursor) -> Result<Vec<Expr>, Error> {
    let mut operands = Vec::new();
    if cursor.is_at_end() {
        return Ok(operands);
    }

    operands.push(parse_expression(cursor)?);
    while cursor.check(TokenKind::Comma) {
        cursor.advance();
        operands.push(parse_expression(cursor)?);
    }
    Ok(operands)
}

fn parse_expression(cursor: &mut Cursor) -> Result<Expr, Error> {
    parse_additive(cursor)
}

fn parse_additive(cursor: &mut Cursor) -> Result<Expr, Error> {
    let mut lhs = parse_multiplicative(cursor)?;

    loop {
        let op = if cursor.check(TokenKind::Plus) {
            BinaryOp::Add
        } else if cursor.check(TokenKind::Minus) {
            BinaryOp::Sub
        } else {
            break;
        };
        let column = lhs.column;
        cursor.advance();
        let rhs = parse_multiplicative(cursor)?;
        lhs = Expr { kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, column };
    }

    Ok(lhs)
}

fn parse_multiplicative(cursor: &mut Cursor) -> Result<Expr, Error> {
    let mut lhs = parse_primary(cursor)?;

    loop {
        let op = if cursor.check(TokenKind::Star) {
            BinaryOp::Mul
        } else if cursor.check(TokenKind::Slash) {
            BinaryOp::Div
        } else {
            break;
        };
        let column = lhs.column;
        cursor.advance();
        let rhs = parse_primary(cursor)?;
        lhs = Expr { kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, column };
    }

    Ok(lhs)
}

fn parse_primary(cursor: &mut Cursor) -> Result<Expr, Error> {
    if cursor.is_at_end() {
        let token = cursor.peek();
        return Err(Error::Parse {
            line: token.line,
            column: token.column,
            message: "expected an expression".to_string(),
        });
    }

    let token = cursor.advance().clone();
    match token.kind {
        TokenKind::Number => {
            let value = parse_number_literal(&token.lexeme).ok_or_else(|| Error::Parse {
                line: token.line,
                column: token.column,
                message: format!("malformed number literal \"{}\"", token.lexeme),
            })?;
            Ok(Expr { kind: ExprKind::Number(value), column: token.column })
        }
        TokenKind::Identifier => {
            Ok(Expr { kind: ExprKind::Identifier(token.lexeme), column: token.column })
        }
        TokenKind::LParen => {
            let inner = parse_expression(cursor)?;
            if !cursor.check(TokenKind::RParen) {
                let found = cursor.peek();
                return Err(Error::Parse {
                    line: found.line,
                    column: found.column,
                    message: "unbalanced parenthesis".to_string(),
                });
            }
            cursor.advance();
            Ok(Expr { kind: inner.kind, column: token.column })
        }
        _ => Err(Error::Parse {
            line: token.line,
            column: token.column,
            message: format!("expected a number, identifier or '(', found \"{}\"", token.lexeme),
        }),
    }
}

fn parse_number_literal(lexeme: &str) -> Option<u32> {
    if let Some(hex) = lexeme.strip_prefix("0x").or_else(|| lexeme.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        lexeme.parse::<u32>().ok()
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Cursor<'a> {
        Cursor { tokens, position: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len().saturating_sub(1))]
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.tokens[self.position].kind == kind
    }

    fn advance(&mut self) -> &Token {
        let token = &self.tokens[self.position];
        self.position += 1;
        token
    }
}
