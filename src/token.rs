//! Tokenises assembly source lines into an ordered token stream.
//!
//! At each position the lexer tries an ordered table of patterns and takes
//! the first (and therefore longest-priority) match, the same scheme as the
//! original `asm_tokeniser`'s `match_set`. A byte that matches nothing
//! becomes a single `Invalid` token and the cursor advances by one, so a
//! stray character never stops the whole line from being tokenised.

use regex::Regex;
use std::sync::OnceLock;

use crate::source::SourceLine;

/// The kind of a lexical token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    Whitespace,
    Identifier,
    Label,
    Directive,
    Number,
    Comma,
    Assignment,
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    String,
    EndOfInput,
    Invalid,
}

/// A single lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Token {
        Token { kind, lexeme: lexeme.into(), line, column }
    }
}

struct Matcher {
    pattern: Regex,
    kind: TokenKind,
}

fn pattern_table() -> &'static Vec<Matcher> {
    static TABLE: OnceLock<Vec<Matcher>> = OnceLock::new();
    TABLE.get_or_init(|| {
        vec![
            Matcher { pattern: Regex::new(r"^;.*").unwrap(), kind: TokenKind::Comment },
            Matcher { pattern: Regex::new(r"^[ \t]+").unwrap(), kind: TokenKind::Whitespace },
            Matcher { pattern: Regex::new(r"(?i)^(=|EQU\b)").unwrap(), kind: TokenKind::Assignment },
            // `[I]` is a recognised operand token (see spec Data Model) even
            // though square brackets otherwise have no lexical meaning; it
            // has to be matched ahead of the identifier rule or the leading
            // `[` would fall through to Invalid.
            Matcher { pattern: Regex::new(r"(?i)^\[I\]").unwrap(), kind: TokenKind::Identifier },
            Matcher { pattern: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*:").unwrap(), kind: TokenKind::Label },
            Matcher { pattern: Regex::new(r"^\.[A-Za-z_][A-Za-z0-9_]*").unwrap(), kind: TokenKind::Directive },
            Matcher { pattern: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").unwrap(), kind: TokenKind::Identifier },
            Matcher { pattern: Regex::new(r"^(0[xX][0-9A-Fa-f]+|[0-9]+)").unwrap(), kind: TokenKind::Number },
            Matcher { pattern: Regex::new(r#"^"[^"]*""#).unwrap(), kind: TokenKind::String },
            Matcher { pattern: Regex::new(r"^,").unwrap(), kind: TokenKind::Comma },
            Matcher { pattern: Regex::new(r"^\+").unwrap(), kind: TokenKind::Plus },
            Matcher { pattern: Regex::new(r"^-").unwrap(), kind: TokenKind::Minus },
            Matcher { pattern: Regex::new(r"^\*").unwrap(), kind: TokenKind::Star },
            Matcher { pattern: Regex::new(r"^/").unwrap(), kind: TokenKind::Slash },
            Matcher { pattern: Regex::new(r"^\(").unwrap(), kind: TokenKind::LParen },
            Matcher { pattern: Regex::new(r"^\)").unwrap(), kind: TokenKind::RParen },
        ]
    })
}

/// Tokenise loaded source lines into the raw token stream, including
/// `Comment` and `Whitespace` tokens. Terminated with one `EndOfInput`
/// sentinel.
pub fn tokenize(lines: &[SourceLine]) -> Vec<Token> {
    let mut tokens = Vec::new();

    for (text, line_no) in lines {
        tokenize_line(text, *line_no, &mut tokens);
    }

    let last_line = lines.last().map(|(_, no)| *no).unwrap_or(0);
    tokens.push(Token::new(TokenKind::EndOfInput, "", last_line + 1, 1));
    tokens
}

fn tokenize_line(line: &str, line_no: usize, tokens: &mut Vec<Token>) {
    let mut cursor = 0usize;

    while cursor < line.len() {
        let rest = &line[cursor..];
        let mut matched = false;

        for matcher in pattern_table() {
            let Some(m) = matcher.pattern.find(rest) else { continue };
            debug_assert_eq!(m.start(), 0);

            let lexeme = post_process(matcher.kind, m.as_str());
            tokens.push(Token::new(matcher.kind, lexeme, line_no, cursor + 1));

            cursor += m.as_str().len();
            matched = true;
            break;
        }

        if !matched {
            let invalid = &rest[..rest.chars().next().map(|c| c.len_utf8()).unwrap_or(1)];
            tokens.push(Token::new(TokenKind::Invalid, invalid, line_no, cursor + 1));
            cursor += invalid.len();
        }
    }
}

fn post_process(kind: TokenKind, lexeme: &str) -> String {
    match kind {
        TokenKind::Label => lexeme.trim_end_matches(':').to_uppercase(),
        TokenKind::Identifier | TokenKind::Directive | TokenKind::Assignment => {
            lexeme.to_uppercase()
        }
        _ => lexeme.to_string(),
    }
}

/// Drop `Comment` and `Whitespace` tokens, leaving the stream the parser
/// actually consumes. The lexer keeps them around only for diagnostic
/// tooling that wants to reconstruct the original line.
pub fn significant(tokens: &[Token]) -> Vec<Token> {
    tokens
        .iter()
        .filter(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::Whitespace))
        .cloned()
        .collect()
}
