//! Turns raw source text into `(line_text, line_no)` pairs.
//!
//! Strips trailing `\r` (so CRLF sources work without special-casing) and
//! everything from the first `;` to the end of the line, then drops lines
//! that end up empty. Line numbers are 1-based and count physical lines in
//! the original file, so diagnostics still point at the right place even
//! though blank/comment-only lines never make it into the returned pairs.

/// One non-empty, comment-stripped source line and its 1-based line number
pub type SourceLine = (String, usize);

/// Load source text into a sequence of `(line_text, line_no)` pairs
pub fn load(source: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index + 1;
        let stripped = strip_comment(strip_trailing_cr(raw_line));
        if stripped.is_empty() {
            continue;
        }
        lines.push((stripped.to_string(), line_no));
    }

    lines
}

fn strip_trailing_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(index) => &line[..index],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_blank_lines() {
        let source = "LD V0, 1 ; set V0\n\n; full line comment\nCLS\n";
        let lines = load(source);
        assert_eq!(lines, vec![
            ("LD V0, 1 ".to_string(), 1),
            ("CLS".to_string(), 4),
        ]);
    }

    #[test]
    fn strips_trailing_cr() {
        let source = "CLS\r\nRET\r\n";
        let lines = load(source);
        assert_eq!(lines, vec![
            ("CLS".to_string(), 1),
            ("RET".to_string(), 2),
        ]);
    }

    #[test]
    fn preserves_line_numbers_across_skipped_lines() {
        let source = "CLS\n\nRET\n";
        let lines = load(source);
        assert_eq!(lines, vec![
            ("CLS".to_string(), 1),
            ("RET".to_string(), 3),
        ]);
    }
}
