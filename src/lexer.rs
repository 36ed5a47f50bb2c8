//! Lexing of canonical BASIC source lines.
//!
//! The ROM tokenizer's crunch step substituted keywords greedily,
//! so source recovered from it (and source typed in its spirit) is full of
//! keyword-abuts-identifier forms: `IFI=5`, `THENPRINT`, `HZORQZ`,
//! `PZ=HZTOHZ+15`. Before tokenizing, each line body goes through three
//! normalization passes over the upper-cased text, with string literals and
//! REM tails masked out:
//!
//! 1. statement keywords, substituted unconditionally wherever they appear;
//! 2. AND/OR/NOT, skipped only in keyword-suffix position (letter before,
//!    non-letter after, the shape of `FOR`'s interior `OR`);
//! 3. the first `TO` after the `=` of a FOR head.
//!
//! Tokenization proper is a plain hand-rolled scanner.

use crate::error::{BasicError, Result};

/// Statement keywords for pass 1, in the token order the crunch used.
const STATEMENT_KEYWORDS: [&str; 20] = [
    "END", "FOR", "NEXT", "DATA", "INPUT", "DIM", "READ", "LET", "GOTO", "RUN", "IF", "RESTORE",
    "GOSUB", "RETURN", "REM", "STOP", "ON", "POKE", "PRINT", "THEN",
];

/// Keywords the tokenizer recognizes as whole letter runs.
const LEXER_KEYWORDS: [&str; 26] = [
    "END", "FOR", "NEXT", "DATA", "INPUT", "DIM", "READ", "LET", "GOTO", "RUN", "IF", "RESTORE",
    "GOSUB", "RETURN", "REM", "STOP", "ON", "POKE", "PRINT", "THEN", "TO", "STEP", "AND", "OR",
    "NOT", "GO",
];

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(&'static str),
    /// Verbatim tail of a REM statement.
    RemTail(String),
    Comma,
    Semicolon,
    Colon,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Token plus its 0-based column in the normalized line body.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub tok: Tok,
    pub col: usize,
    /// Whitespace stood between this token and the one before it. DATA item
    /// reassembly needs this to keep the internal spacing of unquoted
    /// multi-word literals (`AC MILAN`); everything else ignores it.
    pub gap: bool,
}

#[derive(Debug, Clone, Copy)]
struct NChar {
    ch: char,
    /// Inside a string literal or a REM tail; never rewritten or matched.
    masked: bool,
    /// Part of a keyword emitted by an earlier pass.
    claimed: bool,
}

/// Normalize one line body (text after the line number).
///
/// Exposed for the parser and for tests; the output is what the tokenizer
/// actually consumes.
pub fn normalize(body: &str) -> String {
    let chars = mask_and_uppercase(body);
    let chars = pass_statement_keywords(chars);
    let chars = pass_logical_operators(chars);
    let chars = pass_for_to(chars);
    chars.iter().map(|c| c.ch).collect()
}

/// Upper-case code, leave strings and the REM tail verbatim, and claim REM
/// itself (with smart spacing) so later passes cannot touch the tail.
fn mask_and_uppercase(body: &str) -> Vec<NChar> {
    let src: Vec<char> = body.chars().collect();
    let mut out: Vec<NChar> = Vec::with_capacity(src.len());
    let mut in_string = false;
    let mut i = 0;

    while i < src.len() {
        let ch = src[i];
        if in_string {
            out.push(NChar { ch, masked: true, claimed: false });
            if ch == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if ch == '"' {
            in_string = true;
            out.push(NChar { ch, masked: true, claimed: false });
            i += 1;
            continue;
        }
        if matches_keyword_at(&src, i, "REM") {
            if out.last().is_some_and(|c| is_word_char(c.ch)) {
                out.push(space());
            }
            for ch in "REM".chars() {
                out.push(NChar { ch, masked: false, claimed: true });
            }
            i += 3;
            if src.get(i).is_some_and(|c| c.is_ascii_alphanumeric()) {
                out.push(space());
            }
            // Everything after REM is literal.
            for &ch in &src[i..] {
                out.push(NChar { ch, masked: true, claimed: false });
            }
            return out;
        }
        out.push(NChar {
            ch: ch.to_ascii_uppercase(),
            masked: false,
            claimed: false,
        });
        i += 1;
    }

    out
}

/// Pass 1: statement keywords win unconditionally over identifiers.
fn pass_statement_keywords(chars: Vec<NChar>) -> Vec<NChar> {
    let mut out: Vec<NChar> = Vec::with_capacity(chars.len());
    let mut i = 0;

    'outer: while i < chars.len() {
        if !chars[i].masked && !chars[i].claimed {
            for keyword in STATEMENT_KEYWORDS {
                if free_match(&chars, i, keyword) {
                    if out.last().is_some_and(|c| is_word_char(c.ch)) {
                        out.push(space());
                    }
                    for ch in keyword.chars() {
                        out.push(NChar { ch, masked: false, claimed: true });
                    }
                    i += keyword.len();
                    if chars.get(i).is_some_and(|c| !c.masked && is_word_char(c.ch)) {
                        out.push(space());
                    }
                    continue 'outer;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Pass 2: AND/OR/NOT. The only shape left alone is letter-before,
/// non-letter-after, the interior of something like FOR or MOTOR. A letter
/// on the right (`HZORQZ`, `"N"ANDA$`) means the run must split: outside of
/// strings these letter sequences are always operator plus operand.
fn pass_logical_operators(chars: Vec<NChar>) -> Vec<NChar> {
    let mut out: Vec<NChar> = Vec::with_capacity(chars.len());
    let mut i = 0;

    'outer: while i < chars.len() {
        if !chars[i].masked && !chars[i].claimed {
            for op in ["AND", "OR", "NOT"] {
                if free_match(&chars, i, op) {
                    let before_letter =
                        i > 0 && chars[i - 1].ch.is_ascii_alphabetic() && !chars[i - 1].masked;
                    let after_letter = chars
                        .get(i + op.len())
                        .is_some_and(|c| c.ch.is_ascii_alphabetic() && !c.masked);
                    if before_letter && !after_letter {
                        break;
                    }
                    out.push(space());
                    for ch in op.chars() {
                        out.push(NChar { ch, masked: false, claimed: true });
                    }
                    out.push(space());
                    i += op.len();
                    continue 'outer;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Pass 3: the first TO after the `=` of a FOR head is the loop separator.
fn pass_for_to(chars: Vec<NChar>) -> Vec<NChar> {
    let mut out: Vec<NChar> = Vec::with_capacity(chars.len());
    let mut armed = false;
    let mut in_for_head = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.claimed && free_match(&chars, i, "FOR") && claimed_run(&chars, i, 3) {
            in_for_head = true;
            armed = false;
        } else if !c.masked && c.ch == '=' && in_for_head {
            armed = true;
        } else if armed && !c.masked && !c.claimed && free_match(&chars, i, "TO") {
            out.push(space());
            for ch in "TO".chars() {
                out.push(NChar { ch, masked: false, claimed: true });
            }
            out.push(space());
            i += 2;
            armed = false;
            in_for_head = false;
            continue;
        }
        out.push(c);
        i += 1;
    }

    out
}

/// True when `keyword` occupies `chars[i..]` with no masked or claimed cell.
fn free_match(chars: &[NChar], i: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    if i + kw.len() > chars.len() {
        return false;
    }
    kw.iter().enumerate().all(|(k, &ch)| {
        let c = chars[i + k];
        !c.masked && c.ch == ch && (c.claimed == chars[i].claimed)
    })
}

fn claimed_run(chars: &[NChar], i: usize, len: usize) -> bool {
    chars[i..i + len].iter().all(|c| c.claimed)
}

fn matches_keyword_at(src: &[char], i: usize, keyword: &str) -> bool {
    keyword
        .chars()
        .enumerate()
        .all(|(k, ch)| src.get(i + k).is_some_and(|&c| c.eq_ignore_ascii_case(&ch)))
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '$' || ch == '%'
}

fn space() -> NChar {
    NChar {
        ch: ' ',
        masked: false,
        claimed: true,
    }
}

/// Tokenize a normalized line body.
pub fn tokenize(body: &str, lineno: u16) -> Result<Vec<Spanned>> {
    let src: Vec<char> = body.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    let mut pending_gap = false;

    while i < src.len() {
        let col = i;
        let ch = src[i];

        if ch == ' ' || ch == '\t' {
            pending_gap = true;
            i += 1;
            continue;
        }
        let gap = pending_gap;
        pending_gap = false;

        if ch == '"' {
            let mut text = String::new();
            i += 1;
            loop {
                match src.get(i) {
                    None => {
                        return Err(BasicError::Syntax {
                            line: lineno,
                            col,
                            reason: "unterminated string".into(),
                        })
                    }
                    Some('"') => {
                        i += 1;
                        break;
                    }
                    Some(&c) => {
                        text.push(c);
                        i += 1;
                    }
                }
            }
            out.push(Spanned { tok: Tok::Str(text), col, gap });
            continue;
        }

        if ch.is_ascii_digit() || (ch == '.' && src.get(i + 1).is_some_and(|c| c.is_ascii_digit()))
        {
            let start = i;
            while src.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if src.get(i) == Some(&'.') {
                i += 1;
                while src.get(i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
            }
            let text: String = src[start..i].iter().collect();
            let value = text.parse().map_err(|_| BasicError::Syntax {
                line: lineno,
                col,
                reason: format!("bad number {text}"),
            })?;
            out.push(Spanned { tok: Tok::Number(value), col, gap });
            continue;
        }

        if ch.is_ascii_alphabetic() {
            let start = i;
            while src.get(i).is_some_and(|c| c.is_ascii_alphabetic()) {
                i += 1;
            }
            let letters: String = src[start..i].iter().collect();
            if let Some(&kw) = LEXER_KEYWORDS.iter().find(|&&k| k == letters) {
                if kw == "REM" {
                    out.push(Spanned { tok: Tok::Keyword("REM"), col, gap });
                    let tail: String = src[i..].iter().collect();
                    out.push(Spanned {
                        tok: Tok::RemTail(tail.trim_start().to_string()),
                        col: i,
                        gap: false,
                    });
                    return Ok(out);
                }
                out.push(Spanned { tok: Tok::Keyword(kw), col, gap });
                continue;
            }
            // Identifier: letters, then digits, then an optional $ or %.
            while src.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            let mut name: String = src[start..i].iter().collect();
            if let Some(&suffix) = src.get(i).filter(|&&c| c == '$' || c == '%') {
                name.push(suffix);
                i += 1;
            }
            out.push(Spanned { tok: Tok::Ident(name), col, gap });
            continue;
        }

        let tok = match ch {
            ',' => Tok::Comma,
            ';' => Tok::Semicolon,
            ':' => Tok::Colon,
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '+' => Tok::Plus,
            '-' => Tok::Minus,
            '*' => Tok::Star,
            '/' => Tok::Slash,
            '^' => Tok::Caret,
            '=' => Tok::Eq,
            '<' => match src.get(i + 1) {
                Some('=') => {
                    i += 1;
                    Tok::Le
                }
                Some('>') => {
                    i += 1;
                    Tok::Ne
                }
                _ => Tok::Lt,
            },
            '>' => {
                if src.get(i + 1) == Some(&'=') {
                    i += 1;
                    Tok::Ge
                } else {
                    Tok::Gt
                }
            }
            other => {
                return Err(BasicError::Syntax {
                    line: lineno,
                    col,
                    reason: format!("unexpected character {other:?}"),
                })
            }
        };
        out.push(Spanned { tok, col, gap });
        i += 1;
    }

    Ok(out)
}

/// Normalize then tokenize a line body.
pub fn lex(body: &str, lineno: u16) -> Result<Vec<Spanned>> {
    tokenize(&normalize(body), lineno)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(body: &str) -> Vec<Tok> {
        lex(body, 10).unwrap().into_iter().map(|s| s.tok).collect()
    }

    #[test]
    fn test_normalize_keyword_abuts_identifier() {
        assert_eq!(normalize("IFI=5THENPRINT\"OK\""), "IF I=5 THEN PRINT\"OK\"");
    }

    #[test]
    fn test_normalize_leaves_strings_alone() {
        assert_eq!(normalize("PRINT\"forza\""), "PRINT\"forza\"");
        // ANCORA inside a string must not split around its OR.
        assert_eq!(normalize("A$=\"ANCORA\""), "A$=\"ANCORA\"");
    }

    #[test]
    fn test_normalize_logical_interior() {
        assert_eq!(normalize("HZORQZ"), "HZ OR QZ");
        assert_eq!(normalize("A=NOTB"), "A= NOT B");
    }

    #[test]
    fn test_normalize_keeps_keyword_suffix_shape() {
        // The OR inside FOR (letter before, non-letter after) stays put.
        assert_eq!(normalize("FOR I=1TO5"), "FOR I=1 TO 5");
    }

    #[test]
    fn test_normalize_operator_after_string() {
        assert_eq!(
            normalize("IF A$<>\"N\"ANDA$<>\"S\"THEN 10"),
            "IF A$<>\"N\" AND A$<>\"S\"THEN 10"
        );
    }

    #[test]
    fn test_normalize_contextual_to() {
        assert_eq!(normalize("PZ=HZTOHZ+15"), "PZ=HZTOHZ+15");
        assert_eq!(normalize("FORPZ=HZTOHZ+15"), "FOR PZ=HZ TO HZ+15");
    }

    #[test]
    fn test_normalize_restore_is_not_split() {
        assert_eq!(normalize("RESTORE"), "RESTORE");
    }

    #[test]
    fn test_rem_tail_verbatim() {
        assert_eq!(normalize("REM niente di speciale"), "REM niente di speciale");
        let t = toks("REM niente di speciale");
        assert_eq!(t[0], Tok::Keyword("REM"));
        assert_eq!(t[1], Tok::RemTail("niente di speciale".into()));
    }

    #[test]
    fn test_tokenize_leading_dot_number() {
        assert_eq!(
            toks("X=.5"),
            vec![Tok::Ident("X".into()), Tok::Eq, Tok::Number(0.5)]
        );
    }

    #[test]
    fn test_tokenize_relational_operators() {
        assert_eq!(
            toks("A<>B<=C>=D"),
            vec![
                Tok::Ident("A".into()),
                Tok::Ne,
                Tok::Ident("B".into()),
                Tok::Le,
                Tok::Ident("C".into()),
                Tok::Ge,
                Tok::Ident("D".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_ident_suffixes() {
        assert_eq!(
            toks("RIG$=A%"),
            vec![Tok::Ident("RIG$".into()), Tok::Eq, Tok::Ident("A%".into())]
        );
    }

    #[test]
    fn test_number_then_keyword_split() {
        // "1TO5" after pass 3 never reaches the tokenizer fused, but a bare
        // "10STEP2" can; the letter-run check recovers the keyword.
        assert_eq!(
            toks("FOR I=1TO10STEP2"),
            vec![
                Tok::Keyword("FOR"),
                Tok::Ident("I".into()),
                Tok::Eq,
                Tok::Number(1.0),
                Tok::Keyword("TO"),
                Tok::Number(10.0),
                Tok::Keyword("STEP"),
                Tok::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_lowercase_input_uppercased() {
        assert_eq!(
            toks("print a"),
            vec![Tok::Keyword("PRINT"), Tok::Ident("A".into())]
        );
    }

    #[test]
    fn test_unexpected_character_errors() {
        assert!(matches!(
            lex("PRINT @", 30),
            Err(BasicError::Syntax { line: 30, .. })
        ));
    }
}
