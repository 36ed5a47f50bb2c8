//! PRG image decoding.
//!
//! A PRG file is two little-endian load-address bytes followed by a linked
//! list of tokenized lines:
//!
//! ```text
//! link (u16 LE, 0x0000 ends the program) | lineno (u16 LE) | body… | 0x00
//! ```
//!
//! Body bytes with the high bit set are BASIC V2 tokens; everything else is
//! literal PETSCII. [`detokenize`] turns an image into canonical source
//! text, one logical line per output line; [`tokenize`] is the inverse used
//! to build images (and to check the round-trip property in tests).

use crate::error::{BasicError, Result};

/// Keyword texts for tokens 0x80..=0xCB, in token order.
///
/// The order matters twice over: it is the decode index, and the crunch in
/// [`tokenize`] substitutes greedily by first match in this order, exactly
/// as the ROM's crunch routine did.
pub const KEYWORDS: [&str; 76] = [
    "END", "FOR", "NEXT", "DATA", "INPUT#", "INPUT", "DIM", "READ", "LET", "GOTO", "RUN", "IF",
    "RESTORE", "GOSUB", "RETURN", "REM", "STOP", "ON", "WAIT", "LOAD", "SAVE", "VERIFY", "DEF",
    "POKE", "PRINT#", "PRINT", "CONT", "LIST", "CLR", "CMD", "SYS", "OPEN", "CLOSE", "GET", "NEW",
    "TAB(", "TO", "FN", "SPC(", "THEN", "NOT", "STEP", "+", "-", "*", "/", "^", "AND", "OR", ">",
    "=", "<", "SGN", "INT", "ABS", "USR", "FRE", "POS", "SQR", "RND", "LOG", "EXP", "COS", "SIN",
    "TAN", "ATN", "PEEK", "LEN", "STR$", "VAL", "ASC", "CHR$", "LEFT$", "RIGHT$", "MID$", "GO",
];

const FIRST_TOKEN: u8 = 0x80;
const REM_TOKEN: u8 = 0x8f;

/// Decode a PRG image into canonical source text.
pub fn detokenize(bytes: &[u8]) -> Result<String> {
    if bytes.len() < 2 {
        return Err(BasicError::Truncated);
    }
    // Load address is not interesting here.
    let mut pos = 2;
    let mut out = String::new();

    loop {
        let link = read_u16(bytes, pos)?;
        pos += 2;
        if link == 0 {
            break;
        }
        let lineno = read_u16(bytes, pos)?;
        pos += 2;

        out.push_str(&lineno.to_string());
        out.push(' ');
        pos = detokenize_line(bytes, pos, &mut out)?;
        out.push('\n');
    }

    Ok(out)
}

/// Decode one line body starting at `pos`; returns the position just past
/// the 0x00 terminator.
fn detokenize_line(bytes: &[u8], mut pos: usize, out: &mut String) -> Result<usize> {
    let mut in_string = false;
    let mut rem_tail = false;

    loop {
        let byte = *bytes.get(pos).ok_or(BasicError::Truncated)?;

        if byte == 0 {
            if in_string {
                return Err(BasicError::UnterminatedString);
            }
            return Ok(pos + 1);
        }

        if in_string || rem_tail {
            if byte == b'"' {
                in_string = false;
            }
            out.push(byte as char);
            pos += 1;
            continue;
        }

        if byte >= FIRST_TOKEN {
            let idx = (byte - FIRST_TOKEN) as usize;
            let keyword = *KEYWORDS.get(idx).ok_or(BasicError::BadToken(pos))?;
            // Smart spacing keeps keywords from fusing with surrounding
            // identifiers once the tokens are gone.
            if out.chars().last().is_some_and(|c| c.is_ascii_alphanumeric()) {
                out.push(' ');
            }
            out.push_str(keyword);
            if byte == REM_TOKEN {
                rem_tail = true;
            } else if bytes
                .get(pos + 1)
                .is_some_and(|b| b.is_ascii_alphanumeric())
            {
                out.push(' ');
            }
            pos += 1;
            continue;
        }

        if byte == b'"' {
            in_string = true;
        }
        out.push(byte as char);
        pos += 1;
    }
}

/// Encode canonical source text into a PRG image loading at $0801.
///
/// Each input line must open with a line number. The body is crunched
/// greedily against [`KEYWORDS`] in token order, skipping string literals
/// and everything after REM.
pub fn tokenize(source: &str) -> Vec<u8> {
    let mut out = vec![0x01, 0x08];
    let mut addr: u16 = 0x0801;

    for line in source.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        let (lineno, body) = split_lineno(line);
        let body = crunch(body);

        // link | lineno | body | 0x00
        let next = addr + 4 + body.len() as u16 + 1;
        out.extend_from_slice(&next.to_le_bytes());
        out.extend_from_slice(&lineno.to_le_bytes());
        out.extend_from_slice(&body);
        out.push(0);
        addr = next;
    }

    out.extend_from_slice(&[0, 0]);
    out
}

fn split_lineno(line: &str) -> (u16, &str) {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    let lineno = line[..digits].parse().unwrap_or(0);
    (lineno, line[digits..].trim_start())
}

fn crunch(body: &str) -> Vec<u8> {
    let upper = body.to_ascii_uppercase();
    let text = upper.as_bytes();
    let mut out = Vec::with_capacity(text.len());
    let mut pos = 0;
    let mut in_string = false;
    let mut rem_tail = false;

    'outer: while pos < text.len() {
        let byte = text[pos];
        if in_string || rem_tail {
            if byte == b'"' {
                in_string = false;
            }
            out.push(byte);
            pos += 1;
            continue;
        }
        if byte == b'"' {
            in_string = true;
            out.push(byte);
            pos += 1;
            continue;
        }
        for (idx, keyword) in KEYWORDS.iter().enumerate() {
            if text[pos..].starts_with(keyword.as_bytes()) {
                let token = FIRST_TOKEN + idx as u8;
                out.push(token);
                pos += keyword.len();
                if token == REM_TOKEN {
                    rem_tail = true;
                }
                continue 'outer;
            }
        }
        out.push(byte);
        pos += 1;
    }

    out
}

fn read_u16(bytes: &[u8], pos: usize) -> Result<u16> {
    match (bytes.get(pos), bytes.get(pos + 1)) {
        (Some(&lo), Some(&hi)) => Ok(u16::from_le_bytes([lo, hi])),
        _ => Err(BasicError::Truncated),
    }
}
