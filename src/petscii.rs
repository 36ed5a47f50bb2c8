//! PETSCII placeholder translation.
//!
//! Program text carries the known graphic and control characters as in-band
//! placeholders (`[BALL]`, `[CLR]`, …). At print time these become their
//! Unicode equivalents or screen control actions; everything else passes
//! through untouched.

/// One decoded piece of a PRINT payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal characters to write at the cursor.
    Text(String),
    /// `[CLR]`: clear the screen and home the cursor.
    Clear,
    /// `[REVERSE]`: toggle the reverse-video attribute.
    ReverseToggle,
}

/// Glyph placeholders and their Unicode renderings.
const GLYPHS: &[(&str, char)] = &[
    ("[SIDE]", '│'),
    ("[BORDERS]", '─'),
    ("[BALL]", '●'),
    ("[FIELD]", '▒'),
];

/// Split `text` into printable runs and control segments.
///
/// Unrecognized bracketed sequences are not special; they print literally.
pub fn segments(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut run = String::new();
    let mut rest = text;

    'outer: while !rest.is_empty() {
        if rest.starts_with('[') {
            if rest.starts_with("[CLR]") {
                flush(&mut out, &mut run);
                out.push(Segment::Clear);
                rest = &rest["[CLR]".len()..];
                continue;
            }
            if rest.starts_with("[REVERSE]") {
                flush(&mut out, &mut run);
                out.push(Segment::ReverseToggle);
                rest = &rest["[REVERSE]".len()..];
                continue;
            }
            for (name, glyph) in GLYPHS {
                if rest.starts_with(name) {
                    run.push(*glyph);
                    rest = &rest[name.len()..];
                    continue 'outer;
                }
            }
        }
        let ch = rest.chars().next().unwrap();
        run.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    flush(&mut out, &mut run);
    out
}

fn flush(out: &mut Vec<Segment>, run: &mut String) {
    if !run.is_empty() {
        out.push(Segment::Text(std::mem::take(run)));
    }
}
