//! PRG image decoding against hand-built byte sequences.

use basic64::{detokenize, BasicError};

/// Build a line node: link filled with a dummy forward address.
fn line(lineno: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0801u16.to_le_bytes()); // link, value irrelevant
    out.extend_from_slice(&lineno.to_le_bytes());
    out.extend_from_slice(body);
    out.push(0);
    out
}

fn image(lines: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0x01, 0x08];
    for l in lines {
        out.extend_from_slice(l);
    }
    out.extend_from_slice(&[0, 0]);
    out
}

#[test]
fn test_decode_print_statement() {
    // 0x99 = PRINT
    let bytes = image(&[line(10, &[0x99, b'"', b'C', b'I', b'A', b'O', b'"'])]);
    assert_eq!(detokenize(&bytes).unwrap(), "10 PRINT\"CIAO\"\n");
}

#[test]
fn test_decode_inserts_spacing_around_tokens() {
    // 0x8B = IF, 0xB2 = '=', 0xA7 = THEN, 0x89 = GOTO
    let bytes = image(&[line(
        20,
        &[0x8b, b'I', 0xb2, b'5', 0xa7, 0x89, b'1', b'0'],
    )]);
    assert_eq!(detokenize(&bytes).unwrap(), "20 IF I = 5 THEN GOTO 10\n");
}

#[test]
fn test_decode_multiple_lines_in_order() {
    let bytes = image(&[
        line(10, &[0x99, b'1']),
        line(20, &[0x89, b'1', b'0']),
    ]);
    assert_eq!(detokenize(&bytes).unwrap(), "10 PRINT 1\n20 GOTO 10\n");
}

#[test]
fn test_tokens_inside_string_are_literal_bytes() {
    // A quote, then a byte that would be the FOR token outside a string.
    let bytes = image(&[line(30, &[0x99, b'"', 0x41, b'"'])]);
    assert_eq!(detokenize(&bytes).unwrap(), "30 PRINT\"A\"\n");
}

#[test]
fn test_rem_swallows_tokens_to_end_of_line() {
    // 0x8F = REM; the PRINT token byte after it must stay literal... except
    // high-bit bytes in a REM tail are literal PETSCII, so use plain text.
    let bytes = image(&[line(40, &[0x8f, b' ', b'N', b'O', b'T', b'E'])]);
    assert_eq!(detokenize(&bytes).unwrap(), "40 REM NOTE\n");
}

#[test]
fn test_bad_token_reports_offset() {
    let bytes = image(&[line(50, &[0xfe])]);
    // Offset 6: 2 load address + 2 link + 2 lineno.
    assert_eq!(detokenize(&bytes), Err(BasicError::BadToken(6)));
}

#[test]
fn test_truncated_inputs() {
    assert_eq!(detokenize(&[]), Err(BasicError::Truncated));
    assert_eq!(detokenize(&[0x01]), Err(BasicError::Truncated));
    // Program with a line header and no terminator.
    let mut bytes = vec![0x01, 0x08];
    bytes.extend_from_slice(&0x0801u16.to_le_bytes());
    bytes.extend_from_slice(&10u16.to_le_bytes());
    bytes.push(0x99);
    assert_eq!(detokenize(&bytes), Err(BasicError::Truncated));
}

#[test]
fn test_unterminated_string_in_image() {
    let bytes = image(&[line(60, &[0x99, b'"', b'X'])]);
    assert_eq!(detokenize(&bytes), Err(BasicError::UnterminatedString));
}

#[test]
fn test_empty_image_decodes_to_empty_source() {
    assert_eq!(detokenize(&[0x01, 0x08, 0x00, 0x00]).unwrap(), "");
}

#[test]
fn test_image_survives_a_trip_through_disk() {
    let image = basic64::tokenize("10 PRINT \"CIAO\"\n20 GOTO 10\n");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("game.prg");
    std::fs::write(&path, &image).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(
        detokenize(&bytes).unwrap(),
        "10 PRINT \"CIAO\"\n20 GOTO 10\n"
    );
}
