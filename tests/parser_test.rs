//! Parser acceptance tests over canonical source, including the round-trip
//! property through the PRG pipeline.

use basic64::{detokenize, parse_source, tokenize, BasicError};

/// Lines the parser must accept (each exercises a keyword-collision form
/// that the original program is full of).
const MUST_ACCEPT: &[&str] = &[
    "10 IFI=5THENPRINT\"OK\"",
    "20 FOR PZ=HZTOHZ+15:NEXT",
    "30 IF A$<>\"N\"ANDA$<>\"S\"THEN 10",
    "40 L=1::IFI>ZTHENWW=INT(RND(1)*2)+1",
    "50 IFRND(1)>.5THENA(PZ)=A(PZ)+1",
    "60 PRINTCHR$(142):GOSUB2000",
];

#[test]
fn test_must_accept_lines() {
    for line in MUST_ACCEPT {
        basic64::parse_line(line).unwrap_or_else(|error| panic!("{line}: {error}"));
    }
}

#[test]
fn test_prg_round_trip_preserves_statements() {
    // parse(detokenize(tokenize(P))) must equal parse(P) modulo whitespace.
    let source = format!(
        "5 REM UN COMMENTO QUALSIASI\n\
         {}\n\
         70 DATA 7,9,\"FORZA ROMA\",AC MILAN\n\
         80 READ A,B,C$:PRINT C$;A+B\n\
         90 POKE 53280,0:POKE 646,1\n\
         100 ON A GOTO 10,20\n\
         110 END\n",
        MUST_ACCEPT.join("\n")
    );

    let direct = parse_source(&source).expect("direct parse");
    let round_tripped =
        parse_source(&detokenize(&tokenize(&source)).expect("detokenize")).expect("re-parse");
    assert_eq!(direct.lines(), round_tripped.lines());
    assert_eq!(direct.data(), round_tripped.data());
}

#[test]
fn test_detokenize_is_idempotent_on_canonical_text() {
    let source = "10 PRINT \"CIAO\"\n20 GOTO 10\n";
    let once = detokenize(&tokenize(source)).unwrap();
    let twice = detokenize(&tokenize(&once)).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_parse_rejects_whole_program_on_one_bad_line() {
    let source = "10 PRINT \"OK\"\n4000 PRINT \"STRAY\n";
    match parse_source(source) {
        Err(BasicError::Syntax { line: 4000, .. }) => {}
        other => panic!("expected syntax error on 4000, got {other:?}"),
    }
}

#[test]
fn test_line_number_bounds() {
    assert!(parse_source("63999 END\n").is_ok());
    assert!(parse_source("64000 END\n").is_err());
}

#[test]
fn test_case_insensitive_outside_strings() {
    let lower = parse_source("10 print \"Ciao\":goto 10\n").unwrap();
    let upper = parse_source("10 PRINT \"Ciao\":GOTO 10\n").unwrap();
    assert_eq!(lower.lines(), upper.lines());
}
