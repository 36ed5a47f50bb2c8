//! End-to-end interpreter scenarios: parse real source, execute it, and
//! assert against the screen snapshot.

use std::sync::{Arc, Mutex};

use basic64::{parse_source, Interpreter, Screen, StepOutcome};

/// Parse and run `source` to END, returning the finished interpreter.
fn run(source: &str) -> Interpreter {
    let program = parse_source(source).expect("program should parse");
    let mut interpreter = Interpreter::new(program, Arc::new(Mutex::new(Screen::new())), 42);
    let outcome = interpreter.run(1_000_000).expect("program should run clean");
    assert_eq!(outcome, StepOutcome::Ended);
    interpreter
}

fn snapshot(interpreter: &Interpreter) -> Vec<String> {
    interpreter.screen().lock().unwrap().snapshot()
}

#[test]
fn test_hello_world() {
    let interpreter = run("10 PRINT \"HELLO\"\n");
    let rows = snapshot(&interpreter);
    assert_eq!(rows[0], "HELLO");
    assert_eq!(
        interpreter.screen().lock().unwrap().cursor(),
        (1, 0),
        "PRINT ends with a newline"
    );
}

#[test]
fn test_semicolon_print_keeps_number_padding() {
    let interpreter = run("10 FOR I=1 TO 3:PRINT I;:NEXT:PRINT\n");
    // Every number carries a leading and a trailing space.
    assert_eq!(snapshot(&interpreter)[0], " 1  2  3");
}

#[test]
fn test_gosub_mutates_and_returns() {
    let interpreter = run("10 X=5:GOSUB 100:PRINT X:END\n100 X=X+1:RETURN\n");
    assert_eq!(snapshot(&interpreter)[0], " 6");
}

#[test]
fn test_comma_advances_to_next_zone() {
    let interpreter = run("10 DIM A(5):A(3)=42:PRINT A(3),A(0)\n");
    let row = &snapshot(&interpreter)[0];
    // " 42 " from column 0, " 0" starting at the 10-column zone.
    assert_eq!(row, " 42        0");
    assert_eq!(row.find('4'), Some(1));
    assert_eq!(row.rfind('0'), Some(11));
}

#[test]
fn test_read_consumes_data_in_order() {
    let interpreter = run("10 DATA 7,9:READ A,B:PRINT A+B\n");
    assert_eq!(snapshot(&interpreter)[0], " 16");
}

#[test]
fn test_unquoted_multi_word_data_reads_intact() {
    // Club names in DATA tables are unquoted and multi-word; their internal
    // spacing must survive READ.
    let interpreter = run(
        "10 DATA 7,AC MILAN,9\n\
         20 READ A,C$,B\n\
         30 PRINT C$:PRINT A+B\n",
    );
    let rows = snapshot(&interpreter);
    assert_eq!(rows[0], "AC MILAN");
    assert_eq!(rows[1], " 16");
}

#[test]
fn test_if_then_inline_and_jump() {
    let interpreter = run("10 IF 1<2 THEN PRINT \"Y\":GOTO 30\n20 PRINT \"N\"\n30 END\n");
    let rows = snapshot(&interpreter);
    assert_eq!(rows[0], "Y");
    assert!(rows.iter().all(|row| row != "N"));
}

#[test]
fn test_keyword_collision_program_runs() {
    // The normalization cases, executed rather than just parsed.
    let interpreter = run(
        "10 HZ=3:QZ=0\n\
         15 IFHZORQZTHENPRINT\"SI\"\n\
         20 FOR PZ=HZTOHZ+2:S=S+PZ:NEXT\n\
         30 PRINT S\n",
    );
    let rows = snapshot(&interpreter);
    assert_eq!(rows[0], "SI");
    // 3+4+5
    assert_eq!(rows[1], " 12");
}

#[test]
fn test_tab_and_spc() {
    let interpreter = run("10 PRINT \"A\";TAB(5)\"B\";SPC(2)\"C\"\n");
    assert_eq!(snapshot(&interpreter)[0], "A    B  C");
}

#[test]
fn test_screen_wrap_and_scroll() {
    let interpreter = run(
        "10 FOR I=1 TO 30:PRINT \"ROW\";I:NEXT\n\
         20 PRINT \"LAST\";\n",
    );
    let rows = snapshot(&interpreter);
    // 30 print rows scrolled through a 25-row screen.
    assert_eq!(rows[24], "LAST");
    assert_eq!(rows[0], "ROW 7");
}

#[test]
fn test_clr_placeholder_clears_screen() {
    let interpreter = run("10 PRINT \"JUNK\"\n20 PRINT \"[CLR]CLEAN\";\n");
    let rows = snapshot(&interpreter);
    assert_eq!(rows[0], "CLEAN");
    assert!(rows[1..].iter().all(String::is_empty));
}

#[test]
fn test_petscii_glyphs_render() {
    let interpreter = run("10 PRINT \"[BALL] GOL [BALL]\"\n");
    assert_eq!(snapshot(&interpreter)[0], "● GOL ●");
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let source = "10 FOR I=1 TO 5:PRINT INT(RND(1)*90)+10:NEXT\n";
    let first = run(source);
    let second = run(source);
    assert_eq!(snapshot(&first), snapshot(&second));
}

#[test]
fn test_string_compare_drives_control_flow() {
    let interpreter = run(
        "10 A$=\"N\"\n\
         20 IF A$<>\"N\"ANDA$<>\"S\"THEN 40\n\
         30 PRINT \"VALID\":END\n\
         40 PRINT \"INVALID\"\n",
    );
    assert_eq!(snapshot(&interpreter)[0], "VALID");
}

#[test]
fn test_nested_for_loops() {
    let interpreter = run(
        "10 FOR I=1 TO 3:FOR J=1 TO I:T=T+1:NEXT J:NEXT I\n\
         20 PRINT T\n",
    );
    assert_eq!(snapshot(&interpreter)[0], " 6");
}

#[test]
fn test_on_gosub_returns() {
    let interpreter = run(
        "10 N=2:ON N GOSUB 100,200\n\
         20 PRINT \"BACK\":END\n\
         100 PRINT \"UNO\":RETURN\n\
         200 PRINT \"DUE\":RETURN\n",
    );
    let rows = snapshot(&interpreter);
    assert_eq!(rows[0], "DUE");
    assert_eq!(rows[1], "BACK");
}

#[test]
fn test_runtime_error_carries_line_number() {
    let program = parse_source("10 X=1\n20 GOTO 500\n").unwrap();
    let mut interpreter = Interpreter::new(program, Arc::new(Mutex::new(Screen::new())), 1);
    let error = interpreter.run(100).unwrap_err();
    assert_eq!(error.to_string(), "?UNDEF'D STATEMENT ERROR IN 20");
}
