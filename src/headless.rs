//! Headless run mode (no TUI).
//!
//! Steps the program at full speed, feeds INPUT from stdin, and writes the
//! final screen snapshot to stdout. Useful for scripted runs and CI; the
//! interactive path lives in [`crate::tui`].

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::BasicError;
use crate::interp::{Interpreter, StepOutcome};
use crate::screen::Screen;

/// Poll interval of the stdin feeder thread.
const FEED_POLL: Duration = Duration::from_millis(5);

/// Run to completion (or the step `limit`); prints the snapshot on exit.
pub fn run(mut interpreter: Interpreter, limit: u64) -> Result<StepOutcome, BasicError> {
    let screen = interpreter.screen();
    let quit = interpreter.quit_flag();
    thread::spawn(move || feed_stdin(&screen, &quit));

    let result = interpreter.run(limit);

    let snapshot = interpreter.screen().lock().unwrap().snapshot();
    let mut stdout = io::stdout().lock();
    for row in snapshot {
        let _ = writeln!(stdout, "{row}");
    }

    result
}

/// Deliver stdin lines whenever INPUT is waiting; EOF raises quit.
fn feed_stdin(screen: &Arc<Mutex<Screen>>, quit: &Arc<AtomicBool>) {
    let stdin = io::stdin();
    loop {
        if quit.load(Ordering::Relaxed) {
            return;
        }
        let wants_line = {
            let screen = screen.lock().unwrap();
            screen.is_awaiting_input() && !screen.has_pending_line()
        };
        if !wants_line {
            thread::sleep(FEED_POLL);
            continue;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => {
                // Out of input while the program still wants some.
                quit.store(true, Ordering::Relaxed);
                return;
            }
            Ok(_) => {
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                screen.lock().unwrap().submit_line(line);
            }
        }
    }
}
