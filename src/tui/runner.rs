//! The TUI event loop.
//!
//! The interpreter steps on a worker thread, throttled so a tight BASIC
//! loop does not pin a core; the main thread polls keys at frame rate and
//! repaints. The two share the screen mutex and the quit flag, nothing
//! else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{backend::Backend, Terminal};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use crate::error::BasicError;
use crate::interp::{Interpreter, StepOutcome};
use crate::screen::Screen;

use super::render::{render, RenderContext};

/// Delay between interpreter steps, near the machine's statement rate.
const STEP_DELAY: Duration = Duration::from_micros(100);
/// TUI frame rate delay (approximately 60fps).
const FRAME_DELAY: Duration = Duration::from_millis(16);

/// How a TUI run finished.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Program reached END (or ran off its last line).
    Ended,
    /// The user quit, or a signal asked us to.
    Quit,
    /// Execution aborted; the diagnostic was already shown.
    RuntimeError(BasicError),
}

/// Drive the interpreter under the TUI until it ends, errors, or quits.
///
/// `shutdown` is the signal-handler flag; it is mirrored into the
/// interpreter's quit flag so Ctrl-C behaves like Esc.
pub fn run<B: Backend>(
    interpreter: Interpreter,
    terminal: &mut Terminal<B>,
    shutdown: &AtomicBool,
) -> Result<RunOutcome>
where
    <B as Backend>::Error: Send + Sync + 'static,
{
    let screen = interpreter.screen();
    let quit = interpreter.quit_flag();

    let worker = spawn_interpreter(interpreter);
    let mut input = Input::default();

    // Phase 1: program running.
    loop {
        if shutdown.load(Ordering::Relaxed) {
            quit.store(true, Ordering::Relaxed);
        }

        if event::poll(FRAME_DELAY)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Esc => quit.store(true, Ordering::Relaxed),
                        KeyCode::Enter => {
                            screen
                                .lock()
                                .unwrap()
                                .submit_line(input.value().to_string());
                            input.reset();
                        }
                        _ => {
                            input.handle_event(&Event::Key(key));
                        }
                    }
                }
            }
        }

        draw(terminal, &screen, "RUNNING - ESC QUITS", input.value())?;

        if worker.is_finished() {
            break;
        }
    }

    let outcome = worker
        .join()
        .map_err(|_| anyhow::anyhow!("interpreter thread panicked"))?;

    let (status, result) = match outcome {
        Ok(StepOutcome::Terminated) => return Ok(RunOutcome::Quit),
        Ok(_) => ("READY.".to_string(), RunOutcome::Ended),
        Err(error) => {
            log::error!("run aborted: {error}");
            (error.to_string(), RunOutcome::RuntimeError(error))
        }
    };

    // Phase 2: final screen stays up until a key is pressed.
    loop {
        draw(terminal, &screen, &status, "")?;
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        if event::poll(FRAME_DELAY)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    break;
                }
            }
        }
    }

    Ok(result)
}

fn spawn_interpreter(
    mut interpreter: Interpreter,
) -> thread::JoinHandle<Result<StepOutcome, BasicError>> {
    thread::spawn(move || loop {
        match interpreter.step()? {
            StepOutcome::Running => thread::sleep(STEP_DELAY),
            outcome => return Ok(outcome),
        }
    })
}

fn draw<B: Backend>(
    terminal: &mut Terminal<B>,
    screen: &Arc<Mutex<Screen>>,
    status: &str,
    input_line: &str,
) -> Result<()>
where
    <B as Backend>::Error: Send + Sync + 'static,
{
    let screen = screen.lock().unwrap();
    terminal.draw(|frame| {
        render(
            frame,
            &RenderContext {
                screen: &screen,
                status,
                input_line,
            },
        )
    })?;
    Ok(())
}
