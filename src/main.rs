//! basic64 - runs a Commodore 64 BASIC V2 program in the terminal.
//!
//! This is the binary entry point. Source is loaded (detokenized first if
//! `--prg`), parsed, and executed against the emulated 40×25 screen, either
//! under the ratatui frontend or headless.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use basic64::{headless, tui, BasicError, Interpreter, Program, Screen, StepOutcome};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use mimalloc::MiMalloc;
use ratatui::{backend::CrosstermBackend, Terminal};

/// mimalloc outperforms the system allocator under the clone-happy value
/// model.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Global flag for signal-triggered shutdown (as Arc for signal-hook).
static SHUTDOWN_FLAG: std::sync::LazyLock<Arc<AtomicBool>> =
    std::sync::LazyLock::new(|| Arc::new(AtomicBool::new(false)));

#[derive(Parser)]
#[command(name = "basic64")]
#[command(about = "Terminal-hosted interpreter for Commodore 64 BASIC V2")]
struct Cli {
    /// Path to the program: plain text, or a tokenized image with --prg.
    program: PathBuf,

    /// Decode the file as a binary PRG image.
    #[arg(long)]
    prg: bool,

    /// Run without the TUI: INPUT reads stdin, the final screen goes to
    /// stdout.
    #[arg(long)]
    headless: bool,

    /// Statement budget for headless runs.
    #[arg(long, default_value_t = 10_000_000)]
    limit: u64,
}

fn main() {
    init_logging();

    let cli = Cli::parse();

    let program = match load_program(&cli) {
        Ok(program) => program,
        Err(error) => {
            // Decode and parse failures: the program never starts.
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    let seed = basic64::default_seed();
    log::info!(
        "loaded {} lines from {} (seed {seed})",
        program.len(),
        cli.program.display()
    );

    let screen = Arc::new(Mutex::new(Screen::new()));
    let interpreter = Interpreter::new(program, screen, seed);

    let code = if cli.headless {
        run_headless(interpreter, cli.limit)
    } else {
        match run_with_tui(interpreter) {
            Ok(code) => code,
            Err(error) => {
                eprintln!("{error:#}");
                2
            }
        }
    };
    std::process::exit(code);
}

/// Read the source file and produce a parsed program.
fn load_program(cli: &Cli) -> std::result::Result<Program, BasicError> {
    let bytes = std::fs::read(&cli.program).unwrap_or_else(|error| {
        eprintln!("cannot read {}: {error}", cli.program.display());
        std::process::exit(1);
    });
    let text = if cli.prg {
        basic64::detokenize(&bytes)?
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    };
    basic64::parse_source(&text)
}

fn run_headless(interpreter: Interpreter, limit: u64) -> i32 {
    register_signals();
    let quit = interpreter.quit_flag();
    let shutdown = Arc::clone(&SHUTDOWN_FLAG);
    std::thread::spawn(move || loop {
        if shutdown.load(Ordering::Relaxed) {
            quit.store(true, Ordering::Relaxed);
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    });

    match headless::run(interpreter, limit) {
        Ok(StepOutcome::Running) => {
            log::warn!("step limit reached before END");
            0
        }
        Ok(_) => 0,
        Err(error) => {
            eprintln!("{error}");
            2
        }
    }
}

fn run_with_tui(interpreter: Interpreter) -> Result<i32> {
    register_signals();
    install_panic_hook();

    enable_raw_mode()?;
    execute!(std::io::stdout(), EnterAlternateScreen)?;
    let _terminal_guard = tui::TerminalGuard::new();

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend).context("terminal init")?;

    let outcome = tui::run(interpreter, &mut terminal, &SHUTDOWN_FLAG)?;
    drop(_terminal_guard);

    match outcome {
        tui::RunOutcome::Ended | tui::RunOutcome::Quit => Ok(0),
        tui::RunOutcome::RuntimeError(error) => {
            eprintln!("{error}");
            Ok(2)
        }
    }
}

/// File-target logging so the TUI never shares stdout with the log stream.
fn init_logging() {
    let log_path = std::env::var("BASIC64_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("basic64.log"));
    match std::fs::File::create(&log_path) {
        Ok(file) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .target(env_logger::Target::Pipe(Box::new(file)))
                .format_timestamp_secs()
                .init();
        }
        Err(error) => {
            // No log file, no logging; stderr would corrupt the TUI.
            eprintln!("warning: cannot open {}: {error}", log_path.display());
        }
    }
}

fn register_signals() {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::flag;
    for signal in [SIGINT, SIGTERM, SIGHUP] {
        let _ = flag::register(signal, Arc::clone(&SHUTDOWN_FLAG));
    }
}

/// Log panics and put the terminal back together before the default hook.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {panic_info:?}");
        let _ = disable_raw_mode();
        let _ = execute!(
            std::io::stdout(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        );
        default_hook(panic_info);
    }));
}
