//! Terminal state guard for RAII cleanup.
//!
//! Ensures raw mode and the alternate screen are unwound even when the
//! render loop exits through a panic.

use crossterm::{
    execute,
    terminal::{disable_raw_mode, LeaveAlternateScreen},
};

/// Guard struct that restores the terminal on drop (including panics).
#[derive(Debug, Default)]
pub struct TerminalGuard;

impl TerminalGuard {
    pub fn new() -> Self {
        Self
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Always attempt to restore terminal state, ignoring errors.
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
        let _ = execute!(std::io::stdout(), crossterm::cursor::Show);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_guard_creation() {
        // Just verify construction; dropping emits escapes at worst.
        let _guard = TerminalGuard::new();
    }
}
