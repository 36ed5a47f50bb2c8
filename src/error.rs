//! Error types for program loading, parsing and execution.
//!
//! Every failure the core can produce is a [`BasicError`]. Diagnostics follow
//! the machine's own phrasing (`?SYNTAX ERROR IN 4000`) so that what the
//! status row shows is what a C64 would have printed.

use thiserror::Error;

/// Convenience alias used throughout the interpreter core.
pub type Result<T> = std::result::Result<T, BasicError>;

/// All load-time and run-time failures.
///
/// Decode and parse errors abort before the program starts; runtime errors
/// abort the run and carry the BASIC line number they surfaced on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BasicError {
    /// Unknown token byte in a PRG image, with its byte offset.
    #[error("bad token at offset {0}")]
    BadToken(usize),

    /// PRG image ended in the middle of a line node.
    #[error("truncated program image")]
    Truncated,

    /// A string literal ran past the end of its line.
    #[error("unterminated string literal")]
    UnterminatedString,

    /// Unparseable source text. Column is 0-based within the line body.
    #[error("?SYNTAX ERROR IN {line} (col {col}: {reason})")]
    Syntax {
        line: u16,
        col: usize,
        reason: String,
    },

    /// Two program lines carry the same number.
    #[error("duplicate line number {0}")]
    DuplicateLine(u16),

    /// GOTO/GOSUB/THEN target that is not a line of the program.
    #[error("?UNDEF'D STATEMENT ERROR IN {line}")]
    UndefinedLine { line: u16, target: u16 },

    #[error("?RETURN WITHOUT GOSUB ERROR IN {line}")]
    ReturnWithoutGosub { line: u16 },

    #[error("?NEXT WITHOUT FOR ERROR IN {line}")]
    NextWithoutFor { line: u16 },

    /// String where a number was required, or vice versa.
    #[error("?TYPE MISMATCH ERROR IN {line}")]
    TypeMismatch { line: u16 },

    #[error("?DIVISION BY ZERO ERROR IN {line}")]
    DivisionByZero { line: u16 },

    /// Arithmetic left the representable range (also raised when AND/OR
    /// operands fall outside 16-bit integers, as on the machine).
    #[error("?OVERFLOW ERROR IN {line}")]
    NumericOverflow { line: u16 },

    /// Negative argument, or argument outside a builtin's domain.
    #[error("?ILLEGAL QUANTITY ERROR IN {line}")]
    IllegalQuantity { line: u16 },

    #[error("?BAD SUBSCRIPT ERROR IN {line}")]
    SubscriptOutOfRange { line: u16 },

    #[error("?REDIM'D ARRAY ERROR IN {line}")]
    RedimensionedArray { line: u16 },

    /// READ past the last DATA item.
    #[error("?OUT OF DATA ERROR IN {line}")]
    OutOfData { line: u16 },

    /// GOSUB or FOR nesting beyond the implementation caps.
    #[error("?OUT OF MEMORY ERROR IN {line}")]
    StackOverflow { line: u16 },
}

impl BasicError {
    /// The BASIC line the error is anchored to, when one is known.
    pub fn line(&self) -> Option<u16> {
        match self {
            Self::BadToken(_)
            | Self::Truncated
            | Self::UnterminatedString
            | Self::DuplicateLine(_) => None,
            Self::Syntax { line, .. }
            | Self::UndefinedLine { line, .. }
            | Self::ReturnWithoutGosub { line }
            | Self::NextWithoutFor { line }
            | Self::TypeMismatch { line }
            | Self::DivisionByZero { line }
            | Self::NumericOverflow { line }
            | Self::IllegalQuantity { line }
            | Self::SubscriptOutOfRange { line }
            | Self::RedimensionedArray { line }
            | Self::OutOfData { line }
            | Self::StackOverflow { line } => Some(*line),
        }
    }

    /// True for errors produced before execution starts (decode + parse).
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::BadToken(_)
                | Self::Truncated
                | Self::UnterminatedString
                | Self::Syntax { .. }
                | Self::DuplicateLine(_)
        )
    }
}
