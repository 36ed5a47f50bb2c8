//! The 40×25 character screen.
//!
//! Owned by the interpreter, observed by the TUI under a shared lock. The
//! grid mirrors the C64 text screen: a fixed cell matrix, a cursor, border
//! and background colors out of the 16-entry palette, and one pending input
//! line that a frontend fills while an INPUT statement is waiting.

use crate::petscii::{self, Segment};

/// Screen width in characters.
pub const COLS: usize = 40;
/// Screen height in rows.
pub const ROWS: usize = 25;

/// The palette, indexed the machine's way: black, white, red, cyan, purple,
/// green, blue, yellow, orange, brown, light red, dark grey, grey,
/// light green, light blue, light grey.
pub const PALETTE: [(u8, u8, u8); 16] = [
    (0x00, 0x00, 0x00),
    (0xff, 0xff, 0xff),
    (0x88, 0x39, 0x32),
    (0x67, 0xb6, 0xbd),
    (0x8b, 0x3f, 0x96),
    (0x55, 0xa0, 0x49),
    (0x40, 0x31, 0x8d),
    (0xbf, 0xce, 0x72),
    (0x8b, 0x54, 0x29),
    (0x57, 0x42, 0x00),
    (0xb8, 0x69, 0x62),
    (0x50, 0x50, 0x50),
    (0x78, 0x78, 0x78),
    (0x94, 0xe0, 0x89),
    (0x78, 0x69, 0xc4),
    (0x9f, 0x9f, 0x9f),
];

/// Which color register a POKE addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTarget {
    Border,
    Background,
    Text,
}

/// One cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub reverse: bool,
}

impl Cell {
    const BLANK: Cell = Cell {
        ch: ' ',
        reverse: false,
    };
}

/// The screen state shared between interpreter and frontend.
#[derive(Debug, Clone)]
pub struct Screen {
    cells: Vec<Cell>,
    cursor_row: usize,
    cursor_col: usize,
    border: u8,
    background: u8,
    text: u8,
    reverse: bool,
    /// Line submitted by the frontend, waiting for the interpreter.
    pending_line: Option<String>,
    /// True while an INPUT statement is blocked on the frontend.
    awaiting_input: bool,
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen {
    /// A cleared screen with the machine's power-on colors
    /// (light blue border and text on a blue background).
    pub fn new() -> Self {
        Self {
            cells: vec![Cell::BLANK; COLS * ROWS],
            cursor_row: 0,
            cursor_col: 0,
            border: 14,
            background: 6,
            text: 14,
            reverse: false,
            pending_line: None,
            awaiting_input: false,
        }
    }

    /// Cursor position as `(row, col)`, 0-based.
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_row, self.cursor_col)
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.cells[row * COLS + col]
    }

    /// Palette indices `(border, background, text)`.
    pub fn colors(&self) -> (u8, u8, u8) {
        (self.border, self.background, self.text)
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.awaiting_input
    }

    /// Write text at the cursor, interpreting PETSCII placeholders.
    pub fn print(&mut self, text: &str) {
        for segment in petscii::segments(text) {
            match segment {
                Segment::Clear => self.clear(),
                Segment::ReverseToggle => self.reverse = !self.reverse,
                Segment::Text(run) => {
                    for ch in run.chars() {
                        self.put_char(ch);
                    }
                }
            }
        }
    }

    /// Move the cursor to column 0 of the next row, scrolling at the bottom.
    pub fn newline(&mut self) {
        self.cursor_col = 0;
        if self.cursor_row + 1 == ROWS {
            self.scroll_up();
        } else {
            self.cursor_row += 1;
        }
    }

    /// TAB(n): pad with spaces up to column `n`; never moves backward and
    /// never wraps, so the reachable columns top out at 39.
    pub fn tab(&mut self, n: usize) {
        let n = n.min(COLS - 1);
        while self.cursor_col < n {
            self.put_char(' ');
        }
    }

    /// SPC(n): write `n` spaces.
    pub fn spc(&mut self, n: usize) {
        for _ in 0..n {
            self.put_char(' ');
        }
    }

    /// Fill with blanks, home the cursor.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
        self.cursor_row = 0;
        self.cursor_col = 0;
    }

    pub fn reverse_on(&mut self) {
        self.reverse = true;
    }

    pub fn reverse_off(&mut self) {
        self.reverse = false;
    }

    /// Color POKE: the value is coerced into the 16-entry palette.
    pub fn poke_color(&mut self, target: ColorTarget, value: u8) {
        let idx = value % 16;
        match target {
            ColorTarget::Border => self.border = idx,
            ColorTarget::Background => self.background = idx,
            ColorTarget::Text => self.text = idx,
        }
    }

    /// The grid as text rows, trailing spaces trimmed.
    pub fn snapshot(&self) -> Vec<String> {
        (0..ROWS)
            .map(|row| {
                let line: String = (0..COLS).map(|col| self.cell(row, col).ch).collect();
                line.trim_end().to_string()
            })
            .collect()
    }

    // --- input line handoff -------------------------------------------------

    /// Frontend side: deliver a completed line. A no-op unless the
    /// interpreter is blocked in INPUT.
    pub fn submit_line(&mut self, line: String) {
        if self.awaiting_input {
            self.pending_line = Some(line);
        }
    }

    /// Interpreter side: mark INPUT as waiting (or done).
    pub fn set_awaiting_input(&mut self, awaiting: bool) {
        self.awaiting_input = awaiting;
        if !awaiting {
            self.pending_line = None;
        }
    }

    /// Interpreter side: collect the submitted line, if any.
    pub fn take_line(&mut self) -> Option<String> {
        self.pending_line.take()
    }

    /// True while a submitted line waits for the interpreter to collect it.
    pub fn has_pending_line(&self) -> bool {
        self.pending_line.is_some()
    }

    fn put_char(&mut self, ch: char) {
        self.cells[self.cursor_row * COLS + self.cursor_col] = Cell {
            ch,
            reverse: self.reverse,
        };
        self.cursor_col += 1;
        if self.cursor_col == COLS {
            self.cursor_col = 0;
            if self.cursor_row + 1 == ROWS {
                self.scroll_up();
            } else {
                self.cursor_row += 1;
            }
        }
    }

    /// Top row lost, bottom row cleared, cursor row unchanged.
    fn scroll_up(&mut self) {
        self.cells.copy_within(COLS.., 0);
        let last = COLS * (ROWS - 1);
        self.cells[last..].fill(Cell::BLANK);
    }
}
