//! The parsed program: ordered lines plus a jump index and the DATA pool.

use std::collections::HashMap;

use crate::ast::Statement;
use crate::error::{BasicError, Result};

/// One numbered program line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub number: u16,
    pub statements: Vec<Statement>,
}

/// An immutable program: lines sorted ascending by number, a hash index for
/// O(1) jumps, and every DATA literal collected in program order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    lines: Vec<Line>,
    index: HashMap<u16, usize>,
    data: Vec<String>,
}

impl Program {
    /// Assemble a program from parsed lines. Lines are sorted by number;
    /// duplicates are rejected.
    pub fn from_lines(mut lines: Vec<Line>) -> Result<Self> {
        lines.sort_by_key(|l| l.number);
        let mut index = HashMap::with_capacity(lines.len());
        for (pos, line) in lines.iter().enumerate() {
            if index.insert(line.number, pos).is_some() {
                return Err(BasicError::DuplicateLine(line.number));
            }
        }

        let mut data = Vec::new();
        for line in &lines {
            for statement in &line.statements {
                if let Statement::Data(items) = statement {
                    data.extend(items.iter().cloned());
                }
            }
        }

        Ok(Self { lines, index, data })
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, pos: usize) -> &Line {
        &self.lines[pos]
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Position of a line number, if it exists.
    pub fn position_of(&self, number: u16) -> Option<usize> {
        self.index.get(&number).copied()
    }

    /// The concatenated DATA literals, in program order.
    pub fn data(&self) -> &[String] {
        &self.data
    }
}
