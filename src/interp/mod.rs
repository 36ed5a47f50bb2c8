//! The tree-walking interpreter.
//!
//! One [`Interpreter::step`] executes one statement and returns promptly;
//! the only suspension point is INPUT, which polls the screen's input slot
//! (and the quit flag) until the frontend delivers a line. Control flow is
//! explicit: GOSUB and FOR live on their own stacks, never on the host call
//! stack, so RETURN WITHOUT GOSUB stays detectable and cancellation stays
//! trivial.

mod eval;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ast::{LValue, PrintItem, Statement, ThenBranch};
use crate::error::{BasicError, Result};
use crate::program::Program;
use crate::screen::{ColorTarget, Screen};
use crate::value::{self, Value};

/// GOSUB nesting cap; the ROM managed about two dozen levels, this is headroom.
const MAX_GOSUB_DEPTH: usize = 256;
/// FOR nesting cap.
const MAX_FOR_DEPTH: usize = 64;
/// Poll interval while INPUT waits on the frontend.
const INPUT_POLL: Duration = Duration::from_millis(10);

/// What one step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// More statements to run.
    Running,
    /// END/STOP reached, or execution fell off the last line.
    Ended,
    /// The quit flag was raised.
    Terminated,
}

/// Execution position: indexes into the ordered program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pos {
    line: usize,
    stmt: usize,
}

#[derive(Debug, Clone)]
struct ForFrame {
    var: String,
    limit: f64,
    step: f64,
    resume: Pos,
}

/// A dimensioned array: inclusive bounds, row-major backing store.
#[derive(Debug, Clone)]
struct Array {
    dims: Vec<usize>,
    values: Vec<Value>,
}

impl Array {
    fn new(name: &str, dims: Vec<usize>) -> Self {
        let size = dims.iter().map(|d| d + 1).product();
        Self {
            values: vec![Value::default_for(name); size],
            dims,
        }
    }

    /// Flat offset of `indices`, or `None` when out of range.
    fn offset(&self, indices: &[i64]) -> Option<usize> {
        if indices.len() != self.dims.len() {
            return None;
        }
        let mut offset = 0usize;
        for (&index, &dim) in indices.iter().zip(&self.dims) {
            if index < 0 || index as usize > dim {
                return None;
            }
            offset = offset * (dim + 1) + index as usize;
        }
        Some(offset)
    }
}

/// Interpreter state over a parsed [`Program`].
pub struct Interpreter {
    program: Arc<Program>,
    vars: HashMap<String, Value>,
    arrays: HashMap<String, Array>,
    gosub_stack: Vec<Pos>,
    for_stack: Vec<ForFrame>,
    data_cursor: usize,
    pos: Pos,
    pub(crate) rng: StdRng,
    screen: Arc<Mutex<Screen>>,
    quit: Arc<AtomicBool>,
    /// Every POKE lands here, observable through PEEK.
    pokes: HashMap<u16, u8>,
    done: bool,
}

/// Internal result of executing one statement.
enum Flow {
    /// Fall through to the next statement.
    Advance,
    /// The statement repositioned the program counter itself.
    Jumped,
    /// END/STOP.
    Halt,
    /// Quit flag observed while blocked.
    Quit,
}

impl Interpreter {
    pub fn new(program: Program, screen: Arc<Mutex<Screen>>, seed: u64) -> Self {
        Self {
            program: Arc::new(program),
            vars: HashMap::new(),
            arrays: HashMap::new(),
            gosub_stack: Vec::new(),
            for_stack: Vec::new(),
            data_cursor: 0,
            pos: Pos { line: 0, stmt: 0 },
            rng: StdRng::seed_from_u64(seed),
            screen,
            quit: Arc::new(AtomicBool::new(false)),
            pokes: HashMap::new(),
            done: false,
        }
    }

    /// The shared quit flag; the frontend raises it to stop the run.
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    pub fn screen(&self) -> Arc<Mutex<Screen>> {
        Arc::clone(&self.screen)
    }

    /// Value a POKE left at `addr`, if any.
    pub fn poked(&self, addr: u16) -> Option<u8> {
        self.pokes.get(&addr).copied()
    }

    /// Execute one statement.
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.done {
            return Ok(StepOutcome::Ended);
        }
        if self.quit.load(Ordering::Relaxed) {
            return Ok(StepOutcome::Terminated);
        }

        // Move past exhausted lines (and off the end of the program).
        let program = Arc::clone(&self.program);
        loop {
            if self.pos.line >= program.len() {
                self.done = true;
                return Ok(StepOutcome::Ended);
            }
            if self.pos.stmt < program.line(self.pos.line).statements.len() {
                break;
            }
            self.pos = Pos {
                line: self.pos.line + 1,
                stmt: 0,
            };
        }

        let statement = &program.line(self.pos.line).statements[self.pos.stmt];
        match self.exec(statement)? {
            Flow::Advance => {
                self.pos.stmt += 1;
                Ok(StepOutcome::Running)
            }
            Flow::Jumped => Ok(StepOutcome::Running),
            Flow::Halt => {
                self.done = true;
                Ok(StepOutcome::Ended)
            }
            Flow::Quit => Ok(StepOutcome::Terminated),
        }
    }

    /// Step until the program ends or `max_steps` is exhausted.
    /// Used by tests and the headless runner; the TUI paces itself.
    pub fn run(&mut self, max_steps: u64) -> Result<StepOutcome> {
        for _ in 0..max_steps {
            match self.step()? {
                StepOutcome::Running => {}
                outcome => return Ok(outcome),
            }
        }
        Ok(StepOutcome::Running)
    }

    /// BASIC line number of the statement about to run (for diagnostics).
    pub(crate) fn lineno(&self) -> u16 {
        if self.pos.line < self.program.len() {
            self.program.line(self.pos.line).number
        } else {
            self.program
                .lines()
                .last()
                .map(|l| l.number)
                .unwrap_or(0)
        }
    }

    fn exec(&mut self, statement: &Statement) -> Result<Flow> {
        match statement {
            Statement::Rem | Statement::Data(_) => Ok(Flow::Advance),
            Statement::End | Statement::Stop => Ok(Flow::Halt),
            Statement::Print(items) => self.exec_print(items),
            Statement::Input { prompt, targets } => self.exec_input(prompt.as_deref(), targets),
            Statement::Let { target, expr } => {
                let value = self.eval(expr)?;
                self.assign(target, value)?;
                Ok(Flow::Advance)
            }
            Statement::If { cond, then } => {
                let truthy = self.eval_number(cond)? != 0.0;
                if !truthy {
                    self.pos = Pos {
                        line: self.pos.line + 1,
                        stmt: 0,
                    };
                    return Ok(Flow::Jumped);
                }
                match then {
                    ThenBranch::Goto(target) => {
                        self.jump(*target)?;
                        Ok(Flow::Jumped)
                    }
                    ThenBranch::Inline => Ok(Flow::Advance),
                }
            }
            Statement::Goto(target) => {
                self.jump(*target)?;
                Ok(Flow::Jumped)
            }
            Statement::Gosub(target) => {
                self.push_gosub()?;
                self.jump(*target)?;
                Ok(Flow::Jumped)
            }
            Statement::Return => {
                let resume = self
                    .gosub_stack
                    .pop()
                    .ok_or(BasicError::ReturnWithoutGosub { line: self.lineno() })?;
                self.pos = resume;
                Ok(Flow::Jumped)
            }
            Statement::For {
                var,
                from,
                to,
                step,
            } => self.exec_for(var, from, to, step.as_ref()),
            Statement::Next(var) => self.exec_next(var.as_deref()),
            Statement::Dim(declarations) => {
                for (name, dims) in declarations {
                    self.exec_dim(name, dims)?;
                }
                Ok(Flow::Advance)
            }
            Statement::Read(targets) => {
                for target in targets {
                    self.exec_read_one(target)?;
                }
                Ok(Flow::Advance)
            }
            Statement::Restore => {
                self.data_cursor = 0;
                Ok(Flow::Advance)
            }
            Statement::On {
                expr,
                targets,
                gosub,
            } => self.exec_on(expr, targets, *gosub),
            Statement::Poke { addr, value } => self.exec_poke(addr, value),
            Statement::Run => {
                self.vars.clear();
                self.arrays.clear();
                self.gosub_stack.clear();
                self.for_stack.clear();
                self.data_cursor = 0;
                self.pos = Pos { line: 0, stmt: 0 };
                Ok(Flow::Jumped)
            }
        }
    }

    fn exec_print(&mut self, items: &[PrintItem]) -> Result<Flow> {
        let mut suppress_newline = false;
        for item in items {
            suppress_newline = false;
            match item {
                PrintItem::Expr(expr) => {
                    let value = self.eval(expr)?;
                    let mut text = value.display_text();
                    if value.is_number() {
                        text.push(' ');
                    }
                    self.screen.lock().unwrap().print(&text);
                }
                PrintItem::Semicolon => suppress_newline = true,
                PrintItem::Comma => {
                    let mut screen = self.screen.lock().unwrap();
                    let (_, col) = screen.cursor();
                    if col >= 30 {
                        screen.newline();
                    } else {
                        screen.spc((col / 10 + 1) * 10 - col);
                    }
                    suppress_newline = true;
                }
                PrintItem::Tab(expr) => {
                    let n = self.eval_index(expr)?;
                    if n < 0 {
                        return Err(BasicError::IllegalQuantity { line: self.lineno() });
                    }
                    self.screen.lock().unwrap().tab(n as usize);
                }
                PrintItem::Spc(expr) => {
                    let n = self.eval_index(expr)?;
                    if n < 0 {
                        return Err(BasicError::IllegalQuantity { line: self.lineno() });
                    }
                    self.screen.lock().unwrap().spc(n as usize);
                }
            }
        }
        if !suppress_newline {
            self.screen.lock().unwrap().newline();
        }
        Ok(Flow::Advance)
    }

    fn exec_input(&mut self, prompt: Option<&str>, targets: &[LValue]) -> Result<Flow> {
        if let Some(text) = prompt {
            self.screen.lock().unwrap().print(text);
        }
        let mut pending: Vec<&LValue> = targets.iter().collect();
        let mut marker = "? ";

        while !pending.is_empty() {
            self.screen.lock().unwrap().print(marker);
            let Some(line) = self.wait_for_line() else {
                return Ok(Flow::Quit);
            };
            {
                // Echo the accepted line, the way typing did on the machine.
                let mut screen = self.screen.lock().unwrap();
                screen.print(&line);
                screen.newline();
            }

            let fields: Vec<&str> = line.split(',').collect();
            let mut accepted = 0;
            let mut redo = false;
            for (field, target) in fields.iter().zip(pending.iter()) {
                let target_name = &target.name;
                let value = if value::is_string_name(target_name) {
                    Value::Str(field.trim().to_string())
                } else {
                    match value::parse_number_exact(field) {
                        Some(n) => Value::Number(n),
                        None => {
                            redo = true;
                            break;
                        }
                    }
                };
                self.assign(target, value)?;
                accepted += 1;
            }
            pending.drain(..accepted);
            if redo {
                marker = "? ";
            } else if !pending.is_empty() {
                // The line ran dry before the target list did.
                marker = "?? ";
            }
        }
        Ok(Flow::Advance)
    }

    /// Block until the frontend delivers a line; `None` means quit.
    fn wait_for_line(&mut self) -> Option<String> {
        self.screen.lock().unwrap().set_awaiting_input(true);
        loop {
            if self.quit.load(Ordering::Relaxed) {
                self.screen.lock().unwrap().set_awaiting_input(false);
                return None;
            }
            // Note: take the line in its own scope; the guard must be gone
            // before the awaiting flag is cleared below.
            let taken = self.screen.lock().unwrap().take_line();
            if let Some(line) = taken {
                self.screen.lock().unwrap().set_awaiting_input(false);
                return Some(line);
            }
            std::thread::sleep(INPUT_POLL);
        }
    }

    fn exec_for(
        &mut self,
        var: &str,
        from: &crate::ast::Expr,
        to: &crate::ast::Expr,
        step: Option<&crate::ast::Expr>,
    ) -> Result<Flow> {
        let start = self.eval_number(from)?;
        let limit = self.eval_number(to)?;
        let step = match step {
            Some(expr) => self.eval_number(expr)?,
            None => 1.0,
        };

        // Re-using a live counter pops its frame and everything above it.
        if let Some(idx) = self.for_stack.iter().position(|f| f.var == var) {
            self.for_stack.truncate(idx);
        }
        if self.for_stack.len() >= MAX_FOR_DEPTH {
            return Err(BasicError::StackOverflow { line: self.lineno() });
        }

        self.vars.insert(var.to_string(), Value::Number(start));
        self.for_stack.push(ForFrame {
            var: var.to_string(),
            limit,
            step,
            resume: Pos {
                line: self.pos.line,
                stmt: self.pos.stmt + 1,
            },
        });
        Ok(Flow::Advance)
    }

    fn exec_next(&mut self, var: Option<&str>) -> Result<Flow> {
        let idx = match var {
            Some(name) => self
                .for_stack
                .iter()
                .rposition(|f| f.var == name)
                .ok_or(BasicError::NextWithoutFor { line: self.lineno() })?,
            None => {
                if self.for_stack.is_empty() {
                    return Err(BasicError::NextWithoutFor { line: self.lineno() });
                }
                self.for_stack.len() - 1
            }
        };

        let frame = self.for_stack[idx].clone();
        let current = self
            .vars
            .get(&frame.var)
            .and_then(Value::as_number)
            .unwrap_or(0.0);
        let counter = current + frame.step;
        self.vars
            .insert(frame.var.clone(), Value::Number(counter));

        let finished = if frame.step >= 0.0 {
            counter > frame.limit
        } else {
            counter < frame.limit
        };

        if finished {
            self.for_stack.truncate(idx);
            Ok(Flow::Advance)
        } else {
            self.for_stack.truncate(idx + 1);
            self.pos = frame.resume;
            Ok(Flow::Jumped)
        }
    }

    fn exec_dim(&mut self, name: &str, dims: &[crate::ast::Expr]) -> Result<Flow> {
        if self.arrays.contains_key(name) {
            return Err(BasicError::RedimensionedArray { line: self.lineno() });
        }
        let mut sizes = Vec::with_capacity(dims.len());
        for expr in dims {
            let size = self.eval_index(expr)?;
            if size < 0 {
                return Err(BasicError::IllegalQuantity { line: self.lineno() });
            }
            sizes.push(size as usize);
        }
        self.arrays
            .insert(name.to_string(), Array::new(name, sizes));
        Ok(Flow::Advance)
    }

    fn exec_read_one(&mut self, target: &LValue) -> Result<()> {
        let item = self
            .program
            .data()
            .get(self.data_cursor)
            .ok_or(BasicError::OutOfData { line: self.lineno() })?
            .clone();
        self.data_cursor += 1;

        let value = if value::is_string_name(&target.name) {
            Value::Str(item)
        } else if item.trim().is_empty() {
            // An empty DATA field reads as zero.
            Value::Number(0.0)
        } else {
            Value::Number(
                value::parse_number_exact(&item)
                    .ok_or(BasicError::TypeMismatch { line: self.lineno() })?,
            )
        };
        self.assign(target, value)
    }

    fn exec_on(&mut self, expr: &crate::ast::Expr, targets: &[u16], gosub: bool) -> Result<Flow> {
        let selector = self.eval_number(expr)?.trunc();
        if selector < 0.0 || selector > 255.0 {
            return Err(BasicError::IllegalQuantity { line: self.lineno() });
        }
        let k = selector as usize;
        if k == 0 || k > targets.len() {
            return Ok(Flow::Advance);
        }
        if gosub {
            self.push_gosub()?;
        }
        self.jump(targets[k - 1])?;
        Ok(Flow::Jumped)
    }

    fn exec_poke(&mut self, addr: &crate::ast::Expr, value: &crate::ast::Expr) -> Result<Flow> {
        let addr = self.eval_index(addr)?;
        if !(0..=65535).contains(&addr) {
            return Err(BasicError::IllegalQuantity { line: self.lineno() });
        }
        let addr = addr as u16;
        let byte = (self.eval_index(value)?.rem_euclid(256)) as u8;
        self.pokes.insert(addr, byte);

        let mut screen = self.screen.lock().unwrap();
        match addr {
            53280 => screen.poke_color(ColorTarget::Border, byte),
            53281 => screen.poke_color(ColorTarget::Background, byte),
            646 => screen.poke_color(ColorTarget::Text, byte),
            // Character set, key repeat, and one stray address programs
            // poke anyway: accepted, side table only.
            53272 | 650 | 1690 => {}
            _ => {}
        }
        Ok(Flow::Advance)
    }

    fn push_gosub(&mut self) -> Result<()> {
        if self.gosub_stack.len() >= MAX_GOSUB_DEPTH {
            return Err(BasicError::StackOverflow { line: self.lineno() });
        }
        self.gosub_stack.push(Pos {
            line: self.pos.line,
            stmt: self.pos.stmt + 1,
        });
        Ok(())
    }

    fn jump(&mut self, target: u16) -> Result<()> {
        let line = self
            .program
            .position_of(target)
            .ok_or(BasicError::UndefinedLine {
                line: self.lineno(),
                target,
            })?;
        self.pos = Pos { line, stmt: 0 };
        Ok(())
    }

    /// Store a value through an lvalue, with type checking and implicit
    /// array creation.
    fn assign(&mut self, target: &LValue, value: Value) -> Result<()> {
        let value = self.coerce_for(&target.name, value)?;
        if target.is_scalar() {
            self.vars.insert(target.name.clone(), value);
            return Ok(());
        }

        let mut indices = Vec::with_capacity(target.subscripts.len());
        for expr in &target.subscripts {
            indices.push(self.eval_index(expr)?);
        }
        let line = self.lineno();
        let array = self
            .arrays
            .entry(target.name.clone())
            .or_insert_with(|| Array::new(&target.name, vec![10; target.subscripts.len()]));
        let offset = array
            .offset(&indices)
            .ok_or(BasicError::SubscriptOutOfRange { line })?;
        array.values[offset] = value;
        Ok(())
    }

    /// Array element fetch with implicit creation.
    pub(crate) fn array_get(&mut self, name: &str, indices: &[i64]) -> Result<Value> {
        let line = self.lineno();
        let array = self
            .arrays
            .entry(name.to_string())
            .or_insert_with(|| Array::new(name, vec![10; indices.len()]));
        let offset = array
            .offset(indices)
            .ok_or(BasicError::SubscriptOutOfRange { line })?;
        Ok(array.values[offset].clone())
    }

    pub(crate) fn scalar_get(&self, name: &str) -> Value {
        self.vars
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::default_for(name))
    }

    /// Type-check a value against a variable name; integer names truncate.
    fn coerce_for(&self, name: &str, value: Value) -> Result<Value> {
        match (&value, value::is_string_name(name)) {
            (Value::Str(_), true) => Ok(value),
            (Value::Number(n), false) => {
                if value::is_int_name(name) {
                    Ok(Value::Number(n.trunc()))
                } else {
                    Ok(value)
                }
            }
            _ => Err(BasicError::TypeMismatch { line: self.lineno() }),
        }
    }
}

/// RNG seed: the `SEED` environment variable when set, system time otherwise.
pub fn default_seed() -> u64 {
    if let Ok(text) = std::env::var("SEED") {
        if let Ok(seed) = text.trim().parse() {
            return seed;
        }
        log::warn!("ignoring unparseable SEED={text:?}");
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
