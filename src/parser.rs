//! Statement parsing.
//!
//! Lines come in as canonical text (typed, or recovered by [`crate::prg`]);
//! each is lexed through the normalization passes and parsed into the flat
//! per-line statement list the interpreter executes. There is no recovery:
//! a program either parses completely or is rejected.

use crate::ast::{BinOp, Builtin, Expr, LValue, PrintItem, Statement, ThenBranch, UnaryOp};
use crate::error::{BasicError, Result};
use crate::lexer::{self, Spanned, Tok};
use crate::program::{Line, Program};

/// Highest line number the machine accepts.
const MAX_LINENO: u32 = 63999;

/// Parse a whole source text into a program.
pub fn parse_source(source: &str) -> Result<Program> {
    let mut lines = Vec::new();
    for raw in source.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        lines.push(parse_line(raw)?);
    }
    Program::from_lines(lines)
}

/// Parse one `number statements…` line.
pub fn parse_line(raw: &str) -> Result<Line> {
    let digits = raw.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Err(BasicError::Syntax {
            line: 0,
            col: 0,
            reason: format!("line has no line number: {raw:?}"),
        });
    }
    let number: u32 = raw[..digits].parse().map_err(|_| BasicError::Syntax {
        line: 0,
        col: 0,
        reason: format!("bad line number in {raw:?}"),
    })?;
    if number > MAX_LINENO {
        return Err(BasicError::Syntax {
            line: 0,
            col: 0,
            reason: format!("line number {number} out of range"),
        });
    }
    let number = number as u16;

    let tokens = lexer::lex(&raw[digits..], number)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        lineno: number,
    };
    let statements = parser.parse_statements()?;
    Ok(Line { number, statements })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    lineno: u16,
}

impl Parser {
    fn parse_statements(&mut self) -> Result<Vec<Statement>> {
        let mut out = Vec::new();
        loop {
            // Consecutive colons are empty statements.
            while self.eat(&Tok::Colon) {}
            if self.at_end() {
                return Ok(out);
            }
            self.parse_statement(&mut out)?;
            if self.at_end() {
                return Ok(out);
            }
            if self.peek() != Some(&Tok::Colon) {
                return Err(self.err("expected : or end of line"));
            }
        }
    }

    fn parse_statement(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        match self.peek().cloned() {
            Some(Tok::Keyword(kw)) => {
                self.pos += 1;
                match kw {
                    "PRINT" => {
                        let items = self.parse_print_items()?;
                        out.push(Statement::Print(items));
                    }
                    "INPUT" => {
                        let statement = self.parse_input()?;
                        out.push(statement);
                    }
                    "IF" => return self.parse_if(out),
                    "GOTO" => {
                        let target = self.parse_line_target()?;
                        out.push(Statement::Goto(target));
                    }
                    "GO" => {
                        self.expect_keyword("TO")?;
                        let target = self.parse_line_target()?;
                        out.push(Statement::Goto(target));
                    }
                    "GOSUB" => {
                        let target = self.parse_line_target()?;
                        out.push(Statement::Gosub(target));
                    }
                    "RETURN" => out.push(Statement::Return),
                    "FOR" => {
                        let statement = self.parse_for()?;
                        out.push(statement);
                    }
                    "NEXT" => self.parse_next(out)?,
                    "DIM" => {
                        let statement = self.parse_dim()?;
                        out.push(statement);
                    }
                    "DATA" => {
                        let items = self.parse_data_items()?;
                        out.push(Statement::Data(items));
                    }
                    "READ" => {
                        let targets = self.parse_lvalue_list()?;
                        out.push(Statement::Read(targets));
                    }
                    "RESTORE" => out.push(Statement::Restore),
                    "ON" => {
                        let statement = self.parse_on()?;
                        out.push(statement);
                    }
                    "POKE" => {
                        let addr = self.parse_expr()?;
                        self.expect(&Tok::Comma)?;
                        let value = self.parse_expr()?;
                        out.push(Statement::Poke { addr, value });
                    }
                    "LET" => {
                        let statement = self.parse_assignment()?;
                        out.push(statement);
                    }
                    "END" => out.push(Statement::End),
                    "STOP" => out.push(Statement::Stop),
                    "RUN" => out.push(Statement::Run),
                    "REM" => {
                        // The verbatim tail is the last token of the line.
                        if let Some(Tok::RemTail(_)) = self.peek() {
                            self.pos += 1;
                        }
                        out.push(Statement::Rem);
                    }
                    other => return Err(self.err(&format!("{other} not valid here"))),
                }
                Ok(())
            }
            Some(Tok::Ident(_)) => {
                let statement = self.parse_assignment()?;
                out.push(statement);
                Ok(())
            }
            _ => Err(self.err("expected statement")),
        }
    }

    /// IF condition, then branch. Inline branches flatten into `out`.
    fn parse_if(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        let cond = self.parse_expr()?;

        if self.eat(&Tok::Keyword("GOTO")) {
            let target = self.parse_line_target()?;
            out.push(Statement::If {
                cond,
                then: ThenBranch::Goto(target),
            });
            return Ok(());
        }

        let had_then = self.eat(&Tok::Keyword("THEN"));
        if let Some(Tok::Number(_)) = self.peek() {
            let target = self.parse_line_target()?;
            out.push(Statement::If {
                cond,
                then: ThenBranch::Goto(target),
            });
            // Anything after the jump on this line is unreachable but must
            // still parse.
            if !self.at_end() {
                self.expect(&Tok::Colon)?;
                let rest = self.parse_statements()?;
                out.extend(rest);
            }
            return Ok(());
        }
        if !had_then {
            return Err(self.err("expected THEN, GOTO or line number after IF"));
        }

        out.push(Statement::If {
            cond,
            then: ThenBranch::Inline,
        });
        let branch = self.parse_statements()?;
        if branch.is_empty() {
            return Err(self.err("expected statement after THEN"));
        }
        out.extend(branch);
        Ok(())
    }

    fn parse_print_items(&mut self) -> Result<Vec<PrintItem>> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None | Some(Tok::Colon) => return Ok(items),
                Some(Tok::Comma) => {
                    self.pos += 1;
                    items.push(PrintItem::Comma);
                }
                Some(Tok::Semicolon) => {
                    self.pos += 1;
                    items.push(PrintItem::Semicolon);
                }
                Some(Tok::Ident(name)) if name == "TAB" && self.peek2() == Some(&Tok::LParen) => {
                    self.pos += 2;
                    let expr = self.parse_expr()?;
                    self.expect(&Tok::RParen)?;
                    items.push(PrintItem::Tab(expr));
                }
                Some(Tok::Ident(name)) if name == "SPC" && self.peek2() == Some(&Tok::LParen) => {
                    self.pos += 2;
                    let expr = self.parse_expr()?;
                    self.expect(&Tok::RParen)?;
                    items.push(PrintItem::Spc(expr));
                }
                _ => {
                    let expr = self.parse_expr()?;
                    items.push(PrintItem::Expr(expr));
                }
            }
        }
    }

    fn parse_input(&mut self) -> Result<Statement> {
        let mut prompt = None;
        if let Some(Tok::Str(text)) = self.peek() {
            let text = text.clone();
            if self.peek2() == Some(&Tok::Semicolon) || self.peek2() == Some(&Tok::Comma) {
                prompt = Some(text);
                self.pos += 2;
            }
        }
        let targets = self.parse_lvalue_list()?;
        Ok(Statement::Input { prompt, targets })
    }

    fn parse_for(&mut self) -> Result<Statement> {
        let var = self.expect_ident()?;
        if var.ends_with('$') || var.ends_with('%') {
            return Err(self.err("FOR counter must be a plain numeric variable"));
        }
        self.expect(&Tok::Eq)?;
        let from = self.parse_expr()?;
        self.expect_keyword("TO")?;
        let to = self.parse_expr()?;
        let step = if self.eat(&Tok::Keyword("STEP")) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Statement::For {
            var,
            from,
            to,
            step,
        })
    }

    /// `NEXT`, `NEXT I`, or `NEXT I,J` (which closes two loops).
    fn parse_next(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        if let Some(Tok::Ident(_)) = self.peek() {
            loop {
                let name = self.expect_ident()?;
                out.push(Statement::Next(Some(name)));
                if !self.eat(&Tok::Comma) {
                    return Ok(());
                }
            }
        }
        out.push(Statement::Next(None));
        Ok(())
    }

    fn parse_dim(&mut self) -> Result<Statement> {
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_ident()?;
            self.expect(&Tok::LParen)?;
            let mut dims = vec![self.parse_expr()?];
            while self.eat(&Tok::Comma) {
                dims.push(self.parse_expr()?);
            }
            self.expect(&Tok::RParen)?;
            declarations.push((name, dims));
            if !self.eat(&Tok::Comma) {
                return Ok(Statement::Dim(declarations));
            }
        }
    }

    /// DATA items are literals, kept as raw text until READ gives them a
    /// type. Unquoted items may span several words (`AC MILAN`); the lexer's
    /// gap markers put their internal spacing back, while whitespace around
    /// the comma delimiters stays insignificant.
    fn parse_data_items(&mut self) -> Result<Vec<String>> {
        let mut items = Vec::new();
        let mut current = String::new();
        let mut pending = false;
        loop {
            let Some(spanned) = self.tokens.get(self.pos).cloned() else {
                if pending || !items.is_empty() {
                    items.push(std::mem::take(&mut current));
                }
                return Ok(items);
            };
            match spanned.tok {
                Tok::Colon => {
                    if pending || !items.is_empty() {
                        items.push(std::mem::take(&mut current));
                    }
                    return Ok(items);
                }
                Tok::Comma => {
                    self.pos += 1;
                    items.push(std::mem::take(&mut current));
                    pending = true;
                }
                tok => {
                    self.pos += 1;
                    if spanned.gap && !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&data_text(&tok));
                    pending = true;
                }
            }
        }
    }

    fn parse_on(&mut self) -> Result<Statement> {
        let expr = self.parse_expr()?;
        let gosub = if self.eat(&Tok::Keyword("GOSUB")) {
            true
        } else if self.eat(&Tok::Keyword("GOTO")) {
            false
        } else {
            return Err(self.err("expected GOTO or GOSUB after ON"));
        };
        let mut targets = vec![self.parse_line_target()?];
        while self.eat(&Tok::Comma) {
            targets.push(self.parse_line_target()?);
        }
        Ok(Statement::On {
            expr,
            targets,
            gosub,
        })
    }

    fn parse_assignment(&mut self) -> Result<Statement> {
        let target = self.parse_lvalue()?;
        self.expect(&Tok::Eq)?;
        let expr = self.parse_expr()?;
        Ok(Statement::Let { target, expr })
    }

    fn parse_lvalue_list(&mut self) -> Result<Vec<LValue>> {
        let mut out = vec![self.parse_lvalue()?];
        while self.eat(&Tok::Comma) {
            out.push(self.parse_lvalue()?);
        }
        Ok(out)
    }

    fn parse_lvalue(&mut self) -> Result<LValue> {
        let name = self.expect_ident()?;
        if !self.eat(&Tok::LParen) {
            return Ok(LValue::scalar(name));
        }
        let mut subscripts = vec![self.parse_expr()?];
        while self.eat(&Tok::Comma) {
            subscripts.push(self.parse_expr()?);
        }
        self.expect(&Tok::RParen)?;
        Ok(LValue { name, subscripts })
    }

    // --- expressions, loosest first: OR, AND, relational, +-, */, unary, ^

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::Keyword("OR")) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_rel()?;
        while self.eat(&Tok::Keyword("AND")) {
            let rhs = self.parse_rel()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Eq) => BinOp::Eq,
                Some(Tok::Ne) => BinOp::Ne,
                Some(Tok::Lt) => BinOp::Lt,
                Some(Tok::Le) => BinOp::Le,
                Some(Tok::Gt) => BinOp::Gt,
                Some(Tok::Ge) => BinOp::Ge,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_add()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_pow()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_pow()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_pow(&mut self) -> Result<Expr> {
        let lhs = self.parse_unary()?;
        if self.eat(&Tok::Caret) {
            // Right-associative.
            let rhs = self.parse_pow()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Tok::Minus) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)));
        }
        if self.eat(&Tok::Plus) {
            return self.parse_unary();
        }
        if self.eat(&Tok::Keyword("NOT")) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Tok::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Tok::Str(text)) => {
                self.pos += 1;
                Ok(Expr::Str(text))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                if !self.eat(&Tok::LParen) {
                    return Ok(Expr::Var(name));
                }
                let mut args = vec![self.parse_expr()?];
                while self.eat(&Tok::Comma) {
                    args.push(self.parse_expr()?);
                }
                self.expect(&Tok::RParen)?;
                match Builtin::from_name(&name) {
                    Some(builtin) => Ok(Expr::Call(builtin, args)),
                    None => Ok(Expr::Element(name, args)),
                }
            }
            _ => Err(self.err("expected expression")),
        }
    }

    // --- token plumbing

    fn parse_line_target(&mut self) -> Result<u16> {
        match self.peek() {
            Some(Tok::Number(value)) => {
                let value = *value;
                if value.fract() != 0.0 || !(0.0..=MAX_LINENO as f64).contains(&value) {
                    return Err(self.err("bad line number"));
                }
                self.pos += 1;
                Ok(value as u16)
            }
            _ => Err(self.err("expected line number")),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.err("expected variable name")),
        }
    }

    fn expect_keyword(&mut self, kw: &'static str) -> Result<()> {
        if self.eat(&Tok::Keyword(kw)) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {kw}")))
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {tok:?}")))
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|s| &s.tok)
    }

    fn peek2(&self) -> Option<&Tok> {
        self.tokens.get(self.pos + 1).map(|s| &s.tok)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn err(&self, reason: &str) -> BasicError {
        let col = self
            .tokens
            .get(self.pos)
            .map(|s| s.col)
            .unwrap_or_else(|| self.tokens.last().map(|s| s.col + 1).unwrap_or(0));
        BasicError::Syntax {
            line: self.lineno,
            col,
            reason: reason.to_string(),
        }
    }
}

fn data_text(tok: &Tok) -> String {
    match tok {
        Tok::Str(text) => text.clone(),
        Tok::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        Tok::Number(n) => format!("{n}"),
        Tok::Ident(name) => name.clone(),
        Tok::Keyword(kw) => (*kw).to_string(),
        Tok::Minus => "-".into(),
        Tok::Plus => "+".into(),
        other => format!("{other:?}"),
    }
}
