//! Statement and expression nodes.
//!
//! Plain enums, one variant per construct; the interpreter walks these
//! directly. A line's statements are stored flat: an IF with an inline
//! then-branch is followed in the same vector by the branch statements,
//! and a false condition skips to the next line, which is exactly the
//! machine's rule. It keeps every resumable position a
//! `(line, statement)` pair.

/// An assignable location: scalar, or array element with subscripts.
#[derive(Debug, Clone, PartialEq)]
pub struct LValue {
    pub name: String,
    pub subscripts: Vec<Expr>,
}

impl LValue {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscripts: Vec::new(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.subscripts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Int,
    Rnd,
    Chr,
    Asc,
    Val,
    Str,
    Mid,
    Left,
    Right,
    Len,
    Abs,
    Sgn,
    Sqr,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Atn,
    Peek,
    Fre,
    Pos,
}

impl Builtin {
    /// Resolve a name from source text; `None` means array reference.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "INT" => Self::Int,
            "RND" => Self::Rnd,
            "CHR$" => Self::Chr,
            "ASC" => Self::Asc,
            "VAL" => Self::Val,
            "STR$" => Self::Str,
            "MID$" => Self::Mid,
            "LEFT$" => Self::Left,
            "RIGHT$" => Self::Right,
            "LEN" => Self::Len,
            "ABS" => Self::Abs,
            "SGN" => Self::Sgn,
            "SQR" => Self::Sqr,
            "EXP" => Self::Exp,
            "LOG" => Self::Log,
            "SIN" => Self::Sin,
            "COS" => Self::Cos,
            "TAN" => Self::Tan,
            "ATN" => Self::Atn,
            "PEEK" => Self::Peek,
            "FRE" => Self::Fre,
            "POS" => Self::Pos,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    /// Scalar variable reference.
    Var(String),
    /// Array element reference.
    Element(String, Vec<Expr>),
    Call(Builtin, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// One item of a PRINT list.
#[derive(Debug, Clone, PartialEq)]
pub enum PrintItem {
    Expr(Expr),
    /// `,`: advance to the next 10-column zone.
    Comma,
    /// `;`: no separation.
    Semicolon,
    Tab(Expr),
    Spc(Expr),
}

/// Where a true IF condition goes.
#[derive(Debug, Clone, PartialEq)]
pub enum ThenBranch {
    /// `THEN 100`, `GOTO 100`, or a bare line number.
    Goto(u16),
    /// Inline statements; they follow the IF in the line's statement list.
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Print(Vec<PrintItem>),
    Input {
        prompt: Option<String>,
        targets: Vec<LValue>,
    },
    Let {
        target: LValue,
        expr: Expr,
    },
    If {
        cond: Expr,
        then: ThenBranch,
    },
    Goto(u16),
    Gosub(u16),
    Return,
    For {
        var: String,
        from: Expr,
        to: Expr,
        step: Option<Expr>,
    },
    Next(Option<String>),
    Dim(Vec<(String, Vec<Expr>)>),
    Data(Vec<String>),
    Read(Vec<LValue>),
    Restore,
    /// `ON expr GOTO/GOSUB n1,n2,…`
    On {
        expr: Expr,
        targets: Vec<u16>,
        gosub: bool,
    },
    Poke {
        addr: Expr,
        value: Expr,
    },
    End,
    Stop,
    Run,
    Rem,
}
