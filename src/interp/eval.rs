//! Expression evaluation and the built-in functions.
//!
//! Comparisons yield -1/0; AND, OR and NOT work bitwise over 16-bit signed
//! integers, which makes them double as logical connectives on comparison
//! results. Programs lean on that.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ast::{BinOp, Builtin, Expr, UnaryOp};
use crate::error::{BasicError, Result};
use crate::value::{self, Value};

use super::Interpreter;

impl Interpreter {
    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Var(name) => Ok(self.scalar_get(name)),
            Expr::Element(name, subscripts) => {
                let mut indices = Vec::with_capacity(subscripts.len());
                for subscript in subscripts {
                    indices.push(self.eval_index(subscript)?);
                }
                self.array_get(name, &indices)
            }
            Expr::Call(builtin, args) => self.call(*builtin, args),
            Expr::Unary(op, inner) => self.eval_unary(*op, inner),
            Expr::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs),
        }
    }

    /// Evaluate and require a number.
    pub(crate) fn eval_number(&mut self, expr: &Expr) -> Result<f64> {
        self.eval(expr)?
            .as_number()
            .ok_or(BasicError::TypeMismatch { line: self.lineno() })
    }

    /// Evaluate and require a string.
    fn eval_string(&mut self, expr: &Expr) -> Result<String> {
        match self.eval(expr)? {
            Value::Str(s) => Ok(s),
            Value::Number(_) => Err(BasicError::TypeMismatch { line: self.lineno() }),
        }
    }

    /// Numeric evaluation floored to an integer, as subscripts are.
    pub(crate) fn eval_index(&mut self, expr: &Expr) -> Result<i64> {
        Ok(self.eval_number(expr)?.floor() as i64)
    }

    fn eval_unary(&mut self, op: UnaryOp, inner: &Expr) -> Result<Value> {
        match op {
            UnaryOp::Neg => Ok(Value::Number(-self.eval_number(inner)?)),
            UnaryOp::Not => {
                let operand = self.eval_number(inner)?;
                let operand = self.to_int16(operand)?;
                Ok(Value::Number(f64::from(!operand)))
            }
        }
    }

    fn eval_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let line = self.lineno();
        let lhs = self.eval(lhs)?;
        let rhs = self.eval(rhs)?;

        // `+` is the one operator that crosses into strings.
        if op == BinOp::Add {
            if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
                return Ok(Value::Str(format!("{a}{b}")));
            }
        }

        match op {
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let ordering = match (&lhs, &rhs) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                    _ => return Err(BasicError::TypeMismatch { line }),
                };
                let Some(ordering) = ordering else {
                    return Err(BasicError::NumericOverflow { line });
                };
                let truth = match op {
                    BinOp::Eq => ordering.is_eq(),
                    BinOp::Ne => ordering.is_ne(),
                    BinOp::Lt => ordering.is_lt(),
                    BinOp::Le => ordering.is_le(),
                    BinOp::Gt => ordering.is_gt(),
                    BinOp::Ge => ordering.is_ge(),
                    _ => unreachable!(),
                };
                Ok(Value::Number(if truth { -1.0 } else { 0.0 }))
            }
            BinOp::And | BinOp::Or => {
                let a = self.require_number(&lhs)?;
                let b = self.require_number(&rhs)?;
                let a = self.to_int16(a)?;
                let b = self.to_int16(b)?;
                let combined = if op == BinOp::And { a & b } else { a | b };
                Ok(Value::Number(f64::from(combined)))
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Pow => {
                let a = self.require_number(&lhs)?;
                let b = self.require_number(&rhs)?;
                let result = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => {
                        if b == 0.0 {
                            return Err(BasicError::DivisionByZero { line });
                        }
                        a / b
                    }
                    BinOp::Pow => a.powf(b),
                    _ => unreachable!(),
                };
                if result.is_nan() {
                    return Err(BasicError::IllegalQuantity { line });
                }
                if !result.is_finite() {
                    return Err(BasicError::NumericOverflow { line });
                }
                Ok(Value::Number(result))
            }
        }
    }

    fn call(&mut self, builtin: Builtin, args: &[Expr]) -> Result<Value> {
        let line = self.lineno();
        match builtin {
            Builtin::Int => Ok(Value::Number(self.eval_one(builtin, args)?.floor())),
            Builtin::Abs => Ok(Value::Number(self.eval_one(builtin, args)?.abs())),
            Builtin::Sgn => Ok(Value::Number({
                let x = self.eval_one(builtin, args)?;
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            })),
            Builtin::Sqr => {
                let x = self.eval_one(builtin, args)?;
                if x < 0.0 {
                    return Err(BasicError::IllegalQuantity { line });
                }
                Ok(Value::Number(x.sqrt()))
            }
            Builtin::Exp => {
                let result = self.eval_one(builtin, args)?.exp();
                if !result.is_finite() {
                    return Err(BasicError::NumericOverflow { line });
                }
                Ok(Value::Number(result))
            }
            Builtin::Log => {
                let x = self.eval_one(builtin, args)?;
                if x <= 0.0 {
                    return Err(BasicError::IllegalQuantity { line });
                }
                Ok(Value::Number(x.ln()))
            }
            Builtin::Sin => Ok(Value::Number(self.eval_one(builtin, args)?.sin())),
            Builtin::Cos => Ok(Value::Number(self.eval_one(builtin, args)?.cos())),
            Builtin::Tan => Ok(Value::Number(self.eval_one(builtin, args)?.tan())),
            Builtin::Atn => Ok(Value::Number(self.eval_one(builtin, args)?.atan())),
            Builtin::Rnd => {
                let x = self.eval_one(builtin, args)?;
                Ok(Value::Number(self.rnd(x)))
            }
            Builtin::Fre => {
                // Free BASIC memory on a stock machine; nobody allocates here.
                self.eval_one(builtin, args)?;
                Ok(Value::Number(38911.0))
            }
            Builtin::Pos => {
                self.eval_one(builtin, args)?;
                let (_, col) = self.screen().lock().unwrap().cursor();
                Ok(Value::Number(col as f64))
            }
            Builtin::Peek => {
                let addr = self.eval_one(builtin, args)?.floor();
                if !(0.0..=65535.0).contains(&addr) {
                    return Err(BasicError::IllegalQuantity { line });
                }
                Ok(Value::Number(f64::from(self.peek(addr as u16))))
            }
            Builtin::Chr => {
                let code = self.eval_one(builtin, args)?.floor();
                if !(0.0..=255.0).contains(&code) {
                    return Err(BasicError::IllegalQuantity { line });
                }
                Ok(Value::Str((code as u8 as char).to_string()))
            }
            Builtin::Asc => {
                self.arity(builtin, args, 1)?;
                let text = self.eval_string(&args[0])?;
                let first = text
                    .chars()
                    .next()
                    .ok_or(BasicError::IllegalQuantity { line })?;
                Ok(Value::Number(f64::from(first as u32 as u8)))
            }
            Builtin::Val => {
                self.arity(builtin, args, 1)?;
                let text = self.eval_string(&args[0])?;
                Ok(Value::Number(value::parse_number_prefix(&text)))
            }
            Builtin::Str => {
                let x = self.eval_one(builtin, args)?;
                Ok(Value::Str(value::format_number(x)))
            }
            Builtin::Len => {
                self.arity(builtin, args, 1)?;
                let text = self.eval_string(&args[0])?;
                Ok(Value::Number(text.chars().count() as f64))
            }
            Builtin::Left | Builtin::Right => {
                self.arity(builtin, args, 2)?;
                let text = self.eval_string(&args[0])?;
                let n = self.eval_index(&args[1])?;
                if n < 0 {
                    return Err(BasicError::IllegalQuantity { line });
                }
                let n = n as usize;
                let chars: Vec<char> = text.chars().collect();
                let taken: String = if builtin == Builtin::Left {
                    chars.iter().take(n).collect()
                } else {
                    chars[chars.len().saturating_sub(n)..].iter().collect()
                };
                Ok(Value::Str(taken))
            }
            Builtin::Mid => {
                if args.len() != 2 && args.len() != 3 {
                    return Err(self.bad_arity(builtin));
                }
                let text = self.eval_string(&args[0])?;
                let start = self.eval_index(&args[1])?;
                if start < 1 {
                    return Err(BasicError::IllegalQuantity { line });
                }
                let chars: Vec<char> = text.chars().collect();
                let from = (start - 1) as usize;
                if from >= chars.len() {
                    return Ok(Value::Str(String::new()));
                }
                let len = match args.get(2) {
                    Some(expr) => {
                        let len = self.eval_index(expr)?;
                        if len < 0 {
                            return Err(BasicError::IllegalQuantity { line });
                        }
                        len as usize
                    }
                    None => chars.len() - from,
                };
                Ok(Value::Str(chars[from..].iter().take(len).collect()))
            }
        }
    }

    /// RND(x): x < 0 reseeds deterministically from x, then draws.
    fn rnd(&mut self, x: f64) -> f64 {
        if x < 0.0 {
            self.rng = StdRng::seed_from_u64(x.to_bits());
        }
        self.rng.random::<f64>()
    }

    /// PEEK: the POKE side table first, then the live color registers.
    fn peek(&self, addr: u16) -> u8 {
        if let Some(value) = self.poked(addr) {
            return value;
        }
        let (border, background, text) = self.screen().lock().unwrap().colors();
        match addr {
            53280 => border,
            53281 => background,
            646 => text,
            _ => 0,
        }
    }

    fn require_number(&self, value: &Value) -> Result<f64> {
        value
            .as_number()
            .ok_or(BasicError::TypeMismatch { line: self.lineno() })
    }

    /// Truncate into the 16-bit range AND/OR/NOT operate on.
    fn to_int16(&self, x: f64) -> Result<i16> {
        let t = x.trunc();
        if !(-32768.0..=32767.0).contains(&t) {
            return Err(BasicError::NumericOverflow { line: self.lineno() });
        }
        Ok(t as i16)
    }

    fn eval_one(&mut self, builtin: Builtin, args: &[Expr]) -> Result<f64> {
        self.arity(builtin, args, 1)?;
        self.eval_number(&args[0])
    }

    fn arity(&self, builtin: Builtin, args: &[Expr], expected: usize) -> Result<()> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(self.bad_arity(builtin))
        }
    }

    fn bad_arity(&self, builtin: Builtin) -> BasicError {
        BasicError::Syntax {
            line: self.lineno(),
            col: 0,
            reason: format!("wrong argument count for {builtin:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::super::{Interpreter, StepOutcome};
    use crate::error::BasicError;
    use crate::parser::parse_source;
    use crate::screen::Screen;

    fn run(source: &str) -> Interpreter {
        let mut interpreter = Interpreter::new(
            parse_source(source).unwrap(),
            Arc::new(Mutex::new(Screen::new())),
            7,
        );
        assert_eq!(interpreter.run(100_000).unwrap(), StepOutcome::Ended);
        interpreter
    }

    fn run_err(source: &str) -> BasicError {
        let mut interpreter = Interpreter::new(
            parse_source(source).unwrap(),
            Arc::new(Mutex::new(Screen::new())),
            7,
        );
        interpreter.run(100_000).unwrap_err()
    }

    fn top_row(interpreter: &Interpreter) -> String {
        interpreter.screen().lock().unwrap().snapshot()[0].clone()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(top_row(&run("10 PRINT 2+3*4")), " 14");
        assert_eq!(top_row(&run("10 PRINT (2+3)*4")), " 20");
        assert_eq!(top_row(&run("10 PRINT 2^3^2")), " 512");
        assert_eq!(top_row(&run("10 PRINT -2^2")), " 4");
    }

    #[test]
    fn test_comparisons_yield_minus_one() {
        assert_eq!(top_row(&run("10 PRINT (1<2)")), "-1");
        assert_eq!(top_row(&run("10 PRINT (2<1)")), " 0");
        // Comparison results feed straight back into arithmetic.
        assert_eq!(top_row(&run("10 PRINT (1<2)*5")), "-5");
    }

    #[test]
    fn test_and_or_not_are_bitwise() {
        assert_eq!(top_row(&run("10 PRINT 6 AND 3")), " 2");
        assert_eq!(top_row(&run("10 PRINT 6 OR 3")), " 7");
        assert_eq!(top_row(&run("10 PRINT NOT 0")), "-1");
        assert_eq!(top_row(&run("10 PRINT (1=1) AND (2=2)")), "-1");
    }

    #[test]
    fn test_string_concat_and_mismatch() {
        assert_eq!(top_row(&run("10 PRINT \"AB\"+\"CD\"")), "ABCD");
        assert_eq!(
            run_err("10 PRINT \"AB\"+1"),
            BasicError::TypeMismatch { line: 10 }
        );
        assert_eq!(
            run_err("10 PRINT \"AB\"<1"),
            BasicError::TypeMismatch { line: 10 }
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            run_err("10 PRINT 1/0"),
            BasicError::DivisionByZero { line: 10 }
        );
    }

    #[test]
    fn test_int_floors_toward_negative_infinity() {
        assert_eq!(top_row(&run("10 PRINT INT(2.7)")), " 2");
        assert_eq!(top_row(&run("10 PRINT INT(-2.1)")), "-3");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(top_row(&run("10 PRINT CHR$(65)")), "A");
        assert_eq!(top_row(&run("10 PRINT ASC(\"A\")")), " 65");
        assert_eq!(top_row(&run("10 PRINT LEN(\"CIAO\")")), " 4");
        assert_eq!(top_row(&run("10 PRINT LEFT$(\"TORINO\",4)")), "TORI");
        assert_eq!(top_row(&run("10 PRINT RIGHT$(\"TORINO\",2)")), "NO");
        assert_eq!(top_row(&run("10 PRINT MID$(\"TORINO\",2,3)")), "ORI");
        assert_eq!(top_row(&run("10 PRINT MID$(\"TORINO\",3)")), "RINO");
        assert_eq!(top_row(&run("10 PRINT MID$(\"TORINO\",9)")), "");
        assert_eq!(top_row(&run("10 PRINT VAL(\"12AB\")")), " 12");
        assert_eq!(top_row(&run("10 PRINT VAL(\"X\")")), " 0");
        assert_eq!(top_row(&run("10 PRINT STR$(5)+\"!\"")), " 5!");
    }

    #[test]
    fn test_asc_of_empty_fails() {
        assert_eq!(
            run_err("10 PRINT ASC(\"\")"),
            BasicError::IllegalQuantity { line: 10 }
        );
    }

    #[test]
    fn test_rnd_range_and_determinism() {
        let a = run("10 FOR I=1 TO 20:IF RND(1)<0 OR RND(1)>=1 THEN PRINT \"BAD\"\n20 NEXT");
        assert_eq!(top_row(&a), "");

        // Same seed, same stream.
        let first = run("10 X=RND(1):PRINT INT(X*10000)");
        let second = run("10 X=RND(1):PRINT INT(X*10000)");
        assert_eq!(top_row(&first), top_row(&second));
    }

    #[test]
    fn test_rnd_negative_reseeds() {
        let source = "10 X=RND(-3):Y=RND(-3):IF X=Y THEN PRINT \"SAME\"";
        assert_eq!(top_row(&run(source)), "SAME");
    }

    #[test]
    fn test_sqr_of_negative_fails() {
        assert_eq!(
            run_err("10 PRINT SQR(-1)"),
            BasicError::IllegalQuantity { line: 10 }
        );
    }

    #[test]
    fn test_numeric_overflow() {
        assert_eq!(
            run_err("10 A=1E300*1E300"),
            BasicError::NumericOverflow { line: 10 }
        );
        assert_eq!(
            run_err("10 A=40000 AND 1"),
            BasicError::NumericOverflow { line: 10 }
        );
    }

    #[test]
    fn test_undefined_scalars_default() {
        assert_eq!(top_row(&run("10 PRINT Z9")), " 0");
        assert_eq!(top_row(&run("10 PRINT Z9$;\"!\"")), "!");
    }

    #[test]
    fn test_pos_reports_cursor_column() {
        assert_eq!(top_row(&run("10 PRINT \"ABC\";POS(0)")), "ABC 3");
    }
}
