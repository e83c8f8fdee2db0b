use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value on the operand stack or held by a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
}

impl Value {
    pub fn nan() -> Self {
        Value::Str("NaN".to_string())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Zero and empty strings are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Char(_) => true,
        }
    }

    /// Binary operators only combine two numbers or two pieces of text.
    pub fn compatible(&self, other: &Value) -> bool {
        self.is_numeric() == other.is_numeric()
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Char(c) => Some(c.to_string()),
            _ => None,
        }
    }

    /// Equality across number kinds and across text kinds.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            _ if self.is_numeric() && other.is_numeric() => self.as_f64() == other.as_f64(),
            _ => match (self.text(), other.text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Numbers compare numerically and text lexicographically; mixed kinds
    /// have no order.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            _ if self.is_numeric() && other.is_numeric() => {
                self.as_f64()?.partial_cmp(&other.as_f64()?)
            }
            _ => Some(self.text()?.cmp(&other.text()?)),
        }
    }

    fn int_or_float(
        a: &Value,
        b: &Value,
        int: impl Fn(i64, i64) -> Option<i64>,
        float: impl Fn(f64, f64) -> f64,
    ) -> Option<Value> {
        match (a, b) {
            (Value::Int(x), Value::Int(y)) => Some(match int(*x, *y) {
                Some(v) => Value::Int(v),
                None => Value::Float(float(*x as f64, *y as f64)),
            }),
            _ => Some(Value::Float(float(a.as_f64()?, b.as_f64()?))),
        }
    }

    /// Sum of two numbers or concatenation of two pieces of text.
    pub fn add(&self, other: &Value) -> Option<Value> {
        if self.is_numeric() {
            Self::int_or_float(self, other, i64::checked_add, |x, y| x + y)
        } else {
            Some(Value::Str(self.text()? + &other.text()?))
        }
    }

    pub fn sub(&self, other: &Value) -> Option<Value> {
        Self::int_or_float(self, other, i64::checked_sub, |x, y| x - y)
    }

    pub fn mul(&self, other: &Value) -> Option<Value> {
        Self::int_or_float(self, other, i64::checked_mul, |x, y| x * y)
    }

    /// True division; a zero divisor gives the string `NaN`.
    pub fn div(&self, other: &Value) -> Option<Value> {
        let (x, y) = (self.as_f64()?, other.as_f64()?);
        if y == 0.0 {
            return Some(Value::nan());
        }
        Some(Value::Float(x / y))
    }

    /// Floored modulo taking the sign of the divisor; a zero divisor gives the
    /// string `NaN`.
    pub fn rem(&self, other: &Value) -> Option<Value> {
        if other.as_f64()? == 0.0 {
            return Some(Value::nan());
        }
        Self::int_or_float(
            self,
            other,
            |x, y| x.checked_rem(y).map(|r| if r != 0 && (r < 0) != (y < 0) { r + y } else { r }),
            |x, y| {
                let r = x % y;
                if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }
            },
        )
    }

    /// Integer, then float, then the raw string.
    pub fn parse_input(input: &str) -> Value {
        let trimmed = input.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Str(input.to_string())
    }

    /// Numeric form of a value, if it has one. Finite floats truncate.
    pub fn to_number(&self) -> Option<Value> {
        match self {
            Value::Int(_) => Some(self.clone()),
            Value::Float(f) if f.is_finite() => Some(Value::Int(f.trunc() as i64)),
            Value::Float(_) => None,
            Value::Str(_) | Value::Char(_) => match Value::parse_input(&self.text()?) {
                Value::Str(_) => None,
                number => Some(number),
            },
        }
    }

    /// Quoted form used when printing the stack.
    pub fn repr(&self) -> String {
        match self.text() {
            Some(text) => {
                let quote = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
                let mut out = String::with_capacity(text.len() + 2);
                out.push(quote);
                for c in text.chars() {
                    match c {
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c if c == quote => {
                            out.push('\\');
                            out.push(c);
                        }
                        c => out.push(c),
                    }
                }
                out.push(quote);
                out
            }
            None => self.to_string(),
        }
    }
}

fn format_float(f: f64, out: &mut fmt::Formatter<'_>) -> fmt::Result {
    if f.is_nan() {
        return write!(out, "nan");
    }
    if f.is_infinite() {
        return write!(out, "{}", if f > 0.0 { "inf" } else { "-inf" });
    }

    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let sci = format!("{f:e}");
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return write!(out, "{mantissa}e{sign}{digits:0>2}");
    }
    if f.fract() == 0.0 {
        write!(out, "{f:.1}")
    } else {
        write!(out, "{f}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => format_float(*x, f),
            Value::Str(s) => write!(f, "{s}"),
            Value::Char(c) => write!(f, "{c}"),
        }
    }
}

/// `[a, 'b', 1.5]`
pub fn format_stack(stack: &[Value]) -> String {
    let items: Vec<String> = stack.iter().map(Value::repr).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::Str(text.to_string())
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(Value::Float(1e20).to_string(), "1e+20");
        assert_eq!(Value::Float(1.5e-5).to_string(), "1.5e-05");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Value::Char('x').to_string(), "x");
    }

    #[test]
    fn test_stack_repr() {
        let stack = vec![Value::Int(1), s("a"), Value::Char('b'), Value::Float(2.5), s("it's")];
        assert_eq!(format_stack(&stack), "[1, 'a', 'b', 2.5, \"it's\"]");
        assert_eq!(format_stack(&[]), "[]");
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Some(Value::Int(5)));
        assert_eq!(Value::Int(2).add(&Value::Float(0.5)), Some(Value::Float(2.5)));
        assert_eq!(s("ab").add(&Value::Char('c')), Some(s("abc")));
        assert_eq!(Value::Int(i64::MAX).add(&Value::Int(1)), Some(Value::Float(i64::MAX as f64 + 1.0)));
        assert_eq!(Value::Int(7).sub(&Value::Int(10)), Some(Value::Int(-3)));
        assert_eq!(Value::Int(6).div(&Value::Int(4)), Some(Value::Float(1.5)));
        assert_eq!(Value::Int(6).div(&Value::Float(0.0)), Some(Value::nan()));
        assert_eq!(s("x").mul(&Value::Int(2)), None);
    }

    #[test]
    fn test_floored_modulo() {
        assert_eq!(Value::Int(7).rem(&Value::Int(3)), Some(Value::Int(1)));
        assert_eq!(Value::Int(-7).rem(&Value::Int(3)), Some(Value::Int(2)));
        assert_eq!(Value::Int(7).rem(&Value::Int(-3)), Some(Value::Int(-2)));
        assert_eq!(Value::Float(-1.5).rem(&Value::Int(1)), Some(Value::Float(0.5)));
        assert_eq!(Value::Int(1).rem(&Value::Int(0)), Some(Value::nan()));
    }

    #[test]
    fn test_comparisons() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Char('a').loose_eq(&s("a")));
        assert!(!Value::Int(1).loose_eq(&s("1")));
        assert_eq!(s("abc").compare(&s("abd")), Some(Ordering::Less));
        assert_eq!(Value::Float(2.5).compare(&Value::Int(2)), Some(Ordering::Greater));
        assert_eq!(Value::Int(1).compare(&s("a")), None);
        assert!(!s("").is_truthy());
        assert!(s("NaN").is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
    }

    #[test]
    fn test_parsing() {
        assert_eq!(Value::parse_input("42"), Value::Int(42));
        assert_eq!(Value::parse_input("-2.5"), Value::Float(-2.5));
        assert_eq!(Value::parse_input("hello"), s("hello"));
        assert_eq!(Value::parse_input(""), s(""));
        assert_eq!(s("3.9").to_number(), Some(Value::Float(3.9)));
        assert_eq!(Value::Float(3.9).to_number(), Some(Value::Int(3)));
        assert_eq!(Value::Char('7').to_number(), Some(Value::Int(7)));
        assert_eq!(s("seven").to_number(), None);
    }
}
