//! Symbolic `Value`s used for widths, indices, and VHDL range endpoints.
//!
//! Data model §3: "an integer literal plus an optional textual fragment...
//! Supported operations are `+`, `-`, `*` with the identities `v+0=v`,
//! `v*1=v`, `v*0=0`. Equality is syntactic."
//!
//! Grounded on the `downto`/generic-map range arithmetic in
//! `examples/original_source/.../cerata/vhdl/instantiation.cc`, which adds
//! and subtracts `Node` values (there, full expression nodes; here, the
//! lightweight symbolic form used purely for text generation).

use std::fmt;
use std::ops::{Add, Mul, Sub};

use arcstr::ArcStr;

/// A symbolic value: an integer part plus an optional named fragment.
///
/// `Value { int: 3, sym: None }` is the literal `3`. `Value { int: 0, sym:
/// Some("WIDTH") }` is the bare symbol `WIDTH`. `Value { int: 1, sym:
/// Some("WIDTH") }` renders as `WIDTH+1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Value {
    int: i64,
    sym: Option<ArcStr>,
}

impl Value {
    /// A plain integer value.
    pub fn int(v: i64) -> Self {
        Self { int: v, sym: None }
    }

    /// A bare symbolic value (e.g. a parameter or expression name).
    pub fn symbol(s: impl Into<ArcStr>) -> Self {
        Self {
            int: 0,
            sym: Some(s.into()),
        }
    }

    /// Returns the value as a plain integer, if it carries no symbol.
    pub fn as_literal(&self) -> Option<i64> {
        self.sym.is_none().then_some(self.int)
    }

    /// Returns `true` if this value is a bare literal.
    pub fn is_literal(&self) -> bool {
        self.sym.is_none()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.sym, self.int) {
            (None, i) => write!(f, "{i}"),
            (Some(s), 0) => write!(f, "{s}"),
            (Some(s), i) if i > 0 => write!(f, "{s}+{i}"),
            (Some(s), i) => write!(f, "{s}-{}", -i),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::int(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::int(v as i64)
    }
}

/// Syntactic addition: folds when both operands are plain literals, and
/// applies the `v+0=v` identity (on either side) when a symbol is present.
impl Add for Value {
    type Output = Value;

    fn add(self, rhs: Value) -> Value {
        match (self.sym, rhs.sym) {
            (None, None) => Value::int(self.int + rhs.int),
            (Some(s), None) => Value {
                int: self.int + rhs.int,
                sym: Some(s),
            },
            (None, Some(s)) => Value {
                int: self.int + rhs.int,
                sym: Some(s),
            },
            // Two distinct symbolic fragments: concatenate textually, since
            // Value only models a single named fragment plus an integer
            // offset (k*x + c form); mixed-symbol sums fall back to string
            // concatenation for display purposes only.
            (Some(a), Some(b)) if a == b => Value {
                int: self.int + rhs.int,
                sym: Some(a),
            },
            (Some(a), Some(b)) => Value {
                int: self.int + rhs.int,
                sym: Some(arcstr::format!("{a}+{b}")),
            },
        }
    }
}

impl Sub for Value {
    type Output = Value;

    fn sub(self, rhs: Value) -> Value {
        match rhs.sym {
            None => Value {
                int: self.int - rhs.int,
                sym: self.sym,
            },
            Some(s) => match self.sym {
                Some(a) if a == s => Value::int(self.int - rhs.int),
                _ => Value {
                    int: self.int - rhs.int,
                    sym: Some(arcstr::format!(
                        "{}-{s}",
                        self.sym.clone().unwrap_or_else(|| arcstr::format!("{}", self.int))
                    )),
                },
            },
        }
    }
}

/// Syntactic multiplication: applies `v*0=0` and `v*1=v` for plain-literal
/// operands, otherwise builds a `a*b` textual product.
impl Mul for Value {
    type Output = Value;

    fn mul(self, rhs: Value) -> Value {
        match (self.sym, rhs.sym) {
            (None, None) => Value::int(self.int * rhs.int),
            (Some(_), None) if rhs.int == 0 => Value::int(0),
            (Some(s), None) if rhs.int == 1 => Value { int: self.int, sym: Some(s) },
            (Some(s), None) => Value::symbol(arcstr::format!("{s}*{}", rhs.int)),
            (None, Some(_)) if self.int == 0 => Value::int(0),
            (None, Some(s)) if self.int == 1 => Value { int: rhs.int, sym: Some(s) },
            (None, Some(s)) => Value::symbol(arcstr::format!("{}*{s}", self.int)),
            (Some(a), Some(b)) => Value::symbol(arcstr::format!("{a}*{b}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_arithmetic_folds() {
        assert_eq!(Value::int(3) + Value::int(4), Value::int(7));
        assert_eq!(Value::int(3) * Value::int(0), Value::int(0));
        assert_eq!(Value::int(5) * Value::int(1), Value::int(5));
    }

    #[test]
    fn symbolic_identities() {
        let w = Value::symbol("WIDTH");
        assert_eq!((w.clone() + Value::int(0)).to_string(), "WIDTH");
        assert_eq!((w.clone() * Value::int(1)).to_string(), "WIDTH");
        assert_eq!((w * Value::int(0)).to_string(), "0");
    }

    #[test]
    fn display_offsets() {
        assert_eq!(Value::symbol("W").to_string(), "W");
        assert_eq!((Value::symbol("W") + Value::int(1)).to_string(), "W+1");
        assert_eq!((Value::symbol("W") - Value::int(1)).to_string(), "W-1");
    }

    #[test]
    fn syntactic_equality() {
        assert_eq!(Value::symbol("W") + Value::int(1), Value::symbol("W") + Value::int(1));
        assert_ne!(Value::symbol("W"), Value::symbol("V"));
    }
}
