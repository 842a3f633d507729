//! Runtime value types
//!
//! The object model proper lives outside this crate. These are the narrow
//! stand-ins the control-transfer core needs: something to bind to dynamic
//! variables, something to tag catch points with, and an ordered result set
//! that can be carried across a transfer.

use super::symbol::Symbol;
use std::fmt;
use std::sync::Arc;

/* ===================== Value ===================== */

/// Runtime value
///
/// `PartialEq` is structural. Tag matching uses [`Value::eq`], which compares
/// identity the way a Lisp `eq` does.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    T,
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Symbol(Symbol),
}

impl Value {
    /// Build a string value. Every call allocates a fresh object, so two
    /// strings built from the same text are not `eq`.
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(text.as_ref()))
    }

    /// Identity comparison
    ///
    /// Immediates compare by value, symbols by interned id, heap objects
    /// (strings) by pointer.
    pub fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) | (Value::T, Value::T) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Symbol> for Value {
    fn from(sym: Symbol) -> Self {
        Value::Symbol(sym)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "NIL"),
            Value::T => write!(f, "T"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Symbol(sym) => write!(f, "{}", sym),
        }
    }
}

/* ===================== Multiple Values ===================== */

/// An ordered multiple-result set (arity 0..N)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Values(Vec<Value>);

impl Values {
    /// Zero values
    pub fn none() -> Self {
        Values(Vec::new())
    }

    /// A single value
    pub fn one(value: impl Into<Value>) -> Self {
        Values(vec![value.into()])
    }

    pub fn from_vec(values: Vec<Value>) -> Self {
        Values(values)
    }

    /// The primary value: the first one, or `Nil` when there are none
    pub fn primary(&self) -> Value {
        self.0.first().cloned().unwrap_or(Value::Nil)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl From<Vec<Value>> for Values {
    fn from(values: Vec<Value>) -> Self {
        Values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_is_identity_for_strings() {
        let a = Value::string("k");
        let b = Value::string("k");
        assert!(a.eq(&a.clone()));
        assert!(!a.eq(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn test_eq_compares_immediates_by_value() {
        assert!(Value::Int(7).eq(&Value::Int(7)));
        assert!(!Value::Int(7).eq(&Value::Float(7.0)));
        assert!(Value::Nil.eq(&Value::Nil));
        assert!(!Value::Nil.eq(&Value::T));
    }

    #[test]
    fn test_primary_of_empty_values_is_nil() {
        assert_eq!(Values::none().primary(), Value::Nil);
        assert_eq!(Values::from_vec(vec![Value::Int(1), Value::Int(2)]).primary(), Value::Int(1));
    }
}
