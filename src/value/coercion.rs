//! Value coercion utilities.
//!
//! Implements the coercion rules from `spec.md` §3/§4.1: canonical coercion
//! for `$eq`/`$ne`, numeric coercion for ordering operators, and the
//! string-ordering special case for `$between`.

use super::data_value::Value;
use super::number::Number;

/// Canonical coercion: projects any value onto `{null, bool, number, string}`
/// so that `$eq`/`$ne` compare like-for-like.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Coercion and comparison rules shared by the comparison operators.
pub trait ValueCoercion {
    /// Projects the value onto the canonical primitive set.
    fn coerce_canonical(&self) -> Canonical;

    /// Coerces to a number: number as-is, boolean to 0/1, string via decimal
    /// parse (NaN on failure maps to 0), everything else to 0.
    fn coerce_number(&self) -> f64;
}

impl ValueCoercion for Value {
    fn coerce_canonical(&self) -> Canonical {
        match self {
            Value::Null => Canonical::Null,
            Value::Bool(b) => Canonical::Bool(*b),
            Value::Number(n) => Canonical::Number(n.as_f64()),
            Value::String(s) => Canonical::String(s.clone()),
            other => Canonical::String(other.to_string()),
        }
    }

    fn coerce_number(&self) -> f64 {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::Bool(true) => 1.0,
            Value::Bool(false) => 0.0,
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

impl Canonical {
    pub fn as_string(&self) -> String {
        match self {
            Canonical::Null => "null".to_string(),
            Canonical::Bool(b) => b.to_string(),
            Canonical::Number(n) => Number::from_f64(*n).to_string(),
            Canonical::String(s) => s.clone(),
        }
    }
}

/// Canonical-coerce both sides, then compare for equality. Arrays and
/// objects aren't part of the canonical primitive set (spec.md §4.1), so
/// they compare structurally instead of falling through to their (lossy,
/// collision-prone) `Display` string.
pub fn canonical_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => left == right,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => false,
        _ => left.coerce_canonical() == right.coerce_canonical(),
    }
}

/// True iff both values are strings (used to pick string vs. numeric
/// ordering for `$between`).
pub fn all_strings(values: &[&Value]) -> bool {
    values.iter().all(|v| matches!(v, Value::String(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_eq() {
        // number and boolean stay distinct canonical categories: 1 != true.
        assert!(!canonical_eq(&Value::integer(1), &Value::bool(true)));
        assert!(canonical_eq(&Value::integer(5), &Value::integer(5)));
        assert!(canonical_eq(&Value::string("5"), &Value::string("5")));
        assert!(canonical_eq(&Value::null(), &Value::null()));
        // arrays compare structurally, not by collapsing to a constant string.
        let arr = Value::Array(vec![Value::integer(1)]);
        let same = Value::Array(vec![Value::integer(1)]);
        let different = Value::Array(vec![Value::integer(2)]);
        assert!(canonical_eq(&arr, &same));
        assert!(!canonical_eq(&arr, &different));
        assert!(!canonical_eq(&arr, &Value::string("[array]")));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(Value::string("42").coerce_number(), 42.0);
        assert_eq!(Value::string("not a number").coerce_number(), 0.0);
        assert_eq!(Value::bool(true).coerce_number(), 1.0);
        assert_eq!(Value::bool(false).coerce_number(), 0.0);
        assert_eq!(Value::null().coerce_number(), 0.0);
    }

    #[test]
    fn test_all_strings() {
        let a = Value::string("2026-01-01");
        let b = Value::string("2026-06-15");
        let c = Value::string("2026-12-31");
        assert!(all_strings(&[&a, &b, &c]));
        let n = Value::integer(1);
        assert!(!all_strings(&[&a, &n]));
    }
}
