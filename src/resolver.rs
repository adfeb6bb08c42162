//! Reference resolution through dotted paths into the layered context.
//!
//! Centralizes `$ref:PATH` semantics in one place (spec.md §4.2, §9 design
//! note "Reference resolution as a primitive") so every place a path can
//! appear — comparison values, `$diff.from`, `$cond.if` — obeys the same
//! case-sensitive, dotted, missing-is-undefined rules.

use crate::ast::ResolvedValue;
use crate::value::Value;

/// The result of walking a path: either the value found, or a marker that
/// the path never resolved at all. Collapsing both cases to `Value::Null`
/// is what most operators want; `path_exists` needs the distinction.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Value),
    Missing,
}

impl Resolution {
    /// Collapses a resolution to a plain value: `undefined` becomes `null`,
    /// matching `spec.md`'s "any missing segment returns undefined".
    pub fn into_value(self) -> Value {
        match self {
            Resolution::Found(v) => v,
            Resolution::Missing => Value::Null,
        }
    }
}

/// Splits `path` on `.` and walks `context`, returning `Missing` as soon as
/// a segment has no corresponding entry. Paths are case-sensitive; a
/// numeric-looking segment indexes an object by that string key, never an
/// array (spec.md §4.2 — "no array index syntax").
pub fn resolve(path: &str, context: &Value) -> Resolution {
    if path.is_empty() {
        return Resolution::Found(context.clone());
    }

    let mut current = context;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return Resolution::Missing,
        }
    }
    Resolution::Found(current.clone())
}

/// `resolve`, collapsing `Missing` to `Value::Null`.
pub fn resolve_value(path: &str, context: &Value) -> Value {
    resolve(path, context).into_value()
}

/// Distinguishes "present (even if null)" from "entirely absent" — the
/// distinction `$exists` deliberately does *not* make (spec.md §4.1 treats
/// missing and null identically), but that a host or validator may still
/// need.
pub fn path_exists(path: &str, context: &Value) -> bool {
    matches!(resolve(path, context), Resolution::Found(_))
}

/// Resolves a `ResolvedValue` against the context: a literal returns its
/// value, a reference delegates to `resolve_value`, an array resolves
/// element-wise (spec.md §4.2).
pub fn resolve_resolved(value: &ResolvedValue, context: &Value) -> Value {
    match value {
        ResolvedValue::Literal(v) => v.clone(),
        ResolvedValue::Ref(path) => resolve_value(path, context),
        ResolvedValue::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_resolved(v, context)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        Value::from_json(&json!({
            "vars": { "count": 15, "nested": { "deep": "ok" } },
            "meta": { "now": "2026-07-31" }
        }))
    }

    use crate::value::FromJson;

    #[test]
    fn test_resolve_nested() {
        let context = ctx();
        assert_eq!(resolve_value("vars.count", &context), Value::integer(15));
        assert_eq!(
            resolve_value("vars.nested.deep", &context),
            Value::string("ok")
        );
    }

    #[test]
    fn test_resolve_missing_is_undefined_not_error() {
        let context = ctx();
        assert_eq!(resolve_value("vars.missing", &context), Value::Null);
        assert_eq!(resolve_value("unknown.top.level", &context), Value::Null);
    }

    #[test]
    fn test_path_exists_distinguishes_null_from_absent() {
        let context = Value::from_json(&json!({"a": null}));
        assert!(path_exists("a", &context));
        assert!(!path_exists("b", &context));
    }

    #[test]
    fn test_case_sensitive() {
        let context = Value::from_json(&json!({"Vars": 1}));
        assert_eq!(resolve_value("vars", &context), Value::Null);
        assert_eq!(resolve_value("Vars", &context), Value::integer(1));
    }

    #[test]
    fn test_numeric_segment_indexes_by_string_key_not_array() {
        let context = Value::from_json(&json!({"list": [10, 20, 30]}));
        // "list.0" must not index the array; it looks for an object key "0".
        assert_eq!(resolve_value("list.0", &context), Value::Null);
    }
}
