//! Operator registry: the extension seam for comparison operators.
//!
//! Per the teacher's design note (`spec.md` §9, "Operator registry as the
//! extension seam"): operators are `(left, right) -> bool` closures in a
//! name-keyed map rather than a class hierarchy. `$regex` compiles its
//! pattern lazily the first time that pattern is seen (cached by pattern
//! string, see `compiled_regex`) rather than at registration time, so
//! registering a new operator — or even re-registering one — never requires
//! touching the AST cache for any rule other than the ones using it; only
//! `register` on the *engine* invalidates the whole cache, because operator
//! semantics changed under rules already normalized (see `engine.rs`).

use crate::error::{Result, RuleError};
use crate::value::{all_strings, canonical_eq, Value, ValueCoercion};
use lru::LruCache;
use regex::Regex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

/// A binary predicate over `(fieldValue, ruleValue)`.
pub type ComparisonFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Maps operator name to predicate; pluggable via `register`.
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, ComparisonFn>,
}

impl OperatorRegistry {
    /// A registry pre-loaded with every built-in comparison operator from
    /// `spec.md` §4.1.
    pub fn with_builtins() -> Self {
        let mut registry = OperatorRegistry {
            operators: HashMap::new(),
        };
        registry.register("$eq", Arc::new(canonical_eq));
        registry.register("$ne", Arc::new(|l, r| !canonical_eq(l, r)));
        registry.register(
            "$gt",
            Arc::new(|l, r| l.coerce_number() > r.coerce_number()),
        );
        registry.register(
            "$gte",
            Arc::new(|l, r| l.coerce_number() >= r.coerce_number()),
        );
        registry.register(
            "$lt",
            Arc::new(|l, r| l.coerce_number() < r.coerce_number()),
        );
        registry.register(
            "$lte",
            Arc::new(|l, r| l.coerce_number() <= r.coerce_number()),
        );
        registry.register("$in", Arc::new(eval_in));
        registry.register("$nin", Arc::new(|l, r| !eval_in(l, r)));
        registry.register("$exists", Arc::new(eval_exists));
        registry.register("$regex", Arc::new(eval_regex));
        registry.register("$contains", Arc::new(eval_contains));
        registry.register("$startsWith", Arc::new(|l, r| {
            matches!((l, r), (Value::String(a), Value::String(b)) if a.starts_with(b.as_str()))
        }));
        registry.register("$endsWith", Arc::new(|l, r| {
            matches!((l, r), (Value::String(a), Value::String(b)) if a.ends_with(b.as_str()))
        }));
        registry.register("$between", Arc::new(eval_between));
        registry.register("$all", Arc::new(eval_all));
        registry
    }

    /// Inserts or overwrites the predicate for `name`.
    pub fn register(&mut self, name: impl Into<String>, predicate: ComparisonFn) {
        self.operators.insert(name.into(), predicate);
    }

    /// Looks up a predicate, failing with `UnknownOperator` when absent.
    pub fn get(&self, name: &str) -> Result<ComparisonFn> {
        self.operators
            .get(name)
            .cloned()
            .ok_or_else(|| RuleError::unknown_operator(name))
    }

    /// Probes for registration without erroring.
    pub fn has(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn eval_in(left: &Value, right: &Value) -> bool {
    match right.as_array() {
        Some(items) => items.iter().any(|item| canonical_eq(left, item)),
        None => false,
    }
}

fn eval_exists(left: &Value, right: &Value) -> bool {
    let present = !matches!(left, Value::Null);
    match right.as_bool() {
        Some(want_present) => present == want_present,
        None => present,
    }
}

/// Bounds how many distinct `$regex` patterns stay compiled at once, mirroring
/// `AstCache`'s capacity bound rather than letting attacker-controlled
/// pattern strings (e.g. via `$ref`-resolved context data) grow it forever.
const REGEX_CACHE_CAPACITY: usize = 256;

/// Compiled patterns are cached by source string: the AST already caches
/// the parsed rule, but not the regex compilation `$regex` re-pays on every
/// comparison, so this caches that instead.
fn regex_cache() -> &'static Mutex<LruCache<String, Regex>> {
    static CACHE: OnceLock<Mutex<LruCache<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(REGEX_CACHE_CAPACITY).unwrap(),
        ))
    })
}

fn compiled_regex(pattern: &str) -> Option<Regex> {
    let mut cache = regex_cache().lock().unwrap();
    if let Some(re) = cache.get(pattern) {
        return Some(re.clone());
    }
    let re = Regex::new(pattern).ok()?;
    cache.put(pattern.to_string(), re.clone());
    Some(re)
}

fn eval_regex(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(subject), Value::String(pattern)) => compiled_regex(pattern)
            .map(|re| re.is_match(subject))
            .unwrap_or(false),
        _ => false,
    }
}

fn eval_contains(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::String(a), Value::String(b)) => a.contains(b.as_str()),
        (Value::Array(_), _) => eval_in(right, left),
        _ => false,
    }
}

fn eval_between(left: &Value, right: &Value) -> bool {
    let bounds = match right.as_array() {
        Some(items) if items.len() == 2 => items,
        _ => return false,
    };
    let (lo, hi) = (&bounds[0], &bounds[1]);
    if all_strings(&[left, lo, hi]) {
        let (l, a, b) = (
            left.as_str().unwrap(),
            lo.as_str().unwrap(),
            hi.as_str().unwrap(),
        );
        a <= l && l <= b
    } else {
        let (l, a, b) = (left.coerce_number(), lo.coerce_number(), hi.coerce_number());
        a <= l && l <= b
    }
}

fn eval_all(left: &Value, right: &Value) -> bool {
    match (left.as_array(), right.as_array()) {
        (Some(haystack), Some(needles)) => needles
            .iter()
            .all(|needle| haystack.iter().any(|item| canonical_eq(item, needle))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FromJson;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from_json(&j)
    }

    #[test]
    fn test_unknown_operator_errors() {
        let registry = OperatorRegistry::with_builtins();
        assert!(registry.get("$nope").is_err());
        assert!(!registry.has("$nope"));
        assert!(registry.has("$between"));
    }

    #[test]
    fn test_between_numeric() {
        let registry = OperatorRegistry::with_builtins();
        let op = registry.get("$between").unwrap();
        assert!(op(&v(json!(15)), &v(json!([10, 20]))));
        assert!(!op(&v(json!(25)), &v(json!([10, 20]))));
    }

    #[test]
    fn test_between_strings_is_chronological() {
        let registry = OperatorRegistry::with_builtins();
        let op = registry.get("$between").unwrap();
        assert!(op(
            &v(json!("2026-06-15")),
            &v(json!(["2026-01-01", "2026-12-31"]))
        ));
    }

    #[test]
    fn test_exists_true_and_false() {
        let registry = OperatorRegistry::with_builtins();
        let op = registry.get("$exists").unwrap();
        assert!(op(&Value::Null, &v(json!(false))));
        assert!(op(&v(json!(false)), &v(json!(true))));
        assert!(op(&v(json!(0)), &v(json!(true))));
    }

    #[test]
    fn test_regex_invalid_pattern_is_false_not_error() {
        let registry = OperatorRegistry::with_builtins();
        let op = registry.get("$regex").unwrap();
        assert!(!op(&v(json!("abc")), &v(json!("("))));
    }

    #[test]
    fn test_custom_operator_registration() {
        let mut registry = OperatorRegistry::with_builtins();
        registry.register(
            "$divisibleBy",
            Arc::new(|l, r| (l.coerce_number() as i64) % (r.coerce_number() as i64) == 0),
        );
        let op = registry.get("$divisibleBy").unwrap();
        assert!(op(&v(json!(10)), &v(json!(5))));
        assert!(!op(&v(json!(10)), &v(json!(3))));
    }
}
