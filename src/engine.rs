//! The public engine facade, per `spec.md` §4.8.
//!
//! A `RuleEngine` owns an operator registry and an AST cache behind a
//! `RefCell`: per `spec.md` §5 the engine is single-threaded and
//! synchronous, so interior mutability without locking matches the
//! contract; a host needing cross-thread sharing wraps the whole engine in
//! its own synchronization, exactly as it already must for
//! `register_operator`.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::cache::AstCache;
use crate::config::{BatchErrorPolicy, EngineConfig};
use crate::dsl::DslRule;
use crate::error::Result;
use crate::evaluator::{evaluate, EvaluationResult};
use crate::normalizer::{normalize, NormalizedRule};
use crate::registry::{ComparisonFn, OperatorRegistry};
use crate::resolver::resolve_value;
use crate::validator::{validate, ValidationResult};
use crate::value::Value;

/// The engine facade: validates, normalizes (with caching), and evaluates
/// DSL rules against a `RuleContext`.
pub struct RuleEngine {
    registry: OperatorRegistry,
    cache: RefCell<AstCache>,
    config: EngineConfig,
}

impl RuleEngine {
    /// Builds an engine with default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Builds an engine with explicit configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        RuleEngine {
            registry: OperatorRegistry::with_builtins(),
            cache: RefCell::new(AstCache::new(config.cache_capacity, config.cache_ttl)),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates a rule's structure and operator references without
    /// lowering it to an AST.
    pub fn validate(&self, rule: &DslRule) -> ValidationResult {
        validate(rule, &self.registry)
    }

    /// Normalizes a rule, consulting and populating the AST cache.
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn normalize(&self, rule: &DslRule) -> Result<NormalizedRule> {
        if let Some(cached) = self.cache.borrow_mut().get(&rule.id) {
            debug!("ast cache hit");
            return Ok(cached);
        }
        debug!("ast cache miss");
        let normalized = normalize(rule, &self.registry)?;
        self.cache
            .borrow_mut()
            .set(rule.id.clone(), normalized.clone());
        Ok(normalized)
    }

    /// Normalizes (cache-backed) and evaluates a single rule.
    #[instrument(skip(self, rule, context), fields(rule_id = %rule.id))]
    pub fn evaluate_rule(&self, rule: &DslRule, context: &Value) -> Result<EvaluationResult> {
        let normalized = self.normalize(rule)?;
        evaluate(
            &normalized,
            context,
            &self.registry,
            self.config.max_cond_depth,
        )
    }

    /// Evaluates every rule in order against the same context.
    ///
    /// Per `spec.md` §7/§9's resolved open question, a failing rule is
    /// skipped (not aborted) by default; `EngineConfig::batch_error_policy`
    /// can switch to abort-on-first-error.
    pub fn evaluate_all(
        &self,
        rules: &[DslRule],
        context: &Value,
    ) -> Result<Vec<EvaluationResult>> {
        let mut results = Vec::with_capacity(rules.len());
        for rule in rules {
            match self.evaluate_rule(rule, context) {
                Ok(result) => results.push(result),
                Err(err) => match self.config.batch_error_policy {
                    BatchErrorPolicy::Continue => {
                        warn!(rule_id = %rule.id, error = %err, "skipping rule after evaluation error");
                        continue;
                    }
                    BatchErrorPolicy::Abort => return Err(err),
                },
            }
        }
        Ok(results)
    }

    /// Evaluates every rule, returning only those that matched.
    pub fn evaluate_matched(
        &self,
        rules: &[DslRule],
        context: &Value,
    ) -> Result<Vec<EvaluationResult>> {
        Ok(self
            .evaluate_all(rules, context)?
            .into_iter()
            .filter(|r| r.matched)
            .collect())
    }

    /// Drops one rule's cached AST, e.g. when a host edits that rule.
    pub fn invalidate_rule(&self, id: &str) {
        self.cache.borrow_mut().invalidate(id);
    }

    /// Drops the entire AST cache.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Registers (or overwrites) a comparison operator. Because operator
    /// semantics can change the meaning of rules already normalized, this
    /// clears the whole cache rather than just the operator's own entries.
    pub fn register_operator(&mut self, name: impl Into<String>, predicate: ComparisonFn) {
        self.registry.register(name, predicate);
        self.cache.borrow_mut().clear();
    }

    /// Resolves a dotted path against a context directly, bypassing rule
    /// evaluation — exposed for hosts building preview tooling.
    pub fn resolve_path(&self, path: &str, context: &Value) -> Value {
        resolve_value(path, context)
    }

    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a closure as a `ComparisonFn`, convenient for `register_operator`
/// call sites that don't want to spell out `Arc::new` themselves.
pub fn operator(f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> ComparisonFn {
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FromJson;
    use serde_json::json;

    fn rule(j: serde_json::Value) -> DslRule {
        serde_json::from_value(j).unwrap()
    }

    fn ctx(j: serde_json::Value) -> Value {
        Value::from_json(&j)
    }

    #[test]
    fn test_evaluate_rule_end_to_end() {
        let engine = RuleEngine::new();
        let r =
            rule(json!({"id": "r1", "when": {"vars.x": {"$gt": 10}}, "then": {"visible": true}}));
        let result = engine
            .evaluate_rule(&r, &ctx(json!({"vars": {"x": 20}})))
            .unwrap();
        assert!(result.matched);
    }

    #[test]
    fn test_normalize_is_cached() {
        let engine = RuleEngine::new();
        let r = rule(json!({"id": "r1", "when": {"a": 1}, "then": {}}));
        engine.normalize(&r).unwrap();
        assert_eq!(engine.cache.borrow().len(), 1);
        engine.normalize(&r).unwrap();
        assert_eq!(engine.cache.borrow().len(), 1);
    }

    #[test]
    fn test_register_operator_clears_cache() {
        let mut engine = RuleEngine::new();
        let r = rule(json!({"id": "r1", "when": {"a": 1}, "then": {}}));
        engine.normalize(&r).unwrap();
        assert_eq!(engine.cache.borrow().len(), 1);
        engine.register_operator(
            "$isPositive",
            operator(|l, _| l.as_f64().unwrap_or(0.0) > 0.0),
        );
        assert!(engine.cache.borrow().is_empty());
    }

    #[test]
    fn test_evaluate_all_continues_past_errors_by_default() {
        let engine = RuleEngine::new();
        let bad = rule(json!({"id": "bad", "when": {}, "then": {}}));
        let good = rule(json!({"id": "good", "when": {"a": 1}, "then": {}}));
        let results = engine
            .evaluate_all(&[bad, good], &ctx(json!({"a": 1})))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rule_id, "good");
    }

    #[test]
    fn test_evaluate_all_aborts_when_configured() {
        let config = EngineConfig {
            batch_error_policy: BatchErrorPolicy::Abort,
            ..EngineConfig::default()
        };
        let engine = RuleEngine::with_config(config);
        let bad = rule(json!({"id": "bad", "when": {}, "then": {}}));
        assert!(engine.evaluate_all(&[bad], &ctx(json!({}))).is_err());
    }

    #[test]
    fn test_max_cond_depth_is_configurable() {
        let permissive = RuleEngine::new();
        let tight = RuleEngine::with_config(EngineConfig {
            max_cond_depth: 1,
            ..EngineConfig::default()
        });
        let r = rule(json!({
            "id": "r1",
            "when": {"a": 1},
            "then": {"label": {
                "$cond": {"if": {"a": 1}, "then": {
                    "$cond": {"if": {"a": 1}, "then": {
                        "$cond": {"if": {"a": 1}, "then": "deep", "else": "no"}
                    }, "else": "no"}
                }, "else": "no"}
            }}
        }));
        let context = ctx(json!({"a": 1}));

        assert!(permissive.evaluate_rule(&r, &context).is_ok());
        let err = tight.evaluate_rule(&r, &context).unwrap_err();
        assert!(err.to_string().contains("recursion depth exceeded"));
    }

    #[test]
    fn test_evaluate_matched_filters_out_non_matches() {
        let engine = RuleEngine::new();
        let a = rule(json!({"id": "a", "when": {"x": 1}, "then": {}}));
        let b = rule(json!({"id": "b", "when": {"x": 2}, "then": {}}));
        let matched = engine
            .evaluate_matched(&[a, b], &ctx(json!({"x": 1})))
            .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].rule_id, "a");
    }
}
