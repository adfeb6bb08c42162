//! Walks a normalized AST against a context to a boolean, and a
//! `NormalizedRule` to a full `EvaluationResult`, per `spec.md` §4.6.

use crate::ast::{AstNode, LogicalOp};
use crate::datetime::{diff, nth_weekday_after, parse_date};
use crate::error::{Result, RuleError, RuleResultExt};
use crate::expression::evaluate_expression;
use crate::normalizer::NormalizedRule;
use crate::registry::OperatorRegistry;
use crate::resolver::{resolve_resolved, resolve_value};
use crate::value::Value;
use std::collections::HashMap;

/// The outcome of evaluating one rule against one context.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    pub rule_id: String,
    pub matched: bool,
    pub outcome: Value,
    pub computed_values: HashMap<String, Value>,
}

/// Evaluates an AST node to a boolean. Unparsable dates and missing
/// references never error here — they resolve to `false`, per `spec.md`
/// §7's "comparisons against undefined never throw" rule.
pub fn evaluate_ast(node: &AstNode, context: &Value, registry: &OperatorRegistry) -> Result<bool> {
    match node {
        AstNode::Comparison {
            path,
            operator,
            value,
        } => {
            let left = resolve_value(path, context);
            let right = resolve_resolved(value, context);
            let predicate = registry.get(operator)?;
            Ok(predicate(&left, &right))
        }
        AstNode::Logical { operator, children } => {
            evaluate_logical(*operator, children, context, registry)
        }
        AstNode::Diff {
            from,
            to,
            unit,
            operator,
            value,
        } => {
            let from_value = resolve_resolved(from, context);
            let to_value = resolve_resolved(to, context);
            let (from_date, to_date) = match (parse_date(&from_value), parse_date(&to_value)) {
                (Some(f), Some(t)) => (f, t),
                _ => return Ok(false),
            };
            let measured = diff(&from_date, &to_date, *unit);
            let left = Value::integer(measured);
            let right = resolve_resolved(value, context);
            let predicate = registry.get(operator)?;
            Ok(predicate(&left, &right))
        }
        AstNode::NthDayAfter {
            from,
            day_of_week,
            nth,
            operator,
            value,
        } => {
            let from_value = resolve_resolved(from, context);
            let from_date = match parse_date(&from_value) {
                Some(d) => d,
                None => return Ok(false),
            };
            let target = nth_weekday_after(&from_date, *day_of_week, *nth);
            let left = Value::string(target.format("%Y-%m-%d").to_string());
            let right = resolve_resolved(value, context);
            let predicate = registry.get(operator)?;
            Ok(predicate(&left, &right))
        }
    }
}

fn evaluate_logical(
    operator: LogicalOp,
    children: &[AstNode],
    context: &Value,
    registry: &OperatorRegistry,
) -> Result<bool> {
    match operator {
        LogicalOp::And => {
            for child in children {
                if !evaluate_ast(child, context, registry)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        LogicalOp::Or => {
            for child in children {
                if evaluate_ast(child, context, registry)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        LogicalOp::Not => {
            let child = children
                .first()
                .ok_or_else(|| RuleError::evaluation("__not__", "$not requires one child"))?;
            Ok(!evaluate_ast(child, context, registry)?)
        }
    }
}

/// Evaluates a normalized rule: walks the AST for the match decision, then
/// computes only the expressions embedded in the branch that was chosen
/// (`spec.md` §4.6 — "the losing branch's expressions are never evaluated").
/// `max_depth` bounds `$cond` recursion inside those expressions, seeded
/// from `EngineConfig::max_cond_depth`.
pub fn evaluate(
    rule: &NormalizedRule,
    context: &Value,
    registry: &OperatorRegistry,
    max_depth: usize,
) -> Result<EvaluationResult> {
    let matched = evaluate_ast(&rule.ast, context, registry).with_rule_id(rule.id.clone())?;

    let (prefix, outcome) = if matched {
        ("then", rule.then.clone())
    } else {
        (
            "otherwise",
            rule.otherwise.clone().unwrap_or(Value::Object(Vec::new())),
        )
    };

    let mut computed_values = HashMap::new();
    for (key, expr) in &rule.expressions {
        if let Some(field) = key.strip_prefix(&format!("{prefix}.")) {
            let computed = evaluate_expression(expr, context, registry, max_depth)
                .with_rule_id(rule.id.clone())?;
            computed_values.insert(field.to_string(), computed);
        }
    }

    Ok(EvaluationResult {
        rule_id: rule.id.clone(),
        matched,
        outcome,
        computed_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ResolvedValue;
    use crate::dsl::DslRule;
    use crate::normalizer::normalize;
    use crate::value::FromJson;
    use serde_json::json;

    fn rule(j: serde_json::Value) -> DslRule {
        serde_json::from_value(j).unwrap()
    }

    fn ctx(j: serde_json::Value) -> Value {
        Value::from_json(&j)
    }

    #[test]
    fn test_simple_match() {
        let registry = OperatorRegistry::with_builtins();
        let r =
            rule(json!({"id": "r1", "when": {"vars.x": {"$gt": 10}}, "then": {"visible": true}}));
        let normalized = normalize(&r, &registry).unwrap();
        let result = evaluate(
            &normalized,
            &ctx(json!({"vars": {"x": 15}})),
            &registry,
            crate::expression::DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert!(result.matched);
    }

    #[test]
    fn test_short_circuit_and() {
        let registry = OperatorRegistry::with_builtins();
        let r = rule(json!({
            "id": "r1",
            "when": {"$and": [{"a": 1}, {"a": 2}]},
            "then": {}
        }));
        let normalized = normalize(&r, &registry).unwrap();
        let result = evaluate(
            &normalized,
            &ctx(json!({"a": 1})),
            &registry,
            crate::expression::DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert!(!result.matched);
    }

    #[test]
    fn test_otherwise_defaults_to_empty_object() {
        let registry = OperatorRegistry::with_builtins();
        let r = rule(json!({"id": "r1", "when": {"a": 1}, "then": {"x": 1}}));
        let normalized = normalize(&r, &registry).unwrap();
        let result = evaluate(
            &normalized,
            &ctx(json!({"a": 2})),
            &registry,
            crate::expression::DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert!(!result.matched);
        assert_eq!(result.outcome, Value::Object(Vec::new()));
    }

    #[test]
    fn test_diff_unparsable_date_is_false_not_error() {
        let registry = OperatorRegistry::with_builtins();
        let r = rule(json!({
            "id": "r1",
            "when": {"$diff": {"from": "not a date", "to": "2026-02-08", "unit": "days", "$lte": 7}},
            "then": {}
        }));
        let normalized = normalize(&r, &registry).unwrap();
        let result = evaluate(
            &normalized,
            &ctx(json!({})),
            &registry,
            crate::expression::DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert!(!result.matched);
    }

    #[test]
    fn test_only_matched_branch_expressions_computed() {
        let registry = OperatorRegistry::with_builtins();
        let r = rule(json!({
            "id": "r1",
            "when": {"a": 1},
            "then": {"label": {"$concat": ["matched"]}},
            "otherwise": {"label": {"$concat": ["not matched"]}}
        }));
        let normalized = normalize(&r, &registry).unwrap();
        let result = evaluate(
            &normalized,
            &ctx(json!({"a": 1})),
            &registry,
            crate::expression::DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert!(result.matched);
        assert_eq!(
            result.computed_values.get("label"),
            Some(&Value::string("matched"))
        );
    }

    #[test]
    fn test_nth_day_after_in_comparison() {
        let registry = OperatorRegistry::with_builtins();
        let r = rule(json!({
            "id": "r1",
            "when": {"$nthDayAfter": {"from": "2026-07-31", "day": "Fri", "nth": 1, "$eq": "2026-08-07"}},
            "then": {}
        }));
        let normalized = normalize(&r, &registry).unwrap();
        let result = evaluate(
            &normalized,
            &ctx(json!({})),
            &registry,
            crate::expression::DEFAULT_MAX_DEPTH,
        )
        .unwrap();
        assert!(result.matched);
    }

    #[test]
    fn test_resolved_value_array_in_comparison() {
        let resolved = ResolvedValue::Array(vec![ResolvedValue::literal(Value::integer(1))]);
        assert_eq!(
            resolve_resolved(&resolved, &ctx(json!({}))),
            Value::Array(vec![Value::integer(1)])
        );
    }
}
