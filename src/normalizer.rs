//! Lowers a DSL rule into a `NormalizedRule`, per `spec.md` §4.3.
//!
//! Multi-key clause mappings are surface sugar for an implicit `$and`; this
//! module is the only place that knows that, so the evaluator never has to
//! (spec.md §9, "Implicit `$and`").

use crate::ast::{AstNode, LogicalOp, ResolvedValue};
use crate::datetime::{parse_weekday, DiffUnit};
use crate::dsl::DslRule;
use crate::error::{Result, RuleError};
use crate::registry::OperatorRegistry;
use crate::value::Value;
use std::collections::HashMap;

/// A rule after normalization: a single AST plus the outcome maps and the
/// embedded expressions extracted from them.
#[derive(Debug, Clone)]
pub struct NormalizedRule {
    pub id: String,
    pub ast: AstNode,
    pub then: Value,
    pub otherwise: Option<Value>,
    /// Keyed by `"then.KEY"` / `"otherwise.KEY"`, per spec.md §4.3.
    pub expressions: HashMap<String, Value>,
}

/// Lowers a `DslRule` into a `NormalizedRule`.
pub fn normalize(rule: &DslRule, registry: &OperatorRegistry) -> Result<NormalizedRule> {
    let when = rule.when_value();
    let ast = normalize_clause(&when, registry)?;

    let then = rule.then_value();
    let otherwise = rule.otherwise_value();

    let mut expressions = HashMap::new();
    extract_expressions("then", &then, &mut expressions);
    if let Some(otherwise) = &otherwise {
        extract_expressions("otherwise", otherwise, &mut expressions);
    }

    Ok(NormalizedRule {
        id: rule.id.clone(),
        ast,
        then,
        otherwise,
        expressions,
    })
}

/// Lowers a single `when` (or `$cond.if`, or `$lookup.where`) clause into an
/// AST node.
pub fn normalize_clause(clause: &Value, registry: &OperatorRegistry) -> Result<AstNode> {
    let entries = match clause {
        Value::Object(entries) => entries,
        _ => return Err(RuleError::normalization("a clause must be a JSON object")),
    };

    if entries.is_empty() {
        return Err(RuleError::normalization("clause has no conditions"));
    }

    if let Some((_, diff_spec)) = entries.iter().find(|(k, _)| k == "$diff") {
        return normalize_diff(diff_spec, registry);
    }
    if let Some((_, spec)) = entries.iter().find(|(k, _)| k == "$nthDayAfter") {
        return normalize_nth_day_after(spec, registry);
    }

    let mut nodes = Vec::new();
    for (key, value) in entries {
        if key == "$and" || key == "$or" {
            let op = if key == "$and" {
                LogicalOp::And
            } else {
                LogicalOp::Or
            };
            let items = value.as_array().ok_or_else(|| {
                RuleError::normalization(format!("{key} requires a non-empty array"))
            })?;
            if items.is_empty() {
                return Err(RuleError::normalization(format!(
                    "{key} requires a non-empty array"
                )));
            }
            let children = items
                .iter()
                .map(|child| normalize_clause(child, registry))
                .collect::<Result<Vec<_>>>()?;
            nodes.push(AstNode::Logical {
                operator: op,
                children,
            });
        } else if key == "$not" {
            let child = normalize_clause(value, registry)?;
            nodes.push(AstNode::Logical {
                operator: LogicalOp::Not,
                children: vec![child],
            });
        } else {
            nodes.extend(normalize_field_clause(key, value, registry)?);
        }
    }

    Ok(wrap_implicit_and(nodes))
}

fn normalize_field_clause(
    path: &str,
    value: &Value,
    registry: &OperatorRegistry,
) -> Result<Vec<AstNode>> {
    match value {
        Value::Object(ops) if ops.is_empty() => Err(RuleError::normalization(format!(
            "operator object for field '{path}' must not be empty"
        ))),
        Value::Object(ops) => {
            let mut nodes = Vec::with_capacity(ops.len());
            for (op, op_value) in ops {
                if !registry.has(op) {
                    return Err(RuleError::normalization(format!(
                        "unknown operator '{op}' on field '{path}'"
                    )));
                }
                nodes.push(AstNode::Comparison {
                    path: path.to_string(),
                    operator: op.clone(),
                    value: to_resolved(op_value),
                });
            }
            Ok(nodes)
        }
        // Shorthand equality: a bare literal means `$eq`.
        other => Ok(vec![AstNode::Comparison {
            path: path.to_string(),
            operator: "$eq".to_string(),
            value: to_resolved(other),
        }]),
    }
}

fn normalize_diff(spec: &Value, registry: &OperatorRegistry) -> Result<AstNode> {
    let entries = spec
        .as_object()
        .ok_or_else(|| RuleError::normalization("$diff requires an object"))?;

    let from = find_key(entries, "from")
        .ok_or_else(|| RuleError::normalization("$diff requires 'from'"))?;
    let to =
        find_key(entries, "to").ok_or_else(|| RuleError::normalization("$diff requires 'to'"))?;
    let unit_value = find_key(entries, "unit")
        .ok_or_else(|| RuleError::normalization("$diff requires 'unit'"))?;
    let unit = unit_value
        .as_str()
        .and_then(DiffUnit::parse)
        .ok_or_else(|| {
            RuleError::normalization("$diff.unit must be one of days, weeks, months, years")
        })?;

    let (operator, op_value) = entries
        .iter()
        .find(|(k, _)| k != "from" && k != "to" && k != "unit")
        .ok_or_else(|| RuleError::normalization("$diff requires a comparison operator"))?;

    if !registry.has(operator) {
        return Err(RuleError::normalization(format!(
            "unknown comparison operator '{operator}' in $diff"
        )));
    }

    Ok(AstNode::Diff {
        from: to_resolved(from),
        to: to_resolved(to),
        unit,
        operator: operator.clone(),
        value: to_resolved(op_value),
    })
}

fn normalize_nth_day_after(spec: &Value, registry: &OperatorRegistry) -> Result<AstNode> {
    let entries = spec
        .as_object()
        .ok_or_else(|| RuleError::normalization("$nthDayAfter requires an object"))?;

    let from = find_key(entries, "from")
        .ok_or_else(|| RuleError::normalization("$nthDayAfter requires 'from'"))?;
    let day_value = find_key(entries, "day")
        .ok_or_else(|| RuleError::normalization("$nthDayAfter requires 'day'"))?;
    let day_of_week = parse_weekday(day_value)
        .ok_or_else(|| RuleError::normalization("$nthDayAfter.day must be Sun..Sat or 0..6"))?;
    let nth_value = find_key(entries, "nth")
        .ok_or_else(|| RuleError::normalization("$nthDayAfter requires 'nth'"))?;
    let nth = nth_value
        .as_f64()
        .filter(|n| *n >= 1.0 && n.fract() == 0.0)
        .map(|n| n as u32)
        .ok_or_else(|| RuleError::normalization("$nthDayAfter.nth must be a positive integer"))?;

    let (operator, op_value) = entries
        .iter()
        .find(|(k, _)| k != "from" && k != "day" && k != "nth")
        .ok_or_else(|| RuleError::normalization("$nthDayAfter requires a comparison operator"))?;

    if !registry.has(operator) {
        return Err(RuleError::normalization(format!(
            "unknown comparison operator '{operator}' in $nthDayAfter"
        )));
    }

    Ok(AstNode::NthDayAfter {
        from: to_resolved(from),
        day_of_week,
        nth,
        operator: operator.clone(),
        value: to_resolved(op_value),
    })
}

fn find_key<'a>(entries: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn wrap_implicit_and(mut nodes: Vec<AstNode>) -> AstNode {
    if nodes.len() == 1 {
        nodes.pop().unwrap()
    } else {
        AstNode::Logical {
            operator: LogicalOp::And,
            children: nodes,
        }
    }
}

/// Classifies a DSL value into literal / reference / array, per spec.md §3:
/// a string prefixed `$ref:` is a reference, an array resolves
/// element-wise, everything else is a literal.
pub fn to_resolved(value: &Value) -> ResolvedValue {
    match value {
        Value::String(s) => match s.strip_prefix("$ref:") {
            Some(path) => ResolvedValue::reference(path),
            None => ResolvedValue::literal(value.clone()),
        },
        Value::Array(items) => ResolvedValue::Array(items.iter().map(to_resolved).collect()),
        other => ResolvedValue::literal(other.clone()),
    }
}

/// Walks `then`/`otherwise`, extracting `$`-keyed expression objects into
/// `expressions` under `"then.KEY"`/`"otherwise.KEY"`, per spec.md §4.3.
/// The outcome map itself is left untouched — the evaluator substitutes the
/// computed value only for the branch that matched.
fn extract_expressions(prefix: &str, outcome: &Value, expressions: &mut HashMap<String, Value>) {
    let entries = match outcome.as_object() {
        Some(entries) => entries,
        None => return,
    };
    for (key, value) in entries {
        if is_expression(value) {
            expressions.insert(format!("{prefix}.{key}"), value.clone());
        }
    }
}

/// An expression is an object whose first key begins with `$`.
pub fn is_expression(value: &Value) -> bool {
    matches!(value.as_object(), Some([(first_key, _), ..]) if first_key.starts_with('$'))
}
