//! Value-producing expressions embedded in `then`/`otherwise`, per
//! `spec.md` §4.5.
//!
//! Recognized operators: arithmetic (`$add`/`$sub`/`$mul`/`$div`), `$concat`,
//! `$min`/`$max`, `$coalesce`, `$ref`, `$cond` (which re-enters the rule
//! evaluator on a synthetic clause), and `$lookup`. Anything that is not an
//! object with a single `$`-prefixed key, nor an array, is a literal.

use crate::error::{Result, RuleError};
use crate::evaluator::evaluate_ast;
use crate::normalizer::{is_expression, normalize_clause};
use crate::registry::OperatorRegistry;
use crate::resolver::resolve_value;
use crate::value::{Value, ValueCoercion};

/// Default guard against unbounded `$cond` recursion (spec.md §5).
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Evaluates a `then`/`otherwise` expression value against `context`,
/// bailing out once `$cond` nesting passes `max_depth` (seeded from
/// `EngineConfig::max_cond_depth`).
pub fn evaluate_expression(
    value: &Value,
    context: &Value,
    registry: &OperatorRegistry,
    max_depth: usize,
) -> Result<Value> {
    evaluate_inner(value, context, registry, 0, max_depth)
}

fn evaluate_inner(
    value: &Value,
    context: &Value,
    registry: &OperatorRegistry,
    depth: usize,
    max_depth: usize,
) -> Result<Value> {
    if depth > max_depth {
        return Err(RuleError::evaluation(
            "__cond__",
            "recursion depth exceeded",
        ));
    }

    if let Value::String(s) = value {
        if let Some(path) = s.strip_prefix("$ref:") {
            return Ok(resolve_value(path, context));
        }
    }

    if let Value::Array(items) = value {
        return items
            .iter()
            .map(|item| evaluate_inner(item, context, registry, depth, max_depth))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }

    if !is_expression(value) {
        return Ok(value.clone());
    }

    let entries = value.as_object().expect("is_expression checked Object");
    let (op, arg) = &entries[0];

    let eval_arg =
        |v: &Value| -> Result<Value> { evaluate_inner(v, context, registry, depth + 1, max_depth) };

    match op.as_str() {
        "$add" => fold_numeric(arg, context, registry, depth, max_depth, 0.0, |a, b| a + b),
        "$sub" => reduce_numeric(arg, context, registry, depth, max_depth, |a, b| a - b),
        "$mul" => fold_numeric(arg, context, registry, depth, max_depth, 1.0, |a, b| a * b),
        "$div" => reduce_numeric(arg, context, registry, depth, max_depth, |a, b| {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }),
        "$concat" => {
            let items = as_list(arg);
            let mut result = String::new();
            for item in items {
                let evaluated = eval_arg(item)?;
                result.push_str(&evaluated.to_string());
            }
            Ok(Value::string(result))
        }
        "$min" => fold_numeric(
            arg,
            context,
            registry,
            depth,
            max_depth,
            f64::INFINITY,
            f64::min,
        ),
        "$max" => fold_numeric(
            arg,
            context,
            registry,
            depth,
            max_depth,
            f64::NEG_INFINITY,
            f64::max,
        ),
        "$coalesce" => {
            for item in as_list(arg) {
                let evaluated = eval_arg(item)?;
                if !evaluated.is_null() {
                    return Ok(evaluated);
                }
            }
            Ok(Value::Null)
        }
        "$ref" => {
            let path = arg.as_str().ok_or_else(|| {
                RuleError::normalization("$ref expression requires a string path")
            })?;
            Ok(resolve_value(path, context))
        }
        "$cond" => evaluate_cond(arg, context, registry, depth, max_depth),
        "$lookup" => evaluate_lookup(arg, context, registry, depth, max_depth),
        other => Err(RuleError::unknown_operator(other)),
    }
}

fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn fold_numeric(
    arg: &Value,
    context: &Value,
    registry: &OperatorRegistry,
    depth: usize,
    max_depth: usize,
    init: f64,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    let mut acc = init;
    for item in as_list(arg) {
        let evaluated = evaluate_inner(item, context, registry, depth + 1, max_depth)?;
        acc = f(acc, evaluated.coerce_number());
    }
    Ok(Value::float(acc))
}

fn reduce_numeric(
    arg: &Value,
    context: &Value,
    registry: &OperatorRegistry,
    depth: usize,
    max_depth: usize,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value> {
    let items = as_list(arg);
    let mut values = Vec::with_capacity(items.len());
    for item in items {
        values.push(evaluate_inner(item, context, registry, depth + 1, max_depth)?.coerce_number());
    }
    if values.is_empty() {
        return Ok(Value::float(0.0));
    }
    let mut acc = values[0];
    for v in &values[1..] {
        acc = f(acc, *v);
    }
    Ok(Value::float(acc))
}

/// `$cond: { if: ClauseOrExpression, then: value, else: value }` re-enters
/// the rule evaluator on a synthetic, uncached `"__cond__"` rule (spec.md
/// §4.5, §5, §9).
fn evaluate_cond(
    arg: &Value,
    context: &Value,
    registry: &OperatorRegistry,
    depth: usize,
    max_depth: usize,
) -> Result<Value> {
    let if_clause = arg
        .get("if")
        .ok_or_else(|| RuleError::normalization("$cond requires 'if'"))?;
    let then_value = arg
        .get("then")
        .ok_or_else(|| RuleError::normalization("$cond requires 'then'"))?;
    let else_value = arg.get("else").cloned().unwrap_or(Value::Null);

    let ast = normalize_clause(if_clause, registry)
        .map_err(|_| RuleError::evaluation("__cond__", "invalid $cond.if clause"))?;
    let matched = evaluate_ast(&ast, context, registry)
        .map_err(|e| RuleError::evaluation("__cond__", e.to_string()))?;

    let branch = if matched { then_value } else { &else_value };
    evaluate_inner(branch, context, registry, depth + 1, max_depth)
}

/// `$lookup: { in: ref-or-list, where: clause }` — the first element of
/// `in` for which `where` matches, with `$` bound to that element.
fn evaluate_lookup(
    arg: &Value,
    context: &Value,
    registry: &OperatorRegistry,
    depth: usize,
    max_depth: usize,
) -> Result<Value> {
    let in_value = arg
        .get("in")
        .ok_or_else(|| RuleError::normalization("$lookup requires 'in'"))?;
    let where_clause = arg
        .get("where")
        .ok_or_else(|| RuleError::normalization("$lookup requires 'where'"))?;

    let list = evaluate_inner(in_value, context, registry, depth + 1, max_depth)?;
    let items = match list {
        Value::Array(items) => items,
        _ => return Ok(Value::Null),
    };

    // `where` doesn't change across iterations, so normalize it once rather
    // than re-parsing the same clause for every element.
    let ast = normalize_clause(where_clause, registry)
        .map_err(|_| RuleError::evaluation("__lookup__", "invalid $lookup.where clause"))?;

    for item in items {
        let iteration_context = bind_dollar(context, &item);
        if evaluate_ast(&ast, &iteration_context, registry)
            .map_err(|e| RuleError::evaluation("__lookup__", e.to_string()))?
        {
            return Ok(item);
        }
    }
    Ok(Value::Null)
}

fn bind_dollar(context: &Value, element: &Value) -> Value {
    let mut entries = match context {
        Value::Object(entries) => entries.clone(),
        _ => Vec::new(),
    };
    entries.retain(|(k, _)| k != "$");
    entries.push(("$".to_string(), element.clone()));
    Value::Object(entries)
}
