//! Structural and semantic validation of DSL rules, per `spec.md` §4.4.
//!
//! Validation is advisory: it never blocks normalization by itself, it just
//! gives a host a pre-flight check it can choose to run (and choose to
//! ignore) before handing a rule to the engine.

use crate::dsl::DslRule;
use crate::registry::OperatorRegistry;
use crate::value::Value;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub path: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub issues: Vec<Issue>,
}

/// Validates a rule's structure and operator references without lowering
/// it to an AST.
pub fn validate(rule: &DslRule, registry: &OperatorRegistry) -> ValidationResult {
    let mut issues = Vec::new();

    if rule.id.trim().is_empty() {
        issues.push(Issue {
            path: "id".to_string(),
            message: "id must be non-empty".to_string(),
            severity: Severity::Error,
        });
    }

    let when = rule.when_value();
    match when.as_object() {
        Some(entries) if !entries.is_empty() => {
            validate_clause("when", &when, registry, &mut issues);
        }
        _ => issues.push(Issue {
            path: "when".to_string(),
            message: "when must be a non-empty clause".to_string(),
            severity: Severity::Error,
        }),
    }

    validate_outcome_expressions("then", &rule.then_value(), registry, &mut issues);
    if let Some(otherwise) = rule.otherwise_value() {
        validate_outcome_expressions("otherwise", &otherwise, registry, &mut issues);
    }

    let valid = !issues.iter().any(|i| i.severity == Severity::Error);
    ValidationResult { valid, issues }
}

fn validate_clause(
    path: &str,
    clause: &Value,
    registry: &OperatorRegistry,
    issues: &mut Vec<Issue>,
) {
    let entries = match clause.as_object() {
        Some(e) => e,
        None => {
            issues.push(Issue {
                path: path.to_string(),
                message: "clause must be an object".to_string(),
                severity: Severity::Error,
            });
            return;
        }
    };

    if entries.is_empty() {
        issues.push(Issue {
            path: path.to_string(),
            message: "clause has no conditions".to_string(),
            severity: Severity::Error,
        });
        return;
    }

    if let Some((_, spec)) = entries.iter().find(|(k, _)| k == "$diff") {
        validate_diff(&format!("{path}.$diff"), spec, registry, issues);
        return;
    }
    if let Some((_, spec)) = entries.iter().find(|(k, _)| k == "$nthDayAfter") {
        validate_nth_day_after(&format!("{path}.$nthDayAfter"), spec, issues);
        return;
    }

    for (key, value) in entries {
        let child_path = format!("{path}.{key}");
        if key == "$and" || key == "$or" {
            match value.as_array() {
                Some(items) if !items.is_empty() => {
                    for (i, item) in items.iter().enumerate() {
                        validate_clause(&format!("{child_path}[{i}]"), item, registry, issues);
                    }
                }
                _ => issues.push(Issue {
                    path: child_path,
                    message: format!("{key} requires a non-empty array"),
                    severity: Severity::Error,
                }),
            }
        } else if key == "$not" {
            validate_clause(&child_path, value, registry, issues);
        } else if let Some(ops) = value.as_object() {
            if ops.is_empty() {
                issues.push(Issue {
                    path: child_path.clone(),
                    message: "operator object must not be empty".to_string(),
                    severity: Severity::Error,
                });
            }
            for (op, op_value) in ops {
                if op == "$regex" {
                    if let Some(pattern) = op_value.as_str() {
                        if Regex::new(pattern).is_err() {
                            issues.push(Issue {
                                path: format!("{child_path}.$regex"),
                                message: format!("'{pattern}' does not compile as a regex"),
                                severity: Severity::Warning,
                            });
                        }
                    }
                } else if op == "$between"
                    && !matches!(op_value.as_array(), Some(items) if items.len() == 2)
                {
                    issues.push(Issue {
                        path: format!("{child_path}.$between"),
                        message: "$between requires a 2-element array".to_string(),
                        severity: Severity::Error,
                    });
                }
                if !registry.has(op) {
                    issues.push(Issue {
                        path: child_path.clone(),
                        message: format!("unknown operator '{op}'"),
                        severity: Severity::Error,
                    });
                }
            }
        }
    }
}

fn validate_diff(path: &str, spec: &Value, registry: &OperatorRegistry, issues: &mut Vec<Issue>) {
    let entries = match spec.as_object() {
        Some(e) => e,
        None => {
            issues.push(Issue {
                path: path.to_string(),
                message: "$diff requires an object".to_string(),
                severity: Severity::Error,
            });
            return;
        }
    };
    for required in ["from", "to", "unit"] {
        if !entries.iter().any(|(k, _)| k == required) {
            issues.push(Issue {
                path: path.to_string(),
                message: format!("$diff requires '{required}'"),
                severity: Severity::Error,
            });
        }
    }
    let unit_ok = entries
        .iter()
        .find(|(k, _)| k == "unit")
        .and_then(|(_, v)| v.as_str())
        .map(|u| matches!(u, "days" | "weeks" | "months" | "years"))
        .unwrap_or(false);
    if !unit_ok {
        issues.push(Issue {
            path: format!("{path}.unit"),
            message: "unit must be one of days, weeks, months, years".to_string(),
            severity: Severity::Error,
        });
    }
    let has_comparison_operator = entries
        .iter()
        .any(|(k, _)| k != "from" && k != "to" && k != "unit" && registry.has(k));
    if !has_comparison_operator {
        issues.push(Issue {
            path: path.to_string(),
            message: "$diff requires a registered comparison operator".to_string(),
            severity: Severity::Error,
        });
    }
}

fn validate_nth_day_after(path: &str, spec: &Value, issues: &mut Vec<Issue>) {
    let entries = match spec.as_object() {
        Some(e) => e,
        None => {
            issues.push(Issue {
                path: path.to_string(),
                message: "$nthDayAfter requires an object".to_string(),
                severity: Severity::Error,
            });
            return;
        }
    };
    for required in ["from", "day", "nth"] {
        if !entries.iter().any(|(k, _)| k == required) {
            issues.push(Issue {
                path: path.to_string(),
                message: format!("$nthDayAfter requires '{required}'"),
                severity: Severity::Error,
            });
        }
    }
    if let Some((_, day)) = entries.iter().find(|(k, _)| k == "day") {
        if crate::datetime::parse_weekday(day).is_none() {
            issues.push(Issue {
                path: format!("{path}.day"),
                message: "day must be a Mon-Sun abbreviation or an integer 0-6".to_string(),
                severity: Severity::Error,
            });
        }
    }
    let nth_ok = entries
        .iter()
        .find(|(k, _)| k == "nth")
        .and_then(|(_, v)| v.as_f64())
        .map(|n| n >= 1.0 && n.fract() == 0.0)
        .unwrap_or(false);
    if !nth_ok {
        issues.push(Issue {
            path: format!("{path}.nth"),
            message: "nth must be a positive integer".to_string(),
            severity: Severity::Error,
        });
    }
}

/// Expression operators are intentionally more permissive than comparison
/// operators (spec.md §4.4): an unknown expression operator is a warning,
/// not an error, since computed-value failures don't block the engine from
/// choosing a branch — only from filling in that one key.
fn validate_outcome_expressions(
    prefix: &str,
    outcome: &Value,
    _registry: &OperatorRegistry,
    issues: &mut Vec<Issue>,
) {
    const KNOWN_EXPRESSION_OPS: &[&str] = &[
        "$add",
        "$sub",
        "$mul",
        "$div",
        "$concat",
        "$min",
        "$max",
        "$coalesce",
        "$ref",
        "$cond",
        "$lookup",
    ];
    let entries = match outcome.as_object() {
        Some(e) => e,
        None => return,
    };
    for (key, value) in entries {
        if let Some(op_entries) = value.as_object() {
            if let Some((op, _)) = op_entries.first() {
                if op.starts_with('$') && !KNOWN_EXPRESSION_OPS.contains(&op.as_str()) {
                    issues.push(Issue {
                        path: format!("{prefix}.{key}"),
                        message: format!("unknown expression operator '{op}'"),
                        severity: Severity::Warning,
                    });
                }
            }
        }
    }
}
