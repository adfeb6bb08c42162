//! Normalized AST node representation.
//!
//! Mirrors `spec.md` §3: a tagged variant over four shapes rather than a
//! trait-object hierarchy, so the evaluator's dispatch table is exhaustive
//! and every new node shape forces a compile-time update there (spec.md §9).

use crate::datetime::DiffUnit;
use crate::value::Value;

/// A DSL value after classification into literal / reference / list, ready
/// for context-time resolution (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Literal(Value),
    Ref(String),
    Array(Vec<ResolvedValue>),
}

impl ResolvedValue {
    pub fn literal(value: Value) -> Self {
        ResolvedValue::Literal(value)
    }

    pub fn reference(path: impl Into<String>) -> Self {
        ResolvedValue::Ref(path.into())
    }
}

/// The logical connectives usable in a `when` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// A normalized AST node, per `spec.md` §3.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// `{ path, operator, value }` — a single field-path comparison.
    Comparison {
        path: String,
        operator: String,
        value: ResolvedValue,
    },

    /// `{ operator, children }` — `$and`/`$or`/`$not` over child nodes.
    Logical {
        operator: LogicalOp,
        children: Vec<AstNode>,
    },

    /// `$diff` — a signed date-difference comparison.
    Diff {
        from: ResolvedValue,
        to: ResolvedValue,
        unit: DiffUnit,
        operator: String,
        value: ResolvedValue,
    },

    /// `$nthDayAfter` — a comparison against the nth occurrence of a
    /// weekday strictly after a reference date.
    NthDayAfter {
        from: ResolvedValue,
        day_of_week: chrono::Weekday,
        nth: u32,
        operator: String,
        value: ResolvedValue,
    },
}
