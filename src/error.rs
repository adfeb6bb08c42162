//! Error types for rule parsing and evaluation.
//!
//! This module provides a single error enum covering every typed failure
//! mode the engine can produce: normalization, validation, reference
//! resolution, evaluation, and unknown-operator lookups.

use std::error::Error;
use std::fmt;
use std::result;

/// A specialized Result type for rule engine operations.
pub type Result<T> = result::Result<T, RuleError>;

/// Errors that can occur while validating, normalizing, or evaluating a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    /// A rule failed structural or semantic validation.
    Validation {
        /// The issues found, in the shape returned by `validate`.
        issues: Vec<String>,
    },

    /// A rule could not be lowered into an AST.
    Normalization {
        /// Why normalization failed.
        reason: String,
    },

    /// A reference path resolved to something other than a usable value.
    Resolution {
        /// The offending path.
        path: String,
    },

    /// An uncaught failure occurred while walking an AST.
    Evaluation {
        /// The id of the rule being evaluated.
        rule_id: String,
        /// The underlying cause.
        reason: String,
    },

    /// An operator name has no registered predicate.
    UnknownOperator {
        /// The operator that was looked up.
        operator: String,
    },

    /// A rule or context could not be decoded from JSON.
    Decode {
        /// The `serde_json` failure message.
        reason: String,
    },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::Validation { issues } => {
                write!(f, "rule failed validation: {}", issues.join("; "))
            }
            RuleError::Normalization { reason } => {
                write!(f, "normalization error: {reason}")
            }
            RuleError::Resolution { path } => {
                write!(f, "could not resolve reference '{path}'")
            }
            RuleError::Evaluation { rule_id, reason } => {
                write!(f, "evaluation of rule '{rule_id}' failed: {reason}")
            }
            RuleError::UnknownOperator { operator } => {
                write!(f, "unknown operator '{operator}'")
            }
            RuleError::Decode { reason } => {
                write!(f, "could not decode JSON: {reason}")
            }
        }
    }
}

impl Error for RuleError {}

/// Extension methods for `Result<T, RuleError>`.
pub trait RuleResultExt<T> {
    /// Wraps an evaluation failure with the id of the rule being evaluated.
    fn with_rule_id(self, rule_id: impl Into<String>) -> Result<T>;
}

impl<T> RuleResultExt<T> for Result<T> {
    fn with_rule_id(self, rule_id: impl Into<String>) -> Result<T> {
        self.map_err(|err| match err {
            RuleError::Evaluation { reason, .. } => RuleError::Evaluation {
                rule_id: rule_id.into(),
                reason,
            },
            other => RuleError::Evaluation {
                rule_id: rule_id.into(),
                reason: other.to_string(),
            },
        })
    }
}

impl RuleError {
    /// Creates a normalization error with the given reason.
    pub fn normalization(reason: impl Into<String>) -> Self {
        RuleError::Normalization {
            reason: reason.into(),
        }
    }

    /// Creates a resolution error for the given path.
    pub fn resolution(path: impl Into<String>) -> Self {
        RuleError::Resolution { path: path.into() }
    }

    /// Creates an evaluation error for the given rule id and reason.
    pub fn evaluation(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        RuleError::Evaluation {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown-operator error.
    pub fn unknown_operator(operator: impl Into<String>) -> Self {
        RuleError::UnknownOperator {
            operator: operator.into(),
        }
    }

    /// Creates a decode error from a `serde_json` failure.
    pub fn decode(reason: impl Into<String>) -> Self {
        RuleError::Decode {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::decode(err.to_string())
    }
}
