//! The DSL surface syntax: a rule as a host hands it to the engine.
//!
//! `spec.md` §3 describes the surface as plain JSON; this module decodes it
//! into typed Rust structs (deriving `serde`) while keeping `when`/`then`/
//! `otherwise` as the engine's own `Value` so the normalizer can pattern
//! match on clause shapes without re-parsing JSON.

use crate::value::{FromJson, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A rule exactly as `spec.md` §3 defines it: `{ id, when, then, otherwise? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DslRule {
    pub id: String,
    pub when: JsonValue,
    pub then: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<JsonValue>,
}

impl DslRule {
    /// Parses a rule from its canonical JSON text form.
    pub fn parse(source: &str) -> crate::error::Result<Self> {
        serde_json::from_str(source).map_err(crate::error::RuleError::from)
    }

    pub fn when_value(&self) -> Value {
        Value::from_json(&self.when)
    }

    pub fn then_value(&self) -> Value {
        Value::from_json(&self.then)
    }

    pub fn otherwise_value(&self) -> Option<Value> {
        self.otherwise.as_ref().map(Value::from_json)
    }
}
