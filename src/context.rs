//! Assembles a `RuleContext` from host-supplied pieces, per `spec.md` §4.8.

use crate::value::Value;
use chrono::{Datelike, Utc};
use std::collections::HashMap;

/// The pieces a host hands in to build a `RuleContext`. Every field is
/// optional; absent fields are simply omitted from the resulting map.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    pub presentation: Option<Value>,
    pub slide: Option<Value>,
    pub variables: HashMap<String, Value>,
    pub app_settings: Option<Value>,
    pub extra: HashMap<String, Value>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presentation(mut self, value: Value) -> Self {
        self.presentation = Some(value);
        self
    }

    pub fn slide(mut self, value: Value) -> Self {
        self.slide = Some(value);
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn app_settings(mut self, value: Value) -> Self {
        self.app_settings = Some(value);
        self
    }

    pub fn extra_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Builds the `RuleContext`: flattens `variables` into `vars` keyed by
    /// both the raw `{{NAME}}` form and the brace-stripped `NAME` form, and
    /// fills `meta.now`/`meta.dayOfWeek` from the host clock.
    pub fn build(self) -> Value {
        build_context(
            self.presentation,
            self.slide,
            self.variables,
            self.app_settings,
            self.extra,
        )
    }
}

/// Free-function form of `ContextBuilder::build`, matching `spec.md` §4.8's
/// static `buildContext`.
pub fn build_context(
    presentation: Option<Value>,
    slide: Option<Value>,
    variables: HashMap<String, Value>,
    app_settings: Option<Value>,
    extra: HashMap<String, Value>,
) -> Value {
    let mut vars = Vec::with_capacity(variables.len() * 2);
    // `variables` is a HashMap; sort by key first so that two entries
    // normalizing to the same stripped name (e.g. "NAME" and "{{NAME}}")
    // resolve deterministically rather than depending on hash iteration order.
    let mut entries: Vec<_> = variables.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    for (name, value) in entries {
        let stripped = name
            .strip_prefix("{{")
            .and_then(|s| s.strip_suffix("}}"))
            .unwrap_or(&name)
            .to_string();
        let raw = if name.starts_with("{{") {
            name.clone()
        } else {
            format!("{{{{{name}}}}}")
        };
        vars.push((stripped, value.clone()));
        vars.push((raw, value));
    }

    let now = Utc::now();
    let mut meta = vec![
        ("now".to_string(), Value::string(now.to_rfc3339())),
        (
            "dayOfWeek".to_string(),
            Value::string(crate::datetime::weekday_abbrev(now.weekday())),
        ),
    ];
    for (key, value) in extra {
        meta.push((key, value));
    }

    Value::Object(vec![
        (
            "presentation".to_string(),
            presentation.unwrap_or(Value::Object(Vec::new())),
        ),
        (
            "slide".to_string(),
            slide.unwrap_or(Value::Object(Vec::new())),
        ),
        ("vars".to_string(), Value::Object(vars)),
        (
            "settings".to_string(),
            app_settings.unwrap_or(Value::Object(Vec::new())),
        ),
        ("meta".to_string(), Value::Object(meta)),
    ])
}
