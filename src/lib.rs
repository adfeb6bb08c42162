//! A declarative conditional rule engine: evaluates JSON-encoded rules
//! against a layered runtime context to produce visibility decisions and
//! computed output values.
//!
//! The crate is organized the way the evaluation pipeline runs: a [`dsl`]
//! rule is [`validator`]-checked, [`normalizer`]-lowered into an [`ast`]
//! (with [`registry`] operators and [`resolver`] paths resolved lazily at
//! evaluation time), [`cache`]d, and finally walked by [`evaluator`]
//! (which re-enters through [`expression`] for computed values). The
//! [`engine`] module ties the pipeline together behind a single facade.

pub mod ast;
pub mod cache;
pub mod config;
pub mod context;
pub mod datetime;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod normalizer;
pub mod registry;
pub mod resolver;
pub mod validator;
pub mod value;

pub use config::{BatchErrorPolicy, EngineConfig};
pub use context::{build_context, ContextBuilder};
pub use dsl::DslRule;
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use evaluator::EvaluationResult;
pub use normalizer::NormalizedRule;
pub use registry::OperatorRegistry;
pub use validator::ValidationResult;
pub use value::Value;
