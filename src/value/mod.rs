//! Value representation shared by the resolver, operators, and evaluator.
//!
//! `Value` is a plain owned enum rather than an arena-backed type — see
//! `DESIGN.md` for why this crate drops arena allocation relative to its
//! teacher repo.

mod coercion;
mod convert;
mod data_value;
mod number;

pub use coercion::{all_strings, canonical_eq, Canonical, ValueCoercion};
pub use convert::{FromJson, ToJson};
pub use data_value::Value;
pub use number::Number;
