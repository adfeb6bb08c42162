//! Engine configuration, per `spec.md` §4.7/§5 and the batch error policy
//! open question in §7/§9.

use std::time::Duration;

/// What `evaluate_all` does when one rule in the batch fails to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchErrorPolicy {
    /// Skip the failing rule and keep evaluating the rest (the default,
    /// matching spec.md's own resolution of the open question).
    Continue,
    /// Stop the batch and propagate the first error.
    Abort,
}

/// Tunables for a `RuleEngine` instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of normalized rules held in the AST cache.
    pub cache_capacity: usize,
    /// How long a cached AST remains valid after normalization.
    pub cache_ttl: Duration,
    /// Guard against unbounded `$cond` recursion.
    pub max_cond_depth: usize,
    /// `evaluate_all`'s continue-vs-abort behavior.
    pub batch_error_policy: BatchErrorPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cache_capacity: 256,
            cache_ttl: Duration::from_secs(300),
            max_cond_depth: crate::expression::DEFAULT_MAX_DEPTH,
            batch_error_policy: BatchErrorPolicy::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.max_cond_depth, 32);
        assert_eq!(config.batch_error_policy, BatchErrorPolicy::Continue);
    }
}
