//! Bounded, TTL-expiring cache of normalized ASTs, per `spec.md` §4.7.
//!
//! Grounded on the same shape a sibling engine in this codebase uses for a
//! compiled-plan cache keyed by source string: an `lru::LruCache` wrapping
//! each entry with its insertion time, so a hit can still be rejected for
//! staleness without a second data structure.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::normalizer::NormalizedRule;

struct Entry {
    rule: NormalizedRule,
    inserted_at: Instant,
}

/// An LRU cache of normalized rules, keyed by rule id, bounded by capacity
/// and by a per-entry time-to-live.
pub struct AstCache {
    entries: LruCache<String, Entry>,
    ttl: Duration,
}

impl AstCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        AstCache {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Returns the cached rule for `id` unless it is absent or expired.
    /// An expired entry is evicted as a side effect of the lookup.
    pub fn get(&mut self, id: &str) -> Option<NormalizedRule> {
        let expired = match self.entries.get(id) {
            Some(entry) => entry.inserted_at.elapsed() >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.pop(id);
            return None;
        }
        self.entries.get(id).map(|entry| entry.rule.clone())
    }

    pub fn set(&mut self, id: String, rule: NormalizedRule) {
        self.entries.put(
            id,
            Entry {
                rule,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drops one rule's cached AST, e.g. when a host edits that rule.
    pub fn invalidate(&mut self, id: &str) {
        self.entries.pop(id);
    }

    /// Drops every cached AST — used when operator semantics change under
    /// rules already normalized (`engine.rs::register_operator`).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, LogicalOp};
    use std::collections::HashMap;
    use std::thread::sleep;

    fn sample_rule(id: &str) -> NormalizedRule {
        NormalizedRule {
            id: id.to_string(),
            ast: AstNode::Logical {
                operator: LogicalOp::And,
                children: vec![],
            },
            then: crate::value::Value::null(),
            otherwise: None,
            expressions: HashMap::new(),
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut cache = AstCache::new(8, Duration::from_secs(60));
        cache.set("r1".to_string(), sample_rule("r1"));
        assert!(cache.get("r1").is_some());
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_ttl_expiry() {
        let mut cache = AstCache::new(8, Duration::from_millis(5));
        cache.set("r1".to_string(), sample_rule("r1"));
        sleep(Duration::from_millis(20));
        assert!(cache.get("r1").is_none());
    }

    #[test]
    fn test_capacity_eviction() {
        let mut cache = AstCache::new(1, Duration::from_secs(60));
        cache.set("r1".to_string(), sample_rule("r1"));
        cache.set("r2".to_string(), sample_rule("r2"));
        assert!(cache.get("r1").is_none());
        assert!(cache.get("r2").is_some());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let mut cache = AstCache::new(8, Duration::from_secs(60));
        cache.set("r1".to_string(), sample_rule("r1"));
        cache.set("r2".to_string(), sample_rule("r2"));
        cache.invalidate("r1");
        assert!(cache.get("r1").is_none());
        assert!(cache.get("r2").is_some());
        cache.clear();
        assert!(cache.is_empty());
    }
}
