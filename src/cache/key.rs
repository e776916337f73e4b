//! Deterministic cache key construction.

use std::collections::BTreeMap;
use std::fmt;

/// Prefix shared by every cache entry, so bulk invalidation can target the
/// whole cache with `cache:*`.
const CACHE_KEY_PREFIX: &str = "cache";

/// A cache key derived from a function identity plus its arguments.
///
/// Positional arguments keep their call order; keyword arguments are held in
/// a sorted map, so two call sites passing the same pairs in different order
/// render the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identity: String,
    args: Vec<String>,
    kwargs: BTreeMap<String, String>,
}

impl CacheKey {
    /// Start a key for the given function identity.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }

    /// Add a keyword argument. Insertion order does not affect the rendered
    /// key.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.kwargs.insert(name.into(), value.to_string());
        self
    }

    /// Render the full store key.
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(2 + self.args.len() + self.kwargs.len() * 2);
        parts.push(CACHE_KEY_PREFIX.to_string());
        parts.push(self.identity.clone());
        parts.extend(self.args.iter().cloned());
        for (name, value) in &self.kwargs {
            parts.push(name.clone());
            parts.push(value.clone());
        }
        parts.join(":")
    }

    /// A glob pattern matching every entry for `identity`, for use with
    /// `ResponseCache::invalidate`.
    pub fn pattern_for(identity: &str) -> String {
        format!("{}:{}:*", CACHE_KEY_PREFIX, identity)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
