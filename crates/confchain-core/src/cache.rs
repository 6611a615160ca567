//! Memo of environment values, keyed by property path
//!
//! Entries are stored in a nested [`Value`] so the cache shares the path space
//! (and the path semantics) of the internal configuration. Entries are never
//! evicted and never expire; a variable changed behind the engine's back keeps
//! its first-seen value here.

use crate::value::Value;

/// Path-keyed memo of environment reads
#[derive(Debug, Clone)]
pub struct ValueCache {
    enabled: bool,
    entries: Value,
}

impl ValueCache {
    /// Create an empty cache
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Value::empty_mapping(),
        }
    }

    /// Whether reads are served from the cache
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Presence check: a cached `false`, `0` or `""` counts as present
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_path(path)
    }

    /// Cached value at `path`, or `default` when there is none
    pub fn get_or(&self, path: &str, default: Option<Value>) -> Option<Value> {
        self.entries.get_path(path).cloned().or(default)
    }

    /// Store `value` at `path` if there is one
    pub fn set_if_defined(&mut self, path: &str, value: Option<Value>) {
        self.entries.set_path_if_defined(path, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_cache_misses() {
        let cache = ValueCache::new(true);

        assert!(cache.is_enabled());
        assert!(!cache.contains("PORT"));
        assert_eq!(cache.get_or("PORT", Some(Value::from(80))), Some(Value::from(80)));
    }

    #[test]
    fn test_falsy_entries_are_present() {
        let mut cache = ValueCache::new(true);
        cache.set_if_defined("FLAG", Some(Value::from("")));
        cache.set_if_defined("OFF", Some(Value::Bool(false)));

        assert!(cache.contains("FLAG"));
        assert!(cache.contains("OFF"));
        assert_eq!(cache.get_or("FLAG", Some(Value::from("fallback"))), Some(Value::from("")));
    }

    #[test]
    fn test_none_is_not_stored() {
        let mut cache = ValueCache::new(true);
        cache.set_if_defined("MISSING", None);

        assert!(!cache.contains("MISSING"));
    }

    #[test]
    fn test_dotted_paths_nest() {
        let mut cache = ValueCache::new(false);
        cache.set_if_defined("database.host", Some(Value::from("db")));

        assert!(!cache.is_enabled());
        assert!(cache.contains("database"));
        assert_eq!(cache.get_or("database.host", None), Some(Value::from("db")));
    }
}
