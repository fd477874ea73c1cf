//! Cache table: exact match from lookup key to stored value

use std::collections::HashMap;

/// Installed key/value pairs. No eviction and no expiry; an entry lives
/// until it is overwritten or the tables are reset.
#[derive(Debug, Clone, Default)]
pub struct CacheTable {
    entries: HashMap<u32, u32>,
}

impl CacheTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins. Returns the previous value for the key.
    pub fn insert(&mut self, key: u32, value: u32) -> Option<u32> {
        self.entries.insert(key, value)
    }

    pub fn lookup(&self, key: u32) -> Option<u32> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
