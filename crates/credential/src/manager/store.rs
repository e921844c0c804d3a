//! In-memory credential cache

use crate::core::{CredentialValue, StorageKey};
use std::collections::{BTreeSet, HashMap};

/// Cached credential values keyed by [`StorageKey`].
///
/// Never holds an empty value: storing one removes the entry instead.
///
/// Each key also carries a revision that moves forward on every caller
/// mutation ([`update`](Self::update), [`remove`](Self::remove)). Read jobs
/// remember the revision they started at and only [`fill`](Self::fill) the
/// cache if it is unchanged, so a slow read never overwrites a newer write.
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: HashMap<StorageKey, CredentialValue>,
    revisions: HashMap<StorageKey, u64>,
}

impl CredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `key`
    pub fn get(&self, key: &StorageKey) -> Option<&CredentialValue> {
        self.entries.get(key)
    }

    /// Caller mutation: set `key` to `value` and advance its revision
    pub fn update(&mut self, key: StorageKey, value: CredentialValue) {
        self.bump(&key);
        self.put(key, value);
    }

    /// Caller mutation: drop the entry for `key` and advance its revision
    pub fn remove(&mut self, key: &StorageKey) -> Option<CredentialValue> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.bump(key);
        }
        removed
    }

    /// Apply a read result taken at `revision`.
    ///
    /// Returns `false` and leaves the cache alone when the key was mutated by
    /// a caller after the read started.
    pub fn fill(&mut self, key: StorageKey, value: CredentialValue, revision: u64) -> bool {
        if self.revision(&key) != revision {
            return false;
        }
        self.put(key, value);
        true
    }

    /// Current revision of `key` (0 if never mutated by a caller)
    pub fn revision(&self, key: &StorageKey) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    /// Keys of `service` that have a cached value
    pub fn keys_for(&self, service: &str) -> BTreeSet<String> {
        self.entries
            .keys()
            .filter(|key| key.service() == service)
            .map(|key| key.key().to_string())
            .collect()
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn put(&mut self, key: StorageKey, value: CredentialValue) {
        if value.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    fn bump(&mut self, key: &StorageKey) {
        *self.revisions.entry(key.clone()).or_insert(0) += 1;
    }
}
