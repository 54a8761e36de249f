//! In-memory reference backend and cache
//!
//! `MemoryBackend` keeps revisions in a `BTreeMap` behind a `parking_lot`
//! lock. `cput` holds the write lock across validate-then-install, so
//! commits linearize and the first committer wins. It is the backend used by
//! the test suites and the baseline for adapter conformance.

use std::collections::{BTreeMap, HashMap};

use dashmap::DashMap;
use parking_lot::RwLock;
use trellis_core::{Literal, TxResult};

use crate::backend::{Backend, Cache, CommitOutcome, Revision};

/// A thread-safe in-memory store of versioned literals.
#[derive(Default)]
pub struct MemoryBackend {
    map: RwLock<BTreeMap<String, Revision>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current revision of a key, for tests and inspection.
    pub fn revision(&self, key: &str) -> Revision {
        self.map
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(Revision::absent)
    }

    /// Number of keys ever written.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store has never been written.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, keys: &[String]) -> TxResult<HashMap<String, Revision>> {
        let map = self.map.read();
        Ok(keys
            .iter()
            .map(|k| {
                let rev = map.get(k).cloned().unwrap_or_else(Revision::absent);
                (k.clone(), rev)
            })
            .collect())
    }

    fn cput(
        &self,
        depends: &HashMap<String, u64>,
        changes: &HashMap<String, Literal>,
    ) -> TxResult<CommitOutcome> {
        // One write lock across validate-then-install keeps the commit atomic.
        let mut map = self.map.write();

        for (key, expected) in depends {
            let current = map.get(key).map(|r| r.version).unwrap_or(0);
            if current != *expected {
                return Ok(CommitOutcome::Conflict(Some(key.clone())));
            }
        }

        let mut installed = BTreeMap::new();
        for (key, value) in changes {
            let next = map.get(key).map(|r| r.version).unwrap_or(0) + 1;
            map.insert(key.clone(), Revision::new(next, value.clone()));
            installed.insert(key.clone(), next);
        }

        Ok(CommitOutcome::Committed(installed))
    }
}

/// A shared read-through cache backed by `DashMap`.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Revision>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Cache for MemoryCache {
    fn fetch(&self, keys: &[String]) -> HashMap<String, Revision> {
        keys.iter()
            .filter_map(|k| self.entries.get(k).map(|r| (k.clone(), r.clone())))
            .collect()
    }

    fn update(&self, entries: &HashMap<String, Revision>) {
        for (k, r) in entries {
            self.entries.insert(k.clone(), r.clone());
        }
    }

    fn invalidate(&self, keys: &[String]) {
        for k in keys {
            self.entries.remove(k);
        }
    }
}
