//! Per-run interpreter state
//!
//! One `ExecContext` lives for exactly one interpretation of a transaction.
//! A retry after a commit conflict discards it and starts fresh, so nothing
//! observed under a stale snapshot can leak into the next attempt.
//!
//! Invariant: every key in `writes` also has an entry in `reads`, so the
//! commit dependency set always covers the write set.

use std::collections::{BTreeSet, HashMap};

use trellis_core::Literal;

use crate::backend::Revision;

/// Mutable state for one interpretation of a transaction.
#[derive(Debug, Default)]
pub struct ExecContext {
    /// Transaction-local variables (`load`/`store`)
    pub locals: HashMap<String, Literal>,
    /// Revisions observed from the store, keyed by store key
    pub reads: HashMap<String, Revision>,
    /// Pending literals to install at commit
    pub writes: HashMap<String, Literal>,
    /// Keys awaiting a batched fetch. Ordered, so batch contents are
    /// deterministic for a given program.
    pub frontier: BTreeSet<String>,
    /// Set by `rollback`: subsequent writes are silently dropped
    pub read_only: bool,
}

impl ExecContext {
    /// Fresh state for one run.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value `read(key)` yields right now: a pending write wins over the
    /// observed revision.
    pub fn pending_value(&self, key: &str) -> Option<Literal> {
        if let Some(v) = self.writes.get(key) {
            return Some(v.clone());
        }
        self.reads.get(key).map(|r| r.value.clone())
    }

    /// Queue a key for the next batched fetch unless it is already known.
    pub fn enqueue_fetch(&mut self, key: &str) {
        if !self.reads.contains_key(key) {
            self.frontier.insert(key.to_string());
        }
    }

    /// Record a fetched revision. Never overwrites an existing observation:
    /// the first revision seen for a key is the snapshot for this run.
    pub fn record_read(&mut self, key: String, revision: Revision) {
        self.reads.entry(key).or_insert(revision);
    }

    /// Stage a write. Dropped silently after rollback.
    pub fn stage_write(&mut self, key: String, value: Literal) {
        if self.read_only {
            return;
        }
        debug_assert!(
            self.reads.contains_key(&key),
            "write staged for a key that was never read"
        );
        self.writes.insert(key, value);
    }

    /// Discard the write set and refuse further writes.
    pub fn rollback(&mut self) {
        self.writes.clear();
        self.read_only = true;
    }

    /// The version map handed to `cput` as the dependency set.
    pub fn depends(&self) -> HashMap<String, u64> {
        self.reads
            .iter()
            .map(|(k, r)| (k.clone(), r.version))
            .collect()
    }
}
