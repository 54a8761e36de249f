//! The optimistic commit loop
//!
//! `Database` owns a backend (and optionally a cache in front of it) and
//! executes immutable transaction expressions against it:
//!
//! 1. fresh context, interpret the tree (frontier flushes fetch through the
//!    cache),
//! 2. conditional multi-put of the write set keyed by the observed read
//!    versions,
//! 3. committed → write through the cache and return the result literal,
//! 4. conflict → invalidate the stale read set and rerun from step 1.
//!
//! Conflicts are not errors; they retry unbounded. Transient backend
//! failures are governed separately by `execute_with_backoff`, which walks a
//! finite `RetrySchedule` on the shared retry timer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{info, warn};
use trellis_core::{Literal, Txn, TxError, TxResult};

use crate::backend::{Backend, Cache, CommitOutcome, Revision};
use crate::context::ExecContext;
use crate::interpreter::{evaluate, FetchSource};
use crate::retry::{RetrySchedule, RetryTimer};

/// Counter snapshot for monitoring.
///
/// The counters are relaxed atomics — purely observational, they order
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Transactions committed
    pub committed: u64,
    /// Commit conflicts observed (each one caused a rerun)
    pub conflicts: u64,
    /// Transient backend failures retried by a backoff schedule
    pub transient_retries: u64,
}

/// A handle executing transactions against one backend.
///
/// The handle is shared freely across threads; each in-flight transaction
/// owns its private `ExecContext`.
pub struct Database<B: Backend> {
    backend: B,
    cache: Option<Arc<dyn Cache>>,
    timer: Arc<RetryTimer>,
    committed: AtomicU64,
    conflicts: AtomicU64,
    transient_retries: AtomicU64,
}

impl<B: Backend> Database<B> {
    /// Open a database over a backend, no cache.
    pub fn new(backend: B) -> Self {
        Database {
            backend,
            cache: None,
            timer: RetryTimer::shared(),
            committed: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            transient_retries: AtomicU64::new(0),
        }
    }

    /// Open a database with a read-through cache in front of the backend.
    pub fn with_cache(backend: B, cache: Arc<dyn Cache>) -> Self {
        Database {
            cache: Some(cache),
            ..Database::new(backend)
        }
    }

    /// Use a dedicated retry timer instead of the process-wide one.
    pub fn with_timer(mut self, timer: Arc<RetryTimer>) -> Self {
        self.timer = timer;
        self
    }

    /// Execute a transaction: interpret, then commit optimistically.
    ///
    /// Reruns on every commit conflict until the conditional put succeeds.
    /// Backend errors propagate to the caller untouched; pair with
    /// [`Database::execute_with_backoff`] to retry transients.
    pub fn execute(&self, tx: &Txn) -> TxResult<Literal> {
        loop {
            let mut cx = ExecContext::new();
            let result = evaluate(tx, self, &mut cx)?;

            match self.backend.cput(&cx.depends(), &cx.writes)? {
                CommitOutcome::Committed(installed) => {
                    if let Some(cache) = &self.cache {
                        let entries: HashMap<String, Revision> = installed
                            .iter()
                            .filter_map(|(k, v)| {
                                cx.writes
                                    .get(k)
                                    .map(|val| (k.clone(), Revision::new(*v, val.clone())))
                            })
                            .collect();
                        cache.update(&entries);
                    }
                    self.committed.fetch_add(1, Ordering::Relaxed);
                    return Ok(result);
                }
                CommitOutcome::Conflict(key) => {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                    warn!(conflict_key = key.as_deref(), "commit conflict, rerunning");
                    if let Some(cache) = &self.cache {
                        let stale: Vec<String> = cx.reads.keys().cloned().collect();
                        cache.invalidate(&stale);
                    }
                }
            }
        }
    }

    /// Execute with scheduled retries after transient backend failures.
    ///
    /// Each transient failure consumes one delay from the schedule, waited
    /// out on the retry timer. Exhausting the schedule surfaces
    /// `RetriesExhausted` wrapping the last failure. Non-transient errors
    /// surface immediately.
    pub fn execute_with_backoff(
        &self,
        tx: &Txn,
        schedule: &RetrySchedule,
    ) -> TxResult<Literal> {
        let mut remaining = schedule.delays().iter();
        loop {
            match self.execute(tx) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => match remaining.next() {
                    Some(delay) => {
                        self.transient_retries.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "transient backend failure, retrying"
                        );
                        self.timer.sleep(*delay);
                    }
                    None => {
                        return Err(TxError::RetriesExhausted {
                            attempts: schedule.len(),
                            source: Box::new(err),
                        })
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            committed: self.committed.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
        }
    }

    /// Borrow the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Close the backend. The shared retry timer stays up — it belongs to
    /// the process, not this handle.
    pub fn close(&self) {
        info!("closing database");
        self.backend.close();
    }
}

impl<B: Backend> FetchSource for Database<B> {
    fn fetch(&self, keys: Vec<String>) -> TxResult<HashMap<String, Revision>> {
        let mut out = HashMap::with_capacity(keys.len());
        let mut missing = keys;

        if let Some(cache) = &self.cache {
            let hits = cache.fetch(&missing);
            missing.retain(|k| !hits.contains_key(k));
            out.extend(hits);
        }

        if !missing.is_empty() {
            let fetched = self.backend.get(&missing)?;
            if let Some(cache) = &self.cache {
                cache.update(&fetched);
            }
            for key in missing {
                let rev = fetched
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(Revision::absent);
                out.insert(key, rev);
            }
        }

        Ok(out)
    }
}
