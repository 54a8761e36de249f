//! The backend contract
//!
//! The only thing the runtime requires of a store is this trait: a bulk
//! snapshot read and an atomic conditional multi-put keyed by observed
//! versions. Adapters for real stores implement `Backend`; the engine ships
//! an in-memory reference implementation in [`crate::memory`].
//!
//! ## Contract
//!
//! - `get` returns a revision for every requested key; keys never written
//!   map to `(0, none)`.
//! - `cput` is atomic: it either installs every change (each under an
//!   incremented version) or installs nothing and reports the conflict.
//! - Conflicting commits linearize in some order; a reader never observes a
//!   partial commit.
//!
//! Errors are classified by the adapter: transient failures (network,
//! timeout) surface as `TxError::BackendTransient` and are retried by the
//! backoff schedule; everything else is fatal.

use std::collections::{BTreeMap, HashMap};

use trellis_core::{Literal, TxResult};

/// A versioned value persisted under a key.
///
/// The version is monotonically increasing per key and is the unit of
/// optimistic concurrency control.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    /// Commit counter for this key; 0 means never written
    pub version: u64,
    /// The last committed literal
    pub value: Literal,
}

impl Revision {
    /// The revision of a key that has never been written: `(0, none)`.
    pub fn absent() -> Self {
        Revision {
            version: 0,
            value: Literal::None,
        }
    }

    /// Construct a revision.
    pub fn new(version: u64, value: Literal) -> Self {
        Revision { version, value }
    }
}

/// Outcome of a conditional multi-put.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Every dependency matched; changes are installed. Carries the version
    /// assigned to each written key so callers can write through a cache.
    Committed(BTreeMap<String, u64>),
    /// A dependency version no longer matches; nothing was installed.
    /// Adapters that can identify the offending key report it.
    Conflict(Option<String>),
}

impl CommitOutcome {
    /// Whether the commit succeeded.
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}

/// A transactional key-value store.
pub trait Backend: Send + Sync {
    /// Bulk snapshot read. Missing keys map to `Revision::absent()`.
    fn get(&self, keys: &[String]) -> TxResult<HashMap<String, Revision>>;

    /// Atomic conditional multi-put.
    ///
    /// Succeeds only if every `depends[k]` matches the current version of
    /// `k`, then installs each `changes[k]` with an incremented version.
    fn cput(
        &self,
        depends: &HashMap<String, u64>,
        changes: &HashMap<String, Literal>,
    ) -> TxResult<CommitOutcome>;

    /// Release backend resources. Default is a no-op.
    fn close(&self) {}
}

/// An optional read-through cache layered in front of a backend.
///
/// The database consults the cache on every fetch, writes through on commit,
/// and invalidates the read set on conflict. Implementations must be safe to
/// share across transactions.
pub trait Cache: Send + Sync {
    /// Return cached revisions for whichever of `keys` are present.
    fn fetch(&self, keys: &[String]) -> HashMap<String, Revision>;

    /// Install or refresh entries.
    fn update(&self, entries: &HashMap<String, Revision>);

    /// Drop entries.
    fn invalidate(&self, keys: &[String]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_revision() {
        let r = Revision::absent();
        assert_eq!(r.version, 0);
        assert!(r.value.is_none());
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(CommitOutcome::Committed(BTreeMap::new()).is_committed());
        assert!(!CommitOutcome::Conflict(None).is_committed());
    }

    #[test]
    fn test_backend_trait_is_object_safe() {
        fn _assert(_: &dyn Backend) {}
        fn _assert_cache(_: &dyn Cache) {}
    }
}
