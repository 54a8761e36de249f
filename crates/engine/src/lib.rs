//! Execution engine for Trellis
//!
//! This crate orchestrates the runtime layers:
//! - Backend: the store contract (bulk get, conditional multi-put, cache)
//! - ExecContext: per-run locals, read set, write set, fetch frontier
//! - Interpreter: tree evaluation with batched fetches
//! - Database: the optimistic commit loop with conflict reruns
//! - Retry: finite backoff schedules and the shared retry timer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod context;
pub mod database;
pub mod interpreter;
pub mod memory;
pub mod retry;

pub use backend::{Backend, Cache, CommitOutcome, Revision};
pub use context::ExecContext;
pub use database::{Database, DatabaseStats};
pub use interpreter::{evaluate, FetchSource};
pub use memory::{MemoryBackend, MemoryCache};
pub use retry::{RetrySchedule, RetryTimer};
