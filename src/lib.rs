//! # Trellis
//!
//! A database-independent transactional language with optimistic
//! concurrency. Programs are immutable expression trees; the runtime
//! interprets them against a snapshot buffer, tracks read and write sets,
//! and commits the writes with one conditional multi-put keyed by the
//! observed versions. The same program runs unchanged over any backend that
//! implements the two-method store contract.
//!
//! # Quick Start
//!
//! ```
//! use trellis::{select, Database, Literal, MemoryBackend, Schema, Txn};
//!
//! fn main() -> trellis::TxResult<()> {
//!     let db = Database::new(MemoryBackend::new());
//!     let schema = Schema::default();
//!
//!     // increment-or-create a counter field, transactionally
//!     let out = schema.run(&db, |p| {
//!         let x = select("x")?;
//!         p.if_else(
//!             Txn::negate(x.exists()),
//!             |p| {
//!                 let _ = x.set(p, "value", 1.0);
//!             },
//!             |p| {
//!                 let _ = x.set(p, "value", Txn::add(x.get("value"), 1.0));
//!             },
//!         );
//!         p.ret(x.get("value"));
//!         Ok(())
//!     })?;
//!     assert_eq!(out, Literal::Real(1.0));
//!     Ok(())
//! }
//! ```
//!
//! # Layers
//!
//! - [`trellis_core`] — the value model, expression tree, and the
//!   smart-constructor simplifier
//! - [`trellis_engine`] — the interpreter, backend contract, and the
//!   optimistic commit loop
//! - [`trellis_dsl`] — the imperative-looking builder surface
//! - [`trellis_wire`] — the serialized expression form

#![warn(missing_docs)]

pub use trellis_core::{
    validate_user_key, ErrorKind, KeyError, Literal, Op, TxError, TxResult, Txn, TxnView,
};
pub use trellis_dsl::{select, select_expr, Index, Interval, Object, Program, Schema};
pub use trellis_engine::{
    Backend, Cache, CommitOutcome, Database, DatabaseStats, ExecContext, MemoryBackend,
    MemoryCache, RetrySchedule, RetryTimer, Revision,
};
pub use trellis_wire::{parse, serialize};
