//! Builder surface for Trellis programs
//!
//! Imperative-looking combinators that desugar to pure expression trees:
//! - Program: push / capture / scratch locals, `if_else`, `while_`, `for_`,
//!   `foreach`, `ret`, `rollback`
//! - Object / Index: the flat-namespace object layout (`select`, `set`,
//!   `get`, `delete`, `stitch`)
//! - Schema: build once, execute with a backoff schedule

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod object;
pub mod program;
pub mod schema;

pub use object::{select, select_expr, Index, Object};
pub use program::{Interval, Program};
pub use schema::Schema;
