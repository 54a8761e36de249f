//! Core types for Trellis
//!
//! This crate defines the algebraic heart of the system:
//! - Literal: the tagged union of total values with coercion rules
//! - Op / Txn: the closed operator set and the expression tree
//! - The smart-constructor simplifier (constant folding at build time)
//! - Pure operator evaluation, shared with the interpreter
//! - Key validation and the unified error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod eval;
pub mod key;
pub mod literal;
pub mod op;
pub mod txn;

pub use error::{ErrorKind, TxError, TxResult};
pub use key::{validate_user_key, KeyError, ARRAY_DELIMITER, FIELD_DELIMITER};
pub use literal::Literal;
pub use op::Op;
pub use txn::{Txn, TxnView};
