//! The transaction interpreter
//!
//! Walks an expression tree post-order against one `ExecContext`, with two
//! lazily-evaluated exceptions (`branch` arms and `repeat` bodies). All I/O
//! happens at fetch-frontier flush boundaries: keys accumulate in the
//! frontier and go to the backend in one batched `get` per flush.
//!
//! Flush points:
//! - immediately before a `read` whose key is not yet observed,
//! - before staging a `write` for an unobserved key (the commit dependency
//!   set must cover every written key),
//! - after `prefetch` queues its key list,
//! - at the start of every `repeat` iteration, so a prefetch issued outside
//!   a loop amortizes across iterations.

use std::collections::HashMap;

use trellis_core::{eval, Literal, Op, Txn, TxnView, TxResult};

use crate::backend::Revision;
use crate::context::ExecContext;

/// Where the interpreter gets revisions from.
///
/// The database implements this by consulting its cache first and falling
/// back to the backend's bulk `get`.
pub trait FetchSource {
    /// Fetch revisions for the given keys in one batch.
    fn fetch(&self, keys: Vec<String>) -> TxResult<HashMap<String, Revision>>;
}

/// Evaluate a transaction against the given context.
///
/// Returns the result literal; the context accumulates the read and write
/// sets the commit protocol needs.
pub fn evaluate(tx: &Txn, src: &dyn FetchSource, cx: &mut ExecContext) -> TxResult<Literal> {
    eval_node(tx, src, cx)
}

fn eval_node(tx: &Txn, src: &dyn FetchSource, cx: &mut ExecContext) -> TxResult<Literal> {
    let (op, args) = match tx.view() {
        TxnView::Lit(l) => return Ok(l.clone()),
        TxnView::Expr(op, args) => (op, args),
    };

    match op {
        Op::Cons => {
            eval_node(&args[0], src, cx)?;
            eval_node(&args[1], src, cx)
        }
        Op::Branch => {
            let cond = eval_node(&args[0], src, cx)?;
            if cond.as_flag() {
                eval_node(&args[1], src, cx)
            } else {
                eval_node(&args[2], src, cx)
            }
        }
        Op::Repeat => {
            loop {
                let cond = eval_node(&args[0], src, cx)?;
                if !cond.as_flag() {
                    break;
                }
                flush_frontier(src, cx)?;
                eval_node(&args[1], src, cx)?;
            }
            Ok(Literal::None)
        }
        Op::Read => {
            let key = eval_node(&args[0], src, cx)?.render();
            if let Some(value) = cx.pending_value(&key) {
                return Ok(value);
            }
            cx.enqueue_fetch(&key);
            flush_frontier(src, cx)?;
            Ok(cx
                .reads
                .get(&key)
                .map(|r| r.value.clone())
                .unwrap_or(Literal::None))
        }
        Op::Write => {
            let key = eval_node(&args[0], src, cx)?.render();
            let value = eval_node(&args[1], src, cx)?;
            if !cx.read_only {
                if !cx.reads.contains_key(&key) {
                    cx.enqueue_fetch(&key);
                    flush_frontier(src, cx)?;
                }
                cx.stage_write(key, value.clone());
            }
            Ok(value)
        }
        Op::Load => {
            let name = eval_node(&args[0], src, cx)?.render();
            Ok(cx.locals.get(&name).cloned().unwrap_or(Literal::None))
        }
        Op::Store => {
            let name = eval_node(&args[0], src, cx)?.render();
            let value = eval_node(&args[1], src, cx)?;
            cx.locals.insert(name, value.clone());
            Ok(value)
        }
        Op::Prefetch => {
            let list = eval_node(&args[0], src, cx)?.render();
            for key in list.split(trellis_core::ARRAY_DELIMITER) {
                if !key.is_empty() {
                    cx.enqueue_fetch(key);
                }
            }
            flush_frontier(src, cx)?;
            Ok(Literal::None)
        }
        Op::Rollback => {
            let value = eval_node(&args[0], src, cx)?;
            cx.rollback();
            Ok(value)
        }
        _ => {
            let mut lits = Vec::with_capacity(args.len());
            for arg in args {
                lits.push(eval_node(arg, src, cx)?);
            }
            Ok(eval::apply(op, &lits))
        }
    }
}

/// Drain the frontier through one batched fetch.
fn flush_frontier(src: &dyn FetchSource, cx: &mut ExecContext) -> TxResult<()> {
    if cx.frontier.is_empty() {
        return Ok(());
    }
    let keys: Vec<String> = std::mem::take(&mut cx.frontier).into_iter().collect();
    let fetched = src.fetch(keys.clone())?;
    for key in keys {
        let revision = fetched
            .get(&key)
            .cloned()
            .unwrap_or_else(Revision::absent);
        cx.record_read(key, revision);
    }
    Ok(())
}
