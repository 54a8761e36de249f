//! The program builder
//!
//! `Program` is an explicit builder with three primitives: `push` appends an
//! expression with sequencing, `capture` evaluates a block into a scratch
//! buffer and returns the captured subtree, and a scratch-local allocator
//! hands out the reserved internal variables. Everything imperative-looking
//! (`if_else`, `while_`, `for_`, `foreach`, `each_item`) desugars to
//! `branch`/`repeat` nodes through those three.
//!
//! Scratch locals are drawn from the reserved pool `$i`, `$j`, `$k`, `$l`
//! (deeper nesting continues `$m4`, `$m5`, ...). Allocation is stack
//! disciplined at build time, so live scopes never share a name. User
//! programs should avoid `$`-prefixed locals.

use trellis_core::Txn;

use crate::object::Index;

/// Loop interval for [`Program::for_`]: a lower bound and an inclusive or
/// exclusive upper bound.
#[derive(Debug, Clone)]
pub struct Interval {
    from: Txn,
    to: Txn,
    inclusive: bool,
}

impl Interval {
    /// `[from, to]` — the counter takes the upper bound.
    pub fn closed(from: impl Into<Txn>, to: impl Into<Txn>) -> Self {
        Interval {
            from: from.into(),
            to: to.into(),
            inclusive: true,
        }
    }

    /// `[from, to)` — the loop exits when the counter reaches the bound.
    pub fn half_open(from: impl Into<Txn>, to: impl Into<Txn>) -> Self {
        Interval {
            from: from.into(),
            to: to.into(),
            inclusive: false,
        }
    }
}

/// Builder for one transaction expression.
///
/// The finished program's value is the value of the last pushed expression.
pub struct Program {
    txn: Txn,
    depth: usize,
}

impl Program {
    /// Start an empty program.
    pub fn new() -> Self {
        Program {
            txn: Txn::none(),
            depth: 0,
        }
    }

    /// Append an expression; the program now yields its value.
    pub fn push(&mut self, t: impl Into<Txn>) {
        self.txn = Txn::cons(self.txn.clone(), t.into());
    }

    /// Build a block against a scratch buffer and return the captured
    /// subtree. The program in progress is untouched.
    pub fn capture(&mut self, f: impl FnOnce(&mut Self)) -> Txn {
        let saved = std::mem::replace(&mut self.txn, Txn::none());
        f(self);
        std::mem::replace(&mut self.txn, saved)
    }

    /// The finished expression tree.
    pub fn finish(self) -> Txn {
        self.txn
    }

    /// Reserve the next scratch local name.
    pub(crate) fn scratch(&mut self) -> String {
        const POOL: [&str; 4] = ["$i", "$j", "$k", "$l"];
        let name = match POOL.get(self.depth) {
            Some(n) => n.to_string(),
            None => format!("$m{}", self.depth),
        };
        self.depth += 1;
        name
    }

    /// Return the most recent `count` scratch names to the pool.
    pub(crate) fn release(&mut self, count: usize) {
        self.depth -= count;
    }

    // === Control flow ===

    /// `if cond { then_body }`
    pub fn if_(&mut self, cond: impl Into<Txn>, then_body: impl FnOnce(&mut Self)) {
        self.if_else(cond, then_body, |_| {});
    }

    /// `if cond { then_body } else { else_body }`
    pub fn if_else(
        &mut self,
        cond: impl Into<Txn>,
        then_body: impl FnOnce(&mut Self),
        else_body: impl FnOnce(&mut Self),
    ) {
        let pass = self.capture(then_body);
        let fail = self.capture(else_body);
        self.push(Txn::branch(cond, pass, fail));
    }

    /// `while cond { body }`
    pub fn while_(&mut self, cond: impl Into<Txn>, body: impl FnOnce(&mut Self)) {
        let b = self.capture(body);
        self.push(Txn::repeat(cond, b));
    }

    /// Counted loop. The counter lives in the local `var` and is visible to
    /// the body via `Txn::load(var)`.
    pub fn for_(&mut self, var: &str, interval: Interval, body: impl FnOnce(&mut Self)) {
        self.push(Txn::store(var, interval.from));
        let cond = if interval.inclusive {
            // var <= to
            Txn::negate(Txn::less(interval.to, Txn::load(var)))
        } else {
            Txn::less(Txn::load(var), interval.to)
        };
        let mut b = self.capture(body);
        b = Txn::cons(b, Txn::store(var, Txn::add(Txn::load(var), 1.0)));
        self.push(Txn::repeat(cond, b));
    }

    /// Iterate a comma-joined list expression, binding each element to the
    /// local `var` for the body.
    ///
    /// The list is evaluated once, up front. An empty (or `none`) list runs
    /// the body zero times.
    pub fn each_item(&mut self, list: impl Into<Txn>, var: &str, body: impl FnOnce(&mut Self)) {
        let rest = self.scratch();
        let cut = self.scratch();

        // coerce to text so a never-written list iterates zero times
        self.push(Txn::store(rest.as_str(), Txn::add(list, Txn::text(""))));

        let inner = self.capture(|p| {
            p.push(Txn::store(
                cut.as_str(),
                Txn::index_of(Txn::load(rest.as_str()), ","),
            ));
            // head: everything before the first comma, or the whole rest
            p.push(Txn::store(
                var,
                Txn::branch(
                    Txn::equal(Txn::load(cut.as_str()), Txn::real(-1.0)),
                    Txn::load(rest.as_str()),
                    Txn::slice(Txn::load(rest.as_str()), 0.0, Txn::load(cut.as_str())),
                ),
            ));
            // rest: everything after the first comma, or empty
            p.push(Txn::store(
                rest.as_str(),
                Txn::branch(
                    Txn::equal(Txn::load(cut.as_str()), Txn::real(-1.0)),
                    Txn::text(""),
                    Txn::slice(
                        Txn::load(rest.as_str()),
                        Txn::add(Txn::load(cut.as_str()), 1.0),
                        Txn::length(Txn::load(rest.as_str())),
                    ),
                ),
            ));
            body(p);
        });

        self.push(Txn::repeat(
            Txn::negate(Txn::equal(Txn::load(rest.as_str()), Txn::text(""))),
            inner,
        ));
        self.release(2);
    }

    /// Iterate an index's address list, binding each address to `var`.
    ///
    /// Before the loop, the comma-joined full-key list is built and handed
    /// to `prefetch`, so every entry the body reads arrives in one batch.
    pub fn foreach(&mut self, var: &str, index: &Index, body: impl FnOnce(&mut Self)) {
        let addrs = Txn::read(index.addresses_key());

        let keys = self.scratch();
        let item = self.scratch();
        self.push(Txn::store(keys.as_str(), Txn::text("")));
        self.each_item(addrs.clone(), &item, |p| {
            let full = index.entry_key(Txn::load(item.as_str()));
            p.push(Txn::store(
                keys.as_str(),
                Txn::branch(
                    Txn::equal(Txn::load(keys.as_str()), Txn::text("")),
                    full.clone(),
                    Txn::add(Txn::load(keys.as_str()), Txn::add(Txn::text(","), full)),
                ),
            ));
        });
        self.push(Txn::prefetch(Txn::load(keys.as_str())));
        self.release(2);

        self.each_item(addrs, var, body);
    }

    // === Tail ===

    /// Set the program's result value.
    pub fn ret(&mut self, value: impl Into<Txn>) {
        self.push(value);
    }

    /// Return several values as one JSON array expression. A singleton
    /// behaves like [`Program::ret`].
    pub fn ret_all(&mut self, mut values: Vec<Txn>) {
        if values.len() == 1 {
            self.push(values.remove(0));
            return;
        }
        let mut expr = Txn::text("[");
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                expr = Txn::add(expr, Txn::text(","));
            }
            expr = Txn::add(expr, concat([Txn::text("\""), v, Txn::text("\"")]));
        }
        self.push(Txn::add(expr, Txn::text("]")));
    }

    /// Discard the write set; the program yields `value`.
    pub fn rollback(&mut self, value: impl Into<Txn>) {
        self.push(Txn::rollback(value));
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold expressions into one concatenation.
pub(crate) fn concat(parts: impl IntoIterator<Item = Txn>) -> Txn {
    let mut iter = parts.into_iter();
    let first = iter.next().unwrap_or_else(Txn::none);
    iter.fold(first, Txn::add)
}
