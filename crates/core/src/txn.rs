//! The transaction expression tree and its constant folder
//!
//! A `Txn` is an immutable, reference-counted expression: either a literal
//! leaf or an operator node with 1-3 operands. Every public constructor is a
//! *smart constructor* — it folds any node whose result is decided by literal
//! operands, so every tree the interpreter ever sees is already in
//! constant-folded normal form.
//!
//! ## Folding Rules
//!
//! - A pure operator over all-literal operands evaluates immediately.
//! - `cons(a, b)` with a literal `a` is just `b` (a literal has no effect).
//! - `branch(c, t, f)` with a literal condition collapses to one arm.
//! - `repeat(c, _)` with literal `false` collapses to `none`; literal `true`
//!   is retained — a divergent loop is not unrolled.
//! - `both`/`either` short-circuit on a deciding literal first operand.
//! - Effectful operators never fold.
//!
//! The folder is idempotent: constructing an already-folded tree again
//! yields a structurally equal tree. The canonical literals `true`, `false`,
//! `0`, `1`, `""` and `none` are interned, so independent constructions
//! share one node (`Txn::ptr_eq`).

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::eval;
use crate::literal::Literal;
use crate::op::Op;

static NONE: Lazy<Txn> = Lazy::new(|| Txn::alloc_lit(Literal::None));
static TRUE: Lazy<Txn> = Lazy::new(|| Txn::alloc_lit(Literal::Flag(true)));
static FALSE: Lazy<Txn> = Lazy::new(|| Txn::alloc_lit(Literal::Flag(false)));
static ZERO: Lazy<Txn> = Lazy::new(|| Txn::alloc_lit(Literal::Real(0.0)));
static ONE: Lazy<Txn> = Lazy::new(|| Txn::alloc_lit(Literal::Real(1.0)));
static EMPTY: Lazy<Txn> = Lazy::new(|| Txn::alloc_lit(Literal::text("")));

/// An immutable transaction expression.
///
/// Clones are cheap (one `Arc` bump) and subtrees are shared freely.
#[derive(Clone)]
pub struct Txn(Arc<Repr>);

enum Repr {
    Lit(Literal),
    Expr { op: Op, args: Vec<Txn> },
}

/// Borrowed view of a node, for exhaustive matching in the interpreter.
pub enum TxnView<'a> {
    /// A literal leaf
    Lit(&'a Literal),
    /// An operator node with its operands
    Expr(Op, &'a [Txn]),
}

impl Txn {
    fn alloc_lit(l: Literal) -> Txn {
        Txn(Arc::new(Repr::Lit(l)))
    }

    fn node(op: Op, args: Vec<Txn>) -> Txn {
        debug_assert_eq!(args.len(), op.arity());
        Txn(Arc::new(Repr::Expr { op, args }))
    }

    /// Wrap a literal, routing the canonical constants to interned nodes.
    pub fn lit(l: Literal) -> Txn {
        match &l {
            Literal::None => NONE.clone(),
            Literal::Flag(true) => TRUE.clone(),
            Literal::Flag(false) => FALSE.clone(),
            Literal::Real(x) if x.to_bits() == 0.0f64.to_bits() => ZERO.clone(),
            Literal::Real(x) if *x == 1.0 => ONE.clone(),
            Literal::Text(s) if s.is_empty() => EMPTY.clone(),
            _ => Txn::alloc_lit(l),
        }
    }

    /// The interned `none` literal.
    pub fn none() -> Txn {
        NONE.clone()
    }

    /// A flag literal (interned).
    pub fn flag(b: bool) -> Txn {
        if b {
            TRUE.clone()
        } else {
            FALSE.clone()
        }
    }

    /// A real literal (`0` and `1` interned).
    pub fn real(x: f64) -> Txn {
        Txn::lit(Literal::Real(x))
    }

    /// A text literal (`""` interned).
    pub fn text(s: impl AsRef<str>) -> Txn {
        Txn::lit(Literal::text(s))
    }

    // === I/O (never folded) ===

    /// Read a key from the store.
    pub fn read(key: impl Into<Txn>) -> Txn {
        Txn::node(Op::Read, vec![key.into()])
    }

    /// Stage a write; yields the written value.
    pub fn write(key: impl Into<Txn>, value: impl Into<Txn>) -> Txn {
        Txn::node(Op::Write, vec![key.into(), value.into()])
    }

    /// Read a transaction-local variable.
    pub fn load(name: impl Into<Txn>) -> Txn {
        Txn::node(Op::Load, vec![name.into()])
    }

    /// Set a transaction-local variable; yields the value.
    pub fn store(name: impl Into<Txn>, value: impl Into<Txn>) -> Txn {
        Txn::node(Op::Store, vec![name.into(), value.into()])
    }

    /// Queue a comma-joined key list for one batched fetch.
    pub fn prefetch(keys: impl Into<Txn>) -> Txn {
        Txn::node(Op::Prefetch, vec![keys.into()])
    }

    /// Discard the write set; yields the operand.
    pub fn rollback(value: impl Into<Txn>) -> Txn {
        Txn::node(Op::Rollback, vec![value.into()])
    }

    // === Control ===

    /// Sequence: evaluate `a` for effect, yield `b`.
    ///
    /// A literal `a` has no observable effect, so the node reduces to `b`.
    pub fn cons(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        let (a, b) = (a.into(), b.into());
        if a.as_literal().is_some() {
            b
        } else {
            Txn::node(Op::Cons, vec![a, b])
        }
    }

    /// Conditional. A literal condition selects one arm at construction.
    pub fn branch(cond: impl Into<Txn>, pass: impl Into<Txn>, fail: impl Into<Txn>) -> Txn {
        let (cond, pass, fail) = (cond.into(), pass.into(), fail.into());
        match cond.as_literal() {
            Some(c) => {
                if c.as_flag() {
                    pass
                } else {
                    fail
                }
            }
            None => Txn::node(Op::Branch, vec![cond, pass, fail]),
        }
    }

    /// Condition-guarded loop; yields `none`.
    ///
    /// A literal `false` condition collapses to `none`. A literal `true` is
    /// kept as-is: the loop diverges and unrolling would too.
    pub fn repeat(cond: impl Into<Txn>, body: impl Into<Txn>) -> Txn {
        let (cond, body) = (cond.into(), body.into());
        match cond.as_literal() {
            Some(c) if !c.as_flag() => Txn::none(),
            _ => Txn::node(Op::Repeat, vec![cond, body]),
        }
    }

    // === Arithmetic ===

    /// Sum, or concatenation when either operand is text.
    pub fn add(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Add, vec![a.into(), b.into()])
    }

    /// Difference.
    pub fn sub(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Sub, vec![a.into(), b.into()])
    }

    /// Product.
    pub fn mul(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Mul, vec![a.into(), b.into()])
    }

    /// Quotient.
    pub fn div(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Div, vec![a.into(), b.into()])
    }

    /// Remainder.
    pub fn modulo(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Modulo, vec![a.into(), b.into()])
    }

    /// Exponentiation.
    pub fn pow(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Pow, vec![a.into(), b.into()])
    }

    /// Natural logarithm.
    pub fn log(a: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Log, vec![a.into()])
    }

    /// Sine.
    pub fn sin(a: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Sin, vec![a.into()])
    }

    /// Cosine.
    pub fn cos(a: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Cos, vec![a.into()])
    }

    /// Floor.
    pub fn floor(a: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Floor, vec![a.into()])
    }

    // === String ===

    /// Character count of the rendering.
    pub fn length(s: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Length, vec![s.into()])
    }

    /// Character range `[lo, hi)` of the rendering.
    pub fn slice(s: impl Into<Txn>, lo: impl Into<Txn>, hi: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Slice, vec![s.into(), lo.into(), hi.into()])
    }

    /// Regular-expression match.
    pub fn matches(s: impl Into<Txn>, pattern: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Matches, vec![s.into(), pattern.into()])
    }

    /// Substring test.
    pub fn contains(s: impl Into<Txn>, needle: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Contains, vec![s.into(), needle.into()])
    }

    /// First character index of a substring, or -1.
    pub fn index_of(s: impl Into<Txn>, needle: impl Into<Txn>) -> Txn {
        Txn::pure(Op::IndexOf, vec![s.into(), needle.into()])
    }

    // === Logical ===

    /// Short-circuit conjunction.
    ///
    /// A literal `false` first operand decides the node; a literal `true`
    /// does not (the second operand still needs flag coercion at run time).
    pub fn both(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        let (a, b) = (a.into(), b.into());
        if let Some(l) = a.as_literal() {
            if !l.as_flag() {
                return Txn::flag(false);
            }
            if let Some(r) = b.as_literal() {
                return Txn::flag(r.as_flag());
            }
        }
        Txn::node(Op::Both, vec![a, b])
    }

    /// Short-circuit disjunction.
    pub fn either(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        let (a, b) = (a.into(), b.into());
        if let Some(l) = a.as_literal() {
            if l.as_flag() {
                return Txn::flag(true);
            }
            if let Some(r) = b.as_literal() {
                return Txn::flag(r.as_flag());
            }
        }
        Txn::node(Op::Either, vec![a, b])
    }

    /// Flag-coercing negation.
    pub fn negate(a: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Negate, vec![a.into()])
    }

    /// Strongly-typed equality.
    pub fn equal(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Equal, vec![a.into(), b.into()])
    }

    /// Ordering test.
    pub fn less(a: impl Into<Txn>, b: impl Into<Txn>) -> Txn {
        Txn::pure(Op::Less, vec![a.into(), b.into()])
    }

    /// Fold a pure operator whose operands are all literals; otherwise
    /// allocate the node.
    fn pure(op: Op, args: Vec<Txn>) -> Txn {
        debug_assert!(op.is_pure());
        if args.iter().all(|a| a.as_literal().is_some()) {
            let lits: Vec<Literal> = args
                .iter()
                .map(|a| a.as_literal().cloned().unwrap_or(Literal::None))
                .collect();
            Txn::lit(eval::apply(op, &lits))
        } else {
            Txn::node(op, args)
        }
    }

    // === Inspection ===

    /// Borrowed view of the node for exhaustive matching.
    pub fn view(&self) -> TxnView<'_> {
        match &*self.0 {
            Repr::Lit(l) => TxnView::Lit(l),
            Repr::Expr { op, args } => TxnView::Expr(*op, args),
        }
    }

    /// The literal payload, when this is a leaf.
    pub fn as_literal(&self) -> Option<&Literal> {
        match &*self.0 {
            Repr::Lit(l) => Some(l),
            Repr::Expr { .. } => None,
        }
    }

    /// Node identity: true when both handles point at the same allocation.
    /// Canonical literals are interned, so this holds for independent
    /// constructions of `true`, `false`, `0`, `1`, `""` and `none`.
    pub fn ptr_eq(&self, other: &Txn) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Txn {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (Repr::Lit(a), Repr::Lit(b)) => a.strongly_equal(b),
            (
                Repr::Expr { op: oa, args: aa },
                Repr::Expr { op: ob, args: ab },
            ) => oa == ob && aa == ab,
            _ => false,
        }
    }
}

impl fmt::Debug for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Repr::Lit(l) => write!(f, "{:?}", l),
            Repr::Expr { op, args } => {
                write!(f, "({}", op.name())?;
                for a in args {
                    write!(f, " {:?}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<Literal> for Txn {
    fn from(l: Literal) -> Self {
        Txn::lit(l)
    }
}

impl From<bool> for Txn {
    fn from(b: bool) -> Self {
        Txn::flag(b)
    }
}

impl From<f64> for Txn {
    fn from(x: f64) -> Self {
        Txn::real(x)
    }
}

impl From<&str> for Txn {
    fn from(s: &str) -> Self {
        Txn::text(s)
    }
}

impl From<String> for Txn {
    fn from(s: String) -> Self {
        Txn::text(&s)
    }
}

impl From<&Txn> for Txn {
    fn from(t: &Txn) -> Self {
        t.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Interning ===

    #[test]
    fn test_canonical_literals_are_interned() {
        assert!(Txn::flag(true).ptr_eq(&Txn::flag(true)));
        assert!(Txn::flag(false).ptr_eq(&Txn::flag(false)));
        assert!(Txn::real(0.0).ptr_eq(&Txn::real(0.0)));
        assert!(Txn::real(1.0).ptr_eq(&Txn::real(1.0)));
        assert!(Txn::text("").ptr_eq(&Txn::text("")));
        assert!(Txn::none().ptr_eq(&Txn::none()));
    }

    #[test]
    fn test_folding_reaches_interned_constants() {
        // add(0, 1) folds to the interned real(1)
        assert!(Txn::add(0.0, 1.0).ptr_eq(&Txn::real(1.0)));
        // equal(none, none) folds to the interned true
        assert!(Txn::equal(Txn::none(), Txn::none()).ptr_eq(&Txn::flag(true)));
    }

    // === Constant folding ===

    #[test]
    fn test_add_folds() {
        assert_eq!(Txn::add(6.0, 9.0), Txn::real(15.0));
    }

    #[test]
    fn test_string_add_folds() {
        assert_eq!(Txn::add("a", 0.0), Txn::text("a0.0"));
    }

    #[test]
    fn test_branch_folds_on_literal_condition() {
        assert_eq!(Txn::branch(true, "y", "n"), Txn::text("y"));
        assert_eq!(Txn::branch(false, "y", "n"), Txn::text("n"));
        // non-flag conditions coerce
        assert_eq!(Txn::branch(3.0, "y", "n"), Txn::text("y"));
    }

    #[test]
    fn test_branch_with_open_condition_is_retained() {
        let t = Txn::branch(Txn::read("k"), "y", "n");
        assert!(t.as_literal().is_none());
    }

    #[test]
    fn test_cons_drops_pure_literal_head() {
        let tail = Txn::read("k");
        let t = Txn::cons(Txn::real(5.0), tail.clone());
        assert_eq!(t, tail);
    }

    #[test]
    fn test_cons_keeps_effectful_head() {
        let t = Txn::cons(Txn::write("k", 1.0), Txn::real(2.0));
        assert!(t.as_literal().is_none());
    }

    #[test]
    fn test_repeat_false_collapses_to_none() {
        let t = Txn::repeat(false, Txn::write("k", 1.0));
        assert!(t.ptr_eq(&Txn::none()));
    }

    #[test]
    fn test_repeat_true_is_not_unrolled() {
        let t = Txn::repeat(true, Txn::write("k", 1.0));
        assert!(t.as_literal().is_none());
    }

    #[test]
    fn test_both_short_circuits_on_false() {
        let t = Txn::both(false, Txn::read("k"));
        assert!(t.ptr_eq(&Txn::flag(false)));
    }

    #[test]
    fn test_both_true_first_operand_is_retained() {
        // both(true, x) still has to coerce x at run time
        let t = Txn::both(true, Txn::read("k"));
        assert!(t.as_literal().is_none());
    }

    #[test]
    fn test_either_short_circuits_on_true() {
        let t = Txn::either(true, Txn::read("k"));
        assert!(t.ptr_eq(&Txn::flag(true)));
    }

    #[test]
    fn test_effectful_never_folds() {
        assert!(Txn::read("k").as_literal().is_none());
        assert!(Txn::write("k", 1.0).as_literal().is_none());
        assert!(Txn::rollback(Txn::none()).as_literal().is_none());
    }

    // === Laws ===

    #[test]
    fn test_repeated_construction_is_structurally_equal() {
        let a = Txn::add(Txn::read("k"), 1.0);
        let b = Txn::add(Txn::read("k"), 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fold_matches_direct_evaluation() {
        use crate::eval::apply;
        let cases = [
            (Op::Add, vec![Literal::Real(2.0), Literal::Real(3.0)]),
            (Op::Mul, vec![Literal::Real(2.0), Literal::Real(3.0)]),
            (Op::Contains, vec![Literal::text("ab"), Literal::text("b")]),
            (Op::Negate, vec![Literal::None]),
        ];
        for (op, lits) in cases {
            let built = Txn::pure(op, lits.iter().cloned().map(Txn::lit).collect());
            assert_eq!(built.as_literal().unwrap(), &apply(op, &lits));
        }
    }
}
