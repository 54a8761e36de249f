//! Serialized expression form for Trellis transactions
//!
//! The wire format is an externally-tagged JSON union with one discriminant
//! per operator plus the four literal kinds:
//!
//! ```json
//! {"read": {"add": [{"text": "foo"}, {"text": "bar"}]}}
//! ```
//!
//! Parsing is total recursive descent that rebuilds through the smart
//! constructors, so a parsed tree is already simplified — the node above
//! parses to `read("foobar")`. Unknown discriminants and wrong arities fail
//! with a structured `TxError::Parse`.

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use trellis_core::{Literal, Op, Txn, TxnView, TxError, TxResult};

/// The wire-level node, mirroring `Op` one discriminant per operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireExpr {
    // Literal kinds
    None,
    Flag(bool),
    Real(f64),
    Text(String),

    // I/O
    Read(Box<WireExpr>),
    Write(Box<WireExpr>, Box<WireExpr>),
    Load(Box<WireExpr>),
    Store(Box<WireExpr>, Box<WireExpr>),
    Prefetch(Box<WireExpr>),
    Rollback(Box<WireExpr>),

    // Control
    Cons(Box<WireExpr>, Box<WireExpr>),
    Branch(Box<WireExpr>, Box<WireExpr>, Box<WireExpr>),
    Repeat(Box<WireExpr>, Box<WireExpr>),

    // Arithmetic
    Add(Box<WireExpr>, Box<WireExpr>),
    Sub(Box<WireExpr>, Box<WireExpr>),
    Mul(Box<WireExpr>, Box<WireExpr>),
    Div(Box<WireExpr>, Box<WireExpr>),
    Modulo(Box<WireExpr>, Box<WireExpr>),
    Pow(Box<WireExpr>, Box<WireExpr>),
    Log(Box<WireExpr>),
    Sin(Box<WireExpr>),
    Cos(Box<WireExpr>),
    Floor(Box<WireExpr>),

    // String
    Length(Box<WireExpr>),
    Slice(Box<WireExpr>, Box<WireExpr>, Box<WireExpr>),
    Matches(Box<WireExpr>, Box<WireExpr>),
    Contains(Box<WireExpr>, Box<WireExpr>),
    IndexOf(Box<WireExpr>, Box<WireExpr>),

    // Logical
    Both(Box<WireExpr>, Box<WireExpr>),
    Either(Box<WireExpr>, Box<WireExpr>),
    Negate(Box<WireExpr>),
    Equal(Box<WireExpr>, Box<WireExpr>),
    Less(Box<WireExpr>, Box<WireExpr>),
}

/// Serialize a transaction to its wire form.
pub fn serialize(tx: &Txn) -> TxResult<String> {
    serde_json::to_string(&to_wire(tx)).map_err(|e| TxError::parse(e.to_string()))
}

/// Parse a wire form back into a (simplified) transaction.
pub fn parse(input: &str) -> TxResult<Txn> {
    let wire: WireExpr =
        serde_json::from_str(input).map_err(|e| TxError::parse(e.to_string()))?;
    Ok(from_wire(wire))
}

fn to_wire(tx: &Txn) -> WireExpr {
    match tx.view() {
        TxnView::Lit(l) => match l {
            Literal::None => WireExpr::None,
            Literal::Flag(b) => WireExpr::Flag(*b),
            Literal::Real(x) => WireExpr::Real(*x),
            Literal::Text(s) => WireExpr::Text(s.to_string()),
        },
        TxnView::Expr(op, args) => {
            let mut a = args.iter().map(|t| Box::new(to_wire(t)));
            // arity is checked at node construction, so the operand
            // iterator always yields enough elements
            let mut next = || a.next().unwrap_or_else(|| Box::new(WireExpr::None));
            match op {
                Op::Read => WireExpr::Read(next()),
                Op::Write => WireExpr::Write(next(), next()),
                Op::Load => WireExpr::Load(next()),
                Op::Store => WireExpr::Store(next(), next()),
                Op::Prefetch => WireExpr::Prefetch(next()),
                Op::Rollback => WireExpr::Rollback(next()),
                Op::Cons => WireExpr::Cons(next(), next()),
                Op::Branch => WireExpr::Branch(next(), next(), next()),
                Op::Repeat => WireExpr::Repeat(next(), next()),
                Op::Add => WireExpr::Add(next(), next()),
                Op::Sub => WireExpr::Sub(next(), next()),
                Op::Mul => WireExpr::Mul(next(), next()),
                Op::Div => WireExpr::Div(next(), next()),
                Op::Modulo => WireExpr::Modulo(next(), next()),
                Op::Pow => WireExpr::Pow(next(), next()),
                Op::Log => WireExpr::Log(next()),
                Op::Sin => WireExpr::Sin(next()),
                Op::Cos => WireExpr::Cos(next()),
                Op::Floor => WireExpr::Floor(next()),
                Op::Length => WireExpr::Length(next()),
                Op::Slice => WireExpr::Slice(next(), next(), next()),
                Op::Matches => WireExpr::Matches(next(), next()),
                Op::Contains => WireExpr::Contains(next(), next()),
                Op::IndexOf => WireExpr::IndexOf(next(), next()),
                Op::Both => WireExpr::Both(next(), next()),
                Op::Either => WireExpr::Either(next(), next()),
                Op::Negate => WireExpr::Negate(next()),
                Op::Equal => WireExpr::Equal(next(), next()),
                Op::Less => WireExpr::Less(next(), next()),
            }
        }
    }
}

fn from_wire(wire: WireExpr) -> Txn {
    let un = |a: Box<WireExpr>| from_wire(*a);
    match wire {
        WireExpr::None => Txn::none(),
        WireExpr::Flag(b) => Txn::flag(b),
        WireExpr::Real(x) => Txn::real(x),
        WireExpr::Text(s) => Txn::text(s),

        WireExpr::Read(k) => Txn::read(un(k)),
        WireExpr::Write(k, v) => Txn::write(un(k), un(v)),
        WireExpr::Load(n) => Txn::load(un(n)),
        WireExpr::Store(n, v) => Txn::store(un(n), un(v)),
        WireExpr::Prefetch(ks) => Txn::prefetch(un(ks)),
        WireExpr::Rollback(v) => Txn::rollback(un(v)),

        WireExpr::Cons(a, b) => Txn::cons(un(a), un(b)),
        WireExpr::Branch(c, t, f) => Txn::branch(un(c), un(t), un(f)),
        WireExpr::Repeat(c, b) => Txn::repeat(un(c), un(b)),

        WireExpr::Add(a, b) => Txn::add(un(a), un(b)),
        WireExpr::Sub(a, b) => Txn::sub(un(a), un(b)),
        WireExpr::Mul(a, b) => Txn::mul(un(a), un(b)),
        WireExpr::Div(a, b) => Txn::div(un(a), un(b)),
        WireExpr::Modulo(a, b) => Txn::modulo(un(a), un(b)),
        WireExpr::Pow(a, b) => Txn::pow(un(a), un(b)),
        WireExpr::Log(a) => Txn::log(un(a)),
        WireExpr::Sin(a) => Txn::sin(un(a)),
        WireExpr::Cos(a) => Txn::cos(un(a)),
        WireExpr::Floor(a) => Txn::floor(un(a)),

        WireExpr::Length(s) => Txn::length(un(s)),
        WireExpr::Slice(s, lo, hi) => Txn::slice(un(s), un(lo), un(hi)),
        WireExpr::Matches(s, p) => Txn::matches(un(s), un(p)),
        WireExpr::Contains(s, n) => Txn::contains(un(s), un(n)),
        WireExpr::IndexOf(s, n) => Txn::index_of(un(s), un(n)),

        WireExpr::Both(a, b) => Txn::both(un(a), un(b)),
        WireExpr::Either(a, b) => Txn::either(un(a), un(b)),
        WireExpr::Negate(a) => Txn::negate(un(a)),
        WireExpr::Equal(a, b) => Txn::equal(un(a), un(b)),
        WireExpr::Less(a, b) => Txn::less(un(a), un(b)),
    }
}
