//! The closed operator set of the transaction language

/// Every operator a transaction expression node can carry.
///
/// The set is closed: the interpreter and the simplifier both match
/// exhaustively, so adding a variant is a compile-visible change everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // I/O
    /// Read a key from the store
    Read,
    /// Write a key into the pending write set
    Write,
    /// Read a transaction-local variable
    Load,
    /// Write a transaction-local variable
    Store,
    /// Queue a comma-joined list of keys for a batched fetch
    Prefetch,
    /// Discard the write set and continue read-only
    Rollback,

    // Control
    /// Sequence two operands; yields the second
    Cons,
    /// Conditional with lazily evaluated arms
    Branch,
    /// Condition-guarded loop; yields `none`
    Repeat,

    // Arithmetic
    /// Numeric sum, or text concatenation when either operand is text
    Add,
    /// Difference
    Sub,
    /// Product
    Mul,
    /// Quotient (IEEE: division by zero yields an infinity or NaN)
    Div,
    /// Remainder
    Modulo,
    /// Exponentiation
    Pow,
    /// Natural logarithm
    Log,
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Floor
    Floor,

    // String
    /// Character count of the rendering
    Length,
    /// Character range `[lo, hi)` of the rendering
    Slice,
    /// Regular-expression match
    Matches,
    /// Substring test
    Contains,
    /// First character index of a substring, or -1
    IndexOf,

    // Logical
    /// Short-circuit conjunction over flag coercions
    Both,
    /// Short-circuit disjunction over flag coercions
    Either,
    /// Flag-coercing negation
    Negate,
    /// Strongly-typed equality
    Equal,
    /// Ordering (lexicographic for text pairs, numeric otherwise)
    Less,
}

impl Op {
    /// Operand count. `Branch` and `Slice` take three; unary operators one;
    /// everything else two.
    pub fn arity(&self) -> usize {
        match self {
            Op::Read
            | Op::Load
            | Op::Prefetch
            | Op::Rollback
            | Op::Log
            | Op::Sin
            | Op::Cos
            | Op::Floor
            | Op::Length
            | Op::Negate => 1,
            Op::Branch | Op::Slice => 3,
            _ => 2,
        }
    }

    /// Whether the operator is free of store, local, and control effects.
    ///
    /// Pure operators over all-literal operands are folded at construction
    /// time; effectful ones never are.
    pub fn is_pure(&self) -> bool {
        !matches!(
            self,
            Op::Read
                | Op::Write
                | Op::Load
                | Op::Store
                | Op::Prefetch
                | Op::Rollback
                | Op::Cons
                | Op::Branch
                | Op::Repeat
        )
    }

    /// Canonical lowercase name, matching the wire discriminant.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Read => "read",
            Op::Write => "write",
            Op::Load => "load",
            Op::Store => "store",
            Op::Prefetch => "prefetch",
            Op::Rollback => "rollback",
            Op::Cons => "cons",
            Op::Branch => "branch",
            Op::Repeat => "repeat",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Modulo => "modulo",
            Op::Pow => "pow",
            Op::Log => "log",
            Op::Sin => "sin",
            Op::Cos => "cos",
            Op::Floor => "floor",
            Op::Length => "length",
            Op::Slice => "slice",
            Op::Matches => "matches",
            Op::Contains => "contains",
            Op::IndexOf => "index_of",
            Op::Both => "both",
            Op::Either => "either",
            Op::Negate => "negate",
            Op::Equal => "equal",
            Op::Less => "less",
        }
    }
}
