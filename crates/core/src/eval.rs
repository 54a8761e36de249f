//! Pure operator semantics
//!
//! One evaluation function shared by the constant folder (all-literal
//! operands at construction time) and the interpreter (pure nodes at run
//! time), so the two can never drift apart.
//!
//! The language is total: no pure operator fails. Division by zero follows
//! IEEE-754, an unparsable regex matches nothing, out-of-range slice bounds
//! clamp.

use crate::literal::Literal;
use crate::op::Op;

/// Apply a pure operator to fully-evaluated operands.
///
/// Callers guarantee `op.is_pure()` and `args.len() == op.arity()`.
pub fn apply(op: Op, args: &[Literal]) -> Literal {
    debug_assert!(op.is_pure(), "apply() called with effectful operator");
    debug_assert_eq!(args.len(), op.arity());

    match op {
        Op::Add => {
            if matches!(args[0], Literal::Text(_)) || matches!(args[1], Literal::Text(_)) {
                Literal::text(format!("{}{}", args[0].render(), args[1].render()))
            } else {
                Literal::Real(args[0].as_real() + args[1].as_real())
            }
        }
        Op::Sub => Literal::Real(args[0].as_real() - args[1].as_real()),
        Op::Mul => Literal::Real(args[0].as_real() * args[1].as_real()),
        Op::Div => Literal::Real(args[0].as_real() / args[1].as_real()),
        Op::Modulo => Literal::Real(args[0].as_real() % args[1].as_real()),
        Op::Pow => Literal::Real(args[0].as_real().powf(args[1].as_real())),
        Op::Log => Literal::Real(args[0].as_real().ln()),
        Op::Sin => Literal::Real(args[0].as_real().sin()),
        Op::Cos => Literal::Real(args[0].as_real().cos()),
        Op::Floor => Literal::Real(args[0].as_real().floor()),

        Op::Length => Literal::Real(args[0].render().chars().count() as f64),
        Op::Slice => {
            let s = args[0].render();
            let total = s.chars().count();
            let lo = clamp_index(args[1].as_real(), total);
            let hi = clamp_index(args[2].as_real(), total);
            if lo >= hi {
                Literal::text("")
            } else {
                Literal::text(s.chars().skip(lo).take(hi - lo).collect::<String>())
            }
        }
        Op::Matches => {
            let s = args[0].render();
            let pattern = args[1].render();
            match regex::Regex::new(&pattern) {
                Ok(re) => Literal::Flag(re.is_match(&s)),
                Err(_) => Literal::Flag(false),
            }
        }
        Op::Contains => {
            Literal::Flag(args[0].render().contains(&args[1].render()))
        }
        Op::IndexOf => {
            let s = args[0].render();
            let needle = args[1].render();
            match s.find(&needle) {
                // byte offset back to a character index
                Some(byte) => Literal::Real(s[..byte].chars().count() as f64),
                None => Literal::Real(-1.0),
            }
        }

        Op::Both => Literal::Flag(args[0].as_flag() && args[1].as_flag()),
        Op::Either => Literal::Flag(args[0].as_flag() || args[1].as_flag()),
        Op::Negate => Literal::Flag(!args[0].as_flag()),
        Op::Equal => Literal::Flag(args[0].strongly_equal(&args[1])),
        Op::Less => Literal::Flag(args[0].strongly_less(&args[1])),

        Op::Read
        | Op::Write
        | Op::Load
        | Op::Store
        | Op::Prefetch
        | Op::Rollback
        | Op::Cons
        | Op::Branch
        | Op::Repeat => unreachable!("effectful operator in pure evaluation"),
    }
}

/// Coerce a real index to `[0, len]`, truncating toward zero.
fn clamp_index(x: f64, len: usize) -> usize {
    if x.is_nan() || x <= 0.0 {
        0
    } else {
        (x.trunc() as usize).min(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(x: f64) -> Literal {
        Literal::Real(x)
    }

    fn text(s: &str) -> Literal {
        Literal::text(s)
    }

    // === Arithmetic ===

    #[test]
    fn test_add_reals() {
        assert_eq!(apply(Op::Add, &[real(6.0), real(9.0)]), real(15.0));
    }

    #[test]
    fn test_add_text_concatenates() {
        assert_eq!(apply(Op::Add, &[text("a"), real(0.0)]), text("a0.0"));
        assert_eq!(apply(Op::Add, &[real(1.0), text("x")]), text("1.0x"));
        assert_eq!(apply(Op::Add, &[text("foo"), text("bar")]), text("foobar"));
    }

    #[test]
    fn test_add_coerces_non_text() {
        assert_eq!(apply(Op::Add, &[Literal::Flag(true), real(2.0)]), real(3.0));
        assert_eq!(apply(Op::Add, &[Literal::None, real(2.0)]), real(2.0));
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        assert_eq!(
            apply(Op::Div, &[real(1.0), real(0.0)]),
            real(f64::INFINITY)
        );
        let zz = apply(Op::Div, &[real(0.0), real(0.0)]);
        assert!(matches!(zz, Literal::Real(x) if x.is_nan()));
    }

    #[test]
    fn test_log_of_negative_is_nan() {
        let out = apply(Op::Log, &[real(-1.0)]);
        assert!(matches!(out, Literal::Real(x) if x.is_nan()));
    }

    #[test]
    fn test_modulo_and_floor() {
        assert_eq!(apply(Op::Modulo, &[real(7.0), real(3.0)]), real(1.0));
        assert_eq!(apply(Op::Floor, &[real(2.9)]), real(2.0));
        assert_eq!(apply(Op::Floor, &[real(-2.1)]), real(-3.0));
    }

    #[test]
    fn test_pow() {
        assert_eq!(apply(Op::Pow, &[real(2.0), real(10.0)]), real(1024.0));
    }

    // === Strings ===

    #[test]
    fn test_length_counts_chars() {
        assert_eq!(apply(Op::Length, &[text("hello")]), real(5.0));
        assert_eq!(apply(Op::Length, &[text("héllo")]), real(5.0));
        // length of a rendering, so numbers work too
        assert_eq!(apply(Op::Length, &[real(1.0)]), real(3.0));
    }

    #[test]
    fn test_slice() {
        assert_eq!(
            apply(Op::Slice, &[text("hello"), real(1.0), real(3.0)]),
            text("el")
        );
        // clamped bounds
        assert_eq!(
            apply(Op::Slice, &[text("hi"), real(-5.0), real(99.0)]),
            text("hi")
        );
        // empty when lo >= hi
        assert_eq!(
            apply(Op::Slice, &[text("hi"), real(2.0), real(1.0)]),
            text("")
        );
    }

    #[test]
    fn test_matches() {
        assert_eq!(
            apply(Op::Matches, &[text("abc123"), text(r"\d+")]),
            Literal::Flag(true)
        );
        assert_eq!(
            apply(Op::Matches, &[text("abc"), text(r"^\d+$")]),
            Literal::Flag(false)
        );
    }

    #[test]
    fn test_matches_invalid_pattern_is_false() {
        assert_eq!(
            apply(Op::Matches, &[text("abc"), text("(unclosed")]),
            Literal::Flag(false)
        );
    }

    #[test]
    fn test_contains_and_index_of() {
        assert_eq!(
            apply(Op::Contains, &[text("haystack"), text("stack")]),
            Literal::Flag(true)
        );
        assert_eq!(
            apply(Op::IndexOf, &[text("haystack"), text("stack")]),
            real(3.0)
        );
        assert_eq!(
            apply(Op::IndexOf, &[text("haystack"), text("needle")]),
            real(-1.0)
        );
    }

    #[test]
    fn test_index_of_is_char_based() {
        assert_eq!(apply(Op::IndexOf, &[text("héllo"), text("llo")]), real(2.0));
    }

    // === Logic ===

    #[test]
    fn test_logic() {
        assert_eq!(
            apply(Op::Both, &[Literal::Flag(true), real(1.0)]),
            Literal::Flag(true)
        );
        assert_eq!(
            apply(Op::Either, &[Literal::Flag(false), text("")]),
            Literal::Flag(false)
        );
        assert_eq!(apply(Op::Negate, &[Literal::None]), Literal::Flag(true));
    }

    #[test]
    fn test_equal_is_strongly_typed() {
        assert_eq!(
            apply(Op::Equal, &[text("1.0"), real(1.0)]),
            Literal::Flag(false)
        );
        assert_eq!(
            apply(Op::Equal, &[Literal::None, Literal::None]),
            Literal::Flag(true)
        );
    }
}
