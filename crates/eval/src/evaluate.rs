//! Expression evaluation against an input mapping.

use gqmap_core::{Expr, InputMapping};
use rust_decimal::Decimal;

use crate::error::EvalError;
use crate::numeric::{eval_add, eval_neg, eval_sub};

/// Evaluate a parsed formula.
///
/// Every code leaf reads its value from `input`; a code absent from the
/// mapping contributes zero, exactly as if it were present with value 0.
/// Evaluation is side-effect free and bounded by the size of the tree.
/// The only failure is arithmetic overflow past the decimal range.
pub fn evaluate(expr: &Expr, input: &InputMapping) -> Result<Decimal, EvalError> {
    match expr {
        Expr::Code { code } => Ok(input.get_or_zero(*code)),
        Expr::Neg { operand } => Ok(eval_neg(evaluate(operand, input)?)),
        Expr::Add { left, right } => eval_add(evaluate(left, input)?, evaluate(right, input)?),
        Expr::Sub { left, right } => eval_sub(evaluate(left, input)?, evaluate(right, input)?),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
