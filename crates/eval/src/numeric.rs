//! Decimal arithmetic for formula evaluation.
//!
//! All values are `rust_decimal::Decimal`; there is no `f64` anywhere in
//! the evaluation path. Operations are checked so that leaving the decimal
//! range is reported instead of wrapping or panicking.

use rust_decimal::Decimal;

use crate::error::EvalError;

pub fn eval_add(left: Decimal, right: Decimal) -> Result<Decimal, EvalError> {
    left.checked_add(right).ok_or_else(|| EvalError::Overflow {
        message: format!("{} + {} exceeds the decimal range", left, right),
    })
}

pub fn eval_sub(left: Decimal, right: Decimal) -> Result<Decimal, EvalError> {
    left.checked_sub(right).ok_or_else(|| EvalError::Overflow {
        message: format!("{} - {} exceeds the decimal range", left, right),
    })
}

/// Negation cannot overflow: the decimal range is symmetric.
pub fn eval_neg(operand: Decimal) -> Decimal {
    -operand
}
