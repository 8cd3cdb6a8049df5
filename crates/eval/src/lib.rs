//! GQ mapper evaluator -- turns an input mapping into output data points.
//!
//! Consumes the catalogues loaded by `gqmap-core`, parses each rule's
//! formula once, and evaluates the rules of one report flavor against a
//! normalized code -> value mapping. Per-rule failures are collected,
//! never raised.

pub mod engine;
pub mod error;
pub mod evaluate;
pub mod numeric;

pub use engine::{
    map, MappingEngine, MappingError, MappingErrorKind, MappingOutcome, OutputDataPoint,
};
pub use error::EvalError;
pub use evaluate::evaluate;

use gqmap_core::{InputMapping, ParseError};
use rust_decimal::Decimal;

/// Error from [`evaluate_formula`]: the formula did not parse, or its
/// value left the decimal range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parse and evaluate a single formula string.
///
/// Convenience for one-off checks; batch work should go through
/// [`MappingEngine`], which parses each formula only once.
pub fn evaluate_formula(formula: &str, input: &InputMapping) -> Result<Decimal, FormulaError> {
    let expr = gqmap_core::parse(formula)?;
    Ok(evaluate(&expr, input)?)
}

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────
