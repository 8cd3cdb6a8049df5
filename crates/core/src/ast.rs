//! Formula expression tree.
//!
//! Produced by the parser, consumed by the validator (referenced codes)
//! and by the evaluator.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    /// Reference to an input code; resolves to that code's value.
    Code { code: u32 },
    Neg { operand: Box<Expr> },
    Add { left: Box<Expr>, right: Box<Expr> },
    Sub { left: Box<Expr>, right: Box<Expr> },
}

impl Expr {
    pub fn code(code: u32) -> Expr {
        Expr::Code { code }
    }

    pub fn neg(operand: Expr) -> Expr {
        Expr::Neg {
            operand: Box::new(operand),
        }
    }

    pub fn add(left: Expr, right: Expr) -> Expr {
        Expr::Add {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn sub(left: Expr, right: Expr) -> Expr {
        Expr::Sub {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Every input code this expression references, ascending, without
    /// duplicates.
    pub fn referenced_codes(&self) -> BTreeSet<u32> {
        let mut out = BTreeSet::new();
        self.collect_codes(&mut out);
        out
    }

    fn collect_codes(&self, out: &mut BTreeSet<u32>) {
        match self {
            Expr::Code { code } => {
                out.insert(*code);
            }
            Expr::Neg { operand } => operand.collect_codes(out),
            Expr::Add { left, right } | Expr::Sub { left, right } => {
                left.collect_codes(out);
                right.collect_codes(out);
            }
        }
    }
}

/// Fully parenthesized rendering, mainly for debug logs and test output.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Code { code } => write!(f, "{}", code),
            Expr::Neg { operand } => write!(f, "-{}", operand),
            Expr::Add { left, right } => write!(f, "({} + {})", left, right),
            Expr::Sub { left, right } => write!(f, "({} - {})", left, right),
        }
    }
}
