//! gqmap-core: catalogues, formula parsing and validation for the GQ mapper.
//!
//! Converts nothing by itself; it provides the pieces the evaluator and
//! the CLI are built from.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`CataloguePair`] -- the code catalogue plus both flavors' rules
//! - [`load_codes()`] / [`load_rules()`] -- YAML catalogue loaders
//! - [`parse()`] -- formula string to [`Expr`]
//! - [`validate()`] / [`validate_flavor()`] -- catalogue checks, no input data needed
//! - [`InputMapping`] -- normalized code -> value input
//! - Errors: [`CatalogueError`], [`ParseError`]

pub mod ast;
pub mod catalogue;
pub mod error;
pub mod input;
pub mod lexer;
pub mod parser;
pub mod validate;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::Expr;
pub use catalogue::{
    CataloguePair, CodeCatalogue, InputCodeDefinition, MappingRule, ReportFlavor, RuleCatalogue,
    RuleSet,
};
pub use error::{CatalogueError, ParseError, ParseErrorKind};
pub use input::{InputDataItem, InputMapping};
pub use validate::{IssueKind, Severity, ValidationIssue};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use catalogue::{load_codes, load_rules};
pub use parser::parse;
pub use validate::{has_errors, validate, validate_flavor};
