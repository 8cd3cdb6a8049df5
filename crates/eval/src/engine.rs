//! The mapping engine: evaluates a flavor's rules against an input mapping.
//!
//! Formulas are parsed once, when the engine is built. After that the
//! engine is read-only, so one instance can serve any number of input
//! mappings, from any number of threads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use gqmap_core::{
    parse, CataloguePair, Expr, InputMapping, MappingRule, ParseError, ReportFlavor,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::EvalError;
use crate::evaluate::evaluate;

/// One computed output line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputDataPoint {
    pub output_code: String,
    pub value: Decimal,
    pub description: String,
    pub formula: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingErrorKind {
    Parse,
    Overflow,
    /// Withheld by the caller, typically because the rule failed validation.
    Invalid,
}

/// A rule that produced no data point, with enough context to fix it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingError {
    pub output_code: String,
    pub formula: String,
    pub kind: MappingErrorKind,
    pub message: String,
}

impl MappingError {
    fn from_parse(rule: &MappingRule, err: &ParseError) -> Self {
        MappingError {
            output_code: rule.output_code.clone(),
            formula: rule.formula.clone(),
            kind: MappingErrorKind::Parse,
            message: format!("{} at column {}", err.kind, err.column),
        }
    }

    fn withheld(rule: &MappingRule) -> Self {
        MappingError {
            output_code: rule.output_code.clone(),
            formula: rule.formula.clone(),
            kind: MappingErrorKind::Invalid,
            message: "rule failed validation and was not evaluated".to_owned(),
        }
    }

    fn from_eval(rule: &MappingRule, err: &EvalError) -> Self {
        MappingError {
            output_code: rule.output_code.clone(),
            formula: rule.formula.clone(),
            kind: MappingErrorKind::Overflow,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} (formula '{}'): {}",
            self.output_code, self.formula, self.message
        )
    }
}

/// Result of one mapping run. Points follow rule declaration order; rules
/// that failed appear only in `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingOutcome {
    pub flavor: ReportFlavor,
    pub points: Vec<OutputDataPoint>,
    pub errors: Vec<MappingError>,
}

impl MappingOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Sum of every point's value. Saturates rather than failing, since it
    /// is only used for run summaries.
    pub fn total(&self) -> Decimal {
        self.points
            .iter()
            .fold(Decimal::ZERO, |acc, p| acc.saturating_add(p.value))
    }
}

struct CompiledRule {
    rule: MappingRule,
    expr: Result<Arc<Expr>, ParseError>,
}

/// Rules of both flavors with their formulas already parsed.
pub struct MappingEngine {
    flavors: BTreeMap<ReportFlavor, Vec<CompiledRule>>,
}

impl MappingEngine {
    /// Compile every rule of both flavors. Parse failures are kept and
    /// reported per rule at mapping time; building never fails.
    pub fn new(pair: &CataloguePair) -> Self {
        // Identical formula text is parsed once.
        let mut cache: HashMap<&str, Result<Arc<Expr>, ParseError>> = HashMap::new();
        let mut flavors = BTreeMap::new();

        for set in pair.rules.iter() {
            let compiled: Vec<CompiledRule> = set
                .rules
                .iter()
                .map(|rule| {
                    let expr = cache
                        .entry(rule.formula.as_str())
                        .or_insert_with(|| parse(&rule.formula).map(Arc::new))
                        .clone();
                    CompiledRule {
                        rule: rule.clone(),
                        expr,
                    }
                })
                .collect();
            flavors.insert(set.flavor, compiled);
        }

        tracing::debug!(distinct_formulas = cache.len(), "compiled mapping rules");
        MappingEngine { flavors }
    }

    pub fn rule_count(&self, flavor: ReportFlavor) -> usize {
        self.flavors.get(&flavor).map_or(0, Vec::len)
    }

    /// Evaluate every rule of `flavor` in declaration order. A failing
    /// rule is recorded in `errors` and the run continues with the next.
    pub fn map(&self, flavor: ReportFlavor, input: &InputMapping) -> MappingOutcome {
        self.map_skipping(flavor, input, &HashSet::new())
    }

    /// Like [`map`](Self::map), but rules whose output code is in `skip`
    /// are not evaluated and are reported as `invalid` errors. A rule that
    /// does not parse still reports its parse error.
    pub fn map_skipping(
        &self,
        flavor: ReportFlavor,
        input: &InputMapping,
        skip: &HashSet<&str>,
    ) -> MappingOutcome {
        let rules = self.flavors.get(&flavor).map(Vec::as_slice).unwrap_or(&[]);
        tracing::info!(
            %flavor,
            rules = rules.len(),
            inputs = input.len(),
            "mapping started"
        );

        let mut points = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for compiled in rules {
            let rule = &compiled.rule;
            let result = match &compiled.expr {
                Err(e) => Err(MappingError::from_parse(rule, e)),
                Ok(_) if skip.contains(rule.output_code.as_str()) => {
                    Err(MappingError::withheld(rule))
                }
                Ok(expr) => evaluate(expr, input).map_err(|e| MappingError::from_eval(rule, &e)),
            };
            match result {
                Ok(value) => {
                    tracing::debug!(output_code = %rule.output_code, %value, "evaluated rule");
                    points.push(OutputDataPoint {
                        output_code: rule.output_code.clone(),
                        value,
                        description: rule.description.clone(),
                        formula: rule.formula.clone(),
                    });
                }
                Err(err) => {
                    tracing::debug!(
                        output_code = %err.output_code,
                        formula = %err.formula,
                        "rule skipped: {}",
                        err.message
                    );
                    errors.push(err);
                }
            }
        }

        tracing::info!(
            %flavor,
            points = points.len(),
            errors = errors.len(),
            "mapping finished"
        );
        MappingOutcome {
            flavor,
            points,
            errors,
        }
    }
}

/// One-shot form: compile `pair` and map a single input.
pub fn map(flavor: ReportFlavor, pair: &CataloguePair, input: &InputMapping) -> MappingOutcome {
    MappingEngine::new(pair).map(flavor, input)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
