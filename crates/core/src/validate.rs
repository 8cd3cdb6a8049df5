//! Catalogue validation, independent of any input data.
//!
//! Structural checks produce errors; the coverage check produces warnings.
//! Every problem is reported, not just the first one.

use crate::catalogue::{CataloguePair, ReportFlavor, RuleSet};
use crate::parser;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ParseFailure,
    DuplicateOutputCode,
    UnknownCode,
    EmptyRuleSet,
    UnreferencedCode,
}

/// One problem found in the catalogues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<ReportFlavor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Codes the issue is about: unknown references, or the unreferenced code.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<u32>,
    pub message: String,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match (&self.flavor, &self.output_code) {
            (Some(flavor), Some(code)) => write!(
                f,
                "{}: rule {} ({}): {}",
                level,
                code,
                flavor.short_name(),
                self.message
            ),
            (Some(flavor), None) => write!(f, "{}: {}: {}", level, flavor.short_name(), self.message),
            _ => write!(f, "{}: {}", level, self.message),
        }
    }
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(ValidationIssue::is_error)
}

/// Validate both flavors. An empty result means the catalogues are safe to
/// evaluate against any input mapping.
pub fn validate(pair: &CataloguePair) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for flavor in ReportFlavor::ALL {
        check_rule_set(pair, pair.rules.get(flavor), &mut issues);
    }
    check_coverage(pair, &mut issues);
    issues
}

/// Validate a single flavor's rules. Coverage is still judged against the
/// rules of both flavors, since a code may be used only by the other one.
pub fn validate_flavor(pair: &CataloguePair, flavor: ReportFlavor) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_rule_set(pair, pair.rules.get(flavor), &mut issues);
    check_coverage(pair, &mut issues);
    issues
}

fn check_rule_set(pair: &CataloguePair, set: &RuleSet, issues: &mut Vec<ValidationIssue>) {
    let flavor = set.flavor;

    if set.is_empty() {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            kind: IssueKind::EmptyRuleSet,
            flavor: Some(flavor),
            output_code: None,
            formula: None,
            codes: Vec::new(),
            message: format!("no mapping rules defined under '{}'", flavor.section_key()),
        });
        return;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (i, rule) in set.rules.iter().enumerate() {
        let rule_issue = |kind, codes, message| ValidationIssue {
            severity: Severity::Error,
            kind,
            flavor: Some(flavor),
            output_code: Some(rule.output_code.clone()),
            formula: Some(rule.formula.clone()),
            codes,
            message,
        };

        if let Some(first) = seen.insert(rule.output_code.as_str(), i) {
            issues.push(rule_issue(
                IssueKind::DuplicateOutputCode,
                Vec::new(),
                format!(
                    "output code declared more than once (rules {} and {})",
                    first + 1,
                    i + 1
                ),
            ));
        }

        let expr = match parser::parse(&rule.formula) {
            Ok(expr) => expr,
            Err(e) => {
                issues.push(rule_issue(
                    IssueKind::ParseFailure,
                    Vec::new(),
                    format!("formula '{}' does not parse: {} at column {}", e.formula, e.kind, e.column),
                ));
                continue;
            }
        };

        let unknown: Vec<u32> = expr
            .referenced_codes()
            .into_iter()
            .filter(|c| !pair.codes.contains(*c))
            .collect();
        if !unknown.is_empty() {
            let listed: Vec<String> = unknown.iter().map(u32::to_string).collect();
            issues.push(rule_issue(
                IssueKind::UnknownCode,
                unknown,
                format!(
                    "formula '{}' references codes not in the code catalogue: {}",
                    rule.formula,
                    listed.join(", ")
                ),
            ));
        }
    }
}

fn check_coverage(pair: &CataloguePair, issues: &mut Vec<ValidationIssue>) {
    // Unparsable formulas contribute nothing; they are reported elsewhere.
    let referenced: HashSet<u32> = pair
        .rules
        .iter()
        .flat_map(|set| set.rules.iter())
        .filter_map(|rule| parser::parse(&rule.formula).ok())
        .flat_map(|expr| expr.referenced_codes())
        .collect();

    let unreferenced: BTreeSet<u32> = pair
        .codes
        .definitions()
        .iter()
        .map(|d| d.code)
        .filter(|c| !referenced.contains(c))
        .collect();

    for code in unreferenced {
        issues.push(ValidationIssue {
            severity: Severity::Warning,
            kind: IssueKind::UnreferencedCode,
            flavor: None,
            output_code: None,
            formula: None,
            codes: vec![code],
            message: format!("code {} is not referenced by any mapping rule", code),
        });
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
