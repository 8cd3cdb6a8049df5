//! Code and rule catalogues, and the loader for their YAML documents.
//!
//! Catalogues are immutable once loaded. Nothing in this module knows any
//! specific code or formula; all of that comes from the documents.

use crate::error::CatalogueError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Top-level key of the code catalogue document.
pub const CODES_SECTION: &str = "gq_codes";

// ──────────────────────────────────────────────
// Data model
// ──────────────────────────────────────────────

/// One valid input code and its descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCodeDefinition {
    pub code: u32,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
}

/// Every input code defined for a run, in document order.
#[derive(Debug, Clone, Default)]
pub struct CodeCatalogue {
    definitions: Vec<InputCodeDefinition>,
    index: HashMap<u32, usize>,
}

impl CodeCatalogue {
    /// Build a catalogue, rejecting duplicate codes. Positions in the
    /// error are 1-based.
    pub fn new(
        definitions: Vec<InputCodeDefinition>,
        document: &str,
    ) -> Result<Self, CatalogueError> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if let Some(first) = index.insert(def.code, i) {
                return Err(CatalogueError::DuplicateCode {
                    document: document.to_owned(),
                    code: def.code,
                    first: first + 1,
                    second: i + 1,
                });
            }
        }
        Ok(CodeCatalogue { definitions, index })
    }

    pub fn get(&self, code: u32) -> Option<&InputCodeDefinition> {
        self.index.get(&code).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, code: u32) -> bool {
        self.index.contains_key(&code)
    }

    pub fn definitions(&self) -> &[InputCodeDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// One of the two independent rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFlavor {
    /// Residency-based report (LBSR).
    Residency,
    /// Nationality-based report (LBSN).
    Nationality,
}

impl ReportFlavor {
    pub const ALL: [ReportFlavor; 2] = [ReportFlavor::Residency, ReportFlavor::Nationality];

    /// Key of this flavor's rule list in the rule catalogue document.
    pub fn section_key(self) -> &'static str {
        match self {
            ReportFlavor::Residency => "lbsr_mappings",
            ReportFlavor::Nationality => "lbsn_mappings",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            ReportFlavor::Residency => "lbsr",
            ReportFlavor::Nationality => "lbsn",
        }
    }
}

impl fmt::Display for ReportFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFlavor::Residency => write!(f, "residency"),
            ReportFlavor::Nationality => write!(f, "nationality"),
        }
    }
}

impl FromStr for ReportFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lbsr" | "residency" => Ok(ReportFlavor::Residency),
            "lbsn" | "nationality" => Ok(ReportFlavor::Nationality),
            other => Err(format!(
                "unknown report flavor '{}'; expected lbsr (residency) or lbsn (nationality)",
                other
            )),
        }
    }
}

/// One output code and the formula that computes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub output_code: String,
    pub description: String,
    pub formula: String,
}

/// The rules of one flavor, in declaration order.
///
/// Constructing a rule set directly does not check output-code uniqueness;
/// the loader does, and the validator reports it for hand-built sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub flavor: ReportFlavor,
    pub rules: Vec<MappingRule>,
}

impl RuleSet {
    pub fn new(flavor: ReportFlavor, rules: Vec<MappingRule>) -> Self {
        RuleSet { flavor, rules }
    }

    pub fn empty(flavor: ReportFlavor) -> Self {
        RuleSet::new(flavor, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Both flavors' rule sets. They are never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleCatalogue {
    residency: RuleSet,
    nationality: RuleSet,
}

impl RuleCatalogue {
    pub fn new(residency: RuleSet, nationality: RuleSet) -> Self {
        RuleCatalogue {
            residency,
            nationality,
        }
    }

    pub fn get(&self, flavor: ReportFlavor) -> &RuleSet {
        match flavor {
            ReportFlavor::Residency => &self.residency,
            ReportFlavor::Nationality => &self.nationality,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleSet> {
        [&self.residency, &self.nationality].into_iter()
    }
}

/// The code catalogue together with the rule catalogue evaluated against it.
#[derive(Debug, Clone)]
pub struct CataloguePair {
    pub codes: CodeCatalogue,
    pub rules: RuleCatalogue,
}

impl CataloguePair {
    pub fn new(codes: CodeCatalogue, rules: RuleCatalogue) -> Self {
        CataloguePair { codes, rules }
    }

    /// Load both documents from their YAML text. `*_document` names are
    /// used only in error messages.
    pub fn load(
        codes_src: &str,
        codes_document: &str,
        rules_src: &str,
        rules_document: &str,
    ) -> Result<Self, CatalogueError> {
        let codes = load_codes(codes_src, codes_document)?;
        let rules = load_rules(rules_src, rules_document)?;
        Ok(CataloguePair::new(codes, rules))
    }
}

// ──────────────────────────────────────────────
// Loader
// ──────────────────────────────────────────────

/// Parse the input-code catalogue document.
pub fn load_codes(src: &str, document: &str) -> Result<CodeCatalogue, CatalogueError> {
    let root = parse_yaml(src, document)?;
    let entries = match root.get(CODES_SECTION) {
        Some(section) => section_entries(section, document, CODES_SECTION)?,
        None => {
            return Err(CatalogueError::MissingSection {
                document: document.to_owned(),
                key: CODES_SECTION.to_owned(),
            })
        }
    };

    let mut definitions = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let e = Entry::new(entry, document, CODES_SECTION, i + 1)?;
        definitions.push(InputCodeDefinition {
            code: e.code("code")?,
            description: e.optional_str("description")?.unwrap_or_default(),
            part: e.optional_str("part")?,
            category: e.optional_str("category")?,
            counterparty: e.optional_str("counterparty")?,
        });
    }

    let catalogue = CodeCatalogue::new(definitions, document)?;
    tracing::debug!(document, codes = catalogue.len(), "loaded code catalogue");
    Ok(catalogue)
}

/// Parse the rule catalogue document. A flavor whose section is absent
/// loads as an empty rule set, but at least one section must be present.
pub fn load_rules(src: &str, document: &str) -> Result<RuleCatalogue, CatalogueError> {
    let root = parse_yaml(src, document)?;

    if ReportFlavor::ALL
        .iter()
        .all(|f| root.get(f.section_key()).is_none())
    {
        return Err(CatalogueError::MissingSection {
            document: document.to_owned(),
            key: format!(
                "{}' or '{}",
                ReportFlavor::Residency.section_key(),
                ReportFlavor::Nationality.section_key()
            ),
        });
    }

    let residency = load_rule_set(&root, ReportFlavor::Residency, document)?;
    let nationality = load_rule_set(&root, ReportFlavor::Nationality, document)?;
    tracing::debug!(
        document,
        residency = residency.len(),
        nationality = nationality.len(),
        "loaded rule catalogue"
    );
    Ok(RuleCatalogue::new(residency, nationality))
}

fn load_rule_set(
    root: &Value,
    flavor: ReportFlavor,
    document: &str,
) -> Result<RuleSet, CatalogueError> {
    let section = flavor.section_key();
    let entries = match root.get(section) {
        Some(v) => section_entries(v, document, section)?,
        None => return Ok(RuleSet::empty(flavor)),
    };

    let mut rules = Vec::with_capacity(entries.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let position = i + 1;
        let e = Entry::new(entry, document, section, position)?;
        let output_code = match e.optional_str("dsd_code")? {
            Some(code) => code,
            None => e.required_str("output_code")?,
        };
        let rule = MappingRule {
            output_code,
            description: e.required_str("description")?,
            formula: e.required_str("formula")?,
        };
        if let Some(first) = seen.insert(rule.output_code.clone(), position) {
            return Err(CatalogueError::DuplicateOutputCode {
                document: document.to_owned(),
                section: section.to_owned(),
                output_code: rule.output_code,
                first,
                second: position,
            });
        }
        rules.push(rule);
    }
    Ok(RuleSet::new(flavor, rules))
}

fn parse_yaml(src: &str, document: &str) -> Result<Value, CatalogueError> {
    serde_yaml::from_str(src).map_err(|source| CatalogueError::Yaml {
        document: document.to_owned(),
        source,
    })
}

fn section_entries<'v>(
    section: &'v Value,
    document: &str,
    key: &str,
) -> Result<&'v [Value], CatalogueError> {
    match section {
        Value::Sequence(items) => Ok(items.as_slice()),
        // `lbsn_mappings:` with nothing under it
        Value::Null => Ok(&[]),
        _ => Err(CatalogueError::InvalidSection {
            document: document.to_owned(),
            key: key.to_owned(),
        }),
    }
}

/// Field accessor for one list entry, carrying enough context to name the
/// entry in errors.
struct Entry<'a> {
    value: &'a Value,
    document: &'a str,
    section: &'a str,
    position: usize,
}

impl<'a> Entry<'a> {
    fn new(
        value: &'a Value,
        document: &'a str,
        section: &'a str,
        position: usize,
    ) -> Result<Self, CatalogueError> {
        if !value.is_mapping() {
            return Err(CatalogueError::InvalidEntry {
                document: document.to_owned(),
                section: section.to_owned(),
                position,
            });
        }
        Ok(Entry {
            value,
            document,
            section,
            position,
        })
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        match self.value.get(name) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }

    fn missing(&self, field: &str) -> CatalogueError {
        CatalogueError::MissingField {
            document: self.document.to_owned(),
            section: self.section.to_owned(),
            position: self.position,
            field: field.to_owned(),
        }
    }

    /// Scalars are accepted as text: YAML reads `formula: 4` as a number.
    fn optional_str(&self, name: &str) -> Result<Option<String>, CatalogueError> {
        match self.field(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(CatalogueError::InvalidField {
                document: self.document.to_owned(),
                section: self.section.to_owned(),
                position: self.position,
                field: name.to_owned(),
            }),
        }
    }

    fn required_str(&self, name: &str) -> Result<String, CatalogueError> {
        self.optional_str(name)?.ok_or_else(|| self.missing(name))
    }

    fn code(&self, name: &str) -> Result<u32, CatalogueError> {
        let raw = self.field(name).ok_or_else(|| self.missing(name))?;
        let parsed = match raw {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        match parsed {
            Some(code) if code > 0 => Ok(code),
            _ => Err(CatalogueError::InvalidCode {
                document: self.document.to_owned(),
                section: self.section.to_owned(),
                position: self.position,
                value: render(raw),
            }),
        }
    }
}

fn render(v: &Value) -> String {
    match v {
        Value::String(s) => format!("'{}'", s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_owned(),
        _ => "(non-scalar value)".to_owned(),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const CODES: &str = r#"
gq_codes:
  - code: 6
    description: Total claims
    part: I
    category: Total
  - code: 17
    description: Inter-office positions
    part: I
    category: Inter-office
  - code: 221
    description: Loans to Non-banks
    part: I
    category: Loans
    counterparty: F
"#;

    const RULES: &str = r#"
lbsr_mappings:
  - dsd_code: CAF
    description: Claims, All Instruments, on Non-bank Fin. Inst.
    formula: 201+208+215+221+(17-517)+230
  - dsd_code: CGB
    description: Claims, Loans & Deposits, Banks (Total)
    formula: 4+376
lbsn_mappings:
  - output_code: CAA
    description: Claims, All Instruments, All Sectors
    formula: 6+17+(228+229+230)
"#;

    #[test]
    fn loads_code_catalogue_with_metadata() {
        let cat = load_codes(CODES, "codes.yaml").unwrap();
        assert_eq!(cat.len(), 3);
        assert!(cat.contains(6));
        assert!(!cat.contains(999));
        let loans = cat.get(221).unwrap();
        assert_eq!(loans.description, "Loans to Non-banks");
        assert_eq!(loans.part.as_deref(), Some("I"));
        assert_eq!(loans.category.as_deref(), Some("Loans"));
        assert_eq!(loans.counterparty.as_deref(), Some("F"));
        assert_eq!(cat.get(6).unwrap().counterparty, None);
    }

    #[test]
    fn code_entries_keep_document_order() {
        let cat = load_codes(CODES, "codes.yaml").unwrap();
        let codes: Vec<u32> = cat.definitions().iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![6, 17, 221]);
    }

    #[test]
    fn loads_both_rule_sets_in_declaration_order() {
        let rules = load_rules(RULES, "rules.yaml").unwrap();
        let lbsr = rules.get(ReportFlavor::Residency);
        assert_eq!(lbsr.flavor, ReportFlavor::Residency);
        let codes: Vec<&str> = lbsr.rules.iter().map(|r| r.output_code.as_str()).collect();
        assert_eq!(codes, vec!["CAF", "CGB"]);
        assert_eq!(lbsr.rules[1].formula, "4+376");

        let lbsn = rules.get(ReportFlavor::Nationality);
        assert_eq!(lbsn.len(), 1);
        assert_eq!(lbsn.rules[0].output_code, "CAA");
    }

    #[test]
    fn numeric_scalars_are_read_as_text() {
        let src = "lbsr_mappings:\n  - dsd_code: 1234\n    description: single\n    formula: 4\n";
        let rules = load_rules(src, "rules.yaml").unwrap();
        let rule = &rules.get(ReportFlavor::Residency).rules[0];
        assert_eq!(rule.output_code, "1234");
        assert_eq!(rule.formula, "4");
    }

    #[test]
    fn missing_flavor_section_loads_empty() {
        let src = "lbsr_mappings:\n  - dsd_code: A\n    description: a\n    formula: 1\n";
        let rules = load_rules(src, "rules.yaml").unwrap();
        assert!(rules.get(ReportFlavor::Nationality).is_empty());
    }

    #[test]
    fn rule_document_without_any_section_fails() {
        let err = load_rules("other: []\n", "rules.yaml").unwrap_err();
        assert!(matches!(err, CatalogueError::MissingSection { .. }));
    }

    #[test]
    fn code_document_without_section_fails() {
        let err = load_codes("codes: []\n", "codes.yaml").unwrap_err();
        assert!(matches!(err, CatalogueError::MissingSection { .. }));
    }

    #[test]
    fn duplicate_code_names_both_entries() {
        let src = "gq_codes:\n  - code: 6\n  - code: 17\n  - code: 6\n";
        let err = load_codes(src, "codes.yaml").unwrap_err();
        match err {
            CatalogueError::DuplicateCode {
                code,
                first,
                second,
                ..
            } => {
                assert_eq!(code, 6);
                assert_eq!((first, second), (1, 3));
            }
            other => panic!("expected DuplicateCode, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_output_code_names_both_entries() {
        let src = r#"
lbsr_mappings:
  - dsd_code: CGB
    description: first
    formula: 4
  - dsd_code: CGB
    description: second
    formula: 376
"#;
        let err = load_rules(src, "rules.yaml").unwrap_err();
        let msg = err.to_string();
        match err {
            CatalogueError::DuplicateOutputCode {
                output_code,
                first,
                second,
                section,
                ..
            } => {
                assert_eq!(output_code, "CGB");
                assert_eq!((first, second), (1, 2));
                assert_eq!(section, "lbsr_mappings");
            }
            other => panic!("expected DuplicateOutputCode, got {:?}", other),
        }
        assert!(msg.contains("entries 1 and 2"), "{}", msg);
    }

    #[test]
    fn same_output_code_in_both_flavors_is_allowed() {
        let src = r#"
lbsr_mappings:
  - dsd_code: CAA
    description: r
    formula: 6
lbsn_mappings:
  - dsd_code: CAA
    description: n
    formula: 6
"#;
        assert!(load_rules(src, "rules.yaml").is_ok());
    }

    #[test]
    fn non_numeric_code_is_rejected() {
        let src = "gq_codes:\n  - code: 6\n  - code: abc\n";
        let err = load_codes(src, "codes.yaml").unwrap_err();
        match err {
            CatalogueError::InvalidCode {
                position, value, ..
            } => {
                assert_eq!(position, 2);
                assert_eq!(value, "'abc'");
            }
            other => panic!("expected InvalidCode, got {:?}", other),
        }
    }

    #[test]
    fn zero_and_negative_codes_are_rejected() {
        for bad in ["0", "-5", "4.5"] {
            let src = format!("gq_codes:\n  - code: {}\n", bad);
            let err = load_codes(&src, "codes.yaml").unwrap_err();
            assert!(
                matches!(err, CatalogueError::InvalidCode { .. }),
                "code {} should be rejected, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn quoted_numeric_code_is_accepted() {
        let cat = load_codes("gq_codes:\n  - code: '376'\n", "codes.yaml").unwrap();
        assert!(cat.contains(376));
        assert_eq!(cat.get(376).unwrap().description, "");
    }

    #[test]
    fn missing_required_rule_field_is_reported_with_position() {
        let src = r#"
lbsn_mappings:
  - dsd_code: CAA
    description: ok
    formula: 6
  - dsd_code: CAB
    description: no formula here
"#;
        let err = load_rules(src, "rules.yaml").unwrap_err();
        match err {
            CatalogueError::MissingField {
                section,
                position,
                field,
                ..
            } => {
                assert_eq!(section, "lbsn_mappings");
                assert_eq!(position, 2);
                assert_eq!(field, "formula");
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn rule_without_any_output_code_field_is_rejected() {
        let src = "lbsr_mappings:\n  - description: d\n    formula: 4\n";
        let err = load_rules(src, "rules.yaml").unwrap_err();
        assert!(
            matches!(err, CatalogueError::MissingField { ref field, .. } if field == "output_code")
        );
    }

    #[test]
    fn missing_code_field_is_reported() {
        let err = load_codes("gq_codes:\n  - description: x\n", "codes.yaml").unwrap_err();
        assert!(matches!(err, CatalogueError::MissingField { ref field, .. } if field == "code"));
    }

    #[test]
    fn malformed_yaml_is_a_catalogue_error() {
        let err = load_codes("gq_codes: [", "codes.yaml").unwrap_err();
        assert!(matches!(err, CatalogueError::Yaml { .. }));
        assert!(err.to_string().starts_with("codes.yaml: malformed YAML"));
    }

    #[test]
    fn section_that_is_not_a_list_is_rejected() {
        let err = load_codes("gq_codes: 6\n", "codes.yaml").unwrap_err();
        assert!(matches!(err, CatalogueError::InvalidSection { .. }));
    }

    #[test]
    fn entry_that_is_not_a_mapping_is_rejected() {
        let err = load_codes("gq_codes:\n  - 6\n", "codes.yaml").unwrap_err();
        assert!(matches!(
            err,
            CatalogueError::InvalidEntry { position: 1, .. }
        ));
    }

    #[test]
    fn description_must_be_scalar() {
        let src = "gq_codes:\n  - code: 6\n    description: [a, b]\n";
        let err = load_codes(src, "codes.yaml").unwrap_err();
        assert!(matches!(err, CatalogueError::InvalidField { ref field, .. } if field == "description"));
    }

    #[test]
    fn flavor_names_parse_both_spellings() {
        assert_eq!("lbsr".parse::<ReportFlavor>(), Ok(ReportFlavor::Residency));
        assert_eq!(
            "Nationality".parse::<ReportFlavor>(),
            Ok(ReportFlavor::Nationality)
        );
        assert!("lbs".parse::<ReportFlavor>().is_err());
    }

    #[test]
    fn catalogue_pair_loads_both_documents() {
        let pair = CataloguePair::load(CODES, "codes.yaml", RULES, "rules.yaml").unwrap();
        assert_eq!(pair.codes.len(), 3);
        assert_eq!(pair.rules.iter().map(RuleSet::len).sum::<usize>(), 3);
    }
}
