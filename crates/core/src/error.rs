use serde::Serialize;

/// Why a formula failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ParseErrorKind {
    Empty,
    UnexpectedChar { ch: char },
    UnexpectedToken { found: String },
    UnbalancedParens,
    CodeTooLarge { literal: String },
    NestingTooDeep { limit: usize },
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErrorKind::Empty => write!(f, "empty formula"),
            ParseErrorKind::UnexpectedChar { ch } => write!(f, "unexpected character '{}'", ch),
            ParseErrorKind::UnexpectedToken { found } => write!(f, "unexpected {}", found),
            ParseErrorKind::UnbalancedParens => write!(f, "unbalanced parentheses"),
            ParseErrorKind::CodeTooLarge { literal } => {
                write!(f, "code literal too large: {}", literal)
            }
            ParseErrorKind::NestingTooDeep { limit } => {
                write!(f, "nesting deeper than {} levels", limit)
            }
        }
    }
}

/// A formula parse failure. Carries the formula text and the 1-based
/// character column where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("cannot parse formula '{formula}' at column {column}: {kind}")]
pub struct ParseError {
    pub formula: String,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(formula: &str, column: usize, kind: ParseErrorKind) -> Self {
        ParseError {
            formula: formula.to_owned(),
            column,
            kind,
        }
    }
}

/// Structural problems in a declarative catalogue document. Always fatal:
/// nothing is evaluated against a catalogue that failed to load.
///
/// Entry positions are 1-based within their list.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("{document}: malformed YAML: {source}")]
    Yaml {
        document: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{document}: missing top-level '{key}' list")]
    MissingSection { document: String, key: String },

    #[error("{document}: '{key}' must be a list of entries")]
    InvalidSection { document: String, key: String },

    #[error("{document}: {section} entry {position}: expected a mapping of fields")]
    InvalidEntry {
        document: String,
        section: String,
        position: usize,
    },

    #[error("{document}: {section} entry {position}: missing required field '{field}'")]
    MissingField {
        document: String,
        section: String,
        position: usize,
        field: String,
    },

    #[error("{document}: {section} entry {position}: invalid code {value}; expected a positive integer")]
    InvalidCode {
        document: String,
        section: String,
        position: usize,
        value: String,
    },

    #[error("{document}: {section} entry {position}: field '{field}' must be a string")]
    InvalidField {
        document: String,
        section: String,
        position: usize,
        field: String,
    },

    #[error("{document}: duplicate code {code} in entries {first} and {second}")]
    DuplicateCode {
        document: String,
        code: u32,
        first: usize,
        second: usize,
    },

    #[error("{document}: {section}: duplicate output code '{output_code}' in entries {first} and {second}")]
    DuplicateOutputCode {
        document: String,
        section: String,
        output_code: String,
        first: usize,
        second: usize,
    },
}
