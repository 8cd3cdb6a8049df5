mod input;
mod report;

use std::collections::HashSet;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use gqmap_core::{
    has_errors, validate, validate_flavor, CatalogueError, CataloguePair, ReportFlavor,
    ValidationIssue,
};
use gqmap_eval::{MappingEngine, MappingError, MappingOutcome, OutputDataPoint};
use tracing_subscriber::EnvFilter;

use crate::input::{read_input, InputError};
use crate::report::{write_report, ReportError};

const DEFAULT_GQ_STRUCTURE: &str = "knowledge_base/gq_structure.yaml";
const DEFAULT_MAPPING_RULES: &str = "knowledge_base/lbs_mapping_rules.yaml";

/// Number of largest values shown in the verbose summary.
const SUMMARY_TOP: usize = 5;

/// Output format for diagnostics and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// BIS LBS report flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportType {
    /// Locational by residency
    #[value(alias = "residency")]
    Lbsr,
    /// Locational by nationality
    #[value(alias = "nationality")]
    Lbsn,
}

impl From<ReportType> for ReportFlavor {
    fn from(t: ReportType) -> Self {
        match t {
            ReportType::Lbsr => ReportFlavor::Residency,
            ReportType::Lbsn => ReportFlavor::Nationality,
        }
    }
}

/// GQ to BIS LBS mapper.
#[derive(Parser)]
#[command(
    name = "gqmap",
    version,
    about = "GQ to BIS LBS mapper: evaluates declarative mapping rules over a GQ return"
)]
struct Cli {
    /// Report flavor to produce
    #[arg(long, value_enum, required_unless_present = "validate_only")]
    report_type: Option<ReportType>,

    /// Path to the GQ return (.csv or .xlsx)
    #[arg(long, value_name = "PATH", required_unless_present = "validate_only")]
    gq_file: Option<PathBuf>,

    /// Path of the CSV report to write
    #[arg(long, value_name = "PATH", required_unless_present = "validate_only")]
    output: Option<PathBuf>,

    /// Code catalogue document
    #[arg(long, value_name = "PATH", default_value = DEFAULT_GQ_STRUCTURE)]
    gq_structure: PathBuf,

    /// Mapping rule catalogue document
    #[arg(long, value_name = "PATH", default_value = DEFAULT_MAPPING_RULES)]
    mapping_rules: PathBuf,

    /// Check the catalogues and exit without reading input or writing a report
    #[arg(long)]
    validate_only: bool,

    /// Write the report even when some rules fail to validate or evaluate
    #[arg(long)]
    allow_partial: bool,

    /// Output format for diagnostics (text or json)
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Print a run summary and debug logs
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {}: {source}", .path.display())]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("--report-type, --gq-file and --output are required unless --validate-only is given")]
    MissingArguments,

    #[error(transparent)]
    Catalogue(#[from] CatalogueError),

    #[error("no {flavor} mapping rules defined ({} is empty)", .flavor.section_key())]
    EmptyRuleSet { flavor: ReportFlavor },

    #[error("validation failed with {} error(s)", count_errors(.issues))]
    Validation { issues: Vec<ValidationIssue> },

    #[error("{} mapping rule(s) failed; no report written (use --allow-partial to keep the rest)", .errors.len())]
    Mapping { errors: Vec<MappingError> },

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl CliError {
    /// 1 validation, 2 input, 3 internal.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Catalogue(_)
            | CliError::EmptyRuleSet { .. }
            | CliError::Validation { .. }
            | CliError::Mapping { .. } => 1,
            CliError::MissingArguments | CliError::ReadDocument { .. } | CliError::Input(_) => 2,
            CliError::Report(_) => 3,
        }
    }

    /// Itemized detail lines, printed after the message.
    fn details(&self) -> Vec<String> {
        match self {
            CliError::Validation { issues } => issues
                .iter()
                .filter(|i| i.is_error())
                .map(ToString::to_string)
                .collect(),
            CliError::Mapping { errors } => errors.iter().map(ToString::to_string).collect(),
            _ => Vec::new(),
        }
    }

    fn to_json_value(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "error": self.to_string(),
            "exit_code": self.exit_code(),
        });
        match self {
            CliError::Validation { issues } => value["issues"] = serde_json::json!(issues),
            CliError::Mapping { errors } => value["errors"] = serde_json::json!(errors),
            _ => {}
        }
        value
    }
}

fn count_errors(issues: &[ValidationIssue]) -> usize {
    issues.iter().filter(|i| i.is_error()).count()
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = if cli.validate_only {
        cmd_validate(&cli)
    } else {
        cmd_map(&cli)
    };

    if let Err(e) = result {
        report_error(&e, cli.format, cli.quiet);
        process::exit(e.exit_code());
    }
}

/// `RUST_LOG` wins when set; otherwise the level follows `-v` / `-q`.
fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn report_error(err: &CliError, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => {
            eprintln!("error: {}", err);
            for line in err.details() {
                eprintln!("  - {}", line);
            }
        }
        OutputFormat::Json => {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&err.to_json_value()).unwrap_or_default()
            );
        }
    }
}

// ──────────────────────────────────────────────
// Catalogues
// ──────────────────────────────────────────────

fn read_document(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::ReadDocument {
        path: path.to_path_buf(),
        source,
    })
}

fn load_catalogues(cli: &Cli) -> Result<CataloguePair, CliError> {
    let codes_src = read_document(&cli.gq_structure)?;
    let rules_src = read_document(&cli.mapping_rules)?;
    let pair = CataloguePair::load(
        &codes_src,
        &cli.gq_structure.display().to_string(),
        &rules_src,
        &cli.mapping_rules.display().to_string(),
    )?;
    tracing::info!(
        codes = pair.codes.len(),
        lbsr_rules = pair.rules.get(ReportFlavor::Residency).len(),
        lbsn_rules = pair.rules.get(ReportFlavor::Nationality).len(),
        "catalogues loaded"
    );
    Ok(pair)
}

// ──────────────────────────────────────────────
// validate-only
// ──────────────────────────────────────────────

fn cmd_validate(cli: &Cli) -> Result<(), CliError> {
    if let Some(path) = &cli.gq_file {
        tracing::debug!(path = %path.display(), "--validate-only given; GQ file not read");
    }
    let pair = load_catalogues(cli)?;
    let issues = match cli.report_type {
        Some(t) => validate_flavor(&pair, t.into()),
        None => validate(&pair),
    };

    if has_errors(&issues) {
        if cli.format == OutputFormat::Text && !cli.quiet {
            print_warnings(&issues);
        }
        return Err(CliError::Validation { issues });
    }
    if cli.quiet {
        return Ok(());
    }

    match cli.format {
        OutputFormat::Text => {
            print_warnings(&issues);
            let counts: Vec<String> = ReportFlavor::ALL
                .iter()
                .map(|&f| format!("{}: {} rules", f.short_name(), pair.rules.get(f).len()))
                .collect();
            println!(
                "all mapping rules validated successfully ({})",
                counts.join(", ")
            );
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "valid": true,
                "codes": pair.codes.len(),
                "rules": {
                    "lbsr": pair.rules.get(ReportFlavor::Residency).len(),
                    "lbsn": pair.rules.get(ReportFlavor::Nationality).len(),
                },
                "issues": issues,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn print_warnings(issues: &[ValidationIssue]) {
    for issue in issues.iter().filter(|i| !i.is_error()) {
        eprintln!("{}", issue);
    }
}

// ──────────────────────────────────────────────
// Mapping run
// ──────────────────────────────────────────────

fn cmd_map(cli: &Cli) -> Result<(), CliError> {
    let (Some(report_type), Some(gq_file), Some(output)) =
        (cli.report_type, cli.gq_file.as_deref(), cli.output.as_deref())
    else {
        return Err(CliError::MissingArguments);
    };
    let flavor = ReportFlavor::from(report_type);

    let pair = load_catalogues(cli)?;
    if pair.rules.get(flavor).is_empty() {
        return Err(CliError::EmptyRuleSet { flavor });
    }

    let issues = validate_flavor(&pair, flavor);
    if has_errors(&issues) {
        if !cli.allow_partial {
            return Err(CliError::Validation { issues });
        }
        tracing::warn!(
            errors = count_errors(&issues),
            "validation errors ignored (--allow-partial); affected rules will be skipped"
        );
    }
    if cli.format == OutputFormat::Text && !cli.quiet {
        for issue in issues.iter().filter(|i| i.is_error() || cli.verbose) {
            eprintln!("{}", issue);
        }
    }

    // Only reachable with --allow-partial: rules with validation errors
    // are withheld from the report.
    let rejected: HashSet<&str> = issues
        .iter()
        .filter(|i| i.is_error())
        .filter_map(|i| i.output_code.as_deref())
        .collect();

    let normalized = read_input(gq_file, &pair.codes)?;
    let engine = MappingEngine::new(&pair);
    let outcome = engine.map_skipping(flavor, &normalized.mapping, &rejected);

    if !outcome.is_complete() && !cli.allow_partial {
        return Err(CliError::Mapping {
            errors: outcome.errors,
        });
    }

    write_report(output, &outcome.points)?;

    if cli.quiet {
        return Ok(());
    }
    match cli.format {
        OutputFormat::Text => {
            for err in &outcome.errors {
                eprintln!("skipped: {}", err);
            }
            println!(
                "generated {} report: {} ({} data points)",
                flavor.short_name().to_uppercase(),
                output.display(),
                outcome.points.len()
            );
            if cli.verbose {
                println!();
                println!(
                    "Input: {} codes from {} rows (code column '{}', value column '{}')",
                    normalized.mapping.len(),
                    normalized.rows_read,
                    normalized.code_column,
                    normalized.value_column
                );
                print_summary(&outcome);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "report_type": flavor.short_name(),
                "flavor": flavor,
                "output": output.display().to_string(),
                "data_points": outcome.points.len(),
                "total": outcome.total(),
                "top_values": top_values(&outcome)
                    .iter()
                    .map(|p| serde_json::json!({ "output_code": p.output_code, "value": p.value }))
                    .collect::<Vec<_>>(),
                "input": {
                    "codes": normalized.mapping.len(),
                    "code_column": normalized.code_column,
                    "value_column": normalized.value_column,
                    "rows_read": normalized.rows_read,
                    "skipped_invalid": normalized.skipped_invalid,
                    "skipped_unknown": normalized.skipped_unknown,
                    "duplicate_codes": normalized.overwritten,
                },
                "issues": issues,
                "errors": outcome.errors,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Points with the largest absolute values, largest first; ties keep rule
/// order.
fn top_values(outcome: &MappingOutcome) -> Vec<&OutputDataPoint> {
    let mut points: Vec<_> = outcome.points.iter().collect();
    points.sort_by(|a, b| b.value.abs().cmp(&a.value.abs()));
    points.truncate(SUMMARY_TOP);
    points
}

fn print_summary(outcome: &MappingOutcome) {
    println!("Summary:");
    println!("  data points: {}", outcome.points.len());
    println!("  total value: {}", outcome.total());
    let top = top_values(outcome);
    if top.is_empty() {
        return;
    }
    println!("  top {} values:", top.len());
    let width = top.iter().map(|p| p.output_code.len()).max().unwrap_or(0);
    for p in top {
        println!("    {:<width$}  {}", p.output_code, p.value, width = width);
    }
}
