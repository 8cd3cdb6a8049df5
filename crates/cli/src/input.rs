//! Input normalizer: GQ return file -> [`InputMapping`].
//!
//! Reads a CSV file or the first worksheet of an `.xlsx` workbook. Locates
//! a code column and a value column by header name, falling back to the
//! first two columns, and keeps only rows whose code is a positive integer
//! defined in the code catalogue.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use calamine::{open_workbook, Data, Reader, Xlsx, XlsxError};
use gqmap_core::{CodeCatalogue, InputDataItem, InputMapping};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Header substrings that identify the value column.
const VALUE_HEADERS: [&str; 4] = ["value", "amount", "balance", "total"];

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("GQ file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("cannot read GQ file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported input format '{extension}' for {}; expected .csv or .xlsx", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot read spreadsheet {}: {source}", .path.display())]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },

    #[error("spreadsheet {} has no worksheets", .path.display())]
    NoWorksheet { path: PathBuf },

    #[error("unable to identify code and value columns in {}: need at least two columns", .path.display())]
    NoColumns { path: PathBuf },
}

/// The normalized mapping plus what was discarded on the way.
#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub mapping: InputMapping,
    pub code_column: String,
    pub value_column: String,
    pub rows_read: usize,
    /// Rows whose code or value could not be parsed.
    pub skipped_invalid: usize,
    /// Rows whose code is not in the code catalogue.
    pub skipped_unknown: usize,
    /// Codes seen more than once; the last value was kept.
    pub overwritten: Vec<u32>,
}

/// Read and normalize a GQ return file, dispatching on its extension.
pub fn read_input(path: &Path, codes: &CodeCatalogue) -> Result<NormalizedInput, InputError> {
    if !path.exists() {
        return Err(InputError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "csv" => {
            let file = File::open(path).map_err(|source| InputError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            normalize(file, path, codes)
        }
        "xlsx" => normalize_xlsx(path, codes),
        _ => Err(InputError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        }),
    }
}

/// Normalize CSV text from any reader. `path` is used only in errors.
pub fn normalize<R: io::Read>(
    reader: R,
    path: &Path,
    codes: &CodeCatalogue,
) -> Result<NormalizedInput, InputError> {
    let csv_err = |source| InputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_owned)
        .collect();
    let rows = rdr
        .into_records()
        .map(|r| r.map(|rec| rec.iter().map(str::to_owned).collect()).map_err(csv_err));
    normalize_rows(headers, rows, path, codes)
}

/// Normalize the first worksheet of an `.xlsx` workbook. The first row is
/// the header.
pub fn normalize_xlsx(path: &Path, codes: &CodeCatalogue) -> Result<NormalizedInput, InputError> {
    let sheet_err = |source| InputError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook: Xlsx<_> = open_workbook(path).map_err(sheet_err)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| InputError::NoWorksheet {
            path: path.to_path_buf(),
        })?
        .map_err(sheet_err)?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    normalize_rows(headers, rows.map(Ok), path, codes)
}

/// Cell contents as the text a CSV export would hold.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_owned(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// Shared row handling for every input format.
fn normalize_rows<I>(
    headers: Vec<String>,
    rows: I,
    path: &Path,
    codes: &CodeCatalogue,
) -> Result<NormalizedInput, InputError>
where
    I: Iterator<Item = Result<Vec<String>, InputError>>,
{
    let (code_idx, value_idx) = detect_columns(&headers).ok_or_else(|| InputError::NoColumns {
        path: path.to_path_buf(),
    })?;
    tracing::debug!(
        code_column = %headers[code_idx],
        value_column = %headers[value_idx],
        "detected input columns"
    );

    let mut out = NormalizedInput {
        code_column: headers[code_idx].clone(),
        value_column: headers[value_idx].clone(),
        ..NormalizedInput::default()
    };
    let mut items = Vec::new();

    for (i, record) in rows.enumerate() {
        let record = record?;
        out.rows_read += 1;
        // header is line 1
        let line = i + 2;

        let code = record.get(code_idx).and_then(|c| parse_code(c));
        let value = record
            .get(value_idx)
            .map_or(Some(Decimal::ZERO), |v| parse_value(v));
        let (code, value) = match (code, value) {
            (Some(c), Some(v)) => (c, v),
            _ => {
                tracing::debug!(line, "skipping row with non-numeric code or value");
                out.skipped_invalid += 1;
                continue;
            }
        };

        if !codes.contains(code) {
            tracing::debug!(line, code, "skipping code not in the code catalogue");
            out.skipped_unknown += 1;
            continue;
        }
        items.push(InputDataItem { code, value });
    }

    let (mapping, overwritten) = InputMapping::from_items(items);
    out.mapping = mapping;
    out.overwritten = overwritten;

    if out.skipped_invalid > 0 {
        tracing::warn!(
            rows = out.skipped_invalid,
            "skipped rows with a non-numeric code or value"
        );
    }
    if out.skipped_unknown > 0 {
        tracing::warn!(
            rows = out.skipped_unknown,
            "skipped rows whose code is not in the code catalogue"
        );
    }
    for code in &out.overwritten {
        tracing::warn!(code, "duplicate code in input; keeping the later value");
    }
    tracing::info!(
        codes = out.mapping.len(),
        rows = out.rows_read,
        "normalized input"
    );
    Ok(out)
}

/// Pick (code column, value column) indexes from the header row.
fn detect_columns(headers: &[String]) -> Option<(usize, usize)> {
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let code = lower.iter().position(|h| h.contains("code"));
    let value = lower
        .iter()
        .enumerate()
        .position(|(i, h)| Some(i) != code && VALUE_HEADERS.iter().any(|t| h.contains(t)));

    match (code, value) {
        (Some(c), Some(v)) => Some((c, v)),
        _ if headers.len() >= 2 => Some((0, 1)),
        _ => None,
    }
}

/// Accepts `6` and spreadsheet-style `6.0`; rejects zero, negatives and
/// fractions.
fn parse_code(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return (n > 0).then_some(n);
    }
    let d = Decimal::from_str(raw).ok()?;
    if !d.fract().is_zero() || d <= Decimal::ZERO {
        return None;
    }
    d.to_u32()
}

/// Blank and NaN cells are zero, matching how an empty spreadsheet cell
/// reads. Scientific notation is accepted.
fn parse_value(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(Decimal::ZERO);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
