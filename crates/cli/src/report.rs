//! CSV report writer.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gqmap_eval::OutputDataPoint;

pub const REPORT_HEADER: [&str; 4] = ["output_code", "value", "description", "formula"];

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cannot create report {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write report {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Write `points` to `path`, creating parent directories as needed.
pub fn write_report(path: &Path, points: &[OutputDataPoint]) -> Result<(), ReportError> {
    let io_err = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = fs::File::create(path).map_err(io_err)?;
    write_points(file, points).map_err(|source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), rows = points.len(), "report written");
    Ok(())
}

/// Header first, then one row per point in the given order. The header is
/// written even when there are no points.
pub fn write_points<W: io::Write>(writer: W, points: &[OutputDataPoint]) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(REPORT_HEADER)?;
    for point in points {
        wtr.serialize(point)?;
    }
    wtr.flush()?;
    Ok(())
}
