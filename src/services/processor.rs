//! The CSV transformation run by the `process_csv` task.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column added to every processed file.
pub const MARKER_COLUMN: &str = "processed";

/// Value written to [`MARKER_COLUMN`] in every row.
pub const MARKER_VALUE: &str = "True";

const PROCESSED_SUFFIX: &str = "_processed.csv";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No columns to parse from file")]
    NoColumns,

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Path the processed copy of `input` is written to.
///
/// Only the file name is rewritten: its final extension is replaced by
/// `_processed.csv`, so `exports.csv/data.CSV` becomes `exports.csv/data_processed.csv`.
pub fn processed_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}{PROCESSED_SUFFIX}"))
}

/// Reads `input`, sets [`MARKER_COLUMN`] to [`MARKER_VALUE`] on every row and writes the
/// result to `output`. Returns the number of data rows written.
///
/// An existing marker column is overwritten in place; otherwise it is appended.
pub fn annotate_csv(input: &Path, output: &Path) -> Result<usize, ProcessError> {
    let mut reader = csv::Reader::from_path(input)?;
    let mut headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ProcessError::NoColumns);
    }

    let marker_index = match headers.iter().position(|h| h == MARKER_COLUMN) {
        Some(index) => index,
        None => {
            headers.push_field(MARKER_COLUMN);
            headers.len() - 1
        }
    };

    // Parse fully first so a malformed file leaves no partial output behind
    let records = reader.records().collect::<Result<Vec<_>, _>>()?;

    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(&headers)?;
    for record in &records {
        let row: csv::StringRecord = if marker_index < record.len() {
            record
                .iter()
                .enumerate()
                .map(|(i, field)| if i == marker_index { MARKER_VALUE } else { field })
                .collect()
        } else {
            let mut row = record.clone();
            row.push_field(MARKER_VALUE);
            row
        };
        writer.write_record(&row)?;
    }
    writer.flush()?;

    Ok(records.len())
}
