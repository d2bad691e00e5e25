// listsift - core/export.rs
//
// CSV export of result tables and JSON export of the run summary.
// Core layer: writes to any Write trait object.

use crate::core::model::{RunSummary, Table};
use crate::util::constants;
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

/// Export a table to CSV: header row, then every row with all columns,
/// derived ones included. Output is always comma-delimited regardless of
/// the input delimiter.
///
/// Returns the number of data rows written.
pub fn export_csv<W: Write>(
    table: &Table,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(table.columns())
        .map_err(|e| ExportError::Csv {
            path: export_path.to_path_buf(),
            source: e,
        })?;

    let mut count = 0;
    for row in table.rows() {
        csv_writer
            .write_record(row.iter().map(|cell| cell.render()))
            .map_err(|e| ExportError::Csv {
                path: export_path.to_path_buf(),
                source: e,
            })?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(count)
}

/// Export the run summary as pretty-printed JSON.
pub fn export_summary_json<W: Write>(
    summary: &RunSummary,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, summary).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })
}

/// Strip characters that are illegal in file names on the supported
/// platforms, plus control characters, and trim surrounding whitespace.
/// A name that sanitises to nothing falls back to the default passing
/// export name so the write always has a target.
pub fn sanitise_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !constants::FILENAME_ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        constants::DEFAULT_PASSING_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
