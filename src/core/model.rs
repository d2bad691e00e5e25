// listsift - core/model.rs
//
// Core data model types. Pure data definitions with no I/O, no CLI,
// no platform dependencies.
//
// These types are the shared vocabulary across all layers.

use serde::Serialize;
use std::path::PathBuf;

// =============================================================================
// Cell (one value in a table)
// =============================================================================

/// A single table value.
///
/// Ingestion produces `Text` for every field; numeric coercion rewrites
/// declared numeric columns to `Number`. `Missing` marks a value that failed
/// numeric parsing under the `keep` fallback policy.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    /// Numeric view of the cell. `Text` is not implicitly parsed; coercion
    /// is an explicit pipeline step.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Render the cell for display and CSV export.
    ///
    /// Numbers print without a trailing `.0` (15000.0 renders as "15000"),
    /// matching how the values appeared in the source exports.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format!("{n}"),
            Cell::Missing => String::new(),
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// =============================================================================
// Table
// =============================================================================

/// An in-memory table: ordered column names plus rows of cells.
///
/// Every row has exactly `columns.len()` cells; the parser discards rows
/// that would violate this, so the invariant holds from construction on.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of data rows (the header is not a row).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row. The caller guarantees the width matches; this is
    /// checked in debug builds only since the parser already enforces it.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width mismatch");
        self.rows.push(row);
    }

    /// Append a new column filled with `fill` on every existing row.
    /// Returns the new column's index.
    pub fn add_column(&mut self, name: &str, fill: Cell) -> usize {
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        self.columns.len() - 1
    }

    /// Rename the column at `idx`.
    pub fn rename_column(&mut self, idx: usize, to: &str) {
        self.columns[idx] = to.to_string();
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: Cell) {
        self.rows[row][col] = value;
    }

    /// Shuffle row order in place using the provided RNG. Row contents are
    /// untouched; only the ordering changes.
    pub fn shuffle_rows<R: rand::Rng + ?Sized>(&mut self, rng: &mut R) {
        use rand::seq::SliceRandom;
        self.rows.shuffle(rng);
    }

    /// Split the table into (matching, non-matching) by a row predicate,
    /// preserving row order within each half. Both halves share this
    /// table's column set.
    pub fn partition<F>(self, mut pred: F) -> (Table, Table)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let mut matching = Table::new(self.columns.clone());
        let mut rest = Table::new(self.columns);
        for row in self.rows {
            if pred(&row) {
                matching.rows.push(row);
            } else {
                rest.rows.push(row);
            }
        }
        (matching, rest)
    }
}

// =============================================================================
// Status label
// =============================================================================

/// Categorical sales-trend bucket derived from the trend percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusLabel {
    Trending,
    Stable,
    Declining,
    NewProduct,
}

impl StatusLabel {
    /// Human-readable label, written verbatim into exports.
    pub fn label(&self) -> &'static str {
        match self {
            StatusLabel::Trending => "Trending",
            StatusLabel::Stable => "Stable",
            StatusLabel::Declining => "Declining",
            StatusLabel::NewProduct => "New product",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Per-file report
// =============================================================================

/// Outcome of reading and parsing one input file.
///
/// A failed file sets `error` and contributes nothing to the combined
/// table; the run continues with the remaining files.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path of the input file.
    pub path: PathBuf,

    /// Data rows parsed from this file.
    pub rows: usize,

    /// Rows skipped for having the wrong field count.
    pub malformed_skipped: usize,

    /// Delimiter used (fixed or sniffed). `None` when the file failed
    /// before a delimiter was settled.
    pub delimiter: Option<char>,

    /// Isolating error, rendered for display. `None` on success.
    pub error: Option<String>,
}

// =============================================================================
// Run summary
// =============================================================================

/// Arithmetic mean of one configured column over the passing set.
/// `mean` is `None` when the passing set is empty.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnMean {
    pub column: String,
    pub mean: Option<f64>,
}

/// Summary statistics for a completed run. All values are derived and
/// informational; the authoritative outputs are the two result tables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Input files that contributed rows.
    pub files_read: usize,

    /// Input files excluded by per-file errors.
    pub files_failed: usize,

    /// Total records ingested across all files, before deduplication.
    pub total_ingested: usize,

    /// Records remaining after deduplication by the identity key.
    pub unique_records: usize,

    /// Records dropped by deduplication.
    pub duplicates_removed: usize,

    /// Records matching every active filter.
    pub passing: usize,

    /// Records failing at least one filter.
    pub rejected: usize,

    /// Whether filtering was active for this run.
    pub filters_enabled: bool,

    /// Mode-specific column means over the passing set.
    pub means: Vec<ColumnMean>,

    /// Wall-clock run duration in milliseconds.
    pub duration_ms: u64,
}

// =============================================================================
// Run progress (observational)
// =============================================================================

/// Progress notifications emitted during a run.
///
/// Purely observational: the pipeline behaves identically whether or not
/// the caller inspects these.
#[derive(Debug, Clone)]
pub enum RunProgress {
    /// Reading and parsing has started.
    Started { total_files: usize },

    /// One file finished parsing.
    FileParsed {
        path: PathBuf,
        rows: usize,
        files_completed: usize,
        total_files: usize,
    },

    /// One file was excluded by a per-file error.
    FileFailed {
        path: PathBuf,
        files_completed: usize,
        total_files: usize,
    },

    /// All per-file tables were concatenated.
    Combined { total_rows: usize },

    /// Deduplication finished.
    Deduplicated { unique: usize, removed: usize },

    /// Filtering finished.
    Filtered { passing: usize, rejected: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_cell_renders_without_trailing_zero() {
        assert_eq!(Cell::Number(15000.0).render(), "15000");
        assert_eq!(Cell::Number(2.5).render(), "2.5");
        assert_eq!(Cell::Number(0.0).render(), "0");
    }

    #[test]
    fn test_missing_cell_renders_empty() {
        assert_eq!(Cell::Missing.render(), "");
    }

    #[test]
    fn test_add_column_backfills_existing_rows() {
        let mut table = Table::new(vec!["a".into()]);
        table.push_row(vec![Cell::Text("1".into())]);
        table.push_row(vec![Cell::Text("2".into())]);

        let idx = table.add_column("b", Cell::Number(0.0));
        assert_eq!(idx, 1);
        assert_eq!(table.cell(0, 1), &Cell::Number(0.0));
        assert_eq!(table.cell(1, 1), &Cell::Number(0.0));
    }

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        let mut table = Table::new(vec!["n".into()]);
        for i in 0..10 {
            table.push_row(vec![Cell::Number(i as f64)]);
        }

        let (even, odd) = table.partition(|row| {
            row[0].as_number().map(|n| n as i64 % 2 == 0).unwrap_or(false)
        });
        assert_eq!(even.len() + odd.len(), 10);
        assert_eq!(even.len(), 5);
        assert_eq!(even.columns(), odd.columns());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(StatusLabel::Trending.label(), "Trending");
        assert_eq!(StatusLabel::NewProduct.label(), "New product");
    }
}
