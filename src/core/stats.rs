// listsift - core/stats.rs
//
// Run statistics. All values here are derived and informational; the two
// result tables are the authoritative output.

use crate::core::model::{ColumnMean, Table};

/// Arithmetic mean of a column's numeric values.
///
/// Returns `None` for an empty table, an absent column, or a column with
/// no numeric values; never a division failure.
pub fn column_mean(table: &Table, column: &str) -> Option<f64> {
    let idx = table.column_index(column)?;

    let mut sum = 0.0;
    let mut count = 0usize;
    for row in table.rows() {
        if let Some(n) = row[idx].as_number() {
            sum += n;
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Means of the mode's configured summary columns over the passing set.
pub fn passing_means(passing: &Table, columns: &[String]) -> Vec<ColumnMean> {
    columns
        .iter()
        .map(|column| ColumnMean {
            column: column.clone(),
            mean: column_mean(passing, column),
        })
        .collect()
}
