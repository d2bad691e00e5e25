// listsift - core/table.rs
//
// Whole-table operations: concatenation of per-file tables, identity-key
// deduplication, and randomised ordering.

use crate::core::model::{Cell, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

/// Row-wise union of the per-file tables, preserving file order and then
/// original row order within each file.
///
/// The column set is the first-seen-order union of every input's columns;
/// a row from a table lacking some unioned column gets `Missing` there.
/// Declared mode columns are already reconciled per file, so only
/// undeclared ride-along columns ever differ.
pub fn concatenate(tables: Vec<Table>) -> Table {
    let mut columns: Vec<String> = Vec::new();
    for table in &tables {
        for col in table.columns() {
            if !columns.contains(col) {
                columns.push(col.clone());
            }
        }
    }

    let mut combined = Table::new(columns.clone());
    for table in tables {
        // Map each combined column to its index in this table, if present.
        let mapping: Vec<Option<usize>> =
            columns.iter().map(|c| table.column_index(c)).collect();

        for row in table.rows() {
            let cells = mapping
                .iter()
                .map(|m| match m {
                    Some(idx) => row[*idx].clone(),
                    None => Cell::Missing,
                })
                .collect();
            combined.push_row(cells);
        }
    }
    combined
}

/// Keep the first row seen for each distinct value of `key_column`,
/// preserving first-occurrence order. Returns the deduplicated table and
/// the number of rows dropped.
///
/// Idempotent: a second pass over the result drops nothing.
pub fn deduplicate(table: Table, key_column: &str) -> (Table, usize) {
    let Some(key_idx) = table.column_index(key_column) else {
        // Reconciliation guarantees the key column; tolerate its absence
        // as "nothing to collapse".
        tracing::warn!(column = key_column, "deduplicate: key column not present");
        return (table, 0);
    };

    let mut seen: HashSet<String> = HashSet::new();
    let before = table.len();
    let (kept, _) = table.partition(|row| seen.insert(row[key_idx].render()));
    let removed = before - kept.len();

    tracing::debug!(unique = kept.len(), removed, "Deduplicated by key");
    (kept, removed)
}

/// Uniformly random permutation of the rows, for display/export ordering
/// only. A fixed `seed` makes the permutation reproducible.
pub fn shuffle(table: &mut Table, seed: Option<u64>) {
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    table.shuffle_rows(&mut rng);
}
