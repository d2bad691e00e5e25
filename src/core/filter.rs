// listsift - core/filter.rs
//
// Threshold filter engine over normalised tables.
// All active predicates are AND-combined.
// Core layer: pure logic, no I/O or CLI dependencies.

use crate::core::model::{Cell, Table};
use serde::Deserialize;

/// Inclusive numeric band: `min <= value <= max`, either bound optional.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Band {
    /// Inclusive lower bound. `None` = no lower bound.
    pub min: Option<f64>,

    /// Inclusive upper bound. `None` = no upper bound.
    pub max: Option<f64>,
}

impl Band {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |m| value >= m) && self.max.map_or(true, |m| value <= m)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// A band bound to a concrete table column.
#[derive(Debug, Clone)]
pub struct ColumnBand {
    pub column: String,
    pub band: Band,
}

/// Case-insensitive substring match on a store/location column.
#[derive(Debug, Clone)]
pub struct StoreMatch {
    pub column: String,
    pub needle: String,
}

/// Complete filter state for one run. All fields are AND-combined when
/// applied. Immutable once built; the engine never mutates it.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Master switch: false bypasses filtering entirely and the whole
    /// table passes.
    pub enabled: bool,

    /// Numeric bands, one per filtered column.
    pub bands: Vec<ColumnBand>,

    /// Optional store substring predicate.
    pub store: Option<StoreMatch>,
}

impl FilterConfig {
    /// Returns true if no predicate is active.
    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(|b| b.band.is_unbounded()) && self.store.is_none()
    }
}

/// Partition `table` into (passing, rejected) by the conjunction of all
/// active predicates.
///
/// With filtering disabled (or no active predicate) the entire table
/// passes and the rejected side is empty with the same column set. The
/// two results are always disjoint and together contain every input row.
pub fn apply_filters(table: Table, config: &FilterConfig) -> (Table, Table) {
    if !config.enabled || config.is_empty() {
        return table.partition(|_| true);
    }

    // Resolve column indices once. A band whose column is absent can only
    // arise from a mis-built config; it rejects every row rather than
    // panicking mid-partition.
    let bands: Vec<(Option<usize>, Band)> = config
        .bands
        .iter()
        .map(|b| {
            let idx = table.column_index(&b.column);
            if idx.is_none() {
                tracing::warn!(column = %b.column, "Filter column not present; no row can pass");
            }
            (idx, b.band)
        })
        .collect();

    let store = config.store.as_ref().map(|s| {
        let idx = table.column_index(&s.column);
        if idx.is_none() {
            tracing::warn!(column = %s.column, "Store column not present; no row can pass");
        }
        (idx, s.needle.to_lowercase())
    });

    table.partition(|row| matches_all(row, &bands, store.as_ref()))
}

/// Check if a single row matches all active predicates.
fn matches_all(
    row: &[Cell],
    bands: &[(Option<usize>, Band)],
    store: Option<&(Option<usize>, String)>,
) -> bool {
    for (idx, band) in bands {
        if band.is_unbounded() {
            continue;
        }
        let Some(idx) = idx else { return false };
        // A Missing cell (keep-fallback) has no numeric value and fails
        // any bounded band.
        match row[*idx].as_number() {
            Some(value) if band.contains(value) => {}
            _ => return false,
        }
    }

    if let Some((idx, needle)) = store {
        let Some(idx) = idx else { return false };
        if !row[*idx].render().to_lowercase().contains(needle.as_str()) {
            return false;
        }
    }

    true
}
