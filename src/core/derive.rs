// listsift - core/derive.rs
//
// Derived fields: the sales-trend percentage and its categorical status
// bucket.

use crate::core::model::{Cell, StatusLabel, Table};

/// Compute `round(100 * numerator / denominator, 2)` per row into
/// `output_col`, and when `status_col` is set, the status bucket beside
/// it.
///
/// A zero denominator is treated as 1, so a product with monthly sales
/// but no lifetime total reads as a straight percentage of the monthly
/// counter rather than a division failure. Non-numeric operands (possible
/// only under the keep fallback) count as 0.
pub fn derive_trend(
    table: &mut Table,
    numerator_col: &str,
    denominator_col: &str,
    output_col: &str,
    status_col: Option<&str>,
) {
    let num_idx = table.column_index(numerator_col);
    let den_idx = table.column_index(denominator_col);
    let (Some(num_idx), Some(den_idx)) = (num_idx, den_idx) else {
        tracing::warn!(
            numerator = numerator_col,
            denominator = denominator_col,
            "derive_trend: operand column not present, skipped"
        );
        return;
    };

    let out_idx = match table.column_index(output_col) {
        Some(idx) => idx,
        None => table.add_column(output_col, Cell::Number(0.0)),
    };
    let status_idx = status_col.map(|name| match table.column_index(name) {
        Some(idx) => idx,
        None => table.add_column(name, Cell::Missing),
    });

    for row in 0..table.len() {
        let numerator = table.cell(row, num_idx).as_number().unwrap_or(0.0);
        let denominator = table.cell(row, den_idx).as_number().unwrap_or(0.0);
        let denominator = if denominator == 0.0 { 1.0 } else { denominator };

        let trend = round2(100.0 * numerator / denominator);
        table.set_cell(row, out_idx, Cell::Number(trend));

        if let Some(status_idx) = status_idx {
            let label = classify_status(trend).label();
            table.set_cell(row, status_idx, Cell::Text(label.to_string()));
        }
    }
}

/// Bucket a trend percentage into its status label.
///
/// Total on the reals:
///   >= 10        Trending
///   >= 2, < 10   Stable
///   > 0, < 2     Declining
///   <= 0         New product
pub fn classify_status(trend: f64) -> StatusLabel {
    if trend >= 10.0 {
        StatusLabel::Trending
    } else if trend >= 2.0 {
        StatusLabel::Stable
    } else if trend > 0.0 {
        StatusLabel::Declining
    } else {
        StatusLabel::NewProduct
    }
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
