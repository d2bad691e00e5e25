// listsift - core/normalize.rs
//
// Column reconciliation against a mode profile, provenance tagging, and
// numeric coercion of impure string columns.
//
// After `reconcile_columns` every logical field the mode declares exists
// on every row; after `coerce_numeric` under the zero/median policies the
// column is fully numeric. Downstream steps rely on both guarantees and
// never re-check.

use crate::core::mode::ModeProfile;
use crate::core::model::{Cell, Table};
use crate::util::constants;
use regex::Regex;
use std::borrow::Cow;

// =============================================================================
// Cleaning rules
// =============================================================================

/// How a raw string is scrubbed before the numeric parse attempt.
#[derive(Debug, Clone)]
pub enum CleanRule {
    /// Trim surrounding whitespace only.
    None,

    /// Drop a trailing percent sign: "2.5%" -> "2.5".
    StripPercent,

    /// Drop every character outside `[0-9.]`: "Rp 15.000" -> "15.000".
    /// Dots survive, so Indonesian-style thousands grouping parses as a
    /// decimal point; sources known to group with dots should use
    /// `DecimalComma` instead.
    DigitsAndDot,

    /// Drop currency artifacts and dot grouping, then treat the comma as
    /// the decimal mark: "Rp 1.234,56" -> "1234.56".
    DecimalComma,

    /// Remove every match of a custom pattern.
    Pattern(Regex),
}

impl CleanRule {
    /// Scrub `raw` per this rule. Never fails; an unparsable result is the
    /// fallback policy's problem.
    pub fn apply<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        match self {
            CleanRule::None => Cow::Borrowed(raw.trim()),
            CleanRule::StripPercent => Cow::Borrowed(raw.trim().trim_end_matches('%').trim_end()),
            CleanRule::DigitsAndDot => Cow::Owned(
                raw.chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect(),
            ),
            CleanRule::DecimalComma => {
                let kept: String = raw
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
                    .collect();
                Cow::Owned(kept.replace('.', "").replace(',', "."))
            }
            CleanRule::Pattern(re) => match re.replace_all(raw, "") {
                Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
                Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
            },
        }
    }
}

// =============================================================================
// Fallback rules
// =============================================================================

/// What a numeric cell becomes when the cleaned string fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRule {
    /// Substitute 0.
    Zero,

    /// Substitute the median of the values in the same column that did
    /// parse; zero when none did.
    Median,

    /// Leave the cell as an explicit `Missing` marker.
    Keep,
}

// =============================================================================
// Column reconciliation
// =============================================================================

/// Reconcile a freshly parsed table against the mode's declared columns.
///
/// For each logical field (the identity key, every numeric field, and the
/// optional store field) the first alias column present in the table is
/// renamed to its canonical spelling. Fields with no alias present are
/// appended, filled with the field default on every row, and reported in
/// the returned list of backfilled canonical names; the caller decides
/// whether that is a warning or (strict mode) grounds to abort the run.
///
/// Columns the mode does not declare are left untouched; they ride along
/// into the exports.
///
/// Key cells that are empty after reconciliation receive the mode's
/// placeholder, so every record leaves here with exactly one key value.
pub fn reconcile_columns(table: &mut Table, mode: &ModeProfile) -> Vec<String> {
    let mut backfilled = Vec::new();

    // Identity key first.
    let key_idx = match find_alias(table, &mode.key.columns) {
        Some(idx) => {
            table.rename_column(idx, &mode.key.columns[0]);
            idx
        }
        None => {
            backfilled.push(mode.key.columns[0].clone());
            table.add_column(&mode.key.columns[0], Cell::Text(mode.key.missing.clone()))
        }
    };

    // Blank keys get the placeholder too.
    for row in 0..table.len() {
        let blank = match table.cell(row, key_idx) {
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Missing => true,
            Cell::Number(_) => false,
        };
        if blank {
            table.set_cell(row, key_idx, Cell::Text(mode.key.missing.clone()));
        }
    }

    for field in &mode.fields {
        match find_alias(table, &field.columns) {
            Some(idx) => table.rename_column(idx, &field.columns[0]),
            None => {
                backfilled.push(field.columns[0].clone());
                table.add_column(&field.columns[0], Cell::Number(field.default));
            }
        }
    }

    if let Some(store) = &mode.store {
        match find_alias(table, &store.columns) {
            Some(idx) => table.rename_column(idx, &store.columns[0]),
            None => {
                backfilled.push(store.columns[0].clone());
                table.add_column(&store.columns[0], Cell::Text(String::new()));
            }
        }
    }

    backfilled
}

/// First alias present in the table, in alias order.
fn find_alias(table: &Table, aliases: &[String]) -> Option<usize> {
    aliases.iter().find_map(|a| table.column_index(a))
}

/// Add or overwrite the provenance column with `source_name` on every row.
pub fn tag_provenance(table: &mut Table, source_name: &str) {
    let cell = Cell::Text(source_name.to_string());
    match table.column_index(constants::SOURCE_COLUMN) {
        Some(idx) => {
            for row in 0..table.len() {
                table.set_cell(row, idx, cell.clone());
            }
        }
        None => {
            table.add_column(constants::SOURCE_COLUMN, cell);
        }
    }
}

// =============================================================================
// Numeric coercion
// =============================================================================

/// Coerce `column` to numbers: clean each raw string per `clean`, parse,
/// and resolve failures per `fallback`.
///
/// Two passes so the median fallback sees every successfully parsed value
/// in the column. Never errors; under `Zero`/`Median` the column is fully
/// numeric afterwards.
pub fn coerce_numeric(table: &mut Table, column: &str, clean: &CleanRule, fallback: FallbackRule) {
    let Some(col) = table.column_index(column) else {
        // Reconciliation guarantees declared columns exist; tolerate the
        // impossible rather than panic.
        tracing::warn!(column, "coerce_numeric: column not present, skipped");
        return;
    };

    let mut parsed: Vec<Option<f64>> = Vec::with_capacity(table.len());
    let mut successes: Vec<f64> = Vec::new();

    for row in 0..table.len() {
        let value = match table.cell(row, col) {
            Cell::Number(n) => Some(*n),
            Cell::Missing => None,
            Cell::Text(raw) => clean.apply(raw).parse::<f64>().ok().filter(|n| n.is_finite()),
        };
        if let Some(n) = value {
            successes.push(n);
        }
        parsed.push(value);
    }

    let median = median_of(&mut successes);

    for (row, value) in parsed.into_iter().enumerate() {
        let cell = match value {
            Some(n) => Cell::Number(n),
            None => match fallback {
                FallbackRule::Zero => Cell::Number(0.0),
                FallbackRule::Median => Cell::Number(median),
                FallbackRule::Keep => Cell::Missing,
            },
        };
        table.set_cell(row, col, cell);
    }
}

/// Median of the parsed values; the mean of the two middle values for an
/// even count, zero for an empty slice.
fn median_of(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mode::tests::test_mode;

    fn text_table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut table = Table::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.push_row(row.iter().map(|v| Cell::Text(v.to_string())).collect());
        }
        table
    }

    // -------------------------------------------------------------------------
    // Cleaning rules
    // -------------------------------------------------------------------------

    #[test]
    fn test_strip_percent() {
        assert_eq!(CleanRule::StripPercent.apply("2.5%"), "2.5");
        assert_eq!(CleanRule::StripPercent.apply(" 10% "), "10");
        assert_eq!(CleanRule::StripPercent.apply("3"), "3");
    }

    #[test]
    fn test_digits_and_dot_keeps_grouping_dots() {
        // The documented ambiguity: "Rp 15.000" cleans to "15.000" and will
        // parse as 15.0, not fifteen thousand.
        assert_eq!(CleanRule::DigitsAndDot.apply("Rp 15.000"), "15.000");
        assert_eq!(CleanRule::DigitsAndDot.apply("$1,299"), "1299");
    }

    #[test]
    fn test_decimal_comma_drops_grouping() {
        assert_eq!(CleanRule::DecimalComma.apply("Rp 15.000"), "15000");
        assert_eq!(CleanRule::DecimalComma.apply("1.234,56"), "1234.56");
    }

    #[test]
    fn test_custom_pattern() {
        let rule = CleanRule::Pattern(Regex::new(r"[^\d.]").unwrap());
        assert_eq!(rule.apply("Rp 15.000"), "15.000");
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    #[test]
    fn test_reconcile_renames_alias_to_canonical() {
        let mode = test_mode();
        let mut table = text_table(
            &["Product Link", "Harga", "Stock", "Terjual(Bulanan)", "Komisi(%)", "Komisi(Rp)"],
            &[&["http://a", "100", "5", "2", "1%", "10"]],
        );
        let backfilled = reconcile_columns(&mut table, &mode);
        assert!(backfilled.is_empty());
        // "Product Link" is the second alias of the key; it takes the
        // canonical first-alias spelling.
        assert!(table.column_index("Link Produk").is_some());
        assert!(table.column_index("Product Link").is_none());
    }

    #[test]
    fn test_reconcile_backfills_missing_column() {
        let mode = test_mode();
        let mut table = text_table(
            &["Link Produk", "Harga", "Stock", "Terjual(Bulanan)", "Komisi(%)"],
            &[&["http://a", "100", "5", "2", "1%"]],
        );
        let backfilled = reconcile_columns(&mut table, &mode);
        assert_eq!(backfilled, vec!["Komisi(Rp)".to_string()]);
        let idx = table.column_index("Komisi(Rp)").unwrap();
        assert_eq!(table.cell(0, idx), &Cell::Number(0.0));
    }

    #[test]
    fn test_reconcile_substitutes_key_placeholder() {
        let mode = test_mode();
        let mut table = text_table(
            &["Harga", "Stock", "Terjual(Bulanan)", "Komisi(%)", "Komisi(Rp)"],
            &[&["100", "5", "2", "1%", "10"]],
        );
        let backfilled = reconcile_columns(&mut table, &mode);
        assert!(backfilled.contains(&"Link Produk".to_string()));
        let idx = table.column_index("Link Produk").unwrap();
        assert_eq!(
            table.cell(0, idx),
            &Cell::Text("Link tidak tersedia".to_string())
        );
    }

    #[test]
    fn test_reconcile_fills_blank_key_cells() {
        let mode = test_mode();
        let mut table = text_table(
            &["Link Produk", "Harga", "Stock", "Terjual(Bulanan)", "Komisi(%)", "Komisi(Rp)"],
            &[&["  ", "100", "5", "2", "1%", "10"]],
        );
        reconcile_columns(&mut table, &mode);
        let idx = table.column_index("Link Produk").unwrap();
        assert_eq!(
            table.cell(0, idx),
            &Cell::Text("Link tidak tersedia".to_string())
        );
    }

    #[test]
    fn test_reconcile_leaves_undeclared_columns_alone() {
        let mode = test_mode();
        let mut table = text_table(
            &["Link Produk", "Harga", "Stock", "Terjual(Bulanan)", "Komisi(%)", "Komisi(Rp)", "Nama Produk"],
            &[&["a", "1", "2", "3", "4", "5", "Widget"]],
        );
        reconcile_columns(&mut table, &mode);
        assert!(table.column_index("Nama Produk").is_some());
    }

    // -------------------------------------------------------------------------
    // Provenance
    // -------------------------------------------------------------------------

    #[test]
    fn test_tag_provenance_adds_and_overwrites() {
        let mut table = text_table(&["a"], &[&["1"], &["2"]]);
        tag_provenance(&mut table, "first.txt");
        let idx = table.column_index(constants::SOURCE_COLUMN).unwrap();
        assert_eq!(table.cell(1, idx), &Cell::Text("first.txt".to_string()));

        tag_provenance(&mut table, "second.txt");
        assert_eq!(table.cell(0, idx), &Cell::Text("second.txt".to_string()));
        // No duplicate column.
        assert_eq!(
            table.columns().iter().filter(|c| *c == constants::SOURCE_COLUMN).count(),
            1
        );
    }

    // -------------------------------------------------------------------------
    // Coercion
    // -------------------------------------------------------------------------

    #[test]
    fn test_coerce_zero_fallback_is_fully_numeric() {
        let mut table = text_table(
            &["Harga"],
            &[&["Rp 15.000"], &[""], &["abc"], &["200"], &["1.5"]],
        );
        coerce_numeric(&mut table, "Harga", &CleanRule::DigitsAndDot, FallbackRule::Zero);
        for row in 0..table.len() {
            assert!(table.cell(row, 0).as_number().is_some());
        }
        assert_eq!(table.cell(0, 0), &Cell::Number(15.0));
        assert_eq!(table.cell(1, 0), &Cell::Number(0.0));
        assert_eq!(table.cell(3, 0), &Cell::Number(200.0));
    }

    #[test]
    fn test_coerce_percent_strings() {
        let mut table = text_table(&["Komisi(%)"], &[&["2.5%"], &["10%"]]);
        coerce_numeric(
            &mut table,
            "Komisi(%)",
            &CleanRule::StripPercent,
            FallbackRule::Zero,
        );
        assert_eq!(table.cell(0, 0), &Cell::Number(2.5));
        assert_eq!(table.cell(1, 0), &Cell::Number(10.0));
    }

    #[test]
    fn test_coerce_median_fallback() {
        let mut table = text_table(&["Stock"], &[&["10"], &["x"], &["20"], &["40"]]);
        coerce_numeric(&mut table, "Stock", &CleanRule::None, FallbackRule::Median);
        // Parsed values 10, 20, 40 -> median 20.
        assert_eq!(table.cell(1, 0), &Cell::Number(20.0));
    }

    #[test]
    fn test_coerce_median_with_no_parsed_values_uses_zero() {
        let mut table = text_table(&["Stock"], &[&["x"], &["y"]]);
        coerce_numeric(&mut table, "Stock", &CleanRule::None, FallbackRule::Median);
        assert_eq!(table.cell(0, 0), &Cell::Number(0.0));
        assert_eq!(table.cell(1, 0), &Cell::Number(0.0));
    }

    #[test]
    fn test_coerce_keep_fallback_leaves_missing_marker() {
        let mut table = text_table(&["Rating"], &[&["4.8"], &["-"]]);
        coerce_numeric(&mut table, "Rating", &CleanRule::None, FallbackRule::Keep);
        assert_eq!(table.cell(0, 0), &Cell::Number(4.8));
        assert!(table.cell(1, 0).is_missing());
    }

    #[test]
    fn test_median_even_count_averages_middle_pair() {
        assert_eq!(median_of(&mut [1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median_of(&mut [3.0, 1.0]), 2.0);
        assert_eq!(median_of(&mut []), 0.0);
    }
}
