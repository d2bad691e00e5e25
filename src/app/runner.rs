// listsift - app/runner.rs
//
// Run lifecycle: reads each input file with isolated failures, then
// drives the core pipeline (reconcile, concatenate, deduplicate, coerce,
// derive, filter, summarise) synchronously on the calling thread.
//
// Per-file errors are values in the file reports, never aborts; the only
// run-level failures are misconfiguration and strict-mode reconciliation.

use crate::core::derive::derive_trend;
use crate::core::filter::{apply_filters, Band, ColumnBand, FilterConfig, StoreMatch};
use crate::core::mode::{Delimiter, MissingColumnPolicy, ModeProfile};
use crate::core::model::{FileReport, RunProgress, RunSummary, Table};
use crate::core::normalize::{coerce_numeric, reconcile_columns, tag_provenance};
use crate::core::reader;
use crate::core::stats;
use crate::core::table::{concatenate, deduplicate, shuffle};
use crate::util::constants;
use crate::util::error::{ParseError, Result, RunError};
use std::path::{Path, PathBuf};
use std::time::Instant;

// =============================================================================
// Options and outcome
// =============================================================================

/// Per-run options layered over the mode profile's defaults.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Master filter switch; false treats the whole table as passing.
    pub filters_enabled: bool,

    /// Lower-bound overrides by logical field name.
    pub min_overrides: Vec<(String, f64)>,

    /// Upper-bound overrides by logical field name.
    pub max_overrides: Vec<(String, f64)>,

    /// Substring match on the mode's store field.
    pub store_contains: Option<String>,

    /// Randomise the order of both result tables.
    pub shuffle: bool,

    /// Fixed shuffle seed for reproducible ordering.
    pub seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            filters_enabled: true,
            min_overrides: Vec::new(),
            max_overrides: Vec::new(),
            store_contains: None,
            shuffle: false,
            seed: None,
        }
    }
}

/// Everything a completed run produces.
#[derive(Debug)]
pub struct RunOutcome {
    /// Records matching every active filter.
    pub passing: Table,

    /// Records failing at least one filter.
    pub rejected: Table,

    /// Derived statistics.
    pub summary: RunSummary,

    /// Per-input-file reports, in input order.
    pub file_reports: Vec<FileReport>,

    /// Non-fatal warnings (backfilled columns, skipped rows).
    pub warnings: Vec<String>,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Process `files` under `mode` and `options`.
///
/// `progress` receives observational notifications; it has no effect on
/// control flow. The engine holds no state between runs, so re-invoking
/// with different options over the same files is always safe.
pub fn run<F>(
    files: &[PathBuf],
    mode: &ModeProfile,
    options: &RunOptions,
    mut progress: F,
) -> Result<RunOutcome>
where
    F: FnMut(RunProgress),
{
    let started = Instant::now();

    // Fail misconfiguration before any file is touched.
    let filter_config = build_filter_config(mode, options)?;
    let mean_columns = resolve_mean_columns(mode);

    tracing::info!(
        mode_id = %mode.id,
        files = files.len(),
        filters_enabled = filter_config.enabled,
        "Run started"
    );
    progress(RunProgress::Started {
        total_files: files.len(),
    });

    let mut tables: Vec<Table> = Vec::new();
    let mut file_reports: Vec<FileReport> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut strict_missing: Vec<String> = Vec::new();

    for (index, path) in files.iter().enumerate() {
        match ingest_file(path, mode) {
            Ok(ingested) => {
                for column in &ingested.backfilled {
                    let warning = format!(
                        "Column '{}' not found in {}; filled with its default",
                        column,
                        path.display()
                    );
                    tracing::warn!(file = %path.display(), column = %column, "Missing column backfilled");
                    warnings.push(warning);
                    if !strict_missing.contains(column) {
                        strict_missing.push(column.clone());
                    }
                }
                if ingested.report.malformed_skipped > 0 {
                    warnings.push(format!(
                        "{}: skipped {} malformed row(s)",
                        path.display(),
                        ingested.report.malformed_skipped
                    ));
                }
                progress(RunProgress::FileParsed {
                    path: path.clone(),
                    rows: ingested.table.len(),
                    files_completed: index + 1,
                    total_files: files.len(),
                });
                tables.push(ingested.table);
                file_reports.push(ingested.report);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Input file excluded");
                file_reports.push(FileReport {
                    path: path.clone(),
                    rows: 0,
                    malformed_skipped: 0,
                    delimiter: None,
                    error: Some(e.to_string()),
                });
                progress(RunProgress::FileFailed {
                    path: path.clone(),
                    files_completed: index + 1,
                    total_files: files.len(),
                });
            }
        }
    }

    // Strict reconciliation: any missing column across any file abandons
    // the run all-or-nothing, listing everything that was missing.
    if mode.on_missing == MissingColumnPolicy::Abort && !strict_missing.is_empty() {
        return Err(RunError::MissingColumns {
            mode_id: mode.id.clone(),
            columns: strict_missing,
        }
        .into());
    }

    let files_read = file_reports.iter().filter(|r| r.error.is_none()).count();
    let files_failed = file_reports.len() - files_read;

    let combined = concatenate(tables);
    let total_ingested = combined.len();
    progress(RunProgress::Combined {
        total_rows: total_ingested,
    });

    if combined.is_empty() {
        // Informational outcome, not an error: every file failed or the
        // inputs were header-only.
        tracing::warn!("Nothing to process");
        let (passing, rejected) = combined.partition(|_| true);
        let summary = RunSummary {
            files_read,
            files_failed,
            filters_enabled: filter_config.enabled,
            means: stats::passing_means(&passing, &mean_columns),
            duration_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        };
        return Ok(RunOutcome {
            passing,
            rejected,
            summary,
            file_reports,
            warnings,
        });
    }

    let (deduped, duplicates_removed) = deduplicate(combined, &mode.key.columns[0]);
    let unique_records = deduped.len();
    progress(RunProgress::Deduplicated {
        unique: unique_records,
        removed: duplicates_removed,
    });

    let mut working = deduped;
    for field in &mode.fields {
        coerce_numeric(&mut working, field.column(), &field.clean, field.fallback);
    }

    if let Some(spec) = &mode.derive {
        // Operands are validated as declared fields at mode compile time.
        let numerator = mode
            .field(&spec.numerator)
            .map(|f| f.column().to_string())
            .unwrap_or_default();
        let denominator = mode
            .field(&spec.denominator)
            .map(|f| f.column().to_string())
            .unwrap_or_default();
        derive_trend(
            &mut working,
            &numerator,
            &denominator,
            &spec.output,
            spec.status_output.as_deref(),
        );
    }

    let (mut passing, mut rejected) = apply_filters(working, &filter_config);
    progress(RunProgress::Filtered {
        passing: passing.len(),
        rejected: rejected.len(),
    });

    if options.shuffle {
        shuffle(&mut passing, options.seed);
        // Distinct stream for the rejected side so the two orderings are
        // independent even under a fixed seed.
        shuffle(&mut rejected, options.seed.map(|s| s.wrapping_add(1)));
    }

    let summary = RunSummary {
        files_read,
        files_failed,
        total_ingested,
        unique_records,
        duplicates_removed,
        passing: passing.len(),
        rejected: rejected.len(),
        filters_enabled: filter_config.enabled,
        means: stats::passing_means(&passing, &mean_columns),
        duration_ms: started.elapsed().as_millis() as u64,
    };

    tracing::info!(
        ingested = summary.total_ingested,
        unique = summary.unique_records,
        passing = summary.passing,
        rejected = summary.rejected,
        "Run complete"
    );

    Ok(RunOutcome {
        passing,
        rejected,
        summary,
        file_reports,
        warnings,
    })
}

// =============================================================================
// Per-file ingestion
// =============================================================================

struct Ingested {
    table: Table,
    report: FileReport,
    backfilled: Vec<String>,
}

/// Read, decode, parse, reconcile, and tag one input file.
/// Any error here excludes this file only.
fn ingest_file(path: &Path, mode: &ModeProfile) -> std::result::Result<Ingested, ParseError> {
    let metadata = std::fs::metadata(path).map_err(|e| ParseError::Io {
        file: path.to_path_buf(),
        source: e,
    })?;
    if metadata.len() > constants::MAX_INPUT_FILE_SIZE {
        return Err(ParseError::FileTooLarge {
            file: path.to_path_buf(),
            size: metadata.len(),
            max_size: constants::MAX_INPUT_FILE_SIZE,
        });
    }

    let bytes = std::fs::read(path).map_err(|e| ParseError::Io {
        file: path.to_path_buf(),
        source: e,
    })?;
    let content = reader::decode(bytes, path)?;

    let delimiter = match mode.delimiter {
        Delimiter::Fixed(d) => d,
        Delimiter::Auto => reader::sniff_delimiter(&content, path)?,
    };

    let parsed = reader::parse_table(&content, delimiter, path)?;
    let mut table = parsed.table;

    let backfilled = reconcile_columns(&mut table, mode);

    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    tag_provenance(&mut table, &source_name);

    Ok(Ingested {
        report: FileReport {
            path: path.to_path_buf(),
            rows: table.len(),
            malformed_skipped: parsed.malformed_skipped,
            delimiter: Some(parsed.delimiter as char),
            error: None,
        },
        table,
        backfilled,
    })
}

// =============================================================================
// Configuration assembly
// =============================================================================

/// Merge the mode's default thresholds with the run's overrides and
/// resolve logical names to concrete columns.
fn build_filter_config(mode: &ModeProfile, options: &RunOptions) -> Result<FilterConfig> {
    let mut bands: Vec<(String, Band)> = mode.thresholds.clone();

    for (field, value) in &options.min_overrides {
        if !mode.is_filterable(field) {
            return Err(RunError::UnknownThreshold {
                mode_id: mode.id.clone(),
                field: field.clone(),
            }
            .into());
        }
        match bands.iter_mut().find(|(f, _)| f == field) {
            Some((_, band)) => band.min = Some(*value),
            None => bands.push((
                field.clone(),
                Band {
                    min: Some(*value),
                    max: None,
                },
            )),
        }
    }

    for (field, value) in &options.max_overrides {
        if !mode.is_filterable(field) {
            return Err(RunError::UnknownThreshold {
                mode_id: mode.id.clone(),
                field: field.clone(),
            }
            .into());
        }
        match bands.iter_mut().find(|(f, _)| f == field) {
            Some((_, band)) => band.max = Some(*value),
            None => bands.push((
                field.clone(),
                Band {
                    min: None,
                    max: Some(*value),
                },
            )),
        }
    }

    let store = match &options.store_contains {
        Some(needle) => {
            let Some(spec) = &mode.store else {
                return Err(RunError::NoStoreField {
                    mode_id: mode.id.clone(),
                }
                .into());
            };
            Some(StoreMatch {
                column: spec.columns[0].clone(),
                needle: needle.clone(),
            })
        }
        None => None,
    };

    let bands = bands
        .into_iter()
        .map(|(logical, band)| ColumnBand {
            column: mode
                .column_of(&logical)
                .unwrap_or(logical.as_str())
                .to_string(),
            band,
        })
        .collect();

    Ok(FilterConfig {
        enabled: options.filters_enabled,
        bands,
        store,
    })
}

/// Canonical columns for the mode's summary means.
fn resolve_mean_columns(mode: &ModeProfile) -> Vec<String> {
    mode.summary_means
        .iter()
        .filter_map(|logical| mode.column_of(logical).map(|c| c.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mode::tests::test_mode;

    /// The worked two-file scenario: one file with product "a", a second
    /// with a duplicate "a" plus a failing "b".
    const FILE_A: &str = "Link Produk\tStock\tTerjual(Bulanan)\tHarga\tKomisi(%)\tKomisi(Rp)\n\
                          a\t20\t10\t15000\t3%\t300\n";
    const FILE_B: &str = "Link Produk\tStock\tTerjual(Bulanan)\tHarga\tKomisi(%)\tKomisi(Rp)\n\
                          a\t20\t10\t15000\t3%\t300\n\
                          b\t5\t2\t5000\t1%\t50\n";

    fn write_inputs(dir: &tempfile::TempDir, files: &[(&str, &str)]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, content)| {
                let path = dir.path().join(name);
                std::fs::write(&path, content).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_two_file_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("a.txt", FILE_A), ("b.txt", FILE_B)]);

        let outcome = run(&files, &test_mode(), &RunOptions::default(), |_| {}).unwrap();

        assert_eq!(outcome.summary.total_ingested, 3);
        assert_eq!(outcome.summary.unique_records, 2);
        assert_eq!(outcome.summary.duplicates_removed, 1);
        assert_eq!(outcome.summary.passing, 1);
        assert_eq!(outcome.summary.rejected, 1);

        let key_idx = outcome.passing.column_index("Link Produk").unwrap();
        assert_eq!(outcome.passing.cell(0, key_idx).render(), "a");
        assert_eq!(outcome.rejected.cell(0, key_idx).render(), "b");
    }

    #[test]
    fn test_passing_and_rejected_partition_the_dedup_table() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("a.txt", FILE_A), ("b.txt", FILE_B)]);

        let outcome = run(&files, &test_mode(), &RunOptions::default(), |_| {}).unwrap();
        assert_eq!(
            outcome.passing.len() + outcome.rejected.len(),
            outcome.summary.unique_records
        );
    }

    #[test]
    fn test_disabled_filters_pass_everything() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("b.txt", FILE_B)]);

        let options = RunOptions {
            filters_enabled: false,
            ..Default::default()
        };
        let outcome = run(&files, &test_mode(), &options, |_| {}).unwrap();
        assert_eq!(outcome.summary.passing, 2);
        assert_eq!(outcome.summary.rejected, 0);
        assert!(!outcome.summary.filters_enabled);
    }

    #[test]
    fn test_failed_file_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = write_inputs(&dir, &[("a.txt", FILE_A)]);
        let bad = dir.path().join("bad.txt");
        std::fs::write(&bad, [0xFF, 0xFE, 0x00, 0x41]).unwrap();
        files.push(bad);

        let outcome = run(&files, &test_mode(), &RunOptions::default(), |_| {}).unwrap();
        assert_eq!(outcome.summary.files_read, 1);
        assert_eq!(outcome.summary.files_failed, 1);
        assert_eq!(outcome.summary.passing, 1);
        assert!(outcome.file_reports[1].error.is_some());
    }

    #[test]
    fn test_missing_column_backfilled_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        // No Komisi(Rp) column at all.
        let content = "Link Produk\tStock\tTerjual(Bulanan)\tHarga\tKomisi(%)\n\
                       a\t20\t10\t15000\t3%\n";
        let files = write_inputs(&dir, &[("a.txt", content)]);

        let outcome = run(&files, &test_mode(), &RunOptions::default(), |_| {}).unwrap();
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("Komisi(Rp)")));
        // Backfilled zero fails the commission_rp >= 200 threshold.
        assert_eq!(outcome.summary.passing, 0);
        assert_eq!(outcome.summary.rejected, 1);
    }

    #[test]
    fn test_strict_mode_aborts_on_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let content = "Link Produk\tStock\tTerjual(Bulanan)\tHarga\tKomisi(%)\n\
                       a\t20\t10\t15000\t3%\n";
        let files = write_inputs(&dir, &[("a.txt", content)]);

        let mut mode = test_mode();
        mode.on_missing = MissingColumnPolicy::Abort;
        let result = run(&files, &mode, &RunOptions::default(), |_| {});
        assert!(matches!(
            result,
            Err(crate::util::error::ListSiftError::Run(
                RunError::MissingColumns { .. }
            ))
        ));
    }

    #[test]
    fn test_threshold_override_changes_partition() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("b.txt", FILE_B)]);

        // Lower every bound so product "b" passes too.
        let options = RunOptions {
            min_overrides: vec![
                ("stock".to_string(), 1.0),
                ("sold_monthly".to_string(), 1.0),
                ("price".to_string(), 1000.0),
                ("commission_pct".to_string(), 0.5),
                ("commission_rp".to_string(), 10.0),
            ],
            ..Default::default()
        };
        let outcome = run(&files, &test_mode(), &options, |_| {}).unwrap();
        assert_eq!(outcome.summary.passing, 2);
    }

    #[test]
    fn test_unknown_threshold_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("a.txt", FILE_A)]);

        let options = RunOptions {
            min_overrides: vec![("rating".to_string(), 4.0)],
            ..Default::default()
        };
        let result = run(&files, &test_mode(), &options, |_| {});
        assert!(matches!(
            result,
            Err(crate::util::error::ListSiftError::Run(
                RunError::UnknownThreshold { .. }
            ))
        ));
    }

    #[test]
    fn test_store_filter_without_store_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("a.txt", FILE_A)]);

        let options = RunOptions {
            store_contains: Some("jakarta".to_string()),
            ..Default::default()
        };
        let result = run(&files, &test_mode(), &options, |_| {});
        assert!(matches!(
            result,
            Err(crate::util::error::ListSiftError::Run(
                RunError::NoStoreField { .. }
            ))
        ));
    }

    #[test]
    fn test_empty_inputs_is_informational_not_error() {
        let outcome = run(&[], &test_mode(), &RunOptions::default(), |_| {}).unwrap();
        assert_eq!(outcome.summary.total_ingested, 0);
        assert_eq!(outcome.summary.passing, 0);
        // Empty passing set: every configured mean is the None sentinel.
        assert!(outcome.summary.means.iter().all(|m| m.mean.is_none()));
    }

    #[test]
    fn test_progress_reports_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("a.txt", FILE_A), ("b.txt", FILE_B)]);

        let mut parsed = 0usize;
        let mut saw_filtered = false;
        run(&files, &test_mode(), &RunOptions::default(), |p| match p {
            RunProgress::FileParsed { .. } => parsed += 1,
            RunProgress::Filtered { .. } => saw_filtered = true,
            _ => {}
        })
        .unwrap();
        assert_eq!(parsed, 2);
        assert!(saw_filtered);
    }

    #[test]
    fn test_provenance_column_present_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_inputs(&dir, &[("a.txt", FILE_A)]);

        let outcome = run(&files, &test_mode(), &RunOptions::default(), |_| {}).unwrap();
        let idx = outcome
            .passing
            .column_index(constants::SOURCE_COLUMN)
            .unwrap();
        assert_eq!(outcome.passing.cell(0, idx).render(), "a.txt");
    }
}
