// listsift - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Logging initialisation (debug mode support)
// 3. Mode profile loading (built-in + user-defined)
// 4. Pipeline run and result export

use clap::Parser;
use listsift::app::{inputs, mode_mgr, runner};
use listsift::core::export;
use listsift::core::model::{RunProgress, RunSummary};
use listsift::util;
use listsift::util::constants;
use listsift::util::error::{ListSiftError, ModeError};
use std::path::PathBuf;

/// listsift - delimited product-listing normaliser and threshold filter.
///
/// Point listsift at one or more delimited export files (or a directory
/// of them), pick a mode profile, and it writes the records passing the
/// mode's thresholds and the rejected remainder as two CSV files.
#[derive(Parser, Debug)]
#[command(name = "listsift", version, about)]
struct Cli {
    /// Input files, or directories to scan for *.txt / *.tsv / *.csv.
    #[arg(required_unless_present = "list_modes")]
    inputs: Vec<PathBuf>,

    /// Mode profile to apply.
    #[arg(short = 'm', long = "mode", default_value = constants::DEFAULT_MODE_ID)]
    mode: String,

    /// Additional directory containing user-defined mode profiles.
    #[arg(long = "modes-dir")]
    modes_dir: Option<PathBuf>,

    /// List available mode profiles and exit.
    #[arg(long = "list-modes")]
    list_modes: bool,

    /// Override a lower threshold, e.g. --min stock=20 (repeatable).
    #[arg(long = "min", value_name = "FIELD=N", value_parser = parse_threshold)]
    min: Vec<(String, f64)>,

    /// Override an upper threshold, e.g. --max price=50000 (repeatable).
    #[arg(long = "max", value_name = "FIELD=N", value_parser = parse_threshold)]
    max: Vec<(String, f64)>,

    /// Disable filtering entirely; every record passes.
    #[arg(long = "no-filter")]
    no_filter: bool,

    /// Keep only records whose store field contains this substring.
    #[arg(long = "store-contains", value_name = "SUBSTRING")]
    store_contains: Option<String>,

    /// Randomise the order of both result exports.
    #[arg(long = "shuffle")]
    shuffle: bool,

    /// Fixed seed for --shuffle.
    #[arg(long = "seed", requires = "shuffle")]
    seed: Option<u64>,

    /// File name for the passing export.
    #[arg(long = "passing-out", default_value = constants::DEFAULT_PASSING_NAME)]
    passing_out: String,

    /// File name for the rejected export.
    #[arg(long = "rejected-out", default_value = constants::DEFAULT_REJECTED_NAME)]
    rejected_out: String,

    /// Also write the run summary as JSON to this path.
    #[arg(long = "summary-json", value_name = "PATH")]
    summary_json: Option<PathBuf>,

    /// Directory the exports are written to.
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

/// Parse a `field=value` threshold override.
fn parse_threshold(raw: &str) -> Result<(String, f64), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=N, got '{raw}'"))?;
    if field.is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    let value: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    Ok((field.to_string(), value))
}

fn main() {
    let cli = Cli::parse();

    util::logging::init(cli.debug);

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "listsift starting"
    );

    if let Err(e) = run_app(cli) {
        tracing::error!(error = %e, "Run failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_app(cli: Cli) -> Result<(), ListSiftError> {
    // Determine the user modes directory: CLI override > platform default.
    let user_modes_dir = cli
        .modes_dir
        .clone()
        .or_else(mode_mgr::default_user_modes_dir);

    let (modes, mode_errors) = mode_mgr::load_all_modes(user_modes_dir.as_deref());
    for err in &mode_errors {
        tracing::warn!(error = %err, "Mode loading warning");
    }

    if cli.list_modes {
        for mode in &modes {
            let origin = if mode.is_builtin { "built-in" } else { "user" };
            println!("{:<20} {:<10} {}", mode.id, origin, mode.name);
            if !mode.description.is_empty() {
                println!("{:<20} {:<10} {}", "", "", mode.description);
            }
        }
        return Ok(());
    }

    let mode = modes
        .iter()
        .find(|m| m.id == cli.mode)
        .ok_or_else(|| ModeError::UnknownMode {
            id: cli.mode.clone(),
        })?;

    let files = inputs::collect_input_files(&cli.inputs)?;

    let options = runner::RunOptions {
        filters_enabled: !cli.no_filter,
        min_overrides: cli.min.clone(),
        max_overrides: cli.max.clone(),
        store_contains: cli.store_contains.clone(),
        shuffle: cli.shuffle,
        seed: cli.seed,
    };

    let outcome = runner::run(&files, mode, &options, |progress| {
        if let RunProgress::FileParsed {
            path,
            rows,
            files_completed,
            total_files,
        } = progress
        {
            tracing::info!(
                file = %path.display(),
                rows,
                progress = format!("{files_completed}/{total_files}"),
                "Parsed"
            );
        }
    })?;

    for report in &outcome.file_reports {
        if let Some(error) = &report.error {
            eprintln!("Warning: {} excluded: {error}", report.path.display());
        }
    }
    for warning in &outcome.warnings {
        eprintln!("Warning: {warning}");
    }

    if outcome.summary.total_ingested == 0 {
        println!("Nothing to process: no valid records in the given inputs.");
    }

    // Write the two result exports.
    let passing_path = cli.out_dir.join(export::sanitise_file_name(&cli.passing_out));
    let rejected_path = cli
        .out_dir
        .join(export::sanitise_file_name(&cli.rejected_out));
    write_csv(&outcome.passing, &passing_path)?;
    write_csv(&outcome.rejected, &rejected_path)?;

    if let Some(summary_path) = &cli.summary_json {
        let file = std::fs::File::create(summary_path).map_err(|e| ListSiftError::Io {
            path: summary_path.clone(),
            operation: "create",
            source: e,
        })?;
        export::export_summary_json(&outcome.summary, file, summary_path)?;
    }

    print_summary(&outcome.summary, &mode.id, &passing_path, &rejected_path);
    Ok(())
}

fn write_csv(
    table: &listsift::core::model::Table,
    path: &PathBuf,
) -> Result<(), ListSiftError> {
    let file = std::fs::File::create(path).map_err(|e| ListSiftError::Io {
        path: path.clone(),
        operation: "create",
        source: e,
    })?;
    let count = export::export_csv(table, file, path)?;
    tracing::info!(path = %path.display(), rows = count, "Export written");
    Ok(())
}

fn print_summary(summary: &RunSummary, mode_id: &str, passing: &PathBuf, rejected: &PathBuf) {
    println!("Mode:              {mode_id}");
    println!(
        "Files read:        {} ({} failed)",
        summary.files_read, summary.files_failed
    );
    println!("Records ingested:  {}", summary.total_ingested);
    println!(
        "Unique records:    {} ({} duplicates removed)",
        summary.unique_records, summary.duplicates_removed
    );
    if summary.filters_enabled {
        println!(
            "Passing:           {} -> {}",
            summary.passing,
            passing.display()
        );
        println!(
            "Rejected:          {} -> {}",
            summary.rejected,
            rejected.display()
        );
    } else {
        println!(
            "Passing (filters disabled): {} -> {}",
            summary.passing,
            passing.display()
        );
    }
    for mean in &summary.means {
        match mean.mean {
            Some(value) => println!("Mean {} (passing): {value:.2}", mean.column),
            None => println!("Mean {} (passing): unavailable", mean.column),
        }
    }
}
