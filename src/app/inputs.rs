// listsift - app/inputs.rs
//
// Input collection: expands the paths given on the command line into the
// ordered list of files the run will read. Explicitly named files are
// taken as-is; directories are walked for delimited-text exports.

use crate::util::constants;
use crate::util::error::{ListSiftError, Result, RunError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand `paths` into concrete input files.
///
/// A path naming a file is included unconditionally; the user said so. A
/// path naming a directory is walked (bounded depth, sorted for
/// deterministic order) and contributes the files matching the include
/// patterns. Exceeding `MAX_INPUT_FILES` is a run-level error.
pub fn collect_input_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|e| ListSiftError::Io {
            path: path.clone(),
            operation: "stat",
            source: e,
        })?;

        if metadata.is_dir() {
            expand_directory(path, &mut files);
        } else {
            files.push(path.clone());
        }
    }

    if files.len() > constants::MAX_INPUT_FILES {
        return Err(RunError::TooManyInputs {
            count: files.len(),
            max: constants::MAX_INPUT_FILES,
        }
        .into());
    }

    tracing::info!(count = files.len(), "Collected input files");
    Ok(files)
}

/// Walk a directory and append files matching the include patterns.
/// Unreadable entries are skipped with a warning; a directory input never
/// fails the run.
fn expand_directory(dir: &Path, files: &mut Vec<PathBuf>) {
    let patterns: Vec<glob::Pattern> = constants::INPUT_INCLUDE_PATTERNS
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let walker = WalkDir::new(dir)
        .max_depth(constants::MAX_INPUT_DEPTH)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if patterns.iter().any(|p| p.matches(&name)) {
            files.push(entry.into_path());
        }
    }
}
