// listsift - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; all errors preserve the causal
// chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all listsift operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum ListSiftError {
    /// Mode profile loading or validation failed.
    Mode(ModeError),

    /// Input table parsing failed.
    Parse(ParseError),

    /// The run as a whole could not proceed.
    Run(RunError),

    /// Export operation failed.
    Export(ExportError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for ListSiftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mode(e) => write!(f, "Mode profile error: {e}"),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Run(e) => write!(f, "Run error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ListSiftError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Mode(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Run(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Mode profile errors
// ---------------------------------------------------------------------------

/// Errors related to mode profile loading and validation.
#[derive(Debug)]
pub enum ModeError {
    /// TOML file could not be parsed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Mode profile file exceeds the maximum allowed size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// A required field is missing or empty in the mode definition.
    MissingField {
        mode_id: String,
        field: &'static str,
    },

    /// Two logical fields in the same mode share a name.
    DuplicateField { mode_id: String, field: String },

    /// A threshold, derivation, or summary entry names a logical field the
    /// mode does not declare.
    UnknownField {
        mode_id: String,
        context: &'static str,
        field: String,
    },

    /// A custom strip pattern in the mode is invalid.
    InvalidRegex {
        mode_id: String,
        field: String,
        pattern: String,
        source: regex::Error,
    },

    /// A strip pattern exceeds the maximum allowed length.
    RegexTooLong {
        mode_id: String,
        field: String,
        length: usize,
        max_length: usize,
    },

    /// A threshold band has min > max and can never match.
    EmptyBand {
        mode_id: String,
        field: String,
        min: f64,
        max: f64,
    },

    /// Duplicate mode ID across two user profile files.
    DuplicateId {
        id: String,
        path1: PathBuf,
        path2: PathBuf,
    },

    /// Maximum number of modes exceeded.
    TooManyModes { count: usize, max: usize },

    /// The requested mode ID is not loaded.
    UnknownMode { id: String },

    /// I/O error reading a mode profile file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Failed to parse TOML '{}': {source}", path.display())
            }
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "Mode profile '{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                path.display()
            ),
            Self::MissingField { mode_id, field } => {
                write!(f, "Mode '{mode_id}': missing required field '{field}'")
            }
            Self::DuplicateField { mode_id, field } => {
                write!(f, "Mode '{mode_id}': logical field '{field}' declared twice")
            }
            Self::UnknownField {
                mode_id,
                context,
                field,
            } => write!(
                f,
                "Mode '{mode_id}': {context} references undeclared field '{field}'"
            ),
            Self::InvalidRegex {
                mode_id,
                field,
                pattern,
                source,
            } => write!(
                f,
                "Mode '{mode_id}': invalid strip pattern for '{field}' ('{pattern}'): {source}"
            ),
            Self::RegexTooLong {
                mode_id,
                field,
                length,
                max_length,
            } => write!(
                f,
                "Mode '{mode_id}': strip pattern for '{field}' is {length} chars, \
                 exceeds maximum of {max_length}"
            ),
            Self::EmptyBand {
                mode_id,
                field,
                min,
                max,
            } => write!(
                f,
                "Mode '{mode_id}': threshold for '{field}' has min {min} > max {max}"
            ),
            Self::DuplicateId { id, path1, path2 } => write!(
                f,
                "Duplicate mode ID '{id}' in '{}' and '{}'",
                path1.display(),
                path2.display()
            ),
            Self::TooManyModes { count, max } => {
                write!(f, "Too many mode profiles loaded ({count}), maximum is {max}")
            }
            Self::UnknownMode { id } => {
                write!(f, "No mode profile with ID '{id}' is loaded")
            }
            Self::Io { path, source } => {
                write!(
                    f,
                    "I/O error reading mode profile '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ModeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ModeError> for ListSiftError {
    fn from(e: ModeError) -> Self {
        Self::Mode(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors that exclude a single input file from the run.
#[derive(Debug)]
pub enum ParseError {
    /// File encoding is not valid UTF-8.
    InvalidEncoding {
        file: PathBuf,
        source: std::string::FromUtf8Error,
    },

    /// The delimiter sniffer could not settle on a single separator.
    AmbiguousDelimiter { file: PathBuf },

    /// The file has no header row (empty or whitespace-only content).
    EmptyTable { file: PathBuf },

    /// The file exceeds the per-file size limit.
    FileTooLarge {
        file: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// CSV-level read failure partway through a file.
    Csv { file: PathBuf, source: csv::Error },

    /// I/O error while reading an input file.
    Io { file: PathBuf, source: io::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncoding { file, source } => {
                write!(f, "'{}': invalid UTF-8 encoding: {source}", file.display())
            }
            Self::AmbiguousDelimiter { file } => write!(
                f,
                "'{}': could not determine the field delimiter from the sample",
                file.display()
            ),
            Self::EmptyTable { file } => {
                write!(f, "'{}': no header row found", file.display())
            }
            Self::FileTooLarge {
                file,
                size,
                max_size,
            } => write!(
                f,
                "'{}' is {size} bytes, exceeds maximum of {max_size} bytes",
                file.display()
            ),
            Self::Csv { file, source } => {
                write!(f, "'{}': CSV read error: {source}", file.display())
            }
            Self::Io { file, source } => {
                write!(f, "'{}': I/O error: {source}", file.display())
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidEncoding { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParseError> for ListSiftError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Run errors
// ---------------------------------------------------------------------------

/// Errors that abort an entire run.
#[derive(Debug)]
pub enum RunError {
    /// Strict reconciliation mode: required columns are missing from the
    /// combined table, so the run is abandoned all-or-nothing.
    MissingColumns {
        mode_id: String,
        columns: Vec<String>,
    },

    /// More input files than the configured limit.
    TooManyInputs { count: usize, max: usize },

    /// A threshold override names a field the mode does not filter on.
    UnknownThreshold { mode_id: String, field: String },

    /// A store-substring filter was requested but the mode declares no
    /// store field.
    NoStoreField { mode_id: String },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns { mode_id, columns } => write!(
                f,
                "Mode '{mode_id}' requires columns that no input provides: {}",
                columns.join(", ")
            ),
            Self::TooManyInputs { count, max } => {
                write!(f, "{count} input files exceeds the maximum of {max}")
            }
            Self::UnknownThreshold { mode_id, field } => write!(
                f,
                "Mode '{mode_id}' has no numeric field '{field}' to threshold on"
            ),
            Self::NoStoreField { mode_id } => write!(
                f,
                "Mode '{mode_id}' declares no store field; --store-contains is unavailable"
            ),
        }
    }
}

impl std::error::Error for RunError {}

impl From<RunError> for ListSiftError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to export operations.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for ListSiftError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

/// Convenience type alias for listsift results.
pub type Result<T> = std::result::Result<T, ListSiftError>;
