// listsift - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "listsift";

/// Current application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Input limits
// =============================================================================

/// Maximum number of input files accepted in a single run.
pub const MAX_INPUT_FILES: usize = 500;

/// Maximum directory recursion depth when an input path is a directory.
pub const MAX_INPUT_DEPTH: usize = 10;

/// Maximum size of a single input file in bytes. Larger files are rejected
/// per-file rather than aborting the run.
pub const MAX_INPUT_FILE_SIZE: u64 = 256 * 1024 * 1024; // 256 MB

/// Default include glob patterns when expanding a directory input.
pub const INPUT_INCLUDE_PATTERNS: &[&str] = &["*.txt", "*.tsv", "*.csv"];

// =============================================================================
// Parsing limits
// =============================================================================

/// Number of bytes sampled from the start of a file for delimiter sniffing.
pub const SNIFF_SAMPLE_BYTES: usize = 1024;

/// Candidate field delimiters tried by the sniffer, in preference order.
pub const DELIMITER_CANDIDATES: &[u8] = &[b'\t', b',', b';'];

/// Maximum number of malformed-row reports tracked per file before
/// suppression. The skip count keeps incrementing past this.
pub const MAX_MALFORMED_ROWS_TRACKED: usize = 1_000;

// =============================================================================
// Mode profile limits
// =============================================================================

/// Maximum number of mode profiles that can be loaded (built-in + user).
pub const MAX_MODES: usize = 100;

/// Maximum size of a mode profile TOML file in bytes.
pub const MAX_MODE_FILE_SIZE: u64 = 64 * 1024; // 64 KB

/// Maximum strip-pattern regex length to prevent ReDoS.
pub const MAX_REGEX_PATTERN_LENGTH: usize = 4_096;

/// User mode-profile subdirectory name inside the platform config dir.
pub const MODES_DIR_NAME: &str = "modes";

// =============================================================================
// Pipeline defaults
// =============================================================================

/// Name of the provenance column stamped onto every record.
pub const SOURCE_COLUMN: &str = "source_file";

/// Mode profile used when the CLI does not name one.
pub const DEFAULT_MODE_ID: &str = "shopee-basic";

/// Default output file names for the two result exports.
pub const DEFAULT_PASSING_NAME: &str = "passing.csv";
pub const DEFAULT_REJECTED_NAME: &str = "rejected.csv";

/// Characters stripped from user-supplied output file names.
pub const FILENAME_ILLEGAL_CHARS: &[char] =
    &['\\', '/', '*', '?', ':', '<', '>', '|', '"'];

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
