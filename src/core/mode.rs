// listsift - core/mode.rs
//
// Mode profile loading, validation, and compilation.
// A mode profile is the declarative schema for one export variant: which
// logical fields exist, which source-column spellings carry them, how
// their values are cleaned and coerced, and which thresholds filter them.
// Core layer: accepts TOML strings, never touches the filesystem. I/O is
// handled by app::mode_mgr which feeds content here.

use crate::core::filter::Band;
use crate::core::normalize::{CleanRule, FallbackRule};
use crate::util::constants;
use crate::util::error::ModeError;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

// =============================================================================
// TOML deserialization structures (raw input)
// =============================================================================

/// Raw TOML mode definition as deserialized from a .toml file.
/// This is validated and compiled into a `ModeProfile` for runtime use.
#[derive(Debug, Deserialize)]
pub struct ModeDefinition {
    pub mode: ModeMeta,
    #[serde(default)]
    pub input: InputDef,
    pub key: KeyDef,
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub thresholds: BTreeMap<String, Band>,
    pub derive: Option<DeriveDef>,
    pub store: Option<StoreDef>,
    #[serde(default)]
    pub summary: SummaryDef,
    #[serde(default)]
    pub options: OptionsDef,
}

#[derive(Debug, Deserialize)]
pub struct ModeMeta {
    pub id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

fn default_version() -> String {
    "1.0".to_string()
}

#[derive(Debug, Deserialize, Default)]
pub struct InputDef {
    #[serde(default)]
    pub delimiter: DelimiterDef,
}

/// Declared input delimiter; `auto` engages the sniffer per file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DelimiterDef {
    #[default]
    Auto,
    Tab,
    Comma,
    Semicolon,
}

#[derive(Debug, Deserialize)]
pub struct KeyDef {
    pub field: String,
    pub columns: Vec<String>,
    #[serde(default = "default_key_missing")]
    pub missing: String,
}

fn default_key_missing() -> String {
    "(link unavailable)".to_string()
}

#[derive(Debug, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub default: f64,
    #[serde(default)]
    pub clean: CleanRuleDef,
    /// Custom strip regex; takes precedence over `clean` when present.
    pub strip_pattern: Option<String>,
    #[serde(default)]
    pub fallback: FallbackRuleDef,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanRuleDef {
    #[default]
    None,
    StripPercent,
    DigitsAndDot,
    DecimalComma,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackRuleDef {
    #[default]
    Zero,
    Median,
    Keep,
}

#[derive(Debug, Deserialize)]
pub struct DeriveDef {
    #[serde(default = "default_trend_name")]
    pub name: String,
    pub numerator: String,
    pub denominator: String,
    #[serde(default = "default_trend_output")]
    pub output: String,
    pub status_output: Option<String>,
}

fn default_trend_name() -> String {
    "trend".to_string()
}

fn default_trend_output() -> String {
    "Trend(%)".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StoreDef {
    pub field: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SummaryDef {
    #[serde(default)]
    pub means: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OptionsDef {
    #[serde(default)]
    pub on_missing: MissingColumnPolicy,
}

/// What happens when a declared column is absent from an input file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingColumnPolicy {
    /// Insert the column filled with the field default; warn and continue.
    #[default]
    Backfill,

    /// Abort the entire run: all-or-nothing reconciliation.
    Abort,
}

// =============================================================================
// Runtime representation
// =============================================================================

/// Input delimiter after compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Sniff per file.
    Auto,
    /// Fixed byte, no sniffing.
    Fixed(u8),
}

/// The identity-key field: used for deduplication, never filtered on.
#[derive(Debug, Clone)]
pub struct KeySpec {
    /// Logical name (e.g. "link").
    pub field: String,

    /// Source-column spellings, canonical first.
    pub columns: Vec<String>,

    /// Placeholder substituted when the column or value is absent.
    pub missing: String,
}

/// One declared numeric field.
#[derive(Debug, Clone)]
pub struct NumericField {
    /// Logical name (e.g. "price").
    pub name: String,

    /// Source-column spellings, canonical first.
    pub columns: Vec<String>,

    /// Backfill value when the column is absent.
    pub default: f64,

    /// String scrubbing applied before the numeric parse.
    pub clean: CleanRule,

    /// Policy for values that fail to parse.
    pub fallback: FallbackRule,
}

impl NumericField {
    /// Canonical column name this field occupies after reconciliation.
    pub fn column(&self) -> &str {
        &self.columns[0]
    }
}

/// Optional store/location text field, target of the substring filter.
#[derive(Debug, Clone)]
pub struct StoreSpec {
    pub field: String,
    pub columns: Vec<String>,
}

/// Trend derivation: a ratio of two sales counters plus an optional
/// status bucket column.
#[derive(Debug, Clone)]
pub struct TrendSpec {
    /// Logical name usable in thresholds and summary means.
    pub name: String,

    /// Logical field names of the two operands.
    pub numerator: String,
    pub denominator: String,

    /// Output column name for the trend percentage.
    pub output: String,

    /// Output column name for the status label, if wanted.
    pub status_output: Option<String>,
}

/// Runtime representation of a mode profile after TOML parsing, field
/// cross-validation, and regex compilation.
#[derive(Debug, Clone)]
pub struct ModeProfile {
    /// Unique mode identifier (e.g. "shopee-basic").
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Profile schema version.
    pub version: String,

    /// Description of the export variant this mode covers.
    pub description: String,

    /// Declared input delimiter.
    pub delimiter: Delimiter,

    /// Identity key.
    pub key: KeySpec,

    /// Declared numeric fields, in declaration order.
    pub fields: Vec<NumericField>,

    /// Default filter bands keyed by logical field name (or the derived
    /// trend name). CLI overrides replace these per run.
    pub thresholds: Vec<(String, Band)>,

    /// Optional trend derivation.
    pub derive: Option<TrendSpec>,

    /// Optional store field.
    pub store: Option<StoreSpec>,

    /// Logical field names averaged over the passing set in the summary.
    pub summary_means: Vec<String>,

    /// Missing-column policy.
    pub on_missing: MissingColumnPolicy,

    /// Whether this is a built-in mode (true) or user-defined (false).
    pub is_builtin: bool,
}

impl ModeProfile {
    /// Look up a declared numeric field by logical name.
    pub fn field(&self, name: &str) -> Option<&NumericField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Canonical table column for a logical name: the key, a numeric
    /// field, the derived trend, or the store field.
    pub fn column_of(&self, logical: &str) -> Option<&str> {
        if logical == self.key.field {
            return Some(&self.key.columns[0]);
        }
        if let Some(field) = self.field(logical) {
            return Some(field.column());
        }
        if let Some(derive) = &self.derive {
            if derive.name == logical {
                return Some(&derive.output);
            }
        }
        if let Some(store) = &self.store {
            if store.field == logical {
                return Some(&store.columns[0]);
            }
        }
        None
    }

    /// Whether a logical name may carry a threshold band.
    pub fn is_filterable(&self, logical: &str) -> bool {
        self.field(logical).is_some()
            || self
                .derive
                .as_ref()
                .map_or(false, |d| d.name == logical)
    }
}

// =============================================================================
// Mode validation and compilation
// =============================================================================

/// Parse a TOML string into a `ModeDefinition`.
///
/// `source_path` is used for error messages only (not for I/O).
pub fn parse_mode_toml(
    toml_content: &str,
    source_path: &PathBuf,
) -> Result<ModeDefinition, ModeError> {
    toml::from_str(toml_content).map_err(|e| ModeError::TomlParse {
        path: source_path.clone(),
        source: e,
    })
}

/// Validate a `ModeDefinition` and compile it into a runtime `ModeProfile`.
///
/// Validates:
/// - Required fields are present and non-empty
/// - Logical names are unique across key, fields, derive, and store
/// - Strip patterns are valid regexes within the size limit
/// - Thresholds, derive operands, and summary means reference declared names
/// - Threshold bands are satisfiable (min <= max)
pub fn validate_and_compile(
    def: ModeDefinition,
    is_builtin: bool,
) -> Result<ModeProfile, ModeError> {
    let id = &def.mode.id;

    if id.is_empty() {
        return Err(ModeError::MissingField {
            mode_id: "(empty)".to_string(),
            field: "mode.id",
        });
    }
    if def.mode.name.is_empty() {
        return Err(ModeError::MissingField {
            mode_id: id.clone(),
            field: "mode.name",
        });
    }
    if def.key.field.is_empty() {
        return Err(ModeError::MissingField {
            mode_id: id.clone(),
            field: "key.field",
        });
    }
    if def.key.columns.is_empty() || def.key.columns.iter().any(|c| c.is_empty()) {
        return Err(ModeError::MissingField {
            mode_id: id.clone(),
            field: "key.columns",
        });
    }

    // Logical-name uniqueness across every namespace a threshold or mean
    // could reference.
    let mut names: Vec<&str> = vec![&def.key.field];
    for field in &def.fields {
        if field.name.is_empty() {
            return Err(ModeError::MissingField {
                mode_id: id.clone(),
                field: "field.name",
            });
        }
        if field.columns.is_empty() || field.columns.iter().any(|c| c.is_empty()) {
            return Err(ModeError::MissingField {
                mode_id: id.clone(),
                field: "field.columns",
            });
        }
        if names.contains(&field.name.as_str()) {
            return Err(ModeError::DuplicateField {
                mode_id: id.clone(),
                field: field.name.clone(),
            });
        }
        names.push(&field.name);
    }
    if let Some(derive) = &def.derive {
        if names.contains(&derive.name.as_str()) {
            return Err(ModeError::DuplicateField {
                mode_id: id.clone(),
                field: derive.name.clone(),
            });
        }
        names.push(&derive.name);
    }
    if let Some(store) = &def.store {
        if store.field.is_empty() || store.columns.is_empty() {
            return Err(ModeError::MissingField {
                mode_id: id.clone(),
                field: "store",
            });
        }
        if names.contains(&store.field.as_str()) {
            return Err(ModeError::DuplicateField {
                mode_id: id.clone(),
                field: store.field.clone(),
            });
        }
    }

    // Compile fields, honouring custom strip patterns.
    let mut fields = Vec::with_capacity(def.fields.len());
    for field in &def.fields {
        let clean = match &field.strip_pattern {
            Some(pattern) => CleanRule::Pattern(compile_strip_pattern(id, &field.name, pattern)?),
            None => match field.clean {
                CleanRuleDef::None => CleanRule::None,
                CleanRuleDef::StripPercent => CleanRule::StripPercent,
                CleanRuleDef::DigitsAndDot => CleanRule::DigitsAndDot,
                CleanRuleDef::DecimalComma => CleanRule::DecimalComma,
            },
        };
        let fallback = match field.fallback {
            FallbackRuleDef::Zero => FallbackRule::Zero,
            FallbackRuleDef::Median => FallbackRule::Median,
            FallbackRuleDef::Keep => FallbackRule::Keep,
        };
        fields.push(NumericField {
            name: field.name.clone(),
            columns: field.columns.clone(),
            default: field.default,
            clean,
            fallback,
        });
    }

    // Derive operands must be declared numeric fields.
    let derive = match def.derive {
        Some(d) => {
            for operand in [&d.numerator, &d.denominator] {
                if !fields.iter().any(|f| &f.name == operand) {
                    return Err(ModeError::UnknownField {
                        mode_id: id.clone(),
                        context: "derive",
                        field: operand.clone(),
                    });
                }
            }
            if d.output.is_empty() {
                return Err(ModeError::MissingField {
                    mode_id: id.clone(),
                    field: "derive.output",
                });
            }
            Some(TrendSpec {
                name: d.name,
                numerator: d.numerator,
                denominator: d.denominator,
                output: d.output,
                status_output: d.status_output,
            })
        }
        None => None,
    };

    // Thresholds reference declared fields or the trend.
    let mut thresholds = Vec::with_capacity(def.thresholds.len());
    for (logical, band) in def.thresholds {
        let filterable = fields.iter().any(|f| f.name == logical)
            || derive.as_ref().map_or(false, |d| d.name == logical);
        if !filterable {
            return Err(ModeError::UnknownField {
                mode_id: id.clone(),
                context: "thresholds",
                field: logical,
            });
        }
        if let (Some(min), Some(max)) = (band.min, band.max) {
            if min > max {
                return Err(ModeError::EmptyBand {
                    mode_id: id.clone(),
                    field: logical,
                    min,
                    max,
                });
            }
        }
        thresholds.push((logical, band));
    }

    // Summary means reference declared fields or the trend.
    for logical in &def.summary.means {
        let known = fields.iter().any(|f| &f.name == logical)
            || derive.as_ref().map_or(false, |d| &d.name == logical);
        if !known {
            return Err(ModeError::UnknownField {
                mode_id: id.clone(),
                context: "summary.means",
                field: logical.clone(),
            });
        }
    }

    let delimiter = match def.input.delimiter {
        DelimiterDef::Auto => Delimiter::Auto,
        DelimiterDef::Tab => Delimiter::Fixed(b'\t'),
        DelimiterDef::Comma => Delimiter::Fixed(b','),
        DelimiterDef::Semicolon => Delimiter::Fixed(b';'),
    };

    Ok(ModeProfile {
        id: id.clone(),
        name: def.mode.name,
        version: def.mode.version,
        description: def.mode.description,
        delimiter,
        key: KeySpec {
            field: def.key.field,
            columns: def.key.columns,
            missing: def.key.missing,
        },
        fields,
        thresholds,
        derive,
        store: def.store.map(|s| StoreSpec {
            field: s.field,
            columns: s.columns,
        }),
        summary_means: def.summary.means,
        on_missing: def.options.on_missing,
        is_builtin,
    })
}

/// Compile a strip pattern with length validation to prevent ReDoS.
fn compile_strip_pattern(
    mode_id: &str,
    field: &str,
    pattern: &str,
) -> Result<Regex, ModeError> {
    if pattern.len() > constants::MAX_REGEX_PATTERN_LENGTH {
        return Err(ModeError::RegexTooLong {
            mode_id: mode_id.to_string(),
            field: field.to_string(),
            length: pattern.len(),
            max_length: constants::MAX_REGEX_PATTERN_LENGTH,
        });
    }

    Regex::new(pattern).map_err(|e| ModeError::InvalidRegex {
        mode_id: mode_id.to_string(),
        field: field.to_string(),
        pattern: pattern.to_string(),
        source: e,
    })
}

// =============================================================================
// Built-in modes (embedded at compile time)
// =============================================================================

/// Embedded TOML content for built-in modes.
/// Each tuple is (filename, TOML content).
pub fn builtin_mode_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "shopee_basic.toml",
            include_str!("../../modes/shopee_basic.toml"),
        ),
        (
            "shopee_live.toml",
            include_str!("../../modes/shopee_live.toml"),
        ),
        (
            "shopee_trend.toml",
            include_str!("../../modes/shopee_trend.toml"),
        ),
        (
            "affiliate_strict.toml",
            include_str!("../../modes/affiliate_strict.toml"),
        ),
    ]
}

/// Load and validate all built-in modes.
///
/// Invalid modes are logged as warnings and skipped (non-fatal).
/// Returns the successfully loaded modes.
pub fn load_builtin_modes() -> Vec<ModeProfile> {
    let mut modes = Vec::new();

    for (filename, content) in builtin_mode_sources() {
        let path = PathBuf::from(format!("<builtin>/{filename}"));
        match parse_mode_toml(content, &path).and_then(|def| validate_and_compile(def, true)) {
            Ok(mode) => {
                tracing::debug!(mode_id = %mode.id, "Loaded built-in mode");
                modes.push(mode);
            }
            Err(e) => {
                // Built-in mode failures are bugs, but degrade gracefully.
                tracing::error!(file = filename, error = %e, "Failed to load built-in mode");
            }
        }
    }

    modes
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::util::constants;

    pub(crate) const TEST_MODE_TOML: &str = r#"
[mode]
id = "test-basic"
name = "Test commission export"

[key]
field = "link"
columns = ["Link Produk", "Product Link"]
missing = "Link tidak tersedia"

[[field]]
name = "price"
columns = ["Harga", "Price"]
clean = "digits_and_dot"
fallback = "zero"

[[field]]
name = "stock"
columns = ["Stock", "Stok"]
fallback = "zero"

[[field]]
name = "sold_monthly"
columns = ["Terjual(Bulanan)", "Monthly Sold"]
fallback = "zero"

[[field]]
name = "commission_pct"
columns = ["Komisi(%)"]
clean = "strip_percent"
fallback = "zero"

[[field]]
name = "commission_rp"
columns = ["Komisi(Rp)"]
clean = "digits_and_dot"
fallback = "zero"

[thresholds]
stock = { min = 10.0 }
sold_monthly = { min = 5.0 }
price = { min = 10000.0 }
commission_pct = { min = 2.0 }
commission_rp = { min = 200.0 }

[summary]
means = ["price", "commission_pct"]
"#;

    /// Compiled mode shared by normalisation and pipeline tests.
    pub(crate) fn test_mode() -> ModeProfile {
        let path = PathBuf::from("test.toml");
        let def = parse_mode_toml(TEST_MODE_TOML, &path).unwrap();
        validate_and_compile(def, false).unwrap()
    }

    #[test]
    fn test_compile_valid_mode() {
        let mode = test_mode();
        assert_eq!(mode.id, "test-basic");
        assert_eq!(mode.fields.len(), 5);
        assert_eq!(mode.key.columns[0], "Link Produk");
        assert_eq!(mode.delimiter, Delimiter::Auto);
        assert_eq!(mode.on_missing, MissingColumnPolicy::Backfill);
        assert_eq!(mode.thresholds.len(), 5);
    }

    #[test]
    fn test_column_of_resolves_every_namespace() {
        let mode = test_mode();
        assert_eq!(mode.column_of("link"), Some("Link Produk"));
        assert_eq!(mode.column_of("price"), Some("Harga"));
        assert_eq!(mode.column_of("nonexistent"), None);
    }

    #[test]
    fn test_missing_id_rejected() {
        let toml = TEST_MODE_TOML.replace("id = \"test-basic\"", "id = \"\"");
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        assert!(matches!(
            validate_and_compile(def, false),
            Err(ModeError::MissingField { field: "mode.id", .. })
        ));
    }

    #[test]
    fn test_duplicate_field_name_rejected() {
        let toml = format!(
            "{TEST_MODE_TOML}\n[[field]]\nname = \"price\"\ncolumns = [\"Again\"]\n"
        );
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        assert!(matches!(
            validate_and_compile(def, false),
            Err(ModeError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_threshold_on_undeclared_field_rejected() {
        let toml = format!("{TEST_MODE_TOML}\n[thresholds.rating]\nmin = 4.0\n");
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        assert!(matches!(
            validate_and_compile(def, false),
            Err(ModeError::UnknownField { context: "thresholds", .. })
        ));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let toml = TEST_MODE_TOML.replace(
            "price = { min = 10000.0 }",
            "price = { min = 10000.0, max = 500.0 }",
        );
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        assert!(matches!(
            validate_and_compile(def, false),
            Err(ModeError::EmptyBand { .. })
        ));
    }

    #[test]
    fn test_invalid_strip_pattern_rejected() {
        let toml = TEST_MODE_TOML.replace(
            "clean = \"digits_and_dot\"\nfallback = \"zero\"\n\n[[field]]\nname = \"stock\"",
            "strip_pattern = \"[invalid\"\nfallback = \"zero\"\n\n[[field]]\nname = \"stock\"",
        );
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        assert!(matches!(
            validate_and_compile(def, false),
            Err(ModeError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_derive_operand_must_be_declared() {
        let toml = format!(
            "{TEST_MODE_TOML}\n[derive]\nnumerator = \"sold_monthly\"\ndenominator = \"sold_total\"\n"
        );
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        assert!(matches!(
            validate_and_compile(def, false),
            Err(ModeError::UnknownField { context: "derive", .. })
        ));
    }

    #[test]
    fn test_fixed_delimiter_parses() {
        let toml = TEST_MODE_TOML.replace("[key]", "[input]\ndelimiter = \"tab\"\n\n[key]");
        let def = parse_mode_toml(&toml, &PathBuf::from("t.toml")).unwrap();
        let mode = validate_and_compile(def, false).unwrap();
        assert_eq!(mode.delimiter, Delimiter::Fixed(b'\t'));
    }

    #[test]
    fn test_load_builtin_modes() {
        let modes = load_builtin_modes();
        assert_eq!(modes.len(), builtin_mode_sources().len());
        assert!(modes.iter().any(|m| m.id == constants::DEFAULT_MODE_ID));
        assert!(modes.iter().all(|m| m.is_builtin));
    }

    #[test]
    fn test_builtin_strict_mode_aborts_on_missing() {
        let modes = load_builtin_modes();
        let strict = modes.iter().find(|m| m.id == "affiliate-strict").unwrap();
        assert_eq!(strict.on_missing, MissingColumnPolicy::Abort);
    }

    #[test]
    fn test_builtin_trend_mode_derives() {
        let modes = load_builtin_modes();
        let trend = modes.iter().find(|m| m.id == "shopee-trend").unwrap();
        let spec = trend.derive.as_ref().unwrap();
        assert_eq!(spec.output, "Trend(%)");
        assert_eq!(spec.status_output.as_deref(), Some("Status"));
        assert_eq!(trend.column_of("trend"), Some("Trend(%)"));
    }
}
