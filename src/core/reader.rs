// listsift - core/reader.rs
//
// Delimited-text ingestion: UTF-8 decoding, delimiter sniffing, and
// header+rows table parsing with malformed-row skipping.
// Core layer: operates on already-resident content, never touches the
// filesystem.

use crate::core::model::{Cell, Table};
use crate::util::constants;
use crate::util::error::ParseError;
use std::path::Path;

/// Result of parsing a single input file into a table.
#[derive(Debug)]
pub struct ParsedFile {
    /// Header-named table of raw text cells.
    pub table: Table,

    /// Rows discarded for having the wrong field count.
    pub malformed_skipped: usize,

    /// The delimiter actually used (fixed or sniffed).
    pub delimiter: u8,
}

/// Decode raw file bytes as UTF-8.
///
/// A decode failure excludes the file from the run; it is never fatal to
/// the run as a whole.
pub fn decode(bytes: Vec<u8>, file: &Path) -> Result<String, ParseError> {
    String::from_utf8(bytes).map_err(|e| ParseError::InvalidEncoding {
        file: file.to_path_buf(),
        source: e,
    })
}

/// Infer the field delimiter by sampling the start of the content.
///
/// Samples up to `SNIFF_SAMPLE_BYTES` and scores each candidate separator
/// by per-line presence and count consistency:
///   - a candidate appearing the same non-zero number of times on every
///     sampled line is *consistent*;
///   - exactly one consistent candidate wins outright;
///   - with no consistent candidate, a single candidate present on every
///     line still wins (quoted fields can vary the count);
///   - anything else is ambiguous and excludes the file.
pub fn sniff_delimiter(content: &str, file: &Path) -> Result<u8, ParseError> {
    let truncated = content.len() > constants::SNIFF_SAMPLE_BYTES;
    let sample = if truncated {
        let mut end = constants::SNIFF_SAMPLE_BYTES;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        &content[..end]
    } else {
        content
    };

    let mut lines: Vec<&str> = sample
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    // A truncated sample usually ends mid-row; that partial line would
    // distort the counts.
    if truncated && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return Err(ParseError::EmptyTable {
            file: file.to_path_buf(),
        });
    }

    let mut consistent: Vec<u8> = Vec::new();
    let mut present: Vec<u8> = Vec::new();

    for &candidate in constants::DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.bytes().filter(|&b| b == candidate).count())
            .collect();

        if counts.iter().all(|&c| c > 0) {
            present.push(candidate);
            if counts.windows(2).all(|w| w[0] == w[1]) {
                consistent.push(candidate);
            }
        }
    }

    let winner = match (consistent.as_slice(), present.as_slice()) {
        ([single], _) => *single,
        ([], [single]) => *single,
        _ => {
            tracing::debug!(
                file = %file.display(),
                consistent = consistent.len(),
                present = present.len(),
                "Delimiter sniffing ambiguous"
            );
            return Err(ParseError::AmbiguousDelimiter {
                file: file.to_path_buf(),
            });
        }
    };

    tracing::debug!(
        file = %file.display(),
        delimiter = %(winner as char),
        "Delimiter sniffed"
    );
    Ok(winner)
}

/// Parse delimited content into a `Table`: first row as header, remaining
/// rows as records.
///
/// Rows whose field count differs from the header are skipped and counted,
/// never aborting the parse. Quoting is handled by the `csv` reader, so a
/// delimiter inside a quoted field does not split the row.
pub fn parse_table(
    content: &str,
    delimiter: u8,
    file: &Path,
) -> Result<ParsedFile, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ParseError::Csv {
            file: file.to_path_buf(),
            source: e,
        })?
        .clone();

    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err(ParseError::EmptyTable {
            file: file.to_path_buf(),
        });
    }

    let columns: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
    let width = columns.len();
    let mut table = Table::new(columns);
    let mut malformed_skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                // Record-level read failures are treated the same as a
                // wrong field count: skip the row, keep the file.
                malformed_skipped += 1;
                if malformed_skipped <= constants::MAX_MALFORMED_ROWS_TRACKED {
                    tracing::debug!(
                        file = %file.display(),
                        row = row_idx + 2,
                        error = %e,
                        "Skipping unreadable row"
                    );
                }
                continue;
            }
        };

        if record.len() != width {
            malformed_skipped += 1;
            if malformed_skipped <= constants::MAX_MALFORMED_ROWS_TRACKED {
                tracing::debug!(
                    file = %file.display(),
                    row = row_idx + 2,
                    fields = record.len(),
                    expected = width,
                    "Skipping malformed row"
                );
            }
            continue;
        }

        table.push_row(record.iter().map(|f| Cell::Text(f.to_string())).collect());
    }

    tracing::debug!(
        file = %file.display(),
        rows = table.len(),
        skipped = malformed_skipped,
        "Parsed table"
    );

    Ok(ParsedFile {
        table,
        malformed_skipped,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn path() -> PathBuf {
        PathBuf::from("test.txt")
    }

    #[test]
    fn test_sniff_tab_delimited() {
        let content = "Link Produk\tHarga\tStock\na\t100\t5\nb\t200\t9\n";
        assert_eq!(sniff_delimiter(content, &path()).unwrap(), b'\t');
    }

    #[test]
    fn test_sniff_comma_delimited() {
        let content = "link,price,stock\na,100,5\nb,200,9\n";
        assert_eq!(sniff_delimiter(content, &path()).unwrap(), b',');
    }

    #[test]
    fn test_sniff_prefers_consistent_candidate() {
        // Commas appear but with varying counts; tabs are uniform.
        let content = "name\tnote\nwidget\thello, world, again\ngadget\tplain\n";
        assert_eq!(sniff_delimiter(content, &path()).unwrap(), b'\t');
    }

    #[test]
    fn test_sniff_ambiguous_is_an_error() {
        // Tabs and semicolons both appear once per line.
        let content = "a\tb;c\nd\te;f\n";
        let result = sniff_delimiter(content, &path());
        assert!(matches!(result, Err(ParseError::AmbiguousDelimiter { .. })));
    }

    #[test]
    fn test_sniff_no_candidate_is_an_error() {
        let content = "justoneword\nanother\n";
        assert!(matches!(
            sniff_delimiter(content, &path()),
            Err(ParseError::AmbiguousDelimiter { .. })
        ));
    }

    #[test]
    fn test_sniff_empty_content_is_an_error() {
        assert!(matches!(
            sniff_delimiter("", &path()),
            Err(ParseError::EmptyTable { .. })
        ));
    }

    #[test]
    fn test_parse_basic_table() {
        let content = "link\tprice\nhttp://a\t100\nhttp://b\t200\n";
        let parsed = parse_table(content, b'\t', &path()).unwrap();
        assert_eq!(parsed.table.columns(), &["link", "price"]);
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.malformed_skipped, 0);
        assert_eq!(
            parsed.table.cell(0, 0),
            &Cell::Text("http://a".to_string())
        );
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let content = "link\tprice\tstock\na\t100\t5\nbroken-row\nb\t200\t9\ntoo\tmany\tfields\there\n";
        let parsed = parse_table(content, b'\t', &path()).unwrap();
        assert_eq!(parsed.table.len(), 2);
        assert_eq!(parsed.malformed_skipped, 2);
    }

    #[test]
    fn test_parse_quoted_delimiter_does_not_split() {
        let content = "link,name\na,\"widget, large\"\n";
        let parsed = parse_table(content, b',', &path()).unwrap();
        assert_eq!(parsed.table.len(), 1);
        assert_eq!(
            parsed.table.cell(0, 1),
            &Cell::Text("widget, large".to_string())
        );
    }

    #[test]
    fn test_parse_empty_content_is_an_error() {
        assert!(matches!(
            parse_table("", b'\t', &path()),
            Err(ParseError::EmptyTable { .. })
        ));
    }

    #[test]
    fn test_parse_header_only_yields_empty_table() {
        let parsed = parse_table("link\tprice\n", b'\t', &path()).unwrap();
        assert!(parsed.table.is_empty());
        assert_eq!(parsed.table.columns().len(), 2);
    }
}
