//! CSV ingestion with encoding and delimiter auto-detection.
//!
//! ```text
//! bytes ──▶ detect_encoding ──▶ decode_content ──▶ resolve_delimiter ──▶ read_records ──▶ Table
//!             (chardet/BOM)      (+ cp1252 retry)   (sniff/list/manual)   (skip bad rows)
//! ```
//!
//! Malformed rows are skipped and counted rather than failing the parse.

pub mod delimiter;
pub mod encoding;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::api::logs::{log_info, log_success, log_warning, Stage};
use crate::error::{IngestError, IngestResult};
use crate::models::Table;

pub use delimiter::{
    fallback_delimiter, format_delimiter, resolve_delimiter, sample_lines, sniff_delimiter,
    DelimiterChoice, DelimiterSource, FALLBACK_DELIMITERS,
};
pub use encoding::{decode_content, detect_encoding, DecodedText, DetectedEncoding, FALLBACK_ENCODING};

/// Options for reading delimited text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Manual delimiter; skips detection when set.
    pub delimiter: Option<char>,
    /// Quote character.
    pub quote: char,
    /// Escape character inside quoted fields, if the file uses one.
    pub escape: Option<char>,
    /// Reject tables that come out as a single column.
    pub require_multiple_columns: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            quote: '"',
            escape: None,
            require_multiple_columns: true,
        }
    }
}

/// Header plus well-formed rows, before typing.
#[derive(Debug, Clone, Default)]
pub struct RawRecords {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped for a wrong field count or broken quoting.
    pub skipped: usize,
}

/// Result of parsing with metadata.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Statistical guess made on the raw bytes.
    pub detected: DetectedEncoding,
    /// Encoding actually used to decode.
    pub encoding: String,
    pub used_fallback_encoding: bool,
    pub delimiter: char,
    pub delimiter_source: DelimiterSource,
    pub skipped_rows: usize,
}

impl ParseResult {
    pub fn headers(&self) -> Vec<String> {
        self.table.column_names()
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }
}

/// Table parsed with an explicit encoding and delimiter.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub table: Table,
    pub encoding: String,
    pub used_fallback_encoding: bool,
    pub skipped_rows: usize,
}

fn ascii_byte(c: char, role: &str) -> IngestResult<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| IngestError::Parse(format!("{} '{}' must be a single ASCII character", role, c)))
}

/// Split decoded text into a header and rows.
///
/// Rows whose field count differs from the header's are skipped and counted;
/// blank lines are ignored. Empty header names become `Unnamed: <i>` and
/// repeated names get a `.1`, `.2`, ... suffix.
pub fn read_records(text: &str, delimiter: char, options: &ParseOptions) -> IngestResult<RawRecords> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .delimiter(ascii_byte(delimiter, "Delimiter")?)
        .quote(ascii_byte(options.quote, "Quote")?)
        .has_headers(false)
        .flexible(true);
    if let Some(escape) = options.escape {
        builder.escape(Some(ascii_byte(escape, "Escape")?));
    }

    let mut reader = builder.from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = loop {
        match records.next() {
            Some(Ok(record)) if record.iter().all(|f| f.trim().is_empty()) => continue,
            Some(Ok(record)) => break record,
            Some(Err(e)) => return Err(IngestError::Parse(format!("cannot read header: {}", e))),
            None => return Err(IngestError::EmptyInput("no header row found".into())),
        }
    };

    let headers = unique_headers(header.iter().map(|h| h.trim().to_string()).collect());

    let mut rows = Vec::new();
    let mut skipped = 0;
    for result in records {
        let record = match result {
            Ok(record) => record,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };

        if record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty()) {
            continue;
        }
        if record.len() != headers.len() {
            skipped += 1;
            continue;
        }

        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawRecords {
        headers,
        rows,
        skipped,
    })
}

fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, name)| {
            let base = if name.is_empty() {
                format!("Unnamed: {}", i)
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Parse decoded text with a known delimiter into a typed table.
pub fn parse_text(text: &str, delimiter: char, options: &ParseOptions) -> IngestResult<(Table, usize)> {
    let records = read_records(text, delimiter, options)?;

    if records.rows.is_empty() {
        return Err(IngestError::EmptyInput(format!(
            "no data rows could be read ({} malformed rows skipped)",
            records.skipped
        )));
    }
    if options.require_multiple_columns && records.headers.len() < 2 {
        return Err(IngestError::Parse(format!(
            "only one column found with delimiter '{}'; the delimiter is probably wrong",
            format_delimiter(delimiter)
        )));
    }

    let table = Table::from_raw_rows(&records.headers, &records.rows)
        .map_err(|e| IngestError::Parse(e.to_string()))?;
    Ok((table, records.skipped))
}

/// Parse raw bytes with an explicit encoding and delimiter.
pub fn parse_table(
    bytes: &[u8],
    encoding: &str,
    delimiter: char,
    options: &ParseOptions,
) -> IngestResult<ParsedTable> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyInput("uploaded file has no bytes".into()));
    }
    let decoded = decode_content(bytes, encoding)?;
    let (table, skipped_rows) = parse_text(&decoded.text, delimiter, options)?;
    Ok(ParsedTable {
        table,
        encoding: decoded.encoding,
        used_fallback_encoding: decoded.used_fallback,
        skipped_rows,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], options: &ParseOptions) -> IngestResult<ParseResult> {
    log_info(Stage::Ingest, "Detecting encoding and separator...");
    let detected = detect_encoding(bytes)?;
    log_success(
        Stage::Ingest,
        format!("Detected encoding: {} ({:.0}% confidence)", detected.name, detected.confidence * 100.0),
    );

    let decoded = decode_content(bytes, &detected.name)?;
    if decoded.used_fallback {
        log_warning(
            Stage::Ingest,
            format!("Could not decode as {}, fell back to {}", detected.name, decoded.encoding),
        );
    }

    let choice = resolve_delimiter(&sample_lines(&decoded.text), options)?;
    log_success(
        Stage::Ingest,
        format!("Detected separator: '{}' ({:?})", format_delimiter(choice.delimiter), choice.source),
    );

    let (table, skipped_rows) = parse_text(&decoded.text, choice.delimiter, options)?;
    if skipped_rows > 0 {
        log_warning(Stage::Ingest, format!("{} malformed rows skipped", skipped_rows));
    }
    log_success(
        Stage::Ingest,
        format!("Read {} rows x {} columns", table.row_count(), table.column_count()),
    );

    Ok(ParseResult {
        table,
        detected,
        encoding: decoded.encoding,
        used_fallback_encoding: decoded.used_fallback,
        delimiter: choice.delimiter,
        delimiter_source: choice.source,
        skipped_rows,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, options: &ParseOptions) -> IngestResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, options)
}
