//! Delimiter resolution.
//!
//! Order of attempts:
//!
//! 1. a manual delimiter supplied by the caller, if any (final answer);
//! 2. sniffing: a character occurring the same non-zero number of times on
//!    every sampled line, when exactly one such character exists;
//! 3. the fixed candidates in [`FALLBACK_DELIMITERS`] order, first one that
//!    splits the sample into more than one column and at least one row;
//! 4. otherwise [`IngestError::DelimiterRequired`] so the caller can ask the
//!    user and come back with a manual delimiter.

use serde::Serialize;

use super::{read_records, ParseOptions};
use crate::error::{IngestError, IngestResult};

/// Fixed candidates, in priority order.
pub const FALLBACK_DELIMITERS: [char; 7] = [',', ';', '\t', '|', ':', '~', ' '];

/// Number of lines used as the detection sample.
pub const SAMPLE_LINES: usize = 20;

/// How the delimiter was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelimiterSource {
    Sniffed,
    Candidate,
    Manual,
}

/// A resolved delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelimiterChoice {
    pub delimiter: char,
    pub source: DelimiterSource,
}

/// First [`SAMPLE_LINES`] non-blank lines of the decoded text.
pub fn sample_lines(text: &str) -> String {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .take(SAMPLE_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable delimiter, tab and space spelled out.
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        ' ' => "SPACE".to_string(),
        c => c.to_string(),
    }
}

/// Resolve the delimiter for `sample`.
pub fn resolve_delimiter(sample: &str, options: &ParseOptions) -> IngestResult<DelimiterChoice> {
    if let Some(manual) = options.delimiter {
        check_delimiter(sample, manual, options).map_err(|reason| {
            IngestError::UnresolvedDelimiter {
                delimiter: format_delimiter(manual),
                reason,
            }
        })?;
        return Ok(DelimiterChoice {
            delimiter: manual,
            source: DelimiterSource::Manual,
        });
    }

    if let Some(delimiter) = sniff_delimiter(sample, options.quote) {
        return Ok(DelimiterChoice {
            delimiter,
            source: DelimiterSource::Sniffed,
        });
    }

    if let Some(delimiter) = fallback_delimiter(sample, options) {
        return Ok(DelimiterChoice {
            delimiter,
            source: DelimiterSource::Candidate,
        });
    }

    let tried = FALLBACK_DELIMITERS
        .iter()
        .map(|d| format!("'{}'", format_delimiter(*d)))
        .collect::<Vec<_>>()
        .join(" ");
    Err(IngestError::DelimiterRequired { tried })
}

/// Sniff a delimiter from its per-line frequency.
///
/// Returns `None` when no candidate is consistent, or when several are.
pub fn sniff_delimiter(sample: &str, quote: char) -> Option<char> {
    let lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }

    let consistent: Vec<char> = FALLBACK_DELIMITERS
        .iter()
        .copied()
        .filter(|&candidate| {
            let first = count_unquoted(lines[0], candidate, quote);
            first > 0
                && lines
                    .iter()
                    .all(|line| count_unquoted(line, candidate, quote) == first)
        })
        .collect();

    match consistent.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// Try the fixed candidates in order; the first producing a table with more
/// than one column and at least one row wins.
pub fn fallback_delimiter(sample: &str, options: &ParseOptions) -> Option<char> {
    FALLBACK_DELIMITERS
        .iter()
        .copied()
        .find(|&candidate| check_delimiter(sample, candidate, options).is_ok())
}

/// Whether `delimiter` yields at least one row and, when required, more than
/// one column. The error explains why not.
fn check_delimiter(sample: &str, delimiter: char, options: &ParseOptions) -> Result<(), String> {
    let records = read_records(sample, delimiter, options).map_err(|e| e.to_string())?;

    if options.require_multiple_columns && records.headers.len() < 2 {
        return Err("the file splits into a single column".into());
    }
    if records.rows.is_empty() {
        return Err("no data rows could be read".into());
    }
    Ok(())
}

fn count_unquoted(line: &str, needle: char, quote: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in line.chars() {
        if c == quote {
            in_quotes = !in_quotes;
        } else if c == needle && !in_quotes {
            count += 1;
        }
    }
    count
}
