//! REST API types for frontend integration.
//!
//! Inspection returns JSON; exports return the file itself, with warnings
//! carried in the [`WARNINGS_HEADER`] response header.

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::DEFAULT_OUTPUT_NAME;
use crate::models::dates::DATE_OUTPUT_FORMATS;
use crate::transform::pipeline::Inspection;
use crate::transform::profile::ColumnProfile;

/// Response header holding the JSON array of warnings for a download.
pub const WARNINGS_HEADER: &str = "x-dataexport-warnings";

/// Response sent to the frontend after inspecting an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" or "warning"
    pub status: String,

    pub csv_info: CsvMetadata,

    /// One profile per column, with default filter and date window.
    pub columns: Vec<ColumnSummary>,

    /// First rows as records.
    pub preview: Vec<Value>,

    pub warnings: Vec<String>,

    /// Output formats offered for date windows.
    pub date_formats: Vec<String>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub skipped_rows: usize,
    pub columns: Vec<String>,
}

/// A column profile plus the controls it pre-fills.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    #[serde(flatten)]
    pub profile: ColumnProfile,
    pub default_filter: Option<Value>,
    pub default_date_window: Option<Value>,
}

impl From<ColumnProfile> for ColumnSummary {
    fn from(profile: ColumnProfile) -> Self {
        Self {
            default_filter: profile
                .default_filter()
                .and_then(|f| serde_json::to_value(f).ok()),
            default_date_window: profile
                .default_date_window()
                .and_then(|w| serde_json::to_value(w).ok()),
            profile,
        }
    }
}

impl From<Inspection> for InspectResponse {
    fn from(inspection: Inspection) -> Self {
        let status = if inspection.warnings.is_empty() { "ready" } else { "warning" };
        InspectResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            csv_info: CsvMetadata {
                encoding: inspection.csv_info.encoding,
                delimiter: inspection.csv_info.delimiter,
                row_count: inspection.csv_info.row_count,
                skipped_rows: inspection.csv_info.skipped_rows,
                columns: inspection.csv_info.headers,
            },
            columns: inspection.columns.into_iter().map(ColumnSummary::from).collect(),
            preview: inspection.preview,
            warnings: inspection.warnings,
            date_formats: DATE_OUTPUT_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Create an error response.
///
/// `needsDelimiter` tells the client to prompt for a manual delimiter and
/// resend the same file.
pub fn error_response(error: &str, needs_delimiter: bool) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "needsDelimiter": needs_delimiter,
    })
}

/// `<stem>_<YYYYmmdd_HHMMSS>.<extension>`, with the stem reduced to
/// filename-safe characters.
pub fn download_file_name(stem: Option<&str>, extension: &str, now: NaiveDateTime) -> String {
    let cleaned: String = stem
        .unwrap_or("")
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    let stem = if cleaned.is_empty() { DEFAULT_OUTPUT_NAME } else { cleaned };
    format!("{}_{}.{}", stem, now.format("%Y%m%d_%H%M%S"), extension)
}

/// JSON-encode `warnings` using ASCII only, so it fits in a header value.
pub fn warnings_header_value(warnings: &[String]) -> String {
    let json = serde_json::to_string(warnings).unwrap_or_else(|_| "[]".to_string());
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn test_download_file_name() {
        assert_eq!(
            download_file_name(Some("contacts"), "xlsx", at()),
            "contacts_20240309_140507.xlsx"
        );
        assert_eq!(download_file_name(None, "csv", at()), "data_export_20240309_140507.csv");
        assert_eq!(
            download_file_name(Some("../etc/pass wd"), "json", at()),
            "etc_pass_wd_20240309_140507.json"
        );
    }

    #[test]
    fn test_warnings_header_is_ascii_json() {
        let warnings = vec!["Column 'Société': 2 invalid email address(es)".to_string()];
        let header = warnings_header_value(&warnings);

        assert!(header.is_ascii());
        let decoded: Vec<String> = serde_json::from_str(&header).unwrap();
        assert_eq!(decoded, warnings);
    }

    #[test]
    fn test_error_response_shape() {
        let body = error_response("Could not detect the delimiter", true);
        assert_eq!(body["status"], "error");
        assert_eq!(body["needsDelimiter"], true);
    }
}
