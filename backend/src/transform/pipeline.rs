//! High-level pipeline API: bytes in, artifact out.
//!
//! Each entry point combines every step:
//! ingestion (encoding, delimiter, parse), validation, row processing, and
//! either export or template filling.
//!
//! # Example
//!
//! ```rust,ignore
//! use dataexport::transform::pipeline::{export_csv, ExportRequest};
//! use dataexport::parser::ParseOptions;
//! use std::path::Path;
//!
//! let output = export_csv(Path::new("contacts.csv"), &ParseOptions::default(), &ExportRequest::default())?;
//! std::fs::write("contacts.xlsx", &output.artifact.bytes)?;
//! println!("{} rows, {} warnings", output.rows_exported, output.warnings.len());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::options::ProcessOptions;
use super::processor::process_table;
use super::profile::{profile_table, ColumnProfile};
use crate::api::logs::{log_info, log_success, log_warning, Stage};
use crate::error::{IngestError, PipelineResult};
use crate::export::{
    export_table, fill_template, CategoryFilter, ColumnMapping, ExportArtifact, ExportFormat,
    SpreadsheetStyle,
};
use crate::models::Table;
use crate::parser::{format_delimiter, parse_bytes_auto, DelimiterSource, ParseOptions, ParseResult};
use crate::validation::validate_table;

/// Everything needed to turn an upload into an export.
///
/// Loadable from JSON; every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportRequest {
    pub process: ProcessOptions,
    /// Output column names, applied after processing.
    pub mapping: ColumnMapping,
    pub format: ExportFormat,
    pub spreadsheet: SpreadsheetStyle,
    /// Download name stem; a timestamp and extension are appended by the caller.
    pub output_name: Option<String>,
}

/// Everything needed to merge an upload into a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRequest {
    #[serde(default)]
    pub process: ProcessOptions,
    /// Target sheet in the template.
    pub sheet: String,
    /// Source column to template header text.
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub category: Option<CategoryFilter>,
    #[serde(default)]
    pub output_name: Option<String>,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub encoding_confidence: f32,
    pub used_fallback_encoding: bool,
    pub delimiter: String,
    pub delimiter_source: DelimiterSource,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub skipped_rows: usize,
}

impl CsvInfo {
    fn from_parse(result: &ParseResult) -> Self {
        Self {
            encoding: result.encoding.clone(),
            encoding_confidence: result.detected.confidence,
            used_fallback_encoding: result.used_fallback_encoding,
            delimiter: format_delimiter(result.delimiter),
            delimiter_source: result.delimiter_source,
            headers: result.headers(),
            row_count: result.row_count(),
            skipped_rows: result.skipped_rows,
        }
    }

    /// Advisory notes about how the file was read.
    fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.used_fallback_encoding {
            warnings.push(format!("File decoded as {} after detection failed", self.encoding));
        }
        if self.skipped_rows > 0 {
            warnings.push(format!("{} malformed rows skipped", self.skipped_rows));
        }
        warnings
    }
}

/// Summary of an upload, used to build the export form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub csv_info: CsvInfo,
    pub columns: Vec<ColumnProfile>,
    /// First rows as JSON records.
    pub preview: Vec<Value>,
    pub warnings: Vec<String>,
}

/// Result of an export or template fill.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub artifact: ExportArtifact,
    pub csv_info: CsvInfo,
    pub rows_exported: usize,
    pub warnings: Vec<String>,
}

/// Parse, profile and validate `bytes` without exporting anything.
pub fn inspect_bytes(
    bytes: &[u8],
    parse: &ParseOptions,
    preview_rows: usize,
) -> PipelineResult<Inspection> {
    let parsed = ingest(bytes, parse)?;
    let csv_info = CsvInfo::from_parse(&parsed);

    let mut warnings = csv_info.warnings();
    warnings.extend(validate(&parsed.table));

    let columns = profile_table(&parsed.table);
    log_info(
        Stage::Ingest,
        format!("📋 CSV has {} columns:", columns.len()),
    );
    for (i, profile) in columns.iter().enumerate() {
        log_info(
            Stage::Ingest,
            format!("[{:2}] {} ({:?}, {} empty)", i + 1, profile.name, profile.kind, profile.null_count),
        );
    }

    Ok(Inspection {
        preview: parsed.table.head(preview_rows).to_records(),
        csv_info,
        columns,
        warnings,
    })
}

/// Export CSV bytes per `request`.
pub fn export_bytes(
    bytes: &[u8],
    parse: &ParseOptions,
    request: &ExportRequest,
) -> PipelineResult<PipelineOutput> {
    let parsed = ingest(bytes, parse)?;
    let csv_info = CsvInfo::from_parse(&parsed);
    let mut warnings = csv_info.warnings();

    let processed = process_table(&parsed.table, &request.process)?;
    warnings.extend(processed.warnings);
    warnings.extend(validate(&processed.table));

    log_info(
        Stage::Export,
        format!("Writing {} file...", request.format.extension()),
    );
    let artifact = export_table(
        &processed.table,
        &request.mapping,
        request.format,
        &request.spreadsheet,
    )?;

    Ok(PipelineOutput {
        artifact,
        csv_info,
        rows_exported: processed.table.row_count(),
        warnings,
    })
}

/// Export a CSV file per `request`.
pub fn export_csv(
    path: &Path,
    parse: &ParseOptions,
    request: &ExportRequest,
) -> PipelineResult<PipelineOutput> {
    let bytes = std::fs::read(path).map_err(IngestError::from)?;
    export_bytes(&bytes, parse, request)
}

/// Merge CSV bytes into the `template` workbook per `request`.
pub fn fill_template_bytes(
    bytes: &[u8],
    parse: &ParseOptions,
    template: &[u8],
    request: &TemplateRequest,
) -> PipelineResult<PipelineOutput> {
    let parsed = ingest(bytes, parse)?;
    let csv_info = CsvInfo::from_parse(&parsed);
    let mut warnings = csv_info.warnings();

    let processed = process_table(&parsed.table, &request.process)?;
    warnings.extend(processed.warnings);
    warnings.extend(validate(&processed.table));

    log_info(
        Stage::Template,
        format!("Filling sheet '{}' with {} mappings...", request.sheet, request.mapping.len()),
    );
    let outcome = fill_template(
        template,
        &request.sheet,
        &processed.table,
        &request.mapping,
        request.category.as_ref(),
    )?;
    warnings.extend(outcome.warnings);

    Ok(PipelineOutput {
        artifact: outcome.artifact,
        csv_info,
        rows_exported: outcome.rows_written,
        warnings,
    })
}

fn ingest(bytes: &[u8], parse: &ParseOptions) -> PipelineResult<ParseResult> {
    log_info(Stage::Ingest, "📖 Reading CSV file...");
    Ok(parse_bytes_auto(bytes, parse)?)
}

fn validate(table: &Table) -> Vec<String> {
    log_info(Stage::Validate, "✔️  Checking email and phone columns...");
    let warnings = validate_table(table);
    if warnings.is_empty() {
        log_success(Stage::Validate, "No format problems found");
    }
    for warning in &warnings {
        log_warning(Stage::Validate, warning);
    }
    warnings
}
