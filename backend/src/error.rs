//! Error types for the export pipeline.
//!
//! One enum per stage, composed into [`PipelineError`]:
//!
//! - [`IngestError`] - encoding detection, delimiter resolution, parsing
//! - [`ProcessError`] - column selection and table shaping
//! - [`ExportError`] - serialization and template filling
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer
//!
//! Advisory problems (invalid emails, unparsable dates, template columns
//! missing from a header) are never errors: they travel as warning strings
//! next to the result.

use thiserror::Error;

// =============================================================================
// Ingestion Errors
// =============================================================================

/// Errors while turning uploaded bytes into a table.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No bytes, or no data rows survived parsing.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Neither the detected nor the fallback encoding could decode the bytes.
    #[error("Failed to decode file as '{encoding}' (fallback '{fallback}' also failed)")]
    Decode { encoding: String, fallback: String },

    /// Automatic detection failed; the caller should ask for a delimiter.
    #[error("Could not detect the delimiter automatically (tried {tried}); please enter it manually")]
    DelimiterRequired { tried: String },

    /// A manually supplied delimiter did not produce a usable table.
    #[error("Delimiter '{delimiter}' could not be used: {reason}")]
    UnresolvedDelimiter { delimiter: String, reason: String },

    /// The table is structurally degenerate.
    #[error("Invalid CSV format: {0}")]
    Parse(String),

    /// Failed to read the input file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Processing Errors
// =============================================================================

/// Errors while selecting, cleaning and filtering rows.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A selection, filter or date setting names a column that does not exist.
    #[error("Unknown column: '{0}'")]
    UnknownColumn(String),

    /// A date window's output format cannot render a date.
    #[error("Invalid date format '{format}' for column '{column}'")]
    InvalidDateFormat { column: String, format: String },

    /// Two columns would share a name.
    #[error("Duplicate column name: '{0}'")]
    DuplicateColumn(String),

    /// Columns of a table must all have the same number of rows.
    #[error("Column '{column}' has {found} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while serializing a table or filling a template.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Renaming produced the same output name twice.
    #[error("Column mapping produces duplicate column '{0}'")]
    DuplicateColumn(String),

    /// Header colour is not `#RRGGBB`.
    #[error("Invalid header color '{0}', expected #RRGGBB")]
    InvalidColor(String),

    /// Mapping or category filter names a column missing from the table.
    #[error("Unknown source column: '{0}'")]
    UnknownColumn(String),

    /// Template does not contain the requested sheet.
    #[error("Sheet '{sheet}' not found in template (available: {})", available.join(", "))]
    SheetNotFound {
        sheet: String,
        available: Vec<String>,
    },

    /// Spreadsheet library failure (reading or writing a workbook).
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while flushing a buffer.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline`]. Each
/// variant names the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Ingestion failed.
    #[error("Ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    /// Row processing failed.
    #[error("Processing failed: {0}")]
    Process(#[from] ProcessError),

    /// Export or template fill failed.
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

impl PipelineError {
    /// True when the caller should prompt for a manual delimiter and retry.
    pub fn needs_manual_delimiter(&self) -> bool {
        matches!(self, PipelineError::Ingest(IngestError::DelimiterRequired { .. }))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Environment variable with an unusable value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Socket or runtime failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for ingestion.
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type for row processing.
pub type ProcessResult<T> = Result<T, ProcessError>;

/// Result type for export and template filling.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
