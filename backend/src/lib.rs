//! # Dataexport - CSV cleaning and export
//!
//! Dataexport reads delimited text in whatever encoding and separator it
//! arrives in, lets the caller select, clean and filter columns, and writes the
//! result as a spreadsheet, CSV or JSON, or merges it into an existing
//! spreadsheet template.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│   Export    │
//! │ (any enc.)  │     │ (auto-enc,  │     │ (validate,  │     │ (xlsx, csv, │
//! │             │     │  auto-sep)  │     │  clean)     │     │  json, tpl) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dataexport::{export_csv, ExportRequest, ParseOptions};
//!
//! let output = export_csv("input.csv".as_ref(), &ParseOptions::default(), &ExportRequest::default())?;
//! std::fs::write("input.xlsx", &output.artifact.bytes)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Typed cells, columns and tables
//! - [`parser`] - CSV parsing with encoding and delimiter detection
//! - [`validation`] - Email and phone format warnings
//! - [`transform`] - Row processing, profiles and pipeline
//! - [`export`] - xlsx / csv / json writers and template filling
//! - [`config`] - Server configuration
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExportError, ExportResult, IngestError, IngestResult, PipelineError, PipelineResult,
    ProcessError, ProcessResult, ServerError, ServerResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Column, ColumnKind, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_encoding, parse_bytes_auto, parse_csv_file_auto, parse_table,
    resolve_delimiter, DelimiterSource, DetectedEncoding, ParseOptions, ParseResult,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::validate_table;

// =============================================================================
// Re-exports - Processing
// =============================================================================

pub use transform::{
    process_table, profile_table, CleaningOptions, ColumnFilter, ColumnProfile, DateWindow,
    MissingValuePolicy, ProcessOptions, Processed,
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{
    export_table, fill_template, CategoryFilter, ColumnMapping, ExportArtifact, ExportFormat,
    SpreadsheetStyle, TemplateOutcome,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    export_bytes, export_csv, fill_template_bytes, inspect_bytes, CsvInfo, ExportRequest,
    Inspection, PipelineOutput, TemplateRequest,
};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
    pub use crate::config::ServerConfig;
}
