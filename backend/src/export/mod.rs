//! Table serialization.
//!
//! Three output formats share one entry point, [`export_table`]:
//!
//! | Format | Writer | Content type |
//! |--------|--------|--------------|
//! | [`ExportFormat::Spreadsheet`] | `rust_xlsxwriter` | xlsx |
//! | [`ExportFormat::DelimitedText`] | `csv` | text/csv |
//! | [`ExportFormat::RecordList`] | `serde_json` | application/json |
//!
//! Column renames from the [`ColumnMapping`] are applied first; the writers
//! only ever see final names. Template filling lives in [`template`].

pub mod delimited;
pub mod records;
pub mod spreadsheet;
pub mod template;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::api::logs::{log_success, Stage};
use crate::error::{ExportError, ExportResult};
use crate::models::Table;

pub use spreadsheet::SpreadsheetStyle;
pub use template::{fill_template, CategoryFilter, TemplateOutcome};

/// Source column name to output name (or template header identifier).
pub type ColumnMapping = HashMap<String, String>;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    #[serde(alias = "xlsx", alias = "excel")]
    Spreadsheet,
    #[serde(alias = "csv")]
    DelimitedText,
    #[serde(alias = "json")]
    RecordList,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Spreadsheet => XLSX_CONTENT_TYPE,
            ExportFormat::DelimitedText => "text/csv",
            ExportFormat::RecordList => "application/json",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Spreadsheet => "xlsx",
            ExportFormat::DelimitedText => "csv",
            ExportFormat::RecordList => "json",
        }
    }
}

/// Serialized output ready to hand back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub extension: &'static str,
}

impl ExportArtifact {
    pub fn new(bytes: Vec<u8>, format: ExportFormat) -> Self {
        Self {
            bytes,
            content_type: format.content_type(),
            extension: format.extension(),
        }
    }
}

/// Rename columns per `mapping`; unmapped columns keep their name.
///
/// Two columns ending up with the same name is an error. Mapping entries for
/// columns that are not in the table are ignored.
pub fn rename_columns(table: &Table, mapping: &ColumnMapping) -> ExportResult<Table> {
    let mut seen = HashSet::new();
    let mut columns = table.columns().to_vec();
    for column in &mut columns {
        if let Some(new_name) = mapping.get(&column.name) {
            column.name = new_name.clone();
        }
        if !seen.insert(column.name.clone()) {
            return Err(ExportError::DuplicateColumn(column.name.clone()));
        }
    }
    Table::from_columns(columns).map_err(|e| ExportError::DuplicateColumn(e.to_string()))
}

/// Rename, then serialize `table` in `format`.
pub fn export_table(
    table: &Table,
    mapping: &ColumnMapping,
    format: ExportFormat,
    style: &SpreadsheetStyle,
) -> ExportResult<ExportArtifact> {
    let renamed = rename_columns(table, mapping)?;

    let bytes = match format {
        ExportFormat::Spreadsheet => spreadsheet::write_spreadsheet(&renamed, style)?,
        ExportFormat::DelimitedText => delimited::write_delimited(&renamed)?,
        ExportFormat::RecordList => records::write_records(&renamed)?,
    };

    log_success(
        Stage::Export,
        format!(
            "Exported {} rows as {} ({} bytes)",
            renamed.row_count(),
            format.extension(),
            bytes.len()
        ),
    );
    Ok(ExportArtifact::new(bytes, format))
}
