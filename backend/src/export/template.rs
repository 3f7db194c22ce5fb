//! Fill an existing xlsx template by header lookup.
//!
//! Row 1 of the target sheet is the header. Each mapping entry
//! `source column -> header text` resolves to the first header cell with that
//! text; surviving rows are written to rows 2, 3, ... in source order. Every
//! other sheet, row 1 itself, and cells no mapping touches are left as they
//! were in the template.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Cursor;

use super::{ColumnMapping, ExportArtifact, ExportFormat};
use crate::api::logs::{log_success, log_warning, Stage};
use crate::error::{ExportError, ExportResult};
use crate::models::{Cell, Table};

/// First data row (1-based); row 1 is the header.
pub const FIRST_DATA_ROW: u32 = 2;

/// Only rows whose `column` reads exactly `value` are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    pub column: String,
    pub value: String,
}

/// Filled workbook plus what happened.
#[derive(Debug, Clone)]
pub struct TemplateOutcome {
    pub artifact: ExportArtifact,
    pub rows_written: usize,
    pub warnings: Vec<String>,
}

fn xlsx_err(e: impl std::fmt::Display) -> ExportError {
    ExportError::Spreadsheet(e.to_string())
}

/// Write `table` into `sheet` of the `template` workbook.
///
/// The template buffer is never modified; a new workbook is returned.
pub fn fill_template(
    template: &[u8],
    sheet: &str,
    table: &Table,
    mapping: &ColumnMapping,
    category: Option<&CategoryFilter>,
) -> ExportResult<TemplateOutcome> {
    for source in mapping.keys() {
        if table.column(source).is_none() {
            return Err(ExportError::UnknownColumn(source.clone()));
        }
    }
    let rows = category_rows(table, category)?;

    let mut book =
        umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(template), true).map_err(xlsx_err)?;

    let available: Vec<String> = book
        .get_sheet_collection()
        .iter()
        .map(|s| s.get_name().to_string())
        .collect();
    let worksheet = book
        .get_sheet_collection_mut()
        .iter_mut()
        .find(|s| s.get_name() == sheet)
        .ok_or_else(|| ExportError::SheetNotFound {
            sheet: sheet.to_string(),
            available,
        })?;

    let headers = header_positions(worksheet);
    let mut warnings = Vec::new();

    // (source column index, destination column), in table order.
    let mut targets: Vec<(usize, u32)> = Vec::new();
    for (index, column) in table.columns().iter().enumerate() {
        let Some(destination) = mapping.get(&column.name) else {
            continue;
        };
        match headers.get(destination.trim()) {
            Some(&col) => targets.push((index, col)),
            None => {
                let warning = format!(
                    "Column '{}' not found in template header of sheet '{}'; mapping from '{}' skipped",
                    destination, sheet, column.name
                );
                log_warning(Stage::Template, &warning);
                warnings.push(warning);
            }
        }
    }

    for (offset, &row_index) in rows.iter().enumerate() {
        let row = FIRST_DATA_ROW + offset as u32;
        for &(column_index, col) in &targets {
            let cell = &table.columns()[column_index].values[row_index];
            match cell {
                Cell::Null => {}
                Cell::Number(n) => {
                    worksheet.get_cell_mut((col, row)).set_value_number(*n);
                }
                other => {
                    worksheet.get_cell_mut((col, row)).set_value_string(other.to_text());
                }
            }
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buffer).map_err(xlsx_err)?;

    log_success(
        Stage::Template,
        format!(
            "Filled {} rows into sheet '{}' ({} of {} mappings applied)",
            rows.len(),
            sheet,
            targets.len(),
            mapping.len()
        ),
    );

    Ok(TemplateOutcome {
        artifact: ExportArtifact::new(buffer.into_inner(), ExportFormat::Spreadsheet),
        rows_written: rows.len(),
        warnings,
    })
}

/// Header text to 1-based column index; the first occurrence wins.
fn header_positions(worksheet: &umya_spreadsheet::Worksheet) -> HashMap<String, u32> {
    let mut positions = HashMap::new();
    for col in 1..=worksheet.get_highest_column() {
        let text = worksheet.get_value((col, 1));
        let text = text.trim();
        if !text.is_empty() {
            positions.entry(text.to_string()).or_insert(col);
        }
    }
    positions
}

/// Indices of the rows that pass the category filter.
fn category_rows(table: &Table, category: Option<&CategoryFilter>) -> ExportResult<Vec<usize>> {
    let Some(filter) = category else {
        return Ok((0..table.row_count()).collect());
    };
    let column = table
        .column(&filter.column)
        .ok_or_else(|| ExportError::UnknownColumn(filter.column.clone()))?;
    Ok(column
        .values
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.to_text() == filter.value)
        .map(|(i, _)| i)
        .collect())
}
