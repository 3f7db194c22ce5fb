//! Fresh xlsx output with optional header cosmetics.

use rust_xlsxwriter::{Color, Format, FormatPattern, Workbook, Worksheet, XlsxError};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ExportResult};
use crate::models::{Cell, Table};

/// Name of the single sheet written.
pub const SHEET_NAME: &str = "Sheet1";

/// Header fill used when none is given.
pub const DEFAULT_HEADER_COLOR: &str = "#4F81BD";

/// Widest column Excel accepts.
const MAX_COLUMN_WIDTH: usize = 255;

/// Cosmetics for spreadsheet output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetStyle {
    /// Size each column to its widest value plus two.
    pub auto_width: bool,
    /// `#RRGGBB` fill for the header row; `None` leaves the header plain.
    pub header_color: Option<String>,
    /// Keep the header visible while scrolling.
    pub freeze_header: bool,
}

impl Default for SpreadsheetStyle {
    fn default() -> Self {
        Self {
            auto_width: true,
            header_color: Some(DEFAULT_HEADER_COLOR.to_string()),
            freeze_header: true,
        }
    }
}

impl SpreadsheetStyle {
    /// No cosmetics at all.
    pub fn plain() -> Self {
        Self {
            auto_width: false,
            header_color: None,
            freeze_header: false,
        }
    }
}

/// Parse `#RRGGBB` into a 24-bit RGB value.
pub fn parse_color(raw: &str) -> ExportResult<u32> {
    let hex = raw
        .strip_prefix('#')
        .filter(|h| h.len() == 6 && h.chars().all(|c| c.is_ascii_hexdigit()))
        .ok_or_else(|| ExportError::InvalidColor(raw.to_string()))?;
    u32::from_str_radix(hex, 16).map_err(|_| ExportError::InvalidColor(raw.to_string()))
}

fn xlsx_err(e: XlsxError) -> ExportError {
    ExportError::Spreadsheet(e.to_string())
}

/// Write `table` to a new single-sheet workbook.
///
/// Numbers become numeric cells, text and dates become strings, nulls are
/// left blank.
pub fn write_spreadsheet(table: &Table, style: &SpreadsheetStyle) -> ExportResult<Vec<u8>> {
    let header_format = match &style.header_color {
        Some(color) => Format::new()
            .set_bold()
            .set_text_wrap()
            .set_pattern(FormatPattern::Solid)
            .set_background_color(Color::RGB(parse_color(color)?)),
        None => Format::new(),
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_err)?;

    for (c, column) in table.columns().iter().enumerate() {
        let col = column_index(c)?;
        sheet
            .write_string_with_format(0, col, &column.name, &header_format)
            .map_err(xlsx_err)?;

        for (r, cell) in column.values.iter().enumerate() {
            write_cell(sheet, row_index(r + 1)?, col, cell)?;
        }

        if style.auto_width {
            let widest = column
                .values
                .iter()
                .map(|cell| cell.to_text().chars().count())
                .chain(std::iter::once(column.name.chars().count()))
                .max()
                .unwrap_or(0);
            let width = (widest + 2).min(MAX_COLUMN_WIDTH);
            sheet.set_column_width(col, width as f64).map_err(xlsx_err)?;
        }
    }

    if style.freeze_header {
        sheet.set_freeze_panes(1, 0).map_err(xlsx_err)?;
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> ExportResult<()> {
    match cell {
        Cell::Null => {}
        Cell::Number(n) => {
            sheet.write_number(row, col, *n).map_err(xlsx_err)?;
        }
        other => {
            sheet
                .write_string(row, col, other.to_text())
                .map_err(xlsx_err)?;
        }
    }
    Ok(())
}

fn column_index(index: usize) -> ExportResult<u16> {
    u16::try_from(index).map_err(|_| ExportError::Spreadsheet(format!("too many columns ({})", index + 1)))
}

fn row_index(index: usize) -> ExportResult<u32> {
    u32::try_from(index).map_err(|_| ExportError::Spreadsheet(format!("too many rows ({})", index + 1)))
}
