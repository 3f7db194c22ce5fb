//! Comma-separated output.

use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::error::{ExportError, ExportResult};
use crate::models::Table;

/// Header first, `\n` line endings, quotes only where a field needs them.
pub fn write_delimited(table: &Table) -> ExportResult<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .delimiter(b',')
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(table.column_names())?;
    for i in 0..table.row_count() {
        let row: Vec<String> = table
            .columns()
            .iter()
            .map(|c| c.values[i].to_text())
            .collect();
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}
