//! JSON record-list output: one flat object per row, keys in column order.

use serde_json::Value;

use crate::error::ExportResult;
use crate::models::Table;

pub fn write_records(table: &Table) -> ExportResult<Vec<u8>> {
    let records = Value::Array(table.to_records());
    Ok(serde_json::to_vec_pretty(&records)?)
}
