//! Domain models for the export pipeline.
//!
//! - [`Cell`] - a typed scalar (null, number, text or date)
//! - [`ColumnKind`] - the type of a column, decided once at parse time
//! - [`Column`] - a named, typed sequence of cells
//! - [`Table`] - ordered, uniquely named, equally long columns
//!
//! Row-level operations ([`Table::retain_rows`], [`Table::select`]) work
//! across every column at once, so a row is either kept whole or dropped whole.

pub mod dates;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::error::{ProcessError, ProcessResult};
use dates::{format_datetime, parse_date};

/// Raw tokens read as missing values.
pub const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];

// =============================================================================
// Cells
// =============================================================================

/// A single table value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view of the cell. Text is accepted when it reads as a finite number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Stringified form used for comparisons, validation and text export.
    /// Null becomes the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
            Cell::Date(d) => format_datetime(d),
        }
    }

    /// JSON form used for record-list export.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Number(n) if is_integral(*n) => Value::from(*n as i64),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Date(d) => Value::String(format_datetime(d)),
        }
    }

    /// Key used to compare whole rows; distinguishes `Number(1)` from `Text("1")`.
    fn row_key(&self) -> String {
        match self {
            Cell::Null => "\u{0}".to_string(),
            Cell::Number(n) => format!("n:{}", format_number(*n)),
            Cell::Text(s) => format!("t:{}", s),
            Cell::Date(d) => format!("d:{}", d),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse a finite number, ignoring surrounding whitespace.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn is_null_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    NULL_TOKENS.contains(&trimmed)
}

// =============================================================================
// Columns
// =============================================================================

/// Type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Number,
    Text,
    Date,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind, values: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Build a column from raw strings, inferring its kind.
    ///
    /// Every non-null value a finite number ⇒ `Number`; every non-null value a
    /// date ⇒ `Date`; anything else (including an all-null column) ⇒ `Text`.
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, raw: &[S]) -> Self {
        let present: Vec<&str> = raw
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !is_null_token(s))
            .collect();

        let kind = if present.is_empty() {
            ColumnKind::Text
        } else if present.iter().all(|s| parse_number(s).is_some()) {
            ColumnKind::Number
        } else if present.iter().all(|s| parse_date(s).is_some()) {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        };

        let values = raw
            .iter()
            .map(|s| {
                let s = s.as_ref();
                if is_null_token(s) {
                    return Cell::Null;
                }
                match kind {
                    ColumnKind::Number => parse_number(s).map(Cell::Number),
                    ColumnKind::Date => parse_date(s).map(Cell::Date),
                    ColumnKind::Text => Some(Cell::Text(s.to_string())),
                }
                .unwrap_or(Cell::Null)
            })
            .collect();

        Self::new(name, kind, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|c| c.is_null()).count()
    }
}

// =============================================================================
// Tables
// =============================================================================

/// An ordered set of uniquely named columns with aligned rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking that names are unique and lengths agree.
    pub fn from_columns(columns: Vec<Column>) -> ProcessResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ProcessError::DuplicateColumn(column.name.clone()));
            }
        }

        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(ProcessError::RaggedColumn {
                    column: bad.name.clone(),
                    expected,
                    found: bad.len(),
                });
            }
        }

        Ok(Self { columns })
    }

    /// Build a table from a header and raw string rows, inferring column kinds.
    /// Rows must already have one value per header.
    pub fn from_raw_rows(headers: &[String], rows: &[Vec<String>]) -> ProcessResult<Self> {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let raw: Vec<&str> = rows
                    .iter()
                    .map(|r| r.get(i).map(String::as_str).unwrap_or(""))
                    .collect();
                Column::from_raw(name.clone(), &raw)
            })
            .collect();
        Self::from_columns(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Cell>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Key identifying the full content of a row.
    pub fn row_key(&self, index: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.values[index].row_key())
            .collect()
    }

    /// New table holding `names` in the given order.
    pub fn select(&self, names: &[String]) -> ProcessResult<Table> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| ProcessError::UnknownColumn(name.clone()))
            })
            .collect::<ProcessResult<Vec<_>>>()?;
        Table::from_columns(columns)
    }

    /// Keep only the rows whose flag is `true`, across every column.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        debug_assert_eq!(keep.len(), self.row_count());
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.values.retain(|_| *flags.next().unwrap_or(&false));
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.kind, c.values.iter().take(n).cloned().collect()))
            .collect();
        Table { columns }
    }

    /// Rows as JSON objects keyed by column name, in column order.
    pub fn to_records(&self) -> Vec<Value> {
        (0..self.row_count())
            .map(|i| {
                let record: serde_json::Map<String, Value> = self
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[i].to_json()))
                    .collect();
                Value::Object(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_infer_number_column() {
        let col = Column::from_raw("age", &["30", " 25 ", "", "1.5"]);
        assert_eq!(col.kind, ColumnKind::Number);
        assert_eq!(col.values[0], Cell::Number(30.0));
        assert_eq!(col.values[1], Cell::Number(25.0));
        assert_eq!(col.values[2], Cell::Null);
        assert_eq!(col.values[3], Cell::Number(1.5));
    }

    #[test]
    fn test_infer_text_and_null_tokens() {
        let col = Column::from_raw("name", &["Alice", "NA", "42"]);
        assert_eq!(col.kind, ColumnKind::Text);
        assert_eq!(col.values[1], Cell::Null);
        assert_eq!(col.values[2], Cell::Text("42".into()));
        assert_eq!(col.null_count(), 1);
    }

    #[test]
    fn test_infer_date_column() {
        let col = Column::from_raw("joined", &["2024-01-05", "2023-12-31"]);
        assert_eq!(col.kind, ColumnKind::Date);
        assert_eq!(col.values[0].to_text(), "2024-01-05");
    }

    #[test]
    fn test_all_null_column_is_text() {
        let col = Column::from_raw("empty", &["", "null"]);
        assert_eq!(col.kind, ColumnKind::Text);
        assert!(col.values.iter().all(Cell::is_null));
    }

    #[test]
    fn test_infinity_is_not_a_number() {
        let col = Column::from_raw("x", &["inf", "1"]);
        assert_eq!(col.kind, ColumnKind::Text);
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(Cell::Number(10.0).to_json(), serde_json::json!(10));
        assert_eq!(Cell::Number(0.25).to_json(), serde_json::json!(0.25));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Table::from_columns(vec![
            Column::from_raw("a", &["1"]),
            Column::from_raw("a", &["2"]),
        ]);
        assert!(matches!(result, Err(ProcessError::DuplicateColumn(name)) if name == "a"));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = Table::from_columns(vec![
            Column::from_raw("a", &["1", "2"]),
            Column::from_raw("b", &["x"]),
        ]);
        assert!(matches!(result, Err(ProcessError::RaggedColumn { .. })));
    }

    #[test]
    fn test_retain_rows_is_atomic() {
        let mut table = Table::from_raw_rows(
            &strings(&["a", "b"]),
            &[strings(&["1", "x"]), strings(&["2", "y"]), strings(&["3", "z"])],
        )
        .unwrap();
        table.retain_rows(&[true, false, true]);

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("a").unwrap().values, vec![Cell::Number(1.0), Cell::Number(3.0)]);
        assert_eq!(
            table.column("b").unwrap().values,
            vec![Cell::Text("x".into()), Cell::Text("z".into())]
        );
    }

    #[test]
    fn test_select_reorders_and_rejects_unknown() {
        let table = Table::from_raw_rows(&strings(&["a", "b"]), &[strings(&["1", "x"])]).unwrap();

        let selected = table.select(&strings(&["b", "a"])).unwrap();
        assert_eq!(selected.column_names(), strings(&["b", "a"]));

        let err = table.select(&strings(&["c"])).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownColumn(name) if name == "c"));
    }

    #[test]
    fn test_records_keep_column_order() {
        let table = Table::from_raw_rows(&strings(&["z", "a"]), &[strings(&["1", "x"])]).unwrap();
        let records = table.to_records();
        let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
