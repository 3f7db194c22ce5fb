//! Processing options supplied by the caller.
//!
//! All of these deserialize from JSON so a request body or an options file
//! can carry them directly:
//!
//! ```json
//! {
//!   "selected_columns": ["name", "age", "joined"],
//!   "cleaning": { "missing": "drop_rows", "remove_duplicates": true },
//!   "filters": { "age": { "type": "numeric", "min": 18, "max": 65 } },
//!   "date_windows": {
//!     "joined": { "start": "2024-01-01", "end": "2024-12-31", "format": "%d/%m/%Y" }
//!   }
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::dates::DATE_OUTPUT_FORMATS;

/// Placeholder written into non-numeric cells by [`MissingValuePolicy::FillDefault`].
pub const FILL_PLACEHOLDER: &str = "Unknown";

/// What to do with null cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Leave nulls in place.
    #[default]
    Keep,
    /// Drop every row with a null in any selected column.
    DropRows,
    /// Numbers become 0, everything else [`FILL_PLACEHOLDER`].
    FillDefault,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    pub missing: MissingValuePolicy,
    pub remove_duplicates: bool,
}

/// Per-column row filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnFilter {
    /// Inclusive numeric range.
    Numeric { min: f64, max: f64 },
    /// Permitted values, compared on their text form.
    Categorical { values: Vec<String> },
}

/// Date window for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Inclusive.
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    /// chrono format for the rewritten values.
    #[serde(default = "default_date_format")]
    pub format: String,
}

fn default_enabled() -> bool {
    true
}

fn default_date_format() -> String {
    DATE_OUTPUT_FORMATS[0].to_string()
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate, format: impl Into<String>) -> Self {
        Self {
            enabled: true,
            start,
            end,
            format: format.into(),
        }
    }
}

/// Everything the row processor needs.
///
/// An empty `selected_columns` means every column, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessOptions {
    pub selected_columns: Vec<String>,
    pub cleaning: CleaningOptions,
    pub filters: HashMap<String, ColumnFilter>,
    pub date_windows: HashMap<String, DateWindow>,
}
