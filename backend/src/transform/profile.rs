//! Column profiles used to pre-fill filter and date-window controls.
//!
//! Numeric columns report their range, other columns their distinct values,
//! and date-like columns their earliest and latest dates (the default window).
//! Applying a column's default filter never removes a row.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::options::{ColumnFilter, DateWindow};
use crate::models::dates::{parse_date, DATE_OUTPUT_FORMATS};
use crate::models::{Cell, Column, ColumnKind, Table};

/// Distinct values listed per column at most.
pub const MAX_DISTINCT_VALUES: usize = 500;

static ISO_DATE_FRAGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date regex"));

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

/// Summary of one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub null_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericRange>,
    /// Distinct text values in first-seen order, capped at [`MAX_DISTINCT_VALUES`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_values: Option<Vec<String>>,
    /// True when the list above was cut short.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<DateRange>,
}

impl ColumnProfile {
    /// Filter that keeps every row.
    ///
    /// Nulls fail a numeric range, so a numeric column with nulls gets no
    /// default filter. A categorical default also permits the empty string,
    /// which is how nulls compare.
    pub fn default_filter(&self) -> Option<ColumnFilter> {
        if let Some(range) = &self.numeric {
            return (self.null_count == 0).then(|| ColumnFilter::Numeric {
                min: range.min,
                max: range.max,
            });
        }
        self.distinct_values
            .as_ref()
            .filter(|_| !self.truncated)
            .map(|values| {
                let mut values = values.clone();
                if self.null_count > 0 {
                    values.push(String::new());
                }
                ColumnFilter::Categorical { values }
            })
    }

    /// Window spanning every date in the column.
    pub fn default_date_window(&self) -> Option<DateWindow> {
        self.dates
            .as_ref()
            .map(|r| DateWindow::new(r.earliest, r.latest, DATE_OUTPUT_FORMATS[0]))
    }
}

/// Profile every column of `table`.
pub fn profile_table(table: &Table) -> Vec<ColumnProfile> {
    table.columns().iter().map(profile_column).collect()
}

pub fn profile_column(column: &Column) -> ColumnProfile {
    let numeric = if column.kind == ColumnKind::Number {
        column
            .values
            .iter()
            .filter_map(Cell::as_number)
            .fold(None, |acc: Option<NumericRange>, n| match acc {
                None => Some(NumericRange { min: n, max: n }),
                Some(r) => Some(NumericRange {
                    min: r.min.min(n),
                    max: r.max.max(n),
                }),
            })
    } else {
        None
    };

    let (distinct_values, truncated) = if numeric.is_none() {
        let (values, truncated) = distinct(column);
        (Some(values), truncated)
    } else {
        (None, false)
    };

    ColumnProfile {
        name: column.name.clone(),
        kind: column.kind,
        null_count: column.null_count(),
        numeric,
        distinct_values,
        truncated,
        dates: date_range(column),
    }
}

fn distinct(column: &Column) -> (Vec<String>, bool) {
    let mut seen = std::collections::HashSet::new();
    let mut values = Vec::new();
    for text in column.values.iter().filter(|c| !c.is_null()).map(Cell::to_text) {
        if seen.insert(text.clone()) {
            if values.len() == MAX_DISTINCT_VALUES {
                return (values, true);
            }
            values.push(text);
        }
    }
    (values, false)
}

/// Earliest and latest dates of a date-like column.
///
/// Date columns qualify, as do text columns containing a `YYYY-MM-DD`
/// fragment; unparsable cells are ignored here.
fn date_range(column: &Column) -> Option<DateRange> {
    let date_like = match column.kind {
        ColumnKind::Date => true,
        ColumnKind::Text => column
            .values
            .iter()
            .any(|c| matches!(c, Cell::Text(s) if ISO_DATE_FRAGMENT.is_match(s))),
        ColumnKind::Number => false,
    };
    if !date_like {
        return None;
    }

    let dates: Vec<NaiveDate> = column
        .values
        .iter()
        .filter_map(|c| match c {
            Cell::Date(d) => Some(d.date()),
            Cell::Text(s) => parse_date(s).map(|d| d.date()),
            _ => None,
        })
        .collect();

    Some(DateRange {
        earliest: *dates.iter().min()?,
        latest: *dates.iter().max()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_profile() {
        let col = Column::from_raw("age", &["30", "", "18", "42"]);
        let profile = profile_column(&col);

        assert_eq!(profile.null_count, 1);
        assert_eq!(profile.numeric, Some(NumericRange { min: 18.0, max: 42.0 }));
        assert!(profile.default_filter().is_none());
        assert!(profile.dates.is_none());
    }

    #[test]
    fn test_numeric_default_filter_without_nulls() {
        let col = Column::from_raw("age", &["30", "18", "42"]);
        assert_eq!(
            profile_column(&col).default_filter(),
            Some(ColumnFilter::Numeric { min: 18.0, max: 42.0 })
        );
    }

    #[test]
    fn test_default_filters_keep_null_rows() {
        use crate::transform::options::{MissingValuePolicy, ProcessOptions};
        use crate::transform::processor::process_table;

        let table = Table::from_columns(vec![
            Column::from_raw("age", &["30", "", "18"]),
            Column::from_raw("city", &["Paris", "Lyon", ""]),
        ])
        .unwrap();

        let mut options = ProcessOptions::default();
        assert_eq!(options.cleaning.missing, MissingValuePolicy::Keep);
        for profile in profile_table(&table) {
            if let Some(filter) = profile.default_filter() {
                options.filters.insert(profile.name.clone(), filter);
            }
        }
        assert_eq!(
            options.filters["city"],
            ColumnFilter::Categorical {
                values: vec!["Paris".into(), "Lyon".into(), String::new()]
            }
        );

        let out = process_table(&table, &options).unwrap().table;
        assert_eq!(out, table);
    }

    #[test]
    fn test_categorical_profile() {
        let col = Column::from_raw("city", &["Paris", "Lyon", "Paris"]);
        let profile = profile_column(&col);

        assert_eq!(profile.distinct_values, Some(vec!["Paris".into(), "Lyon".into()]));
        assert!(matches!(profile.default_filter(), Some(ColumnFilter::Categorical { values }) if values.len() == 2));
    }

    #[test]
    fn test_date_profile() {
        let col = Column::from_raw("joined", &["2024-03-01", "2023-11-20", "2024-01-01"]);
        let profile = profile_column(&col);

        let range = profile.dates.clone().unwrap();
        assert_eq!(range.earliest, NaiveDate::from_ymd_opt(2023, 11, 20).unwrap());
        assert_eq!(range.latest, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let window = profile.default_date_window().unwrap();
        assert_eq!(window.format, "%Y-%m-%d");
    }

    #[test]
    fn test_text_with_iso_fragment_is_date_like() {
        let col = Column::from_raw("note", &["due 2024-03-01", "2024-02-01", "n/a"]);
        let profile = profile_column(&col);
        let range = profile.dates.unwrap();
        assert_eq!(range.earliest, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_distinct_values_capped() {
        let raw: Vec<String> = (0..MAX_DISTINCT_VALUES + 10).map(|i| format!("v{}", i)).collect();
        let col = Column::from_raw("id", &raw);
        let profile = profile_column(&col);

        assert!(profile.truncated);
        assert_eq!(profile.distinct_values.as_ref().unwrap().len(), MAX_DISTINCT_VALUES);
        assert!(profile.default_filter().is_none());
    }
}
