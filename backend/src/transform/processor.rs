//! Row processor: selection, date windows, missing values, duplicates, filters.
//!
//! Steps run strictly in this order, each one seeing only what the previous
//! steps kept:
//!
//! 1. project to the selected columns
//! 2. date windows (drop rows outside, rewrite the rest)
//! 3. missing-value policy
//! 4. duplicate removal
//! 5. column filters
//!
//! Running the processor again on its own output with the same options
//! changes nothing.

use std::collections::HashSet;
use std::fmt::Write;

use chrono::NaiveDateTime;

use super::options::{
    CleaningOptions, ColumnFilter, DateWindow, MissingValuePolicy, ProcessOptions, FILL_PLACEHOLDER,
};
use crate::api::logs::{log_info, log_success, log_warning, Stage};
use crate::error::{ProcessError, ProcessResult};
use crate::models::dates::parse_date_with;
use crate::models::{Cell, ColumnKind, Table};

/// Processed table plus advisory warnings.
#[derive(Debug, Clone)]
pub struct Processed {
    pub table: Table,
    pub warnings: Vec<String>,
}

/// Run the full processing sequence on `table`.
pub fn process_table(table: &Table, options: &ProcessOptions) -> ProcessResult<Processed> {
    let selected = if options.selected_columns.is_empty() {
        table.column_names()
    } else {
        options.selected_columns.clone()
    };

    check_known(&selected, options.filters.keys())?;
    check_known(&selected, options.date_windows.keys())?;
    for (name, window) in options.date_windows.iter().filter(|(_, w)| w.enabled) {
        if !renders_dates(&window.format) {
            return Err(ProcessError::InvalidDateFormat {
                column: name.clone(),
                format: window.format.clone(),
            });
        }
    }

    let before = table.row_count();
    let mut output = table.select(&selected)?;
    let mut warnings = Vec::new();

    for name in &selected {
        if let Some(window) = options.date_windows.get(name).filter(|w| w.enabled) {
            if let Some(warning) = apply_date_window(&mut output, name, window) {
                log_warning(Stage::Process, &warning);
                warnings.push(warning);
            }
        }
    }

    apply_missing_policy(&mut output, &options.cleaning);

    if options.cleaning.remove_duplicates {
        remove_duplicates(&mut output);
    }

    for name in &selected {
        if let Some(filter) = options.filters.get(name) {
            apply_filter(&mut output, name, filter);
        }
    }

    log_success(
        Stage::Process,
        format!(
            "{} of {} rows kept across {} columns",
            output.row_count(),
            before,
            output.column_count()
        ),
    );

    Ok(Processed {
        table: output,
        warnings,
    })
}

fn check_known<'a>(
    selected: &[String],
    mut names: impl Iterator<Item = &'a String>,
) -> ProcessResult<()> {
    match names.find(|n| !selected.contains(n)) {
        Some(unknown) => Err(ProcessError::UnknownColumn(unknown.clone())),
        None => Ok(()),
    }
}

/// Whether `format` can render a date without a time zone.
pub fn renders_dates(format: &str) -> bool {
    let sample = NaiveDateTime::default();
    let mut out = String::new();
    write!(out, "{}", sample.format(format)).is_ok()
}

/// Drop rows outside the window and rewrite the survivors in `window.format`.
///
/// If any non-null cell cannot be read as a date, or `window.format` cannot
/// render one, the column is left as is and a warning is returned. Null cells
/// are kept for the missing-value step.
pub fn apply_date_window(table: &mut Table, name: &str, window: &DateWindow) -> Option<String> {
    let column = table.column(name)?;
    if !renders_dates(&window.format) {
        return Some(format!(
            "Column '{}': date format '{}' is invalid; date window skipped",
            name, window.format
        ));
    }

    let mut parsed = Vec::with_capacity(column.len());
    for cell in &column.values {
        let date = match cell {
            Cell::Null => None,
            Cell::Date(d) => Some(*d),
            other => match parse_date_with(&other.to_text(), Some(&window.format)) {
                Some(d) => Some(d),
                None => {
                    return Some(format!(
                        "Column '{}': value '{}' is not a date; date window skipped",
                        name,
                        other.to_text()
                    ))
                }
            },
        };
        parsed.push(date);
    }

    let keep: Vec<bool> = parsed
        .iter()
        .map(|d| match d {
            Some(d) => {
                let day = d.date();
                day >= window.start && day <= window.end
            }
            None => true,
        })
        .collect();

    let column = table.column_mut(name)?;
    column.kind = ColumnKind::Text;
    column.values = parsed
        .iter()
        .map(|d| match d {
            Some(d) => {
                let mut text = String::new();
                // renders_dates already accepted this format
                let _ = write!(text, "{}", d.format(&window.format));
                Cell::Text(text)
            }
            None => Cell::Null,
        })
        .collect();

    let dropped = keep.iter().filter(|k| !**k).count();
    table.retain_rows(&keep);
    log_info(
        Stage::Process,
        format!(
            "Date window {}..{} on '{}': {} rows dropped",
            window.start, window.end, name, dropped
        ),
    );
    None
}

/// Apply the missing-value policy to every column.
pub fn apply_missing_policy(table: &mut Table, cleaning: &CleaningOptions) {
    match cleaning.missing {
        MissingValuePolicy::Keep => {}
        MissingValuePolicy::DropRows => {
            let keep: Vec<bool> = (0..table.row_count())
                .map(|i| table.columns().iter().all(|c| !c.values[i].is_null()))
                .collect();
            table.retain_rows(&keep);
        }
        MissingValuePolicy::FillDefault => {
            for column in table.columns_mut() {
                if column.null_count() == 0 {
                    continue;
                }
                let fill = match column.kind {
                    ColumnKind::Number => Cell::Number(0.0),
                    ColumnKind::Text | ColumnKind::Date => Cell::Text(FILL_PLACEHOLDER.to_string()),
                };
                if column.kind == ColumnKind::Date {
                    column.kind = ColumnKind::Text;
                }
                for cell in column.values.iter_mut().filter(|c| c.is_null()) {
                    *cell = fill.clone();
                }
            }
        }
    }
}

/// Keep the first occurrence of each distinct row.
pub fn remove_duplicates(table: &mut Table) {
    let mut seen = HashSet::new();
    let keep: Vec<bool> = (0..table.row_count())
        .map(|i| seen.insert(table.row_key(i)))
        .collect();
    table.retain_rows(&keep);
}

/// Keep the rows whose cell in `name` satisfies `filter`.
pub fn apply_filter(table: &mut Table, name: &str, filter: &ColumnFilter) {
    let Some(column) = table.column(name) else {
        return;
    };

    let keep: Vec<bool> = match filter {
        ColumnFilter::Numeric { min, max } => column
            .values
            .iter()
            .map(|c| c.as_number().is_some_and(|n| n >= *min && n <= *max))
            .collect(),
        ColumnFilter::Categorical { values } => {
            let permitted: HashSet<&str> = values.iter().map(String::as_str).collect();
            column
                .values
                .iter()
                .map(|c| permitted.contains(c.to_text().as_str()))
                .collect()
        }
    };

    table.retain_rows(&keep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn filters<I, S>(entries: I) -> HashMap<String, ColumnFilter>
    where
        I: IntoIterator<Item = (S, ColumnFilter)>,
        S: Into<String>,
    {
        entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
    }

    fn table(columns: Vec<Column>) -> Table {
        Table::from_columns(columns).unwrap()
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unknown_selection() {
        let t = table(vec![Column::from_raw("a", &["1"])]);
        let options = ProcessOptions {
            selected_columns: names(&["a", "missing"]),
            ..ProcessOptions::default()
        };
        let err = process_table(&t, &options).unwrap_err();
        assert!(matches!(err, ProcessError::UnknownColumn(name) if name == "missing"));
    }

    #[test]
    fn test_filter_on_unselected_column_rejected() {
        let t = table(vec![Column::from_raw("a", &["1"]), Column::from_raw("b", &["2"])]);
        let options = ProcessOptions {
            selected_columns: names(&["a"]),
            filters: filters([("b", ColumnFilter::Numeric { min: 0.0, max: 1.0 })]),
            ..ProcessOptions::default()
        };
        assert!(matches!(
            process_table(&t, &options),
            Err(ProcessError::UnknownColumn(name)) if name == "b"
        ));
    }

    #[test]
    fn test_projection_keeps_selection_order() {
        let t = table(vec![
            Column::from_raw("a", &["1"]),
            Column::from_raw("b", &["x"]),
            Column::from_raw("c", &["y"]),
        ]);
        let options = ProcessOptions {
            selected_columns: names(&["c", "a"]),
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(out.table.column_names(), names(&["c", "a"]));
    }

    #[test]
    fn test_numeric_filter_inclusive() {
        let t = table(vec![Column::from_raw("n", &["1", "5", "10"])]);
        let options = ProcessOptions {
            filters: filters([("n", ColumnFilter::Numeric { min: 3.0, max: 10.0 })]),
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(
            out.table.column("n").unwrap().values,
            vec![Cell::Number(5.0), Cell::Number(10.0)]
        );
    }

    #[test]
    fn test_numeric_filter_drops_nulls() {
        let t = table(vec![Column::from_raw("n", &["4", ""])]);
        let mut out = t.clone();
        apply_filter(&mut out, "n", &ColumnFilter::Numeric { min: 0.0, max: 9.0 });
        assert_eq!(out.row_count(), 1);
    }

    #[test]
    fn test_categorical_filter() {
        let t = table(vec![
            Column::from_raw("city", &["Paris", "Lyon", "Nice"]),
            Column::from_raw("n", &["1", "2", "3"]),
        ]);
        let options = ProcessOptions {
            filters: filters([(
                "city",
                ColumnFilter::Categorical {
                    values: names(&["Paris", "Nice"]),
                },
            )]),
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(
            out.table.column("n").unwrap().values,
            vec![Cell::Number(1.0), Cell::Number(3.0)]
        );
    }

    #[test]
    fn test_categorical_filter_on_numbers_uses_text_form() {
        let mut t = table(vec![Column::from_raw("n", &["1", "2.5", "3"])]);
        apply_filter(
            &mut t,
            "n",
            &ColumnFilter::Categorical {
                values: names(&["1", "2.5"]),
            },
        );
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn test_drop_rows_removes_any_null() {
        let t = table(vec![
            Column::from_raw("a", &["1", "", "3"]),
            Column::from_raw("b", &["x", "y", ""]),
        ]);
        let options = ProcessOptions {
            cleaning: CleaningOptions {
                missing: MissingValuePolicy::DropRows,
                remove_duplicates: false,
            },
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(out.table.row_count(), 1);
        assert!(out.table.columns().iter().all(|c| c.null_count() == 0));
    }

    #[test]
    fn test_fill_default_by_kind() {
        let t = table(vec![
            Column::from_raw("n", &["1", ""]),
            Column::from_raw("s", &["", "x"]),
        ]);
        let options = ProcessOptions {
            cleaning: CleaningOptions {
                missing: MissingValuePolicy::FillDefault,
                remove_duplicates: false,
            },
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(out.table.column("n").unwrap().values[1], Cell::Number(0.0));
        assert_eq!(
            out.table.column("s").unwrap().values[0],
            Cell::Text(FILL_PLACEHOLDER.into())
        );
    }

    #[test]
    fn test_remove_duplicates_keeps_first() {
        let t = table(vec![
            Column::from_raw("a", &["1", "1", "2", "1"]),
            Column::from_raw("b", &["x", "x", "x", "y"]),
        ]);
        let options = ProcessOptions {
            cleaning: CleaningOptions {
                missing: MissingValuePolicy::Keep,
                remove_duplicates: true,
            },
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(out.table.row_count(), 3);
        assert_eq!(
            out.table.column("b").unwrap().values,
            vec![Cell::Text("x".into()), Cell::Text("x".into()), Cell::Text("y".into())]
        );
    }

    #[test]
    fn test_duplicates_judged_on_selected_columns_only() {
        let t = table(vec![
            Column::from_raw("a", &["1", "1"]),
            Column::from_raw("id", &["10", "11"]),
        ]);
        let options = ProcessOptions {
            selected_columns: names(&["a"]),
            cleaning: CleaningOptions {
                missing: MissingValuePolicy::Keep,
                remove_duplicates: true,
            },
            ..ProcessOptions::default()
        };
        assert_eq!(process_table(&t, &options).unwrap().table.row_count(), 1);
    }

    #[test]
    fn test_date_window_filters_and_reformats() {
        let t = table(vec![
            Column::from_raw("joined", &["2024-01-15", "2023-12-31", "2024-03-01"]),
            Column::from_raw("id", &["1", "2", "3"]),
        ]);
        let mut windows = HashMap::new();
        windows.insert(
            "joined".to_string(),
            DateWindow::new(ymd(2024, 1, 1), ymd(2024, 3, 1), "%d/%m/%Y"),
        );
        let options = ProcessOptions {
            date_windows: windows,
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();

        assert!(out.warnings.is_empty());
        assert_eq!(
            out.table.column("joined").unwrap().values,
            vec![Cell::Text("15/01/2024".into()), Cell::Text("01/03/2024".into())]
        );
        assert_eq!(
            out.table.column("id").unwrap().values,
            vec![Cell::Number(1.0), Cell::Number(3.0)]
        );
    }

    #[test]
    fn test_date_window_skipped_on_bad_value() {
        let t = table(vec![Column::from_raw("when", &["2024-01-15", "someday"])]);
        let mut windows = HashMap::new();
        windows.insert(
            "when".to_string(),
            DateWindow::new(ymd(2030, 1, 1), ymd(2030, 1, 2), "%Y-%m-%d"),
        );
        let options = ProcessOptions {
            date_windows: windows,
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();

        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].contains("someday"));
        assert_eq!(out.table.row_count(), 2);
    }

    #[test]
    fn test_date_format_with_offset_rejected() {
        let t = table(vec![
            Column::from_raw("d", &["2024-02-01"]),
            Column::from_raw("n", &["1"]),
        ]);
        let options = ProcessOptions {
            date_windows: [(
                "d".to_string(),
                DateWindow::new(ymd(2024, 1, 1), ymd(2024, 12, 31), "%Y-%m-%d %z"),
            )]
            .into_iter()
            .collect(),
            ..ProcessOptions::default()
        };
        let err = process_table(&t, &options).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::InvalidDateFormat { column, format } if column == "d" && format == "%Y-%m-%d %z"
        ));
    }

    #[test]
    fn test_renders_dates() {
        assert!(renders_dates("%d/%m/%Y"));
        assert!(renders_dates("%Y-%m-%d %H:%M"));
        assert!(!renders_dates("%z"));
        assert!(!renders_dates("%Q"));
    }

    #[test]
    fn test_date_window_bad_format_leaves_column() {
        let mut t = table(vec![Column::from_raw("d", &["2024-02-01", "2020-01-01"])]);
        let window = DateWindow::new(ymd(2024, 1, 1), ymd(2024, 12, 31), "%z");
        let warning = apply_date_window(&mut t, "d", &window).unwrap();

        assert!(warning.contains("'%z'"));
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn test_disabled_date_window_ignored() {
        let t = table(vec![Column::from_raw("d", &["2024-01-15"])]);
        let mut window = DateWindow::new(ymd(2030, 1, 1), ymd(2030, 1, 2), "%Y-%m-%d");
        window.enabled = false;
        let options = ProcessOptions {
            date_windows: [("d".to_string(), window)].into_iter().collect(),
            ..ProcessOptions::default()
        };
        assert_eq!(process_table(&t, &options).unwrap().table.row_count(), 1);
    }

    #[test]
    fn test_date_window_runs_before_missing_policy() {
        // The null survives the window and is then filled.
        let t = table(vec![Column::from_raw("d", &["2024-01-15", ""])]);
        let options = ProcessOptions {
            cleaning: CleaningOptions {
                missing: MissingValuePolicy::FillDefault,
                remove_duplicates: false,
            },
            date_windows: [(
                "d".to_string(),
                DateWindow::new(ymd(2024, 1, 1), ymd(2024, 12, 31), "%Y-%m-%d"),
            )]
            .into_iter()
            .collect(),
            ..ProcessOptions::default()
        };
        let out = process_table(&t, &options).unwrap();
        assert_eq!(
            out.table.column("d").unwrap().values,
            vec![Cell::Text("2024-01-15".into()), Cell::Text(FILL_PLACEHOLDER.into())]
        );
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let t = table(vec![
            Column::from_raw("d", &["01/02/2024", "2024-05-03", "2024-05-03", ""]),
            Column::from_raw("n", &["1", "7", "7", "3"]),
        ]);
        let options = ProcessOptions {
            cleaning: CleaningOptions {
                missing: MissingValuePolicy::DropRows,
                remove_duplicates: true,
            },
            filters: filters([("n", ColumnFilter::Numeric { min: 0.0, max: 8.0 })]),
            date_windows: [(
                "d".to_string(),
                DateWindow::new(ymd(2024, 1, 1), ymd(2024, 12, 31), "%d/%m/%Y"),
            )]
            .into_iter()
            .collect(),
            ..ProcessOptions::default()
        };
        let once = process_table(&t, &options).unwrap().table;
        let twice = process_table(&once, &options).unwrap().table;
        assert_eq!(once, twice);
        assert_eq!(once.row_count(), 2);
    }
}
