//! End-to-end scenarios: bytes in, artifact out.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use serde_json::{json, Value};

use dataexport::parser::fallback_delimiter;
use dataexport::{
    export_bytes, fill_template_bytes, inspect_bytes, validate_table, CleaningOptions,
    Column, ColumnFilter, ColumnMapping, DateWindow, DelimiterSource, ExportFormat, ExportRequest,
    IngestError, MissingValuePolicy, ParseOptions, PipelineError, ProcessOptions, Table,
    TemplateRequest,
};

fn csv_request(process: ProcessOptions) -> ExportRequest {
    ExportRequest {
        process,
        format: ExportFormat::DelimitedText,
        ..ExportRequest::default()
    }
}

fn json_records(bytes: &[u8]) -> Vec<Value> {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn scenario_csv_passes_through_unchanged() {
    let process = ProcessOptions {
        selected_columns: vec!["a".into(), "b".into()],
        ..ProcessOptions::default()
    };
    let output = export_bytes(b"a,b\n1,x\n2,y\n", &ParseOptions::default(), &csv_request(process)).unwrap();

    assert_eq!(String::from_utf8(output.artifact.bytes).unwrap(), "a,b\n1,x\n2,y\n");
    assert_eq!(output.artifact.content_type, "text/csv");
}

#[test]
fn scenario_numeric_filter_keeps_range() {
    let mut process = ProcessOptions::default();
    process
        .filters
        .insert("n".into(), ColumnFilter::Numeric { min: 3.0, max: 10.0 });
    let request = ExportRequest {
        process,
        format: ExportFormat::RecordList,
        ..ExportRequest::default()
    };

    let output = export_bytes(b"n,label\n1,a\n5,b\n10,c\n", &ParseOptions::default(), &request).unwrap();

    assert_eq!(
        json_records(&output.artifact.bytes),
        vec![json!({ "n": 5, "label": "b" }), json!({ "n": 10, "label": "c" })]
    );
}

#[test]
fn scenario_template_row_two_filled() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet1").unwrap();
    sheet.write_string(0, 0, "Name").unwrap();
    sheet.write_string(0, 1, "Age").unwrap();
    let template = workbook.save_to_buffer().unwrap();

    let mapping: ColumnMapping = [("Name", "Name"), ("Age", "Age")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let request = TemplateRequest {
        process: ProcessOptions::default(),
        sheet: "Sheet1".into(),
        mapping,
        category: None,
        output_name: None,
    };

    let output =
        fill_template_bytes(b"Name,Age\nBob,30\n", &ParseOptions::default(), &template, &request).unwrap();
    assert_eq!(output.rows_exported, 1);

    let mut filled: Xlsx<_> = open_workbook_from_rs(Cursor::new(output.artifact.bytes)).unwrap();
    let range = filled.worksheet_range("Sheet1").unwrap();
    assert_eq!(range.get_value((0, 0)), Some(&Data::String("Name".into())));
    assert_eq!(range.get_value((0, 1)), Some(&Data::String("Age".into())));
    assert_eq!(range.get_value((1, 0)), Some(&Data::String("Bob".into())));
    assert!(matches!(
        range.get_value((1, 1)),
        Some(Data::Float(f)) if *f == 30.0
    ) || matches!(range.get_value((1, 1)), Some(Data::Int(30))));
}

#[test]
fn scenario_one_invalid_email() {
    let table = Table::from_columns(vec![Column::from_raw("Email", &["a@b.com", "not-an-email"])]).unwrap();
    let warnings = validate_table(&table);

    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("1 invalid"));
}

#[test]
fn scenario_fallback_picks_semicolon() {
    assert_eq!(fallback_delimiter("a;b;c\n1;2;3", &ParseOptions::default()), Some(';'));
}

#[test]
fn manual_delimiter_retry_after_detection_fails() {
    let bytes = b"name#age\nAnn#31\nBob#42\n";

    let err = inspect_bytes(bytes, &ParseOptions::default(), 8).unwrap_err();
    assert!(err.needs_manual_delimiter());
    assert!(matches!(err, PipelineError::Ingest(IngestError::DelimiterRequired { .. })));

    let retry = ParseOptions {
        delimiter: Some('#'),
        ..ParseOptions::default()
    };
    let inspection = inspect_bytes(bytes, &retry, 8).unwrap();
    assert_eq!(inspection.csv_info.delimiter, "#");
    assert_eq!(inspection.csv_info.delimiter_source, DelimiterSource::Manual);
    assert_eq!(inspection.csv_info.headers, vec!["name", "age"]);
}

#[test]
fn manual_delimiter_that_does_not_split_is_rejected() {
    let options = ParseOptions {
        delimiter: Some(';'),
        ..ParseOptions::default()
    };
    let err = inspect_bytes(b"a,b\n1,2\n", &options, 8).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Ingest(IngestError::UnresolvedDelimiter { .. })
    ));
}

#[test]
fn empty_upload_is_rejected() {
    let err = export_bytes(b"", &ParseOptions::default(), &ExportRequest::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(IngestError::EmptyInput(_))));

    let err = export_bytes(b"a,b\n", &ParseOptions::default(), &ExportRequest::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Ingest(IngestError::EmptyInput(_))));
}

#[test]
fn full_cleaning_run_with_renames() {
    let csv = "\
name;age;joined;city
Ann;31;2024-01-15;Paris
Bob;;2024-02-20;Lyon
Bob;;2024-02-20;Lyon
Cid;17;2023-12-31;Nice
Dee;45;2024-05-01;
";
    let mut process = ProcessOptions {
        selected_columns: vec!["name".into(), "age".into(), "joined".into(), "city".into()],
        cleaning: CleaningOptions {
            missing: MissingValuePolicy::FillDefault,
            remove_duplicates: true,
        },
        ..ProcessOptions::default()
    };
    process.date_windows.insert(
        "joined".into(),
        DateWindow::new(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            "%d/%m/%Y",
        ),
    );
    let mut request = ExportRequest {
        process,
        format: ExportFormat::RecordList,
        ..ExportRequest::default()
    };
    request.mapping.insert("joined".into(), "Joined on".into());

    let output = export_bytes(csv.as_bytes(), &ParseOptions::default(), &request).unwrap();

    assert_eq!(
        json_records(&output.artifact.bytes),
        vec![
            json!({ "name": "Ann", "age": 31, "Joined on": "15/01/2024", "city": "Paris" }),
            json!({ "name": "Bob", "age": 0, "Joined on": "20/02/2024", "city": "Lyon" }),
            json!({ "name": "Dee", "age": 45, "Joined on": "01/05/2024", "city": "Unknown" }),
        ]
    );
    assert_eq!(output.rows_exported, 3);
}

#[test]
fn spreadsheet_export_reads_back() {
    let output = export_bytes(
        b"id,name\n1,Ann\n2,Bob\n",
        &ParseOptions::default(),
        &ExportRequest::default(),
    )
    .unwrap();
    assert_eq!(output.artifact.extension, "xlsx");

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(output.artifact.bytes)).unwrap();
    assert_eq!(workbook.sheet_names(), vec!["Sheet1".to_string()]);
    let range = workbook.worksheet_range("Sheet1").unwrap();
    assert_eq!(range.get_size(), (3, 2));
    assert_eq!(range.get_value((2, 1)), Some(&Data::String("Bob".into())));
}

#[test]
fn inspection_profiles_drive_default_controls() {
    let csv = "score;team;day\n3;red;2024-01-02\n9;blue;2024-03-04\n";
    let inspection = inspect_bytes(csv.as_bytes(), &ParseOptions::default(), 8).unwrap();

    let score = &inspection.columns[0];
    assert_eq!(
        score.default_filter(),
        Some(ColumnFilter::Numeric { min: 3.0, max: 9.0 })
    );
    let day = inspection.columns[2].default_date_window().unwrap();
    assert_eq!(day.start.to_string(), "2024-01-02");
    assert_eq!(day.end.to_string(), "2024-03-04");
}
