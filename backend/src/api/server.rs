//! HTTP Server for the dataexport API.
//!
//! Provides REST endpoints for inspecting an upload and downloading the
//! processed export.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/inspect`    | Encoding, delimiter, column profiles |
//! | POST   | `/api/export`     | Processed file download              |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |
//!
//! Both POST endpoints take multipart forms. `file` is the CSV upload and
//! `delimiter` an optional manual delimiter. `/api/export` also takes
//! `options` (an export request as JSON) and, to fill a template instead,
//! a `template` workbook with `options` holding a template request.

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, Stage, LOG_BROADCASTER};
use super::types::{
    download_file_name, error_response, warnings_header_value, InspectResponse, WARNINGS_HEADER,
};
use crate::config::{ServerConfig, PREVIEW_ROWS};
use crate::error::{ExportError, IngestError, PipelineError, ServerError, ServerResult};
use crate::parser::ParseOptions;
use crate::transform::pipeline::{
    export_bytes, fill_template_bytes, inspect_bytes, ExportRequest, PipelineOutput, TemplateRequest,
};

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let needs_delimiter = matches!(&self, ServerError::Pipeline(e) if e.needs_manual_delimiter());
        log_error(Stage::Server, format!("{} ({})", self, status));
        (status, Json(error_response(&self.to_string(), needs_delimiter))).into_response()
    }
}

/// HTTP status for an error; 422 asks the client for a manual delimiter.
pub fn status_for(error: &ServerError) -> StatusCode {
    match error {
        ServerError::Pipeline(PipelineError::Ingest(IngestError::DelimiterRequired { .. })) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServerError::Pipeline(PipelineError::Ingest(IngestError::Io(_))) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ServerError::Pipeline(PipelineError::Ingest(_)) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Process(_)) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Export(
            ExportError::DuplicateColumn(_)
            | ExportError::InvalidColor(_)
            | ExportError::UnknownColumn(_)
            | ExportError::SheetNotFound { .. },
        )) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Export(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) | ServerError::Config(_) | ServerError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Build the application router.
pub fn router(config: &ServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            header::CONTENT_TYPE,
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(WARNINGS_HEADER),
        ]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/inspect", post(inspect_upload))
        .route("/api/export", post(export_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes()))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> ServerResult<()> {
    let app = router(&config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Dataexport server running on http://localhost:{}", config.port);
    println!("   POST /api/inspect - Inspect CSV file");
    println!("   POST /api/export  - Export CSV file (xlsx, csv, json or template)");
    println!("   GET  /api/logs    - SSE log stream");
    println!("   GET  /health      - Health check");
    println!();
    println!("📦 Uploads limited to {} MB", config.max_upload_mb);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "dataexport",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "inspect": "POST /api/inspect",
            "export": "POST /api/export",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Fields collected from a multipart upload.
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    template: Option<Vec<u8>>,
    options: Option<String>,
    delimiter: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(|s| s.to_string());
                    form.file = Some(read_bytes(field).await?);
                }
                "template" => form.template = Some(read_bytes(field).await?),
                "options" => form.options = Some(read_text(field).await?),
                "delimiter" => form.delimiter = Some(read_text(field).await?),
                _ => {}
            }
        }

        Ok(form)
    }

    fn take_file(&mut self) -> ServerResult<Vec<u8>> {
        self.file
            .take()
            .ok_or_else(|| ServerError::BadRequest("No file provided".into()))
    }

    fn parse_options(&self) -> ServerResult<ParseOptions> {
        Ok(ParseOptions {
            delimiter: self
                .delimiter
                .as_deref()
                .map(parse_delimiter_field)
                .transpose()?
                .flatten(),
            ..ParseOptions::default()
        })
    }

    /// Stem of the uploaded file name, used when the request names no output.
    fn file_stem(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let stem = std::path::Path::new(name).file_stem()?.to_str()?;
        Some(format!("{}_export", stem))
    }
}

async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> ServerResult<Vec<u8>> {
    Ok(field
        .bytes()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
        .to_vec())
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ServerResult<String> {
    field
        .text()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))
}

/// Manual delimiter from a form field.
///
/// Accepts a single character, or `TAB`/`\t` and `SPACE`; blank means none.
pub fn parse_delimiter_field(raw: &str) -> ServerResult<Option<char>> {
    if raw.is_empty() {
        return Ok(None);
    }
    match raw {
        "\\t" | "TAB" | "tab" | "\t" => return Ok(Some('\t')),
        "SPACE" | "space" | " " => return Ok(Some(' ')),
        _ => {}
    }
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(c)),
        _ => Err(ServerError::BadRequest(format!(
            "Delimiter must be a single character, got '{}'",
            trimmed
        ))),
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(raw: Option<&str>, what: &str) -> ServerResult<T> {
    let raw = raw.ok_or_else(|| ServerError::BadRequest(format!("No {} provided", what)))?;
    serde_json::from_str(raw).map_err(|e| ServerError::BadRequest(format!("Invalid {}: {}", what, e)))
}

fn banner(title: &str, form: &UploadForm, size: usize) {
    println!("\n{}", "=".repeat(70));
    println!(
        "📄 {}: {} ({} bytes)",
        title,
        form.file_name.as_deref().unwrap_or("unknown"),
        size
    );
    println!("{}\n", "=".repeat(70));
}

/// Inspect endpoint
async fn inspect_upload(multipart: Multipart) -> ServerResult<Json<InspectResponse>> {
    let mut form = UploadForm::read(multipart).await?;
    let bytes = form.take_file()?;
    let parse = form.parse_options()?;
    banner("INSPECT", &form, bytes.len());

    let inspection = tokio::task::spawn_blocking(move || inspect_bytes(&bytes, &parse, PREVIEW_ROWS))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(InspectResponse::from(inspection)))
}

/// Export endpoint
async fn export_upload(multipart: Multipart) -> ServerResult<Response> {
    let mut form = UploadForm::read(multipart).await?;
    let bytes = form.take_file()?;
    let parse = form.parse_options()?;
    banner("EXPORT", &form, bytes.len());

    let (output, output_name) = match form.template.take() {
        Some(template) => {
            let request: TemplateRequest = parse_json(form.options.as_deref(), "template options")?;
            let name = request.output_name.clone();
            log_info(Stage::Server, format!("Template fill into sheet '{}'", request.sheet));
            let output = tokio::task::spawn_blocking(move || {
                fill_template_bytes(&bytes, &parse, &template, &request)
            })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;
            (output, name)
        }
        None => {
            let request: ExportRequest = match form.options.as_deref() {
                Some(_) => parse_json(form.options.as_deref(), "export options")?,
                None => ExportRequest::default(),
            };
            let name = request.output_name.clone();
            let output = tokio::task::spawn_blocking(move || export_bytes(&bytes, &parse, &request))
                .await
                .map_err(|e| ServerError::Internal(e.to_string()))??;
            (output, name)
        }
    };

    let stem = output_name.or_else(|| form.file_stem());
    let file_name = download_file_name(
        stem.as_deref(),
        output.artifact.extension,
        chrono::Local::now().naive_local(),
    );
    print_summary(&output, &file_name);

    let headers = download_headers(&output, &file_name)?;
    Ok((StatusCode::OK, headers, output.artifact.bytes).into_response())
}

fn download_headers(output: &PipelineOutput, file_name: &str) -> ServerResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(output.artifact.content_type),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
            .map_err(|e| ServerError::Internal(e.to_string()))?,
    );
    headers.insert(
        HeaderName::from_static(WARNINGS_HEADER),
        HeaderValue::from_str(&warnings_header_value(&output.warnings))
            .map_err(|e| ServerError::Internal(e.to_string()))?,
    );
    Ok(headers)
}

fn print_summary(output: &PipelineOutput, file_name: &str) {
    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   Encoding:       {}", output.csv_info.encoding);
    println!("   Delimiter:      {}", output.csv_info.delimiter);
    println!("   Rows read:      {}", output.csv_info.row_count);
    println!("   Rows exported:  {}", output.rows_exported);
    println!("   Warnings:       {}", output.warnings.len());
    println!("   File:           {}", file_name);
    println!("{}\n", "=".repeat(70));
}
