//! Dataexport CLI - Clean CSV files and export them
//!
//! # Commands
//!
//! ```bash
//! dataexport serve                                   # Start HTTP server (port 3000)
//! dataexport inspect input.csv                       # Encoding, delimiter, column profiles
//! dataexport export input.csv --options opts.json    # Export to xlsx/csv/json
//! dataexport fill input.csv --template t.xlsx --sheet Data --map name=Nama
//! ```

use clap::{Parser, Subcommand};
use dataexport::config::{ServerConfig, PREVIEW_ROWS};
use dataexport::{
    export_csv, fill_template_bytes, inspect_bytes, CategoryFilter, ColumnMapping, ExportRequest,
    ParseOptions, PipelineOutput, ProcessOptions, TemplateRequest,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dataexport")]
#[command(about = "Clean CSV files and export them to xlsx, csv, json or a spreadsheet template", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect encoding and delimiter, then profile every column
    Inspect {
        /// Input CSV file
        input: PathBuf,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file for the JSON report (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Process and export a CSV file
    Export {
        /// Input CSV file
        input: PathBuf,

        /// Export request as JSON (selection, cleaning, filters, mapping, format)
        #[arg(long)]
        options: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: <input>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fill a spreadsheet template with CSV rows
    Fill {
        /// Input CSV file
        input: PathBuf,

        /// Template workbook (.xlsx)
        #[arg(short, long)]
        template: PathBuf,

        /// Sheet to fill
        #[arg(short, long)]
        sheet: String,

        /// Column mapping as source=header (repeatable)
        #[arg(short, long = "map", value_parser = parse_pair)]
        map: Vec<(String, String)>,

        /// Only write rows where column=value
        #[arg(long, value_parser = parse_pair)]
        category: Option<(String, String)>,

        /// Processing options as JSON (selection, cleaning, filters)
        #[arg(long)]
        options: Option<PathBuf>,

        /// CSV delimiter (auto-detect if not specified)
        #[arg(short, long)]
        delimiter: Option<char>,

        /// Output file (default: <input>_filled.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: DATAEXPORT_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect {
            input,
            delimiter,
            output,
        } => cmd_inspect(&input, delimiter, output.as_deref()),

        Commands::Export {
            input,
            options,
            delimiter,
            output,
        } => cmd_export(&input, options.as_deref(), delimiter, output.as_deref()),

        Commands::Fill {
            input,
            template,
            sheet,
            map,
            category,
            options,
            delimiter,
            output,
        } => {
            let request = FillArgs {
                sheet,
                map,
                category,
                options,
            };
            cmd_fill(&input, &template, request, delimiter, output.as_deref())
        }

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// `key=value` argument.
fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn parse_options(delimiter: Option<char>) -> ParseOptions {
    ParseOptions {
        delimiter,
        ..ParseOptions::default()
    }
}

fn cmd_inspect(
    input: &Path,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Inspecting: {}", input.display());

    let bytes = fs::read(input)?;
    let inspection = inspect_bytes(&bytes, &parse_options(delimiter), PREVIEW_ROWS)?;

    let info = &inspection.csv_info;
    eprintln!("   Encoding: {}", info.encoding);
    eprintln!(
        "   Delimiter: '{}'{}",
        info.delimiter,
        if delimiter.is_none() { " (auto-detected)" } else { "" }
    );
    eprintln!("   Rows: {}", info.row_count);
    eprintln!("   Columns: {}", info.headers.join(", "));
    print_warnings(&inspection.warnings);

    let json = serde_json::to_string_pretty(&inspection)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_export(
    input: &Path,
    options: Option<&Path>,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());

    let request: ExportRequest = match options {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => ExportRequest::default(),
    };

    let result = export_csv(input, &parse_options(delimiter), &request)?;

    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(result.artifact.extension));
    print_result(&result);
    save(&result, &target)
}

/// Template arguments gathered from the command line.
struct FillArgs {
    sheet: String,
    map: Vec<(String, String)>,
    category: Option<(String, String)>,
    options: Option<PathBuf>,
}

fn cmd_fill(
    input: &Path,
    template: &Path,
    args: FillArgs,
    delimiter: Option<char>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Processing: {}", input.display());
    eprintln!("   Template: {} (sheet '{}')", template.display(), args.sheet);

    let process: ProcessOptions = match &args.options {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => ProcessOptions::default(),
    };
    let mapping: ColumnMapping = args.map.into_iter().collect();
    if mapping.is_empty() {
        return Err("at least one --map source=header is required".into());
    }

    let request = TemplateRequest {
        process,
        sheet: args.sheet,
        mapping,
        category: args
            .category
            .map(|(column, value)| CategoryFilter { column, value }),
        output_name: None,
    };

    let bytes = fs::read(input)?;
    let template_bytes = fs::read(template)?;
    let result = fill_template_bytes(&bytes, &parse_options(delimiter), &template_bytes, &request)?;

    let target = output.map(Path::to_path_buf).unwrap_or_else(|| {
        let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        input.with_file_name(format!("{}_filled.xlsx", stem))
    });
    print_result(&result);
    save(&result, &target)
}

fn print_result(result: &PipelineOutput) {
    eprintln!("   Encoding: {}", result.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", result.csv_info.delimiter);
    eprintln!("   Rows read: {}", result.csv_info.row_count);
    eprintln!("\n⚙️  Exported: {} rows", result.rows_exported);
    print_warnings(&result.warnings);
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        eprintln!("   ✅ No warnings");
        return;
    }
    eprintln!("\n⚠️  {} warning(s):", warnings.len());
    for warning in warnings {
        eprintln!("   - {}", warning);
    }
}

fn save(result: &PipelineOutput, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, &result.artifact.bytes)?;
    eprintln!("💾 Output written to: {}", path.display());
    eprintln!("\n✨ Done!");
    Ok(())
}

async fn cmd_serve(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::from_env()?;
    if let Some(port) = port {
        config.port = port;
    }
    dataexport::server::start_server(config).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
