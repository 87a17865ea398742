mod source;

use clap::{Parser, ValueEnum};
use serde_yaml::{Mapping, Value as YamlValue};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dynq::{DocumentFilter, EntitySchema, FilterConfig, QueryFilter, QueryResponse, QueryService, Record};
use source::RecordSource;

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Parser)]
#[command(name = "dynq", about = "Filter, sort and paginate records with prefix-convention query filters")]
struct Cli {
    #[arg(long, env = "DYNQ_RECORDS", help = "Record file or directory of .yaml/.json/.md files")]
    records: Option<PathBuf>,

    #[arg(long, help = "Read record file paths from stdin")]
    stdin: bool,

    #[arg(long, help = "Filter document (YAML or JSON mapping)")]
    filter: Option<PathBuf>,

    #[arg(long, env = "DYNQ_CONFIG", help = "Filter prefix configuration (YAML)")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "Entity", help = "Entity name used in messages")]
    entity: String,

    #[arg(long, value_delimiter = ',', help = "Entity properties; defaults to every key seen in the records")]
    properties: Vec<String>,

    #[arg(long, help = "Sort specification, e.g. \"Name desc\"")]
    sort: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    page: Option<i64>,

    #[arg(long, allow_negative_numbers = true)]
    page_size: Option<i64>,

    #[arg(long, value_enum, default_value = "json")]
    format: Format,

    #[arg(long, help = "Print the compiled predicate to stderr")]
    explain: bool,

    #[arg(help = "Filter fields as FIELD=VALUE, e.g. MinId=10 ListId=[2,4]")]
    fields: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("DYNQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(code) => code,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let config = match &cli.config {
        Some(path) => FilterConfig::load(path).map_err(|e| e.to_string())?,
        None => FilterConfig::default(),
    };
    let service = QueryService::new(&config);

    let source = if cli.stdin {
        RecordSource::from_reader(io::stdin().lock()).map_err(|e| format!("Failed to read paths from stdin: {}", e))?
    } else {
        match &cli.records {
            Some(path) => RecordSource::Path(path.clone()),
            None => return Err("No records specified. Use --records, --stdin or set DYNQ_RECORDS".to_string()),
        }
    };
    let records = source.load();
    info!(records = records.len(), "Loaded records");

    let schema = if cli.properties.is_empty() {
        EntitySchema::from_records(&cli.entity, &records)
    } else {
        EntitySchema::new(&cli.entity, cli.properties.iter().map(|p| p.trim()))
    };

    let filter = build_filter(cli)?;

    if cli.explain {
        match service.compile_filter(&filter, &schema) {
            Ok(predicate) => eprintln!("{}", predicate),
            Err(e) => return Err(e.to_string()),
        }
    }

    let response = QueryResponse::from_result(service.query(&filter, &schema, records));
    print_response(&response, cli.format)?;

    if let Some(e) = &response.error {
        error!(error = %e, "Query failed");
        Ok(ExitCode::from(2))
    } else if response.is_empty() {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::from(0))
    }
}

fn build_filter(cli: &Cli) -> Result<DocumentFilter, String> {
    let document = match &cli.filter {
        Some(path) => read_filter_document(path)?,
        None => Mapping::new(),
    };
    let mut filter = DocumentFilter::from_mapping(document).map_err(|e| e.to_string())?;

    for pair in &cli.fields {
        let (name, value) = parse_field(pair)?;
        filter.set_field(name, value);
    }

    let base = filter.base_mut();
    if let Some(sort) = &cli.sort {
        base.sorting_fields = Some(sort.clone());
    }
    if cli.page.is_some() {
        base.page = cli.page;
    }
    if cli.page_size.is_some() {
        base.page_size = cli.page_size;
    }

    info!(fields = filter.fields().len(), sort = ?filter.sort_by(), "Built filter");
    Ok(filter)
}

fn read_filter_document(path: &Path) -> Result<Mapping, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read filter {}: {}", path.display(), e))?;
    match serde_yaml::from_str(&content) {
        Ok(YamlValue::Mapping(mapping)) => Ok(mapping),
        Ok(YamlValue::Null) => Ok(Mapping::new()),
        Ok(_) => Err(format!("Filter {} must be a mapping", path.display())),
        Err(e) => Err(format!("Failed to parse filter {}: {}", path.display(), e)),
    }
}

fn parse_field(pair: &str) -> Result<(&str, YamlValue), String> {
    let Some((name, raw)) = pair.split_once('=') else {
        return Err(format!("Expected FIELD=VALUE, got '{}'", pair));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Missing field name in '{}'", pair));
    }
    let value = serde_yaml::from_str(raw).map_err(|e| format!("Invalid value for {}: {}", name, e))?;
    Ok((name, value))
}

fn print_response(response: &QueryResponse<Record>, format: Format) -> Result<(), String> {
    let rendered = match format {
        Format::Json => serde_json::to_string_pretty(response).map_err(|e| e.to_string())?,
        Format::Yaml => serde_yaml::to_string(response).map_err(|e| e.to_string())?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
