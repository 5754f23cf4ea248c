//! dblink - run SQL against a pooled database connection.

mod cli;
mod config;
mod db;
mod error;
mod logging;
mod normalize;
mod observe;
mod query;
mod table;

use cli::{Cli, OutputFormat};
use config::{Config, DataSourceConfig};
use error::{DbLinkError, Result};
use query::{BoundSql, QueryExecutor};
use table::TableData;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Pick up DATABASE_URL / PG* variables from a local .env if present
    let _ = dotenvy::dotenv();

    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    let output = cli
        .parse_output_format()
        .map_err(DbLinkError::config)?;

    let sql = cli
        .sql
        .clone()
        .ok_or_else(|| DbLinkError::config("No SQL supplied. Use --sql."))?;

    // Load configuration file
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    if let Some(timeout_ms) = cli.acquire_timeout_ms {
        config.executor.acquire_timeout_ms = timeout_ms;
    }

    // Build the data source with precedence:
    // 1. CLI arguments (highest)
    // 2. Named source from config
    // 3. Default source from config
    // 4. Environment variables
    let source = resolve_source(&cli, &config)?.ok_or_else(|| {
        DbLinkError::config("No data source configured. Use --help for usage information.")
    })?;

    info!("Data source: {}", source.display_string());

    let pool = db::open_pool(&source, &config.executor);
    let executor = QueryExecutor::new(pool, source).with_options(config.executor);

    let bound = BoundSql::with_params(sql, cli.parse_params());

    if cli.headers_only {
        let metadata = executor.column_metadata(&bound).await?;
        match output {
            OutputFormat::Text => {
                for column in metadata.iter() {
                    println!("{}\t{}", column.column_name, column.data_type);
                }
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&metadata)
                    .map_err(|e| DbLinkError::internal(e.to_string()))?;
                println!("{json}");
            }
        }
        return Ok(());
    }

    let table = executor.query_table(&bound).await?;
    match output {
        OutputFormat::Text => print_text_table(&table),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&table.to_json_rows())
                .map_err(|e| DbLinkError::internal(e.to_string()))?;
            println!("{json}");
        }
    }

    Ok(())
}

/// Resolves the final data source from CLI args, config file, and environment.
fn resolve_source(cli: &Cli, config: &Config) -> Result<Option<DataSourceConfig>> {
    // Start with CLI source if provided
    let mut source = cli.to_data_source()?;

    // If no CLI source, try named source from config
    if source.is_none() {
        if let Some(name) = cli.source_name() {
            source = config.get_source(Some(name)).cloned();
            if source.is_none() {
                return Err(DbLinkError::config(format!(
                    "Data source '{}' not found in config file",
                    name
                )));
            }
        }
    }

    // If still no source, try default from config
    if source.is_none() {
        source = config.get_source(None).cloned();
    }

    // Apply environment variable defaults
    if let Some(ref mut src) = source {
        src.apply_env_defaults();
    }

    Ok(source)
}

/// Prints an aligned plain-text rendering of the table.
fn print_text_table(table: &TableData) {
    let names = table.columns().names();
    let mut widths: Vec<usize> = names.iter().map(|n| n.len()).collect();

    let rendered: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| {
            row.values()
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let text = value.to_display_string();
                    if text.len() > widths[i] {
                        widths[i] = text.len();
                    }
                    text
                })
                .collect()
        })
        .collect();

    let header: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{:<width$}", n, width = widths[i]))
        .collect();
    println!("{}", header.join(" | "));

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", rule.join("-+-"));

    for row in rendered {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        println!("{}", line.join(" | "));
    }

    println!("({} rows)", table.row_count());
}
