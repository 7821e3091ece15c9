use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use i94_core::{pipeline, EtlConfig, RunOptions};
use i94_parser::{parse_sas7bdat, ReadOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "I94 immigration star-schema ETL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the raw datasets, derive the star schema and replace the warehouse tables
    Run(RunArgs),
    /// Print the layout and leading rows of a local SAS7BDAT file
    InspectSas(InspectSasArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// TOML configuration file; I94_* environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Derive every table without writing to the warehouse
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct InspectSasArgs {
    path: PathBuf,
    /// Number of rows to decode and print
    #[arg(long, default_value_t = 10)]
    rows: usize,
    /// Print the decoded metadata as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::InspectSas(args) => handle_inspect_sas(args),
    }
}

async fn handle_run(args: RunArgs) -> Result<()> {
    dotenvy::dotenv().ok();

    let config = EtlConfig::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("failed to load configuration from '{}'", path.display()),
        None => "failed to load configuration from the environment".to_string(),
    })?;

    let options = RunOptions {
        dry_run: args.dry_run,
    };
    let summary = pipeline::run(&config, options)
        .await
        .context("ETL run failed")?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    summary.ensure_success()?;
    info!(run_id = %summary.run_id, "run complete");
    Ok(())
}

fn handle_inspect_sas(args: InspectSasArgs) -> Result<()> {
    let bytes = std::fs::read(&args.path)
        .with_context(|| format!("failed to read '{}'", args.path.display()))?;
    let dataset = parse_sas7bdat(&bytes, &ReadOptions::with_row_limit(args.rows))
        .with_context(|| format!("failed to decode '{}'", args.path.display()))?;
    let metadata = &dataset.metadata;

    if args.json {
        println!("{}", serde_json::to_string_pretty(metadata)?);
        return Ok(());
    }

    println!("dataset:     {}", metadata.dataset_name);
    println!("layout:      {} {:?}-endian", metadata.word_size, metadata.endianness);
    println!("compression: {}", metadata.compression);
    println!("pages:       {} x {} bytes", metadata.page_count, metadata.page_length);
    println!(
        "rows:        {} ({} bytes each)",
        metadata.row_count, metadata.row_length
    );

    let mut columns = Table::new();
    columns.set_header(vec!["#", "name", "type", "offset", "width"]);
    for (idx, column) in metadata.columns.iter().enumerate() {
        columns.add_row(vec![
            idx.to_string(),
            column.name.clone(),
            column.kind.as_str().to_string(),
            column.offset.to_string(),
            column.width.to_string(),
        ]);
    }
    println!("{columns}");
    println!("{}", dataset.df);
    Ok(())
}
