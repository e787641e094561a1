mod config;
mod dataset;
mod export;
mod input;
mod parser;
mod pipeline;
mod record;
mod reduce;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Collect `RESULT key=value ...` lines from benchmark logs into a CSV table,
/// optionally grouping records by a key field and reducing repeated values
/// to their average or median.
#[derive(Parser, Debug)]
#[command(name = "result-csv", version, about)]
pub struct Cli {
    /// Log files to scan, read in the order given
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Destination CSV file (overwritten)
    #[arg(short, long)]
    output: PathBuf,

    /// Output columns; also restricts which keys are parsed
    #[arg(short, long, num_args = 1..)]
    columns: Option<Vec<String>>,

    /// Field to group records by
    #[arg(short, long)]
    key: Option<String>,

    /// Statistic for fields that collected several values
    #[arg(long, value_enum)]
    op: Option<reduce::AggregateOp>,

    /// Config file path (default: result-csv.toml, optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Line prefix that marks a result record (overrides config)
    #[arg(long)]
    marker: Option<String>,

    /// Output field delimiter (overrides config)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Don't echo the final dataset to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Extra logging (per-file record counts, config resolution)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", error_chain(&*e));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (config_path, required) = match cli.config {
        Some(ref path) => (path.clone(), true),
        None => (PathBuf::from(config::DEFAULT_CONFIG_FILE), false),
    };
    let cfg = config::load(&config_path, required)?;

    let echo = cfg.export.echo_dataset && !cli.quiet;
    let options = resolve_options(cli, cfg)?;
    let dataset = pipeline::run(&options)?;

    if echo {
        println!("{}", serde_json::to_string(&dataset)?);
    }
    Ok(())
}

/// Merge CLI flags over the loaded config.
fn resolve_options(
    cli: Cli,
    cfg: config::ToolConfig,
) -> Result<pipeline::RunOptions, config::ConfigError> {
    let delimiter = match cli.delimiter {
        Some(d) => config::delimiter_byte(d)?,
        None => cfg.export.delimiter_byte()?,
    };

    let mut options = pipeline::RunOptions::new(cli.files, cli.output);
    options.columns = cli.columns;
    options.key = cli.key;
    options.op = cli.op;
    options.marker = cli.marker.unwrap_or(cfg.input.marker);
    options.export = export::ExportOptions { delimiter };
    Ok(options)
}

/// Render an error followed by its sources: "outer: inner: root".
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
