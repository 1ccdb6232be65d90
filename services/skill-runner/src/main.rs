//! Skill runner.
//!
//! Matches the observations and model results named in a configuration
//! file and prints the skill table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comparison::metrics::parse_metric_list;
use comparison::GroupBy;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use skill_runner::{load_config, run, CsvReader, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "skill-runner")]
#[command(about = "Match observations with model results and report skill")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "SKILL_CONFIG")]
    config: PathBuf,

    /// Comma-separated metrics (default: configured or built-in list)
    #[arg(short, long)]
    metrics: Option<String>,

    /// Comma-separated grouping, e.g. "model,observation" or "model,freq:D"
    #[arg(long)]
    by: Option<String>,

    /// Write the skill table as CSV
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save every comparer as JSON in this directory
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Do not resolve relative filenames against the configuration directory
    #[arg(long)]
    absolute_paths: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Log as JSON
    #[arg(long)]
    json: bool,
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    info!(config = %args.config.display(), "Starting skill runner");

    let config = load_config(&args.config, args.absolute_paths)?;
    let options = RunOptions {
        metrics: args
            .metrics
            .as_deref()
            .map(parse_metric_list)
            .transpose()
            .context("Invalid --metrics")?,
        by: args
            .by
            .as_deref()
            .map(GroupBy::parse_list)
            .transpose()
            .context("Invalid --by")?,
        output: args.output.clone(),
        save_dir: args.save_dir.clone(),
    };

    let table = run(&config, &CsvReader::new(), &options)?;
    println!("{table}");
    Ok(())
}
