//! Forecast map generator.
//!
//! Runs the whole pipeline once over the configured models and exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use map_generator::{
    DownloadConfig, HttpFetcher, MapConfig, NetCdfOpener, Orchestrator, PngRenderer,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "map-generator")]
#[command(about = "Render forecast maps for every configured model, lead time and domain")]
struct Args {
    /// YAML configuration file (built-in tables when omitted)
    #[arg(short, long, env = "MAPGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for rendered maps
    #[arg(long, env = "MAPGEN_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Directory for downloaded source files
    #[arg(long, env = "MAPGEN_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Number of render workers
    #[arg(short, long, env = "MAPGEN_WORKERS")]
    workers: Option<usize>,

    /// Only process these models (repeatable)
    #[arg(short, long = "model")]
    models: Vec<String>,

    /// Fail a render task still running after this many seconds
    #[arg(long, env = "MAPGEN_TASK_TIMEOUT_SECS")]
    task_timeout_secs: Option<u64>,

    /// Write the run report as JSON to this file
    #[arg(long, env = "MAPGEN_SUMMARY_FILE")]
    summary_file: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "MAPGEN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, env = "MAPGEN_LOG_FORMAT", value_enum, default_value = "json")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    info!("Starting forecast map generator");

    let mut config = MapConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(dir) = args.download_dir {
        config.download_dir = dir;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.task_timeout_secs.is_some() {
        config.task_timeout_secs = args.task_timeout_secs;
    }
    config.select_models(&args.models)?;
    config.validate()?;

    netcdf_parser::silence_hdf5_errors();

    let renderer = PngRenderer::from_config(&config.image, &config.output_dir)?;
    let fetcher = HttpFetcher::new(DownloadConfig::from(&config.download))?;
    let orchestrator = Orchestrator::new(
        Arc::new(config),
        Arc::new(fetcher),
        Arc::new(NetCdfOpener),
        Arc::new(renderer),
    );

    let report = orchestrator.run().await?;

    let failed = report.total_failed();
    if failed > 0 {
        warn!(failed = failed, "Some maps failed to render");
    }

    if let Some(path) = args.summary_file {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run summary");
    }

    Ok(())
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    match args.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}
