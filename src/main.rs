//! Trialstats - aggregate repeated simulation runs
//!
//! Reads run logs of `settings:` blocks, groups the blocks by the swept
//! parameter and reports per-value mean and standard deviation of every
//! recorded metric.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, output, invalid arguments)
//!   2 - Some run file failed and --fail-on-error is set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod parser;
mod pipeline;
mod report;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use models::{Report, RunFile};
use pipeline::PipelineOptions;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config comes first: `[general] verbose` decides the log level
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("trialstats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    source.log();

    match run(args, config) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Aggregation failed: {:#}", e);
            eprintln!("\nError: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: write a default .trialstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml()?)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("Created {} with default settings.", config::CONFIG_FILE);
    Ok(())
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Aggregate every run file and write the report. Returns the exit code.
fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let files: Vec<RunFile> = args
        .files
        .iter()
        .map(|path| RunFile::from_path(path, args.trial.as_deref()))
        .collect();
    info!("Processing {} run file(s)", files.len());

    let options = PipelineOptions {
        rules: config.extraction.clone(),
        alignment: config.aggregation.vector_alignment,
    };
    let runs = pipeline::process_runs(&files, &options);

    let report = Report::new(runs, start_time.elapsed().as_secs_f64());

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = config.output_path(args.format);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    let failed = report.metadata.runs_failed;
    info!(
        "Aggregated {}/{} run file(s), report saved to {}",
        report.metadata.runs_processed - failed,
        report.metadata.runs_processed,
        output_path.display()
    );

    if failed > 0 {
        warn!("{} run file(s) failed", failed);
        if args.fail_on_error {
            return Ok(2);
        }
    }

    Ok(0)
}

/// Where the effective configuration came from.
///
/// Config is loaded before the subscriber exists, so this is logged afterwards.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => {
                info!("Loaded default config from {}", config::CONFIG_FILE)
            }
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Unreadable(e))),
    }
}
