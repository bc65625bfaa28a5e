//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::VectorAlignment;
use clap::Parser;
use std::path::PathBuf;

/// Trialstats - aggregate repeated simulation runs
///
/// Reads run logs made of `settings:` blocks followed by `metric:values`
/// lines, groups blocks by the swept parameter and reports the mean and
/// standard deviation of every metric per parameter value.
///
/// Examples:
///   trialstats output_files/PART_DISC/hopCount_5.csv output_files/PART_DISC/hopCount_7.csv
///   trialstats --trial STATIC_REBALANCING_COMPARISON score.csv --format json -o score.json
///   trialstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Run files to aggregate
    ///
    /// The trial name is taken from each file's parent directory unless
    /// --trial is given.
    #[arg(value_name = "FILE", required_unless_present = "init_config")]
    pub files: Vec<PathBuf>,

    /// Trial name applied to every run file
    #[arg(short, long, value_name = "NAME")]
    pub trial: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trialstats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Handling of vector x values with differing lengths
    #[arg(long, value_name = "MODE")]
    pub alignment: Option<AlignmentArg>,

    /// Decimal places in Markdown tables
    #[arg(long, value_name = "DIGITS")]
    pub precision: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 if any run file fails
    #[arg(long)]
    pub fail_on_error: bool,

    /// Generate a default .trialstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension of the default output path.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Vector alignment mode for --alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AlignmentArg {
    /// Truncate ragged vectors to the shortest one
    Truncate,
    /// Fail runs with ragged vectors
    Reject,
}

impl From<AlignmentArg> for VectorAlignment {
    fn from(arg: AlignmentArg) -> Self {
        match arg {
            AlignmentArg::Truncate => VectorAlignment::TruncateToShortest,
            AlignmentArg::Reject => VectorAlignment::Reject,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.files.is_empty() {
            return Err("At least one run file is required".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(precision) = self.precision {
            if precision > 12 {
                return Err("Precision must be at most 12 digits".to_string());
            }
        }

        if let Some(ref trial) = self.trial {
            if trial.trim().is_empty() {
                return Err("Trial name must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `[general] verbose` from the config file;
    /// `--quiet` overrides it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
