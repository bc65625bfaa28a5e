//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trialstats.toml` files.

use crate::analysis::VectorAlignment;
use crate::parser::RuleSet;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::cli::OutputFormat;
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".trialstats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Independent-variable extraction rules.
    #[serde(default)]
    pub extraction: RuleSet,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Output file path. When unset, `trialstats_report.<ext>` with the
    /// extension of the chosen format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Stem of the report file when no output path is configured.
const DEFAULT_OUTPUT_STEM: &str = "trialstats_report";

/// Aggregation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Handling of vector x values with differing lengths.
    #[serde(default)]
    pub vector_alignment: VectorAlignment,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Decimal places for Markdown tables.
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// List failed runs in the Markdown report.
    #[serde(default = "default_true")]
    pub include_failed: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            include_failed: true,
        }
    }
}

fn default_precision() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly provided CLI values override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = Some(output.display().to_string());
        }

        if let Some(alignment) = args.alignment {
            self.aggregation.vector_alignment = alignment.into();
        }

        if let Some(precision) = args.precision {
            self.report.precision = precision;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Report path: the configured output, else a default named after `format`.
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        match self.general.output {
            Some(ref output) => PathBuf::from(output),
            None => PathBuf::from(format!("{}.{}", DEFAULT_OUTPUT_STEM, format.extension())),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> Result<String> {
        let config = Config::default();
        toml::to_string_pretty(&config).context("Failed to serialize default config")
    }
}
