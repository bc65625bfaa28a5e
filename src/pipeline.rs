//! Run file processing.
//!
//! Each run file is read, matched to its extraction rule, parsed and
//! aggregated independently of every other file. Files are given
//! explicitly; nothing here walks directories.

use crate::analysis::{aggregate, VectorAlignment};
use crate::models::{AggregatedSeries, AnalyzedRun, RunFile};
use crate::parser::{parse_str, RuleSet};
use anyhow::{anyhow, Context, Result};
use std::fs;
use tracing::{debug, info, warn};

/// Settings shared by every run in a batch.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub rules: RuleSet,
    pub alignment: VectorAlignment,
}

/// Process one run file into its aggregated series.
pub fn process_run(file: &RunFile, options: &PipelineOptions) -> Result<AggregatedSeries> {
    let rule = options
        .rules
        .rule_for(&file.trial, &file.name)
        .ok_or_else(|| {
            anyhow!(
                "No extraction rule for trial '{}' and run '{}'",
                file.trial,
                file.name
            )
        })?;
    debug!("{}/{}: using rule {:?}", file.trial, file.name, rule);

    let content = fs::read_to_string(&file.path)
        .with_context(|| format!("Failed to read run file: {}", file.path.display()))?;

    let samples = parse_str(&content, rule)
        .with_context(|| format!("Failed to parse {}", file.path.display()))?;

    let series = aggregate(&samples, options.alignment)
        .with_context(|| format!("Failed to aggregate {}", file.path.display()))?;

    Ok(series)
}

/// Process every run file in order, recording failures per run.
pub fn process_runs(files: &[RunFile], options: &PipelineOptions) -> Vec<AnalyzedRun> {
    files
        .iter()
        .map(|file| match process_run(file, options) {
            Ok(series) => {
                info!(
                    "{}/{}: {} x value(s), {} metric(s)",
                    file.trial,
                    file.name,
                    series.len(),
                    series.metrics.len()
                );
                AnalyzedRun::succeeded(file, series)
            }
            Err(e) => {
                warn!("{}/{}: {:#}", file.trial, file.name, e);
                AnalyzedRun::failed(file, format!("{:#}", e))
            }
        })
        .collect()
}
