//! Data models for run logs and their aggregates.
//!
//! This module contains the core data structures shared by the parser,
//! the aggregator and the report generator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single value of the swept (independent) variable.
///
/// Numbers order before text; numbers compare with `f64::total_cmp`,
/// text compares lexicographically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum XValue {
    /// A numeric setting such as a hop count or a timestamp.
    Number(f64),
    /// A label such as a protocol name.
    Text(String),
}

impl XValue {
    /// Interpret a settings field: numeric if it parses as a float, text otherwise.
    pub fn from_field(field: &str) -> Self {
        let field = field.trim();
        match field.parse::<f64>() {
            Ok(n) => XValue::number(n),
            Err(_) => XValue::Text(field.to_string()),
        }
    }

    /// Numeric x; `-0.0` is stored as `0.0` so both land in one group.
    pub fn number(n: f64) -> Self {
        XValue::Number(normalize_zero(n))
    }
}

/// Maps `-0.0` to `0.0`, leaving every other value untouched.
pub fn normalize_zero(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

impl PartialEq for XValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for XValue {}

impl PartialOrd for XValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (XValue::Number(a), XValue::Number(b)) => a.total_cmp(b),
            (XValue::Number(_), XValue::Text(_)) => Ordering::Less,
            (XValue::Text(_), XValue::Number(_)) => Ordering::Greater,
            (XValue::Text(a), XValue::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for XValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XValue::Number(n) => write!(f, "{}", n),
            XValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for XValue {
    fn from(n: f64) -> Self {
        XValue::Number(n)
    }
}

impl From<&str> for XValue {
    fn from(s: &str) -> Self {
        XValue::Text(s.to_string())
    }
}

/// The independent variable of one block, as extracted from its settings line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndependentValue {
    /// One x for the whole block; every metric value is observed at it.
    Scalar(XValue),
    /// One x per position; position `i` pairs with element `i` of each metric.
    Vector(Vec<f64>),
}

impl IndependentValue {
    /// Number of x positions (1 for a scalar).
    pub fn len(&self) -> usize {
        match self {
            IndependentValue::Scalar(_) => 1,
            IndependentValue::Vector(v) => v.len(),
        }
    }

    /// Returns true for an empty vector.
    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One block of a run log: the x value plus every metric recorded for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSample {
    /// Independent variable for this block.
    pub x: IndependentValue,
    /// Metric name to the values recorded in this block, in input order.
    pub metrics: BTreeMap<String, Vec<f64>>,
}

impl RunSample {
    /// Creates a sample with no metrics.
    pub fn new(x: IndependentValue) -> Self {
        Self {
            x,
            metrics: BTreeMap::new(),
        }
    }

    /// Builder-style helper used when assembling samples by hand.
    #[allow(dead_code)] // Called from to_samples() and tests
    pub fn with_metric(mut self, name: &str, values: Vec<f64>) -> Self {
        self.metrics.entry(name.to_string()).or_default().extend(values);
        self
    }
}

/// Mean and population standard deviation of one metric, aligned to `AggregatedSeries::x`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
    /// Number of values behind each mean.
    #[serde(default)]
    pub count: Vec<usize>,
}

/// Per-x statistics for every metric of one run file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    /// Distinct x values, ascending.
    pub x: Vec<XValue>,
    /// Number of blocks (vector positions for vector x) recorded at each x.
    ///
    /// A block may carry several values per metric; see `MetricSeries::count`.
    pub blocks: Vec<usize>,
    /// Metric name to its statistics, index-aligned to `x`.
    pub metrics: BTreeMap<String, MetricSeries>,
    /// x positions dropped when ragged vectors were truncated.
    #[serde(default)]
    pub truncated: usize,
}

impl AggregatedSeries {
    /// Number of distinct x values.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true when the run contained no blocks.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Looks up a metric by name.
    #[allow(dead_code)] // Lookup helper, exercised by tests
    pub fn metric(&self, name: &str) -> Option<&MetricSeries> {
        self.metrics.get(name)
    }

    /// Returns (mean, stddev) for a metric at a given x.
    #[allow(dead_code)] // Lookup helper for callers holding a single x
    pub fn stats_at(&self, metric: &str, x: &XValue) -> Option<(f64, f64)> {
        let idx = self.x.binary_search(x).ok()?;
        let series = self.metrics.get(metric)?;
        Some((*series.mean.get(idx)?, *series.stddev.get(idx)?))
    }

    /// Converts the means back into one scalar sample per x.
    ///
    /// Aggregating the result again reproduces the same means with zero deviation.
    #[allow(dead_code)] // Used to re-aggregate already summarised runs
    pub fn to_samples(&self) -> Vec<RunSample> {
        self.x
            .iter()
            .enumerate()
            .map(|(i, x)| {
                self.metrics.iter().fold(
                    RunSample::new(IndependentValue::Scalar(x.clone())),
                    |sample, (name, series)| sample.with_metric(name, vec![series.mean[i]]),
                )
            })
            .collect()
    }
}

/// Descriptor of one run file to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFile {
    /// Trial (experiment sweep) the run belongs to.
    pub trial: String,
    /// Run file name, used to select the extraction rule.
    pub name: String,
    /// Location of the log on disk.
    pub path: PathBuf,
}

impl RunFile {
    /// Builds a descriptor from a path laid out as `<topDir>/<trial>/<run>`.
    ///
    /// An explicit `trial` overrides the parent directory name.
    pub fn from_path(path: &Path, trial: Option<&str>) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let trial = match trial {
            Some(t) => t.to_string(),
            None => path
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        };

        Self {
            trial,
            name,
            path: path.to_path_buf(),
        }
    }
}

/// Outcome of processing one run file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedRun {
    pub trial: String,
    pub run: String,
    pub path: String,
    /// Aggregated statistics when processing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<AggregatedSeries>,
    /// Error message when processing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyzedRun {
    /// Creates a successful result.
    pub fn succeeded(file: &RunFile, series: AggregatedSeries) -> Self {
        Self {
            trial: file.trial.clone(),
            run: file.name.clone(),
            path: file.path.display().to_string(),
            series: Some(series),
            error: None,
        }
    }

    /// Creates a failed result.
    pub fn failed(file: &RunFile, error: String) -> Self {
        Self {
            trial: file.trial.clone(),
            run: file.name.clone(),
            path: file.path.display().to_string(),
            series: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.series.is_some()
    }
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
    /// Version of the tool that produced it.
    pub tool_version: String,
    /// Number of run files processed.
    pub runs_processed: usize,
    /// Number of run files that failed.
    pub runs_failed: usize,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

/// The complete aggregation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub runs: Vec<AnalyzedRun>,
}

impl Report {
    /// Builds a report, deriving the run counters from `runs`.
    pub fn new(runs: Vec<AnalyzedRun>, duration_seconds: f64) -> Self {
        let runs_failed = runs.iter().filter(|r| !r.is_success()).count();
        Self {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                runs_processed: runs.len(),
                runs_failed,
                duration_seconds,
            },
            runs,
        }
    }
}
