//! Grouped aggregation of run samples.
//!
//! This module turns the blocks of one run log into per-x mean and
//! population standard deviation series, and provides small helpers
//! for grouping processed runs.

use crate::error::AggregateError;
use crate::models::{AggregatedSeries, AnalyzedRun, IndependentValue, MetricSeries, RunSample, XValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// How to handle vector x values of differing lengths within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorAlignment {
    /// Cut every vector (and its metric values) to the shortest one.
    #[default]
    TruncateToShortest,
    /// Fail the run.
    Reject,
}

/// Observations collected for one x value.
#[derive(Debug, Default)]
struct Group {
    blocks: usize,
    values: BTreeMap<String, Vec<f64>>,
}

impl Group {
    fn record<'a>(&mut self, observations: impl Iterator<Item = (&'a str, &'a [f64])>) {
        self.blocks += 1;
        for (name, values) in observations {
            self.values
                .entry(name.to_string())
                .or_default()
                .extend_from_slice(values);
        }
    }
}

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N). NaN for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Aggregate run samples into per-x statistics for every metric.
///
/// Scalar x values take every metric value of their block as an
/// observation. Vector x values pair position `i` with element `i` of
/// each metric. Output x values are unique and ascending, and every
/// metric series is index-aligned to them.
pub fn aggregate(
    samples: &[RunSample],
    alignment: VectorAlignment,
) -> Result<AggregatedSeries, AggregateError> {
    if samples.is_empty() {
        return Ok(AggregatedSeries::default());
    }

    let names = metric_names(samples)?;
    let vector_mode = matches!(samples[0].x, IndependentValue::Vector(_));

    if let Some(block) = samples
        .iter()
        .position(|s| matches!(s.x, IndependentValue::Vector(_)) != vector_mode)
    {
        return Err(AggregateError::MixedIndependentValues { block });
    }

    let mut groups: BTreeMap<XValue, Group> = BTreeMap::new();
    let mut truncated = 0;

    if vector_mode {
        let (width, dropped) = common_width(samples, alignment)?;
        truncated = dropped;

        for (block, sample) in samples.iter().enumerate() {
            let IndependentValue::Vector(ref xs) = sample.x else {
                continue;
            };

            for name in &names {
                let found = sample.metrics[*name].len();
                if found < width {
                    return Err(AggregateError::MisalignedMetric {
                        block,
                        metric: name.to_string(),
                        expected: width,
                        found,
                    });
                }
            }

            for (i, x) in xs.iter().take(width).enumerate() {
                groups.entry(XValue::number(*x)).or_default().record(
                    names
                        .iter()
                        .map(|name| (*name, &sample.metrics[*name][i..i + 1])),
                );
            }
        }
    } else {
        for sample in samples {
            let IndependentValue::Scalar(ref x) = sample.x else {
                continue;
            };
            groups.entry(x.clone()).or_default().record(
                sample
                    .metrics
                    .iter()
                    .map(|(name, values)| (name.as_str(), values.as_slice())),
            );
        }
    }

    let mut series = AggregatedSeries {
        truncated,
        ..Default::default()
    };

    for (x, group) in groups {
        series.x.push(x);
        series.blocks.push(group.blocks);

        for name in &names {
            let values = group.values.get(*name).map(Vec::as_slice).unwrap_or_default();
            let entry = series
                .metrics
                .entry(name.to_string())
                .or_insert_with(MetricSeries::default);
            entry.mean.push(mean(values));
            entry.stddev.push(population_std_dev(values));
            entry.count.push(values.len());
        }
    }

    debug!(
        "Aggregated {} block(s) into {} x value(s), {} metric(s)",
        samples.len(),
        series.len(),
        series.metrics.len()
    );

    Ok(series)
}

/// Every metric name in the batch; each block must carry all of them.
fn metric_names(samples: &[RunSample]) -> Result<BTreeSet<&str>, AggregateError> {
    let names: BTreeSet<&str> = samples
        .iter()
        .flat_map(|s| s.metrics.keys().map(String::as_str))
        .collect();

    for (block, sample) in samples.iter().enumerate() {
        if let Some(missing) = names.iter().find(|n| !sample.metrics.contains_key(**n)) {
            return Err(AggregateError::MissingMetric {
                block,
                metric: missing.to_string(),
            });
        }
    }

    Ok(names)
}

/// Shortest x-vector length in the batch, plus the number of positions beyond it.
fn common_width(
    samples: &[RunSample],
    alignment: VectorAlignment,
) -> Result<(usize, usize), AggregateError> {
    let lengths: Vec<usize> = samples.iter().map(|s| s.x.len()).collect();
    let shortest = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);

    if shortest == longest {
        return Ok((shortest, 0));
    }

    match alignment {
        VectorAlignment::Reject => Err(AggregateError::RaggedVectors { shortest, longest }),
        VectorAlignment::TruncateToShortest => {
            let dropped: usize = lengths.iter().map(|l| l - shortest).sum();
            warn!(
                "Truncating x vectors to {} positions (longest {}), dropping {} observation(s)",
                shortest, longest, dropped
            );
            Ok((shortest, dropped))
        }
    }
}

/// Group processed runs by trial name.
pub fn group_by_trial(runs: &[AnalyzedRun]) -> BTreeMap<String, Vec<&AnalyzedRun>> {
    let mut grouped: BTreeMap<String, Vec<&AnalyzedRun>> = BTreeMap::new();

    for run in runs {
        grouped.entry(run.trial.clone()).or_default().push(run);
    }

    // Sort runs within each trial by file name
    for runs in grouped.values_mut() {
        runs.sort_by(|a, b| a.run.cmp(&b.run));
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunFile;
    use crate::parser::{parse_str, ExtractionRule};
    use std::path::Path;

    fn scalar(x: f64) -> RunSample {
        RunSample::new(IndependentValue::Scalar(XValue::Number(x)))
    }

    fn vector(xs: &[f64]) -> RunSample {
        RunSample::new(IndependentValue::Vector(xs.to_vec()))
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_mean_and_std_dev() {
        assert_close(mean(&[2.0, 4.0, 6.0]), 4.0);
        assert_close(population_std_dev(&[2.0, 4.0, 6.0]), (8.0f64 / 3.0).sqrt());
        assert_close(population_std_dev(&[5.0]), 0.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_aggregate_groups_by_x() {
        let samples = vec![
            scalar(5.0).with_metric("m", vec![2.0]),
            scalar(3.0).with_metric("m", vec![1.0]),
            scalar(5.0).with_metric("m", vec![4.0]),
            scalar(5.0).with_metric("m", vec![6.0]),
        ];

        let series = aggregate(&samples, VectorAlignment::default()).unwrap();

        assert_eq!(series.x, vec![XValue::Number(3.0), XValue::Number(5.0)]);
        assert_eq!(series.blocks, vec![1, 3]);
        let (m, sd) = series.stats_at("m", &XValue::Number(5.0)).unwrap();
        assert_close(m, 4.0);
        assert_close(sd, 1.632993161855452);
    }

    #[test]
    fn test_aggregate_flattens_block_vectors() {
        let content = "settings:3_5\nscore:10,20\nsettings:3_5\nscore:30\nsettings:4_5\nscore:100\n";
        let samples = parse_str(content, &ExtractionRule::field(0)).unwrap();

        let series = aggregate(&samples, VectorAlignment::default()).unwrap();

        assert_eq!(series.x, vec![XValue::Number(3.0), XValue::Number(4.0)]);
        let (m, sd) = series.stats_at("score", &XValue::Number(3.0)).unwrap();
        assert_close(m, 20.0);
        assert_close(sd, population_std_dev(&[10.0, 20.0, 30.0]));
        assert_eq!(series.stats_at("score", &XValue::Number(4.0)), Some((100.0, 0.0)));
    }

    #[test]
    fn test_count_tracks_values_not_blocks() {
        let content = "settings:3_5\nscore:10,20\nsettings:3_5\nscore:30\nsettings:4_5\nscore:100\n";
        let samples = parse_str(content, &ExtractionRule::field(1)).unwrap();

        let series = aggregate(&samples, VectorAlignment::default()).unwrap();

        assert_eq!(series.x, vec![XValue::Number(5.0)]);
        assert_eq!(series.blocks, vec![3]);
        let score = series.metric("score").unwrap();
        assert_eq!(score.count, vec![4]);
        assert_close(score.mean[0], 40.0);
    }

    #[test]
    fn test_negative_zero_groups_with_zero() {
        let content = "settings:0\nm:1\nsettings:-0\nm:3\n";
        let samples = parse_str(content, &ExtractionRule::field(0)).unwrap();

        let series = aggregate(&samples, VectorAlignment::default()).unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.x[0].to_string(), "0");
        assert_eq!(series.metric("m").unwrap().mean, vec![2.0]);

        let samples = vec![
            vector(&[-0.0, 1.0]).with_metric("m", vec![1.0, 5.0]),
            vector(&[0.0, 1.0]).with_metric("m", vec![3.0, 5.0]),
        ];
        let series = aggregate(&samples, VectorAlignment::default()).unwrap();
        assert_eq!(series.x, vec![XValue::Number(0.0), XValue::Number(1.0)]);
        assert_eq!(series.blocks, vec![2, 2]);
    }

    #[test]
    fn test_aggregate_empty() {
        let series = aggregate(&[], VectorAlignment::default()).unwrap();
        assert!(series.is_empty());
        assert!(series.metrics.is_empty());
    }

    #[test]
    fn test_alignment_invariant() {
        let samples = vec![
            scalar(1.0).with_metric("a", vec![1.0]).with_metric("b", vec![2.0]),
            scalar(2.0).with_metric("a", vec![3.0]).with_metric("b", vec![4.0]),
            scalar(1.0).with_metric("a", vec![5.0]).with_metric("b", vec![6.0]),
        ];

        let series = aggregate(&samples, VectorAlignment::default()).unwrap();

        for metric in series.metrics.values() {
            assert_eq!(metric.mean.len(), series.x.len());
            assert_eq!(metric.stddev.len(), series.x.len());
            assert_eq!(metric.count.len(), series.x.len());
        }
        assert!(series.x.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_text_x_sorted_lexicographically() {
        let samples = vec![
            RunSample::new(IndependentValue::Scalar(XValue::from("Revive")))
                .with_metric("t", vec![2.0]),
            RunSample::new(IndependentValue::Scalar(XValue::from("CoinWasher")))
                .with_metric("t", vec![1.0]),
        ];

        let series = aggregate(&samples, VectorAlignment::default()).unwrap();
        assert_eq!(series.x, vec![XValue::from("CoinWasher"), XValue::from("Revive")]);
        assert_eq!(series.metric("t").unwrap().mean, vec![1.0, 2.0]);
    }

    #[test]
    fn test_reaggregation_is_idempotent() {
        let samples = vec![
            scalar(1.0).with_metric("m", vec![1.0, 3.0]),
            scalar(2.0).with_metric("m", vec![10.0]),
        ];

        let first = aggregate(&samples, VectorAlignment::default()).unwrap();
        let second = aggregate(&first.to_samples(), VectorAlignment::default()).unwrap();

        assert_eq!(second.x, first.x);
        assert_eq!(second.metric("m").unwrap().mean, first.metric("m").unwrap().mean);
        assert!(second.metric("m").unwrap().stddev.iter().all(|s| *s == 0.0));

        let third = aggregate(&second.to_samples(), VectorAlignment::default()).unwrap();
        assert_eq!(third.metrics, second.metrics);
    }

    #[test]
    fn test_vector_truncation() {
        let samples = vec![
            vector(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
                .with_metric("m", vec![1.0, 1.0, 1.0, 1.0, 1.0, 9.0, 9.0]),
            vector(&[0.0, 1.0, 2.0, 3.0, 4.0]).with_metric("m", vec![3.0, 3.0, 3.0, 3.0, 3.0]),
        ];

        let series = aggregate(&samples, VectorAlignment::TruncateToShortest).unwrap();

        assert_eq!(series.len(), 5);
        assert_eq!(series.truncated, 2);
        assert_eq!(series.blocks, vec![2; 5]);
        assert_eq!(series.metric("m").unwrap().mean, vec![2.0; 5]);
        assert_eq!(series.metric("m").unwrap().stddev, vec![1.0; 5]);
    }

    #[test]
    fn test_vector_reject() {
        let samples = vec![
            vector(&[0.0, 1.0, 2.0]).with_metric("m", vec![1.0, 1.0, 1.0]),
            vector(&[0.0, 1.0]).with_metric("m", vec![1.0, 1.0]),
        ];

        let err = aggregate(&samples, VectorAlignment::Reject).unwrap_err();
        assert_eq!(
            err,
            AggregateError::RaggedVectors {
                shortest: 2,
                longest: 3
            }
        );
    }

    #[test]
    fn test_vector_short_metric() {
        let samples = vec![vector(&[0.0, 1.0, 2.0]).with_metric("m", vec![1.0])];

        let err = aggregate(&samples, VectorAlignment::default()).unwrap_err();
        assert!(matches!(
            err,
            AggregateError::MisalignedMetric {
                block: 0,
                expected: 3,
                found: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_metric() {
        let samples = vec![
            scalar(1.0).with_metric("a", vec![1.0]).with_metric("b", vec![1.0]),
            scalar(2.0).with_metric("a", vec![1.0]),
        ];

        let err = aggregate(&samples, VectorAlignment::default()).unwrap_err();
        assert_eq!(
            err,
            AggregateError::MissingMetric {
                block: 1,
                metric: "b".to_string()
            }
        );
    }

    #[test]
    fn test_mixed_independent_values() {
        let samples = vec![
            scalar(1.0).with_metric("a", vec![1.0]),
            vector(&[1.0]).with_metric("a", vec![1.0]),
        ];

        let err = aggregate(&samples, VectorAlignment::default()).unwrap_err();
        assert_eq!(err, AggregateError::MixedIndependentValues { block: 1 });
    }

    #[test]
    fn test_group_by_trial() {
        let a = RunFile::from_path(Path::new("T1/b.csv"), None);
        let b = RunFile::from_path(Path::new("T1/a.csv"), None);
        let c = RunFile::from_path(Path::new("T2/c.csv"), None);
        let runs = vec![
            AnalyzedRun::succeeded(&a, AggregatedSeries::default()),
            AnalyzedRun::succeeded(&b, AggregatedSeries::default()),
            AnalyzedRun::failed(&c, "bad".to_string()),
        ];

        let grouped = group_by_trial(&runs);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["T1"][0].run, "a.csv");
        assert_eq!(grouped["T2"].len(), 1);
    }
}
