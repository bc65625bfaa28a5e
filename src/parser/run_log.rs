//! Measurement log parsing.
//!
//! A run log is a sequence of blocks. Each block starts with a
//! `settings:<encoding>` line and is followed by `metric:v1,v2,...` lines
//! until the next settings line or the end of input.

use crate::error::ParseError;
use crate::models::RunSample;
use crate::parser::rules::{parse_numbers, ExtractionRule};
use tracing::{debug, warn};

/// Name of the line that opens a new block.
pub const SETTINGS_MARKER: &str = "settings";

/// Parse log lines into one sample per settings block, in input order.
pub fn parse<I, S>(lines: I, rule: &ExtractionRule) -> Result<Vec<RunSample>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut samples: Vec<RunSample> = Vec::new();
    let mut orphaned = 0usize;

    for (idx, raw) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = raw.as_ref().trim();

        if line.is_empty() {
            continue;
        }

        let (name, payload) = line
            .split_once(':')
            .ok_or_else(|| ParseError::MissingSeparator {
                line: line_no,
                content: line.to_string(),
            })?;

        if name == SETTINGS_MARKER {
            let x = rule.extract(payload, line_no)?;
            samples.push(RunSample::new(x));
            continue;
        }

        let values = parse_numbers(payload, ',', name, line_no)?;

        match samples.last_mut() {
            Some(sample) => sample
                .metrics
                .entry(name.to_string())
                .or_default()
                .extend(values),
            None => orphaned += 1,
        }
    }

    if orphaned > 0 {
        warn!(
            "Skipped {} metric line(s) appearing before the first settings line",
            orphaned
        );
    }

    debug!("Parsed {} block(s)", samples.len());
    Ok(samples)
}

/// Parse a whole log held in memory.
pub fn parse_str(content: &str, rule: &ExtractionRule) -> Result<Vec<RunSample>, ParseError> {
    parse(content.lines(), rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IndependentValue, XValue};

    const SWEEP_LOG: &str = include_str!("../../fixtures/hopCount_5.csv");

    #[test]
    fn test_parse_blocks_in_order() {
        let input = "settings:3_5\nscore:10,20\nsettings:3_5\nscore:30\nsettings:4_5\nscore:100\n";
        let samples = parse_str(input, &ExtractionRule::field(1)).unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].x, IndependentValue::Scalar(XValue::Number(5.0)));
        assert_eq!(samples[0].metrics["score"], vec![10.0, 20.0]);
        assert_eq!(samples[1].metrics["score"], vec![30.0]);
        assert_eq!(samples[2].metrics["score"], vec![100.0]);
    }

    #[test]
    fn test_parse_empty_input() {
        let samples = parse_str("", &ExtractionRule::Raw).unwrap();
        assert!(samples.is_empty());

        let samples = parse_str("\n\n  \n", &ExtractionRule::Raw).unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_parse_block_without_metrics() {
        let samples = parse_str("settings:A\nsettings:B\nm:1", &ExtractionRule::Raw).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].metrics.is_empty());
        assert_eq!(samples[1].metrics["m"], vec![1.0]);
    }

    #[test]
    fn test_repeated_metric_appends() {
        let samples = parse_str("settings:A\nm:1,2\nm:3", &ExtractionRule::Raw).unwrap();
        assert_eq!(samples[0].metrics["m"], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_lines_before_first_settings_are_skipped() {
        let samples = parse_str("m:9\nsettings:A\nm:1", &ExtractionRule::Raw).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].metrics["m"], vec![1.0]);
    }

    #[test]
    fn test_invalid_number_fails() {
        let err = parse_str("settings:A\nm:1,two,3", &ExtractionRule::Raw).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                line: 2,
                field: "m".to_string(),
                literal: "two".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_separator_fails() {
        let err = parse_str("settings:A\ngarbage", &ExtractionRule::Raw).unwrap_err();
        assert!(matches!(err, ParseError::MissingSeparator { line: 2, .. }));
    }

    #[test]
    fn test_vector_settings() {
        let input = "settings:0,1000,2000\nsuccessRatio:0.5,0.6,0.7\n";
        let samples = parse_str(input, &ExtractionRule::vector()).unwrap();
        assert_eq!(
            samples[0].x,
            IndependentValue::Vector(vec![0.0, 1000.0, 2000.0])
        );
        assert_eq!(samples[0].metrics["successRatio"], vec![0.5, 0.6, 0.7]);
    }

    #[test]
    fn test_parse_fixture() {
        let samples = parse_str(SWEEP_LOG, &ExtractionRule::field(0)).unwrap();
        assert_eq!(samples.len(), 6);
        assert!(samples.iter().all(|s| s.metrics.contains_key("nOfParticipants")));
    }
}
