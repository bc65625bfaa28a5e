//! Declarative rules for reading the independent variable out of a settings line.
//!
//! Each experiment encodes its swept parameter differently. A `RuleSet`
//! maps a trial (and optionally a run file name fragment) to the rule that
//! extracts the x value, so no trial-specific branching lives in the parser.

use crate::error::ParseError;
use crate::models::{normalize_zero, IndependentValue, XValue};
use serde::{Deserialize, Serialize};

/// How to turn a settings encoding into an independent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionRule {
    /// Take one positional field of a separated tuple, e.g. `3_5_0.2`.
    Field {
        index: usize,
        #[serde(default = "default_field_separator")]
        separator: char,
    },
    /// Use the whole encoding as a text label.
    Raw,
    /// Parse the encoding as a numeric vector, e.g. `0,1000,2000`.
    Vector {
        #[serde(default = "default_vector_separator")]
        separator: char,
    },
}

fn default_field_separator() -> char {
    '_'
}

fn default_vector_separator() -> char {
    ','
}

impl ExtractionRule {
    /// Positional field with the default `_` separator.
    pub fn field(index: usize) -> Self {
        ExtractionRule::Field {
            index,
            separator: default_field_separator(),
        }
    }

    /// Numeric vector with the default `,` separator.
    pub fn vector() -> Self {
        ExtractionRule::Vector {
            separator: default_vector_separator(),
        }
    }

    /// Apply the rule to a settings encoding found on `line`.
    pub fn extract(&self, encoding: &str, line: usize) -> Result<IndependentValue, ParseError> {
        let encoding = encoding.trim();

        match self {
            ExtractionRule::Field { index, separator } => encoding
                .split(*separator)
                .nth(*index)
                .map(|field| IndependentValue::Scalar(XValue::from_field(field)))
                .ok_or_else(|| ParseError::MissingField {
                    line,
                    encoding: encoding.to_string(),
                    index: *index,
                    separator: *separator,
                }),
            ExtractionRule::Raw => Ok(IndependentValue::Scalar(XValue::Text(
                encoding.to_string(),
            ))),
            ExtractionRule::Vector { separator } => {
                let xs = parse_numbers(encoding, *separator, "settings", line)?;
                Ok(IndependentValue::Vector(
                    xs.into_iter().map(normalize_zero).collect(),
                ))
            }
        }
    }
}

/// Parse a separated list of floats. An empty string yields an empty list.
pub fn parse_numbers(
    payload: &str,
    separator: char,
    field: &str,
    line: usize,
) -> Result<Vec<f64>, ParseError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    payload
        .split(separator)
        .map(|literal| {
            let literal = literal.trim();
            literal.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                line,
                field: field.to_string(),
                literal: literal.to_string(),
            })
        })
        .collect()
}

/// Binds an extraction rule to a trial and, optionally, a run file name fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRule {
    /// Trial name, matched exactly.
    pub trial: String,
    /// Substring the run file name must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_contains: Option<String>,
    /// Rule to apply on a match.
    pub extract: ExtractionRule,
}

impl TrialRule {
    pub fn new(trial: &str, run_contains: Option<&str>, extract: ExtractionRule) -> Self {
        Self {
            trial: trial.to_string(),
            run_contains: run_contains.map(String::from),
            extract,
        }
    }

    /// Check if this rule applies to a run.
    pub fn matches(&self, trial: &str, run: &str) -> bool {
        if self.trial != trial {
            return false;
        }

        match self.run_contains {
            Some(ref fragment) => run.contains(fragment.as_str()),
            None => true,
        }
    }
}

/// Ordered rule table; the first matching entry wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default = "default_rules")]
    pub rules: Vec<TrialRule>,

    /// Rule used when no entry matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ExtractionRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            fallback: None,
        }
    }
}

/// Conventions of the rebalancing simulator's experiment outputs.
///
/// Sweep settings are written as `<hopCount>_<maxNumberOfInvites>_<percentageOfLeaders>`.
fn default_rules() -> Vec<TrialRule> {
    vec![
        TrialRule::new("PART_DISC", Some("hopCount"), ExtractionRule::field(0)),
        TrialRule::new(
            "PART_DISC",
            Some("maxNumberOfInvites"),
            ExtractionRule::field(1),
        ),
        TrialRule::new(
            "SCORE_VS_PERC_LEADERS",
            Some("percentageLeaders"),
            ExtractionRule::field(2),
        ),
        TrialRule::new("STATIC_REBALANCING_COMPARISON", None, ExtractionRule::Raw),
        TrialRule::new(
            "DYNAMIC_REBALANCING_COMPARISON",
            None,
            ExtractionRule::vector(),
        ),
    ]
}

impl RuleSet {
    /// Find the extraction rule for a run.
    pub fn rule_for(&self, trial: &str, run: &str) -> Option<&ExtractionRule> {
        self.rules
            .iter()
            .find(|r| r.matches(trial, run))
            .map(|r| &r.extract)
            .or(self.fallback.as_ref())
    }
}
