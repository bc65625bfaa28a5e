//! Error types for log parsing and aggregation.
//!
//! Both stages are pure transformations, so their failures are typed and
//! matchable. The application layers wrap them with `anyhow` context.

use thiserror::Error;

/// Failure while turning a measurement log into run samples.
///
/// Line numbers are 1-based and refer to the original input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A non-blank line without a `name:payload` separator.
    #[error("line {line}: expected `name:payload`, found {content:?}")]
    MissingSeparator { line: usize, content: String },

    /// A numeric literal that does not parse as a float.
    #[error("line {line}: invalid number {literal:?} in {field:?}")]
    InvalidNumber {
        line: usize,
        field: String,
        literal: String,
    },

    /// The settings encoding has fewer positional fields than the rule asks for.
    #[error("line {line}: settings {encoding:?} has no field {index} (split on {separator:?})")]
    MissingField {
        line: usize,
        encoding: String,
        index: usize,
        separator: char,
    },
}

/// Failure while grouping run samples into an aggregated series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    /// Some blocks carry scalar x values and others carry vectors.
    #[error("block {block}: independent variable mixes scalar and vector values")]
    MixedIndependentValues { block: usize },

    /// Vector x values of differing lengths while alignment is `reject`.
    #[error("vector x values have differing lengths (shortest {shortest}, longest {longest})")]
    RaggedVectors { shortest: usize, longest: usize },

    /// A metric recorded in one block is absent from another.
    #[error("block {block}: metric {metric:?} is missing")]
    MissingMetric { block: usize, metric: String },

    /// A metric payload shorter than the x vector it must pair with.
    #[error("block {block}: metric {metric:?} has {found} values, expected at least {expected}")]
    MisalignedMetric {
        block: usize,
        metric: String,
        expected: usize,
        found: usize,
    },
}
