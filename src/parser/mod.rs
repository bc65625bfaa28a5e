//! Run log parsing.

pub mod run_log;
pub mod rules;

pub use run_log::parse_str;
pub use rules::{ExtractionRule, RuleSet};
