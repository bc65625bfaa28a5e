//! Aggregation of parsed run logs.

pub mod aggregator;

pub use aggregator::*;
