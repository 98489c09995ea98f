//! Analysis modules.
//!
//! Filtering and per-zone aggregation over ingested records.

pub mod aggregator;

pub use aggregator::*;
