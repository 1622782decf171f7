//! Data layer for Cost Guardian.
//!
//! Reads CSV snapshots from a report directory, merges several snapshots
//! into one history table, and builds the detail, analysis and summary
//! views on top of the normalized records.

pub mod aggregator;
pub mod merger;
pub mod reader;
pub mod table;
pub mod writer;

pub use guardian_core as core;
