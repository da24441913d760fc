//! Data layer for the lead-time analyzer.
//!
//! Reads quote and category CSV exports, expands quotes into observations,
//! builds the component-type hierarchy, aggregates and ranks statistics and
//! runs the top-level analysis pipeline.

pub mod aggregator;
pub mod analysis;
pub mod expander;
pub mod hierarchy;
pub mod ranking;
pub mod reader;

pub use leadtime_core as core;
