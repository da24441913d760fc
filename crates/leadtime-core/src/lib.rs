//! Domain model and shared building blocks for the lead-time analyzer.
//!
//! Holds the observation/record types, the error taxonomy, month-key
//! parsing, descriptive statistics, presentation formatting, the
//! manufacturer-name normalization policy and CLI settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod normalization;
pub mod settings;
pub mod stats;
pub mod time_utils;
