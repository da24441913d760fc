use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AnalyzerError;

// ── MonthKey ──────────────────────────────────────────────────────────────────

/// A calendar month, rendered as `YYYY-MM`.
///
/// Ordering is chronological, so a `BTreeMap<MonthKey, _>` iterates oldest
/// month first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Build a key from a year and a 1-based month. Returns `None` when the
    /// month is outside `1..=12` or the year does not fit in four digits.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return None;
        }
        Some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalyzerError::InvalidMonthKey(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── RawQuoteRecord ────────────────────────────────────────────────────────────

/// One row of the package-quote export, exactly as read from CSV.
///
/// Every field is kept as text so that a malformed value only affects the
/// record it belongs to; interpretation happens in the expander.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuoteRecord {
    /// Opaque row identifier; the reader fills in `file:row` when absent.
    #[serde(default, alias = "quote_id")]
    pub id: String,
    #[serde(default)]
    pub answer_date: String,
    #[serde(default)]
    pub lead_time_weeks: String,
    /// JSON-encoded list of component-type names, e.g. `["Fan","Damper"]`.
    #[serde(default)]
    pub component_types: String,
    /// JSON-encoded list of manufacturer names.
    #[serde(default, alias = "manufacturers")]
    pub manufacturer: String,
    #[serde(default)]
    pub cost: String,
    #[serde(default)]
    pub component_count: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub buyer_name: String,
    #[serde(default)]
    pub seller_name: String,
}

impl RawQuoteRecord {
    /// Quoted cost; anything unparseable or non-finite counts as `0`.
    pub fn parsed_cost(&self) -> f64 {
        self.cost
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|c| c.is_finite() && *c >= 0.0)
            .unwrap_or(0.0)
    }

    /// Number of components on the quote; defaults to `1` when missing,
    /// unparseable, or below one.
    pub fn parsed_component_count(&self) -> u32 {
        let trimmed = self.component_count.trim();
        let whole = trimmed.split('.').next().unwrap_or(trimmed);
        whole.parse::<u32>().ok().filter(|&n| n >= 1).unwrap_or(1)
    }
}

// ── Observation ───────────────────────────────────────────────────────────────

/// One atomic (month, category, manufacturer, lead time) data point.
///
/// Produced only by the record expander, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub month: MonthKey,
    pub category: String,
    pub manufacturer: String,
    pub lead_time_weeks: f64,
    pub cost: f64,
    pub component_count: u32,
    pub project_name: String,
    pub buyer_name: String,
    pub seller_name: String,
    pub source_record_id: String,
}

// ── CategoryDefinition ────────────────────────────────────────────────────────

/// Delimiter between ancestor names in a category tree path.
pub const TREE_PATH_DELIMITER: &str = " > ";

/// One component type from the category export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDefinition {
    pub name: String,
    pub level: u32,
    /// Ancestor chain, most general first, ending in the category itself,
    /// e.g. `"HVAC > Air Handling > Fan"`.
    pub tree_path: String,
}

impl CategoryDefinition {
    pub fn new(name: impl Into<String>, level: u32, tree_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level,
            tree_path: tree_path.into(),
        }
    }
}

/// Split a `"A > B > C"` path into trimmed, non-empty segments.
///
/// Only a spaced `" > "` separates segments, so names such as
/// `"Motor >50HP"` stay whole.
pub fn split_tree_path(path: &str) -> Vec<String> {
    path.split(TREE_PATH_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
