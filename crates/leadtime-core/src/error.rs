use std::path::PathBuf;
use thiserror::Error;

/// All structural errors produced by the lead-time analyzer.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document could not be read (bad headers, broken quoting, ...).
    #[error("Failed to read CSV: {0}")]
    Csv(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The category definitions describe a loop.
    #[error(transparent)]
    HierarchyCycle(#[from] HierarchyCycleError),

    /// Statistics were requested over an empty observation set.
    #[error("No data to aggregate for {scope}")]
    EmptyAggregation { scope: String },

    /// A string that should have been a `YYYY-MM` month key was not.
    #[error("Invalid month key: {0}")]
    InvalidMonthKey(String),

    /// The quotes path does not exist or holds no CSV files.
    #[error("No CSV files found in {0}")]
    NoDataFiles(PathBuf),
}

/// Convenience alias used throughout the analyzer crates.
pub type Result<T> = std::result::Result<T, AnalyzerError>;

// ── RecordParseError ──────────────────────────────────────────────────────────

/// Why a single quote row contributed no observations.
///
/// These never abort a run: the expander counts them by [`kind`](Self::kind)
/// and moves on to the next record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("Unparseable answer date: {0:?}")]
    InvalidDate(String),

    #[error("Invalid lead time: {0:?}")]
    InvalidLeadTime(String),

    #[error("Malformed {field} list: {reason}")]
    MalformedList { field: &'static str, reason: String },

    #[error("Record has no component types")]
    NoComponentTypes,

    #[error("Record has no manufacturers")]
    NoManufacturers,
}

impl RecordParseError {
    /// Stable label used as a counter key in run metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDate(_) => "invalid_date",
            Self::InvalidLeadTime(_) => "invalid_lead_time",
            Self::MalformedList { .. } => "malformed_list",
            Self::NoComponentTypes => "no_component_types",
            Self::NoManufacturers => "no_manufacturers",
        }
    }
}

// ── HierarchyCycleError ───────────────────────────────────────────────────────

/// A category path implies a loop, e.g. `A` declares parent `B` and `B`
/// declares parent `A`.
///
/// `cycle` lists the chain in traversal order and repeats the first name at
/// the end, so `["A", "B", "A"]` reads as `A > B > A`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Category hierarchy contains a cycle: {}", .cycle.join(" > "))]
pub struct HierarchyCycleError {
    pub cycle: Vec<String>,
}

// ── OrphanCategory ────────────────────────────────────────────────────────────

/// Non-fatal: a category's tree path names a parent that is not itself
/// defined. The category is kept as a root.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OrphanCategory {
    pub name: String,
    pub declared_parent: String,
}

impl std::fmt::Display for OrphanCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Category {:?} declares unknown parent {:?}; treated as root",
            self.name, self.declared_parent
        )
    }
}
