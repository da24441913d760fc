//! CSV discovery and loading for quote exports and category definitions.
//!
//! Quote rows are deserialized into [`RawQuoteRecord`] with every field kept
//! as text; a row that cannot be read at all is counted and skipped so one
//! bad line never aborts a file.

use std::fs::File;
use std::path::{Path, PathBuf};

use leadtime_core::error::{AnalyzerError, Result};
use leadtime_core::models::{split_tree_path, CategoryDefinition, RawQuoteRecord};
use serde::Deserialize;
use tracing::{debug, warn};

// ── QuoteLoad ─────────────────────────────────────────────────────────────────

/// Quote records read from one or more CSV files.
#[derive(Debug, Clone, Default)]
pub struct QuoteLoad {
    pub records: Vec<RawQuoteRecord>,
    pub files: Vec<PathBuf>,
    /// Data rows seen across all files (header lines excluded).
    pub rows_read: usize,
    /// Rows the CSV layer could not turn into a record.
    pub rows_skipped: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// A file path returns itself; a directory is searched recursively for
/// `.csv` files, sorted by path.
pub fn find_csv_files(path: &Path) -> Vec<PathBuf> {
    if !path.exists() {
        warn!("Data path does not exist: {}", path.display());
        return Vec::new();
    }
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every quote row under `path` (a CSV file or a directory of them).
///
/// Rows without an id get `"<file-stem>:<line>"` so rejected records can be
/// traced back to their source.
pub fn load_quote_records(path: &Path) -> Result<QuoteLoad> {
    let files = find_csv_files(path);
    if files.is_empty() {
        return Err(AnalyzerError::NoDataFiles(path.to_path_buf()));
    }

    let mut load = QuoteLoad::default();
    for file_path in &files {
        read_quote_file(file_path, &mut load)?;
    }
    load.files = files;

    debug!(
        "Loaded {} quote records from {} files ({} rows skipped)",
        load.records.len(),
        load.files.len(),
        load.rows_skipped
    );
    Ok(load)
}

/// Load category definitions from a CSV with `component_type`, `level` and
/// `tree_path` columns.
///
/// Rows with a blank name are skipped. A level that is not an integer is
/// taken from the depth of the tree path instead.
pub fn load_category_definitions(path: &Path) -> Result<Vec<CategoryDefinition>> {
    let mut reader = open_csv(path)?;

    let mut definitions = Vec::new();
    let mut skipped = 0usize;
    for (idx, row) in reader.deserialize::<CategoryRow>().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                debug!("{}:{}: unreadable category row: {}", path.display(), idx + 2, e);
                skipped += 1;
                continue;
            }
        };
        let name = row.component_type.trim();
        if name.is_empty() {
            skipped += 1;
            continue;
        }
        let level = row
            .level
            .trim()
            .parse::<u32>()
            .unwrap_or_else(|_| split_tree_path(&row.tree_path).len().max(1) as u32);
        definitions.push(CategoryDefinition::new(name, level, row.tree_path.trim()));
    }

    debug!(
        "Loaded {} category definitions from {} ({} rows skipped)",
        definitions.len(),
        path.display(),
        skipped
    );
    Ok(definitions)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CategoryRow {
    #[serde(default, alias = "name")]
    component_type: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    tree_path: String,
}

fn open_csv(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|source| AnalyzerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    // Surface a broken header line as a file-level error up front.
    reader
        .headers()
        .map_err(|e| AnalyzerError::Csv(format!("{}: {}", path.display(), e)))?;
    Ok(reader)
}

fn read_quote_file(file_path: &Path, load: &mut QuoteLoad) -> Result<()> {
    let mut reader = open_csv(file_path)?;
    let stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut rows_read = 0usize;
    let mut rows_skipped = 0usize;

    for (idx, row) in reader.deserialize::<RawQuoteRecord>().enumerate() {
        // +2: one for the header line, one for 1-based numbering.
        let line = idx + 2;
        rows_read += 1;

        let mut record = match row {
            Ok(r) => r,
            Err(e) => {
                debug!("{}:{}: unreadable quote row: {}", file_path.display(), line, e);
                rows_skipped += 1;
                continue;
            }
        };
        if record.id.trim().is_empty() {
            record.id = format!("{stem}:{line}");
        }
        load.records.push(record);
    }

    debug!(
        "File {}: {} rows read, {} skipped",
        file_path.display(),
        rows_read,
        rows_skipped
    );
    load.rows_read += rows_read;
    load.rows_skipped += rows_skipped;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
