use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Lead-time statistics for procurement quotes, by category, manufacturer and month
#[derive(Parser, Debug, Clone)]
#[command(
    name = "leadtime",
    about = "Lead-time statistics for procurement quotes, by category, manufacturer and month",
    version
)]
pub struct Settings {
    /// Quote CSV file, or a directory searched recursively for .csv files
    #[arg(long, env = "LEADTIME_QUOTES")]
    pub quotes: Option<PathBuf>,

    /// Component-type CSV with component_type, level and tree_path columns
    #[arg(long, env = "LEADTIME_CATEGORIES")]
    pub categories: Option<PathBuf>,

    /// JSON object mapping raw manufacturer spellings to canonical names
    #[arg(long)]
    pub manufacturer_map: Option<PathBuf>,

    /// Minimum observations for a category or manufacturer to be ranked
    #[arg(long, default_value = "10")]
    pub min_data_points: usize,

    /// Number of rows to show per table
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Report view
    #[arg(long, default_value = "summary", value_parser = ["summary", "components", "hierarchy", "manufacturers", "trend"])]
    pub view: String,

    /// Write the full analysis as JSON to this path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Config file (defaults to ~/.leadtime/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── FileConfig ─────────────────────────────────────────────────────────────────

/// Optional defaults read from `~/.leadtime/config.json`.
///
/// The file is only ever read; explicit command-line values always win.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quotes: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_map: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_data_points: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Default location: `~/.leadtime/config.json`.
    pub fn default_path() -> PathBuf {
        Self::path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The config path rooted at `base_dir` (used for testing).
    pub fn path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".leadtime").join("config.json")
    }

    /// Load from an explicit path.
    ///
    /// A missing file yields the default; a file that exists but cannot be
    /// parsed is reported and ignored.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unreadable config {}: {}", path.display(), e);
            Self::default()
        })
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse process arguments and merge in the config file.
    pub fn load() -> Self {
        Self::load_impl(std::env::args_os().collect(), None)
    }

    /// Full implementation – accepts args and an optional config-path
    /// override so that tests can redirect to a temporary directory.
    ///
    /// Path precedence: `--config`, then `default_config`, then
    /// [`FileConfig::default_path`].
    pub fn load_impl(args: Vec<std::ffi::OsString>, default_config: Option<&Path>) -> Self {
        // Raw ArgMatches so we can query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let settings = Settings::parse_from(args);

        let config_path = settings
            .config
            .clone()
            .or_else(|| default_config.map(Path::to_path_buf))
            .unwrap_or_else(FileConfig::default_path);
        let file = FileConfig::load_from(&config_path);

        Self::merge(settings, file, &matches)
    }

    /// Fill every field not given explicitly (command line or environment)
    /// from `file`, then apply `--debug`.
    fn merge(mut settings: Settings, file: FileConfig, matches: &clap::ArgMatches) -> Settings {
        if settings.quotes.is_none() {
            settings.quotes = file.quotes;
        }
        if settings.categories.is_none() {
            settings.categories = file.categories;
        }
        if settings.manufacturer_map.is_none() {
            settings.manufacturer_map = file.manufacturer_map;
        }
        // NOTE: clap stores the arg id using the *field name* (underscores),
        // not the long-flag spelling (hyphens).
        if !is_arg_explicitly_set(matches, "min_data_points") {
            if let Some(v) = file.min_data_points {
                settings.min_data_points = v;
            }
        }
        if !is_arg_explicitly_set(matches, "top") {
            if let Some(v) = file.top {
                settings.top = v;
            }
        }
        if !is_arg_explicitly_set(matches, "view") {
            if let Some(v) = file.view {
                settings.view = v;
            }
        }
        if !is_arg_explicitly_set(matches, "log_level") {
            if let Some(v) = file.log_level {
                settings.log_level = v;
            }
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }
}

// ── Helper: check if an arg was explicitly set on the command line ─────────────

/// Returns `true` when `name` was supplied on the command line or through
/// its environment variable (anything but the default).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(clap::parser::ValueSource::CommandLine) | Some(clap::parser::ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
