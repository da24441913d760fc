mod bootstrap;
mod report;

use std::time::Instant;

use anyhow::{Context, Result};
use leadtime_core::normalization::{ManufacturerNormalizer, TableNormalizer};
use leadtime_core::settings::Settings;
use leadtime_data::analysis::{analyze, AnalysisInput, AnalysisOptions};
use leadtime_data::reader::{load_category_definitions, load_quote_records};

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("leadtime v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, min data points: {}, top: {}",
        settings.view,
        settings.min_data_points,
        settings.top
    );

    let quotes_path = match settings.quotes.clone() {
        Some(path) => path,
        None => {
            let cwd = std::env::current_dir().context("reading the current directory")?;
            bootstrap::discover_quotes_path(&cwd).with_context(|| {
                format!(
                    "no quote data found; pass --quotes <PATH> or place {} in {}",
                    bootstrap::DEFAULT_QUOTES_FILE,
                    cwd.display()
                )
            })?
        }
    };

    // ── Load ──────────────────────────────────────────────────────────────────
    let load_start = Instant::now();
    let load = load_quote_records(&quotes_path)
        .with_context(|| format!("loading quotes from {}", quotes_path.display()))?;
    let categories = settings
        .categories
        .as_deref()
        .map(|path| {
            load_category_definitions(path)
                .with_context(|| format!("loading categories from {}", path.display()))
        })
        .transpose()?;
    let normalizer: Box<dyn ManufacturerNormalizer> = match settings.manufacturer_map.as_deref() {
        Some(path) => Box::new(
            TableNormalizer::from_json_file(path)
                .with_context(|| format!("loading manufacturer map {}", path.display()))?,
        ),
        None => Box::new(TableNormalizer::builtin()),
    };
    tracing::info!(
        "Loaded {} quote records from {} files ({} rows skipped) in {:.2}s",
        load.records.len(),
        load.files.len(),
        load.rows_skipped,
        load_start.elapsed().as_secs_f64()
    );

    // ── Analyze ───────────────────────────────────────────────────────────────
    let options = AnalysisOptions {
        min_data_points: settings.min_data_points,
        normalizer,
    };
    let input = AnalysisInput {
        records: load.records,
        categories,
        rows_skipped: load.rows_skipped,
    };
    let result = analyze(input, &options).context("analysis failed")?;

    // ── Report ────────────────────────────────────────────────────────────────
    print!("{}", report::render(&settings.view, &result, settings.top));

    if let Some(path) = settings.output.as_deref() {
        report::write_json(path, &result)?;
        tracing::info!("Analysis written to {}", path.display());
    }

    Ok(())
}
