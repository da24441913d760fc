//! Main analysis pipeline.
//!
//! Normalizes manufacturer names, expands quotes into observations, builds
//! the category tree and derives every summary table, returning an
//! [`AnalysisResult`] ready for reporting or JSON export.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use leadtime_core::error::{OrphanCategory, Result};
use leadtime_core::models::{CategoryDefinition, MonthKey, RawQuoteRecord};
use leadtime_core::normalization::{
    normalize_list, ManufacturerNormalizer, NormalizerCollision, TableNormalizer,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregator::{
    AggregateStats, Aggregator, MonthlySeries, RollupStats, TrendPoint, TrendSummary,
};
use crate::expander::{expand_records, parse_list_field};
use crate::hierarchy::CategoryTree;
use crate::ranking::{rank_series, Ranked};

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything the pipeline consumes.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub records: Vec<RawQuoteRecord>,
    /// Category definitions; rollups are skipped when absent.
    pub categories: Option<Vec<CategoryDefinition>>,
    /// CSV rows the reader could not turn into records.
    pub rows_skipped: usize,
}

/// Knobs for a single run.
pub struct AnalysisOptions {
    /// Minimum total observations for a group to be ranked.
    pub min_data_points: usize,
    /// Applied to every manufacturer name before expansion.
    pub normalizer: Box<dyn ManufacturerNormalizer>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_data_points: 10,
            normalizer: Box::new(TableNormalizer::builtin()),
        }
    }
}

/// Stats for one category or manufacturer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub name: String,
    pub stats: AggregateStats,
}

/// All groups combined for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub month: MonthKey,
    pub stats: AggregateStats,
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisMetadata {
    /// ISO-8601 timestamp when this result was generated.
    pub generated_at: String,
    /// CSV rows dropped by the reader before expansion.
    pub rows_skipped: usize,
    pub records_read: usize,
    pub records_expanded: usize,
    pub records_rejected: usize,
    /// Rejections keyed by reason.
    pub rejected_by_kind: BTreeMap<&'static str, usize>,
    /// Records whose manufacturer list changed under normalization.
    pub manufacturers_normalized: usize,
    pub observations: usize,
    pub months: usize,
    pub first_month: Option<MonthKey>,
    pub last_month: Option<MonthKey>,
    pub categories_defined: usize,
    pub orphan_categories: Vec<OrphanCategory>,
    pub normalizer_collisions: Vec<NormalizerCollision>,
    pub min_data_points: usize,
    /// Wall-clock seconds spent normalizing and expanding records.
    pub expand_time_seconds: f64,
    /// Wall-clock seconds spent building the tree and aggregating.
    pub aggregate_time_seconds: f64,
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub metadata: AnalysisMetadata,
    /// Every observation combined; `None` when nothing survived expansion.
    pub overall: Option<AggregateStats>,
    /// Direct per-category stats, most data first.
    pub components: Vec<GroupStats>,
    /// Per-category rollups (self plus descendants), most data first.
    pub hierarchy: Vec<RollupStats>,
    pub manufacturers: Vec<GroupStats>,
    pub category_series: MonthlySeries<String>,
    pub manufacturer_series: MonthlySeries<String>,
    pub monthly_summary: Vec<MonthSummary>,
    pub trend: Vec<TrendPoint>,
    pub trend_summary: Option<TrendSummary>,
    pub ranked_components: Vec<Ranked<String>>,
    pub ranked_manufacturers: Vec<Ranked<String>>,
}

// ── Public function ───────────────────────────────────────────────────────────

/// Run the full analysis pipeline.
///
/// 1. Normalize each record's manufacturer list.
/// 2. Expand records into observations.
/// 3. Build the category tree (a cycle aborts the run).
/// 4. Aggregate direct, rolled-up and monthly tables.
/// 5. Rank categories and manufacturers by data sufficiency.
pub fn analyze(input: AnalysisInput, options: &AnalysisOptions) -> Result<AnalysisResult> {
    let AnalysisInput {
        mut records,
        categories,
        rows_skipped,
    } = input;
    if rows_skipped > 0 {
        warn!("{} unreadable CSV rows were skipped before analysis", rows_skipped);
    }

    // ── Step 1: Normalize manufacturers ───────────────────────────────────────
    let expand_start = Instant::now();
    let manufacturers_normalized =
        normalize_manufacturers(&mut records, options.normalizer.as_ref())?;

    // ── Step 2: Expand ────────────────────────────────────────────────────────
    let expansion = expand_records(&records);
    let expand_time = expand_start.elapsed().as_secs_f64();
    info!(
        "Expanded {} of {} records into {} observations",
        expansion.records_expanded,
        expansion.records_read,
        expansion.observations.len()
    );
    if expansion.records_rejected() > 0 {
        debug!("Rejected records by reason: {:?}", expansion.rejected);
    }

    // ── Step 3: Category tree ─────────────────────────────────────────────────
    let aggregate_start = Instant::now();
    let tree = categories
        .as_deref()
        .map(CategoryTree::build)
        .transpose()?;
    if let Some(tree) = &tree {
        if !tree.orphans().is_empty() {
            warn!(
                "{} categories declare an unknown parent and were treated as roots",
                tree.orphans().len()
            );
        }
    }

    // ── Step 4: Aggregate ─────────────────────────────────────────────────────
    let observations = &expansion.observations;

    let overall = Aggregator::aggregate(observations);
    let components = sorted_groups(Aggregator::by_category(observations));
    let manufacturers = sorted_groups(Aggregator::by_manufacturer(observations));

    let mut hierarchy = tree
        .as_ref()
        .map(|t| Aggregator::rolled_up(observations, t))
        .unwrap_or_default();
    hierarchy.sort_by(|a, b| {
        b.stats
            .count
            .cmp(&a.stats.count)
            .then_with(|| a.category.cmp(&b.category))
    });

    let category_series = Aggregator::category_series(observations);
    let manufacturer_series = Aggregator::manufacturer_series(observations);
    let monthly_summary: Vec<MonthSummary> = Aggregator::by_month(observations)
        .into_iter()
        .map(|(month, stats)| MonthSummary { month, stats })
        .collect();

    let trend = Aggregator::overall_trend(&category_series);
    let trend_summary = TrendSummary::from_points(&trend);

    // ── Step 5: Rank ──────────────────────────────────────────────────────────
    let ranked_components = rank_series(&category_series, options.min_data_points);
    let ranked_manufacturers = rank_series(&manufacturer_series, options.min_data_points);
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();

    info!(
        "{} component types and {} manufacturers meet the {}-point threshold",
        ranked_components.len(),
        ranked_manufacturers.len(),
        options.min_data_points
    );

    // ── Step 6: Build result ──────────────────────────────────────────────────
    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        rows_skipped,
        records_read: expansion.records_read,
        records_expanded: expansion.records_expanded,
        records_rejected: expansion.records_rejected(),
        rejected_by_kind: expansion.rejected.clone(),
        manufacturers_normalized,
        observations: observations.len(),
        months: expansion.months.len(),
        first_month: expansion.months.first().copied(),
        last_month: expansion.months.last().copied(),
        categories_defined: tree.as_ref().map_or(0, CategoryTree::len),
        orphan_categories: tree
            .as_ref()
            .map(|t| t.orphans().to_vec())
            .unwrap_or_default(),
        normalizer_collisions: options.normalizer.collisions().to_vec(),
        min_data_points: options.min_data_points,
        expand_time_seconds: expand_time,
        aggregate_time_seconds: aggregate_time,
    };

    Ok(AnalysisResult {
        metadata,
        overall,
        components,
        hierarchy,
        manufacturers,
        category_series,
        manufacturer_series,
        monthly_summary,
        trend,
        trend_summary,
        ranked_components,
        ranked_manufacturers,
    })
}

/// Rewrite each record's manufacturer list in canonical form.
///
/// A list that is not valid JSON is left untouched so the expander rejects
/// the record with the right reason. Returns how many records changed.
pub fn normalize_manufacturers<N>(records: &mut [RawQuoteRecord], normalizer: &N) -> Result<usize>
where
    N: ManufacturerNormalizer + ?Sized,
{
    let mut changed = 0usize;
    for record in records.iter_mut() {
        let Ok(raw) = parse_list_field("manufacturer", &record.manufacturer) else {
            continue;
        };
        let canonical = normalize_list(normalizer, &raw);
        if canonical != raw {
            record.manufacturer = serde_json::to_string(&canonical)?;
            changed += 1;
        }
    }
    Ok(changed)
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Most observations first, then name ascending.
fn sorted_groups(groups: BTreeMap<String, AggregateStats>) -> Vec<GroupStats> {
    let mut out: Vec<GroupStats> = groups
        .into_iter()
        .map(|(name, stats)| GroupStats { name, stats })
        .collect();
    // Stable sort keeps the BTreeMap's name order within equal counts.
    out.sort_by(|a, b| b.stats.count.cmp(&a.stats.count));
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use leadtime_core::error::AnalyzerError;
    use leadtime_core::normalization::IdentityNormalizer;

    fn record(date: &str, lead: &str, components: &str, mfrs: &str, project: &str) -> RawQuoteRecord {
        RawQuoteRecord {
            id: format!("{date}/{lead}/{project}"),
            answer_date: date.to_string(),
            lead_time_weeks: lead.to_string(),
            component_types: components.to_string(),
            manufacturer: mfrs.to_string(),
            cost: "500".to_string(),
            component_count: "1".to_string(),
            project_name: project.to_string(),
            ..Default::default()
        }
    }

    fn options(min_data_points: usize) -> AnalysisOptions {
        AnalysisOptions {
            min_data_points,
            normalizer: Box::new(IdentityNormalizer),
        }
    }

    fn defs() -> Vec<CategoryDefinition> {
        vec![
            CategoryDefinition::new("HVAC", 1, "HVAC"),
            CategoryDefinition::new("Fan", 2, "HVAC > Fan"),
            CategoryDefinition::new("Damper", 2, "HVAC > Damper"),
        ]
    }

    // ── analyze ───────────────────────────────────────────────────────────────

    #[test]
    fn test_analyze_two_fan_quotes() {
        let input = AnalysisInput {
            records: vec![
                record("2024-01-15", "4", r#"["Fan"]"#, r#"["Greenheck"]"#, "A"),
                record("2024-01-20", "6", r#"["Fan"]"#, r#"["Greenheck"]"#, "B"),
            ],
            categories: None,
            ..Default::default()
        };
        let result = analyze(input, &options(1)).unwrap();

        assert_eq!(result.metadata.observations, 2);
        assert_eq!(result.metadata.months, 1);
        assert_eq!(result.components.len(), 1);
        let fan = &result.components[0];
        assert_eq!(fan.name, "Fan");
        assert_eq!(fan.stats.count, 2);
        assert_eq!(fan.stats.mean, 5.0);
        assert_eq!(fan.stats.median, 5.0);
        assert_eq!(fan.stats.min, 4.0);
        assert_eq!(fan.stats.max, 6.0);
        assert!(result.hierarchy.is_empty());
        assert!(result.trend_summary.is_none());
    }

    #[test]
    fn test_analyze_with_hierarchy_and_trend() {
        let input = AnalysisInput {
            records: vec![
                record("2024-01-10", "4", r#"["Fan"]"#, r#"["Greenheck"]"#, "A"),
                record("2024-01-11", "2", r#"["Damper"]"#, r#"["Ruskin"]"#, "A"),
                record("2024-03-02", "10", r#"["Fan", "Damper"]"#, r#"["Greenheck"]"#, "B"),
                record("bad date", "10", r#"["Fan"]"#, r#"["Greenheck"]"#, "C"),
            ],
            categories: Some(defs()),
            ..Default::default()
        };
        let result = analyze(input, &options(2)).unwrap();

        assert_eq!(result.metadata.records_read, 4);
        assert_eq!(result.metadata.records_rejected, 1);
        assert_eq!(result.metadata.rejected_by_kind.get("invalid_date"), Some(&1));
        assert_eq!(result.metadata.categories_defined, 3);

        let hvac = result.hierarchy.iter().find(|r| r.category == "HVAC").unwrap();
        assert_eq!(hvac.direct_count, 0);
        assert_eq!(hvac.descendant_count, 4);
        assert_eq!(result.hierarchy[0].category, "HVAC");

        // Jan: (4 + 2) / 2 = 3; Mar: 10.
        assert_eq!(result.trend.len(), 2);
        let summary = result.trend_summary.as_ref().unwrap();
        assert!((summary.change_weeks - 7.0).abs() < 1e-12);

        let ranked: Vec<&str> = result.ranked_components.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(ranked, vec!["Damper", "Fan"]);
        assert_eq!(result.ranked_manufacturers.len(), 1);
        assert_eq!(result.ranked_manufacturers[0].key, "Greenheck");
    }

    #[test]
    fn test_unreadable_rows_reach_metadata() {
        let input = AnalysisInput {
            records: vec![record("2024-01-15", "4", r#"["Fan"]"#, r#"["Greenheck"]"#, "A")],
            categories: None,
            rows_skipped: 3,
        };
        let result = analyze(input, &options(1)).unwrap();

        assert_eq!(result.metadata.rows_skipped, 3);
        assert_eq!(result.metadata.records_read, 1);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["metadata"]["rows_skipped"], 3);
    }

    #[test]
    fn test_analyze_cycle_aborts() {
        let input = AnalysisInput {
            records: vec![record("2024-01-10", "4", r#"["A"]"#, r#"["X"]"#, "P")],
            categories: Some(vec![
                CategoryDefinition::new("A", 1, "B > A"),
                CategoryDefinition::new("B", 1, "A > B"),
            ]),
            ..Default::default()
        };
        let err = analyze(input, &options(1)).unwrap_err();
        assert!(matches!(err, AnalyzerError::HierarchyCycle(_)));
    }

    #[test]
    fn test_analyze_empty_input() {
        let result = analyze(AnalysisInput::default(), &options(1)).unwrap();
        assert!(result.overall.is_none());
        assert!(result.components.is_empty());
        assert!(result.trend.is_empty());
        assert!(result.metadata.first_month.is_none());
    }

    #[test]
    fn test_analyze_result_serializes() {
        let input = AnalysisInput {
            records: vec![record("2024-01-15", "4", r#"["Fan"]"#, r#"["Greenheck"]"#, "A")],
            categories: Some(defs()),
            ..Default::default()
        };
        let result = analyze(input, &options(1)).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["components"][0]["name"], "Fan");
        assert_eq!(json["category_series"]["months"][0], "2024-01");
        assert!(json["category_series"]["groups"]["Fan"]["2024-01"]["mean"].is_number());
    }

    #[test]
    fn test_components_sorted_by_count_then_name() {
        let input = AnalysisInput {
            records: vec![
                record("2024-01-15", "4", r#"["Fan", "Coil"]"#, r#"["Trane"]"#, "A"),
                record("2024-01-16", "4", r#"["Pump"]"#, r#"["Trane", "Bell"]"#, "A"),
            ],
            categories: None,
            ..Default::default()
        };
        let result = analyze(input, &options(1)).unwrap();
        let names: Vec<&str> = result.components.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Pump", "Coil", "Fan"]);
    }

    // ── normalize_manufacturers ───────────────────────────────────────────────

    #[test]
    fn test_normalize_manufacturers_rewrites_lists() {
        let table = TableNormalizer::from_pairs([("greenheck fan corp", "Greenheck")]);
        let mut records = vec![
            record("2024-01-15", "4", r#"["Fan"]"#, r#"["Greenheck Fan Corp", "none"]"#, "A"),
            record("2024-01-15", "4", r#"["Fan"]"#, r#"["Greenheck"]"#, "A"),
            record("2024-01-15", "4", r#"["Fan"]"#, "not json", "A"),
        ];
        let changed = normalize_manufacturers(&mut records, &table).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(records[0].manufacturer, r#"["Greenheck"]"#);
        assert_eq!(records[1].manufacturer, r#"["Greenheck"]"#);
        assert_eq!(records[2].manufacturer, "not json");
    }

    #[test]
    fn test_placeholder_only_manufacturers_reject_record() {
        let input = AnalysisInput {
            records: vec![record("2024-01-15", "4", r#"["Fan"]"#, r#"["N/A", ""]"#, "A")],
            categories: None,
            ..Default::default()
        };
        let result = analyze(input, &options(1)).unwrap();
        assert_eq!(result.metadata.observations, 0);
        assert_eq!(
            result.metadata.rejected_by_kind.get("no_manufacturers"),
            Some(&1)
        );
    }
}
