//! Lead-time statistics over observation subsets.
//!
//! [`Aggregator`] is stateless: every function takes the observation slice it
//! summarizes and returns freshly derived stats, so results can always be
//! recomputed from observations alone. "No data" is `None` (or
//! [`AnalyzerError::EmptyAggregation`]), never a zero-filled statistic.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use leadtime_core::error::{AnalyzerError, Result};
use leadtime_core::formatting::round_to_tenth;
use leadtime_core::models::{MonthKey, Observation};
use leadtime_core::stats;
use serde::Serialize;

use crate::hierarchy::{CategoryNode, CategoryTree};

// ── AggregateStats ────────────────────────────────────────────────────────────

/// Summary of a non-empty set of observations.
///
/// All figures are unrounded; use the `rounded_*` accessors at the
/// presentation boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub total_cost: f64,
    pub total_components: u64,
    /// Unique non-blank project names.
    pub distinct_projects: usize,
    pub distinct_categories: usize,
    pub distinct_manufacturers: usize,
}

impl AggregateStats {
    pub fn rounded_mean(&self) -> f64 {
        round_to_tenth(self.mean)
    }

    pub fn rounded_median(&self) -> f64 {
        round_to_tenth(self.median)
    }

    pub fn rounded_std_dev(&self) -> f64 {
        round_to_tenth(self.std_dev)
    }
}

// ── RollupStats ───────────────────────────────────────────────────────────────

/// Stats for a category together with all of its descendants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollupStats {
    pub category: String,
    pub level: u32,
    pub tree_path: String,
    /// Observations tagged with the category itself.
    pub direct_count: usize,
    /// Observations tagged with any descendant.
    pub descendant_count: usize,
    pub stats: AggregateStats,
}

// ── MonthlySeries ─────────────────────────────────────────────────────────────

/// Per-group stats for every month on a shared month axis.
///
/// A group with no observations in a month simply has no entry for it;
/// [`mean_series`](Self::mean_series) renders that gap as `None`.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlySeries<K: Ord> {
    /// Every month present in the source observations, oldest first.
    pub months: Vec<MonthKey>,
    pub groups: BTreeMap<K, BTreeMap<MonthKey, AggregateStats>>,
}

impl<K: Ord> MonthlySeries<K> {
    pub fn get(&self, key: &K, month: MonthKey) -> Option<&AggregateStats> {
        self.groups.get(key)?.get(&month)
    }

    /// Mean lead time per month on the full axis, `None` where the group
    /// has no data.
    pub fn mean_series(&self, key: &K) -> Vec<Option<f64>> {
        let by_month = self.groups.get(key);
        self.months
            .iter()
            .map(|m| by_month.and_then(|g| g.get(m)).map(|s| s.mean))
            .collect()
    }

    /// Observation count per month on the full axis (0 where no data).
    pub fn count_series(&self, key: &K) -> Vec<usize> {
        let by_month = self.groups.get(key);
        self.months
            .iter()
            .map(|m| by_month.and_then(|g| g.get(m)).map_or(0, |s| s.count))
            .collect()
    }

    /// Total observations for `key` across all months.
    pub fn total_count(&self, key: &K) -> usize {
        self.groups
            .get(key)
            .map_or(0, |g| g.values().map(|s| s.count).sum())
    }

    pub fn months_with_data(&self, key: &K) -> usize {
        self.groups.get(key).map_or(0, BTreeMap::len)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.groups.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ── Trend ─────────────────────────────────────────────────────────────────────

/// Weighted mean lead time across every group for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: MonthKey,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Increasing => "Increasing",
            Self::Decreasing => "Decreasing",
            Self::Flat => "Flat",
        };
        f.write_str(label)
    }
}

/// First month with data compared against the last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub first: TrendPoint,
    pub last: TrendPoint,
    /// `last.mean - first.mean`, unrounded.
    pub change_weeks: f64,
    pub direction: TrendDirection,
}

impl TrendSummary {
    /// Needs at least two points; a change that rounds to `0.0` is
    /// [`TrendDirection::Flat`].
    pub fn from_points(points: &[TrendPoint]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let first = points.first()?.clone();
        let last = points.last()?.clone();
        let change_weeks = last.mean - first.mean;
        let direction = if round_to_tenth(change_weeks) == 0.0 {
            TrendDirection::Flat
        } else if change_weeks > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        Some(Self {
            first,
            last,
            change_weeks,
            direction,
        })
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Stateless helper that summarizes and groups observations.
pub struct Aggregator;

impl Aggregator {
    /// Summarize `observations`; `None` when there are none.
    pub fn aggregate<'a, I>(observations: I) -> Option<AggregateStats>
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut lead_times: Vec<f64> = Vec::new();
        let mut total_cost = 0.0;
        let mut total_components: u64 = 0;
        let mut projects: HashSet<&str> = HashSet::new();
        let mut categories: HashSet<&str> = HashSet::new();
        let mut manufacturers: HashSet<&str> = HashSet::new();

        for obs in observations {
            lead_times.push(obs.lead_time_weeks);
            total_cost += obs.cost;
            total_components += u64::from(obs.component_count);
            if !obs.project_name.is_empty() {
                projects.insert(&obs.project_name);
            }
            categories.insert(&obs.category);
            manufacturers.insert(&obs.manufacturer);
        }

        let sorted = stats::sorted_copy(&lead_times);
        Some(AggregateStats {
            count: sorted.len(),
            mean: stats::mean(&sorted)?,
            median: stats::median(&sorted)?,
            min: *sorted.first()?,
            max: *sorted.last()?,
            std_dev: stats::population_std_dev(&sorted)?,
            total_cost,
            total_components,
            distinct_projects: projects.len(),
            distinct_categories: categories.len(),
            distinct_manufacturers: manufacturers.len(),
        })
    }

    /// Like [`aggregate`](Self::aggregate), but an empty input is an
    /// [`AnalyzerError::EmptyAggregation`] naming `scope`.
    pub fn try_aggregate<'a, I>(observations: I, scope: &str) -> Result<AggregateStats>
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        Self::aggregate(observations).ok_or_else(|| AnalyzerError::EmptyAggregation {
            scope: scope.to_string(),
        })
    }

    /// Group by `key_fn` and aggregate each group independently.
    ///
    /// Only keys that occur are present, so every value is backed by data.
    pub fn aggregate_by<K, F>(observations: &[Observation], key_fn: F) -> BTreeMap<K, AggregateStats>
    where
        K: Ord,
        F: Fn(&Observation) -> K,
    {
        let mut groups: BTreeMap<K, Vec<&Observation>> = BTreeMap::new();
        for obs in observations {
            groups.entry(key_fn(obs)).or_default().push(obs);
        }
        groups
            .into_iter()
            .filter_map(|(key, group)| Some((key, Self::aggregate(group)?)))
            .collect()
    }

    /// Direct-only stats per category.
    pub fn by_category(observations: &[Observation]) -> BTreeMap<String, AggregateStats> {
        Self::aggregate_by(observations, |o| o.category.clone())
    }

    pub fn by_manufacturer(observations: &[Observation]) -> BTreeMap<String, AggregateStats> {
        Self::aggregate_by(observations, |o| o.manufacturer.clone())
    }

    pub fn by_category_manufacturer(
        observations: &[Observation],
    ) -> BTreeMap<(String, String), AggregateStats> {
        Self::aggregate_by(observations, |o| (o.category.clone(), o.manufacturer.clone()))
    }

    /// All groups combined, one entry per month.
    pub fn by_month(observations: &[Observation]) -> BTreeMap<MonthKey, AggregateStats> {
        Self::aggregate_by(observations, |o| o.month)
    }

    // ── Monthly series ────────────────────────────────────────────────────────

    /// Group by `key_fn` and month. The month axis is every month that
    /// appears anywhere in `observations`.
    pub fn monthly_series<K, F>(observations: &[Observation], key_fn: F) -> MonthlySeries<K>
    where
        K: Ord,
        F: Fn(&Observation) -> K,
    {
        let months: BTreeSet<MonthKey> = observations.iter().map(|o| o.month).collect();
        let mut groups: BTreeMap<K, BTreeMap<MonthKey, AggregateStats>> = BTreeMap::new();
        for ((key, month), stats) in Self::aggregate_by(observations, |o| (key_fn(o), o.month)) {
            groups.entry(key).or_default().insert(month, stats);
        }
        MonthlySeries {
            months: months.into_iter().collect(),
            groups,
        }
    }

    pub fn category_series(observations: &[Observation]) -> MonthlySeries<String> {
        Self::monthly_series(observations, |o| o.category.clone())
    }

    pub fn manufacturer_series(observations: &[Observation]) -> MonthlySeries<String> {
        Self::monthly_series(observations, |o| o.manufacturer.clone())
    }

    /// Overall mean per month, combined from the per-group monthly stats as
    /// `Σ(mean_i × count_i) / Σ(count_i)`.
    ///
    /// When every observation falls in exactly one group (as with a
    /// per-category series), this equals the mean of the raw observations
    /// for that month.
    pub fn overall_trend<K: Ord>(series: &MonthlySeries<K>) -> Vec<TrendPoint> {
        series
            .months
            .iter()
            .filter_map(|&month| {
                let cells: Vec<&AggregateStats> =
                    series.groups.values().filter_map(|g| g.get(&month)).collect();
                let mean =
                    stats::weighted_mean(cells.iter().map(|s| (s.mean, s.count as f64)))?;
                Some(TrendPoint {
                    month,
                    mean,
                    count: cells.iter().map(|s| s.count).sum(),
                })
            })
            .collect()
    }

    // ── Rollups ───────────────────────────────────────────────────────────────

    /// Rolled-up stats for every tree node that has data, in definition
    /// order. Observations whose category is not in the tree are ignored.
    pub fn rolled_up(observations: &[Observation], tree: &CategoryTree) -> Vec<RollupStats> {
        let index = index_by_category(observations);
        tree.nodes()
            .filter_map(|node| rollup_from_index(&index, tree, node))
            .collect()
    }

    /// Rolled-up stats for a single category.
    pub fn rollup_for(
        observations: &[Observation],
        tree: &CategoryTree,
        name: &str,
    ) -> Result<RollupStats> {
        let empty = || AnalyzerError::EmptyAggregation {
            scope: format!("category {name:?}"),
        };
        let node = tree.node(name).ok_or_else(empty)?;
        rollup_from_index(&index_by_category(observations), tree, node).ok_or_else(empty)
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn index_by_category(observations: &[Observation]) -> HashMap<&str, Vec<&Observation>> {
    let mut index: HashMap<&str, Vec<&Observation>> = HashMap::new();
    for obs in observations {
        index.entry(obs.category.as_str()).or_default().push(obs);
    }
    index
}

fn rollup_from_index(
    index: &HashMap<&str, Vec<&Observation>>,
    tree: &CategoryTree,
    node: &CategoryNode,
) -> Option<RollupStats> {
    let direct: &[&Observation] = index
        .get(node.name.as_str())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let below: Vec<&Observation> = tree
        .descendants(&node.name)
        .into_iter()
        .filter_map(|d| index.get(d))
        .flatten()
        .copied()
        .collect();

    let stats = Aggregator::aggregate(direct.iter().chain(below.iter()).copied())?;
    Some(RollupStats {
        category: node.name.clone(),
        level: node.level,
        tree_path: node.tree_path_string(),
        direct_count: direct.len(),
        descendant_count: below.len(),
        stats,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use leadtime_core::models::CategoryDefinition;

    fn obs(month: &str, category: &str, manufacturer: &str, lead: f64) -> Observation {
        Observation {
            month: month.parse().unwrap(),
            category: category.to_string(),
            manufacturer: manufacturer.to_string(),
            lead_time_weeks: lead,
            cost: 100.0,
            component_count: 1,
            project_name: format!("P-{category}"),
            buyer_name: String::new(),
            seller_name: String::new(),
            source_record_id: format!("{month}/{category}/{manufacturer}/{lead}"),
        }
    }

    fn month(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn tree() -> CategoryTree {
        CategoryTree::build(&[
            CategoryDefinition::new("HVAC", 1, "HVAC"),
            CategoryDefinition::new("Fan", 2, "HVAC > Fan"),
            CategoryDefinition::new("Inline Fan", 3, "HVAC > Fan > Inline Fan"),
            CategoryDefinition::new("Chiller", 2, "HVAC > Chiller"),
        ])
        .unwrap()
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_empty_is_none() {
        assert!(Aggregator::aggregate(std::iter::empty()).is_none());
    }

    #[test]
    fn test_try_aggregate_empty_is_error() {
        let err = Aggregator::try_aggregate(std::iter::empty(), "month 2024-01").unwrap_err();
        assert!(matches!(err, AnalyzerError::EmptyAggregation { .. }));
        assert!(err.to_string().contains("2024-01"));
    }

    #[test]
    fn test_aggregate_two_fan_quotes() {
        let data = vec![
            obs("2024-01", "Fan", "Greenheck", 4.0),
            obs("2024-01", "Fan", "Greenheck", 6.0),
        ];
        let s = Aggregator::aggregate(&data).unwrap();
        assert_eq!(s.count, 2);
        assert_eq!(s.mean, 5.0);
        assert_eq!(s.median, 5.0);
        assert_eq!(s.min, 4.0);
        assert_eq!(s.max, 6.0);
        assert_eq!(s.std_dev, 1.0);
        assert_eq!(s.total_cost, 200.0);
        assert_eq!(s.distinct_projects, 1);
    }

    #[test]
    fn test_aggregate_median_even_and_odd() {
        let even: Vec<Observation> = [8.0, 2.0, 6.0, 4.0]
            .iter()
            .map(|&v| obs("2024-01", "Fan", "A", v))
            .collect();
        assert_eq!(Aggregator::aggregate(&even).unwrap().median, 5.0);

        let odd: Vec<Observation> = [6.0, 2.0, 4.0]
            .iter()
            .map(|&v| obs("2024-01", "Fan", "A", v))
            .collect();
        assert_eq!(Aggregator::aggregate(&odd).unwrap().median, 4.0);
    }

    #[test]
    fn test_aggregate_zero_lead_time_is_data() {
        let data = vec![obs("2024-01", "Fan", "A", 0.0)];
        let s = Aggregator::aggregate(&data).unwrap();
        assert_eq!(s.count, 1);
        assert_eq!(s.mean, 0.0);
    }

    #[test]
    fn test_rounded_accessors_round_only_for_presentation() {
        let data = vec![
            obs("2024-01", "Fan", "A", 1.0),
            obs("2024-01", "Fan", "A", 1.0),
            obs("2024-01", "Fan", "A", 2.0),
        ];
        let s = Aggregator::aggregate(&data).unwrap();
        assert!((s.mean - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(s.rounded_mean(), 1.3);
        assert_eq!(s.rounded_median(), 1.0);
    }

    #[test]
    fn test_aggregate_distinct_counts() {
        let data = vec![
            obs("2024-01", "Fan", "Greenheck", 4.0),
            obs("2024-01", "Fan", "Loren Cook", 4.0),
            obs("2024-01", "Damper", "Greenheck", 4.0),
        ];
        let s = Aggregator::aggregate(&data).unwrap();
        assert_eq!(s.distinct_categories, 2);
        assert_eq!(s.distinct_manufacturers, 2);
        assert_eq!(s.distinct_projects, 2);
        assert_eq!(s.total_components, 3);
    }

    // ── grouping ──────────────────────────────────────────────────────────────

    #[test]
    fn test_by_category_and_manufacturer() {
        let data = vec![
            obs("2024-01", "Fan", "Greenheck", 4.0),
            obs("2024-01", "Fan", "Loren Cook", 8.0),
            obs("2024-02", "Damper", "Greenheck", 2.0),
        ];
        let by_cat = Aggregator::by_category(&data);
        assert_eq!(by_cat.len(), 2);
        assert_eq!(by_cat["Fan"].mean, 6.0);
        assert_eq!(by_cat["Damper"].count, 1);

        let by_mfr = Aggregator::by_manufacturer(&data);
        assert_eq!(by_mfr["Greenheck"].mean, 3.0);
        assert_eq!(by_mfr["Loren Cook"].count, 1);

        let pairs = Aggregator::by_category_manufacturer(&data);
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[&("Fan".to_string(), "Loren Cook".to_string())].mean, 8.0);
    }

    #[test]
    fn test_by_month_sorted_chronologically() {
        let data = vec![
            obs("2024-02", "Fan", "A", 2.0),
            obs("2023-12", "Fan", "A", 4.0),
            obs("2024-01", "Fan", "A", 6.0),
        ];
        let keys: Vec<String> = Aggregator::by_month(&data)
            .keys()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(keys, vec!["2023-12", "2024-01", "2024-02"]);
    }

    // ── monthly series ────────────────────────────────────────────────────────

    #[test]
    fn test_series_gap_month_is_none_not_zero() {
        let data = vec![
            obs("2024-01", "Fan", "A", 4.0),
            obs("2024-02", "Chiller", "A", 20.0),
            obs("2024-03", "Fan", "A", 6.0),
        ];
        let series = Aggregator::category_series(&data);
        assert_eq!(series.months.len(), 3);
        assert_eq!(
            series.mean_series(&"Fan".to_string()),
            vec![Some(4.0), None, Some(6.0)]
        );
        assert_eq!(series.count_series(&"Fan".to_string()), vec![1, 0, 1]);
        assert!(series.get(&"Fan".to_string(), month("2024-02")).is_none());
        assert_eq!(series.total_count(&"Fan".to_string()), 2);
        assert_eq!(series.months_with_data(&"Chiller".to_string()), 1);
    }

    #[test]
    fn test_series_unknown_key_is_all_none() {
        let data = vec![obs("2024-01", "Fan", "A", 4.0)];
        let series = Aggregator::manufacturer_series(&data);
        assert_eq!(series.mean_series(&"Nobody".to_string()), vec![None]);
        assert_eq!(series.total_count(&"Nobody".to_string()), 0);
    }

    // ── overall trend ─────────────────────────────────────────────────────────

    #[test]
    fn test_overall_trend_is_count_weighted() {
        // Fan: 3 quotes averaging 4; Chiller: 1 quote of 20 → (12 + 20) / 4 = 8.
        let data = vec![
            obs("2024-01", "Fan", "A", 3.0),
            obs("2024-01", "Fan", "A", 4.0),
            obs("2024-01", "Fan", "A", 5.0),
            obs("2024-01", "Chiller", "B", 20.0),
        ];
        let trend = Aggregator::overall_trend(&Aggregator::category_series(&data));
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0].count, 4);
        assert!((trend[0].mean - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_overall_trend_matches_raw_month_mean() {
        let data = vec![
            obs("2024-01", "Fan", "A", 3.3),
            obs("2024-01", "Damper", "A", 7.1),
            obs("2024-01", "Damper", "B", 9.9),
            obs("2024-02", "Fan", "A", 12.0),
            obs("2024-02", "Chiller", "C", 30.5),
        ];
        let trend = Aggregator::overall_trend(&Aggregator::category_series(&data));
        let direct = Aggregator::by_month(&data);
        for point in &trend {
            assert!((point.mean - direct[&point.month].mean).abs() < 1e-9);
            assert_eq!(point.count, direct[&point.month].count);
        }
    }

    #[test]
    fn test_trend_summary_directions() {
        let point = |m: &str, mean: f64| TrendPoint {
            month: month(m),
            mean,
            count: 1,
        };
        let up = TrendSummary::from_points(&[point("2024-01", 4.0), point("2024-03", 6.5)]).unwrap();
        assert_eq!(up.direction, TrendDirection::Increasing);
        assert!((up.change_weeks - 2.5).abs() < 1e-12);

        let down = TrendSummary::from_points(&[point("2024-01", 6.0), point("2024-02", 4.0)]).unwrap();
        assert_eq!(down.direction, TrendDirection::Decreasing);

        let flat = TrendSummary::from_points(&[point("2024-01", 6.0), point("2024-02", 6.02)]).unwrap();
        assert_eq!(flat.direction, TrendDirection::Flat);

        assert!(TrendSummary::from_points(&[point("2024-01", 6.0)]).is_none());
    }

    // ── rollups ───────────────────────────────────────────────────────────────

    #[test]
    fn test_rollup_includes_descendants() {
        let data = vec![
            obs("2024-01", "Fan", "A", 4.0),
            obs("2024-01", "Inline Fan", "A", 8.0),
            obs("2024-01", "Inline Fan", "B", 12.0),
            obs("2024-01", "Chiller", "C", 20.0),
        ];
        let tree = tree();
        let fan = Aggregator::rollup_for(&data, &tree, "Fan").unwrap();
        assert_eq!(fan.direct_count, 1);
        assert_eq!(fan.descendant_count, 2);
        assert_eq!(fan.stats.count, 3);
        assert_eq!(fan.stats.mean, 8.0);
        assert_eq!(fan.tree_path, "HVAC > Fan");

        let hvac = Aggregator::rollup_for(&data, &tree, "HVAC").unwrap();
        assert_eq!(hvac.direct_count, 0);
        assert_eq!(hvac.descendant_count, 4);
    }

    #[test]
    fn test_rolled_up_skips_nodes_without_data() {
        let data = vec![obs("2024-01", "Chiller", "C", 20.0)];
        let rollups = Aggregator::rolled_up(&data, &tree());
        let names: Vec<&str> = rollups.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names, vec!["HVAC", "Chiller"]);
    }

    #[test]
    fn test_rolled_up_ignores_categories_outside_tree() {
        let data = vec![
            obs("2024-01", "Fan", "A", 4.0),
            obs("2024-01", "Pump", "B", 9.0),
        ];
        let rollups = Aggregator::rolled_up(&data, &tree());
        assert!(rollups.iter().all(|r| r.category != "Pump"));
        let hvac = rollups.iter().find(|r| r.category == "HVAC").unwrap();
        assert_eq!(hvac.stats.count, 1);
    }

    #[test]
    fn test_rollup_for_unknown_or_empty_is_error() {
        let data = vec![obs("2024-01", "Fan", "A", 4.0)];
        let tree = tree();
        assert!(matches!(
            Aggregator::rollup_for(&data, &tree, "Chiller"),
            Err(AnalyzerError::EmptyAggregation { .. })
        ));
        assert!(Aggregator::rollup_for(&data, &tree, "Boiler").is_err());
    }
}
