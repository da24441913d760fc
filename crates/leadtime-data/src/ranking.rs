//! Data-sufficiency filtering and deterministic ordering of groups.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::aggregator::MonthlySeries;

/// A key that passed the minimum-count filter, with its total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranked<K> {
    pub key: K,
    pub count: usize,
}

/// Keys with at least `min_count` observations, highest count first.
///
/// Equal counts are ordered by key ascending, so identical input always
/// yields identical output.
pub fn rank<K, I>(totals: I, min_count: usize) -> Vec<K>
where
    K: Ord,
    I: IntoIterator<Item = (K, usize)>,
{
    rank_counts(totals, min_count)
        .into_iter()
        .map(|r| r.key)
        .collect()
}

/// [`rank`], keeping each key's total.
pub fn rank_counts<K, I>(totals: I, min_count: usize) -> Vec<Ranked<K>>
where
    K: Ord,
    I: IntoIterator<Item = (K, usize)>,
{
    let mut ranked: Vec<Ranked<K>> = totals
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .map(|(key, count)| Ranked { key, count })
        .collect();
    ranked.sort_by(|a, b| (Reverse(a.count), &a.key).cmp(&(Reverse(b.count), &b.key)));
    ranked
}

/// Total observations per key across every month of `series`.
pub fn totals_from_series<K: Ord + Clone>(series: &MonthlySeries<K>) -> BTreeMap<K, usize> {
    series
        .keys()
        .map(|k| (k.clone(), series.total_count(k)))
        .collect()
}

/// Rank the groups of a monthly series by their all-period totals.
pub fn rank_series<K: Ord + Clone>(series: &MonthlySeries<K>, min_count: usize) -> Vec<Ranked<K>> {
    rank_counts(totals_from_series(series), min_count)
}

/// The first `n` entries (fewer if the list is shorter).
pub fn top_n<T>(ranked: &[T], n: usize) -> &[T] {
    &ranked[..ranked.len().min(n)]
}

// ── Tests ─────────────────────────────────────────────────────────────────────
