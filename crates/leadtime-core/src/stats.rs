//! Descriptive statistics over lead-time samples.
//!
//! Every helper returns `None` for an empty sample. Zero is a legitimate
//! lead time, so "no data" must never collapse into `0.0`.

// ── Central tendency ──────────────────────────────────────────────────────────

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of an ascending-**sorted** slice.
///
/// Even-length samples average the two central elements; odd-length
/// samples return the single central element.
pub fn median(sorted: &[f64]) -> Option<f64> {
    let len = sorted.len();
    if len == 0 {
        return None;
    }
    let mid = len / 2;
    if len % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sort a copy of `values` ascending. NaN is not expected here; the
/// expander drops non-finite lead times, and `total_cmp` keeps the order
/// total regardless.
pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

// ── Spread ────────────────────────────────────────────────────────────────────

/// Population standard deviation (divides by N, not N − 1).
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

// ── Weighted combination ──────────────────────────────────────────────────────

/// `Σ(value × weight) / Σ(weight)` over `(value, weight)` pairs.
///
/// Pairs with a zero weight contribute nothing; returns `None` when the
/// total weight is zero.
pub fn weighted_mean<I>(pairs: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (sum, weight) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(s, w), (value, weight)| {
            (s + value * weight, w + weight)
        });
    if weight > 0.0 {
        Some(sum / weight)
    } else {
        None
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
