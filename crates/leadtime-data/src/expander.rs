//! Fan-out of quote records into atomic observations.
//!
//! A quote can cover several component types sourced from several
//! manufacturers at once. Each (component type, manufacturer) pair becomes
//! its own equally weighted [`Observation`] carrying the quote's lead time,
//! month, cost and passthrough fields.

use std::collections::{BTreeMap, BTreeSet};

use leadtime_core::error::RecordParseError;
use leadtime_core::models::{MonthKey, Observation, RawQuoteRecord};
use leadtime_core::time_utils::month_key_from_date;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

// ── Expansion ─────────────────────────────────────────────────────────────────

/// Everything produced by expanding a batch of records.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Expansion {
    pub observations: Vec<Observation>,
    /// Every month that received at least one observation.
    pub months: BTreeSet<MonthKey>,
    pub records_read: usize,
    /// Records that produced at least one observation.
    pub records_expanded: usize,
    /// Rejected record counts keyed by [`RecordParseError::kind`].
    pub rejected: BTreeMap<&'static str, usize>,
}

impl Expansion {
    pub fn records_rejected(&self) -> usize {
        self.rejected.values().sum()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Expand one record into `component_types × manufacturers` observations.
///
/// Fails (and therefore contributes nothing) when the answer date has no
/// calendar month, the lead time is not a finite non-negative number, a
/// list field is not a JSON array, or either list is empty.
pub fn expand_record(record: &RawQuoteRecord) -> Result<Vec<Observation>, RecordParseError> {
    let month = month_key_from_date(&record.answer_date)
        .ok_or_else(|| RecordParseError::InvalidDate(record.answer_date.clone()))?;

    let lead_time = parse_lead_time(&record.lead_time_weeks)?;

    let component_types = parse_list_field("component_types", &record.component_types)?;
    if component_types.is_empty() {
        return Err(RecordParseError::NoComponentTypes);
    }
    let manufacturers = parse_list_field("manufacturer", &record.manufacturer)?;
    if manufacturers.is_empty() {
        return Err(RecordParseError::NoManufacturers);
    }

    let cost = record.parsed_cost();
    let component_count = record.parsed_component_count();

    let mut out = Vec::with_capacity(component_types.len() * manufacturers.len());
    for category in &component_types {
        for manufacturer in &manufacturers {
            out.push(Observation {
                month,
                category: category.clone(),
                manufacturer: manufacturer.clone(),
                lead_time_weeks: lead_time,
                cost,
                component_count,
                project_name: record.project_name.trim().to_string(),
                buyer_name: record.buyer_name.trim().to_string(),
                seller_name: record.seller_name.trim().to_string(),
                source_record_id: record.id.clone(),
            });
        }
    }
    Ok(out)
}

/// Expand every record, isolating failures to the record that caused them.
pub fn expand_records<'a, I>(records: I) -> Expansion
where
    I: IntoIterator<Item = &'a RawQuoteRecord>,
{
    let mut expansion = Expansion::default();

    for record in records {
        expansion.records_read += 1;
        match expand_record(record) {
            Ok(observations) => {
                expansion.records_expanded += 1;
                expansion
                    .months
                    .extend(observations.iter().map(|o| o.month));
                expansion.observations.extend(observations);
            }
            Err(e) => {
                debug!("record {} skipped: {}", record.id, e);
                *expansion.rejected.entry(e.kind()).or_insert(0) += 1;
            }
        }
    }

    debug!(
        "expanded {} of {} records into {} observations across {} months",
        expansion.records_expanded,
        expansion.records_read,
        expansion.observations.len(),
        expansion.months.len()
    );

    expansion
}

/// Parse a JSON-array list field into trimmed, non-empty names in order.
/// Repeated entries are kept.
///
/// Empty text counts as an empty list. Non-string scalars are kept as their
/// JSON text; `null` elements are dropped.
pub fn parse_list_field(field: &'static str, raw: &str) -> Result<Vec<String>, RecordParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| RecordParseError::MalformedList {
            field,
            reason: e.to_string(),
        })?;
    let Value::Array(items) = value else {
        return Err(RecordParseError::MalformedList {
            field,
            reason: "expected a JSON array".to_string(),
        });
    };

    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let name = match item {
            Value::Null => continue,
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        if !name.is_empty() {
            names.push(name);
        }
    }
    Ok(names)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn parse_lead_time(raw: &str) -> Result<f64, RecordParseError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| RecordParseError::InvalidLeadTime(raw.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
