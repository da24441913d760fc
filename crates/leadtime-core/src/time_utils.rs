use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::MonthKey;

// ── Month-key parsing ─────────────────────────────────────────────────────────

/// Date-time layouts seen in quote exports, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%b %d, %Y", "%B %d, %Y"];

/// Derive the `YYYY-MM` month of an answer-date string.
///
/// The month is taken from the calendar date as written: an RFC 3339
/// timestamp keeps its own offset rather than being shifted to UTC, and
/// naive timestamps are taken at face value. Invalid calendar dates such as
/// `2024-02-30` are rejected. A bare `YYYY-MM` is accepted as-is.
///
/// Returns `None` for anything unparseable.
pub fn month_key_from_date(raw: &str) -> Option<MonthKey> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let normalised = match s.strip_suffix('Z') {
        Some(stripped) => format!("{}+00:00", stripped),
        None => s.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
        let local = dt.naive_local();
        return MonthKey::new(local.year(), local.month());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return MonthKey::new(naive.year(), naive.month());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return MonthKey::new(date.year(), date.month());
        }
    }

    if let Ok(key) = s.parse::<MonthKey>() {
        return Some(key);
    }

    debug!("could not derive a month from answer date \"{}\"", s);
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
