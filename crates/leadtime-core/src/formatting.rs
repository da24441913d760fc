use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Round a lead-time figure to one decimal place for presentation.
///
/// This is the only place figures are rounded; statistics are always
/// computed on unrounded values first.
///
/// # Examples
///
/// ```
/// use leadtime_core::formatting::round_to_tenth;
///
/// assert_eq!(round_to_tenth(5.04), 5.0);
/// assert_eq!(round_to_tenth(5.05), 5.1);
/// assert_eq!(round_to_tenth(12.0), 12.0);
/// ```
pub fn round_to_tenth(value: f64) -> f64 {
    // Nudge by a relative epsilon so binary midpoints like 5.05 round up.
    let scaled = value * 10.0;
    let epsilon = f64::EPSILON * scaled.abs();
    (scaled + epsilon.copysign(scaled)).round() / 10.0
}

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use leadtime_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Add a tiny epsilon (half ULP at the target precision) before rounding
    // to avoid IEEE 754 binary-representation issues at exact midpoints.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        // `frac_str` starts with "0.", e.g. "0.50". Strip the leading "0".
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a quoted cost as a USD string with two decimal places and
/// thousands separators.
///
/// # Examples
///
/// ```
/// use leadtime_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56),  "$1,234.56");
/// assert_eq!(format_currency(0.0),      "$0.00");
/// ```
pub fn format_currency(amount: f64) -> String {
    if amount < 0.0 {
        format!("$-{}", format_number(amount.abs(), 2))
    } else {
        format!("${}", format_number(amount, 2))
    }
}

/// Render a lead time in weeks as `"5.0w"`; `None` renders as `"-"`.
pub fn format_weeks(weeks: Option<f64>) -> String {
    match weeks {
        Some(w) => format!("{:.1}w", round_to_tenth(w)),
        None => "-".to_string(),
    }
}

/// Shorten `label` to at most `max_width` display columns, ellipsis
/// included, ending in `...` when anything was cut.
pub fn truncate_label(label: &str, max_width: usize) -> String {
    const ELLIPSIS: &str = "...";
    if label.width() <= max_width {
        return label.to_string();
    }
    let budget = max_width.saturating_sub(ELLIPSIS.len());
    let mut out = String::new();
    let mut used = 0;
    for c in label.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push_str(ELLIPSIS);
    out
}

/// Left-align `text` in a column `width` display columns wide.
pub fn pad_right(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{}{}", text, " ".repeat(fill))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let remainder = s.len() % 3;
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
