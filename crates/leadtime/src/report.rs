//! Console rendering of an [`AnalysisResult`] and JSON export.
//!
//! Every figure is rounded here, at the presentation boundary, via the
//! formatting helpers in `leadtime_core::formatting`.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use leadtime_core::formatting::{format_currency, format_weeks, pad_right, truncate_label};
use leadtime_data::aggregator::{AggregateStats, MonthlySeries};
use leadtime_data::analysis::{AnalysisResult, GroupStats};
use leadtime_data::ranking::{top_n, Ranked};

const RULE_WIDTH: usize = 80;
const NAME_WIDTH: usize = 40;

// ── Public API ────────────────────────────────────────────────────────────────

/// Render the report for `view`, showing at most `top` rows per table.
pub fn render(view: &str, result: &AnalysisResult, top: usize) -> String {
    if result.overall.is_none() {
        return format!(
            "{}\nNo data: none of {} quote records produced an observation.\n",
            banner("LEAD TIME ANALYSIS"),
            result.metadata.records_read
        );
    }
    match view {
        "components" => render_components(result, top),
        "hierarchy" => render_hierarchy(result, top),
        "manufacturers" => render_manufacturers(result, top),
        "trend" => render_trend(result),
        _ => render_summary(result, top),
    }
}

/// Write the full result as pretty-printed JSON, creating parent
/// directories as needed.
pub fn write_json(path: &Path, result: &AnalysisResult) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

// ── Views ─────────────────────────────────────────────────────────────────────

fn render_summary(result: &AnalysisResult, top: usize) -> String {
    let meta = &result.metadata;
    let mut out = banner("LEAD TIME ANALYSIS SUMMARY");

    let _ = writeln!(out, "\nTIME PERIOD ANALYSIS:");
    if let (Some(first), Some(last)) = (meta.first_month, meta.last_month) {
        let _ = writeln!(out, "• Date range: {first} to {last}");
    }
    let _ = writeln!(out, "• Total months with data: {}", meta.months);
    let _ = writeln!(
        out,
        "• Quote records: {} read, {} used, {} rejected, {} unreadable rows skipped",
        meta.records_read, meta.records_expanded, meta.records_rejected, meta.rows_skipped
    );
    let _ = writeln!(out, "• Observations: {}", meta.observations);
    if let Some(overall) = &result.overall {
        let _ = writeln!(
            out,
            "• Overall lead time: {} avg, {} median ({} to {})",
            format_weeks(Some(overall.mean)),
            format_weeks(Some(overall.median)),
            format_weeks(Some(overall.min)),
            format_weeks(Some(overall.max))
        );
        let _ = writeln!(out, "• Total quoted cost: {}", format_currency(overall.total_cost));
    }

    let _ = writeln!(out, "\nCOMPONENT TYPE TRENDS:");
    write_ranked(&mut out, &result.ranked_components, &result.category_series, top);

    let _ = writeln!(out, "\nMANUFACTURER TRENDS:");
    write_ranked(
        &mut out,
        &result.ranked_manufacturers,
        &result.manufacturer_series,
        top,
    );

    let _ = writeln!(out, "\nOVERALL TREND ANALYSIS:");
    write_trend_summary(&mut out, result);

    if !meta.orphan_categories.is_empty() || !meta.normalizer_collisions.is_empty() {
        let _ = writeln!(out, "\nDATA QUALITY:");
        if !meta.orphan_categories.is_empty() {
            let _ = writeln!(
                out,
                "• {} categories declare an unknown parent",
                meta.orphan_categories.len()
            );
        }
        if !meta.normalizer_collisions.is_empty() {
            let _ = writeln!(
                out,
                "• {} ambiguous manufacturer table keys",
                meta.normalizer_collisions.len()
            );
        }
    }
    out
}

fn render_components(result: &AnalysisResult, top: usize) -> String {
    let mut out = banner("COMPONENT TYPE LEAD TIMES");
    out.push_str(&group_table("Component Type", top_n(&result.components, top)));
    out
}

fn render_manufacturers(result: &AnalysisResult, top: usize) -> String {
    let mut out = banner("MANUFACTURER LEAD TIMES");
    out.push_str(&group_table("Manufacturer", top_n(&result.manufacturers, top)));
    out
}

fn render_hierarchy(result: &AnalysisResult, top: usize) -> String {
    let mut out = banner("ROLLED-UP (HIERARCHICAL) LEAD TIMES");
    if result.hierarchy.is_empty() {
        out.push_str("No category definitions loaded; pass --categories <PATH>.\n");
        return out;
    }
    let rows = top_n(&result.hierarchy, top)
        .iter()
        .map(|r| {
            let mut row = vec![r.category.clone(), r.level.to_string()];
            row.extend(weeks_columns(&r.stats));
            row.push(r.stats.count.to_string());
            row.push(r.direct_count.to_string());
            row.push(r.descendant_count.to_string());
            row.push(format_weeks(Some(r.stats.std_dev)));
            row
        })
        .collect();
    out.push_str(&table(
        &[
            "Component Type",
            "Level",
            "Avg",
            "Median",
            "Min",
            "Max",
            "Total",
            "Direct",
            "Children",
            "Std Dev",
        ],
        rows,
    ));
    out
}

fn render_trend(result: &AnalysisResult) -> String {
    let mut out = banner("MONTHLY SUMMARY");
    let rows = result
        .monthly_summary
        .iter()
        .map(|m| {
            vec![
                m.month.to_string(),
                m.stats.count.to_string(),
                m.stats.distinct_categories.to_string(),
                m.stats.distinct_manufacturers.to_string(),
                format_weeks(Some(m.stats.mean)),
                format_weeks(Some(m.stats.min)),
                format_weeks(Some(m.stats.max)),
                format_currency(m.stats.total_cost),
            ]
        })
        .collect();
    out.push_str(&table(
        &[
            "Month",
            "Quotes",
            "Components",
            "Manufacturers",
            "Avg",
            "Min",
            "Max",
            "Total Cost",
        ],
        rows,
    ));
    out.push('\n');
    write_trend_summary(&mut out, result);
    out
}

// ── Building blocks ───────────────────────────────────────────────────────────

fn banner(title: &str) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    format!("{rule}\n{title}\n{rule}\n")
}

fn weeks_columns(stats: &AggregateStats) -> [String; 4] {
    [
        format_weeks(Some(stats.mean)),
        format_weeks(Some(stats.median)),
        format_weeks(Some(stats.min)),
        format_weeks(Some(stats.max)),
    ]
}

fn group_table(label: &str, groups: &[GroupStats]) -> String {
    let rows = groups
        .iter()
        .map(|g| {
            let mut row = vec![g.name.clone()];
            row.extend(weeks_columns(&g.stats));
            row.push(g.stats.count.to_string());
            row.push(format_weeks(Some(g.stats.std_dev)));
            row
        })
        .collect();
    table(
        &[label, "Avg", "Median", "Min", "Max", "Points", "Std Dev"],
        rows,
    )
}

fn write_ranked(
    out: &mut String,
    ranked: &[Ranked<String>],
    series: &MonthlySeries<String>,
    top: usize,
) {
    let _ = writeln!(out, "• With sufficient data: {}", ranked.len());
    for (i, r) in top_n(ranked, top).iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, truncate_label(&r.key, 50));
        let _ = writeln!(
            out,
            "     Total quotes: {}, Months: {}",
            r.count,
            series.months_with_data(&r.key)
        );
    }
}

fn write_trend_summary(out: &mut String, result: &AnalysisResult) {
    match &result.trend_summary {
        Some(summary) => {
            let _ = writeln!(
                out,
                "• Overall trend: {} by {}",
                summary.direction,
                format_weeks(Some(summary.change_weeks.abs()))
            );
            for point in [&summary.first, &summary.last] {
                let _ = writeln!(
                    out,
                    "• {}: {} avg ({} quotes)",
                    point.month,
                    format_weeks(Some(point.mean)),
                    point.count
                );
            }
        }
        None => {
            let _ = writeln!(out, "• Not enough months with data for a trend");
        }
    }
}

/// Left-aligned first column (truncated), right-aligned figures.
fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    if rows.is_empty() {
        return "No data\n".to_string();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .map(|mut row| {
            if let Some(first) = row.first_mut() {
                *first = truncate_label(first, NAME_WIDTH);
            }
            row
        })
        .collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(unicode_width::UnicodeWidthStr::width(cell.as_str()));
            }
        }
    }

    let mut out = String::new();
    let line = |cells: &[String], out: &mut String| {
        let rendered: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    pad_right(cell, w)
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        let _ = writeln!(out, "{}", rendered.join("  ").trim_end());
    };

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    line(&header_cells, &mut out);
    let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    let _ = writeln!(out, "{}", "-".repeat(total));
    for row in &rows {
        line(row, &mut out);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
