use itertools::Itertools;
use std::collections::BTreeMap;

use certquiz::scoring::CategoryScore;

/// Bar chart rows for the categories that received at least one answer
pub fn category_bars(scores: &BTreeMap<String, CategoryScore>) -> Vec<(String, u64)> {
    scores
        .iter()
        .filter(|(_, s)| s.total_answered > 0)
        .map(|(category, s)| (category.clone(), s.percent().round() as u64))
        .collect()
}

/// Widest bar that still fits all bars (plus gaps) in the chart
pub fn bar_width(area_width: u16, bars: usize) -> u16 {
    if bars == 0 {
        return 1;
    }
    let inner = area_width.saturating_sub(2) as usize;
    let per_bar = inner / bars;
    per_bar.saturating_sub(2).clamp(1, 24) as u16
}

pub fn join_or_dash(categories: &[String]) -> String {
    if categories.is_empty() {
        "-".to_string()
    } else {
        categories.iter().join(", ")
    }
}

/// Format a percentage label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}%", val.round())
    } else {
        format!("{val:.1}%")
    }
}
