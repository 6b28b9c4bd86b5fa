//! Investigation grouping
//!
//! One rule today: when a run surfaces several material or supplier cost
//! patterns, they are merged into a single investigation. Each insight joins
//! at most one investigation per run.

use std::collections::HashSet;

use crate::analytics::stats::money;
use crate::types::{Insight, Investigation, TrendStatus};

/// Merge the run's cost-pattern insights into one investigation when there
/// are at least `min_patterns` of them.
pub fn group_cost_patterns<'a>(
    insights: impl IntoIterator<Item = &'a Insight>,
    min_patterns: usize,
) -> Vec<Investigation> {
    let mut seen = HashSet::new();
    let mut members: Vec<&Insight> = insights
        .into_iter()
        .filter(|i| i.insight_type.is_cost_pattern())
        .filter(|i| seen.insert(i.id.clone()))
        .collect();

    if members.len() < min_patterns.max(2) {
        return Vec::new();
    }

    members.sort_by(|a, b| a.id.cmp(&b.id));

    let total_impact: f64 = members.iter().map(|i| i.financial_impact).sum();
    let trend_status = members
        .iter()
        .map(|i| i.trend_status())
        .max()
        .unwrap_or(TrendStatus::Stable);
    let identifiers: Vec<String> = members.iter().map(|i| i.identifier.clone()).collect();

    vec![Investigation {
        id: format!("investigation_cost_patterns_{}", identifiers.join("+")),
        title: format!(
            "{} related cost patterns totalling {}",
            members.len(),
            money(total_impact)
        ),
        insight_ids: members.iter().map(|i| i.id.clone()).collect(),
        identifiers,
        total_impact,
        trend_status,
    }]
}
