//! Cost Analyzer - per-order variance predictions and repeated-variance patterns
//!
//! Variance per order:
//!
//! ```text
//! material_variance = actual_material_cost - planned_material_cost
//! labor_variance    = (actual_labor_hours - planned_labor_hours) × labor_rate
//! total_variance    = material_variance + labor_variance
//! ```
//!
//! An order is significant when `|total_variance|` exceeds
//! `max(min_variance_amount, mean(planned total) × variance_threshold_pct)`.

use std::collections::BTreeMap;
use tracing::debug;

use super::{
    ensure_finite, AnalysisContext, AnalyzerError, AnalyzerOutcome, AnalyzerReport, CostReport,
    DomainAnalyzer,
};
use crate::analytics::degradation::calculate_trend;
use crate::analytics::series::{self, SeriesMetric};
use crate::analytics::stats::mean;
use crate::types::{
    present, AnalyzerKind, CostDirection, CostPattern, CostPrediction, MetricType, PatternKind,
    RiskLevel, TrendStatus, VarianceContext, WorkOrderRecord,
};

const REQUIRED_FIELDS: [&str; 4] = [
    "planned_material_cost",
    "actual_material_cost",
    "planned_labor_hours",
    "actual_labor_hours",
];

/// Cost variance analysis over one batch.
pub struct CostAnalyzer;

/// One order's variance breakdown.
struct OrderVariance<'a> {
    record: &'a WorkOrderRecord,
    material_variance: f64,
    labor_variance_hours: f64,
    labor_variance_cost: f64,
    total_variance: f64,
    total_planned: f64,
}

impl DomainAnalyzer for CostAnalyzer {
    fn name(&self) -> &str {
        "Cost"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Cost
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutcome, AnalyzerError> {
        let cfg = &ctx.config.analysis.cost;
        let rate = ctx.config.analysis.labor_rate_hourly;

        let records: Vec<&WorkOrderRecord> = ctx
            .batch
            .iter()
            .filter(|r| {
                !is_listed(present(&r.supplier_id), &cfg.excluded_suppliers)
                    && !is_listed(present(&r.material_code), &cfg.excluded_materials)
            })
            .collect();
        if records.is_empty() {
            return Ok(AnalyzerOutcome::NoData);
        }

        let missing = missing_fields(&records);
        if !missing.is_empty() {
            debug!(missing = ?missing, "Cost analysis skipped");
            return Ok(AnalyzerOutcome::InsufficientData {
                missing_fields: missing,
            });
        }
        ensure_finite(records.iter().copied())?;

        let rows: Vec<OrderVariance> = records
            .iter()
            .map(|&r| {
                let material_variance = r.material_variance();
                let labor_variance_hours = r.labor_variance_hours();
                let labor_variance_cost = labor_variance_hours * rate;
                OrderVariance {
                    record: r,
                    material_variance,
                    labor_variance_hours,
                    labor_variance_cost,
                    total_variance: material_variance + labor_variance_cost,
                    total_planned: r.planned_material_cost.unwrap_or(0.0)
                        + r.planned_labor_hours.unwrap_or(0.0) * rate,
                }
            })
            .collect();

        let planned: Vec<f64> = rows.iter().map(|r| r.total_planned).collect();
        let threshold = cfg
            .min_variance_amount
            .max(mean(&planned) * cfg.variance_threshold_pct / 100.0);

        let significant: Vec<&OrderVariance> = rows
            .iter()
            .filter(|r| r.total_variance.abs() > threshold)
            .collect();

        let mut patterns = Vec::new();
        patterns.extend(self.group_patterns(ctx, &significant, PatternKind::Material)?);
        patterns.extend(self.group_patterns(ctx, &significant, PatternKind::Supplier)?);
        patterns.sort_by(|a, b| b.total_impact.abs().total_cmp(&a.total_impact.abs()));

        ctx.checkpoint()?;
        let mut ranked = significant.clone();
        ranked.sort_by(|a, b| b.total_variance.total_cmp(&a.total_variance));
        let predictions: Vec<CostPrediction> = ranked
            .into_iter()
            .take(cfg.max_predictions)
            .map(|row| self.prediction(ctx, row, &rows, threshold))
            .collect();

        debug!(
            orders = rows.len(),
            significant = significant.len(),
            patterns = patterns.len(),
            threshold = threshold,
            "Cost variance analysed"
        );

        Ok(AnalyzerOutcome::Completed(AnalyzerReport::Cost(CostReport {
            predictions,
            patterns,
            variance_threshold: threshold,
            total_impact: significant.iter().map(|r| r.total_variance).sum(),
            orders_analyzed: rows.len(),
        })))
    }
}

impl CostAnalyzer {
    fn group_patterns(
        &self,
        ctx: &AnalysisContext,
        significant: &[&OrderVariance],
        kind: PatternKind,
    ) -> Result<Vec<CostPattern>, AnalyzerError> {
        let mut groups: BTreeMap<&str, Vec<&OrderVariance>> = BTreeMap::new();
        for row in significant {
            let key = match kind {
                PatternKind::Material => present(&row.record.material_code),
                PatternKind::Supplier => present(&row.record.supplier_id),
            };
            if let Some(key) = key {
                groups.entry(key).or_default().push(row);
            }
        }

        groups
            .into_iter()
            .filter(|(_, group)| group.len() >= ctx.config.analysis.cost.pattern_min_orders)
            .map(|(identifier, group)| {
                ctx.checkpoint()?;
                let total_impact: f64 = group.iter().map(|r| r.total_variance).sum();
                let mut pattern = CostPattern {
                    kind,
                    identifier: identifier.to_string(),
                    order_count: group.len(),
                    total_impact,
                    avg_variance: total_impact / group.len() as f64,
                    work_orders: group.iter().map(|r| r.record.work_order_id.clone()).collect(),
                    trend_status: TrendStatus::Stable,
                    baseline_comparison: None,
                    cost_trend: None,
                    correlations: Vec::new(),
                };
                match kind {
                    PatternKind::Material => enrich_material_pattern(ctx, &mut pattern, &group),
                    PatternKind::Supplier => {
                        pattern.trend_status = supplier_trend_status(ctx, &group);
                    }
                }
                Ok(pattern)
            })
            .collect()
    }

    fn prediction(
        &self,
        ctx: &AnalysisContext,
        row: &OrderVariance,
        all: &[OrderVariance],
        threshold: f64,
    ) -> CostPrediction {
        let cfg = &ctx.config.analysis.cost;
        let (material_pct, labor_pct) = if row.total_variance != 0.0 {
            let m = row.material_variance.abs() / row.total_variance.abs() * 100.0;
            (m, 100.0 - m)
        } else {
            (50.0, 50.0)
        };

        let magnitude = row.total_variance.abs();
        let risk_level = if magnitude > threshold * cfg.critical_risk_multiple {
            RiskLevel::Critical
        } else if magnitude > threshold * cfg.high_risk_multiple {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };

        CostPrediction {
            work_order_id: row.record.work_order_id.clone(),
            material_code: present(&row.record.material_code).map(str::to_string),
            supplier_id: present(&row.record.supplier_id).map(str::to_string),
            planned_total: row.total_planned,
            material_variance: row.material_variance,
            labor_variance_cost: row.labor_variance_cost,
            labor_variance_hours: row.labor_variance_hours,
            total_variance: row.total_variance,
            material_pct,
            labor_pct,
            risk_level,
            confidence: confidence(row, all, cfg.max_confidence),
            context: variance_context(row, all, cfg.context_min_orders),
        }
    }
}

fn is_listed(value: Option<&str>, list: &[String]) -> bool {
    value.is_some_and(|v| list.iter().any(|x| x == v))
}

/// Required columns that are absent or zero on every record.
fn missing_fields(records: &[&WorkOrderRecord]) -> Vec<String> {
    let getters: [fn(&WorkOrderRecord) -> Option<f64>; 4] = [
        |r| r.planned_material_cost,
        |r| r.actual_material_cost,
        |r| r.planned_labor_hours,
        |r| r.actual_labor_hours,
    ];
    REQUIRED_FIELDS
        .iter()
        .zip(getters)
        .filter(|(_, get)| records.iter().all(|r| get(*r).unwrap_or(0.0) == 0.0))
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Base 60, plus pattern size, field completeness and variance magnitude.
fn confidence(row: &OrderVariance, all: &[OrderVariance], cap: f64) -> f64 {
    let r = row.record;
    let mut score = 60.0;

    if let Some(material) = present(&r.material_code) {
        let same = all
            .iter()
            .filter(|o| present(&o.record.material_code) == Some(material))
            .count();
        score += match same {
            n if n >= 8 => 20.0,
            n if n >= 5 => 15.0,
            n if n >= 3 => 10.0,
            _ => 0.0,
        };
    }

    let complete = [
        present(&r.material_code).is_some(),
        present(&r.supplier_id).is_some(),
        r.planned_material_cost.unwrap_or(0.0) > 0.0,
        r.actual_material_cost.unwrap_or(0.0) > 0.0,
        r.planned_labor_hours.unwrap_or(0.0) > 0.0,
        r.actual_labor_hours.unwrap_or(0.0) > 0.0,
    ]
    .iter()
    .filter(|f| **f)
    .count();
    score += complete as f64 * 2.0;

    let variance_pct = if row.total_planned > 0.0 {
        row.total_variance.abs() / row.total_planned * 100.0
    } else {
        0.0
    };
    if variance_pct > 30.0 {
        score += 8.0;
    } else if variance_pct > 15.0 {
        score += 5.0;
    }

    (score / 100.0).min(cap)
}

/// Compare an order's variance with orders of the same work-order type.
fn variance_context(row: &OrderVariance, all: &[OrderVariance], min_orders: usize) -> Option<VarianceContext> {
    let id = &row.record.work_order_id;
    if !id.contains('-') {
        return None;
    }
    let wo_type = row.record.work_order_type();
    let similar: Vec<&OrderVariance> = all
        .iter()
        .filter(|o| o.record.work_order_id.contains(wo_type))
        .collect();
    if similar.len() < min_orders {
        return None;
    }

    let avg_material = mean(&similar.iter().map(|o| o.material_variance.abs()).collect::<Vec<_>>());
    let avg_labor = mean(&similar.iter().map(|o| o.labor_variance_cost.abs()).collect::<Vec<_>>());
    let ratio = |value: f64, avg: f64| if avg > 0.0 { value.abs() / avg } else { 1.0 };

    Some(VarianceContext {
        work_order_type: wo_type.to_string(),
        similar_orders: similar.len(),
        material: describe_ratio(ratio(row.material_variance, avg_material)),
        labor: describe_ratio(ratio(row.labor_variance_cost, avg_labor)),
    })
}

fn describe_ratio(ratio: f64) -> String {
    if ratio > 2.5 {
        format!("{ratio:.1}x higher than typical")
    } else if ratio > 1.5 {
        format!("{ratio:.1}x above average")
    } else if ratio > 0.7 {
        "within normal range".to_string()
    } else {
        format!("{ratio:.1}x below typical")
    }
}

/// Baseline comparison, cost trend and cost correlations for a material pattern.
fn enrich_material_pattern(ctx: &AnalysisContext, pattern: &mut CostPattern, group: &[&OrderVariance]) {
    let material = pattern.identifier.clone();
    let material = material.as_str();

    if let Some(baseline) = ctx.baselines.get(MetricType::MaterialCost, material) {
        let costs: Vec<f64> = group.iter().filter_map(|r| r.record.actual_material_cost).collect();
        if !costs.is_empty() {
            let series = series::build_series(
                &ctx.window,
                SeriesMetric::MaterialCost,
                ctx.config.trend.window_days,
                ctx.now,
                series::for_material(material),
            );
            let divergence = ctx.trend.divergence_from(&series, baseline, ctx.now);
            pattern.baseline_comparison = Some(ctx.trend.format_comparative_text(
                "Material cost",
                mean(&costs),
                baseline.rolling_avg,
                divergence.as_ref(),
            ));
        }
    }

    if let Some(trend) = ctx.drift.detect_cost_trend(material, &ctx.window, ctx.now) {
        pattern.trend_status = match trend.direction {
            CostDirection::Increasing => TrendStatus::Accelerating,
            CostDirection::Decreasing => TrendStatus::Decelerating,
        };
        let inflection = trend.inflection.as_ref().map(|p| p.timestamp);
        pattern.correlations = ctx
            .correlations
            .cost_correlations(material, &ctx.window, inflection, ctx.now);
        pattern.cost_trend = Some(trend);
    }
}

/// Direction of a supplier's material cost across its significant orders.
fn supplier_trend_status(ctx: &AnalysisContext, group: &[&OrderVariance]) -> TrendStatus {
    let mut ordered: Vec<&&OrderVariance> = group.iter().collect();
    ordered.sort_by_key(|r| r.record.timestamp);
    let costs: Vec<f64> = ordered
        .iter()
        .filter_map(|r| r.record.actual_material_cost)
        .collect();

    match calculate_trend(&costs) {
        Some(t) if t.is_significant(ctx.config.trend.significance_threshold) && t.slope > 0.0 => {
            TrendStatus::Accelerating
        }
        Some(t) if t.is_significant(ctx.config.trend.significance_threshold) && t.slope < 0.0 => {
            TrendStatus::Decelerating
        }
        _ => TrendStatus::Stable,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::baseline::{compute_baselines, BaselineSnapshot};
    use crate::types::CorrelationKind;

    fn costed(id: &str, days_ago: i64, material: &str, supplier: &str, planned: f64, actual: f64) -> WorkOrderRecord {
        WorkOrderRecord {
            material_code: Some(material.to_string()),
            supplier_id: Some(supplier.to_string()),
            planned_material_cost: Some(planned),
            actual_material_cost: Some(actual),
            planned_labor_hours: Some(10.0),
            actual_labor_hours: Some(10.0),
            ..order(id, days_ago)
        }
    }

    fn report(outcome: AnalyzerOutcome) -> CostReport {
        match outcome {
            AnalyzerOutcome::Completed(AnalyzerReport::Cost(r)) => r,
            other => panic!("Expected cost report, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_batch_is_no_data() {
        let ctx = context(vec![], vec![]);
        assert_eq!(CostAnalyzer.analyze(&ctx).unwrap(), AnalyzerOutcome::NoData);
    }

    #[test]
    fn test_all_zero_labor_is_insufficient() {
        let mut r = costed("WO-PROD-1", 1, "MAT-A", "SUP-1", 100.0, 200.0);
        r.planned_labor_hours = Some(0.0);
        r.actual_labor_hours = None;
        let outcome = CostAnalyzer.analyze(&context(vec![r], vec![])).unwrap();
        assert_eq!(
            outcome,
            AnalyzerOutcome::InsufficientData {
                missing_fields: vec![
                    "planned_labor_hours".to_string(),
                    "actual_labor_hours".to_string()
                ]
            }
        );
    }

    #[test]
    fn test_threshold_patterns_and_risk() {
        // Planned total per order: 5000 + 10 h × 200 = 7000; 15% -> 1050 threshold
        let mut batch = vec![
            costed("WO-PROD-1", 5, "MAT-A", "SUP-1", 5_000.0, 7_000.0),
            costed("WO-PROD-2", 4, "MAT-A", "SUP-1", 5_000.0, 8_000.0),
            costed("WO-PROD-3", 3, "MAT-A", "SUP-2", 5_000.0, 12_000.0),
            costed("WO-PROD-4", 2, "MAT-B", "SUP-2", 5_000.0, 5_100.0),
        ];
        batch.push(costed("WO-MAINT-5", 1, "MAT-C", "SUP-3", 5_000.0, 3_500.0));

        let r = report(CostAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert!((r.variance_threshold - 1_050.0).abs() < 1e-9);
        assert_eq!(r.orders_analyzed, 5);

        assert_eq!(r.patterns.len(), 1, "Only MAT-A reaches three significant orders");
        let p = &r.patterns[0];
        assert_eq!(p.kind, PatternKind::Material);
        assert_eq!(p.identifier, "MAT-A");
        assert!((p.total_impact - 12_000.0).abs() < 1e-9);
        assert!((p.avg_variance - 4_000.0).abs() < 1e-9);

        let ids: Vec<&str> = r.predictions.iter().map(|p| p.work_order_id.as_str()).collect();
        assert_eq!(ids, vec!["WO-PROD-3", "WO-PROD-2", "WO-PROD-1", "WO-MAINT-5"]);
        assert_eq!(r.predictions[0].risk_level, RiskLevel::Critical, "7000 > 5 × 1050");
        assert_eq!(r.predictions[1].risk_level, RiskLevel::High);
        assert_eq!(r.predictions[2].risk_level, RiskLevel::Medium);
        assert!((r.predictions[0].material_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_exclusions_apply_before_analysis() {
        let mut config = crate::config::EngineConfig::default();
        config.analysis.cost.excluded_materials = vec!["MAT-A".to_string()];
        let batch = vec![costed("WO-PROD-1", 1, "MAT-A", "SUP-1", 100.0, 50_000.0)];
        let ctx = AnalysisContext::new(
            "F1",
            std::sync::Arc::new(batch),
            std::sync::Arc::new(vec![]),
            BaselineSnapshot::default(),
            now(),
            std::sync::Arc::new(config),
        );
        assert_eq!(CostAnalyzer.analyze(&ctx).unwrap(), AnalyzerOutcome::NoData);
    }

    #[test]
    fn test_confidence_components() {
        let rows: Vec<WorkOrderRecord> = (0..8)
            .map(|i| costed(&format!("WO-PROD-{i}"), 1, "MAT-A", "SUP-1", 1_000.0, 5_000.0))
            .collect();
        let r = report(CostAnalyzer.analyze(&context(rows, vec![])).unwrap());
        // 60 + 20 (8 same material) + 12 (all six fields) + 8 (>30%) = 100, capped at 92
        assert!((r.predictions[0].confidence - 0.92).abs() < 1e-9);
    }

    #[test]
    fn test_variance_context_against_similar_orders() {
        let mut batch: Vec<WorkOrderRecord> = (0..5)
            .map(|i| costed(&format!("WO-PROD-{i}"), 1, "MAT-A", "SUP-1", 5_000.0, 6_100.0))
            .collect();
        batch.push(costed("WO-PROD-9", 1, "MAT-A", "SUP-1", 5_000.0, 15_000.0));
        let r = report(CostAnalyzer.analyze(&context(batch, vec![])).unwrap());
        let ctx = r.predictions[0].context.as_ref().unwrap();
        assert_eq!(ctx.work_order_type, "PROD");
        assert_eq!(ctx.similar_orders, 6);
        // mean |material variance| = (5 × 1100 + 10000) / 6
        assert_eq!(ctx.material, "3.9x higher than typical");
        assert_eq!(ctx.labor, "within normal range", "Zero labor variance defaults to ratio 1");
    }

    #[test]
    fn test_material_pattern_enriched_from_window() {
        let window: Vec<WorkOrderRecord> = [10_000.0, 10_000.0, 10_000.0, 13_500.0, 13_500.0, 13_500.0]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let supplier = if i < 3 { "SUP-1" } else { "SUP-2" };
                costed(&format!("WO-PROD-{i}"), 6 - i as i64, "MAT-A", supplier, 10_000.0, *c)
            })
            .collect();
        let batch: Vec<WorkOrderRecord> = window[3..].to_vec();

        let mut ctx = context(batch, window.clone());
        ctx.baselines = BaselineSnapshot::from_rows(compute_baselines("F1", &window[..3], now()));

        let r = report(CostAnalyzer.analyze(&ctx).unwrap());
        let p = r
            .patterns
            .iter()
            .find(|p| p.kind == PatternKind::Material)
            .unwrap();
        assert_eq!(p.trend_status, TrendStatus::Accelerating);
        let trend = p.cost_trend.as_ref().unwrap();
        assert!((trend.cost_change_pct - 35.0).abs() < 1e-9);
        assert!(p
            .baseline_comparison
            .as_deref()
            .unwrap()
            .starts_with("Material cost is $13,500.00 vs your typical $10,000.00 (1.35x higher)"));
        assert!(p.correlations.iter().any(|c| c.kind == CorrelationKind::SupplierChange));
    }
}
