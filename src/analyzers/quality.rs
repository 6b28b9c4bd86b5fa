//! Quality Analyzer - scrap, rework and material waste per material
//!
//! Rework is the labor overrun on quality-issue orders; material waste is
//! their material overrun. A material is reported when its cost impact
//! exceeds `min_impact`, when its issue rate exceeds `min_issue_rate_pct`, or
//! when its scrap rate is drifting upward across the trailing window.

use std::collections::BTreeMap;
use tracing::debug;

use super::{
    ensure_finite, AnalysisContext, AnalyzerError, AnalyzerOutcome, AnalyzerReport, DomainAnalyzer,
    QualityReport,
};
use crate::types::{present, AnalyzerKind, MaterialQualityPattern, QualityIssue, WorkOrderRecord};

/// Material quality analysis over one batch.
pub struct QualityAnalyzer;

impl DomainAnalyzer for QualityAnalyzer {
    fn name(&self) -> &str {
        "Quality"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Quality
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutcome, AnalyzerError> {
        let cfg = &ctx.config.analysis.quality;
        if ctx.batch.is_empty() {
            return Ok(AnalyzerOutcome::NoData);
        }
        ensure_finite(ctx.batch.iter())?;

        let total_scrap: u64 = ctx.batch.iter().map(WorkOrderRecord::scrapped).sum();
        let overall_scrap_rate = total_scrap as f64 / ctx.batch.len() as f64;

        let mut materials: BTreeMap<&str, Vec<&WorkOrderRecord>> = BTreeMap::new();
        for record in ctx.batch.iter() {
            if let Some(code) = present(&record.material_code) {
                materials.entry(code).or_default().push(record);
            }
        }

        let mut issues: Vec<QualityIssue> = Vec::new();
        for (code, orders) in materials.iter().filter(|(_, orders)| orders.len() >= cfg.min_orders) {
            ctx.checkpoint()?;
            issues.extend(self.assess(ctx, code, orders));
        }
        issues.sort_by(|a, b| b.estimated_cost.total_cmp(&a.estimated_cost));
        issues.truncate(cfg.max_findings);

        let mut patterns: Vec<MaterialQualityPattern> = materials
            .iter()
            .filter_map(|(code, orders)| {
                let defects = orders.iter().filter(|r| r.quality_issue).count();
                (defects >= cfg.pattern_min_issues).then(|| {
                    let scrap_units: u64 = orders.iter().map(|r| r.scrapped()).sum();
                    MaterialQualityPattern {
                        material_code: code.to_string(),
                        defect_count: defects,
                        order_count: orders.len(),
                        defect_rate_pct: defects as f64 / orders.len() as f64 * 100.0,
                        scrap_units,
                        estimated_impact: scrap_units as f64 * ctx.config.analysis.scrap_cost_per_unit,
                        work_orders: orders.iter().take(10).map(|r| r.work_order_id.clone()).collect(),
                    }
                })
            })
            .collect();
        patterns.sort_by(|a, b| b.defect_rate_pct.total_cmp(&a.defect_rate_pct));

        debug!(
            materials = materials.len(),
            issues = issues.len(),
            patterns = patterns.len(),
            "Quality analysed"
        );

        Ok(AnalyzerOutcome::Completed(AnalyzerReport::Quality(QualityReport {
            total_impact: issues.iter().map(|i| i.estimated_cost).sum(),
            issues,
            patterns,
            overall_scrap_rate,
        })))
    }
}

impl QualityAnalyzer {
    fn assess(&self, ctx: &AnalysisContext, material_code: &str, orders: &[&WorkOrderRecord]) -> Option<QualityIssue> {
        let cfg = &ctx.config.analysis.quality;
        let rate = ctx.config.analysis.labor_rate_hourly;
        let n = orders.len();

        let scrap_units: u64 = orders.iter().map(|r| r.scrapped()).sum();
        let produced: u64 = orders.iter().map(|r| r.produced()).sum();
        let scrap_cost = scrap_units as f64 * ctx.config.analysis.scrap_cost_per_unit;

        let flagged: Vec<&&WorkOrderRecord> = orders.iter().filter(|r| r.quality_issue).collect();
        let rework_hours: f64 = flagged.iter().map(|r| r.labor_variance_hours().max(0.0)).sum();
        let rework_cost = rework_hours * rate;
        let material_waste: f64 = flagged.iter().map(|r| r.material_variance().max(0.0)).sum();

        let issue_rate_pct = flagged.len() as f64 / n as f64 * 100.0;
        let scrap_per_order = scrap_units as f64 / n as f64;
        let mut estimated_cost = scrap_cost + rework_cost + material_waste;

        let drift = ctx.drift.detect_quality_drift(material_code, &ctx.window, ctx.now);
        if estimated_cost <= cfg.min_impact && issue_rate_pct <= cfg.min_issue_rate_pct && drift.is_none() {
            return None;
        }

        let correlations = match &drift {
            Some(d) => {
                if d.drift_pct > cfg.drift_amplify_pp {
                    estimated_cost *= cfg.drift_impact_multiplier;
                }
                let inflection = d.inflection.as_ref().map(|p| p.timestamp);
                ctx.correlations
                    .quality_correlations(material_code, &ctx.window, inflection, ctx.now)
            }
            None => Vec::new(),
        };

        Some(QualityIssue {
            material_code: material_code.to_string(),
            scrap_rate: if produced > 0 {
                scrap_units as f64 / produced as f64
            } else {
                0.0
            },
            scrap_per_order,
            issue_rate_pct,
            scrap_cost,
            rework_hours,
            rework_cost,
            material_waste,
            estimated_cost,
            order_count: n,
            drivers: vec![scrap_driver(scrap_per_order), rework_driver(rework_hours, n)],
            drift,
            correlations,
        })
    }
}

fn scrap_driver(scrap_per_order: f64) -> String {
    let level = if scrap_per_order > 20.0 {
        "Critical"
    } else if scrap_per_order > 10.0 {
        "High"
    } else if scrap_per_order > 5.0 {
        "Moderate"
    } else {
        "Low"
    };
    format!("{level} scrap rate ({scrap_per_order:.1} units/order)")
}

fn rework_driver(rework_hours: f64, order_count: usize) -> String {
    let avg = if order_count > 0 {
        rework_hours / order_count as f64
    } else {
        0.0
    };
    if avg > 10.0 {
        format!("Extensive rework required (avg {avg:.1} hrs/order)")
    } else if avg > 5.0 {
        format!("Significant rework time (avg {avg:.1} hrs/order)")
    } else if avg > 2.0 {
        format!("Moderate rework needed (avg {avg:.1} hrs/order)")
    } else {
        "Minimal rework required".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn lot(id: &str, days_ago: i64, material: &str, produced: u32, scrapped: u32) -> WorkOrderRecord {
        WorkOrderRecord {
            material_code: Some(material.to_string()),
            units_produced: Some(produced),
            units_scrapped: Some(scrapped),
            ..order(id, days_ago)
        }
    }

    fn report(outcome: AnalyzerOutcome) -> QualityReport {
        match outcome {
            AnalyzerOutcome::Completed(AnalyzerReport::Quality(r)) => r,
            other => panic!("Expected quality report, got {other:?}"),
        }
    }

    #[test]
    fn test_breakdown_costs() {
        let mut batch = vec![
            lot("WO-PROD-1", 2, "MAT-A", 100, 10),
            lot("WO-PROD-2", 1, "MAT-A", 100, 2),
        ];
        batch[0].quality_issue = true;
        batch[0].planned_labor_hours = Some(4.0);
        batch[0].actual_labor_hours = Some(10.0);
        batch[0].planned_material_cost = Some(500.0);
        batch[0].actual_material_cost = Some(700.0);

        let r = report(QualityAnalyzer.analyze(&context(batch, vec![])).unwrap());
        let issue = &r.issues[0];
        assert!((issue.scrap_cost - 900.0).abs() < 1e-9);
        assert!((issue.rework_hours - 6.0).abs() < 1e-9);
        assert!((issue.rework_cost - 1_200.0).abs() < 1e-9);
        assert!((issue.material_waste - 200.0).abs() < 1e-9);
        assert!((issue.estimated_cost - 2_300.0).abs() < 1e-9);
        assert!((issue.scrap_rate - 0.06).abs() < 1e-9);
        assert!((issue.issue_rate_pct - 50.0).abs() < 1e-9);
        assert_eq!(issue.drivers[0], "Moderate scrap rate (6.0 units/order)");
        assert_eq!(issue.drivers[1], "Moderate rework needed (avg 3.0 hrs/order)");
        assert!((r.overall_scrap_rate - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_quiet_material_not_reported() {
        let batch = vec![lot("WO-PROD-1", 2, "MAT-A", 100, 1), lot("WO-PROD-2", 1, "MAT-A", 100, 1)];
        let r = report(QualityAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert!(r.issues.is_empty());
    }

    #[test]
    fn test_drift_amplifies_impact() {
        let window: Vec<WorkOrderRecord> = [2u32, 2, 3, 5, 8, 8]
            .iter()
            .enumerate()
            .map(|(i, s)| lot(&format!("WO-PROD-{i}"), 6 - i as i64, "MAT-A", 100, *s))
            .collect();
        let batch = window[4..].to_vec();
        let r = report(QualityAnalyzer.analyze(&context(batch, window)).unwrap());
        let issue = &r.issues[0];
        assert!(issue.drift.is_some());
        // 16 units × 75 = 1200, drift of 6 pp > 5 -> × 1.5
        assert!((issue.estimated_cost - 1_800.0).abs() < 1e-9);
    }

    #[test]
    fn test_material_patterns_sorted_by_defect_rate() {
        let mut batch = Vec::new();
        for i in 0..4 {
            let mut r = lot(&format!("WO-PROD-A{i}"), 1, "MAT-A", 10, 0);
            r.quality_issue = i < 3;
            batch.push(r);
        }
        for i in 0..3 {
            let mut r = lot(&format!("WO-PROD-B{i}"), 1, "MAT-B", 10, 0);
            r.quality_issue = true;
            batch.push(r);
        }
        let r = report(QualityAnalyzer.analyze(&context(batch, vec![])).unwrap());
        let codes: Vec<&str> = r.patterns.iter().map(|p| p.material_code.as_str()).collect();
        assert_eq!(codes, vec!["MAT-B", "MAT-A"]);
    }

    #[test]
    fn test_large_unit_counts_do_not_overflow() {
        let batch: Vec<WorkOrderRecord> = (0..3)
            .map(|i| lot(&format!("WO-PROD-{i}"), 3 - i, "MAT-A", 2_000_000_000, 1_500_000_000))
            .collect();
        let r = report(QualityAnalyzer.analyze(&context(batch, vec![])).unwrap());
        let issue = &r.issues[0];
        assert!((issue.scrap_rate - 0.75).abs() < 1e-9);
        assert!((issue.scrap_cost - 4_500_000_000.0 * 75.0).abs() < 1.0);
        assert!((r.overall_scrap_rate - 1_500_000_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(
            QualityAnalyzer.analyze(&context(vec![], vec![])).unwrap(),
            AnalyzerOutcome::NoData
        );
    }
}
