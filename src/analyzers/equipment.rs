//! Equipment Analyzer - failure risk per machine
//!
//! Risk score starts at `base_risk` and gains 30 for labor overrun, 40 for a
//! high share of quality-issue orders and 30 for heavy scrap, capped at
//! `max_risk`. A machine whose cycle time is degrading across the trailing
//! window gets `degradation_risk_bonus` on top and is reported even when its
//! batch impact is small.

use std::collections::BTreeMap;
use tracing::debug;

use super::{
    ensure_finite, AnalysisContext, AnalyzerError, AnalyzerOutcome, AnalyzerReport, DomainAnalyzer,
    EquipmentReport,
};
use crate::analytics::stats::mean;
use crate::types::{present, AnalyzerKind, EquipmentQualityPattern, EquipmentRisk, WorkOrderRecord};

/// Equipment failure-risk analysis over one batch.
pub struct EquipmentAnalyzer;

impl DomainAnalyzer for EquipmentAnalyzer {
    fn name(&self) -> &str {
        "Equipment"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Equipment
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutcome, AnalyzerError> {
        let cfg = &ctx.config.analysis.equipment;

        let mut machines: BTreeMap<&str, Vec<&WorkOrderRecord>> = BTreeMap::new();
        for record in ctx.batch.iter() {
            if let Some(id) = present(&record.equipment_id) {
                if !cfg.excluded_equipment.iter().any(|x| x == id) {
                    machines.entry(id).or_default().push(record);
                }
            }
        }
        if machines.is_empty() {
            return Ok(AnalyzerOutcome::NoData);
        }
        ensure_finite(machines.values().flatten().copied())?;

        let mut risks: Vec<EquipmentRisk> = Vec::new();
        for (id, orders) in machines.iter().filter(|(_, orders)| orders.len() >= cfg.min_orders) {
            ctx.checkpoint()?;
            risks.extend(self.assess(ctx, id, orders));
        }
        risks.sort_by(|a, b| b.estimated_cost.total_cmp(&a.estimated_cost));
        risks.truncate(cfg.max_findings);

        let mut quality_patterns: Vec<EquipmentQualityPattern> = machines
            .iter()
            .filter_map(|(id, orders)| {
                let issues = orders.iter().filter(|r| r.quality_issue).count();
                (issues >= cfg.quality_pattern_min_issues).then(|| {
                    let scrap_units: u64 = orders.iter().map(|r| r.scrapped()).sum();
                    EquipmentQualityPattern {
                        equipment_id: id.to_string(),
                        quality_issue_count: issues,
                        order_count: orders.len(),
                        issue_rate_pct: issues as f64 / orders.len() as f64 * 100.0,
                        scrap_units,
                        estimated_impact: scrap_units as f64 * ctx.config.analysis.scrap_cost_per_unit,
                        work_orders: orders.iter().take(10).map(|r| r.work_order_id.clone()).collect(),
                    }
                })
            })
            .collect();
        quality_patterns.sort_by(|a, b| b.quality_issue_count.cmp(&a.quality_issue_count));

        debug!(
            machines = machines.len(),
            risks = risks.len(),
            patterns = quality_patterns.len(),
            "Equipment risk analysed"
        );

        Ok(AnalyzerOutcome::Completed(AnalyzerReport::Equipment(EquipmentReport {
            total_risk_cost: risks.iter().map(|r| r.estimated_cost).sum(),
            risks,
            quality_patterns,
        })))
    }
}

impl EquipmentAnalyzer {
    fn assess(&self, ctx: &AnalysisContext, equipment_id: &str, orders: &[&WorkOrderRecord]) -> Option<EquipmentRisk> {
        let cfg = &ctx.config.analysis.equipment;
        let rate = ctx.config.analysis.labor_rate_hourly;
        let n = orders.len() as f64;

        let variances: Vec<f64> = orders.iter().map(|r| r.labor_variance_hours()).collect();
        let avg_variance = mean(&variances);
        let overrun_hours: f64 = variances.iter().map(|v| v.max(0.0)).sum();
        let labor_overrun_cost = overrun_hours * rate;

        let scrap_units: u64 = orders.iter().map(|r| r.scrapped()).sum();
        let scrap_cost = scrap_units as f64 * ctx.config.analysis.scrap_cost_per_unit;
        let quality_issue_count = orders.iter().filter(|r| r.quality_issue).count();
        let material_waste: f64 = orders
            .iter()
            .filter(|r| r.quality_issue)
            .map(|r| r.material_variance().max(0.0))
            .sum();
        let estimated_cost = labor_overrun_cost + scrap_cost + material_waste;

        let mut risk = cfg.base_risk;
        if avg_variance > cfg.labor_variance_hours {
            risk += 30.0;
        }
        if quality_issue_count as f64 > n * cfg.quality_issue_share {
            risk += 40.0;
        }
        if scrap_units as f64 > n * cfg.scrap_per_order {
            risk += 30.0;
        }
        risk = risk.min(cfg.max_risk);

        let degradation = ctx
            .drift
            .detect_equipment_degradation(equipment_id, &ctx.window, ctx.now);
        if estimated_cost <= cfg.min_impact && degradation.is_none() {
            return None;
        }

        let correlations = if degradation.is_some() {
            risk = (risk + cfg.degradation_risk_bonus).min(cfg.max_risk);
            ctx.correlations
                .equipment_correlations(equipment_id, &ctx.window, ctx.now)
        } else {
            Vec::new()
        };

        Some(EquipmentRisk {
            equipment_id: equipment_id.to_string(),
            failure_probability: risk / 100.0,
            estimated_cost,
            order_count: orders.len(),
            avg_labor_variance_hours: avg_variance,
            labor_overrun_cost,
            scrap_units,
            scrap_cost,
            material_waste,
            quality_issue_count,
            drivers: vec![
                labor_driver(avg_variance),
                quality_driver(quality_issue_count, scrap_units, orders.len()),
            ],
            degradation,
            correlations,
        })
    }
}

fn labor_driver(avg_variance: f64) -> String {
    if avg_variance > 10.0 {
        format!("Severe performance degradation (avg +{avg_variance:.1} hrs/order)")
    } else if avg_variance > 5.0 {
        format!("Moderate performance issues (avg +{avg_variance:.1} hrs/order)")
    } else if avg_variance > 2.0 {
        format!("Minor inefficiency (avg +{avg_variance:.1} hrs/order)")
    } else {
        "Labor performance within normal range".to_string()
    }
}

fn quality_driver(issue_count: usize, scrap_units: u64, order_count: usize) -> String {
    let issue_rate = issue_count as f64 / order_count as f64 * 100.0;
    let scrap_per_order = scrap_units as f64 / order_count as f64;

    if issue_rate > 40.0 {
        format!("Critical quality problems ({issue_rate:.0}% orders affected, {scrap_per_order:.1} scrap/order)")
    } else if issue_rate > 25.0 {
        format!("Frequent quality issues ({issue_rate:.0}% orders affected, {scrap_per_order:.1} scrap/order)")
    } else if issue_rate > 10.0 {
        format!("Occasional quality issues ({issue_rate:.0}% orders affected)")
    } else {
        "Quality within acceptable range".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn run(id: &str, days_ago: i64, machine: &str, planned_h: f64, actual_h: f64) -> WorkOrderRecord {
        WorkOrderRecord {
            equipment_id: Some(machine.to_string()),
            planned_labor_hours: Some(planned_h),
            actual_labor_hours: Some(actual_h),
            ..order(id, days_ago)
        }
    }

    fn report(outcome: AnalyzerOutcome) -> EquipmentReport {
        match outcome {
            AnalyzerOutcome::Completed(AnalyzerReport::Equipment(r)) => r,
            other => panic!("Expected equipment report, got {other:?}"),
        }
    }

    #[test]
    fn test_no_equipment_column_is_no_data() {
        let ctx = context(vec![order("WO-PROD-1", 1)], vec![]);
        assert_eq!(EquipmentAnalyzer.analyze(&ctx).unwrap(), AnalyzerOutcome::NoData);
    }

    #[test]
    fn test_risk_factors_and_cost() {
        let mut batch = vec![
            run("WO-PROD-1", 3, "M1", 10.0, 18.0),
            run("WO-PROD-2", 2, "M1", 10.0, 16.0),
            run("WO-PROD-3", 1, "M1", 10.0, 14.0),
        ];
        batch[0].quality_issue = true;
        batch[0].units_scrapped = Some(12);
        batch[0].planned_material_cost = Some(100.0);
        batch[0].actual_material_cost = Some(400.0);

        let r = report(EquipmentAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert_eq!(r.risks.len(), 1);
        let risk = &r.risks[0];
        // avg +6 h (30) + 1 issue of 3 orders > 0.9 (40) + 12 scrap > 9 (30) = 140, capped
        assert!((risk.failure_probability - 0.95).abs() < 1e-9);
        assert!((risk.labor_overrun_cost - 3_600.0).abs() < 1e-9);
        assert!((risk.scrap_cost - 900.0).abs() < 1e-9);
        assert!((risk.material_waste - 300.0).abs() < 1e-9);
        assert!((risk.estimated_cost - 4_800.0).abs() < 1e-9);
        assert_eq!(risk.drivers[0], "Moderate performance issues (avg +6.0 hrs/order)");
        assert_eq!(
            risk.drivers[1],
            "Occasional quality issues (33% orders affected)"
        );
        assert!(risk.degradation.is_none());
    }

    #[test]
    fn test_low_impact_machine_dropped() {
        let batch = vec![run("WO-PROD-1", 2, "M1", 10.0, 11.0), run("WO-PROD-2", 1, "M1", 10.0, 10.0)];
        let r = report(EquipmentAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert!(r.risks.is_empty(), "$200 overrun is below the reporting floor");
    }

    #[test]
    fn test_degrading_machine_reported_with_bonus() {
        let window: Vec<WorkOrderRecord> = [8.0, 8.0, 9.0, 10.0, 11.0, 12.0]
            .iter()
            .enumerate()
            .map(|(i, h)| run(&format!("WO-PROD-{i}"), 6 - i as i64, "M1", *h, *h))
            .collect();
        let batch = window[4..].to_vec();
        let r = report(EquipmentAnalyzer.analyze(&context(batch, window)).unwrap());
        let risk = &r.risks[0];
        assert!(risk.degradation.is_some());
        assert!((risk.failure_probability - 0.55).abs() < 1e-9, "Base 40 plus 15 for degradation");
    }

    #[test]
    fn test_quality_patterns_need_three_issues() {
        let batch: Vec<WorkOrderRecord> = (0..4)
            .map(|i| WorkOrderRecord {
                quality_issue: i < 3,
                units_scrapped: Some(2),
                ..run(&format!("WO-PROD-{i}"), 1, "M2", 5.0, 5.0)
            })
            .collect();
        let r = report(EquipmentAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert_eq!(r.quality_patterns.len(), 1);
        let p = &r.quality_patterns[0];
        assert_eq!(p.quality_issue_count, 3);
        assert!((p.issue_rate_pct - 75.0).abs() < 1e-9);
        assert!((p.estimated_impact - 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_large_scrap_totals_do_not_overflow() {
        let batch: Vec<WorkOrderRecord> = (0..3)
            .map(|i| WorkOrderRecord {
                quality_issue: true,
                units_produced: Some(2_000_000_000),
                units_scrapped: Some(1_500_000_000),
                ..run(&format!("WO-PROD-{i}"), 3 - i, "M1", 5.0, 5.0)
            })
            .collect();
        let r = report(EquipmentAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert_eq!(r.risks[0].scrap_units, 4_500_000_000);
        assert_eq!(r.quality_patterns[0].scrap_units, 4_500_000_000);
    }

    #[test]
    fn test_excluded_machine_ignored() {
        let mut config = crate::config::EngineConfig::default();
        config.analysis.equipment.excluded_equipment = vec!["M1".to_string()];
        let batch = vec![run("WO-PROD-1", 2, "M1", 1.0, 50.0), run("WO-PROD-2", 1, "M1", 1.0, 50.0)];
        let ctx = AnalysisContext::new(
            "F1",
            std::sync::Arc::new(batch),
            std::sync::Arc::new(vec![]),
            crate::baseline::BaselineSnapshot::default(),
            now(),
            std::sync::Arc::new(config),
        );
        assert_eq!(EquipmentAnalyzer.analyze(&ctx).unwrap(), AnalyzerOutcome::NoData);
    }
}
