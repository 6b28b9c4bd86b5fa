//! Efficiency Analyzer - operation types running below plan
//!
//! Orders are grouped by the type segment of their work-order number
//! (`WO-PROD-2004` -> `PROD`). Per order, labor efficiency is
//! planned / actual hours and cost efficiency is planned / actual material
//! cost, both as percentages clamped to `[0, max_efficiency_pct]`; an order
//! without actuals counts as 100%.

use std::collections::BTreeMap;
use tracing::debug;

use super::{
    ensure_finite, AnalysisContext, AnalyzerError, AnalyzerOutcome, AnalyzerReport, DomainAnalyzer,
    EfficiencyReport,
};
use crate::analytics::stats::{mean, population_std};
use crate::types::{AnalyzerKind, EfficiencyOpportunity, SavingsBreakdown, WorkOrderRecord};

/// Operation efficiency analysis over one batch.
pub struct EfficiencyAnalyzer;

impl DomainAnalyzer for EfficiencyAnalyzer {
    fn name(&self) -> &str {
        "Efficiency"
    }

    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Efficiency
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutcome, AnalyzerError> {
        let cfg = &ctx.config.analysis.efficiency;
        if ctx.batch.is_empty() {
            return Ok(AnalyzerOutcome::NoData);
        }
        ensure_finite(ctx.batch.iter())?;

        let cap = cfg.max_efficiency_pct;
        let overall: Vec<f64> = ctx
            .batch
            .iter()
            .filter(|r| r.actual_labor_hours.unwrap_or(0.0) > 0.0)
            .map(|r| ratio_pct(r.planned_labor_hours, r.actual_labor_hours, cap))
            .collect();

        let mut operations: BTreeMap<&str, Vec<&WorkOrderRecord>> = BTreeMap::new();
        for record in ctx.batch.iter() {
            operations.entry(record.work_order_type()).or_default().push(record);
        }

        let mut opportunities: Vec<EfficiencyOpportunity> = Vec::new();
        for (op, orders) in operations.iter().filter(|(_, orders)| orders.len() >= 2) {
            ctx.checkpoint()?;
            opportunities.extend(self.assess(ctx, op, orders));
        }
        opportunities.sort_by(|a, b| b.potential_savings.total_cmp(&a.potential_savings));
        opportunities.truncate(cfg.max_opportunities);

        debug!(
            operations = operations.len(),
            opportunities = opportunities.len(),
            "Efficiency analysed"
        );

        Ok(AnalyzerOutcome::Completed(AnalyzerReport::Efficiency(EfficiencyReport {
            total_savings: opportunities.iter().map(|o| o.potential_savings).sum(),
            opportunities,
            overall_efficiency_pct: mean(&overall),
        })))
    }
}

impl EfficiencyAnalyzer {
    fn assess(
        &self,
        ctx: &AnalysisContext,
        operation_type: &str,
        orders: &[&WorkOrderRecord],
    ) -> Option<EfficiencyOpportunity> {
        let cfg = &ctx.config.analysis.efficiency;
        let rate = ctx.config.analysis.labor_rate_hourly;
        let n = orders.len() as f64;

        let labor_variances: Vec<f64> = orders.iter().map(|r| r.labor_variance_hours()).collect();
        let cost_variances: Vec<f64> = orders.iter().map(|r| r.material_variance()).collect();
        let labor_eff: Vec<f64> = orders
            .iter()
            .map(|r| ratio_pct(r.planned_labor_hours, r.actual_labor_hours, cfg.max_efficiency_pct))
            .collect();
        let cost_eff: Vec<f64> = orders
            .iter()
            .map(|r| ratio_pct(r.planned_material_cost, r.actual_material_cost, cfg.max_efficiency_pct))
            .collect();
        let quality_issues = orders.iter().filter(|r| r.quality_issue).count();

        let avg_labor_var = mean(&labor_variances);
        let avg_cost_var = mean(&cost_variances);
        let consistency = population_std(&labor_variances);

        let savings = SavingsBreakdown {
            labor: avg_labor_var.max(0.0) * rate * n,
            material: avg_cost_var.max(0.0) * n,
            quality: quality_issues as f64
                * ctx.config.analysis.scrap_cost_per_unit
                * cfg.rework_units_per_issue,
        };
        let potential_savings = savings.total();

        let labor_efficiency_pct = mean(&labor_eff);
        let cost_efficiency_pct = mean(&cost_eff);
        let efficiency_score = (labor_efficiency_pct + cost_efficiency_pct) / 2.0;

        if potential_savings <= cfg.min_savings && efficiency_score >= cfg.min_score {
            return None;
        }

        Some(EfficiencyOpportunity {
            operation_type: operation_type.to_string(),
            order_count: orders.len(),
            efficiency_score,
            labor_efficiency_pct,
            cost_efficiency_pct,
            consistency,
            potential_savings,
            savings,
            drivers: vec![
                labor_driver(avg_labor_var),
                material_driver(avg_cost_var),
                quality_driver(quality_issues, orders.len()),
                consistency_driver(consistency),
            ],
        })
    }
}

/// planned / actual × 100, clamped; 100 when there is no positive actual.
fn ratio_pct(planned: Option<f64>, actual: Option<f64>, cap: f64) -> f64 {
    match actual {
        Some(a) if a > 0.0 => (planned.unwrap_or(0.0) / a * 100.0).clamp(0.0, cap),
        _ => 100.0,
    }
}

fn labor_driver(avg: f64) -> String {
    if avg > 10.0 {
        format!("Severe labor overruns (avg +{avg:.1} hrs/order)")
    } else if avg > 5.0 {
        format!("Moderate labor inefficiency (avg +{avg:.1} hrs/order)")
    } else if avg > 2.0 {
        format!("Minor labor variance (avg +{avg:.1} hrs/order)")
    } else {
        "Labor efficiency acceptable".to_string()
    }
}

fn material_driver(avg: f64) -> String {
    if avg > 1000.0 {
        format!("Significant material cost overruns (avg +${avg:.0}/order)")
    } else if avg > 500.0 {
        format!("Moderate material cost variance (avg +${avg:.0}/order)")
    } else if avg > 100.0 {
        format!("Minor material cost fluctuation (avg +${avg:.0}/order)")
    } else {
        "Material costs well-controlled".to_string()
    }
}

fn quality_driver(issues: usize, orders: usize) -> String {
    let rate = if orders > 0 {
        issues as f64 / orders as f64 * 100.0
    } else {
        0.0
    };
    if rate > 30.0 {
        format!("Critical quality impact ({rate:.0}% orders affected)")
    } else if rate > 15.0 {
        format!("Moderate quality impact ({rate:.0}% orders affected)")
    } else if rate > 5.0 {
        format!("Minor quality impact ({rate:.0}% orders affected)")
    } else {
        "Quality not impacting efficiency".to_string()
    }
}

fn consistency_driver(std_dev: f64) -> String {
    if std_dev > 5.0 {
        format!("Highly inconsistent performance (std dev={std_dev:.1})")
    } else if std_dev > 3.0 {
        format!("Moderate variability (std dev={std_dev:.1})")
    } else if std_dev > 1.0 {
        format!("Good consistency (std dev={std_dev:.1})")
    } else {
        "Excellent process consistency".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn op(id: &str, planned_h: f64, actual_h: f64, planned_c: f64, actual_c: f64) -> WorkOrderRecord {
        WorkOrderRecord {
            planned_labor_hours: Some(planned_h),
            actual_labor_hours: Some(actual_h),
            planned_material_cost: Some(planned_c),
            actual_material_cost: Some(actual_c),
            ..order(id, 1)
        }
    }

    fn report(outcome: AnalyzerOutcome) -> EfficiencyReport {
        match outcome {
            AnalyzerOutcome::Completed(AnalyzerReport::Efficiency(r)) => r,
            other => panic!("Expected efficiency report, got {other:?}"),
        }
    }

    #[test]
    fn test_savings_and_scores() {
        let batch = vec![
            op("WO-PROD-1", 8.0, 10.0, 1_000.0, 1_000.0),
            op("WO-PROD-2", 8.0, 13.0, 1_000.0, 1_250.0),
        ];
        let r = report(EfficiencyAnalyzer.analyze(&context(batch, vec![])).unwrap());
        let o = &r.opportunities[0];
        assert_eq!(o.operation_type, "PROD");
        // labor: avg +3.5 h × 200 × 2; material: avg +125 × 2
        assert!((o.savings.labor - 1_400.0).abs() < 1e-9);
        assert!((o.savings.material - 250.0).abs() < 1e-9);
        assert!((o.potential_savings - 1_650.0).abs() < 1e-9);
        // labor eff (80 + 61.54)/2, cost eff (100 + 80)/2
        assert!((o.labor_efficiency_pct - 70.769_23).abs() < 1e-4);
        assert!((o.cost_efficiency_pct - 90.0).abs() < 1e-9);
        assert!((o.consistency - 1.5).abs() < 1e-9);
        assert_eq!(o.drivers[0], "Minor labor variance (avg +3.5 hrs/order)");
        assert_eq!(o.drivers[1], "Minor material cost fluctuation (avg +$125/order)");
        assert_eq!(o.drivers[3], "Good consistency (std dev=1.5)");
    }

    #[test]
    fn test_efficient_operation_not_reported() {
        let batch = vec![
            op("WO-PROD-1", 10.0, 10.0, 1_000.0, 1_000.0),
            op("WO-PROD-2", 10.0, 10.0, 1_000.0, 1_000.0),
        ];
        let r = report(EfficiencyAnalyzer.analyze(&context(batch, vec![])).unwrap());
        assert!(r.opportunities.is_empty());
        assert!((r.overall_efficiency_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_clamped_and_top_three() {
        let mut batch = Vec::new();
        for (i, ty) in ["A", "B", "C", "D"].iter().enumerate() {
            for j in 0..2 {
                batch.push(op(
                    &format!("WO-{ty}-{j}"),
                    1.0,
                    1.0 + (i as f64 + 1.0) * 10.0,
                    100.0,
                    100.0,
                ));
            }
        }
        batch.push(op("WO-FAST-1", 50.0, 1.0, 100.0, 100.0));
        batch.push(op("WO-FAST-2", 50.0, 1.0, 100.0, 100.0));

        let r = report(EfficiencyAnalyzer.analyze(&context(batch, vec![])).unwrap());
        let ops: Vec<&str> = r.opportunities.iter().map(|o| o.operation_type.as_str()).collect();
        assert_eq!(ops, vec!["D", "C", "B"]);
        assert!(r.opportunities.iter().all(|o| o.labor_efficiency_pct <= 150.0));
    }
}
