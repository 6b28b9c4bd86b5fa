//! Normalize analyzer reports into insights.

use crate::analyzers::AnalyzerReport;
use crate::types::{Insight, InsightPayload, ScoreBreakdown};

/// One unscored [`Insight`] per reportable finding.
///
/// Cost predictions and patterns, equipment risks, quality issues and
/// efficiency opportunities become insights; quality-pattern listings stay
/// in the analyzer report only.
pub fn extract_insights(report: &AnalyzerReport) -> Vec<Insight> {
    let source = report.kind();
    let mut out = Vec::new();
    let mut push = |payload: InsightPayload, impact: f64, confidence: Option<f64>| {
        let insight_type = payload.insight_type();
        let identifier = payload.identifier().to_string();
        out.push(Insight {
            id: Insight::make_id(source, insight_type, &identifier),
            source,
            insight_type,
            identifier,
            payload,
            financial_impact: impact.abs(),
            confidence,
            scores: ScoreBreakdown::default(),
            priority_score: 0.0,
            priority_level: None,
            narrative: None,
        });
    };

    match report {
        AnalyzerReport::Cost(r) => {
            for p in &r.predictions {
                push(InsightPayload::CostPrediction(p.clone()), p.total_variance, Some(p.confidence));
            }
            for p in &r.patterns {
                push(InsightPayload::CostPattern(p.clone()), p.total_impact, None);
            }
        }
        AnalyzerReport::Equipment(r) => {
            for risk in &r.risks {
                push(InsightPayload::EquipmentRisk(risk.clone()), risk.estimated_cost, None);
            }
        }
        AnalyzerReport::Quality(r) => {
            for issue in &r.issues {
                push(InsightPayload::QualityIssue(issue.clone()), issue.estimated_cost, None);
            }
        }
        AnalyzerReport::Efficiency(r) => {
            for o in &r.opportunities {
                push(
                    InsightPayload::EfficiencyOpportunity(o.clone()),
                    o.potential_savings,
                    None,
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::CostReport;
    use crate::types::{AnalyzerKind, CostPattern, InsightType, PatternKind, TrendStatus};

    fn pattern(kind: PatternKind, id: &str, impact: f64) -> CostPattern {
        CostPattern {
            kind,
            identifier: id.to_string(),
            order_count: 3,
            total_impact: impact,
            avg_variance: impact / 3.0,
            work_orders: vec![],
            trend_status: TrendStatus::Stable,
            baseline_comparison: None,
            cost_trend: None,
            correlations: vec![],
        }
    }

    #[test]
    fn test_pattern_insights_use_absolute_impact() {
        let report = AnalyzerReport::Cost(CostReport {
            predictions: vec![],
            patterns: vec![
                pattern(PatternKind::Material, "MAT-A", -4_000.0),
                pattern(PatternKind::Supplier, "SUP-1", 2_000.0),
            ],
            variance_threshold: 1_000.0,
            total_impact: -2_000.0,
            orders_analyzed: 10,
        });
        let insights = extract_insights(&report);
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].id, "cost_material_pattern_MAT-A");
        assert_eq!(insights[0].source, AnalyzerKind::Cost);
        assert!((insights[0].financial_impact - 4_000.0).abs() < f64::EPSILON);
        assert_eq!(insights[1].insight_type, InsightType::SupplierPattern);
        assert!(insights[1].confidence.is_none());
    }
}
