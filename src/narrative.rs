//! Insight narratives
//!
//! A [`NarrativeGenerator`] turns a scored insight into five short fields a
//! planner can read at a glance. [`TemplateNarrator`] fills a fixed template
//! per insight kind with the finding's own numbers. When a generator fails the
//! orchestrator substitutes [`fallback_narrative`].

use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::stats::money;
use crate::types::{
    primary_correlation, CostDirection, CostPattern, CostPrediction, EfficiencyOpportunity,
    EquipmentRisk, Insight, InsightPayload, Narrative, PriorityLevel, QualityIssue, RiskLevel,
};

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("Narrative backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cannot narrate insight {id}: {reason}")]
    InvalidInsight { id: String, reason: String },
}

/// What a generator gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct NarrativeRequest<'a> {
    pub facility_id: &'a str,
    pub insight: &'a Insight,
    /// False when this run's baseline refresh failed; baseline comparisons
    /// are then left out of the prose.
    pub baselines_fresh: bool,
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn render(&self, request: &NarrativeRequest<'_>) -> Result<Narrative, NarrativeError>;
}

/// Generic text used when no generator could describe an insight.
pub fn fallback_narrative(insight: &Insight) -> Narrative {
    Narrative {
        headline: format!("{} requires attention", insight.identifier),
        what_happening: "Analysis detected an issue".to_string(),
        why_matters: format!("Financial impact: {}", money(insight.financial_impact)),
        recommended_action: "Review and take corrective action".to_string(),
        urgency_level: "medium".to_string(),
    }
}

fn urgency_label(level: Option<PriorityLevel>) -> &'static str {
    match level {
        Some(PriorityLevel::Urgent) => "high",
        Some(PriorityLevel::Notable) | None => "medium",
        Some(PriorityLevel::Background) => "low",
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Deterministic template narrator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

#[async_trait]
impl NarrativeGenerator for TemplateNarrator {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn render(&self, request: &NarrativeRequest<'_>) -> Result<Narrative, NarrativeError> {
        let insight = request.insight;
        if !insight.financial_impact.is_finite() {
            return Err(NarrativeError::InvalidInsight {
                id: insight.id.clone(),
                reason: "financial impact is not finite".to_string(),
            });
        }

        let (headline, what_happening, why_matters, recommended_action) = match &insight.payload {
            InsightPayload::CostPrediction(p) => prediction_template(p),
            InsightPayload::CostPattern(p) => pattern_template(p, request.baselines_fresh),
            InsightPayload::EquipmentRisk(r) => equipment_template(r),
            InsightPayload::QualityIssue(q) => quality_template(q),
            InsightPayload::EfficiencyOpportunity(o) => efficiency_template(o),
        };

        Ok(Narrative {
            headline,
            what_happening,
            why_matters,
            recommended_action,
            urgency_level: urgency_label(insight.priority_level).to_string(),
        })
    }
}

fn prediction_template(p: &CostPrediction) -> (String, String, String, String) {
    let mut what = format!(
        "Material variance {} ({:.0}%), labor variance {:.1} h ({}, {:.0}%)",
        money(p.material_variance),
        p.material_pct,
        p.labor_variance_hours,
        money(p.labor_variance_cost),
        p.labor_pct
    );
    if let Some(ctx) = &p.context {
        what.push_str(&format!(
            ". Compared with {} other {} orders: material {}, labor {}",
            ctx.similar_orders, ctx.work_order_type, ctx.material, ctx.labor
        ));
    }

    let action = match p.risk_level {
        RiskLevel::Critical => "Stop and review this order's material draw and labor booking today",
        RiskLevel::High => "Review this order's costing with the cell lead this week",
        RiskLevel::Medium | RiskLevel::Low => "Check the order's actuals at the next cost review",
    };

    (
        format!("Work order {} is {} over plan", p.work_order_id, money(p.total_variance)),
        what,
        format!(
            "{} risk on a {} plan ({:.0}% confidence)",
            p.risk_level.as_str(),
            money(p.planned_total),
            p.confidence * 100.0
        ),
        action.to_string(),
    )
}

fn pattern_template(p: &CostPattern, baselines_fresh: bool) -> (String, String, String, String) {
    let subject = match p.kind {
        crate::types::PatternKind::Material => "Material",
        crate::types::PatternKind::Supplier => "Supplier",
    };

    let mut what = match (&p.baseline_comparison, baselines_fresh) {
        (Some(text), true) => text.clone(),
        _ => format!(
            "{} work orders averaged {} in variance",
            p.order_count,
            money(p.avg_variance)
        ),
    };
    if let Some(trend) = &p.cost_trend {
        let dir = match trend.direction {
            CostDirection::Increasing => "up",
            CostDirection::Decreasing => "down",
        };
        what.push_str(&format!(
            ". Unit cost {} {:.1}% over {} orders",
            dir,
            trend.cost_change_pct.abs(),
            trend.data_points
        ));
    }

    let mut why = format!(
        "{} total impact across {} work orders ({})",
        money(p.total_impact),
        p.order_count,
        p.trend_status
    );
    if let Some(c) = primary_correlation(&p.correlations) {
        why.push_str(&format!(". Likely cause: {}", c.description));
    }

    let action = p
        .cost_trend
        .as_ref()
        .map(|t| t.recommendation.clone())
        .unwrap_or_else(|| format!("Review pricing and usage for {}", p.identifier));

    (
        format!("{} {} is driving {} in cost overruns", subject, p.identifier, money(p.total_impact)),
        what,
        why,
        action,
    )
}

fn equipment_template(r: &EquipmentRisk) -> (String, String, String, String) {
    let mut what = r.drivers.join("; ");
    if let Some(d) = &r.degradation {
        if !what.is_empty() {
            what.push_str(". ");
        }
        what.push_str(&format!("Labor hours up {:.1}% over {} orders", d.degradation_pct, d.data_points));
        if let Some(days) = d.days_to_threshold {
            what.push_str(&format!(", roughly {days} days to double"));
        }
    }
    if what.is_empty() {
        what = format!("{} orders ran on this machine", r.order_count);
    }

    let mut why = format!(
        "Estimated exposure {} ({} scrap units, {} quality issues)",
        money(r.estimated_cost),
        r.scrap_units,
        r.quality_issue_count
    );
    if let Some(c) = primary_correlation(&r.correlations) {
        why.push_str(&format!(". {}", c.description));
    }

    let action = r
        .degradation
        .as_ref()
        .map(|d| d.recommendation.clone())
        .unwrap_or_else(|| format!("Schedule an inspection of {}", r.equipment_id));

    (
        format!(
            "{} failure risk at {:.0}%",
            r.equipment_id,
            r.failure_probability * 100.0
        ),
        what,
        why,
        action,
    )
}

fn quality_template(q: &QualityIssue) -> (String, String, String, String) {
    let mut what = format!(
        "Scrap rate {:.1}% with quality issues on {:.0}% of {} orders",
        q.scrap_rate * 100.0,
        q.issue_rate_pct,
        q.order_count
    );
    if let Some(d) = &q.drift {
        what.push_str(&format!(". Scrap drifted up {:.2} pp", d.drift_pct));
    }

    let mut why = format!(
        "{} in losses: scrap {}, rework {}, waste {}",
        money(q.estimated_cost),
        money(q.scrap_cost),
        money(q.rework_cost),
        money(q.material_waste)
    );
    if let Some(c) = primary_correlation(&q.correlations) {
        why.push_str(&format!(". {}", c.description));
    }

    let action = q
        .drift
        .as_ref()
        .map(|d| d.recommendation.clone())
        .unwrap_or_else(|| format!("Investigate scrap causes for {}", q.material_code));

    (
        format!("Quality losses on {}: {}", q.material_code, money(q.estimated_cost)),
        what,
        why,
        action,
    )
}

fn efficiency_template(o: &EfficiencyOpportunity) -> (String, String, String, String) {
    (
        format!(
            "{} operations running at {:.0}% efficiency",
            o.operation_type, o.efficiency_score
        ),
        o.drivers.join("; "),
        format!(
            "{} recoverable: labor {}, material {}, quality {}",
            money(o.potential_savings),
            money(o.savings.labor),
            money(o.savings.material),
            money(o.savings.quality)
        ),
        format!("Standardize {} procedures around the best-performing orders", o.operation_type),
    )
}
