//! Insights, narratives and investigations: the run's output feed.

use serde::{Deserialize, Serialize};

use super::{
    CostPattern, CostPrediction, EfficiencyOpportunity, EquipmentRisk, PatternKind, QualityIssue,
    TrendStatus,
};

/// The domain analyzers an engine run can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    Cost,
    Equipment,
    Quality,
    Efficiency,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 4] = [
        AnalyzerKind::Cost,
        AnalyzerKind::Equipment,
        AnalyzerKind::Quality,
        AnalyzerKind::Efficiency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Cost => "cost",
            AnalyzerKind::Equipment => "equipment",
            AnalyzerKind::Quality => "quality",
            AnalyzerKind::Efficiency => "efficiency",
        }
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    CostPrediction,
    MaterialPattern,
    SupplierPattern,
    EquipmentFailure,
    QualityIssue,
    EfficiencyOpportunity,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::CostPrediction => "cost_prediction",
            InsightType::MaterialPattern => "material_pattern",
            InsightType::SupplierPattern => "supplier_pattern",
            InsightType::EquipmentFailure => "equipment_failure",
            InsightType::QualityIssue => "quality_issue",
            InsightType::EfficiencyOpportunity => "efficiency_opportunity",
        }
    }

    pub fn is_cost_pattern(&self) -> bool {
        matches!(self, InsightType::MaterialPattern | InsightType::SupplierPattern)
    }
}

/// Typed finding carried by an insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightPayload {
    CostPrediction(CostPrediction),
    CostPattern(CostPattern),
    EquipmentRisk(EquipmentRisk),
    QualityIssue(QualityIssue),
    EfficiencyOpportunity(EfficiencyOpportunity),
}

impl InsightPayload {
    pub fn insight_type(&self) -> InsightType {
        match self {
            InsightPayload::CostPrediction(_) => InsightType::CostPrediction,
            InsightPayload::CostPattern(p) => match p.kind {
                PatternKind::Material => InsightType::MaterialPattern,
                PatternKind::Supplier => InsightType::SupplierPattern,
            },
            InsightPayload::EquipmentRisk(_) => InsightType::EquipmentFailure,
            InsightPayload::QualityIssue(_) => InsightType::QualityIssue,
            InsightPayload::EfficiencyOpportunity(_) => InsightType::EfficiencyOpportunity,
        }
    }

    /// Identifier of the thing the finding is about.
    pub fn identifier(&self) -> &str {
        match self {
            InsightPayload::CostPrediction(p) => &p.work_order_id,
            InsightPayload::CostPattern(p) => &p.identifier,
            InsightPayload::EquipmentRisk(r) => &r.equipment_id,
            InsightPayload::QualityIssue(q) => &q.material_code,
            InsightPayload::EfficiencyOpportunity(o) => &o.operation_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Urgent,
    Notable,
    Background,
}

impl PriorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLevel::Urgent => "urgent",
            PriorityLevel::Notable => "notable",
            PriorityLevel::Background => "background",
        }
    }
}

/// Sub-scores, each clamped to [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub financial: f64,
    pub deviation: f64,
    pub urgency: f64,
    pub confidence: f64,
}

/// Human-readable explanation of an insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub headline: String,
    pub what_happening: String,
    pub why_matters: String,
    pub recommended_action: String,
    pub urgency_level: String,
}

/// One finding in the prioritized feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// `{source}_{type}_{identifier}`, stable across runs
    pub id: String,
    pub source: AnalyzerKind,
    pub insight_type: InsightType,
    pub identifier: String,
    pub payload: InsightPayload,
    /// Non-negative dollars
    pub financial_impact: f64,
    /// Analyzer-reported confidence (0-1), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub scores: ScoreBreakdown,
    pub priority_score: f64,
    /// Assigned by tiering, after scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_level: Option<PriorityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<Narrative>,
}

impl Insight {
    pub fn make_id(source: AnalyzerKind, insight_type: InsightType, identifier: &str) -> String {
        format!("{}_{}_{}", source.as_str(), insight_type.as_str(), identifier)
    }

    pub fn trend_status(&self) -> TrendStatus {
        match &self.payload {
            InsightPayload::CostPattern(p) => p.trend_status,
            _ => TrendStatus::Stable,
        }
    }
}

/// Several insights that point at the same underlying problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investigation {
    pub id: String,
    pub title: String,
    pub insight_ids: Vec<String>,
    pub identifiers: Vec<String>,
    pub total_impact: f64,
    pub trend_status: TrendStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_id_format() {
        let id = Insight::make_id(AnalyzerKind::Cost, InsightType::MaterialPattern, "MAT-A");
        assert_eq!(id, "cost_material_pattern_MAT-A");
    }

    #[test]
    fn test_cost_pattern_types() {
        assert!(InsightType::MaterialPattern.is_cost_pattern());
        assert!(InsightType::SupplierPattern.is_cost_pattern());
        assert!(!InsightType::CostPrediction.is_cost_pattern());
    }
}
