//! Per-analyzer result items.
//!
//! These are what the domain analyzers emit and what an [`super::Insight`]
//! carries as its payload.

use serde::{Deserialize, Serialize};

use super::{Correlation, CostTrend, DegradationEvent, QualityDrift};

/// Risk band of a single work-order cost prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Direction of a pattern's underlying trend.
///
/// Ordered by severity so that `max` aggregates a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStatus {
    #[default]
    Stable,
    Decelerating,
    Accelerating,
}

impl std::fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendStatus::Stable => write!(f, "STABLE"),
            TrendStatus::Decelerating => write!(f, "DECELERATING"),
            TrendStatus::Accelerating => write!(f, "ACCELERATING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Material,
    Supplier,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Material => "material",
            PatternKind::Supplier => "supplier",
        }
    }
}

// ============================================================================
// Cost
// ============================================================================

/// How one order's variance compares with orders of the same type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceContext {
    pub work_order_type: String,
    pub similar_orders: usize,
    pub material: String,
    pub labor: String,
}

/// A work order whose total variance exceeded the significance threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPrediction {
    pub work_order_id: String,
    pub material_code: Option<String>,
    pub supplier_id: Option<String>,
    /// Planned material cost plus planned labor cost
    pub planned_total: f64,
    pub material_variance: f64,
    pub labor_variance_cost: f64,
    pub labor_variance_hours: f64,
    pub total_variance: f64,
    /// Share of the variance from material; 50/50 when the total is zero
    pub material_pct: f64,
    pub labor_pct: f64,
    pub risk_level: RiskLevel,
    /// 0-1
    pub confidence: f64,
    pub context: Option<VarianceContext>,
}

/// Repeated significant variance on one material or supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostPattern {
    pub kind: PatternKind,
    pub identifier: String,
    pub order_count: usize,
    /// Signed sum of total variances
    pub total_impact: f64,
    pub avg_variance: f64,
    pub work_orders: Vec<String>,
    pub trend_status: TrendStatus,
    /// "X is $a vs your typical $b ..." when a baseline exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_comparison: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_trend: Option<CostTrend>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlations: Vec<Correlation>,
}

// ============================================================================
// Equipment
// ============================================================================

/// Failure risk for one machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRisk {
    pub equipment_id: String,
    /// 0-1
    pub failure_probability: f64,
    pub estimated_cost: f64,
    pub order_count: usize,
    pub avg_labor_variance_hours: f64,
    pub labor_overrun_cost: f64,
    pub scrap_units: u64,
    pub scrap_cost: f64,
    pub material_waste: f64,
    pub quality_issue_count: usize,
    pub drivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation: Option<DegradationEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlations: Vec<Correlation>,
}

/// A machine with repeated quality issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentQualityPattern {
    pub equipment_id: String,
    pub quality_issue_count: usize,
    pub order_count: usize,
    pub issue_rate_pct: f64,
    pub scrap_units: u64,
    pub estimated_impact: f64,
    pub work_orders: Vec<String>,
}

// ============================================================================
// Quality
// ============================================================================

/// Scrap, rework and waste cost for one material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub material_code: String,
    /// Scrapped over produced units, as a fraction
    pub scrap_rate: f64,
    pub scrap_per_order: f64,
    pub issue_rate_pct: f64,
    pub scrap_cost: f64,
    pub rework_hours: f64,
    pub rework_cost: f64,
    pub material_waste: f64,
    pub estimated_cost: f64,
    pub order_count: usize,
    pub drivers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift: Option<QualityDrift>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlations: Vec<Correlation>,
}

/// A material with repeated quality issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialQualityPattern {
    pub material_code: String,
    pub defect_count: usize,
    pub order_count: usize,
    pub defect_rate_pct: f64,
    pub scrap_units: u64,
    pub estimated_impact: f64,
    pub work_orders: Vec<String>,
}

// ============================================================================
// Efficiency
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsBreakdown {
    pub labor: f64,
    pub material: f64,
    pub quality: f64,
}

impl SavingsBreakdown {
    pub fn total(&self) -> f64 {
        self.labor + self.material + self.quality
    }
}

/// An operation type running below plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyOpportunity {
    pub operation_type: String,
    pub order_count: usize,
    pub efficiency_score: f64,
    pub labor_efficiency_pct: f64,
    pub cost_efficiency_pct: f64,
    /// Standard deviation of labor-hour variance
    pub consistency: f64,
    pub potential_savings: f64,
    pub savings: SavingsBreakdown,
    pub drivers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_status_severity_order() {
        let statuses = [TrendStatus::Stable, TrendStatus::Accelerating, TrendStatus::Decelerating];
        assert_eq!(statuses.iter().max(), Some(&TrendStatus::Accelerating));
        assert!(TrendStatus::Decelerating > TrendStatus::Stable);
    }

    #[test]
    fn test_trend_status_wire_format() {
        let json = serde_json::to_string(&TrendStatus::Accelerating).unwrap();
        assert_eq!(json, "\"ACCELERATING\"");
    }

    #[test]
    fn test_savings_total() {
        let s = SavingsBreakdown {
            labor: 1000.0,
            material: 250.0,
            quality: 375.0,
        };
        assert!((s.total() - 1625.0).abs() < f64::EPSILON);
    }
}
