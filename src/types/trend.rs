//! Trend, degradation, drift and correlation types.
//!
//! All of these are computed per run and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation in a derived time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<String>,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            supplier_id: None,
            equipment_id: None,
        }
    }
}

/// Early-third versus recent-third comparison of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// (recent_avg - early_avg) per data point
    pub slope: f64,
    pub early_avg: f64,
    pub recent_avg: f64,
    /// |recent - early| / early, 0 when early <= 0
    pub significance: f64,
}

impl TrendResult {
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.significance > threshold
    }
}

/// First point of a sustained divergence from baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub started_at: DateTime<Utc>,
    pub value: f64,
    pub days_ago: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Higher,
    Lower,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Higher => "higher",
            Direction::Lower => "lower",
        }
    }
}

/// Current value versus baseline average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    /// Percent difference, 1 decimal
    pub deviation_pct: f64,
    /// Absolute difference, 2 decimals
    pub deviation_abs: f64,
    /// current / baseline, 2 decimals (0 when the baseline is 0)
    pub multiplier: f64,
    pub direction: Direction,
}

/// Point where a series' moving average jumped the most.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InflectionPoint {
    pub timestamp: DateTime<Utc>,
    pub days_ago: i64,
    /// Index into the analysed series
    pub index: usize,
}

/// Sustained rise in an equipment's labor hours per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub equipment_id: String,
    pub trend: TrendResult,
    pub degradation_pct: f64,
    /// Linear projection to the failure threshold. An order-of-magnitude
    /// heuristic, not a forecast.
    pub days_to_threshold: Option<i64>,
    pub inflection: Option<InflectionPoint>,
    pub recommendation: String,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostDirection {
    Increasing,
    Decreasing,
}

/// Significant movement in a material's unit cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTrend {
    pub material_code: String,
    pub trend: TrendResult,
    pub direction: CostDirection,
    pub cost_change_pct: f64,
    pub inflection: Option<InflectionPoint>,
    pub supplier_change_hint: Option<String>,
    pub recommendation: String,
    pub data_points: usize,
}

/// Sustained rise in a material's scrap rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDrift {
    pub material_code: String,
    pub trend: TrendResult,
    /// recent - early, in percentage points
    pub drift_pct: f64,
    /// recent / early (0 when early is 0)
    pub multiplier: f64,
    pub inflection: Option<InflectionPoint>,
    pub supplier_hint: Option<String>,
    pub equipment_hint: Option<String>,
    pub recommendation: String,
    pub data_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationKind {
    SupplierChange,
    BatchChange,
    PriceJump,
    EquipmentPattern,
    UsageIntensity,
    ShiftPattern,
}

/// Ordered so that `max` picks the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Low,
    Medium,
    High,
}

/// A candidate real-world cause for a detected shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub kind: CorrelationKind,
    pub description: String,
    pub strength: CorrelationStrength,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_ago: Option<i64>,
}

/// Strongest correlation, first among equals.
pub fn primary_correlation(correlations: &[Correlation]) -> Option<&Correlation> {
    correlations
        .iter()
        .fold(None, |best: Option<&Correlation>, c| match best {
            Some(b) if b.strength >= c.strength => Some(b),
            _ => Some(c),
        })
}
