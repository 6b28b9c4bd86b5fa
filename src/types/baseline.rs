//! Rolling per-facility baselines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric families tracked by the baseline store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Actual material cost, keyed by material code
    MaterialCost,
    /// Actual labor hours, keyed by operation type
    LaborHours,
    /// Scrap rate in percent, keyed by material code
    ScrapRate,
    /// Actual labor hours, keyed by equipment id
    EquipmentCycleTime,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::MaterialCost,
        MetricType::LaborHours,
        MetricType::ScrapRate,
        MetricType::EquipmentCycleTime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::MaterialCost => "material_cost",
            MetricType::LaborHours => "labor_hours",
            MetricType::ScrapRate => "scrap_rate",
            MetricType::EquipmentCycleTime => "equipment_cycle_time",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolling statistics for one (facility, metric, identifier).
///
/// `sample_count >= 1` whenever stored; `rolling_std >= 0` always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBaseline {
    pub facility_id: String,
    pub metric_type: MetricType,
    pub identifier: String,
    pub rolling_avg: f64,
    /// Population standard deviation (0 for a single sample)
    pub rolling_std: f64,
    pub sample_count: usize,
    pub last_updated: DateTime<Utc>,
}
