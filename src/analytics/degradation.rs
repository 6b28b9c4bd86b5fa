//! Degradation & Drift Detection
//!
//! A coarse two-segment fit: the mean of the first third of a series is
//! compared with the mean of the last third. The move is significant when
//! `|recent - early| / early` exceeds `significance_threshold`.
//!
//! Three specialisations share the fit:
//!
//! - equipment degradation: labor hours per order rising on one machine
//! - cost trend: a material's unit cost moving in either direction
//! - quality drift: a material's scrap rate rising
//!
//! Each needs at least `min_points` observations inside the trailing
//! window; shorter series report nothing.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::analytics::series::{self, SeriesMetric};
use crate::analytics::stats::{mean, round_to};
use crate::config::TrendConfig;
use crate::types::{
    CostDirection, CostTrend, DegradationEvent, InflectionPoint, QualityDrift, TimeSeriesPoint,
    TrendResult, WorkOrderRecord,
};

const SUPPLIER_CHANGE_HINT: &str = "Supplier changed during this period";
const MULTI_EQUIPMENT_HINT: &str = "Multiple equipment used - check for equipment-specific patterns";

/// Early-third versus recent-third fit. `None` for fewer than two values.
pub fn calculate_trend(values: &[f64]) -> Option<TrendResult> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let third = (n / 3).max(1);
    let early_avg = mean(&values[..third]);
    let recent_avg = mean(&values[n - third..]);
    let slope = (recent_avg - early_avg) / n as f64;
    let significance = if early_avg > 0.0 {
        (recent_avg - early_avg).abs() / early_avg
    } else {
        0.0
    };

    Some(TrendResult {
        slope,
        early_avg,
        recent_avg,
        significance,
    })
}

/// Stateless detector over a window of records.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    config: TrendConfig,
}

impl DriftDetector {
    pub fn new(config: TrendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Point after the largest jump between consecutive moving averages.
    ///
    /// A flat series reports its first point.
    pub fn find_inflection(
        &self,
        series: &[TimeSeriesPoint],
        now: DateTime<Utc>,
    ) -> Option<InflectionPoint> {
        let window = self.config.inflection_window.max(1);
        if series.len() < 3 || series.len() < window {
            return None;
        }

        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let moving: Vec<f64> = values.windows(window).map(mean).collect();

        let mut max_change = 0.0;
        let mut index = 0;
        for i in 1..moving.len() {
            let change = (moving[i] - moving[i - 1]).abs();
            if change > max_change {
                max_change = change;
                index = i + window / 2;
            }
        }

        series.get(index).map(|p| InflectionPoint {
            timestamp: p.timestamp,
            days_ago: (now - p.timestamp).num_days(),
            index,
        })
    }

    fn fitted(&self, series: &[TimeSeriesPoint]) -> Option<TrendResult> {
        if series.len() < self.config.min_points {
            return None;
        }
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        calculate_trend(&values)
    }

    /// Rising labor hours per order on `equipment_id`.
    pub fn detect_equipment_degradation(
        &self,
        equipment_id: &str,
        records: &[WorkOrderRecord],
        now: DateTime<Utc>,
    ) -> Option<DegradationEvent> {
        let series = series::build_series(
            records,
            SeriesMetric::LaborHours,
            self.config.window_days,
            now,
            series::for_equipment(equipment_id),
        );
        let trend = self.fitted(&series)?;
        if trend.slope <= 0.0 || !trend.is_significant(self.config.significance_threshold) {
            return None;
        }

        let degradation_pct = (trend.recent_avg - trend.early_avg) / trend.early_avg * 100.0;
        let threshold = trend.early_avg * self.config.degradation_threshold_multiple;
        let remaining = threshold - trend.recent_avg;
        let days_to_threshold = (remaining > 0.0).then(|| (remaining / trend.slope) as i64);

        Some(DegradationEvent {
            equipment_id: equipment_id.to_string(),
            trend,
            degradation_pct: round_to(degradation_pct, 1),
            days_to_threshold,
            inflection: self.find_inflection(&series, now),
            recommendation: self.equipment_recommendation(degradation_pct, days_to_threshold),
            data_points: series.len(),
        })
    }

    /// Significant movement in the unit cost of `material_code`.
    pub fn detect_cost_trend(
        &self,
        material_code: &str,
        records: &[WorkOrderRecord],
        now: DateTime<Utc>,
    ) -> Option<CostTrend> {
        let series = series::build_series(
            records,
            SeriesMetric::MaterialCost,
            self.config.window_days,
            now,
            series::for_material(material_code),
        );
        let trend = self.fitted(&series)?;
        if trend.slope == 0.0 || !trend.is_significant(self.config.significance_threshold) {
            return None;
        }

        let cost_change_pct = (trend.recent_avg - trend.early_avg) / trend.early_avg * 100.0;
        let inflection = self.find_inflection(&series, now);
        let supplier_change_hint = inflection
            .as_ref()
            .and_then(|_| distinct_hint(series.iter().map(|p| &p.supplier_id), SUPPLIER_CHANGE_HINT));

        Some(CostTrend {
            material_code: material_code.to_string(),
            trend,
            direction: if trend.slope > 0.0 {
                CostDirection::Increasing
            } else {
                CostDirection::Decreasing
            },
            cost_change_pct: round_to(cost_change_pct, 1),
            recommendation: self.cost_recommendation(cost_change_pct, supplier_change_hint.is_some()),
            inflection,
            supplier_change_hint,
            data_points: series.len(),
        })
    }

    /// Rising scrap rate for `material_code`.
    pub fn detect_quality_drift(
        &self,
        material_code: &str,
        records: &[WorkOrderRecord],
        now: DateTime<Utc>,
    ) -> Option<QualityDrift> {
        let series = series::build_series(
            records,
            SeriesMetric::ScrapRatePct,
            self.config.window_days,
            now,
            series::for_material(material_code),
        );
        let trend = self.fitted(&series)?;
        if trend.slope <= 0.0 || !trend.is_significant(self.config.significance_threshold) {
            return None;
        }

        let drift_pct = trend.recent_avg - trend.early_avg;
        let multiplier = if trend.early_avg > 0.0 {
            round_to(trend.recent_avg / trend.early_avg, 2)
        } else {
            0.0
        };
        let inflection = self.find_inflection(&series, now);
        let supplier_hint = inflection
            .as_ref()
            .and_then(|_| distinct_hint(series.iter().map(|p| &p.supplier_id), SUPPLIER_CHANGE_HINT));
        let equipment_hint =
            distinct_hint(series.iter().map(|p| &p.equipment_id), MULTI_EQUIPMENT_HINT);

        Some(QualityDrift {
            material_code: material_code.to_string(),
            trend,
            drift_pct: round_to(drift_pct, 2),
            multiplier,
            recommendation: self.quality_recommendation(
                drift_pct,
                supplier_hint.is_some(),
                equipment_hint.is_some(),
            ),
            inflection,
            supplier_hint,
            equipment_hint,
            data_points: series.len(),
        })
    }

    // ========================================================================
    // Recommendations
    // ========================================================================

    fn equipment_recommendation(&self, degradation_pct: f64, days_to_threshold: Option<i64>) -> String {
        if degradation_pct > self.config.equipment_critical_pct {
            format!("Critical: Schedule immediate maintenance - performance degraded {degradation_pct:.1}%")
        } else if degradation_pct > self.config.equipment_schedule_pct {
            match days_to_threshold {
                Some(days) if days > 0 && days < self.config.schedule_horizon_days => {
                    format!("Schedule maintenance within {days} days to prevent downtime")
                }
                _ => "Schedule preventive maintenance within 2 weeks".to_string(),
            }
        } else {
            "Monitor equipment performance - early degradation detected".to_string()
        }
    }

    fn cost_recommendation(&self, cost_change_pct: f64, supplier_changed: bool) -> String {
        if supplier_changed {
            format!(
                "Investigate supplier quality or pricing - {:.1}% cost change",
                cost_change_pct.abs()
            )
        } else if cost_change_pct > self.config.cost_review_pct {
            "Request pricing review or seek alternative suppliers".to_string()
        } else if cost_change_pct > self.config.cost_monitor_pct {
            "Monitor material costs - upward trend detected".to_string()
        } else {
            "Track costs for continued trend".to_string()
        }
    }

    fn quality_recommendation(&self, drift_pct: f64, supplier_changed: bool, multi_equipment: bool) -> String {
        if supplier_changed {
            format!("Request supplier COA and quality documentation - {drift_pct:.1}% increase in scrap")
        } else if multi_equipment {
            "Inspect equipment and review process parameters".to_string()
        } else if drift_pct > self.config.quality_investigate_pp {
            "Investigate root cause - significant quality degradation detected".to_string()
        } else {
            "Monitor quality trend - early drift detected".to_string()
        }
    }
}

/// `hint` when the series carries two or more distinct identifiers.
fn distinct_hint<'a>(ids: impl Iterator<Item = &'a Option<String>>, hint: &str) -> Option<String> {
    let distinct: HashSet<&str> = ids.filter_map(|id| id.as_deref()).collect();
    (distinct.len() >= 2).then(|| hint.to_string())
}
