//! Time series derived from work-order records.
//!
//! Series are sorted by timestamp and restricted to `[now - window_days, now]`.
//! Records missing the measured value are skipped.

use chrono::{DateTime, Duration, Utc};

use crate::types::{present, TimeSeriesPoint, WorkOrderRecord};

/// Which per-order value a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesMetric {
    /// Actual material cost, positive values only
    MaterialCost,
    /// Actual labor hours, positive values only
    LaborHours,
    /// scrapped / produced × 100
    ScrapRatePct,
}

impl SeriesMetric {
    fn value(&self, record: &WorkOrderRecord) -> Option<f64> {
        match self {
            SeriesMetric::MaterialCost => record.actual_material_cost.filter(|v| *v > 0.0),
            SeriesMetric::LaborHours => record.actual_labor_hours.filter(|v| *v > 0.0),
            SeriesMetric::ScrapRatePct => record.scrap_rate_pct(),
        }
    }
}

/// Records inside the trailing window, sorted by timestamp.
pub fn window_records<'a, F>(
    records: &'a [WorkOrderRecord],
    window_days: i64,
    now: DateTime<Utc>,
    filter: F,
) -> Vec<&'a WorkOrderRecord>
where
    F: Fn(&WorkOrderRecord) -> bool,
{
    let cutoff = now - Duration::days(window_days);
    let mut out: Vec<&WorkOrderRecord> = records
        .iter()
        .filter(|r| r.timestamp >= cutoff && r.timestamp <= now && filter(r))
        .collect();
    out.sort_by_key(|r| r.timestamp);
    out
}

/// Build a series of `metric` over the records selected by `filter`.
pub fn build_series<F>(
    records: &[WorkOrderRecord],
    metric: SeriesMetric,
    window_days: i64,
    now: DateTime<Utc>,
    filter: F,
) -> Vec<TimeSeriesPoint>
where
    F: Fn(&WorkOrderRecord) -> bool,
{
    window_records(records, window_days, now, filter)
        .into_iter()
        .filter_map(|r| {
            metric.value(r).map(|value| TimeSeriesPoint {
                timestamp: r.timestamp,
                value,
                supplier_id: present(&r.supplier_id).map(str::to_string),
                equipment_id: present(&r.equipment_id).map(str::to_string),
            })
        })
        .collect()
}

/// Predicate matching records whose `material_code` equals `code`.
pub fn for_material(code: &str) -> impl Fn(&WorkOrderRecord) -> bool + '_ {
    move |r| present(&r.material_code) == Some(code)
}

/// Predicate matching records whose `equipment_id` equals `id`.
pub fn for_equipment(id: &str) -> impl Fn(&WorkOrderRecord) -> bool + '_ {
    move |r| present(&r.equipment_id) == Some(id)
}

/// Predicate matching records whose `supplier_id` equals `id`.
pub fn for_supplier(id: &str) -> impl Fn(&WorkOrderRecord) -> bool + '_ {
    move |r| present(&r.supplier_id) == Some(id)
}
