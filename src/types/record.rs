//! Work-order records as supplied by the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::defaults::UNKNOWN_OPERATION;

/// One manufacturing work order.
///
/// Every measurement is optional: ingestion maps whatever columns a facility
/// exports, and detectors that need a missing field simply skip the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderRecord {
    /// Work order number, e.g. `WO-PROD-2004`
    pub work_order_id: String,
    pub facility_id: String,
    /// Upload batch the record arrived in
    #[serde(default)]
    pub upload_batch_id: Option<String>,
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub planned_material_cost: Option<f64>,
    #[serde(default)]
    pub actual_material_cost: Option<f64>,
    #[serde(default)]
    pub planned_labor_hours: Option<f64>,
    #[serde(default)]
    pub actual_labor_hours: Option<f64>,
    #[serde(default)]
    pub units_produced: Option<u32>,
    #[serde(default)]
    pub units_scrapped: Option<u32>,

    #[serde(default)]
    pub material_code: Option<String>,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub equipment_id: Option<String>,
    #[serde(default)]
    pub shift_id: Option<String>,
    #[serde(default)]
    pub operation_type: Option<String>,
    /// Material lot / batch number
    #[serde(default)]
    pub material_lot: Option<String>,
    #[serde(default)]
    pub quality_issue: bool,
}

impl WorkOrderRecord {
    /// Minimal record; tests and loaders fill in the rest with struct update syntax.
    pub fn new(
        work_order_id: impl Into<String>,
        facility_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            work_order_id: work_order_id.into(),
            facility_id: facility_id.into(),
            upload_batch_id: None,
            timestamp,
            planned_material_cost: None,
            actual_material_cost: None,
            planned_labor_hours: None,
            actual_labor_hours: None,
            units_produced: None,
            units_scrapped: None,
            material_code: None,
            supplier_id: None,
            equipment_id: None,
            shift_id: None,
            operation_type: None,
            material_lot: None,
            quality_issue: false,
        }
    }

    /// Scrap rate in percent; `None` unless units were produced.
    pub fn scrap_rate_pct(&self) -> Option<f64> {
        match (self.units_produced, self.units_scrapped) {
            (Some(produced), Some(scrapped)) if produced > 0 => {
                Some(f64::from(scrapped) / f64::from(produced) * 100.0)
            }
            _ => None,
        }
    }

    /// Actual minus planned material cost (missing values count as zero).
    pub fn material_variance(&self) -> f64 {
        self.actual_material_cost.unwrap_or(0.0) - self.planned_material_cost.unwrap_or(0.0)
    }

    /// Actual minus planned labor hours (missing values count as zero).
    pub fn labor_variance_hours(&self) -> f64 {
        self.actual_labor_hours.unwrap_or(0.0) - self.planned_labor_hours.unwrap_or(0.0)
    }

    /// Scrapped units, widened so batch totals cannot overflow.
    pub fn scrapped(&self) -> u64 {
        u64::from(self.units_scrapped.unwrap_or(0))
    }

    pub fn produced(&self) -> u64 {
        u64::from(self.units_produced.unwrap_or(0))
    }

    /// Type segment of the work order number (`WO-PROD-2004` -> `PROD`).
    pub fn work_order_type(&self) -> &str {
        self.work_order_id
            .split('-')
            .nth(1)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_OPERATION)
    }
}

/// Non-empty, trimmed value of an optional identifier column.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
