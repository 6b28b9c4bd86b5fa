//! Rolling Baselines - per-facility statistics over the trailing window
//!
//! Each refresh reads the facility's records from the last `window_days`,
//! groups them by dimension and replaces one [`MetricBaseline`] per group,
//! writing the whole refresh as a single batch:
//!
//! | metric                 | value                         | grouped by      |
//! |------------------------|-------------------------------|-----------------|
//! | `material_cost`        | actual material cost          | material code   |
//! | `labor_hours`          | actual labor hours            | operation type  |
//! | `scrap_rate`           | scrapped / produced × 100     | material code   |
//! | `equipment_cycle_time` | actual labor hours            | equipment id    |
//!
//! Refreshes for one facility are serialized; different facilities proceed
//! independently. Failures are logged and reported as "nothing updated",
//! never propagated, since baselines only enrich narratives.

mod repository;

pub use repository::*;

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::analytics::stats;
use crate::config::defaults::GENERAL_OPERATION;
use crate::config::BaselineConfig;
use crate::storage::{RecordQuery, RecordStore};
use crate::types::{present, MetricBaseline, MetricType, WorkOrderRecord};

// ============================================================================
// Pure computation
// ============================================================================

/// Compute one baseline per (metric, identifier) group with at least one value.
///
/// Missing values are skipped; zeros are real samples.
pub fn compute_baselines(
    facility_id: &str,
    records: &[WorkOrderRecord],
    now: DateTime<Utc>,
) -> Vec<MetricBaseline> {
    let mut groups: BTreeMap<(MetricType, String), Vec<f64>> = BTreeMap::new();
    let mut push = |metric: MetricType, id: &str, value: f64| {
        groups.entry((metric, id.to_string())).or_default().push(value);
    };

    for r in records {
        if let (Some(material), Some(cost)) = (present(&r.material_code), r.actual_material_cost) {
            push(MetricType::MaterialCost, material, cost);
        }
        if let Some(hours) = r.actual_labor_hours {
            let op = present(&r.operation_type).unwrap_or(GENERAL_OPERATION);
            push(MetricType::LaborHours, op, hours);
        }
        if let (Some(material), Some(rate)) = (present(&r.material_code), r.scrap_rate_pct()) {
            push(MetricType::ScrapRate, material, rate);
        }
        if let (Some(equipment), Some(hours)) = (present(&r.equipment_id), r.actual_labor_hours) {
            push(MetricType::EquipmentCycleTime, equipment, hours);
        }
    }

    groups
        .into_iter()
        .map(|((metric_type, identifier), values)| MetricBaseline {
            facility_id: facility_id.to_string(),
            metric_type,
            identifier,
            rolling_avg: stats::mean(&values),
            rolling_std: stats::population_std(&values),
            sample_count: values.len(),
            last_updated: now,
        })
        .collect()
}

// ============================================================================
// Snapshot
// ============================================================================

/// Read-only view of a facility's baselines, handed to analyzers.
#[derive(Debug, Clone, Default)]
pub struct BaselineSnapshot {
    rows: HashMap<(MetricType, String), MetricBaseline>,
}

impl BaselineSnapshot {
    pub fn from_rows(rows: impl IntoIterator<Item = MetricBaseline>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|b| ((b.metric_type, b.identifier.clone()), b))
                .collect(),
        }
    }

    pub fn get(&self, metric_type: MetricType, identifier: &str) -> Option<&MetricBaseline> {
        self.rows.get(&(metric_type, identifier.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Store
// ============================================================================

/// Maintains rolling baselines for every facility.
pub struct BaselineStore {
    records: Arc<dyn RecordStore>,
    repository: Arc<dyn BaselineRepository>,
    config: BaselineConfig,
    facility_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl BaselineStore {
    pub fn new(
        records: Arc<dyn RecordStore>,
        repository: Arc<dyn BaselineRepository>,
        config: BaselineConfig,
    ) -> Self {
        Self {
            records,
            repository,
            config,
            facility_locks: Mutex::new(HashMap::new()),
        }
    }

    fn facility_lock(&self, facility_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        match self.facility_locks.lock() {
            Ok(mut locks) => locks.entry(facility_id.to_string()).or_default().clone(),
            // A poisoned map still holds valid locks
            Err(poisoned) => poisoned
                .into_inner()
                .entry(facility_id.to_string())
                .or_default()
                .clone(),
        }
    }

    /// Refresh all baselines for a facility from the trailing window ending at `now`.
    ///
    /// Returns the number of baselines written per metric type; empty on any
    /// read or write failure.
    pub async fn update_baselines(
        &self,
        facility_id: &str,
        now: DateTime<Utc>,
    ) -> HashMap<MetricType, usize> {
        let lock = self.facility_lock(facility_id);
        let _guard = lock.lock().await;

        match self.refresh(facility_id, now).await {
            Ok(counts) => counts,
            Err(e) => {
                error!(facility_id = %facility_id, error = %e, "Baseline update failed");
                HashMap::new()
            }
        }
    }

    async fn refresh(
        &self,
        facility_id: &str,
        now: DateTime<Utc>,
    ) -> Result<HashMap<MetricType, usize>, BaselineError> {
        let query = RecordQuery {
            since: Some(now - Duration::days(self.config.window_days)),
            ..RecordQuery::facility(facility_id)
        };
        let records = self.records.query(&query).await?;

        let baselines = compute_baselines(facility_id, &records, now);
        self.repository.upsert_all(&baselines)?;

        let mut counts = HashMap::new();
        for baseline in &baselines {
            *counts.entry(baseline.metric_type).or_insert(0) += 1;
        }

        info!(
            facility_id = %facility_id,
            records = records.len(),
            baselines = counts.values().sum::<usize>(),
            "Baselines refreshed"
        );
        Ok(counts)
    }

    /// Look up one baseline. Absence and read errors both yield `None`.
    pub fn get_baseline(
        &self,
        facility_id: &str,
        metric_type: MetricType,
        identifier: &str,
    ) -> Option<MetricBaseline> {
        match self.repository.get(facility_id, metric_type, identifier) {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    facility_id = %facility_id,
                    metric = %metric_type,
                    identifier = %identifier,
                    error = %e,
                    "Baseline read failed"
                );
                None
            }
        }
    }

    /// All of a facility's baselines; empty on read failure.
    pub fn snapshot(&self, facility_id: &str) -> BaselineSnapshot {
        match self.repository.list(facility_id) {
            Ok(rows) => BaselineSnapshot::from_rows(rows),
            Err(e) => {
                warn!(facility_id = %facility_id, error = %e, "Baseline snapshot unavailable");
                BaselineSnapshot::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
