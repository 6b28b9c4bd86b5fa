//! Baseline persistence.
//!
//! Sled key format: `{facility_id}/{metric_type}/{identifier}`, JSON values.
//! One entry per natural key; writes are upserts. A facility refresh is
//! written with [`BaselineRepository::upsert_all`], which lands every row or
//! none.

use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;
use tracing::debug;

use crate::storage::StoreError;
use crate::types::{MetricBaseline, MetricType};

#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Baseline repository lock poisoned")]
    LockPoisoned,

    #[error("Record read failed: {0}")]
    Records(#[from] StoreError),
}

/// Storage for [`MetricBaseline`] rows keyed by (facility, metric, identifier).
pub trait BaselineRepository: Send + Sync {
    /// Insert or replace the row for the baseline's natural key.
    fn upsert(&self, baseline: &MetricBaseline) -> Result<(), BaselineError>;

    /// Upsert a set of rows atomically: on error nothing is written.
    fn upsert_all(&self, baselines: &[MetricBaseline]) -> Result<(), BaselineError>;

    fn get(
        &self,
        facility_id: &str,
        metric_type: MetricType,
        identifier: &str,
    ) -> Result<Option<MetricBaseline>, BaselineError>;

    /// All baselines stored for a facility.
    fn list(&self, facility_id: &str) -> Result<Vec<MetricBaseline>, BaselineError>;
}

// ============================================================================
// In-memory
// ============================================================================

type NaturalKey = (String, MetricType, String);

fn natural_key(baseline: &MetricBaseline) -> NaturalKey {
    (
        baseline.facility_id.clone(),
        baseline.metric_type,
        baseline.identifier.clone(),
    )
}

#[derive(Debug, Default)]
pub struct InMemoryBaselineRepository {
    rows: RwLock<HashMap<NaturalKey, MetricBaseline>>,
}

impl InMemoryBaselineRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BaselineRepository for InMemoryBaselineRepository {
    fn upsert(&self, baseline: &MetricBaseline) -> Result<(), BaselineError> {
        let mut rows = self.rows.write().map_err(|_| BaselineError::LockPoisoned)?;
        rows.insert(natural_key(baseline), baseline.clone());
        Ok(())
    }

    fn upsert_all(&self, baselines: &[MetricBaseline]) -> Result<(), BaselineError> {
        let mut rows = self.rows.write().map_err(|_| BaselineError::LockPoisoned)?;
        rows.extend(baselines.iter().map(|b| (natural_key(b), b.clone())));
        Ok(())
    }

    fn get(
        &self,
        facility_id: &str,
        metric_type: MetricType,
        identifier: &str,
    ) -> Result<Option<MetricBaseline>, BaselineError> {
        let rows = self.rows.read().map_err(|_| BaselineError::LockPoisoned)?;
        Ok(rows
            .get(&(facility_id.to_string(), metric_type, identifier.to_string()))
            .cloned())
    }

    fn list(&self, facility_id: &str) -> Result<Vec<MetricBaseline>, BaselineError> {
        let rows = self.rows.read().map_err(|_| BaselineError::LockPoisoned)?;
        let mut out: Vec<MetricBaseline> = rows
            .values()
            .filter(|b| b.facility_id == facility_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.metric_type
                .cmp(&b.metric_type)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        Ok(out)
    }
}

// ============================================================================
// Sled
// ============================================================================

/// Baselines persisted in a Sled embedded database.
pub struct SledBaselineRepository {
    db: Db,
}

impl SledBaselineRepository {
    /// Open or create the baseline database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, BaselineError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_temp() -> Result<Self, BaselineError> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Ok(Self { db })
    }

    fn build_key(facility_id: &str, metric_type: MetricType, identifier: &str) -> String {
        format!("{}/{}/{}", facility_id, metric_type.as_str(), identifier)
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), BaselineError> {
        self.db.flush()?;
        Ok(())
    }
}

impl BaselineRepository for SledBaselineRepository {
    fn upsert(&self, baseline: &MetricBaseline) -> Result<(), BaselineError> {
        let key = Self::build_key(
            &baseline.facility_id,
            baseline.metric_type,
            &baseline.identifier,
        );
        let value = serde_json::to_vec(baseline)?;
        self.db.insert(key.as_bytes(), value)?;
        debug!(key = %key, samples = baseline.sample_count, "Stored baseline");
        Ok(())
    }

    fn upsert_all(&self, baselines: &[MetricBaseline]) -> Result<(), BaselineError> {
        let mut batch = sled::Batch::default();
        for baseline in baselines {
            let key = Self::build_key(
                &baseline.facility_id,
                baseline.metric_type,
                &baseline.identifier,
            );
            batch.insert(key.as_bytes(), serde_json::to_vec(baseline)?);
        }
        self.db.apply_batch(batch)?;
        debug!(rows = baselines.len(), "Stored baseline batch");
        Ok(())
    }

    fn get(
        &self,
        facility_id: &str,
        metric_type: MetricType,
        identifier: &str,
    ) -> Result<Option<MetricBaseline>, BaselineError> {
        let key = Self::build_key(facility_id, metric_type, identifier);
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list(&self, facility_id: &str) -> Result<Vec<MetricBaseline>, BaselineError> {
        let prefix = format!("{facility_id}/");
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            out.push(serde_json::from_slice::<MetricBaseline>(&value)?);
        }
        Ok(out)
    }
}
