use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::types::WorkOrderRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Record file I/O error ({0}): {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Record file parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Filter for a record-store read.
///
/// All set fields must match. `since` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub facility_id: String,
    pub upload_batch_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub material_code: Option<String>,
    pub supplier_id: Option<String>,
    pub equipment_id: Option<String>,
}

impl RecordQuery {
    pub fn facility(facility_id: impl Into<String>) -> Self {
        Self {
            facility_id: facility_id.into(),
            ..Self::default()
        }
    }

    pub fn batch(mut self, batch_id: impl Into<String>) -> Self {
        self.upload_batch_id = Some(batch_id.into());
        self
    }

    pub fn between(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn material(mut self, material_code: impl Into<String>) -> Self {
        self.material_code = Some(material_code.into());
        self
    }

    pub fn equipment(mut self, equipment_id: impl Into<String>) -> Self {
        self.equipment_id = Some(equipment_id.into());
        self
    }

    pub fn matches(&self, record: &WorkOrderRecord) -> bool {
        fn eq(filter: &Option<String>, value: &Option<String>) -> bool {
            filter.as_ref().map_or(true, |f| value.as_ref() == Some(f))
        }

        record.facility_id == self.facility_id
            && eq(&self.upload_batch_id, &record.upload_batch_id)
            && self.since.map_or(true, |s| record.timestamp >= s)
            && self.until.map_or(true, |u| record.timestamp < u)
            && eq(&self.material_code, &record.material_code)
            && eq(&self.supplier_id, &record.supplier_id)
            && eq(&self.equipment_id, &record.equipment_id)
    }
}

/// Source of normalized work-order records.
///
/// Implementations return matches ordered by timestamp, oldest first.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<WorkOrderRecord>, StoreError>;
}

/// Record store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<Vec<WorkOrderRecord>>,
}

impl InMemoryRecordStore {
    pub fn new(records: Vec<WorkOrderRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load a JSON array of records.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
        let records: Vec<WorkOrderRecord> = serde_json::from_str(&contents)?;
        info!(path = %path.display(), count = records.len(), "Loaded work-order records");
        Ok(Self::new(records))
    }

    pub fn insert(&self, batch: impl IntoIterator<Item = WorkOrderRecord>) -> Result<(), StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))?;
        records.extend(batch);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn query(&self, query: &RecordQuery) -> Result<Vec<WorkOrderRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("record lock poisoned".to_string()))?;
        let mut matches: Vec<WorkOrderRecord> =
            records.iter().filter(|r| query.matches(r)).cloned().collect();
        matches.sort_by_key(|r| r.timestamp);
        debug!(facility_id = %query.facility_id, matched = matches.len(), "Record query");
        Ok(matches)
    }
}
