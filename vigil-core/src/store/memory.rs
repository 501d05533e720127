//! In-memory stores, for agents running without a data directory and for tests

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{newest_first, CacheEntry, CacheStore, ResultLog, StoreError};
use crate::result::ResultRecord;
use crate::status::SensorStatus;

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<CacheEntry> {
        self.entries.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get_multiple(&self, ids: &[String]) -> Result<HashMap<String, CacheEntry>, StoreError> {
        let entries = self.entries.lock();
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    fn set(&self, id: &str, data: serde_json::Value, expire_at: i64) -> Result<(), StoreError> {
        self.entries.lock().insert(
            id.to_string(),
            CacheEntry {
                data,
                expire: expire_at,
            },
        );
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryResultLog {
    records: Mutex<Vec<ResultRecord>>,
}

impl MemoryResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().clone()
    }
}

impl ResultLog for MemoryResultLog {
    fn last_status(&self, sensor_name: &str) -> Result<Option<SensorStatus>, StoreError> {
        Ok(self
            .records
            .lock()
            .iter()
            .rev()
            .find(|r| r.sensor_name == sensor_name)
            .map(|r| r.status))
    }

    fn save(&self, record: &ResultRecord) -> Result<(), StoreError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn history(&self, sensor_name: &str, limit: usize) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(newest_first(&self.records.lock(), sensor_name, limit))
    }
}
