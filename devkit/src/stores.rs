/*!
Recording stores

In-memory cache and result log that count calls and fail on demand, to
drive the runner through store outages.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use vigil_core::store::MemoryCacheStore;
use vigil_core::{CacheEntry, CacheStore, ResultLog, ResultRecord, SensorStatus, StoreError};

#[derive(Default)]
pub struct MockCacheStore {
    inner: MemoryCacheStore,
    lookups: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_multiple` calls, failed ones included.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn entry(&self, id: &str) -> Option<CacheEntry> {
        self.inner.get(id)
    }

    /// Stores `data` as is, bypassing the counters.
    pub fn insert_raw(&self, id: &str, data: serde_json::Value, expire_at: i64) {
        self.inner
            .set(id, data, expire_at)
            .expect("memory cache set");
    }
}

impl CacheStore for MockCacheStore {
    fn get_multiple(&self, ids: &[String]) -> Result<HashMap<String, CacheEntry>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cache read refused".into()));
        }
        self.inner.get_multiple(ids)
    }

    fn set(&self, id: &str, data: serde_json::Value, expire_at: i64) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("cache write refused".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(id, data, expire_at)
    }
}

#[derive(Default)]
pub struct RecordingResultLog {
    records: Mutex<Vec<ResultRecord>>,
    lookups: AtomicUsize,
    fail_saves: AtomicBool,
    fail_lookups: AtomicBool,
}

impl RecordingResultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a prior record, as if saved by an earlier run.
    pub fn seed(&self, record: ResultRecord) {
        self.records.lock().push(record);
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().clone()
    }

    pub fn saved_for(&self, sensor_name: &str) -> Vec<ResultRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.sensor_name == sensor_name)
            .cloned()
            .collect()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

impl ResultLog for RecordingResultLog {
    fn last_status(&self, sensor_name: &str) -> Result<Option<SensorStatus>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("result log read refused".into()));
        }
        Ok(self
            .records
            .lock()
            .iter()
            .rev()
            .find(|r| r.sensor_name == sensor_name)
            .map(|r| r.status))
    }

    fn save(&self, record: &ResultRecord) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("result log write refused".into()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn history(&self, sensor_name: &str, limit: usize) -> Result<Vec<ResultRecord>, StoreError> {
        let mut records = self.saved_for(sensor_name);
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordBuilder;

    #[test]
    fn test_cache_failures_on_demand() {
        let cache = MockCacheStore::new();
        cache.set("a", serde_json::json!(1), 10).unwrap();
        cache.fail_reads(true);
        assert!(cache.get_multiple(&["a".to_string()]).is_err());
        cache.fail_reads(false);
        assert_eq!(cache.get_multiple(&["a".to_string()]).unwrap().len(), 1);
        assert_eq!(cache.lookups(), 2);
        assert_eq!(cache.writes(), 1);
    }

    #[test]
    fn test_result_log_seed_and_fail() {
        let log = RecordingResultLog::new();
        log.seed(RecordBuilder::new("disk").status(SensorStatus::Warning).build());
        assert_eq!(log.last_status("disk").unwrap(), Some(SensorStatus::Warning));

        log.fail_saves(true);
        assert!(log.save(&RecordBuilder::new("disk").build()).is_err());
        assert_eq!(log.records().len(), 1);
    }
}
