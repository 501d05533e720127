//! JSON file stores
//!
//! Each store keeps an in-memory copy behind a mutex and rewrites its file
//! after every write. Good for a single agent process; concurrent writers
//! on the same file are not supported.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{newest_first, CacheEntry, CacheStore, ResultLog, StoreError};
use crate::result::ResultRecord;
use crate::status::SensorStatus;

/// Reads `path`, writing `empty` first when the file does not exist yet.
fn load_or_init<T: DeserializeOwned>(path: &Path, empty: &str) -> Result<T, StoreError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, empty)?;
    }
    let content = fs::read_to_string(path)?;
    let content = if content.trim().is_empty() { empty } else { content.as_str() };
    Ok(serde_json::from_str(content)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

pub struct JsonFileCacheStore {
    storage_path: PathBuf,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl JsonFileCacheStore {
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let entries: HashMap<String, CacheEntry> = load_or_init(&storage_path, "{}")?;
        debug!("cache store opened at {:?} ({} entries)", storage_path, entries.len());
        Ok(Self {
            storage_path,
            entries: Mutex::new(entries),
        })
    }

    /// Drops entries that expired at `now`, returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(now));
        let removed = before - entries.len();
        if removed > 0 {
            write_json(&self.storage_path, &*entries)?;
        }
        Ok(removed)
    }
}

impl CacheStore for JsonFileCacheStore {
    fn get_multiple(&self, ids: &[String]) -> Result<HashMap<String, CacheEntry>, StoreError> {
        let entries = self.entries.lock();
        Ok(ids
            .iter()
            .filter_map(|id| entries.get(id).map(|e| (id.clone(), e.clone())))
            .collect())
    }

    fn set(&self, id: &str, data: serde_json::Value, expire_at: i64) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        entries.insert(
            id.to_string(),
            CacheEntry {
                data,
                expire: expire_at,
            },
        );
        write_json(&self.storage_path, &*entries)
    }
}

pub struct JsonFileResultLog {
    storage_path: PathBuf,
    records: Mutex<Vec<ResultRecord>>,
    /// Keep at most this many records, oldest dropped first.
    retention: Option<usize>,
}

impl JsonFileResultLog {
    pub fn open<P: Into<PathBuf>>(storage_path: P) -> Result<Self, StoreError> {
        let storage_path = storage_path.into();
        let records: Vec<ResultRecord> = load_or_init(&storage_path, "[]")?;
        debug!("result log opened at {:?} ({} records)", storage_path, records.len());
        Ok(Self {
            storage_path,
            records: Mutex::new(records),
            retention: None,
        })
    }

    pub fn with_retention(mut self, max_records: usize) -> Self {
        self.retention = Some(max_records);
        self
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl ResultLog for JsonFileResultLog {
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
        let mut records = self.records.lock();
        records.push(record.clone());
        if let Some(max) = self.retention {
            if records.len() > max {
                let excess = records.len() - max;
                records.drain(..excess);
            }
        }
        write_json(&self.storage_path, &*records)
    }

    fn history(&self, sensor_name: &str, limit: usize) -> Result<Vec<ResultRecord>, StoreError> {
        Ok(newest_first(&self.records.lock(), sensor_name, limit))
    }
}
