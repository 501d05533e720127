//! Storage collaborators of the runner
//!
//! - `CacheStore`: short-lived result cache with absolute expiry
//! - `ResultLog`: historical results, queried for the last known status
//!
//! Both come with an in-memory implementation and a JSON file one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::result::ResultRecord;
use crate::status::SensorStatus;

pub mod file;
pub mod memory;

pub use file::{JsonFileCacheStore, JsonFileResultLog};
pub use memory::{MemoryCacheStore, MemoryResultLog};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A cached payload and its absolute expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    pub expire: i64,
}

impl CacheEntry {
    /// Valid while `expire > now`.
    pub fn is_valid(&self, now: i64) -> bool {
        self.expire > now
    }
}

pub trait CacheStore: Send + Sync {
    /// Entries found for `ids`, expired ones included. Missing ids are absent.
    fn get_multiple(&self, ids: &[String]) -> Result<HashMap<String, CacheEntry>, StoreError>;

    fn set(&self, id: &str, data: serde_json::Value, expire_at: i64) -> Result<(), StoreError>;
}

pub trait ResultLog: Send + Sync {
    /// Status of the most recently saved result for `sensor_name`.
    fn last_status(&self, sensor_name: &str) -> Result<Option<SensorStatus>, StoreError>;

    fn save(&self, record: &ResultRecord) -> Result<(), StoreError>;

    /// Saved results for `sensor_name`, newest first.
    fn history(&self, sensor_name: &str, limit: usize) -> Result<Vec<ResultRecord>, StoreError>;
}

/// Newest-first records of one sensor out of an append-only log.
fn newest_first(log: &[ResultRecord], sensor_name: &str, limit: usize) -> Vec<ResultRecord> {
    log.iter()
        .rev()
        .filter(|r| r.sensor_name == sensor_name)
        .take(limit)
        .cloned()
        .collect()
}
