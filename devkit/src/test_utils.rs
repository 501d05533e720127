/*!
Test harness for sensor runners

Wires a runner to recording stores and a manual clock, with helpers to
register scripted sensors and assert on what got cached and saved.
*/

use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use vigil_core::{
    sensor_cache_id, ResultRecord, SensorDefinition, SensorError, SensorRegistry, SensorResult,
    SensorRunner, SensorStatus, SensorValue,
};

use crate::clock::ManualClock;
use crate::sensors::{RunCounter, ScriptedSensor};
use crate::stores::{MockCacheStore, RecordingResultLog};

/// Start time of every harness clock.
pub const HARNESS_EPOCH: i64 = 1_700_000_000;

pub struct TestHarness {
    registry: SensorRegistry,
    pub cache: Arc<MockCacheStore>,
    pub result_log: Arc<RecordingResultLog>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init()
            .ok();

        Self {
            registry: SensorRegistry::new(),
            cache: Arc::new(MockCacheStore::new()),
            result_log: Arc::new(RecordingResultLog::new()),
            clock: Arc::new(ManualClock::new(HARNESS_EPOCH)),
        }
    }

    pub fn registry_mut(&mut self) -> &mut SensorRegistry {
        &mut self.registry
    }

    pub fn sensor<F>(&mut self, sensor_type: &str, script: F) -> RunCounter
    where
        F: Fn(&SensorDefinition, &mut SensorResult) -> Result<(), SensorError> + Send + Sync + 'static,
    {
        ScriptedSensor::register(&mut self.registry, sensor_type, script)
    }

    /// Sensor type reporting the definition's `value` setting.
    pub fn value_sensor(&mut self, sensor_type: &str) -> RunCounter {
        self.sensor(sensor_type, |def, result| {
            if let Some(value) = def.settings.get("value") {
                let value: SensorValue = serde_json::from_value(value.clone())
                    .map_err(|e| SensorError::Failed(e.to_string()))?;
                result.set_value(value);
            }
            Ok(())
        })
    }

    pub fn failing_sensor(&mut self, sensor_type: &str, reason: &str) -> RunCounter {
        let reason = reason.to_string();
        self.sensor(sensor_type, move |_, _| Err(SensorError::Source(reason.clone())))
    }

    pub fn panicking_sensor(&mut self, sensor_type: &str) -> RunCounter {
        self.sensor(sensor_type, |def, _| panic!("sensor {} blew up", def.name))
    }

    /// Runner over `definitions`. Registration ends here.
    pub fn runner(&mut self, definitions: Vec<SensorDefinition>) -> SensorRunner {
        let registry = std::mem::take(&mut self.registry);
        SensorRunner::new(
            definitions,
            Arc::new(registry),
            self.cache.clone(),
            self.result_log.clone(),
        )
        .with_clock(self.clock.clone())
    }

    pub fn cached_record(&self, sensor_name: &str) -> Option<ResultRecord> {
        let entry = self.cache.entry(&sensor_cache_id(sensor_name))?;
        serde_json::from_value(entry.data).ok()
    }

    pub fn verify_saved(&self, sensor_name: &str, expected_count: usize) -> Result<()> {
        let saved = self.result_log.saved_for(sensor_name).len();
        if saved != expected_count {
            anyhow::bail!(
                "Expected {} saved results for '{}', got {}",
                expected_count,
                sensor_name,
                saved
            );
        }
        Ok(())
    }

    pub fn verify_cached(&self, sensor_name: &str, expire_at: i64) -> Result<()> {
        match self.cache.entry(&sensor_cache_id(sensor_name)) {
            Some(entry) if entry.expire == expire_at => Ok(()),
            Some(entry) => anyhow::bail!(
                "Cache entry for '{}' expires at {}, expected {}",
                sensor_name,
                entry.expire,
                expire_at
            ),
            None => anyhow::bail!("No cache entry for '{}'", sensor_name),
        }
    }

    pub fn verify_not_cached(&self, sensor_name: &str) -> Result<()> {
        if self.cache.entry(&sensor_cache_id(sensor_name)).is_some() {
            anyhow::bail!("Unexpected cache entry for '{}'", sensor_name);
        }
        Ok(())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for result records, to seed caches and result logs.
pub struct RecordBuilder {
    record: ResultRecord,
}

impl RecordBuilder {
    pub fn new(sensor_name: &str) -> Self {
        Self {
            record: ResultRecord {
                sensor_name: sensor_name.to_string(),
                status: SensorStatus::Ok,
                message: String::new(),
                value: None,
                expected: None,
                execution_time_ms: 0.0,
                timestamp: HARNESS_EPOCH,
            },
        }
    }

    pub fn status(mut self, status: SensorStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn value(mut self, value: impl Into<SensorValue>) -> Self {
        self.record.value = Some(value.into());
        self
    }

    pub fn message(mut self, message: &str) -> Self {
        self.record.message = message.to_string();
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    pub fn build(self) -> ResultRecord {
        self.record
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.record).unwrap_or(serde_json::Value::Null)
    }
}
