//! Sensor registry
//!
//! Maps the `sensor_type` and `result_type` keys of a definition to the
//! factories building the matching sensor and result. Populated once at
//! startup, read-only afterwards.

use std::collections::HashMap;

use crate::definition::SensorDefinition;
use crate::result::{ResultRecord, SensorResult};
use crate::sensor::Sensor;

pub const DEFAULT_RESULT_TYPE: &str = "default";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown sensor type: {0}")]
    UnknownSensorType(String),
    #[error("Unknown result type: {0}")]
    UnknownResultType(String),
}

/// What a result factory builds the result from.
#[derive(Debug, Clone)]
pub enum ResultSeed {
    /// Empty result for a fresh run at `timestamp`.
    Fresh { timestamp: i64 },
    /// Result restored from a valid cache record.
    Cached(ResultRecord),
}

pub type SensorFactory = Box<dyn Fn(&SensorDefinition) -> Box<dyn Sensor> + Send + Sync>;
pub type ResultFactory = Box<dyn Fn(&SensorDefinition, ResultSeed) -> SensorResult + Send + Sync>;

pub struct SensorRegistry {
    sensors: HashMap<String, SensorFactory>,
    results: HashMap<String, ResultFactory>,
}

impl SensorRegistry {
    /// Registry with the default result type and no sensors.
    pub fn new() -> Self {
        let mut registry = Self {
            sensors: HashMap::new(),
            results: HashMap::new(),
        };
        registry.register_result(DEFAULT_RESULT_TYPE, default_result);
        registry
    }

    /// Ex: `registry.register("spool_pending", |def| Box::new(SpoolPending::new(def)))`
    pub fn register<F>(&mut self, sensor_type: &str, factory: F)
    where
        F: Fn(&SensorDefinition) -> Box<dyn Sensor> + Send + Sync + 'static,
    {
        self.sensors.insert(sensor_type.to_string(), Box::new(factory));
    }

    pub fn register_result<F>(&mut self, result_type: &str, factory: F)
    where
        F: Fn(&SensorDefinition, ResultSeed) -> SensorResult + Send + Sync + 'static,
    {
        self.results.insert(result_type.to_string(), Box::new(factory));
    }

    pub fn create_sensor(&self, definition: &SensorDefinition) -> Result<Box<dyn Sensor>, RegistryError> {
        let factory = self
            .sensors
            .get(&definition.sensor_type)
            .ok_or_else(|| RegistryError::UnknownSensorType(definition.sensor_type.clone()))?;
        Ok(factory(definition))
    }

    pub fn create_result(
        &self,
        definition: &SensorDefinition,
        seed: ResultSeed,
    ) -> Result<SensorResult, RegistryError> {
        let factory = self
            .results
            .get(&definition.result_type)
            .ok_or_else(|| RegistryError::UnknownResultType(definition.result_type.clone()))?;
        Ok(factory(definition, seed))
    }

    pub fn has_sensor_type(&self, sensor_type: &str) -> bool {
        self.sensors.contains_key(sensor_type)
    }

    pub fn sensor_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.sensors.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for SensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn default_result(definition: &SensorDefinition, seed: ResultSeed) -> SensorResult {
    match seed {
        ResultSeed::Fresh { timestamp } => SensorResult::new(definition, timestamp),
        ResultSeed::Cached(record) => SensorResult::from_record(record),
    }
}
