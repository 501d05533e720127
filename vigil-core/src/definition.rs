//! Sensor definitions
//!
//! A definition is the read-only configuration of one sensor: which
//! implementation runs it, how long its results may be cached, how results
//! are logged and what the value is assessed against.

use serde::{Deserialize, Serialize};

use crate::status::SensorStatus;
use crate::threshold::{Expectation, ThresholdSpec};
use crate::value::SensorValue;

/// Result logging policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingMode {
    /// Never persist results.
    None,
    /// Persist when the status changed since the last persisted result.
    #[default]
    #[serde(alias = "on-request")]
    OnRequest,
    /// Persist every freshly computed result.
    All,
}

fn default_result_type() -> String {
    "default".to_string()
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Registry key of the sensor implementation.
    pub sensor_type: String,
    /// Registry key of the result implementation.
    #[serde(default = "default_result_type")]
    pub result_type: String,
    /// Cache lifetime in seconds, 0 disables caching.
    #[serde(default)]
    pub caching_time: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Overrides the runner logging mode when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_logging: Option<LoggingMode>,
    /// The sensor can explain its result in verbose mode.
    #[serde(default)]
    pub extended_info: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<SensorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdSpec>,
    /// Implementation specific settings (paths, mount points...).
    #[serde(default)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl SensorDefinition {
    pub fn new(name: impl Into<String>, sensor_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            sensor_type: sensor_type.into(),
            result_type: default_result_type(),
            caching_time: 0,
            enabled: true,
            result_logging: None,
            extended_info: false,
            expected_value: None,
            thresholds: None,
            settings: serde_json::Map::new(),
        }
    }

    pub fn with_caching_time(mut self, seconds: u64) -> Self {
        self.caching_time = seconds;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSpec) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_expected_value(mut self, value: impl Into<SensorValue>) -> Self {
        self.expected_value = Some(value.into());
        self
    }

    pub fn with_result_logging(mut self, mode: LoggingMode) -> Self {
        self.result_logging = Some(mode);
        self
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_extended_info(mut self) -> Self {
        self.extended_info = true;
        self
    }

    /// Label for humans, falls back to the name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn is_caching(&self) -> bool {
        self.caching_time > 0
    }

    /// Expectation new results are seeded with. Non-empty thresholds take
    /// precedence over an exact expected value.
    pub fn expectation(&self) -> Option<Expectation> {
        match (&self.thresholds, &self.expected_value) {
            (Some(spec), _) if !spec.is_empty() => Some(Expectation::Thresholds(spec.clone())),
            (_, Some(value)) => Some(Expectation::Exact(value.clone())),
            _ => None,
        }
    }

    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(|v| v.as_str())
    }

    pub fn setting_f64(&self, key: &str) -> Option<f64> {
        self.settings.get(key).and_then(|v| v.as_f64())
    }

    /// Whether a result moving from `old_status` to `new_status` is persisted.
    ///
    /// The definition's own `result_logging` wins over `default_mode`.
    pub fn log_results(
        &self,
        default_mode: LoggingMode,
        old_status: Option<SensorStatus>,
        new_status: SensorStatus,
    ) -> bool {
        match self.result_logging.unwrap_or(default_mode) {
            LoggingMode::All => true,
            LoggingMode::OnRequest => old_status.map_or(true, |old| old != new_status),
            LoggingMode::None => false,
        }
    }
}
