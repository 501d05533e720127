//! Sensor results
//!
//! A `SensorResult` accumulates what a sensor reports during `run()`:
//! - status messages (templates with `{name}` placeholders)
//! - a value and the expectation it is assessed against
//! - an explicit status, when the sensor decides on its own
//!
//! `compile()` turns the accumulated state into the final status and
//! message. Results built from a cache record are already final.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::definition::SensorDefinition;
use crate::status::SensorStatus;
use crate::threshold::{self, Expectation};
use crate::value::SensorValue;

/// One message template plus its substitution variables, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub template: String,
    pub variables: Vec<(String, String)>,
}

impl StatusMessage {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            variables: Vec::new(),
        }
    }

    /// Adds a `{name}` substitution.
    pub fn var(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.variables.push((name.into(), value.to_string()));
        self
    }

    /// Substitutes placeholders in one pass over the template. Substituted
    /// values are never scanned again, unknown placeholders stay as written.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            let value = tail[1..]
                .find('}')
                .and_then(|close| self.lookup(&tail[1..=close]).map(|v| (v, close + 2)));
            match value {
                Some((value, consumed)) => {
                    out.push_str(value);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl From<&str> for StatusMessage {
    fn from(template: &str) -> Self {
        StatusMessage::new(template)
    }
}

impl From<String> for StatusMessage {
    fn from(template: String) -> Self {
        StatusMessage::new(template)
    }
}

/// Persistable field set of a result. Stored in the result log and, with
/// the sensor name, in cache records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub sensor_name: String,
    pub status: SensorStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SensorValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Expectation>,
    pub execution_time_ms: f64,
    pub timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct SensorResult {
    sensor_name: String,
    status: SensorStatus,
    explicit_status: Option<SensorStatus>,
    messages: Vec<StatusMessage>,
    compiled_message: String,
    value: Option<SensorValue>,
    expected: Option<Expectation>,
    execution_time_ms: f64,
    cached: bool,
    timestamp: i64,
}

impl SensorResult {
    /// Empty result for a fresh run, seeded with the definition's expectation.
    pub fn new(definition: &SensorDefinition, timestamp: i64) -> Self {
        Self {
            sensor_name: definition.name.clone(),
            status: SensorStatus::Unknown,
            explicit_status: None,
            messages: Vec::new(),
            compiled_message: String::new(),
            value: None,
            expected: definition.expectation(),
            execution_time_ms: 0.0,
            cached: false,
            timestamp,
        }
    }

    /// Result restored from a cache record. Stays cached for its lifetime.
    pub fn from_record(record: ResultRecord) -> Self {
        Self {
            sensor_name: record.sensor_name,
            status: record.status,
            explicit_status: Some(record.status),
            messages: Vec::new(),
            compiled_message: record.message,
            value: record.value,
            expected: record.expected,
            execution_time_ms: record.execution_time_ms,
            cached: true,
            timestamp: record.timestamp,
        }
    }

    pub fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    pub fn status(&self) -> SensorStatus {
        self.status
    }

    /// Sets the status explicitly. Threshold assessment is skipped on compile.
    pub fn set_status(&mut self, status: SensorStatus) {
        self.explicit_status = Some(status);
        self.status = status;
    }

    /// Compiled message. Empty until `compile()` ran on a fresh result.
    pub fn message(&self) -> &str {
        &self.compiled_message
    }

    pub fn messages(&self) -> &[StatusMessage] {
        &self.messages
    }

    /// Replaces all messages added so far with a single one.
    pub fn set_message(&mut self, message: impl Into<StatusMessage>) {
        self.messages.clear();
        self.messages.push(message.into());
    }

    pub fn add_status_message(&mut self, message: impl Into<StatusMessage>) {
        self.messages.push(message.into());
    }

    pub fn value(&self) -> Option<&SensorValue> {
        self.value.as_ref()
    }

    pub fn set_value(&mut self, value: impl Into<SensorValue>) {
        self.value = Some(value.into());
    }

    pub fn expected(&self) -> Option<&Expectation> {
        self.expected.as_ref()
    }

    /// `None` disables the value assessment for this run.
    pub fn set_expectation(&mut self, expected: Option<Expectation>) {
        self.expected = expected;
    }

    pub fn set_expected_value(&mut self, value: impl Into<SensorValue>) {
        self.expected = Some(Expectation::Exact(value.into()));
    }

    pub fn execution_time_ms(&self) -> f64 {
        self.execution_time_ms
    }

    pub fn set_execution_time(&mut self, milliseconds: f64) {
        self.execution_time_ms = milliseconds;
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn is_ok(&self) -> bool {
        self.status == SensorStatus::Ok
    }

    pub fn is_info(&self) -> bool {
        self.status == SensorStatus::Info
    }

    pub fn is_warning(&self) -> bool {
        self.status == SensorStatus::Warning
    }

    pub fn is_critical(&self) -> bool {
        self.status == SensorStatus::Critical
    }

    pub fn is_unknown(&self) -> bool {
        self.status == SensorStatus::Unknown
    }

    /// Finalizes status and message from the accumulated state.
    ///
    /// Derived only from messages, value, expectation and explicit status,
    /// so calling it again without changes yields the same output.
    pub fn compile(&mut self) {
        if self.cached {
            return;
        }

        let mut parts: Vec<String> = self.messages.iter().map(StatusMessage::render).collect();
        if parts.is_empty() {
            if let Some(value) = &self.value {
                parts.push(format!("Value {}", value));
            }
        }

        let status = match self.explicit_status {
            Some(status) => status,
            None => match threshold::evaluate(
                self.value.as_ref(),
                self.expected.as_ref(),
                SensorStatus::Unknown,
            ) {
                Ok(assessment) => {
                    parts.extend(assessment.reason);
                    assessment.status
                }
                Err(e) => {
                    warn!(sensor = %self.sensor_name, "threshold assessment failed: {}", e);
                    parts.push(format!("threshold assessment failed: {}", e));
                    SensorStatus::Unknown
                }
            },
        };

        self.status = status;
        self.compiled_message = parts.join(", ");
    }

    /// Numeric view of the value for graphs and metrics. NaN when there is
    /// no value or it cannot be cast.
    pub fn to_number(&self) -> f64 {
        self.value
            .as_ref()
            .and_then(SensorValue::as_f64)
            .unwrap_or(f64::NAN)
    }

    pub fn to_record(&self) -> ResultRecord {
        ResultRecord {
            sensor_name: self.sensor_name.clone(),
            status: self.status,
            message: self.compiled_message.clone(),
            value: self.value.clone(),
            expected: self.expected.clone(),
            execution_time_ms: self.execution_time_ms,
            timestamp: self.timestamp,
        }
    }

    /// Human readable dump of the result fields.
    pub fn verbose(&self) -> String {
        let timestamp = DateTime::from_timestamp(self.timestamp, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.timestamp.to_string());
        let value = self
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());

        let mut lines = vec![
            format!("Sensor: {}", self.sensor_name),
            format!("Status: {}", self.status),
            format!("Message: {}", self.compiled_message),
            format!("Value: {}", value),
        ];
        if let Some(expected) = &self.expected {
            lines.push(format!("Expected: {}", describe_expectation(expected)));
        }
        lines.push(format!("Execution time: {:.3} ms", self.execution_time_ms));
        lines.push(format!("Cached: {}", if self.cached { "yes" } else { "no" }));
        lines.push(format!("Timestamp: {}", timestamp));
        lines.join("\n")
    }
}

fn describe_expectation(expected: &Expectation) -> String {
    match expected {
        Expectation::Exact(value) => value.to_string(),
        Expectation::Thresholds(spec) => {
            let bound = |b: Option<f64>| b.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
            format!(
                "warning [{}, {}], critical [{}, {}]",
                bound(spec.warning_low),
                bound(spec.warning_high),
                bound(spec.critical_low),
                bound(spec.critical_high)
            )
        }
    }
}
