//! Threshold evaluation
//!
//! Turns a sensor value plus an optional expectation into a status:
//! - no expectation: the status the sensor already holds is kept
//! - exact expected value: OK on match, CRITICAL otherwise
//! - threshold spec: CRITICAL outside the critical bounds, WARNING outside
//!   the warning bounds, OK otherwise
//!
//! Pure logic, no I/O. The result module calls it from `compile()`.

use serde::{Deserialize, Serialize};

use crate::status::SensorStatus;
use crate::value::SensorValue;

/// Warning and critical bounds. An unset bound is unbounded on that side;
/// a value equal to a bound is inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_high: Option<f64>,
}

impl ThresholdSpec {
    /// Upper bounds only, the common "too many pending items" case.
    pub fn exceeds(warning: f64, critical: f64) -> Self {
        Self {
            warning_high: Some(warning),
            critical_high: Some(critical),
            ..Self::default()
        }
    }

    /// Lower bounds only, the "free space running out" case.
    pub fn falls_below(warning: f64, critical: f64) -> Self {
        Self {
            warning_low: Some(warning),
            critical_low: Some(critical),
            ..Self::default()
        }
    }

    /// Both warning and critical ranges: `[warning.0, warning.1]` is the
    /// OK range, `[critical.0, critical.1]` the non-critical range.
    pub fn ranges(warning: (f64, f64), critical: (f64, f64)) -> Self {
        Self {
            warning_low: Some(warning.0),
            warning_high: Some(warning.1),
            critical_low: Some(critical.0),
            critical_high: Some(critical.1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.warning_low.is_none()
            && self.warning_high.is_none()
            && self.critical_low.is_none()
            && self.critical_high.is_none()
    }

    fn assess(&self, value: f64) -> Assessment {
        if let Some(reason) = outside(value, self.critical_low, self.critical_high) {
            return Assessment::with_reason(SensorStatus::Critical, reason);
        }
        if let Some(reason) = outside(value, self.warning_low, self.warning_high) {
            return Assessment::with_reason(SensorStatus::Warning, reason);
        }
        Assessment::new(SensorStatus::Ok)
    }
}

fn outside(value: f64, low: Option<f64>, high: Option<f64>) -> Option<String> {
    if let Some(high) = high {
        if value > high {
            return Some(format!("exceeds {}", high));
        }
    }
    if let Some(low) = low {
        if value < low {
            return Some(format!("falls below {}", low));
        }
    }
    None
}

/// What a result value is assessed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Expectation {
    Exact(SensorValue),
    Thresholds(ThresholdSpec),
}

/// Outcome of an evaluation: the status plus a short reason when the value
/// is out of bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub status: SensorStatus,
    pub reason: Option<String>,
}

impl Assessment {
    pub fn new(status: SensorStatus) -> Self {
        Self { status, reason: None }
    }

    pub fn with_reason(status: SensorStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
        }
    }
}

/// Threshold configured for a value that cannot be compared numerically.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("thresholds require a numeric value, got '{0}'")]
    NonNumericValue(String),
    #[error("thresholds configured but the sensor reported no value")]
    MissingValue,
}

/// Compute the status of `value` against `expected`.
///
/// `current` is returned untouched when there is nothing to assess.
pub fn evaluate(
    value: Option<&SensorValue>,
    expected: Option<&Expectation>,
    current: SensorStatus,
) -> Result<Assessment, ThresholdError> {
    match expected {
        None => Ok(Assessment::new(current)),
        Some(Expectation::Exact(target)) => {
            let hit = value.map(|v| v.matches(target)).unwrap_or(false);
            if hit {
                Ok(Assessment::new(SensorStatus::Ok))
            } else {
                Ok(Assessment::with_reason(
                    SensorStatus::Critical,
                    format!("expected {}", target),
                ))
            }
        }
        Some(Expectation::Thresholds(spec)) => {
            if spec.is_empty() {
                return Ok(Assessment::new(current));
            }
            let value = value.ok_or(ThresholdError::MissingValue)?;
            let number = value
                .as_f64()
                .ok_or_else(|| ThresholdError::NonNumericValue(value.to_string()))?;
            Ok(spec.assess(number))
        }
    }
}
