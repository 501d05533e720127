//! Scalar values reported by sensors

use serde::{Deserialize, Serialize};
use std::fmt;

/// A sensor value. The meaning is sensor-defined (a queue length, a
/// percentage, a version string...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SensorValue {
    /// Numeric view of the value, `None` when it cannot be coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            SensorValue::Int(i) => Some(*i as f64),
            SensorValue::Float(f) => Some(*f),
            SensorValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Loose equality used for expected-value comparison: numeric when both
    /// sides coerce, structural otherwise.
    pub fn matches(&self, other: &SensorValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Bool(b) => write!(f, "{}", b),
            SensorValue::Int(i) => write!(f, "{}", i),
            SensorValue::Float(v) => write!(f, "{}", v),
            SensorValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SensorValue {
    fn from(v: bool) -> Self {
        SensorValue::Bool(v)
    }
}

impl From<i64> for SensorValue {
    fn from(v: i64) -> Self {
        SensorValue::Int(v)
    }
}

impl From<i32> for SensorValue {
    fn from(v: i32) -> Self {
        SensorValue::Int(i64::from(v))
    }
}

impl From<u32> for SensorValue {
    fn from(v: u32) -> Self {
        SensorValue::Int(i64::from(v))
    }
}

impl From<usize> for SensorValue {
    fn from(v: usize) -> Self {
        SensorValue::Int(v as i64)
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        SensorValue::Float(v)
    }
}

impl From<f32> for SensorValue {
    fn from(v: f32) -> Self {
        SensorValue::Float(f64::from(v))
    }
}

impl From<&str> for SensorValue {
    fn from(v: &str) -> Self {
        SensorValue::Text(v.to_string())
    }
}

impl From<String> for SensorValue {
    fn from(v: String) -> Self {
        SensorValue::Text(v)
    }
}
