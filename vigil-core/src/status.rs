//! Sensor status kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status reported by a sensor result.
///
/// A result is `Unknown` until it is compiled or a sensor sets a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorStatus {
    Ok,
    Info,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl SensorStatus {
    pub const ALL: [SensorStatus; 5] = [
        SensorStatus::Ok,
        SensorStatus::Info,
        SensorStatus::Warning,
        SensorStatus::Critical,
        SensorStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorStatus::Ok => "OK",
            SensorStatus::Info => "INFO",
            SensorStatus::Warning => "WARNING",
            SensorStatus::Critical => "CRITICAL",
            SensorStatus::Unknown => "UNKNOWN",
        }
    }

    /// Rank used to pick the worst status of a batch (higher is worse).
    pub fn severity(&self) -> u8 {
        match self {
            SensorStatus::Ok => 0,
            SensorStatus::Info => 1,
            SensorStatus::Unknown => 2,
            SensorStatus::Warning => 3,
            SensorStatus::Critical => 4,
        }
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown sensor status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for SensorStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" => Ok(SensorStatus::Ok),
            "INFO" => Ok(SensorStatus::Info),
            "WARNING" => Ok(SensorStatus::Warning),
            "CRITICAL" => Ok(SensorStatus::Critical),
            "UNKNOWN" => Ok(SensorStatus::Unknown),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}
