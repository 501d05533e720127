//! Sensor contract
//!
//! A sensor is built from its definition for every run, reads whatever
//! source it monitors and reports into the `SensorResult` it is handed.

use crate::result::SensorResult;

/// Failure raised by a sensor while running.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("{0}")]
    Failed(String),
    #[error("data source unavailable: {0}")]
    Source(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait Sensor: Send {
    /// Sensor name (not the label).
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Runs the sensor. Sets the value, and optionally a status and
    /// messages, on `result`.
    fn run(&mut self, result: &mut SensorResult) -> Result<(), SensorError>;

    /// Explanation captured when the runner is verbose and the definition
    /// declares extended info.
    fn result_verbose(&self, result: &SensorResult) -> String {
        result.verbose()
    }
}
