//! Built-in sensors of the agent

pub mod spool;
pub mod system;

use vigil_core::SensorRegistry;

use spool::SpoolPending;
use system::{Probe, SystemSensor};

const PROBES: [Probe; 5] = [
    Probe::CpuUsage,
    Probe::MemoryUsage,
    Probe::DiskUsage,
    Probe::LoadAverage,
    Probe::ProcessCount,
];

pub fn register_builtin(registry: &mut SensorRegistry) {
    for probe in PROBES {
        registry.register(probe.sensor_type(), move |def| Box::new(SystemSensor::new(def, probe)));
    }
    registry.register("spool_pending", |def| Box::new(SpoolPending::new(def)));
}
