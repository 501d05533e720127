//! Host sensors backed by sysinfo
//!
//! - CPU usage and 1-minute load average
//! - Memory usage
//! - Disk usage for one mount point
//! - Process count

use std::path::Path;

use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};
use tracing::debug;
use vigil_core::{Sensor, SensorDefinition, SensorError, SensorResult, StatusMessage};

/// What a `SystemSensor` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    CpuUsage,
    MemoryUsage,
    DiskUsage,
    LoadAverage,
    ProcessCount,
}

impl Probe {
    pub fn sensor_type(&self) -> &'static str {
        match self {
            Probe::CpuUsage => "cpu_usage",
            Probe::MemoryUsage => "memory_usage",
            Probe::DiskUsage => "disk_usage",
            Probe::LoadAverage => "load_average",
            Probe::ProcessCount => "process_count",
        }
    }
}

pub struct SystemSensor {
    definition: SensorDefinition,
    probe: Probe,
}

impl SystemSensor {
    pub fn new(definition: &SensorDefinition, probe: Probe) -> Self {
        Self {
            definition: definition.clone(),
            probe,
        }
    }

    fn cpu_usage(&self, result: &mut SensorResult) -> Result<(), SensorError> {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        // Usage is a delta between two refreshes
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let percent = sys.global_cpu_info().cpu_usage() as f64;
        if !percent.is_finite() {
            return Err(SensorError::Source("CPU usage not available".into()));
        }
        let percent = round1(percent);
        result.set_value(percent);
        result.add_status_message(
            StatusMessage::new("CPU usage {percent}% on {cores} cores")
                .var("percent", percent)
                .var("cores", sys.cpus().len()),
        );
        Ok(())
    }

    fn memory_usage(&self, result: &mut SensorResult) -> Result<(), SensorError> {
        let mut sys = System::new();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(SensorError::Source("total memory reported as 0".into()));
        }
        let used = total.saturating_sub(sys.available_memory());
        let percent = round1(used as f64 / total as f64 * 100.0);

        result.set_value(percent);
        result.add_status_message(
            StatusMessage::new("Memory {percent}% used ({used_mb} of {total_mb} MB)")
                .var("percent", percent)
                .var("used_mb", used / (1024 * 1024))
                .var("total_mb", total / (1024 * 1024)),
        );
        Ok(())
    }

    fn disk_usage(&self, result: &mut SensorResult) -> Result<(), SensorError> {
        let mount = self.definition.setting_str("mount").unwrap_or("/");
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == Path::new(mount))
            .ok_or_else(|| SensorError::Source(format!("no disk mounted at {}", mount)))?;

        let total = disk.total_space();
        if total == 0 {
            return Err(SensorError::Source(format!("disk at {} reports no space", mount)));
        }
        let used = total.saturating_sub(disk.available_space());
        let percent = round1(used as f64 / total as f64 * 100.0);

        result.set_value(percent);
        result.add_status_message(
            StatusMessage::new("{mount} {percent}% used")
                .var("mount", mount)
                .var("percent", percent),
        );
        Ok(())
    }

    fn load_average(&self, result: &mut SensorResult) -> Result<(), SensorError> {
        if !cfg!(unix) {
            return Err(SensorError::Source("load average is only available on unix".into()));
        }
        let load = System::load_average();
        result.set_value(load.one);
        result.add_status_message(
            StatusMessage::new("Load {one} {five} {fifteen}")
                .var("one", load.one)
                .var("five", load.five)
                .var("fifteen", load.fifteen),
        );
        Ok(())
    }

    fn process_count(&self, result: &mut SensorResult) -> Result<(), SensorError> {
        let mut sys = System::new();
        sys.refresh_processes();
        let count = sys.processes().len();
        result.set_value(count);
        result.add_status_message(StatusMessage::new("{count} processes").var("count", count));
        Ok(())
    }
}

impl Sensor for SystemSensor {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    fn run(&mut self, result: &mut SensorResult) -> Result<(), SensorError> {
        debug!(sensor = %self.definition.name, probe = self.probe.sensor_type(), "reading system probe");
        match self.probe {
            Probe::CpuUsage => self.cpu_usage(result),
            Probe::MemoryUsage => self.memory_usage(result),
            Probe::DiskUsage => self.disk_usage(result),
            Probe::LoadAverage => self.load_average(result),
            Probe::ProcessCount => self.process_count(result),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
