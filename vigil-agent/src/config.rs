use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};
use vigil_core::{LoggingMode, SensorDefinition, ThresholdSpec};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Seconds between two sensor batches.
    pub interval_secs: u64,
    pub logging_mode: LoggingMode,
    pub force_run: bool,
    pub verbose: bool,
    /// Directory of the cache and result log files.
    pub data_dir: PathBuf,
    /// Max records kept in the result log.
    pub result_retention: usize,
    /// Run a single batch and exit.
    pub run_once: bool,
    /// Restrict the batch to these sensor names (all when empty).
    pub only: Vec<String>,
    pub sensors: Vec<SensorDefinition>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            logging_mode: LoggingMode::OnRequest,
            force_run: false,
            verbose: false,
            data_dir: PathBuf::from("./data"),
            result_retention: 10_000,
            run_once: false,
            only: Vec::new(),
            sensors: default_sensors(),
        }
    }
}

fn default_sensors() -> Vec<SensorDefinition> {
    vec![
        SensorDefinition::new("cpu_usage", "cpu_usage")
            .with_thresholds(ThresholdSpec::exceeds(80.0, 95.0)),
        SensorDefinition::new("memory_usage", "memory_usage")
            .with_thresholds(ThresholdSpec::exceeds(85.0, 95.0)),
        SensorDefinition::new("disk_usage", "disk_usage")
            .with_caching_time(300)
            .with_thresholds(ThresholdSpec::exceeds(85.0, 95.0)),
    ]
}

pub async fn load_config() -> AgentConfig {
    let path = std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "vigil.yaml".into());
    load_config_from(Path::new(&path)).await
}

pub async fn load_config_from(path: &Path) -> AgentConfig {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return AgentConfig::default();
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            error!("Cannot read config {}: {}", path.display(), e);
            return AgentConfig::default();
        }
    };
    if txt.trim().is_empty() {
        return AgentConfig::default();
    }

    serde_yaml::from_str(&txt).unwrap_or_else(|e| {
        error!("Invalid config {}: {}", path.display(), e);
        AgentConfig::default()
    })
}
