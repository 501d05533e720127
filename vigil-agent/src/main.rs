//! Vigil Agent - runs sensor batches on an interval
//!
//! - Loads `.env` and the YAML config (`VIGIL_CONFIG`, default `vigil.yaml`)
//! - Registers the built-in sensors
//! - Keeps the result cache and result log as JSON files in `data_dir`
//! - Logs every result, at a level matching its status

mod config;
mod sensors;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::AgentConfig;
use parking_lot::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use vigil_core::store::{JsonFileCacheStore, JsonFileResultLog};
use vigil_core::{Clock, RunBatch, SensorRegistry, SensorRunner, SensorStatus, SystemClock};

struct Agent {
    config: AgentConfig,
    runner: Arc<Mutex<SensorRunner>>,
    cache: Arc<JsonFileCacheStore>,
}

impl Agent {
    fn new(config: AgentConfig) -> Result<Self> {
        let mut registry = SensorRegistry::new();
        sensors::register_builtin(&mut registry);
        for definition in &config.sensors {
            if !registry.has_sensor_type(&definition.sensor_type) {
                warn!(
                    "Sensor '{}' uses unknown type '{}', it will report UNKNOWN",
                    definition.name, definition.sensor_type
                );
            }
        }

        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data dir {}", config.data_dir.display()))?;
        let cache = Arc::new(
            JsonFileCacheStore::open(config.data_dir.join("cache.json"))
                .context("Failed to open result cache")?,
        );
        let result_log = Arc::new(
            JsonFileResultLog::open(config.data_dir.join("results.json"))
                .context("Failed to open result log")?
                .with_retention(config.result_retention),
        );

        let mut runner = SensorRunner::new(
            config.sensors.clone(),
            Arc::new(registry),
            cache.clone(),
            result_log,
        );
        if !config.only.is_empty() {
            runner = runner.only(config.only.as_slice());
        }
        runner.force_run(config.force_run);
        runner.set_verbose(config.verbose);
        runner.set_logging_mode(config.logging_mode);

        info!(
            "Agent ready: {} sensors, data in {}",
            runner.definitions().len(),
            config.data_dir.display()
        );

        Ok(Agent {
            config,
            runner: Arc::new(Mutex::new(runner)),
            cache,
        })
    }

    async fn run(&self) -> Result<()> {
        if self.config.run_once {
            return self.run_batch().await.map(|_| ());
        }

        info!("Running sensors every {}s", self.config.interval_secs);
        let mut timer = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    if let Err(e) = self.run_batch().await {
                        error!("Sensor batch failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one batch off the async workers and reports it.
    async fn run_batch(&self) -> Result<RunBatch> {
        let runner = self.runner.clone();
        let (batch, verbose) = tokio::task::spawn_blocking(move || {
            let mut runner = runner.lock();
            let batch = runner.run_all();
            (batch, runner.verbose_output().clone())
        })
        .await
        .context("Sensor batch task panicked")?;

        report(&batch, &verbose);

        match self.cache.purge_expired(SystemClock.now()) {
            Ok(0) => {}
            Ok(removed) => debug!("Purged {} expired cache entries", removed),
            Err(e) => warn!("Failed to purge cache: {}", e),
        }
        Ok(batch)
    }
}

fn report(batch: &RunBatch, verbose: &HashMap<String, String>) {
    for (name, result) in batch.iter() {
        let origin = if result.is_cached() { "cached" } else { "fresh" };
        match result.status() {
            SensorStatus::Critical => error!(sensor = name, origin, "CRITICAL: {}", result.message()),
            SensorStatus::Warning | SensorStatus::Unknown => {
                warn!(sensor = name, origin, "{}: {}", result.status(), result.message())
            }
            SensorStatus::Ok | SensorStatus::Info => {
                info!(sensor = name, origin, "{}: {}", result.status(), result.message())
            }
        }
        if let Some(text) = verbose.get(name) {
            info!(sensor = name, "\n{}", text);
        }
    }

    if let Some(worst) = batch.worst_status() {
        info!("Batch of {} sensors, worst status {}", batch.len(), worst);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info")),
        )
        .init();

    info!("Vigil agent starting...");

    let config = config::load_config().await;
    let agent = Agent::new(config).context("Failed to create agent")?;
    agent.run().await.context("Agent execution failed")?;

    Ok(())
}
