//! Sensor runner
//!
//! Runs a batch of sensor definitions in definition order:
//! 1. one batched cache lookup for the sensors that declare a caching time
//! 2. per sensor: reuse a valid cache record, or run the sensor (timed) and
//!    compile its result
//! 3. after the batch: persist results to the result log according to the
//!    logging mode, then cache fresh results of caching sensors
//!
//! A failing sensor, an unavailable cache or a failing result log never
//! stops the batch.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::definition::{LoggingMode, SensorDefinition};
use crate::registry::{RegistryError, ResultSeed, SensorRegistry};
use crate::result::{ResultRecord, SensorResult, StatusMessage};
use crate::status::SensorStatus;
use crate::store::{CacheStore, ResultLog};

const CACHE_ID_PREFIX: &str = "vigil_sensor_result:";

/// Cache id of a sensor's result. Stable across restarts.
pub fn sensor_cache_id(sensor_name: &str) -> String {
    format!("{}{}", CACHE_ID_PREFIX, sensor_name)
}

/// Results of one `run_all()`, in definition order. Disabled sensors are absent.
#[derive(Debug, Clone, Default)]
pub struct RunBatch {
    results: Vec<SensorResult>,
}

impl RunBatch {
    pub fn get(&self, sensor_name: &str) -> Option<&SensorResult> {
        self.results.iter().find(|r| r.sensor_name() == sensor_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorResult)> {
        self.results.iter().map(|r| (r.sensor_name(), r))
    }

    pub fn names(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.sensor_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Most severe status of the batch, `None` when it is empty.
    pub fn worst_status(&self) -> Option<SensorStatus> {
        self.results
            .iter()
            .map(|r| r.status())
            .max_by_key(|s| s.severity())
    }

    pub fn into_results(self) -> Vec<SensorResult> {
        self.results
    }
}

/// Outcome of resolving one definition.
enum Resolution {
    Disabled,
    /// The sensor could not be built or queried. Never cached.
    Unavailable(SensorResult),
    Ready {
        result: SensorResult,
        verbose: Option<String>,
    },
}

struct Resolved {
    index: usize,
    result: SensorResult,
    cacheable: bool,
}

pub struct SensorRunner {
    definitions: Vec<SensorDefinition>,
    registry: Arc<SensorRegistry>,
    cache: Arc<dyn CacheStore>,
    result_log: Arc<dyn ResultLog>,
    clock: Arc<dyn Clock>,
    force_run: bool,
    verbose: bool,
    logging_mode: LoggingMode,
    verbose_output: HashMap<String, String>,
}

impl SensorRunner {
    /// Runner over `definitions`. Names are unique, later duplicates are dropped.
    pub fn new(
        definitions: Vec<SensorDefinition>,
        registry: Arc<SensorRegistry>,
        cache: Arc<dyn CacheStore>,
        result_log: Arc<dyn ResultLog>,
    ) -> Self {
        let mut seen = HashSet::new();
        let definitions = definitions
            .into_iter()
            .filter(|def| {
                let fresh = seen.insert(def.name.clone());
                if !fresh {
                    warn!(sensor = %def.name, "duplicate sensor definition ignored");
                }
                fresh
            })
            .collect();

        Self {
            definitions,
            registry,
            cache,
            result_log,
            clock: Arc::new(SystemClock),
            force_run: false,
            verbose: false,
            logging_mode: LoggingMode::default(),
            verbose_output: HashMap::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Restricts the runner to the named sensors, keeping definition order.
    pub fn only<S: AsRef<str>>(mut self, sensor_names: &[S]) -> Self {
        self.definitions
            .retain(|def| sensor_names.iter().any(|n| n.as_ref() == def.name));
        self
    }

    /// Ignore cached results and run every sensor.
    pub fn force_run(&mut self, force: bool) {
        self.force_run = force;
    }

    /// Collect verbose output of sensors declaring extended info.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn set_logging_mode(&mut self, mode: LoggingMode) {
        self.logging_mode = mode;
    }

    pub fn logging_mode(&self) -> LoggingMode {
        self.logging_mode
    }

    pub fn definitions(&self) -> &[SensorDefinition] {
        &self.definitions
    }

    /// Verbose output of the last `run_all()`, keyed by sensor name.
    pub fn verbose_output(&self) -> &HashMap<String, String> {
        &self.verbose_output
    }

    pub fn sensor_cache_id(&self, sensor_name: &str) -> String {
        sensor_cache_id(sensor_name)
    }

    /// Runs every enabled sensor and applies the logging and caching policies.
    pub fn run_all(&mut self) -> RunBatch {
        let now = self.clock.now();
        self.verbose_output.clear();
        let cached = self.load_cache(now);

        let mut resolved: Vec<Resolved> = Vec::with_capacity(self.definitions.len());
        for (index, definition) in self.definitions.iter().enumerate() {
            match self.run_sensor(definition, &cached, now) {
                Resolution::Disabled => {}
                Resolution::Unavailable(result) => resolved.push(Resolved {
                    index,
                    result,
                    cacheable: false,
                }),
                Resolution::Ready { result, verbose } => {
                    if let Some(text) = verbose {
                        self.verbose_output.insert(definition.name.clone(), text);
                    }
                    resolved.push(Resolved {
                        index,
                        result,
                        cacheable: true,
                    });
                }
            }
        }

        self.save_results(&resolved);
        self.cache_results(&resolved, now);

        let from_cache = resolved.iter().filter(|r| r.result.is_cached()).count();
        info!(
            "sensor batch finished: {} results ({} fresh, {} cached, {} skipped)",
            resolved.len(),
            resolved.len() - from_cache,
            from_cache,
            self.definitions.len() - resolved.len()
        );

        RunBatch {
            results: resolved.into_iter().map(|r| r.result).collect(),
        }
    }

    /// Valid cache records keyed by sensor name. Any lookup problem is a miss.
    fn load_cache(&self, now: i64) -> HashMap<String, ResultRecord> {
        if self.force_run {
            debug!("force run, skipping cache lookup");
            return HashMap::new();
        }

        let ids: Vec<String> = self
            .definitions
            .iter()
            .filter(|def| def.is_caching())
            .map(|def| sensor_cache_id(&def.name))
            .collect();
        if ids.is_empty() {
            return HashMap::new();
        }

        let entries = match self.cache.get_multiple(&ids) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cache unavailable, running all sensors: {}", e);
                return HashMap::new();
            }
        };

        entries
            .into_iter()
            .filter(|(_, entry)| entry.is_valid(now))
            .filter_map(|(id, entry)| match serde_json::from_value::<ResultRecord>(entry.data) {
                Ok(record) => Some((record.sensor_name.clone(), record)),
                Err(e) => {
                    warn!(cache_id = %id, "ignoring malformed cache record: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Resolves one sensor. Every call into sensor code is guarded, a panic
    /// turns into an UNKNOWN result instead of unwinding through the batch.
    fn run_sensor(
        &self,
        definition: &SensorDefinition,
        cached: &HashMap<String, ResultRecord>,
        now: i64,
    ) -> Resolution {
        let name = definition.name.as_str();

        let mut sensor = match guarded(name, "factory", || self.registry.create_sensor(definition)) {
            Ok(Ok(sensor)) => sensor,
            Ok(Err(e)) => {
                if !definition.enabled {
                    return Resolution::Disabled;
                }
                warn!(sensor = %name, "{}", e);
                return Resolution::Unavailable(failed_result(definition, now, unavailable(e)));
            }
            Err(reason) => {
                if !definition.enabled {
                    return Resolution::Disabled;
                }
                return Resolution::Unavailable(failed_result(definition, now, panicked(reason)));
            }
        };

        match guarded(name, "is_enabled", || sensor.is_enabled()) {
            Ok(true) => {}
            Ok(false) => {
                debug!(sensor = %name, "sensor disabled, skipped");
                return Resolution::Disabled;
            }
            Err(reason) => {
                return Resolution::Unavailable(failed_result(definition, now, panicked(reason)));
            }
        }

        let seed = match cached.get(name) {
            Some(record) if !self.force_run => ResultSeed::Cached(record.clone()),
            _ => ResultSeed::Fresh { timestamp: now },
        };
        let mut result = match guarded(name, "result factory", || self.registry.create_result(definition, seed)) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(sensor = %name, "{}", e);
                return Resolution::Unavailable(failed_result(definition, now, unavailable(e)));
            }
            Err(reason) => {
                return Resolution::Unavailable(failed_result(definition, now, panicked(reason)));
            }
        };

        if result.is_cached() {
            debug!(sensor = %name, "using cached result");
        } else {
            let started = Instant::now();
            let outcome = guarded(name, "run", || sensor.run(&mut result));
            result.set_execution_time(started.elapsed().as_secs_f64() * 1000.0);

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(sensor = %name, "sensor failed: {}", e);
                    result.set_status(SensorStatus::Unknown);
                    result.add_status_message(StatusMessage::new("Sensor failed: {error}").var("error", e));
                }
                Err(reason) => {
                    result.set_status(SensorStatus::Unknown);
                    result.add_status_message(panicked(reason));
                }
            }

            result.compile();
            debug!(
                sensor = %name,
                status = %result.status(),
                "sensor ran in {:.3} ms",
                result.execution_time_ms()
            );
        }

        let verbose = if self.verbose && definition.extended_info {
            guarded(name, "result_verbose", || sensor.result_verbose(&result)).ok()
        } else {
            None
        };
        Resolution::Ready { result, verbose }
    }

    fn save_results(&self, resolved: &[Resolved]) {
        if self.logging_mode == LoggingMode::None {
            return;
        }

        for Resolved { index, result, .. } in resolved {
            if result.is_cached() {
                continue;
            }
            let definition = &self.definitions[*index];

            let old_status = match self.result_log.last_status(result.sensor_name()) {
                Ok(status) => status,
                Err(e) => {
                    error!(sensor = %definition.name, "failed to read last result: {}", e);
                    None
                }
            };

            if definition.log_results(self.logging_mode, old_status, result.status()) {
                if let Err(e) = self.result_log.save(&result.to_record()) {
                    error!(sensor = %definition.name, "failed to save result: {}", e);
                }
            }
        }
    }

    fn cache_results(&self, resolved: &[Resolved], now: i64) {
        for Resolved { index, result, cacheable } in resolved {
            let definition = &self.definitions[*index];
            if !cacheable || !definition.is_caching() || result.is_cached() {
                continue;
            }

            let data = match serde_json::to_value(result.to_record()) {
                Ok(data) => data,
                Err(e) => {
                    warn!(sensor = %definition.name, "failed to encode result for cache: {}", e);
                    continue;
                }
            };
            let ttl = i64::try_from(definition.caching_time).unwrap_or(i64::MAX);
            let expire_at = now.saturating_add(ttl);
            if let Err(e) = self.cache.set(&sensor_cache_id(&definition.name), data, expire_at) {
                warn!(sensor = %definition.name, "failed to cache result: {}", e);
            }
        }
    }
}

/// UNKNOWN result for a sensor that could not be built or queried.
fn failed_result(definition: &SensorDefinition, now: i64, message: StatusMessage) -> SensorResult {
    let mut result = SensorResult::new(definition, now);
    result.set_status(SensorStatus::Unknown);
    result.set_message(message);
    result.compile();
    result
}

fn unavailable(error: RegistryError) -> StatusMessage {
    StatusMessage::new("Sensor unavailable: {error}").var("error", error)
}

fn panicked(reason: String) -> StatusMessage {
    StatusMessage::new("Sensor panicked: {error}").var("error", reason)
}

/// Runs `f`, turning a panic into its message.
fn guarded<T>(sensor_name: &str, stage: &str, f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let reason = panic_reason(payload.as_ref());
        error!(sensor = %sensor_name, "sensor panicked in {}: {}", stage, reason);
        reason
    })
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
