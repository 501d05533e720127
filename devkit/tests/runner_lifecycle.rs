//! Result lifecycle through the runner: caching, result logging, failure
//! containment and verbose capture.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use vigil_core::store::{JsonFileCacheStore, JsonFileResultLog};
use vigil_core::{
    sensor_cache_id, LoggingMode, ResultLog, Sensor, SensorDefinition, SensorError,
    SensorRegistry, SensorResult, SensorRunner, SensorStatus, ThresholdSpec,
};
use vigil_devkit::{ManualClock, RecordBuilder, RunCounter, ScriptedSensor, TestHarness, HARNESS_EPOCH};

const T: i64 = HARNESS_EPOCH;

fn queue(value: i64) -> SensorDefinition {
    SensorDefinition::new("queue", "value")
        .with_setting("value", value)
        .with_thresholds(ThresholdSpec::exceeds(10.0, 50.0))
}

/// Sensor type "level" reporting whatever `level` holds at run time.
fn level_sensor(harness: &mut TestHarness) -> (Arc<AtomicI64>, RunCounter) {
    let level = Arc::new(AtomicI64::new(0));
    let shared = level.clone();
    let runs = harness.sensor("level", move |_, result| {
        result.set_value(shared.load(Ordering::SeqCst));
        Ok(())
    });
    (level, runs)
}

fn level_def(name: &str) -> SensorDefinition {
    SensorDefinition::new(name, "level").with_thresholds(ThresholdSpec::exceeds(10.0, 50.0))
}

/// Sensor that panics in one of its callbacks.
struct Faulty {
    name: String,
    stage: &'static str,
}

impl Sensor for Faulty {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        if self.stage == "is_enabled" {
            panic!("enabled flag unreadable");
        }
        true
    }

    fn run(&mut self, result: &mut SensorResult) -> Result<(), SensorError> {
        result.set_value(1);
        Ok(())
    }

    fn result_verbose(&self, _result: &SensorResult) -> String {
        if self.stage == "result_verbose" {
            panic!("verbose formatter broke");
        }
        String::from("fine")
    }
}

fn register_faulty(harness: &mut TestHarness, sensor_type: &str, stage: &'static str) {
    harness.registry_mut().register(sensor_type, move |def| {
        Box::new(Faulty {
            name: def.name.clone(),
            stage,
        })
    });
}

#[test]
fn test_cache_round_trip() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    let mut runner = harness.runner(vec![queue(20).with_caching_time(60)]);

    let first = runner.run_all();
    let fresh = first.get("queue").unwrap();
    assert!(!fresh.is_cached());
    assert_eq!(fresh.status(), SensorStatus::Warning);
    assert_eq!(runs.count(), 1);
    harness.verify_cached("queue", T + 60).unwrap();

    harness.clock.set(T + 59);
    let second = runner.run_all();
    let hit = second.get("queue").unwrap();
    assert!(hit.is_cached());
    assert_eq!(hit.status(), SensorStatus::Warning);
    assert_eq!(hit.message(), fresh.message());
    assert_eq!(hit.timestamp(), T);
    assert_eq!(runs.count(), 1);

    harness.clock.set(T + 60);
    let third = runner.run_all();
    assert!(!third.get("queue").unwrap().is_cached());
    assert_eq!(runs.count(), 2);
    harness.verify_cached("queue", T + 120).unwrap();

    harness.clock.set(T + 121);
    runner.run_all();
    assert_eq!(runs.count(), 3);
}

#[test]
fn test_cached_results_are_not_recached_or_relogged() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![queue(1).with_caching_time(300)]);
    runner.set_logging_mode(LoggingMode::All);

    runner.run_all();
    assert_eq!(harness.cache.writes(), 1);
    harness.verify_saved("queue", 1).unwrap();

    harness.clock.advance(10);
    let batch = runner.run_all();
    assert!(batch.get("queue").unwrap().is_cached());
    assert_eq!(harness.cache.writes(), 1);
    harness.verify_saved("queue", 1).unwrap();
    harness.verify_cached("queue", T + 300).unwrap();
}

#[test]
fn test_force_run_bypasses_cache() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    let mut runner = harness.runner(vec![queue(1).with_caching_time(60)]);

    runner.run_all();
    assert_eq!(harness.cache.lookups(), 1);

    harness.clock.advance(10);
    runner.force_run(true);
    let batch = runner.run_all();
    assert!(!batch.get("queue").unwrap().is_cached());
    assert_eq!(runs.count(), 2);
    assert_eq!(harness.cache.lookups(), 1);
    harness.verify_cached("queue", T + 70).unwrap();
}

#[test]
fn test_on_request_logs_status_changes_only() {
    let mut harness = TestHarness::new();
    let (level, _) = level_sensor(&mut harness);
    let mut runner = harness.runner(vec![level_def("mail")]);
    assert_eq!(runner.logging_mode(), LoggingMode::OnRequest);

    level.store(5, Ordering::SeqCst);
    runner.run_all();
    harness.verify_saved("mail", 1).unwrap();

    runner.run_all();
    harness.verify_saved("mail", 1).unwrap();

    level.store(80, Ordering::SeqCst);
    let batch = runner.run_all();
    assert!(batch.get("mail").unwrap().is_critical());
    harness.verify_saved("mail", 2).unwrap();
    let saved = harness.result_log.saved_for("mail");
    assert_eq!(saved[1].status, SensorStatus::Critical);
    assert_eq!(saved[1].message, "Value 80, exceeds 50");
}

#[test]
fn test_on_request_uses_prior_status_from_log() {
    let mut harness = TestHarness::new();
    let (level, _) = level_sensor(&mut harness);
    harness
        .result_log
        .seed(RecordBuilder::new("mail").status(SensorStatus::Ok).build());
    let mut runner = harness.runner(vec![level_def("mail")]);

    level.store(1, Ordering::SeqCst);
    runner.run_all();
    harness.verify_saved("mail", 1).unwrap();
}

#[test]
fn test_unreadable_prior_status_counts_as_absent() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    harness
        .result_log
        .seed(RecordBuilder::new("queue").status(SensorStatus::Ok).build());
    harness.result_log.fail_lookups(true);
    let mut runner = harness.runner(vec![queue(1)]);

    runner.run_all();
    harness.verify_saved("queue", 2).unwrap();
}

#[test]
fn test_definition_logging_overrides_runner_mode() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        SensorDefinition::new("silent", "value")
            .with_setting("value", 1)
            .with_result_logging(LoggingMode::None),
        SensorDefinition::new("chatty", "value").with_setting("value", 1),
        SensorDefinition::new("changes", "value")
            .with_setting("value", 1)
            .with_result_logging(LoggingMode::OnRequest),
    ]);
    runner.set_logging_mode(LoggingMode::All);

    runner.run_all();
    runner.run_all();

    harness.verify_saved("silent", 0).unwrap();
    harness.verify_saved("chatty", 2).unwrap();
    harness.verify_saved("changes", 1).unwrap();
}

#[test]
fn test_runner_mode_none_disables_persistence() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![queue(1).with_result_logging(LoggingMode::All)]);
    runner.set_logging_mode(LoggingMode::None);

    runner.run_all();
    harness.verify_saved("queue", 0).unwrap();
    assert_eq!(harness.result_log.lookups(), 0);
}

#[test]
fn test_disabled_sensor_is_skipped() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        queue(1).with_caching_time(60).disabled(),
        SensorDefinition::new("other", "value").with_setting("value", 1),
    ]);
    runner.set_logging_mode(LoggingMode::All);

    let batch = runner.run_all();
    assert!(batch.get("queue").is_none());
    assert_eq!(batch.names(), vec!["other"]);
    assert_eq!(runs.count(), 1);
    harness.verify_not_cached("queue").unwrap();
    harness.verify_saved("queue", 0).unwrap();
}

#[test]
fn test_failures_are_contained() {
    let mut harness = TestHarness::new();
    harness.failing_sensor("broken", "disk gone");
    harness.panicking_sensor("boom");
    let runs = harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        SensorDefinition::new("broken", "broken"),
        SensorDefinition::new("boom", "boom").with_caching_time(60),
        queue(1),
    ]);

    let batch = runner.run_all();
    assert_eq!(batch.names(), vec!["broken", "boom", "queue"]);

    let broken = batch.get("broken").unwrap();
    assert!(broken.is_unknown());
    assert!(broken.message().contains("Sensor failed: data source unavailable: disk gone"));

    let boom = batch.get("boom").unwrap();
    assert!(boom.is_unknown());
    assert!(boom.message().contains("sensor boom blew up"));

    assert!(batch.get("queue").unwrap().is_ok());
    assert_eq!(runs.count(), 1);
    assert_eq!(batch.worst_status(), Some(SensorStatus::Unknown));

    harness.verify_saved("broken", 1).unwrap();
    harness.verify_cached("boom", T + 60).unwrap();
}

#[test]
fn test_unknown_sensor_type() {
    let mut harness = TestHarness::new();
    let mut runner = harness.runner(vec![
        SensorDefinition::new("ghost", "nope"),
        SensorDefinition::new("quiet_ghost", "nope").disabled(),
    ]);

    let batch = runner.run_all();
    assert_eq!(batch.len(), 1);
    let ghost = batch.get("ghost").unwrap();
    assert!(ghost.is_unknown());
    assert!(ghost.message().contains("Unknown sensor type: nope"));
}

#[test]
fn test_unknown_result_type() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut definition = queue(1);
    definition.result_type = "fancy".into();
    let mut runner = harness.runner(vec![definition]);

    let batch = runner.run_all();
    let result = batch.get("queue").unwrap();
    assert!(result.is_unknown());
    assert!(result.message().contains("Unknown result type: fancy"));
}

#[test]
fn test_unavailable_sensor_not_cached() {
    let mut harness = TestHarness::new();
    let mut runner = harness.runner(vec![SensorDefinition::new("ghost", "nope").with_caching_time(60)]);

    let batch = runner.run_all();
    assert!(batch.get("ghost").unwrap().is_unknown());
    harness.verify_not_cached("ghost").unwrap();
    assert_eq!(harness.cache.writes(), 0);
}

#[test]
fn test_is_enabled_panic_does_not_stop_batch() {
    let mut harness = TestHarness::new();
    register_faulty(&mut harness, "flaky", "is_enabled");
    let runs = harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        SensorDefinition::new("flaky", "flaky").with_caching_time(60),
        queue(1),
    ]);

    let batch = runner.run_all();
    assert_eq!(batch.names(), vec!["flaky", "queue"]);
    let flaky = batch.get("flaky").unwrap();
    assert!(flaky.is_unknown());
    assert!(flaky.message().contains("Sensor panicked: enabled flag unreadable"));
    assert_eq!(runs.count(), 1);
    assert_eq!(batch.get("queue").unwrap().status(), SensorStatus::Ok);
    harness.verify_not_cached("flaky").unwrap();
}

#[test]
fn test_factory_panic_does_not_stop_batch() {
    let mut harness = TestHarness::new();
    harness
        .registry_mut()
        .register("broken", |_| panic!("cannot build sensor"));
    let runs = harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        SensorDefinition::new("broken", "broken"),
        SensorDefinition::new("broken_off", "broken").disabled(),
        queue(1),
    ]);

    let batch = runner.run_all();
    assert_eq!(batch.names(), vec!["broken", "queue"]);
    let broken = batch.get("broken").unwrap();
    assert!(broken.is_unknown());
    assert!(broken.message().contains("cannot build sensor"));
    assert_eq!(runs.count(), 1);
}

#[test]
fn test_verbose_panic_keeps_result() {
    let mut harness = TestHarness::new();
    register_faulty(&mut harness, "chatty", "result_verbose");
    register_faulty(&mut harness, "calm", "none");
    let mut runner = harness.runner(vec![
        SensorDefinition::new("chatty", "chatty")
            .with_expected_value(1)
            .with_extended_info(),
        SensorDefinition::new("calm", "calm").with_extended_info(),
    ]);
    runner.set_verbose(true);

    let batch = runner.run_all();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.get("chatty").unwrap().status(), SensorStatus::Ok);
    assert!(!runner.verbose_output().contains_key("chatty"));
    assert_eq!(runner.verbose_output()["calm"], "fine");
}

#[test]
fn test_cache_unavailable_runs_fresh() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    harness.cache.insert_raw(
        &sensor_cache_id("queue"),
        RecordBuilder::new("queue").status(SensorStatus::Critical).to_json(),
        T + 600,
    );
    harness.cache.fail_reads(true);
    let mut runner = harness.runner(vec![queue(1).with_caching_time(60)]);

    let batch = runner.run_all();
    let result = batch.get("queue").unwrap();
    assert!(!result.is_cached());
    assert!(result.is_ok());
    assert_eq!(runs.count(), 1);
}

#[test]
fn test_valid_cache_record_is_used() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    harness.cache.insert_raw(
        &sensor_cache_id("queue"),
        RecordBuilder::new("queue")
            .status(SensorStatus::Critical)
            .value(99)
            .message("Value 99, exceeds 50")
            .to_json(),
        T + 1,
    );
    let mut runner = harness.runner(vec![queue(1).with_caching_time(60)]);

    let batch = runner.run_all();
    let result = batch.get("queue").unwrap();
    assert!(result.is_cached());
    assert!(result.is_critical());
    assert_eq!(result.message(), "Value 99, exceeds 50");
    assert_eq!(runs.count(), 0);
}

#[test]
fn test_malformed_cache_record_is_a_miss() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    harness
        .cache
        .insert_raw(&sensor_cache_id("queue"), serde_json::json!({"bogus": true}), T + 600);
    let mut runner = harness.runner(vec![queue(1).with_caching_time(60)]);

    let batch = runner.run_all();
    assert!(!batch.get("queue").unwrap().is_cached());
    assert_eq!(runs.count(), 1);
    harness.verify_cached("queue", T + 60).unwrap();
}

#[test]
fn test_store_write_failures_do_not_affect_batch() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    harness.result_log.fail_saves(true);
    harness.cache.fail_writes(true);
    let mut runner = harness.runner(vec![queue(20).with_caching_time(60), queue(1)]);

    let batch = runner.run_all();
    assert_eq!(batch.len(), 1);
    assert!(batch.get("queue").unwrap().is_warning());
    assert!(harness.result_log.records().is_empty());
    harness.verify_not_cached("queue").unwrap();
}

#[test]
fn test_single_batched_cache_lookup() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        SensorDefinition::new("a", "value").with_caching_time(30),
        SensorDefinition::new("b", "value").with_caching_time(60),
        SensorDefinition::new("c", "value"),
        SensorDefinition::new("d", "value").with_caching_time(90),
    ]);

    runner.run_all();
    assert_eq!(harness.cache.lookups(), 1);
    assert_eq!(harness.cache.writes(), 3);
    harness.verify_not_cached("c").unwrap();
}

#[test]
fn test_no_cache_lookup_without_caching_sensors() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![queue(1)]);

    runner.run_all();
    assert_eq!(harness.cache.lookups(), 0);
}

#[test]
fn test_verbose_output_capture() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![
        queue(1).with_extended_info(),
        SensorDefinition::new("plain", "value").with_setting("value", 1),
    ]);

    runner.run_all();
    assert!(runner.verbose_output().is_empty());

    runner.set_verbose(true);
    runner.run_all();
    let output = runner.verbose_output();
    assert_eq!(output.len(), 1);
    let text = &output["queue"];
    assert!(text.starts_with("[queue]"));
    assert!(text.contains("Sensor: queue"));
    assert!(text.contains("Status: OK"));

    runner.set_verbose(false);
    runner.run_all();
    assert!(runner.verbose_output().is_empty());
}

#[test]
fn test_verbose_output_for_cached_result() {
    let mut harness = TestHarness::new();
    harness.value_sensor("value");
    let mut runner = harness.runner(vec![queue(1).with_caching_time(60).with_extended_info()]);
    runner.set_verbose(true);

    runner.run_all();
    harness.clock.advance(1);
    runner.run_all();
    assert!(runner.verbose_output()["queue"].contains("Cached: yes"));
}

#[test]
fn test_only_runs_named_subset() {
    let mut harness = TestHarness::new();
    let runs = harness.value_sensor("value");
    let mut runner = harness
        .runner(vec![
            SensorDefinition::new("a", "value"),
            SensorDefinition::new("b", "value"),
        ])
        .only(&["b"]);

    let batch = runner.run_all();
    assert_eq!(batch.names(), vec!["b"]);
    assert_eq!(runs.count(), 1);
}

fn file_backed_runner(dir: &std::path::Path, clock: Arc<ManualClock>) -> (SensorRunner, RunCounter, Arc<JsonFileResultLog>) {
    let mut registry = SensorRegistry::new();
    let runs = ScriptedSensor::register(&mut registry, "value", |_, result| {
        result.set_value(20);
        Ok(())
    });
    let cache = Arc::new(JsonFileCacheStore::open(dir.join("cache.json")).unwrap());
    let log = Arc::new(JsonFileResultLog::open(dir.join("results.json")).unwrap());
    let runner = SensorRunner::new(vec![queue(20).with_caching_time(60)], Arc::new(registry), cache, log.clone())
        .with_clock(clock);
    (runner, runs, log)
}

#[test]
fn test_cache_and_log_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T));

    let (mut runner, runs, _) = file_backed_runner(dir.path(), clock.clone());
    runner.run_all();
    assert_eq!(runs.count(), 1);
    drop(runner);

    clock.advance(30);
    let (mut runner, runs, log) = file_backed_runner(dir.path(), clock.clone());
    let batch = runner.run_all();
    let result = batch.get("queue").unwrap();
    assert!(result.is_cached());
    assert!(result.is_warning());
    assert_eq!(runs.count(), 0);
    assert_eq!(log.last_status("queue").unwrap(), Some(SensorStatus::Warning));
    assert_eq!(log.history("queue", 10).unwrap().len(), 1);
}
