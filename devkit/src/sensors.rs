/*!
Scripted sensors

A scripted sensor runs a shared closure instead of reading a real source,
and counts how often it actually ran. Cache hits do not count.
*/

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vigil_core::{Sensor, SensorDefinition, SensorError, SensorRegistry, SensorResult};

pub type Script = Arc<dyn Fn(&SensorDefinition, &mut SensorResult) -> Result<(), SensorError> + Send + Sync>;

/// Number of times the sensors of one type ran.
#[derive(Debug, Clone, Default)]
pub struct RunCounter(Arc<AtomicUsize>);

impl RunCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ScriptedSensor {
    definition: SensorDefinition,
    script: Script,
    runs: RunCounter,
}

impl ScriptedSensor {
    /// Registers `script` under `sensor_type`, returns its run counter.
    pub fn register<F>(registry: &mut SensorRegistry, sensor_type: &str, script: F) -> RunCounter
    where
        F: Fn(&SensorDefinition, &mut SensorResult) -> Result<(), SensorError> + Send + Sync + 'static,
    {
        let script: Script = Arc::new(script);
        let runs = RunCounter::default();
        let counter = runs.clone();
        registry.register(sensor_type, move |def| {
            Box::new(ScriptedSensor {
                definition: def.clone(),
                script: script.clone(),
                runs: counter.clone(),
            })
        });
        runs
    }
}

impl Sensor for ScriptedSensor {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    fn run(&mut self, result: &mut SensorResult) -> Result<(), SensorError> {
        self.runs.bump();
        (self.script)(&self.definition, result)
    }

    fn result_verbose(&self, result: &SensorResult) -> String {
        format!("[{}] {}", self.definition.label(), result.verbose())
    }
}
