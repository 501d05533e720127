use std::fs;
use std::path::Path;

use vigil_core::{Sensor, SensorDefinition, SensorError, SensorResult, StatusMessage};

/// Counts the regular files waiting in a spool directory (`settings.path`).
pub struct SpoolPending {
    definition: SensorDefinition,
}

impl SpoolPending {
    pub fn new(definition: &SensorDefinition) -> Self {
        Self {
            definition: definition.clone(),
        }
    }
}

impl Sensor for SpoolPending {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    fn run(&mut self, result: &mut SensorResult) -> Result<(), SensorError> {
        let path = self
            .definition
            .setting_str("path")
            .ok_or_else(|| SensorError::Failed("missing 'path' setting".into()))?;

        let pending = count_files(Path::new(path))?;
        result.set_value(pending);
        result.add_status_message(
            StatusMessage::new("{count} pending in {path}")
                .var("count", pending)
                .var("path", path),
        );
        Ok(())
    }

    fn result_verbose(&self, result: &SensorResult) -> String {
        let path = self.definition.setting_str("path").unwrap_or("-");
        format!("{}\nSpool: {}", result.verbose(), path)
    }
}

fn count_files(dir: &Path) -> Result<usize, SensorError> {
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{SensorValue, ThresholdSpec};

    fn spool_def(path: &Path) -> SensorDefinition {
        SensorDefinition::new("mail_queue", "spool_pending")
            .with_setting("path", path.to_string_lossy().as_ref())
            .with_thresholds(ThresholdSpec::exceeds(2.0, 10.0))
    }

    #[test]
    fn test_counts_regular_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.msg", "b.msg", "c.msg"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }
        fs::create_dir(dir.path().join("archive")).unwrap();

        let def = spool_def(dir.path());
        let mut sensor = SpoolPending::new(&def);
        let mut result = SensorResult::new(&def, 0);
        sensor.run(&mut result).unwrap();
        result.compile();

        assert_eq!(result.value(), Some(&SensorValue::Int(3)));
        assert!(result.is_warning());
        assert!(result.message().starts_with("3 pending in "));
        assert!(result.message().ends_with(", exceeds 2"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let def = spool_def(&dir.path().join("gone"));
        let mut sensor = SpoolPending::new(&def);
        let mut result = SensorResult::new(&def, 0);
        assert!(matches!(sensor.run(&mut result), Err(SensorError::Io(_))));
    }

    #[test]
    fn test_missing_path_setting() {
        let def = SensorDefinition::new("mail_queue", "spool_pending");
        let mut sensor = SpoolPending::new(&def);
        let mut result = SensorResult::new(&def, 0);
        assert!(matches!(sensor.run(&mut result), Err(SensorError::Failed(_))));
    }
}
