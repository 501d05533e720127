/*!
# Vigil DevKit - Test doubles for sensor runners

- Manual clock
- Scripted sensors with run counters
- Cache and result log that record calls and fail on demand
- `TestHarness` wiring them into a `SensorRunner`
*/

pub mod clock;
pub mod sensors;
pub mod stores;
pub mod test_utils;

pub use clock::ManualClock;
pub use sensors::{RunCounter, ScriptedSensor};
pub use stores::{MockCacheStore, RecordingResultLog};
pub use test_utils::{RecordBuilder, TestHarness, HARNESS_EPOCH};
