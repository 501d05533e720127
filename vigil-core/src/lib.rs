/*!
# Vigil Core - Sensor execution and result lifecycle

- `threshold`: maps a value and its expectation to a status
- `result`: sensor results and their compilation
- `runner`: batch execution with result caching and result logging
- `store`: cache and result log backends
*/

pub mod clock;
pub mod definition;
pub mod registry;
pub mod result;
pub mod runner;
pub mod sensor;
pub mod status;
pub mod store;
pub mod threshold;
pub mod value;

pub use clock::{Clock, SystemClock};
pub use definition::{LoggingMode, SensorDefinition};
pub use registry::{RegistryError, ResultSeed, SensorRegistry, DEFAULT_RESULT_TYPE};
pub use result::{ResultRecord, SensorResult, StatusMessage};
pub use runner::{sensor_cache_id, RunBatch, SensorRunner};
pub use sensor::{Sensor, SensorError};
pub use status::SensorStatus;
pub use store::{CacheEntry, CacheStore, ResultLog, StoreError};
pub use threshold::{evaluate, Assessment, Expectation, ThresholdError, ThresholdSpec};
pub use value::SensorValue;
