//! Time source injected into the runner

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Current time as unix seconds.
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}
