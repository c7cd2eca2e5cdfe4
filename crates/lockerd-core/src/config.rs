//! Lock manager configuration.

use std::time::Duration;

/// Configuration for [`LockManager`](crate::manager::LockManager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Interval between maintenance worker passes.
    ///
    /// Defaults to 10 milliseconds. A zero interval falls back to the
    /// default.
    pub maintenance_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            maintenance_interval: Duration::from_millis(10),
        }
    }
}
