//! Tuning knobs for how the facade fans out to carriers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Dispatch behavior of [`ParcelHub`](crate::service::ParcelHub).
pub struct DispatchSettings {
    /// Upper bound of carrier calls running at the same time within one request.
    pub max_concurrency: usize,
    /// Deadline for a single carrier call, in milliseconds.
    pub plugin_timeout_ms: u64,
    /// Abort shop searches on the first carrier failure instead of reporting it per carrier.
    pub fail_fast: bool,
    /// Keep carrier instances between calls, keyed by UID and configuration fingerprint.
    pub reuse_instances: bool,
}

impl DispatchSettings {
    /// Deadline for a single carrier call.
    #[must_use]
    pub fn plugin_timeout(&self) -> Duration {
        Duration::from_millis(self.plugin_timeout_ms)
    }

    /// Concurrency bound, never below one.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.max_concurrency.max(1)
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            plugin_timeout_ms: 10_000,
            fail_fast: false,
            reuse_instances: false,
        }
    }
}
