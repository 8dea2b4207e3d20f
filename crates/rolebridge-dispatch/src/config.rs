//! Dispatcher configuration.

use serde::Deserialize;

/// Sizing for the two execution contexts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of the authoritative context's job queue. When full,
    /// `run_sync` callers wait (bounded channel backpressure).
    pub channel_size: usize,

    /// Maximum number of worker-pool jobs running at once.
    pub max_workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_size: 64,
            max_workers: 16,
        }
    }
}

impl DispatchConfig {
    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Both sizes must be at least 1; a zero-capacity channel or a pool
    /// with no permits would deadlock the first caller.
    pub fn validated(mut self) -> Self {
        if self.channel_size == 0 {
            tracing::warn!("channel_size of 0 is invalid, using 1");
            self.channel_size = 1;
        }
        if self.max_workers == 0 {
            tracing::warn!("max_workers of 0 is invalid, using 1");
            self.max_workers = 1;
        }
        self
    }
}
