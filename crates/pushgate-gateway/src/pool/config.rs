//! Pool settings

use pushgate_common::AppConfig;
use std::time::Duration;

/// Pool-wide settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Total shard count; the recommended count when `None`
    pub shard_count: Option<u32>,
    /// Shards this process runs; all of them when `None`
    pub shard_ids: Option<Vec<u32>>,
    /// Minimum spacing between identifies in one bucket
    pub identify_window: Duration,
    /// Longest wait for a shard to settle before starting the next
    pub spawn_timeout: Duration,
    /// Capacity of the event channel
    pub event_buffer: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            shard_count: None,
            shard_ids: None,
            identify_window: Duration::from_secs(5),
            spawn_timeout: Duration::from_secs(30),
            event_buffer: 1024,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            shard_count: config.sharding.shard_count,
            shard_ids: config.sharding.shard_ids.clone(),
            identify_window: Duration::from_millis(config.sharding.identify_window_ms),
            spawn_timeout: Duration::from_millis(config.sharding.spawn_timeout_ms),
            event_buffer: config.gateway.event_buffer,
        }
    }

    #[must_use]
    pub fn with_shard_count(mut self, count: u32) -> Self {
        self.shard_count = Some(count);
        self
    }

    #[must_use]
    pub fn with_shard_ids(mut self, ids: Vec<u32>) -> Self {
        self.shard_ids = Some(ids);
        self
    }

    #[must_use]
    pub fn with_identify_window(mut self, window: Duration) -> Self {
        self.identify_window = window;
        self
    }

    #[must_use]
    pub fn with_spawn_timeout(mut self, timeout: Duration) -> Self {
        self.spawn_timeout = timeout;
        self
    }
}
