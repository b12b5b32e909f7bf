//! Lock-free per-shard counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NO_LATENCY: u64 = u64::MAX;

/// Counters updated by the shard task and read through its handle
#[derive(Debug)]
pub struct ShardMetrics {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    reconnects: AtomicU64,
    latency_ms: AtomicU64,
}

/// Point-in-time copy of [`ShardMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardMetricsSnapshot {
    pub frames_received: u64,
    pub frames_sent: u64,
    pub reconnects: u64,
    pub latency: Option<Duration>,
}

impl ShardMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            latency_ms: AtomicU64::new(NO_LATENCY),
        }
    }

    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconnects(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(NO_LATENCY - 1);
        self.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        match self.latency_ms.load(Ordering::Relaxed) {
            NO_LATENCY => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ShardMetricsSnapshot {
        ShardMetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            latency: self.latency(),
        }
    }
}

impl Default for ShardMetrics {
    fn default() -> Self {
        Self::new()
    }
}
