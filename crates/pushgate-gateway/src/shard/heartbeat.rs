//! Heartbeat acknowledgement tracking
//!
//! The shard task owns the interval timer; this type only decides what a
//! tick means and measures round-trip latency.

use std::time::Duration;
use tokio::time::Instant;

/// What to do on a heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a heartbeat now
    Send,
    /// Too many heartbeats went unacknowledged; drop the connection
    Zombie,
}

/// Ack bookkeeping for one connection
#[derive(Debug, Clone)]
pub struct HeartbeatTracker {
    interval: Duration,
    miss_tolerance: u32,
    acked: bool,
    missed: u32,
    last_sent: Option<Instant>,
    last_acked: Option<Instant>,
    latency: Option<Duration>,
}

impl HeartbeatTracker {
    /// Tracker for a fresh connection
    ///
    /// `miss_tolerance` is the number of unacknowledged heartbeats after
    /// which the next tick closes the connection instead of sending.
    #[must_use]
    pub fn new(interval: Duration, miss_tolerance: u32) -> Self {
        Self {
            interval,
            miss_tolerance: miss_tolerance.max(1),
            acked: true,
            missed: 0,
            last_sent: None,
            last_acked: None,
            latency: None,
        }
    }

    /// Decide what the current tick does
    pub fn on_tick(&mut self) -> HeartbeatAction {
        if !self.acked {
            self.missed += 1;
            if self.missed >= self.miss_tolerance {
                return HeartbeatAction::Zombie;
            }
        }
        HeartbeatAction::Send
    }

    /// Record that a heartbeat went out
    pub fn record_sent(&mut self, at: Instant) {
        self.last_sent = Some(at);
        self.acked = false;
    }

    /// Record an ack and return the measured round trip
    pub fn on_ack(&mut self, at: Instant) -> Option<Duration> {
        self.acked = true;
        self.missed = 0;
        self.last_acked = Some(at);
        self.latency = self.last_sent.map(|sent| at.saturating_duration_since(sent));
        self.latency
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.acked
    }

    /// Consecutive ticks that found the previous heartbeat unacknowledged
    #[must_use]
    pub fn missed(&self) -> u32 {
        self.missed
    }

    #[must_use]
    pub fn last_sent(&self) -> Option<Instant> {
        self.last_sent
    }

    #[must_use]
    pub fn last_acked(&self) -> Option<Instant> {
        self.last_acked
    }

    /// Latency of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
