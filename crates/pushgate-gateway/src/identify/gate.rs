//! Identify gate
//!
//! The gateway accepts one identify per window per concurrency bucket and
//! a limited number of session starts per day. Every shard that needs a
//! fresh session waits here first. Resumes never do.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

/// Length of a session start quota period once the first reset has passed
const SESSION_LIMIT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Daily session start budget
#[derive(Debug)]
struct SessionBudget {
    total: u32,
    remaining: u32,
    resets_at: Instant,
}

impl SessionBudget {
    /// Spend one session start, or report when the next one is available
    fn try_take(&mut self, now: Instant) -> Result<(), Instant> {
        if now >= self.resets_at {
            self.remaining = self.total;
            self.resets_at = now + SESSION_LIMIT_PERIOD;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            Ok(())
        } else {
            Err(self.resets_at)
        }
    }
}

/// Serializes identifies across shards
#[derive(Debug)]
pub struct IdentifyGate {
    window: Duration,
    // Time of the last identify in each bucket
    buckets: Vec<tokio::sync::Mutex<Option<Instant>>>,
    budget: Mutex<Option<SessionBudget>>,
}

impl IdentifyGate {
    /// Gate with a single bucket and no session start quota
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buckets: vec![tokio::sync::Mutex::new(None)],
            budget: Mutex::new(None),
        }
    }

    /// Allow `max_concurrency` identifies per window, one per bucket
    #[must_use]
    pub fn with_concurrency(mut self, max_concurrency: u32) -> Self {
        self.buckets = (0..max_concurrency.max(1))
            .map(|_| tokio::sync::Mutex::new(None))
            .collect();
        self
    }

    /// Track the session start quota reported by the gateway info endpoint
    #[must_use]
    pub fn with_session_limit(self, total: u32, remaining: u32, reset_after: Duration) -> Self {
        *self.budget.lock() = Some(SessionBudget {
            total,
            remaining: remaining.min(total),
            resets_at: Instant::now() + reset_after,
        });
        self
    }

    /// Minimum spacing between identifies in one bucket
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of buckets
    #[must_use]
    pub fn concurrency(&self) -> u32 {
        self.buckets.len() as u32
    }

    /// Bucket a shard identifies through
    #[must_use]
    pub fn bucket_for(&self, shard_id: u32) -> usize {
        shard_id as usize % self.buckets.len()
    }

    /// Session starts left in the current period, if a quota is tracked
    #[must_use]
    pub fn remaining_sessions(&self) -> Option<u32> {
        self.budget.lock().as_ref().map(|b| b.remaining)
    }

    /// Wait until `shard_id` may send an identify
    ///
    /// The window and the quota are charged only when this returns, so
    /// dropping the future while it waits leaves the gate untouched.
    pub async fn acquire(&self, shard_id: u32) {
        let bucket = self.bucket_for(shard_id);
        let mut last = self.buckets[bucket].lock().await;

        if let Some(previous) = *last {
            let next = previous + self.window;
            if next > Instant::now() {
                debug!(shard_id, bucket, "Waiting for identify window");
                sleep_until(next).await;
            }
        }

        loop {
            let now = Instant::now();
            let taken = self.budget.lock().as_mut().map_or(Ok(()), |b| b.try_take(now));
            match taken {
                Ok(()) => break,
                Err(resets_at) => {
                    let wait = resets_at.saturating_duration_since(now);
                    info!(
                        shard_id,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "Session start limit exhausted, waiting for reset"
                    );
                    sleep_until(resets_at).await;
                }
            }
        }

        *last = Some(Instant::now());
    }
}
