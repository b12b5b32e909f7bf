//! Cloneable control handle for a running shard

use super::{ShardError, ShardMetrics, ShardMetricsSnapshot, ShardStatus, ShutdownIntent};
use crate::protocol::{OpCode, PresenceUpdatePayload};
use pushgate_core::ShardInfo;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Requests from a handle to its shard task
#[derive(Debug)]
pub(crate) enum ShardCommand {
    Send {
        op: OpCode,
        data: Value,
        reply: oneshot::Sender<Result<(), ShardError>>,
    },
    Shutdown {
        intent: ShutdownIntent,
        done: oneshot::Sender<()>,
    },
}

/// Handle to a spawned shard
#[derive(Debug, Clone)]
pub struct ShardHandle {
    info: ShardInfo,
    commands: mpsc::Sender<ShardCommand>,
    status: watch::Receiver<ShardStatus>,
    metrics: Arc<ShardMetrics>,
}

impl ShardHandle {
    pub(crate) fn new(
        info: ShardInfo,
        commands: mpsc::Sender<ShardCommand>,
        status: watch::Receiver<ShardStatus>,
        metrics: Arc<ShardMetrics>,
    ) -> Self {
        Self {
            info,
            commands,
            status,
            metrics,
        }
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.info.id()
    }

    #[must_use]
    pub fn info(&self) -> ShardInfo {
        self.info
    }

    /// Send a client frame on the current connection
    ///
    /// Fails without queueing when the shard is not connected, the op code
    /// belongs to the handshake, or the outbound quota is spent.
    pub async fn send(&self, op: OpCode, data: Value) -> Result<(), ShardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(ShardCommand::Send { op, data, reply })
            .await
            .map_err(|_| ShardError::Stopped)?;
        response.await.map_err(|_| ShardError::Stopped)?
    }

    /// Update the presence shown for this shard's session
    pub async fn update_presence(&self, presence: PresenceUpdatePayload) -> Result<(), ShardError> {
        if !presence.is_valid_status() {
            return Err(ShardError::InvalidPresence(presence.status));
        }
        let data = serde_json::to_value(&presence)?;
        self.send(OpCode::PresenceUpdate, data).await
    }

    /// Close the connection and stop the task
    ///
    /// Returns once the shard reached its final status. A shard that has
    /// already stopped returns immediately.
    pub async fn shutdown(&self, intent: ShutdownIntent) {
        let (done, finished) = oneshot::channel();
        if self
            .commands
            .send(ShardCommand::Shutdown { intent, done })
            .await
            .is_ok()
        {
            let _ = finished.await;
        }
    }

    #[must_use]
    pub fn status(&self) -> ShardStatus {
        *self.status.borrow()
    }

    /// Wait until the status satisfies `predicate`
    pub async fn wait_for_status<F>(&self, predicate: F) -> Result<ShardStatus, ShardError>
    where
        F: Fn(ShardStatus) -> bool,
    {
        let mut status = self.status.clone();
        let result = status.wait_for(|s| predicate(*s)).await;
        result.map(|s| *s).map_err(|_| ShardError::Stopped)
    }

    /// Receiver notified on every status change
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ShardStatus> {
        self.status.clone()
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.metrics.latency()
    }

    #[must_use]
    pub fn metrics(&self) -> ShardMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Check if the shard task is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}
