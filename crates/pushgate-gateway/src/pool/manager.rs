//! Shard pool manager

use super::{PoolConfig, PoolError};
use crate::events::GatewayEvent;
use crate::identify::IdentifyGate;
use crate::protocol::{OpCode, PresenceUpdatePayload};
use crate::rest::{GatewayInfoProvider, SessionStartLimit};
use crate::shard::{Shard, ShardConfig, ShardError, ShardHandle, ShardStatus, ShutdownIntent};
use crate::transport::Connector;
use dashmap::DashMap;
use futures::future::{join_all, select_all};
use parking_lot::Mutex;
use pushgate_core::{shard_for_guild, CoreError, ShardInfo, Snowflake};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Length of the session start period once the reported reset has passed
const SESSION_LIMIT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Everything the launcher task needs to start shards
struct Launch {
    gateway_url: String,
    config: Arc<ShardConfig>,
    connector: Arc<dyn Connector>,
    events: mpsc::Sender<GatewayEvent>,
    spawn_timeout: Duration,
    ready: watch::Sender<bool>,
}

/// All shards of one account run by this process
pub struct ShardPool {
    shard_count: u32,
    shard_ids: Vec<u32>,
    gateway_url: String,
    gate: Arc<IdentifyGate>,
    shards: DashMap<u32, ShardHandle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    launcher: Mutex<Option<JoinHandle<()>>>,
    ready: watch::Receiver<bool>,
    shutting_down: AtomicBool,
}

impl ShardPool {
    /// Look up the gateway, then start the shards in the background
    ///
    /// Returns once the launch has begun. Shards identify one after another
    /// through a shared [`IdentifyGate`]; progress shows up on the returned
    /// event receiver.
    pub async fn connect(
        config: ShardConfig,
        pool_config: PoolConfig,
        provider: &dyn GatewayInfoProvider,
        connector: Arc<dyn Connector>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<GatewayEvent>), PoolError> {
        let info = provider.gateway_info().await?;

        let shard_count = pool_config
            .shard_count
            .unwrap_or(info.recommended_shard_count);
        let shard_ids = select_shards(shard_count, pool_config.shard_ids.as_deref())?;

        let limit = &info.session_start_limit;
        let gate = IdentifyGate::new(pool_config.identify_window)
            .with_concurrency(limit.max_concurrency);
        let gate = Arc::new(if limit.is_exhausted() {
            let wait = limit.reset_after();
            warn!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "Session start limit exhausted, waiting for reset"
            );
            sleep(wait).await;
            gate.with_session_limit(limit.total, limit.total, SESSION_LIMIT_PERIOD)
        } else {
            session_limited(gate, limit)
        });

        info!(
            url = %info.url,
            shard_count,
            shards = ?shard_ids,
            max_concurrency = gate.concurrency(),
            "Starting shard pool"
        );

        let (events, receiver) = mpsc::channel(pool_config.event_buffer.max(1));
        let (ready_tx, ready_rx) = watch::channel(false);

        let pool = Arc::new(Self {
            shard_count,
            shard_ids,
            gateway_url: info.url.clone(),
            gate,
            shards: DashMap::new(),
            tasks: Mutex::new(Vec::new()),
            launcher: Mutex::new(None),
            ready: ready_rx,
            shutting_down: AtomicBool::new(false),
        });

        let launch = Launch {
            gateway_url: info.url,
            config: Arc::new(config),
            connector,
            events,
            spawn_timeout: pool_config.spawn_timeout,
            ready: ready_tx,
        };
        let launcher = tokio::spawn(Arc::clone(&pool).launch(launch));
        *pool.launcher.lock() = Some(launcher);

        Ok((pool, receiver))
    }

    /// Start shards in order, then track when all of them are connected
    async fn launch(self: Arc<Self>, launch: Launch) {
        for &id in &self.shard_ids {
            if self.shutting_down.load(Ordering::Acquire) {
                return;
            }
            let info = match ShardInfo::new(id, self.shard_count) {
                Ok(info) => info,
                Err(e) => {
                    warn!(shard_id = id, error = %e, "Skipping invalid shard");
                    continue;
                }
            };

            let shard = Shard::new(
                info,
                launch.gateway_url.clone(),
                Arc::clone(&launch.config),
                Arc::clone(&self.gate),
                Arc::clone(&launch.connector),
                launch.events.clone(),
            );
            let (handle, task) = shard.spawn();
            self.shards.insert(id, handle.clone());
            self.tasks.lock().push(task);
            debug!(shard_id = id, "Shard spawned");

            match timeout(launch.spawn_timeout, handle.wait_for_status(ShardStatus::is_settled)).await
            {
                Ok(Ok(status)) => debug!(shard_id = id, %status, "Shard settled"),
                Ok(Err(_)) => warn!(shard_id = id, "Shard stopped during startup"),
                Err(_) => warn!(
                    shard_id = id,
                    status = %handle.status(),
                    "Shard did not settle in time, starting the next one"
                ),
            }
        }

        info!(shards = self.shards.len(), "All shards launched");
        self.track_readiness(&launch).await;
    }

    /// Maintain the ready flag and announce the first time every shard is connected
    async fn track_readiness(&self, launch: &Launch) {
        let mut receivers: Vec<watch::Receiver<ShardStatus>> = self
            .shards
            .iter()
            .map(|entry| entry.value().subscribe_status())
            .collect();
        let mut announced = false;

        loop {
            let all_connected = self.shards.len() == self.shard_ids.len()
                && self
                    .shards
                    .iter()
                    .all(|entry| entry.value().status() == ShardStatus::Connected);
            launch.ready.send_replace(all_connected);

            if all_connected && !announced {
                announced = true;
                info!("All shards ready");
                if launch.events.send(GatewayEvent::AllShardsReady).await.is_err() {
                    return;
                }
            }

            if receivers.is_empty() {
                return;
            }

            let (closed, index) = {
                let changes = receivers.iter_mut().map(|rx| Box::pin(rx.changed()));
                let (result, index, _) = select_all(changes).await;
                (result.is_err(), index)
            };
            if closed {
                receivers.swap_remove(index);
            }
        }
    }

    /// Total shard count of the account
    #[must_use]
    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Shards run by this pool
    #[must_use]
    pub fn shard_ids(&self) -> &[u32] {
        &self.shard_ids
    }

    #[must_use]
    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    /// Shard that receives events for `guild_id`
    #[must_use]
    pub fn shard_for_guild(&self, guild_id: Snowflake) -> u32 {
        shard_for_guild(guild_id, self.shard_count)
    }

    #[must_use]
    pub fn shard(&self, id: u32) -> Option<ShardHandle> {
        self.shards.get(&id).map(|entry| entry.value().clone())
    }

    /// Send a frame on the shard that owns `guild_id`
    pub async fn send_to_guild(
        &self,
        guild_id: Snowflake,
        op: OpCode,
        data: Value,
    ) -> Result<(), PoolError> {
        let shard_id = self.shard_for_guild(guild_id);
        let handle = self
            .shard(shard_id)
            .ok_or(PoolError::ShardNotRunning(shard_id))?;
        handle
            .send(op, data)
            .await
            .map_err(|source| PoolError::Shard { shard_id, source })
    }

    /// Send a frame on every shard
    pub async fn broadcast(&self, op: OpCode, data: Value) -> Vec<(u32, Result<(), ShardError>)> {
        let handles = self.handles();
        join_all(handles.into_iter().map(|handle| {
            let data = data.clone();
            async move { (handle.id(), handle.send(op, data).await) }
        }))
        .await
    }

    /// Update the presence on every shard
    pub async fn update_presence(
        &self,
        presence: PresenceUpdatePayload,
    ) -> Vec<(u32, Result<(), ShardError>)> {
        let handles = self.handles();
        join_all(handles.into_iter().map(|handle| {
            let presence = presence.clone();
            async move { (handle.id(), handle.update_presence(presence).await) }
        }))
        .await
    }

    /// Current status of every started shard
    #[must_use]
    pub fn statuses(&self) -> BTreeMap<u32, ShardStatus> {
        self.shards
            .iter()
            .map(|entry| (*entry.key(), entry.value().status()))
            .collect()
    }

    /// Shards that stopped for good
    #[must_use]
    pub fn dead_shards(&self) -> Vec<u32> {
        let mut dead: Vec<u32> = self
            .shards
            .iter()
            .filter(|entry| entry.value().status() == ShardStatus::Dead)
            .map(|entry| *entry.key())
            .collect();
        dead.sort_unstable();
        dead
    }

    /// Check if every shard is currently connected
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until every shard is connected
    pub async fn wait_until_ready(&self) -> Result<(), PoolError> {
        let mut ready = self.ready.clone();
        let result = ready.wait_for(|ready| *ready).await;
        result.map(|_| ()).map_err(|_| PoolError::ShuttingDown)
    }

    /// Stop launching, close every shard, and wait for their tasks
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down shard pool");

        if let Some(launcher) = self.launcher.lock().take() {
            launcher.abort();
        }

        join_all(
            self.handles()
                .into_iter()
                .map(|handle| async move { handle.shutdown(ShutdownIntent::Idle).await }),
        )
        .await;

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in join_all(tasks).await {
            if let Err(e) = task {
                warn!(error = %e, "Shard task ended abnormally");
            }
        }
        info!("Shard pool stopped");
    }

    fn handles(&self) -> Vec<ShardHandle> {
        let mut handles: Vec<ShardHandle> = self
            .shards
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        handles.sort_unstable_by_key(ShardHandle::id);
        handles
    }
}

/// Seed the gate with the reported session start quota
fn session_limited(gate: IdentifyGate, limit: &SessionStartLimit) -> IdentifyGate {
    if limit.total == u32::MAX {
        gate
    } else {
        gate.with_session_limit(limit.total, limit.remaining, limit.reset_after())
    }
}

/// Validate and order the shard ids this pool runs
fn select_shards(shard_count: u32, requested: Option<&[u32]>) -> Result<Vec<u32>, PoolError> {
    if shard_count == 0 {
        return Err(CoreError::ZeroShardCount.into());
    }

    let mut ids = match requested {
        Some(ids) => ids.to_vec(),
        None => (0..shard_count).collect(),
    };
    if let Some(&id) = ids.iter().find(|&&id| id >= shard_count) {
        return Err(CoreError::ShardOutOfRange {
            id,
            count: shard_count,
        }
        .into());
    }
    ids.sort_unstable();
    ids.dedup();

    if ids.is_empty() {
        return Err(PoolError::NoShards);
    }
    Ok(ids)
}
