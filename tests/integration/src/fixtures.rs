//! Shard and event fixtures

use crate::helpers::{MockConnector, MockGateway, MockSocket, STEP_TIMEOUT};
use pushgate_core::ShardInfo;
use pushgate_gateway::events::GatewayEvent;
use pushgate_gateway::identify::IdentifyGate;
use pushgate_gateway::protocol::OpCode;
use pushgate_gateway::shard::{Session, Shard, ShardConfig, ShardHandle, ShardStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const TEST_TOKEN: &str = "test-token";
pub const GATEWAY_URL: &str = "wss://gateway.test";
pub const RESUME_URL: &str = "wss://resume.test";

/// Heartbeat interval long enough to stay out of the way
pub const SLOW_HEARTBEAT_MS: u64 = 41_250;

/// Shard configuration used by most scenarios
pub fn test_config() -> ShardConfig {
    ShardConfig::new(TEST_TOKEN)
}

/// Connect URL the shard builds for `base`
pub fn connect_url(base: &str) -> String {
    format!("{base}/?v=10&encoding=json")
}

/// A shard running against the in-memory gateway
pub struct TestShard {
    pub handle: ShardHandle,
    pub events: mpsc::Receiver<GatewayEvent>,
    pub gateway: MockGateway,
    pub gate: Arc<IdentifyGate>,
    pub task: JoinHandle<()>,
}

impl TestShard {
    /// Spawn shard 0 of 1 with a 5 second identify window
    pub fn spawn(config: ShardConfig) -> Self {
        let gate = Arc::new(IdentifyGate::new(Duration::from_secs(5)));
        Self::spawn_with(ShardInfo::single(), config, gate)
    }

    pub fn spawn_with(info: ShardInfo, config: ShardConfig, gate: Arc<IdentifyGate>) -> Self {
        Self::build(info, config, gate, None)
    }

    /// Spawn shard 0 of 1 that resumes `session` on its first connection
    pub fn spawn_resuming(config: ShardConfig, session: Session) -> Self {
        let gate = Arc::new(IdentifyGate::new(Duration::from_secs(5)));
        Self::build(ShardInfo::single(), config, gate, Some(session))
    }

    fn build(
        info: ShardInfo,
        config: ShardConfig,
        gate: Arc<IdentifyGate>,
        session: Option<Session>,
    ) -> Self {
        let (connector, gateway) = MockConnector::new();
        let (events_tx, events) = mpsc::channel(1024);
        let mut shard = Shard::new(
            info,
            GATEWAY_URL,
            Arc::new(config),
            Arc::clone(&gate),
            connector,
            events_tx,
        );
        if let Some(session) = session {
            shard = shard.with_session(session);
        }
        let (handle, task) = shard.spawn();
        Self {
            handle,
            events,
            gateway,
            gate,
            task,
        }
    }

    /// Accept a connection, say hello, and wait for the identify
    pub async fn accept_and_identify(&mut self, interval_ms: u64) -> MockSocket {
        let mut socket = self.gateway.accept().await;
        socket.hello(interval_ms);
        socket.expect_op(OpCode::Identify).await;
        socket
    }

    /// Run the handshake through READY with no guilds
    pub async fn connect(&mut self, session_id: &str) -> MockSocket {
        let socket = self.accept_and_identify(SLOW_HEARTBEAT_MS).await;
        socket.ready(1, session_id, &[], Some(RESUME_URL));
        self.wait_for_status(ShardStatus::Connected).await;
        socket
    }

    pub async fn wait_for_status(&self, status: ShardStatus) {
        let reached = timeout(STEP_TIMEOUT, self.handle.wait_for_status(|s| s == status))
            .await
            .expect("timed out waiting for status");
        assert_eq!(reached.expect("shard stopped"), status);
    }

    pub async fn next_event(&mut self) -> GatewayEvent {
        next_event(&mut self.events).await
    }

    pub async fn wait_for_event<F>(&mut self, predicate: F) -> GatewayEvent
    where
        F: Fn(&GatewayEvent) -> bool,
    {
        wait_for_event(&mut self.events, predicate).await
    }

    /// Wait for the shard task to end
    pub async fn join(self) {
        timeout(STEP_TIMEOUT, self.task)
            .await
            .expect("shard task did not finish")
            .expect("shard task panicked");
    }
}

pub async fn next_event(events: &mut mpsc::Receiver<GatewayEvent>) -> GatewayEvent {
    timeout(STEP_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skip events until one matches
pub async fn wait_for_event<F>(events: &mut mpsc::Receiver<GatewayEvent>, predicate: F) -> GatewayEvent
where
    F: Fn(&GatewayEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}
