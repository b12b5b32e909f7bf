//! Shard task
//!
//! Runs the connect → hello → identify/resume → ready cycle and the
//! reconnect policy for one shard.

use super::{
    Backoff, HeartbeatAction, HeartbeatTracker, Session, ShardCommand, ShardConfig, ShardError,
    ShardHandle, ShardMetrics, ShardStatus, ShutdownIntent,
};
use crate::events::{
    EventEnvelope, GatewayEvent, GatewayEventType, GuildAvailability, ReadyEvent,
};
use crate::identify::IdentifyGate;
use crate::protocol::{CloseAction, GatewayMessage, IdentifyPayload, OpCode, ResumePayload};
use crate::transport::{Connector, FrameSink, FrameStream, TransportError, WsFrame};
use futures::{SinkExt, StreamExt};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultDirectRateLimiter, Quota, RateLimiter,
};
use pushgate_core::{ShardInfo, Snowflake};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::future::{pending, Future};
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

/// Upper bound on flushing a close frame into a stalled connection
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

type GateWait = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Why a connection ended
#[derive(Debug)]
enum Disconnect {
    /// Opening the transport failed or timed out
    ConnectFailed(TransportError),
    /// Server sent a close frame
    Closed { code: Option<u16>, reason: String },
    /// Stream errored or ended without a close frame
    Transport(TransportError),
    /// Heartbeats went unacknowledged
    Zombie,
    /// No READY or RESUMED within the handshake timeout
    HandshakeTimeout,
    /// Server asked for a reconnect (op 7)
    ReconnectRequested,
    /// Server invalidated the session (op 9)
    InvalidSession { resumable: bool },
    /// Too many dispatches replayed during a resume
    ReplayOverflow,
    /// Explicit shutdown through the handle
    Shutdown(ShutdownIntent),
    /// Event receiver was dropped
    ConsumerGone,
}

impl Disconnect {
    fn action(&self) -> CloseAction {
        match self {
            Self::Closed { code, .. } => CloseAction::for_code(*code),
            Self::InvalidSession { resumable: false } | Self::ReplayOverflow => {
                CloseAction::FreshSession
            }
            Self::ConnectFailed(_)
            | Self::Transport(_)
            | Self::Zombie
            | Self::HandshakeTimeout
            | Self::ReconnectRequested
            | Self::InvalidSession { resumable: true }
            | Self::Shutdown(_)
            | Self::ConsumerGone => CloseAction::Resume,
        }
    }

    /// Close code the client sends before dropping the socket
    ///
    /// 1000 tells the server the session is over; 4000 keeps it resumable.
    fn client_close_code(&self) -> Option<u16> {
        match self {
            Self::Shutdown(_)
            | Self::ConsumerGone
            | Self::InvalidSession { resumable: false }
            | Self::ReplayOverflow => Some(1000),
            Self::Zombie
            | Self::HandshakeTimeout
            | Self::ReconnectRequested
            | Self::InvalidSession { resumable: true } => Some(4000),
            Self::ConnectFailed(_) | Self::Closed { .. } | Self::Transport(_) => None,
        }
    }

    /// Close code reported in the `Disconnected` event
    fn reported_code(&self) -> Option<u16> {
        match self {
            Self::Closed { code, .. } => *code,
            other => other.client_close_code(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::ConnectFailed(e) => format!("connect failed: {e}"),
            Self::Closed { code, reason } => match code {
                Some(code) => format!("closed by gateway with {code} {reason}"),
                None => "closed by gateway without a code".to_string(),
            },
            Self::Transport(e) => format!("transport error: {e}"),
            Self::Zombie => "heartbeat not acknowledged".to_string(),
            Self::HandshakeTimeout => "handshake timed out".to_string(),
            Self::ReconnectRequested => "gateway requested reconnect".to_string(),
            Self::InvalidSession { resumable } => {
                format!("session invalidated (resumable: {resumable})")
            }
            Self::ReplayOverflow => "resume replay limit exceeded".to_string(),
            Self::Shutdown(_) => "shutdown requested".to_string(),
            Self::ConsumerGone => "event receiver dropped".to_string(),
        }
    }
}

/// Per-connection state, dropped with the connection
#[derive(Default)]
struct Connection {
    heartbeat: Option<Interval>,
    tracker: Option<HeartbeatTracker>,
    identify: Option<GateWait>,
    /// Paused while the identify gate is closed
    handshake_deadline: Option<Instant>,
    ready_deadline: Option<Instant>,
    pending_guilds: HashSet<Snowflake>,
    resuming: bool,
    replayed: u64,
}

/// One step of the connection loop
enum Step {
    Frame(Option<Result<WsFrame, TransportError>>),
    Heartbeat,
    IdentifyReady,
    HandshakeTimeout,
    ReadyTimeout,
    Command(Option<ShardCommand>),
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn gate_opened(wait: &mut Option<GateWait>) {
    match wait {
        Some(wait) => wait.as_mut().await,
        None => pending().await,
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

/// A single gateway connection and its recovery policy
pub struct Shard {
    task: ShardTask,
    handle: ShardHandle,
}

impl Shard {
    pub fn new(
        info: ShardInfo,
        gateway_url: impl Into<String>,
        config: Arc<ShardConfig>,
        gate: Arc<IdentifyGate>,
        connector: Arc<dyn Connector>,
        events: mpsc::Sender<GatewayEvent>,
    ) -> Self {
        let (command_tx, commands) = mpsc::channel(config.command_buffer.max(1));
        let (status, status_rx) = watch::channel(ShardStatus::Idle);
        let metrics = Arc::new(ShardMetrics::new());
        let handle = ShardHandle::new(info, command_tx, status_rx, Arc::clone(&metrics));

        let per_minute = NonZeroU32::new(config.outbound_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));
        let backoff = Backoff::new(config.reconnect_base_delay, config.reconnect_max_delay);

        let task = ShardTask {
            info,
            gateway_url: gateway_url.into(),
            config,
            gate,
            connector,
            events,
            commands,
            status,
            metrics,
            session: Session::new(),
            backoff,
            limiter,
            connected_since: None,
            shutdown_ack: None,
        };
        Self { task, handle }
    }

    /// Resume an existing session on the first connection
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.task.session = session;
        self
    }

    #[must_use]
    pub fn handle(&self) -> ShardHandle {
        self.handle.clone()
    }

    /// Start the shard task
    pub fn spawn(self) -> (ShardHandle, JoinHandle<()>) {
        let Self { task, handle } = self;
        (handle, tokio::spawn(task.run()))
    }

    /// Drive the shard until it is shut down or dies
    ///
    /// The task stops like an idle shutdown once every handle is dropped.
    pub async fn run(self) {
        let Self { task, handle } = self;
        drop(handle);
        task.run().await;
    }
}

/// State owned by the running shard task
struct ShardTask {
    info: ShardInfo,
    gateway_url: String,
    config: Arc<ShardConfig>,
    gate: Arc<IdentifyGate>,
    connector: Arc<dyn Connector>,
    events: mpsc::Sender<GatewayEvent>,
    commands: mpsc::Receiver<ShardCommand>,
    status: watch::Sender<ShardStatus>,
    metrics: Arc<ShardMetrics>,
    session: Session,
    backoff: Backoff,
    limiter: DefaultDirectRateLimiter,
    connected_since: Option<Instant>,
    shutdown_ack: Option<oneshot::Sender<()>>,
}

impl ShardTask {
    #[instrument(name = "shard", skip_all, fields(shard_id = self.info.id(), shard_count = self.info.count()))]
    async fn run(mut self) {
        info!("Shard starting");

        loop {
            self.set_status(ShardStatus::Connecting);
            let url = self.connect_url();

            let disconnect = match self.open(&url).await {
                Ok((sink, stream)) => self.run_connection(sink, stream).await,
                Err(disconnect) => disconnect,
            };

            if !self.recover(disconnect).await {
                break;
            }
        }
    }

    fn connect_url(&self) -> String {
        let base = if self.session.can_resume() {
            self.session.resume_url().unwrap_or(&self.gateway_url)
        } else {
            &self.gateway_url
        };
        self.config.connect_url(base)
    }

    /// Open the transport, still answering commands while it connects
    async fn open(&mut self, url: &str) -> Result<(FrameSink, FrameStream), Disconnect> {
        debug!(url, resuming = self.session.can_resume(), "Connecting to gateway");

        let connector = Arc::clone(&self.connector);
        let connect = timeout(self.config.connect_timeout, connector.connect(url));
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(Ok(pair)) => Ok(pair),
                        Ok(Err(e)) => Err(Disconnect::ConnectFailed(e)),
                        Err(_) => Err(Disconnect::ConnectFailed(TransportError::Connect {
                            url: url.to_string(),
                            reason: "timed out".to_string(),
                        })),
                    };
                }
                command = self.commands.recv() => {
                    if let Some(intent) = self.handle_offline_command(command) {
                        return Err(Disconnect::Shutdown(intent));
                    }
                }
            }
        }
    }

    /// Run one connection until it ends
    async fn run_connection(&mut self, mut sink: FrameSink, mut stream: FrameStream) -> Disconnect {
        let mut conn = Connection {
            handshake_deadline: Some(Instant::now() + self.config.handshake_timeout),
            ..Connection::default()
        };

        let disconnect = loop {
            let step = tokio::select! {
                frame = stream.next() => Step::Frame(frame),
                () = next_tick(&mut conn.heartbeat) => Step::Heartbeat,
                () = gate_opened(&mut conn.identify) => Step::IdentifyReady,
                () = deadline(conn.handshake_deadline) => Step::HandshakeTimeout,
                () = deadline(conn.ready_deadline) => Step::ReadyTimeout,
                command = self.commands.recv() => Step::Command(command),
            };

            let result = match step {
                Step::Frame(frame) => self.on_frame(frame, &mut conn, &mut sink).await,
                Step::Heartbeat => self.on_heartbeat_tick(&mut conn, &mut sink).await,
                Step::IdentifyReady => {
                    conn.identify = None;
                    conn.handshake_deadline = Some(Instant::now() + self.config.handshake_timeout);
                    self.identify(&mut sink).await
                }
                Step::HandshakeTimeout => {
                    let status = *self.status.borrow();
                    warn!(%status, "Gateway handshake timed out");
                    Err(Disconnect::HandshakeTimeout)
                }
                Step::ReadyTimeout => self.on_ready_timeout(&mut conn).await,
                Step::Command(command) => self.on_command(command, &mut sink).await,
            };

            if let Err(disconnect) = result {
                break disconnect;
            }
        };

        // Dropping `conn` cancels the heartbeat timer and any identify wait.
        drop(conn);

        if let Some(code) = disconnect.client_close_code() {
            let close = WsFrame::close(code, disconnect.describe());
            let _ = timeout(CLOSE_TIMEOUT, sink.send(close)).await;
        }
        let _ = timeout(CLOSE_TIMEOUT, sink.close()).await;

        disconnect
    }

    async fn on_frame(
        &mut self,
        frame: Option<Result<WsFrame, TransportError>>,
        conn: &mut Connection,
        sink: &mut FrameSink,
    ) -> Result<(), Disconnect> {
        let decoded = match frame {
            None => return Err(Disconnect::Transport(TransportError::Closed)),
            Some(Err(e)) => return Err(Disconnect::Transport(e)),
            Some(Ok(WsFrame::Close(close))) => {
                return Err(match close {
                    Some(close) => Disconnect::Closed {
                        code: Some(close.code),
                        reason: close.reason,
                    },
                    None => Disconnect::Closed {
                        code: None,
                        reason: String::new(),
                    },
                });
            }
            Some(Ok(WsFrame::Text(text))) => GatewayMessage::from_json(&text),
            Some(Ok(WsFrame::Binary(data))) => GatewayMessage::from_slice(&data),
        };
        self.metrics.increment_received();

        match decoded {
            Ok(message) => self.on_message(message, conn, sink).await,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable gateway frame");
                Ok(())
            }
        }
    }

    async fn on_message(
        &mut self,
        message: GatewayMessage,
        conn: &mut Connection,
        sink: &mut FrameSink,
    ) -> Result<(), Disconnect> {
        trace!(%message, "Gateway frame");

        match message.op {
            OpCode::Dispatch => self.on_dispatch(message, conn).await,
            OpCode::Hello => self.on_hello(&message, conn, sink).await,
            OpCode::Heartbeat => {
                debug!("Gateway requested a heartbeat");
                self.write(sink, &GatewayMessage::heartbeat(self.session.sequence()))
                    .await
            }
            OpCode::HeartbeatAck => {
                if let Some(latency) = conn
                    .tracker
                    .as_mut()
                    .and_then(|t| t.on_ack(Instant::now()))
                {
                    self.metrics.record_latency(latency);
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    trace!(latency_ms, "Heartbeat acknowledged");
                }
                Ok(())
            }
            OpCode::Reconnect => {
                info!("Gateway requested reconnect");
                Err(Disconnect::ReconnectRequested)
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                info!(resumable, "Session invalidated by gateway");
                Err(Disconnect::InvalidSession { resumable })
            }
            op => {
                debug!(%op, "Ignoring unexpected op code");
                Ok(())
            }
        }
    }

    async fn on_hello(
        &mut self,
        message: &GatewayMessage,
        conn: &mut Connection,
        sink: &mut FrameSink,
    ) -> Result<(), Disconnect> {
        if conn.tracker.is_some() {
            debug!("Ignoring repeated Hello");
            return Ok(());
        }
        let Some(hello) = message.as_hello() else {
            warn!("Dropping Hello without a heartbeat interval");
            return Ok(());
        };

        let period = Duration::from_millis(hello.heartbeat_interval.max(1));
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        conn.heartbeat = Some(interval);
        conn.tracker = Some(HeartbeatTracker::new(
            period,
            self.config.heartbeat_miss_tolerance,
        ));
        debug!(interval_ms = hello.heartbeat_interval, "Received Hello");

        self.set_status(ShardStatus::Identifying);

        if let (true, Some(session_id)) = (self.session.can_resume(), self.session.session_id()) {
            let payload = ResumePayload {
                token: self.config.token.clone(),
                session_id: session_id.to_string(),
                seq: self.session.sequence(),
            };
            info!(session_id = %payload.session_id, seq = payload.seq, "Resuming session");
            conn.resuming = true;
            conn.replayed = 0;
            self.write(sink, &GatewayMessage::resume(&payload)).await
        } else {
            let gate = Arc::clone(&self.gate);
            let shard_id = self.info.id();
            debug!("Waiting for identify gate");
            conn.handshake_deadline = None;
            conn.identify = Some(Box::pin(async move { gate.acquire(shard_id).await }));
            Ok(())
        }
    }

    async fn identify(&mut self, sink: &mut FrameSink) -> Result<(), Disconnect> {
        self.session = Session::new();

        let payload = IdentifyPayload {
            token: self.config.token.clone(),
            properties: self.config.properties.clone(),
            intents: self.config.intents,
            shard: Some(self.info),
            large_threshold: self.config.large_threshold,
            presence: self.config.presence.clone(),
        };
        info!(intents = %self.config.intents, "Identifying");
        self.write(sink, &GatewayMessage::identify(&payload)).await
    }

    async fn on_dispatch(
        &mut self,
        message: GatewayMessage,
        conn: &mut Connection,
    ) -> Result<(), Disconnect> {
        let Some(event_type) = message.t else {
            warn!(seq = ?message.s, "Dropping dispatch without an event name");
            return Ok(());
        };
        if let Some(seq) = message.s {
            self.session.observe_sequence(seq);
        }
        let sequence = message.s.unwrap_or_else(|| self.session.sequence());
        let payload = message.d.unwrap_or(Value::Null);
        let kind = GatewayEventType::from_name(&event_type);

        let ready = match kind {
            GatewayEventType::Ready => match ReadyEvent::deserialize(&payload) {
                Ok(ready) => Some(ready),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed READY");
                    return Ok(());
                }
            },
            _ => None,
        };
        let arrived = match kind {
            GatewayEventType::GuildCreate => GuildAvailability::deserialize(&payload)
                .ok()
                .filter(GuildAvailability::is_available)
                .map(|g| g.id),
            _ => None,
        };

        self.emit(GatewayEvent::Dispatch {
            shard_id: self.info.id(),
            event: EventEnvelope {
                event_type,
                kind,
                sequence,
                payload,
            },
        })
        .await?;

        match kind {
            GatewayEventType::Ready => {
                if let Some(ready) = ready {
                    self.on_ready(ready, conn).await?;
                }
            }
            GatewayEventType::Resumed => self.on_resumed(conn).await?,
            _ if conn.resuming => {
                conn.replayed += 1;
                if let Some(max) = self.config.max_resume_replay {
                    if conn.replayed > max {
                        warn!(replayed = conn.replayed, max, "Resume replay limit exceeded");
                        return Err(Disconnect::ReplayOverflow);
                    }
                }
            }
            _ => {}
        }

        if let Some(guild_id) = arrived {
            if conn.pending_guilds.remove(&guild_id) && conn.pending_guilds.is_empty() {
                debug!("All guilds received");
                self.mark_connected(conn).await?;
            }
        }

        Ok(())
    }

    async fn on_ready(&mut self, ready: ReadyEvent, conn: &mut Connection) -> Result<(), Disconnect> {
        self.session
            .establish(ready.session_id.clone(), ready.resume_gateway_url.clone());
        conn.resuming = false;
        conn.handshake_deadline = None;
        conn.pending_guilds = ready.pending_guild_ids().collect();

        info!(
            session_id = %ready.session_id,
            guilds = conn.pending_guilds.len(),
            "Session ready"
        );

        if conn.pending_guilds.is_empty() {
            self.mark_connected(conn).await
        } else {
            self.set_status(ShardStatus::WaitingForInitialState);
            conn.ready_deadline = Some(Instant::now() + self.config.ready_timeout);
            Ok(())
        }
    }

    async fn on_resumed(&mut self, conn: &mut Connection) -> Result<(), Disconnect> {
        let replayed = conn.replayed;
        conn.resuming = false;
        conn.replayed = 0;
        conn.handshake_deadline = None;
        info!(replayed, "Session resumed");

        self.set_status(ShardStatus::Connected);
        self.connected_since = Some(Instant::now());
        self.emit(GatewayEvent::Resumed {
            shard_id: self.info.id(),
            replayed,
        })
        .await
    }

    async fn on_ready_timeout(&mut self, conn: &mut Connection) -> Result<(), Disconnect> {
        let missing = conn.pending_guilds.len();
        warn!(missing, "Initial guild state incomplete, continuing without it");
        self.emit(GatewayEvent::Debug {
            shard_id: self.info.id(),
            message: format!("ready timeout with {missing} guilds still unavailable"),
        })
        .await?;
        self.mark_connected(conn).await
    }

    async fn mark_connected(&mut self, conn: &mut Connection) -> Result<(), Disconnect> {
        conn.ready_deadline = None;
        conn.pending_guilds.clear();
        self.set_status(ShardStatus::Connected);
        self.connected_since = Some(Instant::now());

        let session_id = self.session.session_id().unwrap_or_default().to_string();
        self.emit(GatewayEvent::Established {
            shard_id: self.info.id(),
            session_id,
        })
        .await
    }

    async fn on_heartbeat_tick(
        &mut self,
        conn: &mut Connection,
        sink: &mut FrameSink,
    ) -> Result<(), Disconnect> {
        let Some(tracker) = conn.tracker.as_mut() else {
            return Ok(());
        };

        match tracker.on_tick() {
            HeartbeatAction::Zombie => {
                warn!(missed = tracker.missed(), "Heartbeat not acknowledged, connection is zombied");
                Err(Disconnect::Zombie)
            }
            HeartbeatAction::Send => {
                tracker.record_sent(Instant::now());
                trace!(seq = self.session.sequence(), "Sending heartbeat");
                self.write(sink, &GatewayMessage::heartbeat(self.session.sequence()))
                    .await
            }
        }
    }

    async fn on_command(
        &mut self,
        command: Option<ShardCommand>,
        sink: &mut FrameSink,
    ) -> Result<(), Disconnect> {
        match command {
            Some(ShardCommand::Send { op, data, reply }) => {
                if let Err(e) = self.check_send(op) {
                    let _ = reply.send(Err(e));
                    return Ok(());
                }
                let result = self.write(sink, &GatewayMessage::new(op, data)).await;
                let _ = reply.send(match &result {
                    Ok(()) => Ok(()),
                    Err(_) => Err(ShardError::NotConnected {
                        status: *self.status.borrow(),
                    }),
                });
                result
            }
            Some(ShardCommand::Shutdown { intent, done }) => {
                self.shutdown_ack = Some(done);
                Err(Disconnect::Shutdown(intent))
            }
            // Every handle was dropped
            None => Err(Disconnect::Shutdown(ShutdownIntent::Idle)),
        }
    }

    fn check_send(&self, op: OpCode) -> Result<(), ShardError> {
        if op.is_reserved() {
            return Err(ShardError::ReservedOpcode(op));
        }
        if !op.is_client_op() {
            return Err(ShardError::NotClientOpcode(op));
        }
        let status = *self.status.borrow();
        if !status.can_send() {
            return Err(ShardError::NotConnected { status });
        }
        self.limiter.check().map_err(|not_until| ShardError::RateLimited {
            retry_after: not_until.wait_time_from(DefaultClock::default().now()),
        })
    }

    /// Answer a command while no connection is open
    ///
    /// Returns the shutdown intent if the command stops the shard.
    fn handle_offline_command(&mut self, command: Option<ShardCommand>) -> Option<ShutdownIntent> {
        match command {
            Some(ShardCommand::Send { reply, .. }) => {
                let _ = reply.send(Err(ShardError::NotConnected {
                    status: *self.status.borrow(),
                }));
                None
            }
            Some(ShardCommand::Shutdown { intent, done }) => {
                self.shutdown_ack = Some(done);
                Some(intent)
            }
            None => Some(ShutdownIntent::Idle),
        }
    }

    async fn write(&self, sink: &mut FrameSink, message: &GatewayMessage) -> Result<(), Disconnect> {
        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, op = %message.op, "Failed to encode frame");
                return Ok(());
            }
        };
        sink.send(WsFrame::Text(text))
            .await
            .map_err(Disconnect::Transport)?;
        self.metrics.increment_sent();
        Ok(())
    }

    async fn emit(&self, event: GatewayEvent) -> Result<(), Disconnect> {
        self.events
            .send(event)
            .await
            .map_err(|_| Disconnect::ConsumerGone)
    }

    fn set_status(&self, status: ShardStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            debug!(from = %previous, to = %status, "Shard status changed");
        }
    }

    /// Apply the close policy; returns false when the shard stops
    async fn recover(&mut self, disconnect: Disconnect) -> bool {
        let connected_for = self.connected_since.take().map(|since| since.elapsed());

        match disconnect {
            Disconnect::Shutdown(intent) => {
                info!("Shard shutting down");
                self.finish(intent.status());
                return false;
            }
            Disconnect::ConsumerGone => {
                info!("Event receiver dropped, stopping shard");
                self.finish(ShardStatus::Idle);
                return false;
            }
            _ => {}
        }

        let action = disconnect.action();
        let shard_id = self.info.id();

        if !matches!(disconnect, Disconnect::ConnectFailed(_)) {
            info!(
                code = ?disconnect.reported_code(),
                ?action,
                reason = %disconnect.describe(),
                "Gateway connection lost"
            );
            let delivered = self
                .emit(GatewayEvent::Disconnected {
                    shard_id,
                    code: disconnect.reported_code(),
                    recoverable: action.is_recoverable(),
                })
                .await;
            if delivered.is_err() {
                self.finish(ShardStatus::Idle);
                return false;
            }
        } else {
            warn!(reason = %disconnect.describe(), "Gateway connection failed");
        }

        match action {
            CloseAction::Fatal => {
                let (code, reason) = match disconnect {
                    Disconnect::Closed { code, reason } => (code.unwrap_or_default(), reason),
                    other => (0, other.describe()),
                };
                error!(code, %reason, "Fatal close, shard will not reconnect");
                let _ = self
                    .emit(GatewayEvent::Error {
                        shard_id,
                        error: Arc::new(ShardError::FatalClose { code, reason }),
                        recoverable: false,
                    })
                    .await;
                self.finish(ShardStatus::Dead);
                return false;
            }
            CloseAction::FreshSession => {
                self.session.invalidate();
                let _ = self
                    .emit(GatewayEvent::Debug {
                        shard_id,
                        message: format!("{}; starting a new session", disconnect.describe()),
                    })
                    .await;
            }
            CloseAction::Resume => {}
        }

        if connected_for.is_some_and(|d| d >= self.config.stability_threshold) {
            self.backoff.reset();
        }

        if let Some(max) = self.config.max_reconnect_attempts {
            let attempts = self.backoff.failures();
            if attempts >= max {
                error!(attempts, "Reconnect attempts exhausted");
                let _ = self
                    .emit(GatewayEvent::Error {
                        shard_id,
                        error: Arc::new(ShardError::ReconnectAttemptsExhausted { attempts }),
                        recoverable: false,
                    })
                    .await;
                self.finish(ShardStatus::Dead);
                return false;
            }
        }

        let delay = self.backoff.next_delay();
        self.metrics.increment_reconnects();
        self.set_status(ShardStatus::Reconnecting);
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = self.backoff.failures(),
            resume = self.session.can_resume(),
            "Reconnecting"
        );

        match self.wait_backoff(delay).await {
            Some(intent) => {
                self.finish(intent.status());
                false
            }
            None => true,
        }
    }

    /// Sleep out the backoff delay unless a shutdown arrives first
    async fn wait_backoff(&mut self, delay: Duration) -> Option<ShutdownIntent> {
        let wait = sleep(delay);
        tokio::pin!(wait);

        loop {
            tokio::select! {
                () = &mut wait => return None,
                command = self.commands.recv() => {
                    if let Some(intent) = self.handle_offline_command(command) {
                        return Some(intent);
                    }
                }
            }
        }
    }

    fn finish(&mut self, status: ShardStatus) {
        self.set_status(status);
        if let Some(done) = self.shutdown_ack.take() {
            let _ = done.send(());
        }
        info!(%status, "Shard stopped");
    }
}
