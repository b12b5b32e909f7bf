//! Scripted gateway server over a real WebSocket
//!
//! Answers identify with READY, resume with RESUMED, and acknowledges every
//! heartbeat. Tests can kick the current connection with a close code.

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use pushgate_gateway::protocol::{GatewayMessage, OpCode};
use serde_json::json;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

pub const SESSION_ID: &str = "real-session";

#[derive(Default)]
struct ServerState {
    received: Mutex<Vec<GatewayMessage>>,
    closes: Mutex<Vec<Option<u16>>>,
    connections: AtomicUsize,
    kick: Mutex<Option<mpsc::UnboundedSender<u16>>>,
}

pub struct FakeGatewayServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl FakeGatewayServer {
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(ServerState::default());

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, addr, Arc::clone(&accept_state)));
            }
        });

        Ok(Self { addr, state, task })
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Client messages with `op`, in arrival order
    pub fn received(&self, op: OpCode) -> Vec<GatewayMessage> {
        self.state
            .received
            .lock()
            .iter()
            .filter(|m| m.op == op)
            .cloned()
            .collect()
    }

    /// Close codes of client-initiated closes
    pub fn closes(&self) -> Vec<Option<u16>> {
        self.state.closes.lock().clone()
    }

    /// Close the most recent connection from the server side
    pub fn kick(&self, code: u16) {
        if let Some(kick) = self.state.kick.lock().as_ref() {
            let _ = kick.send(code);
        }
    }
}

impl Drop for FakeGatewayServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, addr: SocketAddr, state: Arc<ServerState>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let (kick_tx, mut kick_rx) = mpsc::unbounded_channel();
    *state.kick.lock() = Some(kick_tx);
    state.connections.fetch_add(1, Ordering::SeqCst);

    let mut seq = 0u64;
    let mut outbox = vec![GatewayMessage::hello(45_000)];

    loop {
        for message in outbox.drain(..) {
            let Ok(text) = message.to_json() else { continue };
            if write.send(Message::Text(text)).await.is_err() {
                return;
            }
        }

        tokio::select! {
            code = kick_rx.recv() => {
                if let Some(code) = code {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: Cow::Borrowed("kicked"),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                }
                return;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Ok(message) = GatewayMessage::from_json(&text) else { continue };
                    state.received.lock().push(message.clone());
                    match message.op {
                        OpCode::Identify => {
                            seq += 1;
                            let shard = message
                                .as_identify()
                                .and_then(|identify| identify.shard);
                            outbox.push(GatewayMessage::dispatch(
                                "READY",
                                seq,
                                json!({
                                    "v": 10,
                                    "session_id": SESSION_ID,
                                    "resume_gateway_url": format!("ws://{addr}"),
                                    "guilds": [],
                                    "shard": shard,
                                }),
                            ));
                        }
                        OpCode::Resume => {
                            seq = message.as_resume().map_or(seq, |resume| resume.seq) + 1;
                            outbox.push(GatewayMessage::dispatch("RESUMED", seq, json!({})));
                        }
                        OpCode::Heartbeat => outbox.push(GatewayMessage::heartbeat_ack()),
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    state.closes.lock().push(frame.map(|f| u16::from(f.code)));
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return,
            }
        }
    }
}
