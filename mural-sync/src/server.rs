//! The broadcast relay: the server-side canvas state machine.
//!
//! One task per connection. The authoritative [`Canvas`] and the
//! [`SessionRegistry`] share a single mutex — the relay's serialization
//! point. Join (snapshot + register) and apply-and-broadcast each run as
//! one critical section, so a joining session either sees an operation in
//! its snapshot or receives it from the broadcast stream — never both,
//! never neither. `broadcast` only enqueues into per-session queues;
//! socket writes happen in each connection's own loop, outside the lock.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use mural_core::Operation;
use mural_raster::{Canvas, RasterError, Snapshot};

use crate::registry::{SessionId, SessionRegistry};

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind to.
    pub bind_addr: String,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Messages buffered per session before sends to it are dropped.
    pub session_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            width: 1920,
            height: 1080,
            session_queue_capacity: 256,
        }
    }
}

/// Relay counters, exposed for tests and monitoring.
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_sessions: usize,
    pub operations_relayed: u64,
    pub decode_errors: u64,
    pub rejected_inits: u64,
}

/// Everything the connection handlers share, behind one lock.
struct RelayState {
    canvas: Canvas,
    registry: SessionRegistry,
    stats: RelayStats,
}

/// The relay server.
pub struct RelayServer {
    config: RelayConfig,
    state: Arc<Mutex<RelayState>>,
}

impl RelayServer {
    /// Create a relay with an authoritative canvas of the configured size.
    pub fn new(config: RelayConfig) -> Result<Self, RasterError> {
        let canvas = Canvas::with_size(config.width, config.height)?;
        Ok(Self {
            config,
            state: Arc::new(Mutex::new(RelayState {
                canvas,
                registry: SessionRegistry::new(),
                stats: RelayStats::default(),
            })),
        })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RelayConfig::default()).expect("default configuration is valid")
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("relay listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("new TCP connection from {addr}");

            let state = self.state.clone();
            let capacity = self.config.session_queue_capacity;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, state, capacity).await {
                    log::error!("connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Current relay counters.
    pub async fn stats(&self) -> RelayStats {
        self.state.lock().await.stats.clone()
    }

    /// A consistent copy of the authoritative canvas.
    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.canvas.snapshot()
    }

    /// The configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }
}

/// Per-connection state machine: join, relay loop, leave.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<Mutex<RelayState>>,
    queue_capacity: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let session_id: SessionId = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel::<Message>(queue_capacity);

    // Snapshot-then-subscribe as one critical section: no operation can be
    // applied between the snapshot read and the registration, so the
    // snapshot plus the subsequent queue contents are gap-free.
    {
        let mut s = state.lock().await;
        let init = s.canvas.snapshot().into_op().encode()?;
        // The queue is fresh and empty; the snapshot always fits.
        let _ = tx.try_send(Message::text(init));
        s.registry.join(session_id, tx.clone());
        s.stats.total_connections += 1;
        s.stats.active_sessions = s.registry.len();
    }
    log::info!("session {session_id} joined from {addr}");

    loop {
        tokio::select! {
            inbound = ws_receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match Operation::decode(text.as_str()) {
                            Ok(Operation::Init(init)) => {
                                // Clients do not resize shared state; the
                                // canvas is established by server config.
                                log::warn!(
                                    "session {session_id}: rejected post-join init ({}x{})",
                                    init.width, init.height
                                );
                                state.lock().await.stats.rejected_inits += 1;
                            }
                            Ok(op) => {
                                let mut s = state.lock().await;
                                if let Err(e) = s.canvas.apply(&op) {
                                    log::error!("session {session_id}: apply failed: {e}");
                                    continue;
                                }
                                // Relay the exact bytes received, never a
                                // re-encoding.
                                s.registry.broadcast(&session_id, &Message::Text(text.clone()));
                                s.stats.operations_relayed += 1;
                            }
                            Err(e) => {
                                log::warn!("session {session_id}: dropping undecodable message: {e}");
                                state.lock().await.stats.decode_errors += 1;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // non-text frames carry no operations
                    Some(Err(e)) => {
                        log::warn!("session {session_id}: transport error: {e}");
                        break;
                    }
                }
            }
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        if let Err(e) = ws_sender.send(message).await {
                            log::warn!("session {session_id}: write failed: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    // Every exit path deregisters exactly once; a racing double leave is a
    // no-op by contract.
    {
        let mut s = state.lock().await;
        s.registry.leave(&session_id);
        s.stats.active_sessions = s.registry.len();
    }
    log::info!("session {session_id} left");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:9090");
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 1080);
        assert_eq!(config.session_queue_capacity, 256);
    }

    #[test]
    fn test_new_rejects_zero_canvas() {
        let config = RelayConfig {
            width: 0,
            ..RelayConfig::default()
        };
        assert!(RelayServer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_initial_stats() {
        let server = RelayServer::with_defaults();
        let stats = server.stats().await;
        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.operations_relayed, 0);
        assert_eq!(stats.decode_errors, 0);
        assert_eq!(stats.rejected_inits, 0);
    }

    #[tokio::test]
    async fn test_server_canvas_starts_blank() {
        let config = RelayConfig {
            width: 10,
            height: 10,
            ..RelayConfig::default()
        };
        let server = RelayServer::new(config).unwrap();
        let snapshot = server.snapshot().await;
        assert_eq!((snapshot.width, snapshot.height), (10, 10));
        assert!(snapshot.pixels.iter().all(|&b| b == 0));
    }
}
