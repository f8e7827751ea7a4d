//! Headless client keeping a local canvas mirror.
//!
//! Input capture and presentation are the embedder's problem; this client
//! owns the protocol side: it applies the join-time snapshot, mirrors every
//! relayed operation locally, and draws its own operations before sending
//! them (the relay never echoes an operation back to its originator, so
//! local application is what keeps the mirror converging).

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message;

use mural_core::{Operation, ProtocolError, Rgba};
use mural_raster::{Canvas, Snapshot};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events surfaced to the embedding application.
#[derive(Debug, Clone)]
pub enum CanvasEvent {
    /// Connection established.
    Connected,
    /// The join-time snapshot was applied; drawing may begin.
    Initialized { width: u32, height: u32 },
    /// A remote operation was applied to the mirror.
    RemoteOp(Operation),
    /// Connection lost. There is no resume: reconnecting starts a fresh
    /// session with a fresh snapshot.
    Disconnected,
}

/// The mirror client.
pub struct MirrorClient {
    server_url: String,
    state: Arc<RwLock<ConnectionState>>,
    canvas: Arc<Mutex<Canvas>>,
    outgoing_tx: Option<mpsc::Sender<Message>>,
    event_rx: Option<mpsc::Receiver<CanvasEvent>>,
    event_tx: mpsc::Sender<CanvasEvent>,
}

impl MirrorClient {
    /// Create a client for the given `ws://` URL. The mirror canvas stays
    /// uninitialized until the server's snapshot arrives.
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            canvas: Arc::new(Mutex::new(Canvas::new())),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<CanvasEvent>> {
        self.event_rx.take()
    }

    /// Dial the server and spawn the reader/writer tasks.
    pub async fn connect(&mut self) -> Result<(), ProtocolError> {
        *self.state.write().await = ConnectionState::Connecting;

        let (ws_stream, _) = match tokio_tungstenite::connect_async(&self.server_url).await {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("connect to {} failed: {e}", self.server_url);
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(ProtocolError::ConnectionClosed);
            }
        };
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<Message>(256);
        self.outgoing_tx = Some(out_tx);

        // Writer: forward the outgoing queue to the socket.
        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                if ws_writer.send(message).await.is_err() {
                    break;
                }
            }
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(CanvasEvent::Connected).await;

        // Reader: apply every relayed operation to the mirror.
        let canvas = self.canvas.clone();
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(message) = ws_reader.next().await {
                match message {
                    Ok(Message::Text(text)) => match Operation::decode(text.as_str()) {
                        Ok(op) => {
                            let event = {
                                let mut canvas = canvas.lock().await;
                                if !canvas.is_initialized()
                                    && !matches!(op, Operation::Init(_))
                                {
                                    log::warn!("mirror: operation before snapshot, dropping");
                                    continue;
                                }
                                if let Err(e) = canvas.apply(&op) {
                                    log::warn!("mirror: apply failed: {e}");
                                    continue;
                                }
                                match op {
                                    Operation::Init(init) => CanvasEvent::Initialized {
                                        width: init.width,
                                        height: init.height,
                                    },
                                    other => CanvasEvent::RemoteOp(other),
                                }
                            };
                            let _ = event_tx.send(event).await;
                        }
                        Err(e) => {
                            log::warn!("mirror: dropping undecodable frame: {e}");
                        }
                    },
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(CanvasEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Encode and send an operation, drawing it on the local mirror first.
    ///
    /// `Init` operations are transmitted as-is but never applied locally:
    /// the relay rejects them, so resizing the mirror would diverge.
    pub async fn send_op(&self, op: &Operation) -> Result<(), ProtocolError> {
        let text = op.encode()?;
        let tx = self
            .outgoing_tx
            .as_ref()
            .ok_or(ProtocolError::ConnectionClosed)?;

        {
            let mut canvas = self.canvas.lock().await;
            if canvas.is_initialized() && !matches!(op, Operation::Init(_)) {
                if let Err(e) = canvas.apply(op) {
                    log::warn!("mirror: local apply failed: {e}");
                }
            }
        }

        tx.send(Message::text(text))
            .await
            .map_err(|_| ProtocolError::ConnectionClosed)
    }

    /// Draw and send one stroke segment.
    pub async fn send_line(
        &self,
        color: Rgba,
        width: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    ) -> Result<(), ProtocolError> {
        self.send_op(&Operation::line(color, width, x1, y1, x2, y2))
            .await
    }

    /// Draw and send one text run. `y` is the baseline.
    pub async fn send_text(
        &self,
        color: Rgba,
        size: f64,
        x: f64,
        y: f64,
        text: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.send_op(&Operation::text(color, size, x, y, text)).await
    }

    /// A copy of the mirror's pixels, or `None` before the snapshot arrives.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        let canvas = self.canvas.lock().await;
        canvas.is_initialized().then(|| canvas.snapshot())
    }

    /// Current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// The server URL this client dials.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = MirrorClient::new("ws://localhost:9090");
        assert_eq!(client.server_url(), "ws://localhost:9090");
    }

    #[tokio::test]
    async fn test_initial_state() {
        let client = MirrorClient::new("ws://localhost:9090");
        assert_eq!(
            client.connection_state().await,
            ConnectionState::Disconnected
        );
        assert!(client.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let client = MirrorClient::new("ws://localhost:9090");
        let result = client
            .send_line(Rgba::opaque(255, 0, 0), 2.0, 0.0, 0.0, 1.0, 1.0)
            .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_take_event_rx_once() {
        let mut client = MirrorClient::new("ws://localhost:9090");
        assert!(client.take_event_rx().is_some());
        assert!(client.take_event_rx().is_none());
    }
}
