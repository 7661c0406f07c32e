//! Chat socket clients
//!
//! [`SocketClient`] speaks the JSON envelope over a WebSocket. It owns a
//! writer task fed by an unbounded channel and a reader task that fans
//! decoded events out on a broadcast channel. [`MemoryTransport`] is the
//! in-process stand-in used when no backend is wanted.

use crate::protocol::SocketEvent;
use async_trait::async_trait;
use chatreal_core::ChatRealError;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const INBOUND_BUFFER: usize = 64;

/// A connection that can emit and receive chat socket events
#[async_trait]
pub trait ChatTransport: Send + Sync + fmt::Debug {
    /// Send an event to the backend
    async fn emit(&self, event: SocketEvent) -> Result<(), ChatRealError>;

    /// Receive every event arriving after this call
    fn subscribe(&self) -> broadcast::Receiver<SocketEvent>;

    /// Close the connection; further emits fail
    fn disconnect(&self);

    /// Whether the connection is open
    fn is_connected(&self) -> bool;
}

/// Shared handle to a transport
pub type SharedTransport = Arc<dyn ChatTransport>;

fn not_connected() -> ChatRealError {
    ChatRealError::InvalidState {
        expected: "connected".to_string(),
        actual: "disconnected".to_string(),
    }
}

/// Map an `http(s)` backend URL to the matching `ws(s)` URL
pub fn to_ws_url(url: &str) -> Result<String, ChatRealError> {
    let (scheme, rest) = url.split_once("://").ok_or_else(|| ChatRealError::InvalidUrl {
        url: url.to_string(),
    })?;
    let scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => {
            return Err(ChatRealError::InvalidUrl {
                url: url.to_string(),
            })
        }
    };
    if rest.is_empty() {
        return Err(ChatRealError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(format!("{}://{}", scheme, rest))
}

/// WebSocket chat client
pub struct SocketClient {
    url: String,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: broadcast::Sender<SocketEvent>,
    connected: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SocketClient {
    /// Connect to the backend at `url` (`http`, `https`, `ws` or `wss`)
    pub async fn connect(url: &str) -> Result<Self, ChatRealError> {
        let ws_url = to_ws_url(url)?;
        info!("Connecting chat socket to {}", ws_url);

        let (stream, _response) =
            connect_async(ws_url.as_str())
                .await
                .map_err(|e| ChatRealError::ConnectionFailed {
                    url: ws_url.clone(),
                    reason: e.to_string(),
                })?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);
        let connected = Arc::new(AtomicBool::new(true));

        let writer_connected = connected.clone();
        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    warn!("Chat socket send failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            writer_connected.store(false, Ordering::SeqCst);
            debug!("Chat socket writer finished");
        });

        let reader_connected = connected.clone();
        let reader_inbound = inbound.clone();
        let reader = tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => match SocketEvent::from_json(&text) {
                        Ok(event) => {
                            debug!("Chat socket received {}", event.name());
                            // No subscribers is fine, the event is dropped.
                            let _ = reader_inbound.send(event);
                        }
                        Err(e) => debug!("Ignoring chat socket frame: {}", e),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Chat socket closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Chat socket receive failed: {}", e);
                        break;
                    }
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
        });

        Ok(Self {
            url: ws_url,
            outbound,
            inbound,
            connected,
            tasks: Mutex::new(vec![writer, reader]),
        })
    }

    /// WebSocket URL this client connected to
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for SocketClient {
    async fn emit(&self, event: SocketEvent) -> Result<(), ChatRealError> {
        if !self.is_connected() {
            return Err(not_connected());
        }
        let json = event.to_json()?;
        self.outbound
            .send(Message::Text(json))
            .map_err(|_| ChatRealError::Transport {
                reason: "chat socket writer has stopped".to_string(),
            })?;
        debug!("Chat socket emitted {}", event.name());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.inbound.subscribe()
    }

    fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        // The writer exits after flushing the close frame.
        let _ = self.outbound.send(Message::Close(None));
        for task in self.tasks.lock().drain(..).skip(1) {
            task.abort();
        }
        info!("Chat socket to {} disconnected", self.url);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketClient")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// In-process transport that records what is emitted
#[derive(Debug)]
pub struct MemoryTransport {
    emitted: Mutex<Vec<SocketEvent>>,
    inbound: broadcast::Sender<SocketEvent>,
    connected: AtomicBool,
}

impl MemoryTransport {
    /// A connected transport
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);
        Self {
            emitted: Mutex::new(Vec::new()),
            inbound,
            connected: AtomicBool::new(true),
        }
    }

    /// Events emitted so far, in order
    pub fn emitted(&self) -> Vec<SocketEvent> {
        self.emitted.lock().clone()
    }

    /// Deliver an event as if the backend had sent it; returns the number of
    /// subscribers reached
    pub fn inject(&self, event: SocketEvent) -> usize {
        self.inbound.send(event).unwrap_or(0)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn emit(&self, event: SocketEvent) -> Result<(), ChatRealError> {
        if !self.is_connected() {
            return Err(not_connected());
        }
        self.emitted.lock().push(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.inbound.subscribe()
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
