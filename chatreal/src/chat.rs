//! Side chat panel

use crate::event::{Event, EventBus};
use chatreal_signaling::{ChatTransport, SharedTransport, SocketEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the author
    pub sender: String,
    /// Message body
    pub text: String,
}

impl ChatMessage {
    /// Message from `sender`
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// Whether `username` wrote this message
    pub fn is_from(&self, username: &str) -> bool {
        self.sender == username
    }
}

/// Message list, draft and open/closed state of the chat panel
///
/// Messages live in memory only, in arrival order. Inbound messages are
/// appended by a listener task for as long as the panel exists.
#[derive(Debug)]
pub struct ChatPanel {
    room_id: String,
    username: String,
    transport: Option<SharedTransport>,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    open: bool,
    draft: String,
    listener: Option<JoinHandle<()>>,
}

impl ChatPanel {
    /// Panel for `room_id`; with a transport, inbound messages are collected
    pub fn new(
        room_id: impl Into<String>,
        username: impl Into<String>,
        transport: Option<SharedTransport>,
    ) -> Self {
        Self::with_events(room_id, username, transport, None)
    }

    pub(crate) fn with_events(
        room_id: impl Into<String>,
        username: impl Into<String>,
        transport: Option<SharedTransport>,
        events: Option<EventBus>,
    ) -> Self {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let listener = transport
            .as_ref()
            .map(|transport| spawn_listener(transport, messages.clone(), events));

        Self {
            room_id: room_id.into(),
            username: username.into(),
            transport,
            messages,
            open: false,
            draft: String::new(),
            listener,
        }
    }

    /// Name messages are sent under
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether the panel is shown
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Show or hide the panel
    pub fn toggle_open(&mut self) {
        self.open = !self.open;
    }

    /// Hide the panel
    pub fn close(&mut self) {
        self.open = false;
    }

    /// Current input text
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the input text
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Messages so far, oldest first
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// Send the draft
    ///
    /// Blank drafts are ignored. The message is appended locally before it
    /// is emitted, and a failed emit is only logged. Returns whether a
    /// message was added.
    pub async fn send(&mut self) -> bool {
        let text = self.draft.trim().to_string();
        if text.is_empty() {
            return false;
        }

        let message = ChatMessage::new(self.username.clone(), text);
        self.messages.lock().push(message.clone());
        self.draft.clear();

        match &self.transport {
            Some(transport) => {
                let event = SocketEvent::chat_message(message.sender, message.text, self.room_id.clone());
                if let Err(e) = transport.emit(event).await {
                    warn!("Chat message not sent: {}", e);
                }
            }
            None => warn!("Chat message kept locally, no chat connection"),
        }
        true
    }

    /// Set the draft to `text` and send it
    pub async fn send_text(&mut self, text: impl Into<String>) -> bool {
        self.set_draft(text);
        self.send().await
    }
}

impl Drop for ChatPanel {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

fn spawn_listener(
    transport: &SharedTransport,
    messages: Arc<Mutex<Vec<ChatMessage>>>,
    events: Option<EventBus>,
) -> JoinHandle<()> {
    let mut inbound = transport.subscribe();
    tokio::spawn(async move {
        loop {
            match inbound.recv().await {
                Ok(SocketEvent::ChatMessage(payload)) => {
                    let message = ChatMessage::new(payload.sender, payload.text);
                    messages.lock().push(message.clone());
                    if let Some(events) = &events {
                        events.emit(Event::ChatMessage { message });
                    }
                }
                Ok(other) => debug!("Chat panel ignoring {}", other.name()),
                Err(RecvError::Lagged(skipped)) => warn!("Chat panel missed {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
