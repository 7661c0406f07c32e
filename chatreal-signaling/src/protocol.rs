//! Chat socket protocol messages
//!
//! Every frame is a JSON text message `{"event": "<name>", "data": {...}}`.

use chatreal_core::ChatRealError;
use serde::{Deserialize, Serialize};

/// Payload of `join_room`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomPayload {
    /// Room being joined
    #[serde(rename = "roomId")]
    pub room_id: String,
    /// Display name of the joining user
    pub username: String,
}

/// Payload of `chat-message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    /// Display name of the author
    pub sender: String,
    /// Message body
    pub text: String,
    /// Room the message belongs to; the backend may omit it when relaying
    #[serde(rename = "roomId", default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

/// Events exchanged over the chat socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SocketEvent {
    /// Announce this client in a room
    #[serde(rename = "join_room")]
    JoinRoom(JoinRoomPayload),
    /// A chat message, in either direction
    #[serde(rename = "chat-message")]
    ChatMessage(ChatMessagePayload),
}

impl SocketEvent {
    /// `join_room` event
    pub fn join_room(room_id: impl Into<String>, username: impl Into<String>) -> Self {
        SocketEvent::JoinRoom(JoinRoomPayload {
            room_id: room_id.into(),
            username: username.into(),
        })
    }

    /// Outbound `chat-message` event
    pub fn chat_message(
        sender: impl Into<String>,
        text: impl Into<String>,
        room_id: impl Into<String>,
    ) -> Self {
        SocketEvent::ChatMessage(ChatMessagePayload {
            sender: sender.into(),
            text: text.into(),
            room_id: Some(room_id.into()),
        })
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            SocketEvent::JoinRoom(_) => "join_room",
            SocketEvent::ChatMessage(_) => "chat-message",
        }
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, ChatRealError> {
        serde_json::to_string(self).map_err(|e| ChatRealError::InvalidMessage {
            message: self.name().to_string(),
            source: e.into(),
        })
    }

    /// Parse a text frame
    pub fn from_json(text: &str) -> Result<Self, ChatRealError> {
        serde_json::from_str(text).map_err(|e| ChatRealError::InvalidMessage {
            message: text.to_string(),
            source: e.into(),
        })
    }
}
