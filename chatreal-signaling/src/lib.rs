//! # Chat Real Signaling
//!
//! The chat socket: JSON event envelopes and the WebSocket client that joins a
//! room and relays chat messages through an external backend.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod protocol;

// Re-export main types
pub use client::{to_ws_url, ChatTransport, MemoryTransport, SharedTransport, SocketClient};
pub use protocol::{ChatMessagePayload, JoinRoomPayload, SocketEvent};
