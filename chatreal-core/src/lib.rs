//! # Chat Real Core
//!
//! Foundational types shared by every Chat Real crate: the error type,
//! room identifier generation and validation, the key-value store that stands
//! in for browser local storage, and the location/history pair that carries
//! the shareable `room` parameter.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod location;
pub mod room_id;
pub mod storage;

// Re-export main types
pub use error::ChatRealError;
pub use location::{History, Location};
pub use room_id::{
    generate_room_id, generate_room_id_with, is_valid_room_id, room_activity_key, share_room_url,
};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
