//! # Chat Real - Headless Video Chat
//!
//! Chat Real models a small video-chat application without a browser: rooms
//! identified by shareable links, a local camera and microphone opened through
//! a fallback cascade, a peer connection that only ever talks to itself, a
//! "remote" video mirrored from the local camera, and a side chat relayed by
//! an external socket backend.
//!
//! ## Key Features
//!
//! - **Room links**: generated ids, validation and `?room=` share URLs
//! - **Resilient media**: five constraint attempts, from HD down to video only
//! - **Remote preview**: a mirrored, badged copy of the local camera after 5 s
//! - **Chat**: messages show locally at once and are relayed to the room
//! - **Extras**: camera self-test with a microphone echo, screen share, theme
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatreal::ChatReal;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize from CHAT_REAL_SOCKET_URL and the debug environment
//!     let chat_real = ChatReal::init()?;
//!
//!     // Join a room as alice
//!     let session = chat_real
//!         .room("1699999999999-ab12cd3")
//!         .username("alice")
//!         .join()
//!         .await?;
//!
//!     // Say hello in the side chat
//!     let mut chat = session.chat_panel();
//!     chat.send_text("hello").await;
//!
//!     // Handle events
//!     let mut events = session.events();
//!     while let Some(event) = events.next().await {
//!         println!("Call event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use chatreal_core::{
    generate_room_id, is_valid_room_id, share_room_url, ChatRealError, FileStore, History,
    KeyValueStore, Location, MemoryStore, SharedStore,
};

pub use chatreal_media::{
    default_devices, AudioSink, CaptureError, CaptureErrorKind, CollectingSink, MediaDevices,
    MediaError, MediaStream, MediaTrack, NullSink, ReadyState, SharedDevices, SyntheticConfig,
    SyntheticDevices, TrackKind,
};

pub use chatreal_signaling::{ChatTransport, MemoryTransport, SharedTransport, SocketClient, SocketEvent};

pub use chatreal_diagnostics::{DebugEnv, DebugLogger, StreamHealth, StreamMonitor};

// Public API modules
pub mod app;
pub mod call;
pub mod chat;
pub mod config;
pub mod event;
pub mod landing;
pub mod peer;
pub mod room;
pub mod rtc_service;
pub mod screen_share;
pub mod share;
pub mod simulation;
pub mod theme;

// Re-export main API types
pub use app::{App, View};
pub use call::{CallPhase, CallSession, CallState, ConnectionStatus, MediaState, VideoElement};
pub use camera_test::{CameraTest, EchoStatus, TestStatus};
pub use chat::{ChatMessage, ChatPanel};
pub use config::{GlobalConfig, RoomConfig};
pub use event::{Event, EventStream};
pub use landing::{LandingAction, LandingForm};
pub use peer::{LocalStorePresence, PeerConnectionState, RoomPresence, RtcConfiguration};
pub use room::RoomBuilder;
pub use rtc_service::RtcService;
pub use screen_share::ScreenShare;
pub use share::{Clipboard, MemoryClipboard, ShareButton};
pub use simulation::RemoteSimulationConfig;
pub use theme::{Theme, ThemeController};

use std::sync::Arc;

/// Main entry point for Chat Real
#[derive(Debug, Clone)]
pub struct ChatReal {
    inner: Arc<ChatRealInner>,
}

#[derive(Debug)]
struct ChatRealInner {
    config: GlobalConfig,
    store: SharedStore,
    devices: SharedDevices,
}

impl ChatReal {
    /// Initialize from the environment
    ///
    /// # Example
    /// ```rust,no_run
    /// use chatreal::ChatReal;
    ///
    /// let chat_real = ChatReal::init()?;
    /// # Ok::<(), chatreal::ChatRealError>(())
    /// ```
    pub fn init() -> Result<Self, ChatRealError> {
        Self::init_with(GlobalConfig::from_env())
    }

    /// Initialize with custom global configuration
    ///
    /// Uses an in-memory store and the default capture devices until replaced
    /// with [`with_store`](Self::with_store) or
    /// [`with_devices`](Self::with_devices).
    pub fn init_with(config: GlobalConfig) -> Result<Self, ChatRealError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ChatRealInner {
                config,
                store: MemoryStore::shared(),
                devices: default_devices(),
            }),
        })
    }

    /// Keep usernames, room flags and the theme in `store`
    pub fn with_store(self, store: SharedStore) -> Self {
        Self {
            inner: Arc::new(ChatRealInner {
                config: self.inner.config.clone(),
                store,
                devices: self.inner.devices.clone(),
            }),
        }
    }

    /// Capture from `devices`
    pub fn with_devices(self, devices: SharedDevices) -> Self {
        Self {
            inner: Arc::new(ChatRealInner {
                config: self.inner.config.clone(),
                store: self.inner.store.clone(),
                devices,
            }),
        }
    }

    /// Global configuration
    pub fn config(&self) -> &GlobalConfig {
        &self.inner.config
    }

    /// Local storage
    pub fn store(&self) -> SharedStore {
        self.inner.store.clone()
    }

    /// Capture devices
    pub fn devices(&self) -> SharedDevices {
        self.inner.devices.clone()
    }

    /// Create a room builder for the given room ID
    ///
    /// # Example
    /// ```rust,no_run
    /// use chatreal::ChatReal;
    ///
    /// # async fn example() -> Result<(), chatreal::ChatRealError> {
    /// let chat_real = ChatReal::init()?;
    /// let session = chat_real
    ///     .room("1699999999999-ab12cd3")
    ///     .username("alice")
    ///     .without_chat()
    ///     .join()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn room(&self, id: &str) -> RoomBuilder {
        RoomBuilder::new(self, id)
    }

    /// Router starting at the configured page URL
    pub fn app(&self) -> Result<App, ChatRealError> {
        Ok(App::new(self.inner.config.location()?))
    }

    /// Camera and microphone self-test playing echoes through `sink`
    pub fn camera_test(&self, sink: Arc<dyn AudioSink>) -> CameraTest {
        CameraTest::new(self.devices(), sink)
    }

    /// Screen share control
    pub fn screen_share(&self) -> ScreenShare {
        ScreenShare::new(self.devices())
    }

    /// Theme controller backed by this instance's store
    pub fn theme(&self, prefers_dark: bool) -> ThemeController {
        ThemeController::new(self.store(), prefers_dark)
    }
}
