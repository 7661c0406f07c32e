//! Call session controller
//!
//! A [`CallSession`] is what the call view talks to. It owns the
//! [`RtcService`], mirrors its callbacks into [`CallState`], keeps the local
//! and remote video element sources, and holds the chat connection.

use crate::chat::ChatPanel;
use crate::config::RoomConfig;
use crate::event::{Event, EventBus, EventStream, WeakEventBus};
use crate::peer::RoomPresence;
use crate::rtc_service::RtcService;
use chatreal_media::{MediaStream, SharedDevices, TrackKind};
use chatreal_signaling::{ChatTransport, SharedTransport, SocketEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Whether the microphone and camera are on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaState {
    /// Microphone enabled
    pub audio: bool,
    /// Camera enabled
    pub video: bool,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Where the call is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallPhase {
    /// Nothing started yet
    Idle,
    /// Running the acquisition cascade
    AcquiringMedia,
    /// Local media open and peer connection set up, no remote yet
    ConnectedStub,
    /// Every acquisition attempt failed
    MediaError,
    /// The remote stream is showing
    RemoteArrived,
    /// The call ended or the connection was lost
    Disconnected,
}

/// Label shown next to the room name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Still acquiring media
    Connecting,
    /// A remote stream is showing
    Connected,
    /// No remote yet
    Waiting,
}

impl ConnectionStatus {
    /// Display text
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Waiting => "Waiting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A video element's `srcObject`
#[derive(Debug, Clone, Default)]
pub struct VideoElement {
    src_object: Option<MediaStream>,
}

impl VideoElement {
    /// Stream being shown
    pub fn src_object(&self) -> Option<&MediaStream> {
        self.src_object.as_ref()
    }

    /// Show a stream, or nothing
    pub fn set_src_object(&mut self, stream: Option<MediaStream>) {
        self.src_object = stream;
    }

    /// Whether something is attached
    pub fn has_source(&self) -> bool {
        self.src_object.is_some()
    }
}

/// Observable state of a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallState {
    /// A remote stream is showing
    pub is_connected: bool,
    /// Media acquisition is in progress
    pub is_connecting: bool,
    /// Text shown under "Media Error"
    pub error: Option<String>,
    /// Microphone and camera flags
    pub media_state: MediaState,
    /// Lifecycle phase
    pub phase: CallPhase,
}

impl Default for CallState {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_connecting: true,
            error: None,
            media_state: MediaState::default(),
            phase: CallPhase::Idle,
        }
    }
}

impl CallState {
    /// Status label for this state
    pub fn connection_status(&self) -> ConnectionStatus {
        if self.is_connecting {
            ConnectionStatus::Connecting
        } else if self.is_connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Waiting
        }
    }
}

#[derive(Debug, Default)]
struct SessionShared {
    state: Mutex<CallState>,
    local_video: Mutex<VideoElement>,
    remote_video: Mutex<VideoElement>,
}

impl SessionShared {
    fn set_phase(&self, events: &EventBus, phase: CallPhase) {
        {
            let mut state = self.state.lock();
            if state.phase == phase {
                return;
            }
            state.phase = phase;
        }
        events.emit(Event::PhaseChanged { phase });
    }

    fn apply(&self, events: &WeakEventBus, event: &Event) {
        match event {
            Event::LocalStream { stream } => {
                self.local_video.lock().set_src_object(Some(stream.clone()));
            }
            Event::RemoteStream { stream } => {
                self.remote_video.lock().set_src_object(Some(stream.clone()));
                {
                    let mut state = self.state.lock();
                    state.is_connected = true;
                    state.is_connecting = false;
                }
                if let Some(events) = events.upgrade() {
                    self.set_phase(&events, CallPhase::RemoteArrived);
                }
            }
            Event::Disconnected => {
                self.state.lock().is_connected = false;
                if let Some(events) = events.upgrade() {
                    self.set_phase(&events, CallPhase::Disconnected);
                }
            }
            _ => {}
        }
    }
}

/// One participant's view of a room
pub struct CallSession {
    room_id: String,
    username: String,
    service: Arc<RtcService>,
    transport: Option<SharedTransport>,
    shared: Arc<SessionShared>,
    events: EventBus,
    ended: AtomicBool,
}

impl CallSession {
    /// Wire up a session; nothing is opened until [`connect`](Self::connect)
    pub fn new(
        room_id: impl Into<String>,
        username: impl Into<String>,
        devices: SharedDevices,
        presence: Arc<dyn RoomPresence>,
        transport: Option<SharedTransport>,
        config: &RoomConfig,
    ) -> Self {
        let room_id = room_id.into();
        let events = EventBus::new();
        let shared = Arc::new(SessionShared::default());

        let observer_shared = shared.clone();
        let observer_events = events.downgrade();
        events.observe(move |event| observer_shared.apply(&observer_events, event));

        let service = Arc::new(RtcService::new(
            room_id.clone(),
            devices,
            presence,
            events.clone(),
            config.rtc.clone(),
            config.remote.clone(),
        ));

        Self {
            room_id,
            username: username.into(),
            service,
            transport,
            shared,
            events,
            ended: AtomicBool::new(false),
        }
    }

    /// Announce this user in the room and open local media
    ///
    /// A media failure does not fail the call; it is stored as the session's
    /// error text. Does nothing once the call has ended.
    pub async fn connect(&self) {
        if self.ended.load(Ordering::SeqCst) {
            warn!("Ignoring connect in room {}: call already ended", self.room_id);
            return;
        }
        if let Some(transport) = &self.transport {
            let join = SocketEvent::join_room(self.room_id.clone(), self.username.clone());
            if let Err(e) = transport.emit(join).await {
                warn!("Could not join chat room {}: {}", self.room_id, e);
            }
        }

        {
            let mut state = self.shared.state.lock();
            state.is_connecting = true;
            state.error = None;
        }
        self.shared.set_phase(&self.events, CallPhase::AcquiringMedia);

        match self.service.initialize().await {
            Ok(acquired) => {
                info!(
                    "Room {} media ready after {} attempt(s)",
                    self.room_id,
                    acquired.attempt + 1
                );
                self.enter_connected_stub();
            }
            Err(e) => self.record_media_error(&e),
        }
        self.shared.state.lock().is_connecting = false;
    }

    fn enter_connected_stub(&self) {
        if self.phase() == CallPhase::AcquiringMedia || self.phase() == CallPhase::MediaError {
            self.shared.set_phase(&self.events, CallPhase::ConnectedStub);
        }
    }

    fn record_media_error(&self, e: &chatreal_media::MediaError) {
        error!("Media error in room {}: {}", self.room_id, e);
        let message = e.user_message();
        self.shared.state.lock().error = Some(message.clone());
        self.shared.set_phase(&self.events, CallPhase::MediaError);
        self.events.emit(Event::Error { message });
    }

    /// Room id
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Short room caption, e.g. `Room: 16999999...`
    pub fn room_label(&self) -> String {
        let prefix: String = self.room_id.chars().take(8).collect();
        format!("Room: {}...", prefix)
    }

    /// Display name used in the chat
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Snapshot of the call state
    pub fn state(&self) -> CallState {
        self.shared.state.lock().clone()
    }

    /// Lifecycle phase
    pub fn phase(&self) -> CallPhase {
        self.shared.state.lock().phase
    }

    /// Microphone and camera flags
    pub fn media_state(&self) -> MediaState {
        self.shared.state.lock().media_state
    }

    /// Error text, if acquisition failed
    pub fn error(&self) -> Option<String> {
        self.shared.state.lock().error.clone()
    }

    /// Whether a remote stream is showing
    pub fn is_connected(&self) -> bool {
        self.shared.state.lock().is_connected
    }

    /// Whether acquisition is in progress
    pub fn is_connecting(&self) -> bool {
        self.shared.state.lock().is_connecting
    }

    /// Status label
    pub fn connection_status(&self) -> ConnectionStatus {
        self.shared.state.lock().connection_status()
    }

    /// The local preview element
    pub fn local_video(&self) -> VideoElement {
        self.shared.local_video.lock().clone()
    }

    /// The remote video element
    pub fn remote_video(&self) -> VideoElement {
        self.shared.remote_video.lock().clone()
    }

    /// Receive session events emitted from now on
    pub fn events(&self) -> EventStream {
        self.events.subscribe()
    }

    /// The media service
    pub fn service(&self) -> &Arc<RtcService> {
        &self.service
    }

    /// The chat connection, if one was opened
    pub fn transport(&self) -> Option<SharedTransport> {
        self.transport.clone()
    }

    /// A chat panel bound to this room and user
    pub fn chat_panel(&self) -> ChatPanel {
        ChatPanel::with_events(
            self.room_id.clone(),
            self.username.clone(),
            self.transport.clone(),
            Some(self.events.clone()),
        )
    }

    /// Whether some local track is live and enabled
    pub fn is_stream_active(&self) -> bool {
        self.service.is_stream_active()
    }

    fn toggle(&self, kind: TrackKind) -> bool {
        let toggled = self.service.toggle_track(kind);
        let state = {
            let mut state = self.shared.state.lock();
            let enabled = toggled.unwrap_or(false);
            match kind {
                TrackKind::Audio => state.media_state.audio = enabled,
                TrackKind::Video => state.media_state.video = enabled,
            }
            state.media_state
        };
        self.events.emit(Event::MediaStateChanged { state });
        toggled.unwrap_or(false)
    }

    /// Mute or unmute the microphone; returns the new state, false without a
    /// microphone
    pub fn toggle_audio(&self) -> bool {
        self.toggle(TrackKind::Audio)
    }

    /// Turn the camera off or on; returns the new state, false without a
    /// camera
    pub fn toggle_video(&self) -> bool {
        self.toggle(TrackKind::Video)
    }

    /// Hang up: release the room, stop every local track and clear both
    /// video elements
    pub fn end_call(&self) {
        self.ended.store(true, Ordering::SeqCst);
        self.service.disconnect();
        self.shared.local_video.lock().set_src_object(None);
        self.shared.remote_video.lock().set_src_object(None);
        self.shared.state.lock().is_connected = false;
        self.shared.set_phase(&self.events, CallPhase::Disconnected);
        info!("Call in room {} ended", self.room_id);
    }

    /// Clear the error and run the acquisition cascade again
    ///
    /// Does nothing once the call has ended.
    pub async fn retry_connection(&self) {
        if self.ended.load(Ordering::SeqCst) {
            warn!("Ignoring retry in room {}: call already ended", self.room_id);
            return;
        }
        self.shared.state.lock().error = None;
        match self.service.reinitialize_stream().await {
            Ok(_) => self.enter_connected_stub(),
            Err(e) => self.record_media_error(&e),
        }
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.service.disconnect();
        }
        if let Some(transport) = &self.transport {
            transport.disconnect();
        }
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("room_id", &self.room_id)
            .field("username", &self.username)
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status_labels() {
        let mut state = CallState::default();
        assert_eq!(state.connection_status().label(), "Connecting...");
        state.is_connecting = false;
        assert_eq!(state.connection_status().to_string(), "Waiting");
        state.is_connected = true;
        assert_eq!(state.connection_status(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_initial_media_state() {
        assert_eq!(
            MediaState::default(),
            MediaState {
                audio: true,
                video: true
            }
        );
        assert_eq!(CallState::default().phase, CallPhase::Idle);
    }

    #[test]
    fn test_video_element() {
        let mut element = VideoElement::default();
        assert!(!element.has_source());
        element.set_src_object(Some(MediaStream::new()));
        assert!(element.has_source());
        element.set_src_object(None);
        assert!(element.src_object().is_none());
    }
}
