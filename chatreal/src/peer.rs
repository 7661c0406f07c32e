//! Local peer connection
//!
//! [`PeerConnectionStub`] plays the part of a browser peer connection without
//! doing any SDP or ICE exchange. It holds the local tracks as senders, logs
//! candidates and state changes, and hands remote streams to the session.
//! Whether this instance opened the room first is tracked by a
//! [`RoomPresence`], so a signaling-backed implementation can replace the
//! local-storage one.

use crate::event::{Event, EventBus};
use chatreal_core::{room_activity_key, SharedStore};
use chatreal_media::{MediaStream, MediaTrack};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// A STUN or TURN server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URL, e.g. `stun:stun.l.google.com:19302`
    pub urls: String,
}

impl IceServer {
    /// Server at `urls`
    pub fn new(urls: impl Into<String>) -> Self {
        Self { urls: urls.into() }
    }
}

/// Peer connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcConfiguration {
    /// ICE servers offered to the connection
    pub ice_servers: Vec<IceServer>,
}

impl Default for RtcConfiguration {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServer::new("stun:stun.l.google.com:19302"),
                IceServer::new("stun:stun1.l.google.com:19302"),
            ],
        }
    }
}

/// Connection state as reported by a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerConnectionState {
    /// Just created
    New,
    /// Negotiating
    Connecting,
    /// Media is flowing
    Connected,
    /// Connectivity lost, may recover
    Disconnected,
    /// Connectivity lost for good
    Failed,
    /// Closed locally
    Closed,
}

impl PeerConnectionState {
    /// Whether the session should treat this state as a lost connection
    pub fn is_lost(&self) -> bool {
        matches!(self, PeerConnectionState::Disconnected | PeerConnectionState::Failed)
    }
}

impl fmt::Display for PeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerConnectionState::New => "new",
            PeerConnectionState::Connecting => "connecting",
            PeerConnectionState::Connected => "connected",
            PeerConnectionState::Disconnected => "disconnected",
            PeerConnectionState::Failed => "failed",
            PeerConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A gathered ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Candidate line
    pub candidate: String,
    /// Media stream identification tag
    pub sdp_mid: Option<String>,
    /// Index of the media description
    pub sdp_m_line_index: Option<u16>,
}

/// A local track attached to the connection
#[derive(Debug, Clone)]
pub struct RtpSender {
    /// The track being sent
    pub track: MediaTrack,
    /// Stream the track was added with
    pub stream_id: String,
}

#[derive(Debug)]
struct PeerState {
    connection_state: PeerConnectionState,
    senders: Vec<RtpSender>,
}

/// Peer connection that never negotiates
#[derive(Debug)]
pub struct PeerConnectionStub {
    configuration: RtcConfiguration,
    state: Mutex<PeerState>,
    events: EventBus,
}

impl PeerConnectionStub {
    /// Create a connection, attaching every track of `local_stream`
    pub fn new(
        configuration: RtcConfiguration,
        local_stream: Option<&MediaStream>,
        events: EventBus,
    ) -> Self {
        info!(
            "Creating peer connection with {} ICE servers",
            configuration.ice_servers.len()
        );
        let peer = Self {
            configuration,
            state: Mutex::new(PeerState {
                connection_state: PeerConnectionState::New,
                senders: Vec::new(),
            }),
            events,
        };
        if let Some(stream) = local_stream {
            peer.replace_local_stream(stream);
        }
        peer
    }

    /// Configuration the connection was created with
    pub fn configuration(&self) -> &RtcConfiguration {
        &self.configuration
    }

    /// Attach a track as a sender
    pub fn add_track(&self, track: MediaTrack, stream: &MediaStream) {
        debug!("Adding {} track {} to peer connection", track.kind(), track.id());
        self.state.lock().senders.push(RtpSender {
            track,
            stream_id: stream.id().to_string(),
        });
    }

    /// Drop every sender and attach the tracks of `stream` instead
    pub fn replace_local_stream(&self, stream: &MediaStream) {
        self.state.lock().senders.clear();
        for track in stream.tracks() {
            self.add_track(track, stream);
        }
    }

    /// Tracks currently attached
    pub fn senders(&self) -> Vec<RtpSender> {
        self.state.lock().senders.clone()
    }

    /// A candidate was gathered; nothing is sent anywhere
    pub fn on_ice_candidate(&self, candidate: &IceCandidate) {
        debug!("ICE candidate: {}", candidate.candidate);
    }

    /// Current connection state
    pub fn connection_state(&self) -> PeerConnectionState {
        self.state.lock().connection_state
    }

    /// Record a connection state change
    pub fn set_connection_state(&self, next: PeerConnectionState) {
        {
            let mut state = self.state.lock();
            if state.connection_state == PeerConnectionState::Closed {
                debug!("Ignoring state {} on a closed peer connection", next);
                return;
            }
            state.connection_state = next;
        }
        info!("Connection state: {}", next);
        if next.is_lost() {
            self.events.emit(Event::Disconnected);
        }
    }

    /// Hand a remote stream to the session, as a track event would
    ///
    /// Returns false once the connection is closed.
    pub fn deliver_remote_stream(&self, stream: MediaStream) -> bool {
        if self.is_closed() {
            debug!("Dropping remote stream {} on a closed peer connection", stream.id());
            return false;
        }
        info!(
            "Remote stream {} received with {} tracks",
            stream.id(),
            stream.tracks().len()
        );
        self.events.emit(Event::RemoteStream { stream });
        true
    }

    /// Whether an offer or answer from the other side was applied
    ///
    /// No negotiation ever happens, so this is always false.
    pub fn has_remote_description(&self) -> bool {
        false
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.connection_state() == PeerConnectionState::Closed
    }

    /// Close the connection and release its senders
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.connection_state == PeerConnectionState::Closed {
            return;
        }
        state.connection_state = PeerConnectionState::Closed;
        state.senders.clear();
        info!("Peer connection closed");
    }
}

/// Decides which instance opened a room first
pub trait RoomPresence: Send + Sync + fmt::Debug {
    /// Mark the room as active; true when this instance is the initiator
    fn claim(&self, room_id: &str) -> bool;

    /// Forget the room
    fn release(&self, room_id: &str);
}

/// Presence flag kept in a key-value store as `room_<id>_active`
#[derive(Debug, Clone)]
pub struct LocalStorePresence {
    store: SharedStore,
}

impl LocalStorePresence {
    /// Presence backed by `store`
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }
}

impl RoomPresence for LocalStorePresence {
    fn claim(&self, room_id: &str) -> bool {
        let key = room_activity_key(room_id);
        if self.store.contains(&key) {
            return false;
        }
        if let Err(e) = self.store.set(&key, "true") {
            warn!("Could not mark room {} active: {}", room_id, e);
        }
        true
    }

    fn release(&self, room_id: &str) {
        if let Err(e) = self.store.remove(&room_activity_key(room_id)) {
            warn!("Could not clear room {} activity: {}", room_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreal_core::MemoryStore;
    use chatreal_media::{TrackKind, TrackSettings};

    fn local_stream() -> MediaStream {
        let (audio, _) = MediaTrack::new(TrackKind::Audio, "Mic", TrackSettings::default());
        let (video, _) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        MediaStream::with_tracks(vec![audio, video])
    }

    #[test]
    fn test_default_ice_servers() {
        let urls: Vec<_> = RtcConfiguration::default()
            .ice_servers
            .into_iter()
            .map(|s| s.urls)
            .collect();
        assert_eq!(
            urls,
            vec!["stun:stun.l.google.com:19302", "stun:stun1.l.google.com:19302"]
        );
    }

    #[test]
    fn test_local_tracks_become_senders() {
        let stream = local_stream();
        let peer = PeerConnectionStub::new(RtcConfiguration::default(), Some(&stream), EventBus::new());
        let senders = peer.senders();
        assert_eq!(senders.len(), 2);
        assert!(senders.iter().all(|s| s.stream_id == stream.id()));
        assert!(!peer.has_remote_description());
        peer.on_ice_candidate(&IceCandidate {
            candidate: "candidate:1 1 udp 2122260223 192.168.1.2 54400 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        });
    }

    #[test]
    fn test_lost_states_fire_disconnect() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let peer = PeerConnectionStub::new(RtcConfiguration::default(), None, bus);

        peer.set_connection_state(PeerConnectionState::Connecting);
        peer.set_connection_state(PeerConnectionState::Connected);
        assert!(events.drain().is_empty());

        peer.set_connection_state(PeerConnectionState::Disconnected);
        peer.set_connection_state(PeerConnectionState::Failed);
        let fired = events.drain();
        assert_eq!(fired.len(), 2);
        assert!(fired.iter().all(|e| matches!(e, Event::Disconnected)));
    }

    #[test]
    fn test_close_is_idempotent_and_final() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let stream = local_stream();
        let peer = PeerConnectionStub::new(RtcConfiguration::default(), Some(&stream), bus);

        peer.close();
        peer.close();
        assert!(peer.is_closed());
        assert!(peer.senders().is_empty());

        peer.set_connection_state(PeerConnectionState::Failed);
        assert_eq!(peer.connection_state(), PeerConnectionState::Closed);
        assert!(!peer.deliver_remote_stream(MediaStream::new()));
        assert!(events.drain().is_empty());
    }

    #[test]
    fn test_presence_first_claim_wins() {
        let store = MemoryStore::shared();
        let presence = LocalStorePresence::new(store.clone());

        assert!(presence.claim("1-abcdefg"));
        assert_eq!(store.get("room_1-abcdefg_active").as_deref(), Some("true"));
        assert!(!presence.claim("1-abcdefg"));
        assert!(presence.claim("2-abcdefg"));

        presence.release("1-abcdefg");
        assert!(presence.claim("1-abcdefg"));
    }
}
