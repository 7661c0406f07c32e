//! Call media service
//!
//! Owns the local stream, the peer connection and the simulated remote for a
//! single room. The session drives it; every callback it produces goes out on
//! the session's [`EventBus`].

use crate::event::{Event, EventBus};
use crate::peer::{PeerConnectionStub, RoomPresence, RtcConfiguration};
use crate::simulation::{RemoteSimulation, RemoteSimulationConfig};
use chatreal_media::{
    acquire_local_media, AcquiredMedia, MediaResult, MediaStream, SharedDevices, TrackKind,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Local media, peer connection and simulated remote for one room
#[derive(Debug)]
pub struct RtcService {
    room_id: String,
    devices: SharedDevices,
    presence: Arc<dyn RoomPresence>,
    events: EventBus,
    rtc_config: RtcConfiguration,
    simulation_config: RemoteSimulationConfig,
    local_stream: Mutex<Option<MediaStream>>,
    peer: Mutex<Option<Arc<PeerConnectionStub>>>,
    simulation: Mutex<Option<RemoteSimulation>>,
    is_initiator: AtomicBool,
}

impl RtcService {
    /// Service for `room_id`; nothing is opened until [`initialize`](Self::initialize)
    pub fn new(
        room_id: impl Into<String>,
        devices: SharedDevices,
        presence: Arc<dyn RoomPresence>,
        events: EventBus,
        rtc_config: RtcConfiguration,
        simulation_config: RemoteSimulationConfig,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            devices,
            presence,
            events,
            rtc_config,
            simulation_config,
            local_stream: Mutex::new(None),
            peer: Mutex::new(None),
            simulation: Mutex::new(None),
            is_initiator: AtomicBool::new(false),
        }
    }

    /// Room this service belongs to
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Open local media, then set up the peer connection and schedule the
    /// simulated remote
    ///
    /// Initializing again while a stream is held behaves like
    /// [`reinitialize_stream`](Self::reinitialize_stream).
    pub async fn initialize(&self) -> MediaResult<AcquiredMedia> {
        if self.local_stream.lock().is_some() {
            debug!("Room {} already initialized, reopening media", self.room_id);
            return self.reinitialize_stream().await;
        }
        let acquired = self.acquire().await?;
        self.setup_connection(&acquired.stream);
        Ok(acquired)
    }

    async fn acquire(&self) -> MediaResult<AcquiredMedia> {
        let events = self.events.clone();
        let acquired = acquire_local_media(self.devices.as_ref(), |stream| {
            events.emit(Event::LocalStream {
                stream: stream.clone(),
            })
        })
        .await?;
        if let Some(previous) = self.local_stream.lock().replace(acquired.stream.clone()) {
            previous.stop_all();
        }
        Ok(acquired)
    }

    fn setup_connection(&self, stream: &MediaStream) {
        let is_initiator = self.presence.claim(&self.room_id);
        self.is_initiator.store(is_initiator, Ordering::SeqCst);
        info!("Room {}: initiator={}", self.room_id, is_initiator);

        let peer = Arc::new(PeerConnectionStub::new(
            self.rtc_config.clone(),
            Some(stream),
            self.events.clone(),
        ));
        let simulation =
            RemoteSimulation::spawn(stream.clone(), peer.clone(), self.simulation_config.clone());

        if let Some(previous) = self.peer.lock().replace(peer) {
            previous.close();
        }
        // Replacing an older simulation drops and cancels it.
        *self.simulation.lock() = Some(simulation);
    }

    /// Whether this instance claimed the room first
    pub fn is_initiator(&self) -> bool {
        self.is_initiator.load(Ordering::SeqCst)
    }

    /// The local stream, while open
    pub fn local_stream(&self) -> Option<MediaStream> {
        self.local_stream.lock().clone()
    }

    /// The peer connection, once set up
    pub fn peer(&self) -> Option<Arc<PeerConnectionStub>> {
        self.peer.lock().clone()
    }

    /// The simulated remote stream, once delivered
    pub fn remote_stream(&self) -> Option<MediaStream> {
        self.simulation
            .lock()
            .as_ref()
            .and_then(RemoteSimulation::remote_stream)
    }

    /// Flip `enabled` on the first track of `kind`
    ///
    /// Returns the new value, or `None` when there is no such track.
    pub fn toggle_track(&self, kind: TrackKind) -> Option<bool> {
        let track = self.local_stream().and_then(|stream| match kind {
            TrackKind::Audio => stream.first_audio_track(),
            TrackKind::Video => stream.first_video_track(),
        });
        match track {
            Some(track) => {
                track.set_enabled(!track.enabled());
                info!("{} toggled: {}", kind, track.enabled());
                Some(track.enabled())
            }
            None => {
                info!("No {} track available", kind);
                None
            }
        }
    }

    /// Toggle the microphone; false when there is no audio track
    pub fn toggle_audio(&self) -> bool {
        self.toggle_track(TrackKind::Audio).unwrap_or(false)
    }

    /// Toggle the camera; false when there is no video track
    pub fn toggle_video(&self) -> bool {
        self.toggle_track(TrackKind::Video).unwrap_or(false)
    }

    /// Stop the current tracks and run the acquisition cascade again
    ///
    /// A connection that was never set up, because the first acquisition
    /// failed, is set up now; otherwise its senders are swapped.
    pub async fn reinitialize_stream(&self) -> MediaResult<AcquiredMedia> {
        if let Some(stream) = self.local_stream.lock().take() {
            stream.stop_all();
        }

        let acquired = self.acquire().await?;
        match self.peer() {
            Some(peer) if !peer.is_closed() => peer.replace_local_stream(&acquired.stream),
            _ => self.setup_connection(&acquired.stream),
        }
        Ok(acquired)
    }

    /// Whether some local track is live and enabled
    pub fn is_stream_active(&self) -> bool {
        self.local_stream
            .lock()
            .as_ref()
            .map(MediaStream::has_live_enabled_track)
            .unwrap_or(false)
    }

    /// Forget the room and release everything
    pub fn disconnect(&self) {
        self.presence.release(&self.room_id);
        self.cleanup();
    }

    /// Stop local tracks, close the connection and cancel the simulation
    pub fn cleanup(&self) {
        if let Some(simulation) = self.simulation.lock().take() {
            simulation.cancel();
        }
        if let Some(stream) = self.local_stream.lock().take() {
            stream.stop_all();
        }
        if let Some(peer) = self.peer.lock().take() {
            peer.close();
        }
        debug!("Room {} media released", self.room_id);
    }
}

impl Drop for RtcService {
    fn drop(&mut self) {
        self.cleanup();
    }
}
