//! Track abstractions and media frame types
//!
//! A [`MediaTrack`] is a handle onto a frame source. Several tracks may share
//! one source (see [`MediaTrack::clone_track`]); the producer writing into the
//! source through its [`TrackWriter`] keeps running until every track on it
//! has been stopped, or until it ends the source itself.

use crate::error::{MediaError, MediaResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace};
use uuid::Uuid;

/// Frames buffered per subscriber before it starts lagging
const FRAME_BUFFER: usize = 16;

/// Audio frame representation
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Audio samples (f32 PCM data, interleaved)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds
    pub timestamp: u64,
}

impl AudioFrame {
    /// Same shape and timestamp, all samples zero
    pub fn silenced(&self) -> Self {
        Self {
            samples: vec![0.0; self.samples.len()],
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp: self.timestamp,
        }
    }

    /// Root mean square level of the samples
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum / self.samples.len() as f32).sqrt()
    }
}

/// Raw RGB24 video frame
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed RGB24 pixel data, row-major
    pub data: Bytes,
    /// Timestamp in milliseconds
    pub timestamp: u64,
}

impl VideoFrame {
    /// Create a frame, checking the buffer matches the dimensions
    pub fn new(width: u32, height: u32, data: impl Into<Bytes>, timestamp: u64) -> MediaResult<Self> {
        let data = data.into();
        let expected = Self::expected_len(width, height);
        if data.len() != expected {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            timestamp,
        })
    }

    /// An all-black frame
    pub fn black(width: u32, height: u32, timestamp: u64) -> Self {
        Self {
            width,
            height,
            data: Bytes::from(vec![0u8; Self::expected_len(width, height)]),
            timestamp,
        }
    }

    /// Buffer size for an RGB24 frame of the given dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// RGB value at a pixel, or `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        self.data
            .get(offset..offset + 3)
            .map(|p| [p[0], p[1], p[2]])
    }
}

/// Media frame types
#[derive(Debug, Clone, PartialEq)]
pub enum MediaFrame {
    /// Audio frame
    Audio(AudioFrame),
    /// Video frame
    Video(VideoFrame),
}

impl MediaFrame {
    /// Timestamp in milliseconds
    pub fn timestamp(&self) -> u64 {
        match self {
            MediaFrame::Audio(frame) => frame.timestamp,
            MediaFrame::Video(frame) => frame.timestamp,
        }
    }

    /// What a consumer of a disabled track sees: black video or silence
    fn muted(self) -> Self {
        match self {
            MediaFrame::Audio(frame) => MediaFrame::Audio(frame.silenced()),
            MediaFrame::Video(frame) => {
                MediaFrame::Video(VideoFrame::black(frame.width, frame.height, frame.timestamp))
            }
        }
    }
}

/// Kind of media a track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

/// Track lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Producing frames
    Live,
    /// Stopped, permanently
    Ended,
}

/// Settings a track was actually opened with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSettings {
    /// Video width in pixels
    pub width: Option<u32>,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Video frame rate
    pub frame_rate: Option<u32>,
    /// Audio sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Audio channel count
    pub channels: Option<u16>,
    /// Identifier of the device backing the track
    pub device_id: Option<String>,
}

struct FrameSource {
    frames: broadcast::Sender<MediaFrame>,
    live_tracks: AtomicUsize,
    running: watch::Sender<bool>,
}

impl FrameSource {
    fn release(&self) {
        if self.live_tracks.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.running.send_replace(false);
        }
    }

    fn is_running(&self) -> bool {
        *self.running.borrow()
    }
}

/// Producer side of a track's frame source
#[derive(Clone)]
pub struct TrackWriter {
    source: Arc<FrameSource>,
}

impl TrackWriter {
    /// Publish a frame to every subscriber
    ///
    /// Returns `false` once the source has been released; producers should
    /// stop at that point.
    pub fn push(&self, frame: MediaFrame) -> bool {
        if !self.is_active() {
            return false;
        }
        // No subscribers is fine, the frame is simply dropped.
        let _ = self.source.frames.send(frame);
        true
    }

    /// Whether any track still consumes this source
    pub fn is_active(&self) -> bool {
        self.source.is_running()
    }

    /// End the source from the producer side, ending every track on it
    pub fn end(&self) {
        if self.source.running.send_replace(false) {
            debug!("Frame source ended by producer");
        }
    }

    /// Resolves once the source is released or ended
    pub async fn closed(&self) {
        let mut running = self.source.running.subscribe();
        let _ = running.wait_for(|running| !running).await;
    }
}

impl fmt::Debug for TrackWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackWriter")
            .field("active", &self.is_active())
            .finish()
    }
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    settings: TrackSettings,
    enabled: AtomicBool,
    state: watch::Sender<ReadyState>,
    source: Arc<FrameSource>,
}

/// A live audio or video track
///
/// Cloning the handle (`Clone`) refers to the same track. Use
/// [`MediaTrack::clone_track`] for an independent track on the same source.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create a track together with the writer that feeds it
    pub fn new(kind: TrackKind, label: impl Into<String>, settings: TrackSettings) -> (Self, TrackWriter) {
        let (frames, _) = broadcast::channel(FRAME_BUFFER);
        let (running, _) = watch::channel(true);
        let source = Arc::new(FrameSource {
            frames,
            live_tracks: AtomicUsize::new(1),
            running,
        });

        let track = Self::on_source(kind, label.into(), settings, true, ReadyState::Live, source.clone());
        debug!("Created {} track {} ({})", kind, track.id(), track.label());
        (track, TrackWriter { source })
    }

    fn on_source(
        kind: TrackKind,
        label: String,
        settings: TrackSettings,
        enabled: bool,
        state: ReadyState,
        source: Arc<FrameSource>,
    ) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4().to_string(),
                kind,
                label,
                settings,
                enabled: AtomicBool::new(enabled),
                state,
                source,
            }),
        }
    }

    /// Unique track id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Track kind
    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    /// Human-readable device label
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Settings the track was opened with
    pub fn settings(&self) -> &TrackSettings {
        &self.inner.settings
    }

    /// Whether frames pass through unmuted
    pub fn enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Mute or unmute the track without ending it
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        debug!("{} track {} enabled={}", self.kind(), self.id(), enabled);
    }

    /// Current lifecycle state
    pub fn ready_state(&self) -> ReadyState {
        if *self.inner.state.borrow() == ReadyState::Ended || !self.inner.source.is_running() {
            ReadyState::Ended
        } else {
            ReadyState::Live
        }
    }

    /// Shorthand for `ready_state() == ReadyState::Live`
    pub fn is_live(&self) -> bool {
        self.ready_state() == ReadyState::Live
    }

    /// Stop the track. Calling this more than once has no further effect.
    pub fn stop(&self) {
        if self.inner.state.send_replace(ReadyState::Ended) == ReadyState::Live {
            self.inner.source.release();
            debug!("Stopped {} track {}", self.kind(), self.id());
        }
    }

    /// Resolves when the track ends, whether stopped or ended by its source
    pub async fn ended(&self) {
        let mut own = self.inner.state.subscribe();
        let mut source = self.inner.source.running.subscribe();
        tokio::select! {
            _ = own.wait_for(|state| *state == ReadyState::Ended) => {}
            _ = source.wait_for(|running| !running) => {}
        }
    }

    /// Receive frames from this track
    pub fn subscribe(&self) -> TrackReceiver {
        TrackReceiver {
            frames: self.inner.source.frames.subscribe(),
            track: self.clone(),
        }
    }

    /// A new, independent track reading the same source
    pub fn clone_track(&self) -> MediaTrack {
        let state = self.ready_state();
        if state == ReadyState::Live {
            self.inner.source.live_tracks.fetch_add(1, Ordering::SeqCst);
        }
        let clone = Self::on_source(
            self.kind(),
            self.inner.label.clone(),
            self.inner.settings.clone(),
            self.enabled(),
            state,
            self.inner.source.clone(),
        );
        debug!("Cloned {} track {} as {}", self.kind(), self.id(), clone.id());
        clone
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("enabled", &self.enabled())
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for MediaTrack {}

/// Frame subscription on a track
pub struct TrackReceiver {
    frames: broadcast::Receiver<MediaFrame>,
    track: MediaTrack,
}

impl TrackReceiver {
    /// Next frame, or `None` once the track has ended
    ///
    /// Frames of a disabled track arrive as black video or silence.
    /// A slow receiver skips the frames it missed.
    pub async fn recv(&mut self) -> Option<MediaFrame> {
        loop {
            if !self.track.is_live() {
                return None;
            }
            tokio::select! {
                received = self.frames.recv() => match received {
                    Ok(frame) if self.track.enabled() => return Some(frame),
                    Ok(frame) => return Some(frame.muted()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!("Receiver on {} skipped {} frames", self.track.id(), skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                _ = self.track.ended() => return None,
            }
        }
    }

    /// The track this receiver reads
    pub fn track(&self) -> &MediaTrack {
        &self.track
    }
}

struct StreamInner {
    id: String,
    tracks: parking_lot::RwLock<Vec<MediaTrack>>,
}

/// An ordered set of tracks
///
/// Cloning the handle refers to the same stream.
#[derive(Clone)]
pub struct MediaStream {
    inner: Arc<StreamInner>,
}

impl MediaStream {
    /// Empty stream
    pub fn new() -> Self {
        Self::with_tracks(Vec::new())
    }

    /// Stream holding the given tracks
    pub fn with_tracks(tracks: Vec<MediaTrack>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: Uuid::new_v4().to_string(),
                tracks: parking_lot::RwLock::new(tracks),
            }),
        }
    }

    /// Unique stream id
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// All tracks, audio and video, in insertion order
    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.inner.tracks.read().clone()
    }

    /// Audio tracks
    pub fn audio_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Audio)
    }

    /// Video tracks
    pub fn video_tracks(&self) -> Vec<MediaTrack> {
        self.tracks_of(TrackKind::Video)
    }

    fn tracks_of(&self, kind: TrackKind) -> Vec<MediaTrack> {
        self.inner
            .tracks
            .read()
            .iter()
            .filter(|t| t.kind() == kind)
            .cloned()
            .collect()
    }

    /// First audio track
    pub fn first_audio_track(&self) -> Option<MediaTrack> {
        self.audio_tracks().into_iter().next()
    }

    /// First video track
    pub fn first_video_track(&self) -> Option<MediaTrack> {
        self.video_tracks().into_iter().next()
    }

    /// Look up a track by id
    pub fn track_by_id(&self, id: &str) -> Option<MediaTrack> {
        self.inner.tracks.read().iter().find(|t| t.id() == id).cloned()
    }

    /// Add a track; adding the same track twice has no effect
    pub fn add_track(&self, track: MediaTrack) {
        let mut tracks = self.inner.tracks.write();
        if !tracks.contains(&track) {
            tracks.push(track);
        }
    }

    /// Remove a track by id, returning whether it was present
    pub fn remove_track(&self, id: &str) -> bool {
        let mut tracks = self.inner.tracks.write();
        let before = tracks.len();
        tracks.retain(|t| t.id() != id);
        tracks.len() != before
    }

    /// Whether any track is still live
    pub fn active(&self) -> bool {
        self.inner.tracks.read().iter().any(MediaTrack::is_live)
    }

    /// Whether some track is both live and enabled
    pub fn has_live_enabled_track(&self) -> bool {
        self.inner
            .tracks
            .read()
            .iter()
            .any(|t| t.is_live() && t.enabled())
    }

    /// Stop every track in the stream
    pub fn stop_all(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }
}

impl Default for MediaStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.inner.id)
            .field("tracks", &*self.inner.tracks.read())
            .finish()
    }
}

impl PartialEq for MediaStream {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_frame(value: u8) -> MediaFrame {
        MediaFrame::Video(VideoFrame::new(2, 2, vec![value; 12], 0).unwrap())
    }

    #[test]
    fn test_video_frame_validates_length() {
        let result = VideoFrame::new(4, 4, vec![0u8; 10], 0);
        assert!(matches!(
            result,
            Err(MediaError::InvalidFrameData {
                expected: 48,
                actual: 10
            })
        ));

        let frame = VideoFrame::new(2, 1, vec![1, 2, 3, 4, 5, 6], 0).unwrap();
        assert_eq!(frame.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_source() {
        let (track, writer) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        assert!(track.is_live());
        assert!(writer.is_active());

        track.stop();
        track.stop();
        assert_eq!(track.ready_state(), ReadyState::Ended);
        assert!(!writer.is_active());
        assert!(!writer.push(video_frame(1)));
    }

    #[test]
    fn test_clone_track_keeps_source_alive() {
        let (track, writer) = MediaTrack::new(TrackKind::Audio, "Mic", TrackSettings::default());
        let clone = track.clone_track();
        assert_ne!(track.id(), clone.id());
        assert_eq!(clone.kind(), TrackKind::Audio);

        track.stop();
        assert!(clone.is_live());
        assert!(writer.is_active());

        clone.stop();
        assert!(!writer.is_active());

        let late = track.clone_track();
        assert_eq!(late.ready_state(), ReadyState::Ended);
    }

    #[test]
    fn test_writer_end_ends_tracks() {
        let (track, writer) = MediaTrack::new(TrackKind::Video, "Screen", TrackSettings::default());
        writer.end();
        assert!(!track.is_live());
    }

    #[tokio::test]
    async fn test_disabled_video_arrives_black() {
        let (track, writer) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        let mut receiver = track.subscribe();

        writer.push(video_frame(200));
        assert_eq!(receiver.recv().await, Some(video_frame(200)));

        track.set_enabled(false);
        writer.push(video_frame(200));
        assert_eq!(receiver.recv().await, Some(video_frame(0)));
    }

    #[tokio::test]
    async fn test_receiver_ends_with_track() {
        let (track, _writer) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        let mut receiver = track.subscribe();

        let handle = tokio::spawn(async move { receiver.recv().await });
        track.stop();
        assert_eq!(handle.await.unwrap(), None);
        tokio::time::timeout(std::time::Duration::from_secs(1), track.ended())
            .await
            .unwrap();
    }

    #[test]
    fn test_stream_helpers() {
        let (audio, _a) = MediaTrack::new(TrackKind::Audio, "Mic", TrackSettings::default());
        let (video, _v) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        let stream = MediaStream::with_tracks(vec![audio.clone(), video.clone()]);

        stream.add_track(audio.clone());
        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(stream.first_audio_track(), Some(audio.clone()));
        assert_eq!(stream.first_video_track(), Some(video.clone()));
        assert!(stream.has_live_enabled_track());

        audio.set_enabled(false);
        video.set_enabled(false);
        assert!(stream.active());
        assert!(!stream.has_live_enabled_track());

        stream.stop_all();
        assert!(!stream.active());

        assert!(stream.remove_track(video.id()));
        assert!(!stream.remove_track(video.id()));
        assert!(stream.video_tracks().is_empty());
    }
}
