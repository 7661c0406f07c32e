//! Media stream health monitoring

use chatreal_core::ChatRealError;
use chatreal_media::{MediaFrame, MediaTrack, TrackKind};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Point-in-time health of a single track
#[derive(Debug, Clone, Serialize)]
pub struct StreamHealth {
    /// Track being watched
    pub track_id: String,
    /// Track kind
    pub kind: TrackKind,
    /// Whether the track is still live
    pub live: bool,
    /// Whether the track is enabled
    pub enabled: bool,
    /// Frames seen since monitoring started
    pub frames_received: u64,
    /// Average frame rate since monitoring started
    pub frames_per_second: f64,
    /// Size of the last video frame
    pub resolution: Option<(u32, u32)>,
    /// RMS level of the last audio frame
    pub audio_level: Option<f32>,
    /// Wall-clock time of the last frame
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl StreamHealth {
    /// No frame within `threshold` of `now` while the track is live
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold: ChronoDuration) -> bool {
        if !self.live {
            return false;
        }
        match self.last_frame_at {
            Some(last) => now - last > threshold,
            None => true,
        }
    }

    /// Serialize for logging
    pub fn to_json(&self) -> Result<String, ChatRealError> {
        serde_json::to_string(self).map_err(|e| ChatRealError::InvalidMessage {
            message: format!("stream health for {}", self.track_id),
            source: e.into(),
        })
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    frames: u64,
    resolution: Option<(u32, u32)>,
    audio_level: Option<f32>,
    last_frame_at: Option<DateTime<Utc>>,
}

/// Counts frames flowing through a track
#[derive(Debug)]
pub struct StreamMonitor {
    track: MediaTrack,
    state: Arc<Mutex<MonitorState>>,
    started: Instant,
    handle: JoinHandle<()>,
}

impl StreamMonitor {
    /// Start watching `track`
    pub fn watch(track: &MediaTrack) -> Self {
        let state = Arc::new(Mutex::new(MonitorState::default()));
        let task_state = state.clone();
        let mut receiver = track.subscribe();

        let handle = tokio::spawn(async move {
            while let Some(frame) = receiver.recv().await {
                let mut state = task_state.lock();
                state.frames += 1;
                state.last_frame_at = Some(Utc::now());
                match frame {
                    MediaFrame::Video(video) => state.resolution = Some((video.width, video.height)),
                    MediaFrame::Audio(audio) => state.audio_level = Some(audio.rms()),
                }
            }
            tracing::debug!("Stream monitor finished");
        });

        Self {
            track: track.clone(),
            state,
            started: Instant::now(),
            handle,
        }
    }

    /// Current health
    pub fn snapshot(&self) -> StreamHealth {
        let state = self.state.lock();
        let elapsed = self.started.elapsed().as_secs_f64();
        StreamHealth {
            track_id: self.track.id().to_string(),
            kind: self.track.kind(),
            live: self.track.is_live(),
            enabled: self.track.enabled(),
            frames_received: state.frames,
            frames_per_second: if elapsed > 0.0 {
                state.frames as f64 / elapsed
            } else {
                0.0
            },
            resolution: state.resolution,
            audio_level: state.audio_level,
            last_frame_at: state.last_frame_at,
        }
    }
}

impl Drop for StreamMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
