//! Simulated remote participant
//!
//! There is no second peer. A while after the connection is set up, the local
//! camera is mirrored onto a small canvas with a badge, the local microphone
//! is cloned next to it, and the result is delivered through the peer
//! connection exactly like a received stream.

use crate::peer::PeerConnectionStub;
use chatreal_media::mirror::Rect;
use chatreal_media::{CanvasMirror, MediaStream, MediaTrack, MirrorConfig, VideoResolution};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Timing and canvas settings of the simulated remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSimulationConfig {
    /// Wait before the other peer is "discovered"
    pub discovery_delay: Duration,
    /// Further wait before its stream arrives
    pub arrival_delay: Duration,
    /// Canvas width
    pub width: u32,
    /// Canvas height
    pub height: u32,
    /// Canvas frame rate
    pub fps: u32,
    /// Badge text
    pub label: String,
}

impl RemoteSimulationConfig {
    /// Same canvas, no waiting
    pub fn immediate() -> Self {
        Self {
            discovery_delay: Duration::ZERO,
            arrival_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Total wait before the remote stream can arrive
    pub fn total_delay(&self) -> Duration {
        self.discovery_delay + self.arrival_delay
    }

    /// Canvas settings for the mirror task
    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            canvas: VideoResolution::new(self.width, self.height),
            fps: self.fps,
            badge: Rect {
                x: 10,
                y: 10,
                width: 80,
                height: 30,
            },
            badge_color: [0, 255, 0, 77],
            label: self.label.clone(),
        }
    }
}

impl Default for RemoteSimulationConfig {
    fn default() -> Self {
        Self {
            discovery_delay: Duration::from_secs(2),
            arrival_delay: Duration::from_secs(3),
            width: 320,
            height: 240,
            fps: 30,
            label: "REMOTE".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Delivered {
    mirror: Option<CanvasMirror>,
    stream: Option<MediaStream>,
}

/// A pending or running simulated remote
#[derive(Debug)]
pub struct RemoteSimulation {
    handle: JoinHandle<()>,
    delivered: Arc<Mutex<Delivered>>,
}

impl RemoteSimulation {
    /// Schedule the remote stream for `local`
    pub fn spawn(
        local: MediaStream,
        peer: Arc<PeerConnectionStub>,
        config: RemoteSimulationConfig,
    ) -> Self {
        let delivered = Arc::new(Mutex::new(Delivered::default()));
        let slot = delivered.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(config.discovery_delay).await;
            debug!("Simulating discovery of a second peer");
            tokio::time::sleep(config.arrival_delay).await;

            let video = local.first_video_track();
            if let Some(track) = &video {
                if !wait_for_first_frame(track).await {
                    debug!("Local video ended before its first frame, no remote");
                    return;
                }
            }

            let mirror = CanvasMirror::spawn(video, config.mirror_config());
            let remote = MediaStream::with_tracks(vec![mirror.canvas_track().clone()]);
            if let Some(audio) = local.first_audio_track() {
                remote.add_track(audio.clone_track());
            }

            {
                let mut slot = slot.lock();
                slot.mirror = Some(mirror);
                slot.stream = Some(remote.clone());
            }
            info!("Simulated remote stream ready");
            peer.deliver_remote_stream(remote);
        });

        Self { handle, delivered }
    }

    /// The delivered stream, once it exists
    pub fn remote_stream(&self) -> Option<MediaStream> {
        self.delivered.lock().stream.clone()
    }

    /// Whether the scheduling task has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop waiting, stop drawing and end every remote track
    pub fn cancel(&self) {
        self.handle.abort();
        let mut delivered = self.delivered.lock();
        if let Some(mirror) = delivered.mirror.take() {
            mirror.stop();
        }
        if let Some(stream) = delivered.stream.take() {
            stream.stop_all();
        }
    }
}

impl Drop for RemoteSimulation {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Wait for the first frame of `track`, as a video element's `loadeddata`
async fn wait_for_first_frame(track: &MediaTrack) -> bool {
    track.subscribe().recv().await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventBus};
    use crate::peer::RtcConfiguration;
    use chatreal_media::{MediaFrame, TrackKind, TrackSettings, VideoFrame};

    fn peer(bus: &EventBus) -> Arc<PeerConnectionStub> {
        Arc::new(PeerConnectionStub::new(RtcConfiguration::default(), None, bus.clone()))
    }

    #[test]
    fn test_default_config() {
        let config = RemoteSimulationConfig::default();
        assert_eq!(config.total_delay(), Duration::from_secs(5));
        let mirror = config.mirror_config();
        assert_eq!(mirror.canvas, VideoResolution::CANVAS);
        assert_eq!(mirror.label, "REMOTE");
        assert_eq!(mirror.badge_color, [0, 255, 0, 77]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_only_local_still_gets_black_canvas() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (audio, _writer) = MediaTrack::new(TrackKind::Audio, "Mic", TrackSettings::default());
        let local = MediaStream::with_tracks(vec![audio.clone()]);

        let simulation = RemoteSimulation::spawn(local, peer(&bus), RemoteSimulationConfig::default());
        tokio::time::sleep(Duration::from_millis(4_900)).await;
        assert!(events.try_next().unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let Some(Event::RemoteStream { stream }) = events.next().await else {
            panic!("expected a remote stream");
        };
        assert_eq!(stream.video_tracks().len(), 1);
        let cloned = stream.first_audio_track().unwrap();
        assert_ne!(cloned.id(), audio.id());

        let mut frames = stream.first_video_track().unwrap().subscribe();
        let Some(MediaFrame::Video(frame)) = frames.recv().await else {
            panic!("expected a canvas frame");
        };
        assert_eq!((frame.width, frame.height), (320, 240));

        simulation.cancel();
        assert!(!stream.active());
        assert!(audio.is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_first_local_frame() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let (video, writer) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        let local = MediaStream::with_tracks(vec![video]);

        let _simulation = RemoteSimulation::spawn(local, peer(&bus), RemoteSimulationConfig::immediate());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(events.try_next().unwrap().is_none());

        writer.push(MediaFrame::Video(VideoFrame::black(64, 48, 0)));
        let Some(Event::RemoteStream { stream }) = events.next().await else {
            panic!("expected a remote stream");
        };
        assert!(stream.first_audio_track().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_arrival() {
        let bus = EventBus::new();
        let mut events = bus.subscribe();
        let local = MediaStream::new();
        let simulation = RemoteSimulation::spawn(local, peer(&bus), RemoteSimulationConfig::default());

        tokio::time::sleep(Duration::from_secs(1)).await;
        simulation.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(simulation.is_finished());
        assert!(simulation.remote_stream().is_none());
        assert!(events.try_next().unwrap().is_none());
    }
}
