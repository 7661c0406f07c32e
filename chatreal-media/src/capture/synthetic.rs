//! Synthetic capture backend
//!
//! Virtual camera, microphone and screen. Video is a moving gradient test
//! pattern, audio a 440 Hz sine. Device availability and failures are
//! configurable so every capture error path can be driven without hardware.

use super::{empty_request_error, DeviceInfo, DeviceKind, MediaDevices};
use crate::constraints::{
    DisplayMediaConstraints, MediaStreamConstraints, VideoConstraint, VideoResolution,
};
use crate::error::CaptureError;
use crate::mirror::frame_period;
use crate::tracks::{
    AudioFrame, MediaFrame, MediaStream, MediaTrack, TrackKind, TrackSettings, TrackWriter,
    VideoFrame,
};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

const TONE_HZ: f32 = 440.0;
const AUDIO_FRAME_MS: u64 = 20;

/// Which virtual devices exist and how they behave
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Largest resolution the camera supports; `None` means no camera
    pub camera: Option<VideoResolution>,
    /// Whether a microphone is present
    pub microphone: bool,
    /// Screen size; `None` means screen capture is unavailable
    pub screen: Option<VideoResolution>,
    /// Refuse every camera/microphone request with `NotAllowedError`
    pub permission_denied: bool,
    /// Camera present but held by another application (`NotReadableError`)
    pub camera_busy: bool,
    /// The user dismisses the screen picker
    pub screen_share_cancelled: bool,
    /// Video frame rate
    pub frame_rate: u32,
    /// Audio sample rate in Hz
    pub sample_rate: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            camera: Some(VideoResolution::HD),
            microphone: true,
            screen: Some(VideoResolution::new(1920, 1080)),
            permission_denied: false,
            camera_busy: false,
            screen_share_cancelled: false,
            frame_rate: 30,
            sample_rate: 48_000,
        }
    }
}

impl SyntheticConfig {
    /// No camera, microphone or screen at all
    pub fn no_devices() -> Self {
        Self {
            camera: None,
            microphone: false,
            screen: None,
            ..Self::default()
        }
    }

    /// Limit the camera to the given resolution
    pub fn with_camera_limit(mut self, resolution: VideoResolution) -> Self {
        self.camera = Some(resolution);
        self
    }

    /// Remove the camera
    pub fn without_camera(mut self) -> Self {
        self.camera = None;
        self
    }

    /// Remove the microphone
    pub fn without_microphone(mut self) -> Self {
        self.microphone = false;
        self
    }

    /// Refuse camera/microphone access
    pub fn deny_permission(mut self) -> Self {
        self.permission_denied = true;
        self
    }

    /// Make the camera unreadable
    pub fn with_busy_camera(mut self) -> Self {
        self.camera_busy = true;
        self
    }

    /// Dismiss every screen picker
    pub fn cancel_screen_share(mut self) -> Self {
        self.screen_share_cancelled = true;
        self
    }
}

/// Configurable virtual devices
#[derive(Debug, Default)]
pub struct SyntheticDevices {
    config: Mutex<SyntheticConfig>,
    attempts: Mutex<Vec<MediaStreamConstraints>>,
    scripted_failures: Mutex<VecDeque<CaptureError>>,
    screen_writers: Mutex<Vec<TrackWriter>>,
    active_sources: Arc<AtomicUsize>,
}

impl SyntheticDevices {
    /// Devices described by `config`
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    /// Change the device setup; affects later requests only
    pub fn update_config(&self, update: impl FnOnce(&mut SyntheticConfig)) {
        update(&mut self.config.lock());
    }

    /// Fail the next `get_user_media` call with `error`, ahead of normal checks
    pub fn push_failure(&self, error: CaptureError) {
        self.scripted_failures.lock().push_back(error);
    }

    /// Every `get_user_media` request seen so far, in order
    pub fn attempts(&self) -> Vec<MediaStreamConstraints> {
        self.attempts.lock().clone()
    }

    /// Number of producers still running, i.e. devices still held open
    pub fn active_sources(&self) -> usize {
        self.active_sources.load(Ordering::SeqCst)
    }

    /// Simulate the user pressing the platform's "stop sharing" button
    pub fn stop_screen_capture(&self) {
        for writer in self.screen_writers.lock().drain(..) {
            writer.end();
        }
        info!("Synthetic screen capture stopped by user");
    }

    fn check_user_media(
        config: &SyntheticConfig,
        constraints: &MediaStreamConstraints,
    ) -> Result<Option<VideoResolution>, CaptureError> {
        if constraints.is_empty() {
            return Err(empty_request_error());
        }
        if config.permission_denied {
            return Err(CaptureError::not_allowed("Permission denied"));
        }

        let mut resolution = None;
        if constraints.video.is_requested() {
            let limit = config
                .camera
                .ok_or_else(|| CaptureError::not_found("Requested device not found"))?;
            if config.camera_busy {
                return Err(CaptureError::not_readable("Could not start video source"));
            }
            resolution = Some(match constraints.video {
                VideoConstraint::Ideal(wanted) if wanted.fits_within(&limit) => wanted,
                VideoConstraint::Ideal(wanted) => {
                    return Err(CaptureError::overconstrained(format!(
                        "Camera cannot deliver {} (max {})",
                        wanted, limit
                    )))
                }
                _ if VideoResolution::VGA.fits_within(&limit) => VideoResolution::VGA,
                _ => limit,
            });
        }

        if constraints.audio && !config.microphone {
            return Err(CaptureError::not_found("Requested device not found"));
        }

        Ok(resolution)
    }

    fn open_video(&self, label: &str, resolution: VideoResolution, frame_rate: u32) -> (MediaTrack, TrackWriter) {
        let settings = TrackSettings {
            width: Some(resolution.width),
            height: Some(resolution.height),
            frame_rate: Some(frame_rate),
            device_id: Some(format!("synthetic-{}", label.to_lowercase())),
            ..TrackSettings::default()
        };
        let (track, writer) = MediaTrack::new(TrackKind::Video, format!("Synthetic {}", label), settings);
        spawn_pattern(writer.clone(), resolution, frame_rate, self.active_sources.clone());
        (track, writer)
    }

    fn open_audio(&self, label: &str, sample_rate: u32) -> (MediaTrack, TrackWriter) {
        let settings = TrackSettings {
            sample_rate: Some(sample_rate),
            channels: Some(1),
            device_id: Some(format!("synthetic-{}", label.to_lowercase().replace(' ', "-"))),
            ..TrackSettings::default()
        };
        let (track, writer) = MediaTrack::new(TrackKind::Audio, format!("Synthetic {}", label), settings);
        spawn_tone(writer.clone(), sample_rate, self.active_sources.clone());
        (track, writer)
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, CaptureError> {
        self.attempts.lock().push(*constraints);

        if let Some(error) = self.scripted_failures.lock().pop_front() {
            debug!("Scripted capture failure for {}: {}", constraints, error);
            return Err(error);
        }

        let config = self.config.lock().clone();
        let resolution = Self::check_user_media(&config, constraints)?;

        let stream = MediaStream::new();
        if constraints.audio {
            stream.add_track(self.open_audio("Microphone", config.sample_rate).0);
        }
        if let Some(resolution) = resolution {
            stream.add_track(self.open_video("Camera", resolution, config.frame_rate).0);
        }

        debug!("Synthetic capture opened for {}", constraints);
        Ok(stream)
    }

    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        let config = self.config.lock().clone();
        if !constraints.video {
            return Err(empty_request_error());
        }
        if config.screen_share_cancelled {
            return Err(CaptureError::not_allowed("Permission denied by user"));
        }
        let screen = config
            .screen
            .ok_or_else(|| CaptureError::not_found("No screen available for capture"))?;

        let stream = MediaStream::new();
        let mut writers = Vec::new();

        let (video, writer) = self.open_video("Screen", screen, config.frame_rate);
        stream.add_track(video);
        writers.push(writer);

        if constraints.audio {
            let (audio, writer) = self.open_audio("System Audio", config.sample_rate);
            stream.add_track(audio);
            writers.push(writer);
        }

        self.screen_writers.lock().extend(writers);
        Ok(stream)
    }

    async fn enumerate_devices(&self) -> Vec<DeviceInfo> {
        let config = self.config.lock().clone();
        let mut devices = Vec::new();
        if config.camera.is_some() {
            devices.push(DeviceInfo::new("synthetic-camera", DeviceKind::VideoInput, "Synthetic Camera"));
        }
        if config.microphone {
            devices.push(DeviceInfo::new(
                "synthetic-microphone",
                DeviceKind::AudioInput,
                "Synthetic Microphone",
            ));
        }
        devices.push(DeviceInfo::new("synthetic-speaker", DeviceKind::AudioOutput, "Synthetic Speaker"));
        devices
    }
}

struct SourceGuard(Arc<AtomicUsize>);

impl SourceGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Gradient test pattern: red rises left to right, green top to bottom,
/// blue cycles with the frame index.
pub fn test_pattern(resolution: VideoResolution, frame_index: u64, timestamp: u64) -> VideoFrame {
    let VideoResolution { width, height } = resolution;
    let blue = (frame_index % 256) as u8;
    let mut row = Vec::with_capacity(width as usize * 3);
    for x in 0..width {
        row.extend_from_slice(&[scale(x, width), 0, blue]);
    }

    let mut data = Vec::with_capacity(VideoFrame::expected_len(width, height));
    for y in 0..height {
        let green = scale(y, height);
        data.extend(row.chunks_exact(3).flat_map(|p| [p[0], green, p[2]]));
    }

    VideoFrame {
        width,
        height,
        data: Bytes::from(data),
        timestamp,
    }
}

fn scale(position: u32, extent: u32) -> u8 {
    if extent <= 1 {
        return 0;
    }
    (position as u64 * 255 / (extent as u64 - 1)) as u8
}

fn spawn_pattern(writer: TrackWriter, resolution: VideoResolution, frame_rate: u32, active: Arc<AtomicUsize>) {
    let period = frame_period(frame_rate);
    tokio::spawn(async move {
        let _guard = SourceGuard::new(active);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let start = Instant::now();
        let mut frame_index = 0u64;

        loop {
            tokio::select! {
                _ = writer.closed() => break,
                _ = ticker.tick() => {
                    let timestamp = start.elapsed().as_millis() as u64;
                    let frame = test_pattern(resolution, frame_index, timestamp);
                    if !writer.push(MediaFrame::Video(frame)) {
                        break;
                    }
                    frame_index += 1;
                }
            }
        }
        debug!("Synthetic video source released after {} frames", frame_index);
    });
}

fn spawn_tone(writer: TrackWriter, sample_rate: u32, active: Arc<AtomicUsize>) {
    tokio::spawn(async move {
        let _guard = SourceGuard::new(active);
        let mut ticker = interval(Duration::from_millis(AUDIO_FRAME_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let samples_per_frame = (sample_rate as u64 * AUDIO_FRAME_MS / 1000) as usize;
        let start = Instant::now();
        let mut sample_index = 0u64;

        loop {
            tokio::select! {
                _ = writer.closed() => break,
                _ = ticker.tick() => {
                    let samples = (0..samples_per_frame)
                        .map(|i| {
                            let t = (sample_index + i as u64) as f32 / sample_rate as f32;
                            (2.0 * std::f32::consts::PI * TONE_HZ * t).sin() * 0.5
                        })
                        .collect();
                    sample_index += samples_per_frame as u64;
                    let frame = AudioFrame {
                        samples,
                        sample_rate,
                        channels: 1,
                        timestamp: start.elapsed().as_millis() as u64,
                    };
                    if !writer.push(MediaFrame::Audio(frame)) {
                        break;
                    }
                }
            }
        }
        debug!("Synthetic audio source released");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureErrorKind;
    use crate::tracks::ReadyState;

    fn hd_audio_video() -> MediaStreamConstraints {
        MediaStreamConstraints::fallback_cascade()[0]
    }

    #[tokio::test]
    async fn test_default_devices_open_camera_and_microphone() {
        let devices = SyntheticDevices::default();
        let stream = devices.get_user_media(&hd_audio_video()).await.unwrap();

        assert_eq!(stream.audio_tracks().len(), 1);
        let video = stream.first_video_track().unwrap();
        assert_eq!(video.settings().width, Some(1280));
        assert_eq!(video.settings().height, Some(720));
        assert_eq!(devices.attempts(), vec![hd_audio_video()]);
    }

    #[tokio::test]
    async fn test_camera_limit_is_overconstrained() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().with_camera_limit(VideoResolution::VGA));
        let error = devices.get_user_media(&hd_audio_video()).await.unwrap_err();
        assert_eq!(error.kind, CaptureErrorKind::Overconstrained);

        let vga = MediaStreamConstraints::fallback_cascade()[1];
        assert!(devices.get_user_media(&vga).await.is_ok());
    }

    #[tokio::test]
    async fn test_failure_kinds() {
        let denied = SyntheticDevices::new(SyntheticConfig::default().deny_permission());
        let busy = SyntheticDevices::new(SyntheticConfig::default().with_busy_camera());
        let empty = SyntheticDevices::new(SyntheticConfig::no_devices());
        let request = MediaStreamConstraints::audio_video();

        assert_eq!(denied.get_user_media(&request).await.unwrap_err().kind, CaptureErrorKind::NotAllowed);
        assert_eq!(busy.get_user_media(&request).await.unwrap_err().kind, CaptureErrorKind::NotReadable);
        assert_eq!(empty.get_user_media(&request).await.unwrap_err().kind, CaptureErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_scripted_failure_precedes_checks() {
        let devices = SyntheticDevices::default();
        devices.push_failure(CaptureError::not_readable("scripted"));
        let request = MediaStreamConstraints::audio_video();

        assert_eq!(devices.get_user_media(&request).await.unwrap_err().message, "scripted");
        assert!(devices.get_user_media(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_producer_delivers_frames_and_releases() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().without_microphone());
        let request = MediaStreamConstraints {
            video: VideoConstraint::Enabled,
            audio: false,
        };
        let stream = devices.get_user_media(&request).await.unwrap();
        let track = stream.first_video_track().unwrap();

        let mut receiver = track.subscribe();
        match receiver.recv().await {
            Some(MediaFrame::Video(frame)) => {
                assert_eq!((frame.width, frame.height), (640, 480));
                assert_eq!(frame.pixel(0, 0).map(|p| p[0]), Some(0));
                assert_eq!(frame.pixel(639, 0).map(|p| p[0]), Some(255));
            }
            other => panic!("expected a video frame, got {:?}", other),
        }
        assert_eq!(devices.active_sources(), 1);

        stream.stop_all();
        for _ in 0..10 {
            if devices.active_sources() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(devices.active_sources(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_frame_rate_camera_keeps_producing() {
        let devices = SyntheticDevices::new(SyntheticConfig {
            frame_rate: 5000,
            ..SyntheticConfig::default()
        });
        let stream = devices.get_user_media(&hd_audio_video()).await.unwrap();
        let mut receiver = stream.first_video_track().unwrap().subscribe();

        for _ in 0..3 {
            assert!(matches!(receiver.recv().await, Some(MediaFrame::Video(_))));
        }
        stream.stop_all();
    }

    #[tokio::test]
    async fn test_stop_screen_capture_ends_tracks() {
        let devices = SyntheticDevices::default();
        let stream = devices
            .get_display_media(&DisplayMediaConstraints::default())
            .await
            .unwrap();
        assert_eq!(stream.tracks().len(), 2);

        devices.stop_screen_capture();
        assert!(stream.tracks().iter().all(|t| t.ready_state() == ReadyState::Ended));
    }

    #[tokio::test]
    async fn test_cancelled_screen_share() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().cancel_screen_share());
        let error = devices
            .get_display_media(&DisplayMediaConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(error.kind, CaptureErrorKind::NotAllowed);
    }

    #[tokio::test]
    async fn test_enumerate_devices() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().without_camera());
        let listed = devices.enumerate_devices().await;
        assert!(listed.iter().all(|d| d.kind != DeviceKind::VideoInput));
        assert!(listed.iter().any(|d| d.kind == DeviceKind::AudioInput));
    }
}
