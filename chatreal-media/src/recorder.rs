//! Audio recording and playback for the microphone echo test

use crate::error::{MediaError, MediaResult};
use crate::tracks::{AudioFrame, MediaFrame, MediaStream, TrackKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Recorder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not recording
    Inactive,
    /// Collecting frames
    Recording,
}

/// Audio captured by a [`MediaRecorder`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    /// Frames in arrival order
    pub frames: Vec<AudioFrame>,
}

impl Recording {
    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool {
        self.frames.iter().all(|f| f.samples.is_empty())
    }

    /// Playback length
    pub fn duration(&self) -> Duration {
        let secs: f64 = self
            .frames
            .iter()
            .filter(|f| f.sample_rate > 0 && f.channels > 0)
            .map(|f| f.samples.len() as f64 / (f.sample_rate as f64 * f.channels as f64))
            .sum();
        Duration::from_secs_f64(secs)
    }

    /// All samples, concatenated
    pub fn samples(&self) -> Vec<f32> {
        self.frames.iter().flat_map(|f| f.samples.iter().copied()).collect()
    }

    /// Sample rate of the first frame
    pub fn sample_rate(&self) -> Option<u32> {
        self.frames.first().map(|f| f.sample_rate)
    }

    /// Channel count of the first frame
    pub fn channels(&self) -> Option<u16> {
        self.frames.first().map(|f| f.channels)
    }
}

/// Records the first audio track of a stream
pub struct MediaRecorder {
    frames: Arc<Mutex<Vec<AudioFrame>>>,
    task: Option<JoinHandle<()>>,
}

impl MediaRecorder {
    /// An inactive recorder
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            task: None,
        }
    }

    /// Current state
    pub fn state(&self) -> RecorderState {
        match self.task {
            Some(_) => RecorderState::Recording,
            None => RecorderState::Inactive,
        }
    }

    /// Begin collecting audio from `stream`
    pub fn start(&mut self, stream: &MediaStream) -> MediaResult<()> {
        if self.task.is_some() {
            return Err(MediaError::InvalidState {
                message: "Recorder is already recording".to_string(),
            });
        }
        let track = stream
            .first_audio_track()
            .ok_or(MediaError::MissingTrack {
                kind: TrackKind::Audio,
            })?;
        if !track.is_live() {
            return Err(MediaError::TrackEnded {
                track_id: track.id().to_string(),
            });
        }

        self.frames.lock().clear();
        let frames = self.frames.clone();
        let mut receiver = track.subscribe();
        self.task = Some(tokio::spawn(async move {
            while let Some(frame) = receiver.recv().await {
                if let MediaFrame::Audio(frame) = frame {
                    frames.lock().push(frame);
                }
            }
        }));

        info!("Recording audio from track {}", track.id());
        Ok(())
    }

    /// Stop and hand back what was captured
    pub fn stop(&mut self) -> MediaResult<Recording> {
        let task = self.task.take().ok_or_else(|| MediaError::InvalidState {
            message: "Recorder is not recording".to_string(),
        })?;
        task.abort();

        let recording = Recording {
            frames: std::mem::take(&mut *self.frames.lock()),
        };
        debug!(
            "Recording stopped: {} frames, {:?}",
            recording.frames.len(),
            recording.duration()
        );
        Ok(recording)
    }
}

impl Default for MediaRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MediaRecorder {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl fmt::Debug for MediaRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaRecorder")
            .field("state", &self.state())
            .field("frames", &self.frames.lock().len())
            .finish()
    }
}

/// Plays recorded audio; `play` resolves when playback has finished
#[async_trait]
pub trait AudioSink: Send + Sync + fmt::Debug {
    /// Play a recording to completion
    async fn play(&self, recording: &Recording) -> MediaResult<()>;
}

/// Discards audio, taking as long as real playback would
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, recording: &Recording) -> MediaResult<()> {
        tokio::time::sleep(recording.duration()).await;
        Ok(())
    }
}

/// Keeps every recording it is asked to play
#[derive(Debug, Default)]
pub struct CollectingSink {
    played: Mutex<Vec<Recording>>,
}

impl CollectingSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Recordings played so far
    pub fn played(&self) -> Vec<Recording> {
        self.played.lock().clone()
    }
}

#[async_trait]
impl AudioSink for CollectingSink {
    async fn play(&self, recording: &Recording) -> MediaResult<()> {
        self.played.lock().push(recording.clone());
        Ok(())
    }
}

#[cfg(feature = "native")]
pub use native_sink::CpalSink;

#[cfg(feature = "native")]
mod native_sink {
    use super::{AudioSink, Recording};
    use crate::error::{MediaError, MediaResult};
    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    /// Plays through the default output device
    #[derive(Debug, Default, Clone, Copy)]
    pub struct CpalSink;

    #[async_trait]
    impl AudioSink for CpalSink {
        async fn play(&self, recording: &Recording) -> MediaResult<()> {
            let recording = recording.clone();
            tokio::task::spawn_blocking(move || play_blocking(&recording))
                .await
                .map_err(|e| MediaError::Playback {
                    message: format!("Playback thread failed: {}", e),
                })?
        }
    }

    fn playback_error(message: impl Into<String>) -> MediaError {
        MediaError::Playback {
            message: message.into(),
        }
    }

    fn play_blocking(recording: &Recording) -> MediaResult<()> {
        if recording.is_empty() {
            return Ok(());
        }
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| playback_error("No default output device"))?;
        let config = device
            .default_output_config()
            .map_err(|e| playback_error(format!("No supported output config: {}", e)))?
            .config();

        let samples = convert(
            &recording.samples(),
            recording.channels().unwrap_or(1),
            recording.sample_rate().unwrap_or(config.sample_rate.0),
            config.channels,
            config.sample_rate.0,
        );
        let queue = Arc::new(Mutex::new(VecDeque::from(samples)));
        let source = queue.clone();

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = source.lock();
                    for sample in data.iter_mut() {
                        *sample = queue.pop_front().unwrap_or(0.0);
                    }
                },
                |e| tracing::error!("Audio playback error: {}", e),
                None,
            )
            .map_err(|e| playback_error(format!("Failed to build output stream: {}", e)))?;
        stream
            .play()
            .map_err(|e| playback_error(format!("Failed to start output stream: {}", e)))?;

        while !queue.lock().is_empty() {
            std::thread::sleep(Duration::from_millis(20));
        }
        Ok(())
    }

    /// Nearest-sample rate conversion plus channel up/down mixing
    fn convert(samples: &[f32], channels: u16, rate: u32, out_channels: u16, out_rate: u32) -> Vec<f32> {
        let channels = channels.max(1) as usize;
        let out_channels = out_channels.max(1) as usize;
        let mono: Vec<f32> = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let out_frames = mono.len() as u64 * out_rate as u64 / rate.max(1) as u64;
        let mut out = Vec::with_capacity(out_frames as usize * out_channels);
        for i in 0..out_frames {
            let source = (i * rate as u64 / out_rate.max(1) as u64) as usize;
            let value = mono.get(source).copied().unwrap_or(0.0);
            out.extend(std::iter::repeat(value).take(out_channels));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracks::{MediaTrack, TrackSettings};

    fn tone(timestamp: u64) -> MediaFrame {
        MediaFrame::Audio(AudioFrame {
            samples: vec![0.25; 480],
            sample_rate: 48_000,
            channels: 1,
            timestamp,
        })
    }

    #[test]
    fn test_recording_duration() {
        let recording = Recording {
            frames: vec![
                AudioFrame {
                    samples: vec![0.0; 48_000],
                    sample_rate: 48_000,
                    channels: 1,
                    timestamp: 0,
                },
                AudioFrame {
                    samples: vec![0.0; 96_000],
                    sample_rate: 48_000,
                    channels: 2,
                    timestamp: 1000,
                },
            ],
        };
        assert_eq!(recording.duration(), Duration::from_secs(2));
        assert!(Recording::default().is_empty());
    }

    #[tokio::test]
    async fn test_recorder_collects_audio() {
        let (track, writer) = MediaTrack::new(TrackKind::Audio, "Mic", TrackSettings::default());
        let stream = MediaStream::with_tracks(vec![track]);

        let mut recorder = MediaRecorder::new();
        recorder.start(&stream).unwrap();
        assert_eq!(recorder.state(), RecorderState::Recording);
        assert!(recorder.start(&stream).is_err());

        tokio::task::yield_now().await;
        for i in 0..3 {
            writer.push(tone(i * 10));
            tokio::task::yield_now().await;
        }

        let recording = recorder.stop().unwrap();
        assert_eq!(recorder.state(), RecorderState::Inactive);
        assert_eq!(recording.frames.len(), 3);
        assert_eq!(recording.samples().len(), 1440);
        assert_eq!(recording.sample_rate(), Some(48_000));
        assert!(recorder.stop().is_err());
    }

    #[tokio::test]
    async fn test_recorder_requires_audio_track() {
        let (video, _writer) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        let stream = MediaStream::with_tracks(vec![video]);

        let error = MediaRecorder::new().start(&stream).unwrap_err();
        assert!(matches!(
            error,
            MediaError::MissingTrack {
                kind: TrackKind::Audio
            }
        ));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingSink::new();
        let recording = Recording {
            frames: vec![AudioFrame {
                samples: vec![0.5; 10],
                sample_rate: 48_000,
                channels: 1,
                timestamp: 0,
            }],
        };
        sink.play(&recording).await.unwrap();
        assert_eq!(sink.played(), vec![recording]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_null_sink_takes_playback_time() {
        let recording = Recording {
            frames: vec![AudioFrame {
                samples: vec![0.0; 48_000],
                sample_rate: 48_000,
                channels: 1,
                timestamp: 0,
            }],
        };
        let start = tokio::time::Instant::now();
        NullSink.play(&recording).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
