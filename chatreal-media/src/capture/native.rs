//! Native capture backend: nokhwa for cameras, cpal for microphones
//!
//! Both libraries hand out handles that must stay on the thread that opened
//! them, so every device runs on its own OS thread and reports back through a
//! oneshot once it is open. The thread exits when the track's source is
//! released.

use super::{empty_request_error, DeviceInfo, DeviceKind, MediaDevices};
use crate::constraints::{DisplayMediaConstraints, MediaStreamConstraints, VideoConstraint};
use crate::error::{CaptureError, CaptureErrorKind};
use crate::tracks::{
    AudioFrame, MediaFrame, MediaStream, MediaTrack, TrackKind, TrackSettings, TrackWriter,
    VideoFrame,
};
use async_trait::async_trait;
use bytes::Bytes;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const RELEASE_POLL: Duration = Duration::from_millis(50);

/// Capture from the machine's real camera and microphone
#[derive(Debug, Default)]
pub struct NativeDevices {
    /// Index of the camera to open
    pub camera_index: u32,
}

impl NativeDevices {
    /// Use the camera at the given index
    pub fn with_camera(camera_index: u32) -> Self {
        Self { camera_index }
    }
}

#[async_trait]
impl MediaDevices for NativeDevices {
    async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if constraints.is_empty() {
            return Err(empty_request_error());
        }

        let stream = MediaStream::new();
        if constraints.audio {
            stream.add_track(open_microphone().await?);
        }
        if constraints.video.is_requested() {
            match open_camera(self.camera_index, constraints.video).await {
                Ok(track) => stream.add_track(track),
                Err(e) => {
                    stream.stop_all();
                    return Err(e);
                }
            }
        }

        info!("Native capture opened for {}", constraints);
        Ok(stream)
    }

    async fn get_display_media(
        &self,
        _constraints: &DisplayMediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        Err(CaptureError::new(
            CaptureErrorKind::Other("NotSupportedError".to_string()),
            "Screen capture is not available on this platform",
        ))
    }

    async fn enumerate_devices(&self) -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        match nokhwa::query(ApiBackend::Auto) {
            Ok(cameras) => devices.extend(cameras.iter().map(|info| {
                DeviceInfo::new(info.index().to_string(), DeviceKind::VideoInput, info.human_name())
            })),
            Err(e) => warn!("Failed to query cameras: {}", e),
        }

        let host = cpal::default_host();
        if let Ok(inputs) = host.input_devices() {
            devices.extend(inputs.filter_map(|d| d.name().ok()).map(|name| {
                DeviceInfo::new(name.clone(), DeviceKind::AudioInput, name)
            }));
        }
        if let Ok(outputs) = host.output_devices() {
            devices.extend(outputs.filter_map(|d| d.name().ok()).map(|name| {
                DeviceInfo::new(name.clone(), DeviceKind::AudioOutput, name)
            }));
        }

        devices
    }
}

async fn open_camera(index: u32, video: VideoConstraint) -> Result<MediaTrack, CaptureError> {
    let (ready_tx, ready_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("chatreal-camera".to_string())
        .spawn(move || run_camera(index, video, ready_tx))
        .map_err(|e| CaptureError::not_readable(format!("Failed to spawn camera thread: {}", e)))?;

    ready_rx
        .await
        .map_err(|_| CaptureError::not_readable("Camera thread exited before opening"))?
}

fn run_camera(
    index: u32,
    video: VideoConstraint,
    ready: oneshot::Sender<Result<MediaTrack, CaptureError>>,
) {
    let format = match video.resolution() {
        Some(res) => RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(res.width, res.height),
            FrameFormat::MJPEG,
            30,
        )),
        None => RequestedFormatType::AbsoluteHighestFrameRate,
    };

    let mut camera = match Camera::new(CameraIndex::Index(index), RequestedFormat::new::<RgbFormat>(format)) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::not_found(format!("Failed to open camera: {}", e))));
            return;
        }
    };

    let actual = camera.resolution();
    if let Some(wanted) = video.resolution() {
        if actual.width() < wanted.width || actual.height() < wanted.height {
            let _ = ready.send(Err(CaptureError::overconstrained(format!(
                "Camera cannot deliver {} (closest {}x{})",
                wanted,
                actual.width(),
                actual.height()
            ))));
            return;
        }
    }

    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(CaptureError::not_readable(format!("Failed to start camera: {}", e))));
        return;
    }

    let settings = TrackSettings {
        width: Some(actual.width()),
        height: Some(actual.height()),
        frame_rate: Some(camera.frame_rate()),
        device_id: Some(index.to_string()),
        ..TrackSettings::default()
    };
    let (track, writer) = MediaTrack::new(TrackKind::Video, camera.info().human_name(), settings);
    if ready.send(Ok(track)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    let start = Instant::now();
    while writer.is_active() {
        let image = match camera.frame().and_then(|buffer| buffer.decode_image::<RgbFormat>()) {
            Ok(image) => image,
            Err(e) => {
                error!("Camera frame failed: {}", e);
                writer.end();
                break;
            }
        };
        let (width, height) = image.dimensions();
        writer.push(MediaFrame::Video(VideoFrame {
            width,
            height,
            data: Bytes::from(image.into_raw()),
            timestamp: start.elapsed().as_millis() as u64,
        }));
    }

    if let Err(e) = camera.stop_stream() {
        warn!("Failed to stop camera stream: {}", e);
    }
    debug!("Camera {} released", index);
}

async fn open_microphone() -> Result<MediaTrack, CaptureError> {
    let (ready_tx, ready_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("chatreal-microphone".to_string())
        .spawn(move || run_microphone(ready_tx))
        .map_err(|e| CaptureError::not_readable(format!("Failed to spawn audio thread: {}", e)))?;

    ready_rx
        .await
        .map_err(|_| CaptureError::not_readable("Audio thread exited before opening"))?
}

fn run_microphone(ready: oneshot::Sender<Result<MediaTrack, CaptureError>>) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready.send(Err(CaptureError::not_found("No default audio input device")));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::not_readable(format!("No supported input config: {}", e))));
            return;
        }
    };
    let config = supported.config();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;

    let settings = TrackSettings {
        sample_rate: Some(sample_rate),
        channels: Some(channels),
        device_id: device.name().ok(),
        ..TrackSettings::default()
    };
    let label = device.name().unwrap_or_else(|_| "Microphone".to_string());
    let (track, writer) = MediaTrack::new(TrackKind::Audio, label, settings);

    let stream = match build_input(&device, &config, writer.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(track)).is_err() {
        return;
    }

    while writer.is_active() {
        std::thread::sleep(RELEASE_POLL);
    }
    drop(stream);
    debug!("Microphone released");
}

fn build_input(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    writer: TrackWriter,
) -> Result<cpal::Stream, CaptureError> {
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let start = Instant::now();

    let stream = device
        .build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                writer.push(MediaFrame::Audio(AudioFrame {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                    timestamp: start.elapsed().as_millis() as u64,
                }));
            },
            |e| error!("Audio capture error: {}", e),
            None,
        )
        .map_err(|e| CaptureError::not_readable(format!("Failed to build input stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| CaptureError::not_readable(format!("Failed to start input stream: {}", e)))?;
    Ok(stream)
}
