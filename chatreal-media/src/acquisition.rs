//! Local camera/microphone acquisition with constraint fallback

use crate::capture::MediaDevices;
use crate::constraints::MediaStreamConstraints;
use crate::error::{CaptureError, MediaError, MediaResult};
use crate::tracks::MediaStream;
use tracing::{debug, info, warn};

/// Outcome of a successful acquisition
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    /// The opened stream
    pub stream: MediaStream,
    /// Zero-based index of the attempt that succeeded
    pub attempt: usize,
    /// Constraints that succeeded
    pub constraints: MediaStreamConstraints,
}

/// Open the local camera and microphone, degrading through
/// [`MediaStreamConstraints::fallback_cascade`] until a request succeeds
///
/// `on_local_stream` runs once with the stream before it is returned. When
/// every attempt fails the error names the last platform failure.
pub async fn acquire_local_media<F>(
    devices: &dyn MediaDevices,
    on_local_stream: F,
) -> MediaResult<AcquiredMedia>
where
    F: FnOnce(&MediaStream),
{
    let cascade = MediaStreamConstraints::fallback_cascade();
    let mut last_error: Option<CaptureError> = None;

    for (attempt, constraints) in cascade.iter().enumerate() {
        debug!("Requesting local media, attempt {}: {}", attempt + 1, constraints);

        match devices.get_user_media(constraints).await {
            Ok(stream) => {
                info!(
                    "Local media acquired: video={} audio={} stream_active={}",
                    stream.video_tracks().len(),
                    stream.audio_tracks().len(),
                    stream.active()
                );
                on_local_stream(&stream);
                return Ok(AcquiredMedia {
                    stream,
                    attempt,
                    constraints: *constraints,
                });
            }
            Err(e) => {
                warn!("Media attempt {} ({}) failed: {}", attempt + 1, constraints, e);
                last_error = Some(e);
            }
        }
    }

    let last = last_error
        .unwrap_or_else(|| CaptureError::not_found("No capture constraints were attempted"));
    Err(MediaError::AcquisitionFailed {
        attempts: cascade.len(),
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticConfig, SyntheticDevices};
    use crate::constraints::{VideoConstraint, VideoResolution};
    use crate::error::CaptureErrorKind;

    #[tokio::test]
    async fn test_first_attempt_wins_with_hd_camera() {
        let devices = SyntheticDevices::default();
        let mut seen = None;
        let acquired = acquire_local_media(&devices, |stream| seen = Some(stream.id().to_string()))
            .await
            .unwrap();

        assert_eq!(acquired.attempt, 0);
        assert_eq!(seen.as_deref(), Some(acquired.stream.id()));
        assert_eq!(devices.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_vga() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().with_camera_limit(VideoResolution::VGA));
        let acquired = acquire_local_media(&devices, |_| {}).await.unwrap();

        assert_eq!(acquired.attempt, 1);
        assert_eq!(acquired.constraints.video, VideoConstraint::Ideal(VideoResolution::VGA));
        assert_eq!(acquired.stream.video_tracks().len(), 1);
    }

    #[tokio::test]
    async fn test_audio_only_without_camera() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().without_camera());
        let acquired = acquire_local_media(&devices, |_| {}).await.unwrap();

        assert_eq!(acquired.attempt, 3);
        assert!(acquired.stream.video_tracks().is_empty());
        assert_eq!(acquired.stream.audio_tracks().len(), 1);
    }

    #[tokio::test]
    async fn test_video_only_without_microphone() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().without_microphone());
        let acquired = acquire_local_media(&devices, |_| {}).await.unwrap();

        assert_eq!(acquired.attempt, 4);
        assert!(acquired.stream.audio_tracks().is_empty());
    }

    #[tokio::test]
    async fn test_all_attempts_fail() {
        let devices = SyntheticDevices::new(SyntheticConfig::default().deny_permission());
        let mut called = false;
        let error = acquire_local_media(&devices, |_| called = true).await.unwrap_err();

        assert!(!called);
        assert_eq!(devices.attempts(), MediaStreamConstraints::fallback_cascade().to_vec());
        match &error {
            MediaError::AcquisitionFailed { attempts, last } => {
                assert_eq!(*attempts, 5);
                assert_eq!(last.kind, CaptureErrorKind::NotAllowed);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(error.to_string().starts_with("Could not access camera/microphone: "));
        assert!(!error.user_message().is_empty());
    }
}
