//! Local media from acquisition through mirroring and recording, on the
//! synthetic backend

use chatreal_media::*;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test(start_paused = true)]
async fn test_scripted_failure_falls_back_to_vga() {
    let devices = SyntheticDevices::default();
    devices.push_failure(CaptureError::not_readable("Could not start video source"));

    let acquired = assert_ok!(acquire_local_media(&devices, |_| {}).await);
    assert_eq!(acquired.attempt, 1);
    let video = acquired.stream.first_video_track().unwrap();
    assert_eq!(video.settings().width, Some(640));
    assert_eq!(devices.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_mirror_draws_acquired_camera() {
    let devices = SyntheticDevices::default();
    let acquired = assert_ok!(acquire_local_media(&devices, |_| {}).await);

    let mirror = CanvasMirror::spawn(acquired.stream.first_video_track(), MirrorConfig::default());
    let mut canvas = mirror.canvas_track().subscribe();

    let mut drawn = None;
    for _ in 0..10 {
        if let Some(MediaFrame::Video(frame)) = canvas.recv().await {
            if frame.pixel(160, 120) != Some([0, 0, 0]) {
                drawn = Some(frame);
                break;
            }
        }
    }
    let frame = drawn.expect("mirror never drew a camera frame");
    assert_eq!((frame.width, frame.height), (320, 240));

    mirror.stop();
    assert_eq!(mirror.canvas_track().ready_state(), ReadyState::Ended);
    acquired.stream.stop_all();
}

#[tokio::test(start_paused = true)]
async fn test_record_acquired_microphone() {
    let devices = SyntheticDevices::default();
    let acquired = assert_ok!(acquire_local_media(&devices, |_| {}).await);

    let mut recorder = MediaRecorder::new();
    assert_ok!(recorder.start(&acquired.stream));
    tokio::time::sleep(Duration::from_secs(1)).await;
    let recording = assert_ok!(recorder.stop());

    assert!(recording.duration() >= Duration::from_millis(900));
    assert_eq!(recording.sample_rate(), Some(48_000));
    assert_err!(recorder.stop());
}

#[tokio::test(start_paused = true)]
async fn test_stopping_stream_releases_devices() {
    let devices = SyntheticDevices::default();
    let acquired = assert_ok!(acquire_local_media(&devices, |_| {}).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(devices.active_sources(), 2);

    acquired.stream.stop_all();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(devices.active_sources(), 0);
}

#[tokio::test]
async fn test_every_attempt_denied() {
    let devices = SyntheticDevices::new(SyntheticConfig::default().deny_permission());
    let error = assert_err!(acquire_local_media(&devices, |_| {}).await);
    assert_eq!(error.capture_kind(), Some(&CaptureErrorKind::NotAllowed));
    assert!(!error.user_message().is_empty());
}
