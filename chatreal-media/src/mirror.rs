//! Canvas-style frame mirroring
//!
//! Draws a source video track onto a fixed-size canvas, flipped horizontally,
//! with a translucent badge in the corner, and publishes the canvas as a new
//! video track at a fixed frame rate.

use crate::constraints::VideoResolution;
use crate::tracks::{MediaFrame, MediaTrack, TrackKind, TrackReceiver, TrackSettings, VideoFrame};
use bytes::Bytes;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Rectangle in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Canvas and badge settings
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Canvas size
    pub canvas: VideoResolution,
    /// Frames published per second
    pub fps: u32,
    /// Badge rectangle, in unflipped canvas coordinates
    pub badge: Rect,
    /// Badge fill as RGBA; alpha 77 is roughly 0.3 opacity
    pub badge_color: [u8; 4],
    /// Badge text, also used as the canvas track label
    pub label: String,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            canvas: VideoResolution::CANVAS,
            fps: 30,
            badge: Rect {
                x: 10,
                y: 10,
                width: 80,
                height: 30,
            },
            badge_color: [0, 255, 0, 77],
            label: "REMOTE".to_string(),
        }
    }
}

/// Interval between frames at `fps`, never shorter than 1 ms
pub fn frame_period(fps: u32) -> Duration {
    Duration::from_millis((1000 / fps.max(1) as u64).max(1))
}

/// Nearest-neighbour resize
pub fn scale_nearest(frame: &VideoFrame, width: u32, height: u32) -> VideoFrame {
    if frame.width == width && frame.height == height {
        return frame.clone();
    }
    if frame.width == 0
        || frame.height == 0
        || frame.data.len() != VideoFrame::expected_len(frame.width, frame.height)
    {
        return VideoFrame::black(width, height, frame.timestamp);
    }

    let src_stride = frame.width as usize * 3;
    let mut data = Vec::with_capacity(VideoFrame::expected_len(width, height));
    for y in 0..height as usize {
        let sy = y * frame.height as usize / height as usize;
        let row = &frame.data[sy * src_stride..(sy + 1) * src_stride];
        for x in 0..width as usize {
            let sx = x * frame.width as usize / width as usize;
            data.extend_from_slice(&row[sx * 3..sx * 3 + 3]);
        }
    }

    VideoFrame {
        width,
        height,
        data: Bytes::from(data),
        timestamp: frame.timestamp,
    }
}

/// Flip a frame left to right
pub fn mirror_horizontal(frame: &VideoFrame) -> VideoFrame {
    let stride = frame.width as usize * 3;
    let mut data = Vec::with_capacity(frame.data.len());
    for row in frame.data.chunks_exact(stride.max(1)) {
        data.extend(row.chunks_exact(3).rev().flatten().copied());
    }

    VideoFrame {
        width: frame.width,
        height: frame.height,
        data: Bytes::from(data),
        timestamp: frame.timestamp,
    }
}

/// Alpha-blend a solid rectangle into packed RGB24 pixels, clipped to the frame
pub fn blend_rect(pixels: &mut [u8], width: u32, height: u32, rect: Rect, rgba: [u8; 4]) {
    let alpha = rgba[3] as u32;
    let x_end = (rect.x + rect.width).min(width);
    let y_end = (rect.y + rect.height).min(height);

    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let offset = (y as usize * width as usize + x as usize) * 3;
            for channel in 0..3 {
                let dst = pixels[offset + channel] as u32;
                let src = rgba[channel] as u32;
                pixels[offset + channel] = ((src * alpha + dst * (255 - alpha) + 127) / 255) as u8;
            }
        }
    }
}

/// Draw white 5x7 uppercase text with its top-left corner at (x, y)
///
/// Characters outside A-Z render as blanks.
pub fn draw_text(pixels: &mut [u8], width: u32, height: u32, x: u32, y: u32, text: &str) {
    for (i, ch) in text.chars().enumerate() {
        let Some(bitmap) = glyph(ch) else { continue };
        let left = x + i as u32 * 6;
        for (row, bits) in bitmap.iter().enumerate() {
            let py = y + row as u32;
            for col in 0..5u32 {
                let px = left + col;
                if bits & (0x10 >> col) == 0 || px >= width || py >= height {
                    continue;
                }
                let offset = (py as usize * width as usize + px as usize) * 3;
                pixels[offset..offset + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
    }
}

fn glyph(ch: char) -> Option<[u8; 7]> {
    const FONT: [[u8; 7]; 26] = [
        [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
    ];
    let upper = ch.to_ascii_uppercase();
    upper
        .is_ascii_uppercase()
        .then(|| FONT[(upper as u8 - b'A') as usize])
}

/// One canvas frame: the source scaled and mirrored, badge on top.
/// Without a source the canvas is black under the badge.
pub fn compose_remote_frame(source: Option<&VideoFrame>, config: &MirrorConfig, timestamp: u64) -> VideoFrame {
    let VideoResolution { width, height } = config.canvas;
    let base = match source {
        Some(frame) => mirror_horizontal(&scale_nearest(frame, width, height)),
        None => VideoFrame::black(width, height, timestamp),
    };

    let mut pixels = base.data.to_vec();
    blend_rect(&mut pixels, width, height, config.badge, config.badge_color);
    draw_text(
        &mut pixels,
        width,
        height,
        config.badge.x + 5,
        config.badge.y + 8,
        &config.label,
    );

    VideoFrame {
        width,
        height,
        data: Bytes::from(pixels),
        timestamp,
    }
}

/// A running mirror task and the canvas track it feeds
///
/// Dropping the mirror stops drawing; the canvas track then freezes.
#[derive(Debug)]
pub struct CanvasMirror {
    canvas: MediaTrack,
    handle: JoinHandle<()>,
}

impl CanvasMirror {
    /// Start mirroring `source` onto a new canvas track
    pub fn spawn(source: Option<MediaTrack>, config: MirrorConfig) -> Self {
        let settings = TrackSettings {
            width: Some(config.canvas.width),
            height: Some(config.canvas.height),
            frame_rate: Some(config.fps),
            device_id: Some("canvas".to_string()),
            ..TrackSettings::default()
        };
        let (canvas, writer) = MediaTrack::new(TrackKind::Video, config.label.clone(), settings);
        let mut receiver = source.as_ref().map(MediaTrack::subscribe);

        info!(
            "Canvas mirror started: {} at {} fps, source={:?}",
            config.canvas,
            config.fps,
            source.as_ref().map(MediaTrack::id)
        );

        let handle = tokio::spawn(async move {
            let mut ticker = interval(frame_period(config.fps));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let start = Instant::now();
            let mut latest: Option<VideoFrame> = None;

            loop {
                tokio::select! {
                    _ = writer.closed() => break,
                    received = next_frame(&mut receiver) => match received {
                        Some(MediaFrame::Video(frame)) => latest = Some(frame),
                        Some(MediaFrame::Audio(_)) => {}
                        None => {
                            debug!("Mirror source ended, holding last frame");
                            receiver = None;
                        }
                    },
                    _ = ticker.tick() => {
                        let timestamp = start.elapsed().as_millis() as u64;
                        let frame = compose_remote_frame(latest.as_ref(), &config, timestamp);
                        if !writer.push(MediaFrame::Video(frame)) {
                            break;
                        }
                    }
                }
            }
            debug!("Canvas mirror stopped");
        });

        Self { canvas, handle }
    }

    /// The canvas video track
    pub fn canvas_track(&self) -> &MediaTrack {
        &self.canvas
    }

    /// Stop drawing and end the canvas track
    pub fn stop(&self) {
        self.handle.abort();
        self.canvas.stop();
    }
}

impl Drop for CanvasMirror {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn next_frame(receiver: &mut Option<TrackReceiver>) -> Option<MediaFrame> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => futures::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::test_pattern;

    fn gradient() -> VideoFrame {
        test_pattern(VideoResolution::VGA, 0, 0)
    }

    #[test]
    fn test_scale_nearest() {
        let scaled = scale_nearest(&gradient(), 320, 240);
        assert_eq!((scaled.width, scaled.height), (320, 240));
        assert_eq!(scaled.data.len(), VideoFrame::expected_len(320, 240));
        assert_eq!(scaled.pixel(0, 0), gradient().pixel(0, 0));
        assert_eq!(scaled.pixel(319, 239), gradient().pixel(638, 478));
    }

    #[test]
    fn test_mirror_horizontal() {
        let frame = VideoFrame::new(3, 1, vec![1, 1, 1, 2, 2, 2, 3, 3, 3], 7).unwrap();
        let mirrored = mirror_horizontal(&frame);
        assert_eq!(&mirrored.data[..], &[3, 3, 3, 2, 2, 2, 1, 1, 1]);
        assert_eq!(mirrored.timestamp, 7);
    }

    #[test]
    fn test_blend_rect_clips_to_frame() {
        let mut pixels = vec![0u8; VideoFrame::expected_len(4, 4)];
        let rect = Rect {
            x: 2,
            y: 2,
            width: 10,
            height: 10,
        };
        blend_rect(&mut pixels, 4, 4, rect, [0, 255, 0, 77]);
        assert_eq!(&pixels[(2 * 4 + 2) * 3..(2 * 4 + 3) * 3], &[0, 77, 0]);
        assert_eq!(&pixels[0..3], &[0, 0, 0]);
    }

    #[test]
    fn test_compose_mirrors_and_badges() {
        let config = MirrorConfig::default();
        let composed = compose_remote_frame(Some(&gradient()), &config, 5);

        assert_eq!((composed.width, composed.height), (320, 240));
        assert_eq!(composed.timestamp, 5);
        // Red rises left to right in the source, so it falls after mirroring.
        let left = composed.pixel(0, 120).unwrap();
        let right = composed.pixel(319, 120).unwrap();
        assert!(left[0] > 250 && right[0] < 5);

        let black = compose_remote_frame(None, &config, 0);
        assert_eq!(black.pixel(12, 12), Some([0, 77, 0]));
        assert_eq!(black.pixel(200, 200), Some([0, 0, 0]));
        // Top row of the "R" glyph.
        assert_eq!(black.pixel(15, 18), Some([255, 255, 255]));
    }

    #[tokio::test]
    async fn test_canvas_mirror_publishes_mirrored_frames() {
        let (source, writer) = MediaTrack::new(TrackKind::Video, "Camera", TrackSettings::default());
        let mirror = CanvasMirror::spawn(Some(source.clone()), MirrorConfig::default());
        let mut canvas = mirror.canvas_track().subscribe();

        writer.push(MediaFrame::Video(gradient()));
        let mut mirrored = None;
        for _ in 0..10 {
            if let Some(MediaFrame::Video(frame)) = canvas.recv().await {
                if frame.pixel(0, 120).map(|p| p[0]).unwrap_or(0) > 250 {
                    mirrored = Some(frame);
                    break;
                }
            }
        }
        assert!(mirrored.is_some());

        mirror.stop();
        assert!(!mirror.canvas_track().is_live());
    }

    #[test]
    fn test_frame_period_bounds() {
        assert_eq!(frame_period(30), Duration::from_millis(33));
        assert_eq!(frame_period(0), Duration::from_secs(1));
        assert_eq!(frame_period(1000), Duration::from_millis(1));
        assert_eq!(frame_period(2000), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_canvas_mirror_above_one_thousand_fps() {
        let config = MirrorConfig {
            fps: 2000,
            ..MirrorConfig::default()
        };
        let mirror = CanvasMirror::spawn(None, config);
        let mut canvas = mirror.canvas_track().subscribe();

        let frame = tokio::time::timeout(Duration::from_millis(50), canvas.recv()).await;
        assert!(matches!(frame, Ok(Some(MediaFrame::Video(_)))));
        mirror.stop();
    }
}
