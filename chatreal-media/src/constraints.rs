//! Capture constraints and the local media fallback cascade

use serde::{Deserialize, Serialize};
use std::fmt;

/// A video resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoResolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl VideoResolution {
    /// 1280x720
    pub const HD: Self = Self::new(1280, 720);
    /// 640x480
    pub const VGA: Self = Self::new(640, 480);
    /// 320x240, the simulated remote canvas
    pub const CANVAS: Self = Self::new(320, 240);

    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether this resolution fits inside `limit` in both dimensions
    pub fn fits_within(&self, limit: &VideoResolution) -> bool {
        self.width <= limit.width && self.height <= limit.height
    }
}

impl fmt::Display for VideoResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// What to ask of the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoConstraint {
    /// No video track
    Disabled,
    /// Any camera at the device default resolution
    Enabled,
    /// A camera at the given resolution
    Ideal(VideoResolution),
}

impl VideoConstraint {
    /// Whether a video track is requested at all
    pub fn is_requested(&self) -> bool {
        !matches!(self, VideoConstraint::Disabled)
    }

    /// Requested resolution, if one was named
    pub fn resolution(&self) -> Option<VideoResolution> {
        match self {
            VideoConstraint::Ideal(resolution) => Some(*resolution),
            _ => None,
        }
    }
}

/// Constraints for a camera/microphone request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamConstraints {
    /// Video request
    pub video: VideoConstraint,
    /// Whether to capture the microphone
    pub audio: bool,
}

impl MediaStreamConstraints {
    /// Camera and microphone at default settings
    pub const fn audio_video() -> Self {
        Self {
            video: VideoConstraint::Enabled,
            audio: true,
        }
    }

    /// Constraint sets tried in order when acquiring local media
    ///
    /// HD, then VGA, then any camera, each with audio; then audio only;
    /// then video only.
    pub fn fallback_cascade() -> [MediaStreamConstraints; 5] {
        [
            Self {
                video: VideoConstraint::Ideal(VideoResolution::HD),
                audio: true,
            },
            Self {
                video: VideoConstraint::Ideal(VideoResolution::VGA),
                audio: true,
            },
            Self::audio_video(),
            Self {
                video: VideoConstraint::Disabled,
                audio: true,
            },
            Self {
                video: VideoConstraint::Enabled,
                audio: false,
            },
        ]
    }

    /// Whether the request asks for nothing
    pub fn is_empty(&self) -> bool {
        !self.video.is_requested() && !self.audio
    }
}

impl Default for MediaStreamConstraints {
    fn default() -> Self {
        Self::audio_video()
    }
}

impl fmt::Display for MediaStreamConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let video = match self.video {
            VideoConstraint::Disabled => "none".to_string(),
            VideoConstraint::Enabled => "any".to_string(),
            VideoConstraint::Ideal(resolution) => resolution.to_string(),
        };
        write!(f, "video={} audio={}", video, self.audio)
    }
}

/// Constraints for a screen capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMediaConstraints {
    /// Capture the screen contents
    pub video: bool,
    /// Capture system audio as well
    pub audio: bool,
}

impl Default for DisplayMediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_order() {
        let cascade = MediaStreamConstraints::fallback_cascade();
        assert_eq!(cascade[0].video.resolution(), Some(VideoResolution::HD));
        assert_eq!(cascade[1].video.resolution(), Some(VideoResolution::VGA));
        assert_eq!(cascade[2], MediaStreamConstraints::audio_video());
        assert!(!cascade[3].video.is_requested() && cascade[3].audio);
        assert_eq!(cascade[4].video, VideoConstraint::Enabled);
        assert!(!cascade[4].audio);
        assert!(cascade.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_resolution_fit() {
        assert!(VideoResolution::VGA.fits_within(&VideoResolution::HD));
        assert!(!VideoResolution::HD.fits_within(&VideoResolution::VGA));
        assert_eq!(VideoResolution::CANVAS.to_string(), "320x240");
    }
}
