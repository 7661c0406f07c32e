//! # Chat Real Media
//!
//! Media handling for Chat Real: live tracks and streams, the capture device
//! seam, the constraint fallback cascade used to acquire the local camera and
//! microphone, canvas-style frame mirroring, and the recorder used by the
//! microphone echo test.

#![warn(clippy::all)]

pub mod acquisition;
pub mod capture;
pub mod constraints;
pub mod error;
pub mod mirror;
pub mod recorder;
pub mod tracks;

// Re-export main types
pub use acquisition::{acquire_local_media, AcquiredMedia};
#[cfg(feature = "native")]
pub use capture::NativeDevices;
pub use capture::{
    default_devices, DeviceInfo, DeviceKind, MediaDevices, SharedDevices, SyntheticConfig,
    SyntheticDevices,
};
pub use constraints::{
    DisplayMediaConstraints, MediaStreamConstraints, VideoConstraint, VideoResolution,
};
pub use error::{CaptureError, CaptureErrorKind, ErrorCategory, MediaError, MediaResult};
pub use mirror::{CanvasMirror, MirrorConfig};
#[cfg(feature = "native")]
pub use recorder::CpalSink;
pub use recorder::{AudioSink, CollectingSink, MediaRecorder, NullSink, RecorderState, Recording};
pub use tracks::{
    AudioFrame, MediaFrame, MediaStream, MediaTrack, ReadyState, TrackKind, TrackReceiver,
    TrackSettings, TrackWriter, VideoFrame,
};
