//! Capture device seam
//!
//! [`MediaDevices`] is what the rest of the workspace calls to open cameras,
//! microphones and screens. The synthetic backend is always available; the
//! native one (nokhwa camera, cpal microphone) sits behind the `native`
//! feature.

#[cfg(feature = "native")]
pub mod native;
pub mod synthetic;

#[cfg(feature = "native")]
pub use native::NativeDevices;
pub use synthetic::{SyntheticConfig, SyntheticDevices};

use crate::constraints::{DisplayMediaConstraints, MediaStreamConstraints};
use crate::error::{CaptureError, CaptureErrorKind};
use crate::tracks::MediaStream;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of capture or playback device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Camera
    VideoInput,
    /// Microphone
    AudioInput,
    /// Speaker or headphones
    AudioOutput,
}

/// A device as reported by enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable device identifier
    pub device_id: String,
    /// Device kind
    pub kind: DeviceKind,
    /// Human-readable label
    pub label: String,
}

impl DeviceInfo {
    /// Create a device entry
    pub fn new(device_id: impl Into<String>, kind: DeviceKind, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            kind,
            label: label.into(),
        }
    }
}

/// Access to capture devices
#[async_trait]
pub trait MediaDevices: Send + Sync + fmt::Debug {
    /// Open the camera and/or microphone
    async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, CaptureError>;

    /// Open a screen capture
    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<MediaStream, CaptureError>;

    /// List available devices
    async fn enumerate_devices(&self) -> Vec<DeviceInfo>;
}

/// Shared handle to a device backend
pub type SharedDevices = Arc<dyn MediaDevices>;

/// The backend used when none is configured explicitly
pub fn default_devices() -> SharedDevices {
    #[cfg(feature = "native")]
    {
        Arc::new(NativeDevices::default())
    }
    #[cfg(not(feature = "native"))]
    {
        Arc::new(SyntheticDevices::default())
    }
}

/// The error a browser raises for a request that asks for nothing
pub(crate) fn empty_request_error() -> CaptureError {
    CaptureError::new(
        CaptureErrorKind::Other("TypeError".to_string()),
        "At least one of audio and video must be requested",
    )
}
