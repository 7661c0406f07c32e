//! Media error types and handling
//!
//! Capture failures carry the platform's error name as a [`CaptureErrorKind`],
//! which is what decides the message shown to the user once the acquisition
//! cascade gives up.

use std::fmt;
use thiserror::Error;

/// Platform capture failure categories, named after the browser error names
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CaptureErrorKind {
    /// The user or platform refused access (`NotAllowedError`)
    NotAllowed,
    /// No device satisfies the request (`NotFoundError`)
    NotFound,
    /// The device exists but could not be opened (`NotReadableError`)
    NotReadable,
    /// The device cannot satisfy the constraints (`OverconstrainedError`)
    Overconstrained,
    /// Any other platform error, keeping its name
    Other(String),
}

impl CaptureErrorKind {
    /// Map a platform error name, including legacy aliases
    pub fn from_name(name: &str) -> Self {
        match name {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => Self::NotAllowed,
            "NotFoundError" | "DevicesNotFoundError" => Self::NotFound,
            "NotReadableError" | "TrackStartError" => Self::NotReadable,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => Self::Overconstrained,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical platform error name
    pub fn name(&self) -> &str {
        match self {
            Self::NotAllowed => "NotAllowedError",
            Self::NotFound => "NotFoundError",
            Self::NotReadable => "NotReadableError",
            Self::Overconstrained => "OverconstrainedError",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single failed capture request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct CaptureError {
    /// Failure category
    pub kind: CaptureErrorKind,
    /// Platform-provided detail
    pub message: String,
}

impl CaptureError {
    /// Create a capture error
    pub fn new(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Access refused
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::NotAllowed, message)
    }

    /// No matching device
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::NotFound, message)
    }

    /// Device could not be opened
    pub fn not_readable(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::NotReadable, message)
    }

    /// Constraints cannot be met
    pub fn overconstrained(message: impl Into<String>) -> Self {
        Self::new(CaptureErrorKind::Overconstrained, message)
    }
}

/// Main error type for media operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// Every constraint set of the acquisition cascade failed
    #[error("Could not access camera/microphone: {last}")]
    AcquisitionFailed {
        /// Number of attempts made
        attempts: usize,
        /// Error reported by the final attempt
        last: CaptureError,
    },

    /// A single capture request failed
    #[error("Capture failed: {source}")]
    Capture {
        /// Underlying capture error
        #[from]
        source: CaptureError,
    },

    /// A stream lacks a track the operation needs
    #[error("No {kind} track found")]
    MissingTrack {
        /// Missing track kind
        kind: crate::tracks::TrackKind,
    },

    /// Invalid frame data error
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Operation on a track that has already ended
    #[error("Track ended: {track_id}")]
    TrackEnded {
        /// Track identifier
        track_id: String,
    },

    /// Invalid state for operation
    #[error("Invalid state: {message}")]
    InvalidState {
        /// State error message
        message: String,
    },

    /// Recording failed
    #[error("Recorder error: {message}")]
    Recorder {
        /// Error message
        message: String,
    },

    /// Audio playback failed
    #[error("Playback error: {message}")]
    Playback {
        /// Error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// The capture error kind behind this error, if it came from a device
    pub fn capture_kind(&self) -> Option<&CaptureErrorKind> {
        match self {
            MediaError::AcquisitionFailed { last, .. } => Some(&last.kind),
            MediaError::Capture { source } => Some(&source.kind),
            _ => None,
        }
    }

    /// Message suitable for showing under "Media Error"
    pub fn user_message(&self) -> String {
        match self.capture_kind() {
            Some(CaptureErrorKind::NotAllowed) => {
                "Camera and microphone access was denied. Allow access in your browser settings and try again."
                    .to_string()
            }
            Some(CaptureErrorKind::NotFound) => {
                "No camera or microphone was found. Connect a device and try again.".to_string()
            }
            Some(CaptureErrorKind::NotReadable) => {
                "Your camera or microphone is already in use by another application.".to_string()
            }
            Some(CaptureErrorKind::Overconstrained) => {
                "Your camera does not support the requested video settings.".to_string()
            }
            Some(CaptureErrorKind::Other(_)) | None => self.to_string(),
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::TrackEnded { .. } => false,
            _ => matches!(
                self.capture_kind(),
                Some(CaptureErrorKind::NotReadable | CaptureErrorKind::Overconstrained)
            ),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::AcquisitionFailed { .. } | MediaError::Capture { .. } => {
                match self.capture_kind() {
                    Some(CaptureErrorKind::NotAllowed) => ErrorCategory::Permission,
                    Some(CaptureErrorKind::Overconstrained) => ErrorCategory::Configuration,
                    _ => ErrorCategory::Device,
                }
            }
            MediaError::MissingTrack { .. } => ErrorCategory::Device,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Data,
            MediaError::TrackEnded { .. } => ErrorCategory::State,
            MediaError::InvalidState { .. } => ErrorCategory::State,
            MediaError::Recorder { .. } => ErrorCategory::Audio,
            MediaError::Playback { .. } => ErrorCategory::Audio,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Access to a device was refused
    Permission,
    /// Device and hardware errors
    Device,
    /// Configuration and parameter errors
    Configuration,
    /// Data validation errors
    Data,
    /// State management errors
    State,
    /// Audio-specific errors
    Audio,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_browser_names() {
        assert_eq!(
            CaptureErrorKind::from_name("NotAllowedError"),
            CaptureErrorKind::NotAllowed
        );
        assert_eq!(
            CaptureErrorKind::from_name("DevicesNotFoundError"),
            CaptureErrorKind::NotFound
        );
        assert_eq!(
            CaptureErrorKind::from_name("TrackStartError"),
            CaptureErrorKind::NotReadable
        );
        assert_eq!(
            CaptureErrorKind::from_name("OverconstrainedError"),
            CaptureErrorKind::Overconstrained
        );
        assert_eq!(
            CaptureErrorKind::from_name("AbortError"),
            CaptureErrorKind::Other("AbortError".to_string())
        );
        assert_eq!(CaptureErrorKind::from_name("AbortError").name(), "AbortError");
    }

    #[test]
    fn test_acquisition_error_names_last_error() {
        let error = MediaError::AcquisitionFailed {
            attempts: 5,
            last: CaptureError::not_found("Requested device not found"),
        };
        assert_eq!(
            error.to_string(),
            "Could not access camera/microphone: NotFoundError: Requested device not found"
        );
        assert_eq!(error.category(), ErrorCategory::Device);
    }

    #[test]
    fn test_user_messages_are_distinct_per_category() {
        let kinds = [
            CaptureErrorKind::NotAllowed,
            CaptureErrorKind::NotFound,
            CaptureErrorKind::NotReadable,
            CaptureErrorKind::Overconstrained,
            CaptureErrorKind::Other("AbortError".to_string()),
        ];

        let messages: Vec<String> = kinds
            .iter()
            .map(|kind| {
                MediaError::AcquisitionFailed {
                    attempts: 5,
                    last: CaptureError::new(kind.clone(), "detail"),
                }
                .user_message()
            })
            .collect();

        for (i, message) in messages.iter().enumerate() {
            assert!(!message.is_empty());
            for other in &messages[i + 1..] {
                assert_ne!(message, other);
            }
        }
    }

    #[test]
    fn test_stream_errors_fall_back_to_display() {
        let ended = MediaError::TrackEnded {
            track_id: "mic-1".to_string(),
        };
        assert_eq!(ended.user_message(), "Track ended: mic-1");
        assert_eq!(ended.category(), ErrorCategory::State);
        assert!(!ended.is_recoverable());

        let missing = MediaError::MissingTrack {
            kind: crate::tracks::TrackKind::Audio,
        };
        assert_eq!(missing.category(), ErrorCategory::Device);
        assert!(missing.capture_kind().is_none());
    }

    #[test]
    fn test_recoverability() {
        let busy = MediaError::from(CaptureError::not_readable("Device in use"));
        assert!(busy.is_recoverable());

        let denied = MediaError::from(CaptureError::not_allowed("Permission denied"));
        assert!(!denied.is_recoverable());
        assert_eq!(denied.category(), ErrorCategory::Permission);
    }
}
