//! Error types for Chat Real

use thiserror::Error;

/// Main error type for Chat Real operations
#[derive(Error, Debug)]
pub enum ChatRealError {
    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },

    /// Missing configuration error
    #[error("Missing required configuration: {field}")]
    MissingConfiguration {
        /// Missing configuration field
        field: String,
    },

    /// Room identifier does not match the generated format
    #[error("Invalid room ID: {room_id}")]
    InvalidRoomId {
        /// The rejected room ID
        room_id: String,
    },

    /// Key-value store read or write failed
    #[error("Storage error for key {key}: {reason}")]
    Storage {
        /// Key being accessed
        key: String,
        /// Reason for the failure
        reason: String,
    },

    /// Clipboard write failed
    #[error("Clipboard error: {reason}")]
    Clipboard {
        /// Reason for the failure
        reason: String,
    },

    /// URL could not be parsed
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
    },

    /// Connection to the chat socket failed
    #[error("Connection to {url} failed: {reason}")]
    ConnectionFailed {
        /// Socket URL
        url: String,
        /// Reason for connection failure
        reason: String,
    },

    /// Transport error
    #[error("Transport error: {reason}")]
    Transport {
        /// Reason for transport error
        reason: String,
    },

    /// Invalid message format
    #[error("Invalid message format: {message}, error: {source}")]
    InvalidMessage {
        /// Invalid message content
        message: String,
        /// Parsing error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid state error
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl ChatRealError {
    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            ChatRealError::Initialization { .. } => "INITIALIZATION_FAILED".to_string(),
            ChatRealError::MissingConfiguration { .. } => "MISSING_CONFIGURATION".to_string(),
            ChatRealError::InvalidRoomId { .. } => "INVALID_ROOM_ID".to_string(),
            ChatRealError::Storage { .. } => "STORAGE_ERROR".to_string(),
            ChatRealError::Clipboard { .. } => "CLIPBOARD_ERROR".to_string(),
            ChatRealError::InvalidUrl { .. } => "INVALID_URL".to_string(),
            ChatRealError::ConnectionFailed { .. } => "CONNECTION_FAILED".to_string(),
            ChatRealError::Transport { .. } => "TRANSPORT_ERROR".to_string(),
            ChatRealError::InvalidMessage { .. } => "INVALID_MESSAGE".to_string(),
            ChatRealError::InvalidState { .. } => "INVALID_STATE".to_string(),
            ChatRealError::Io { .. } => "IO_ERROR".to_string(),
        }
    }

    /// Whether retrying the same operation may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatRealError::ConnectionFailed { .. }
                | ChatRealError::Transport { .. }
                | ChatRealError::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let error = ChatRealError::InvalidRoomId {
            room_id: "abc-123".to_string(),
        };
        assert_eq!(error.error_code(), "INVALID_ROOM_ID");
        assert_eq!(error.to_string(), "Invalid room ID: abc-123");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_transport_errors_are_recoverable() {
        let error = ChatRealError::ConnectionFailed {
            url: "ws://localhost:5000/".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(error.is_recoverable());
        assert_eq!(error.error_code(), "CONNECTION_FAILED");
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        match ChatRealError::from(io_error) {
            ChatRealError::Io { .. } => (),
            other => panic!("Expected Io error variant, got {other:?}"),
        }
    }
}
