//! Structured debug logging system
//!
//! Verbose output is on for development builds or when `CHAT_REAL_DEBUG=true`.
//! Otherwise only errors are shown. `RUST_LOG` overrides both.

use chatreal_core::ChatRealError;
use tracing_subscriber::EnvFilter;

/// Environment variable enabling verbose logging in release builds
pub const DEBUG_ENV_VAR: &str = "CHAT_REAL_DEBUG";
/// Environment variable carrying the application version
pub const VERSION_ENV_VAR: &str = "CHAT_REAL_VERSION";
/// Version reported when none is configured
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Build and environment flags that control diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEnv {
    /// Development build
    pub is_development: bool,
    /// Debug mode explicitly requested
    pub is_debug_mode: bool,
    /// Application version
    pub version: String,
}

impl DebugEnv {
    /// Read the flags from the process environment
    pub fn from_env() -> Self {
        Self::from_values(
            cfg!(debug_assertions),
            std::env::var(DEBUG_ENV_VAR).ok().as_deref(),
            std::env::var(VERSION_ENV_VAR).ok().as_deref(),
        )
    }

    /// Build flags from raw values; only the exact string `true` enables
    /// debug mode, and an empty version falls back to the default
    pub fn from_values(is_development: bool, debug: Option<&str>, version: Option<&str>) -> Self {
        Self {
            is_development,
            is_debug_mode: debug == Some("true"),
            version: version
                .filter(|v| !v.is_empty())
                .unwrap_or(DEFAULT_VERSION)
                .to_string(),
        }
    }

    /// Production build
    pub fn is_production(&self) -> bool {
        !self.is_development
    }

    /// Whether debug, info and warning output should be shown
    pub fn is_verbose(&self) -> bool {
        self.is_development || self.is_debug_mode
    }

    /// Filter directive used when `RUST_LOG` is unset
    pub fn default_directive(&self) -> &'static str {
        if self.is_verbose() {
            "debug"
        } else {
            "error"
        }
    }
}

impl Default for DebugEnv {
    fn default() -> Self {
        Self::from_values(cfg!(debug_assertions), None, None)
    }
}

/// Debug logger for structured logging
#[derive(Debug)]
pub struct DebugLogger {
    env: DebugEnv,
}

impl DebugLogger {
    /// Logger configured from the process environment
    pub fn new() -> Self {
        Self {
            env: DebugEnv::from_env(),
        }
    }

    /// Logger with explicit flags
    pub fn with_env(env: DebugEnv) -> Self {
        Self { env }
    }

    /// Flags in effect
    pub fn env(&self) -> &DebugEnv {
        &self.env
    }

    /// Initialize logging from the process environment
    pub fn init_logging() -> Result<(), ChatRealError> {
        Self::new().init()
    }

    /// Install the global subscriber
    ///
    /// Fails if a global subscriber is already installed.
    pub fn init(&self) -> Result<(), ChatRealError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.env.default_directive()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| ChatRealError::Initialization {
                reason: format!("failed to install log subscriber: {}", e),
            })?;

        tracing::info!(
            version = %self.env.version,
            debug_mode = self.env.is_debug_mode,
            "Chat Real logging initialized"
        );
        Ok(())
    }
}

impl Default for DebugLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_must_be_exactly_true() {
        assert!(DebugEnv::from_values(false, Some("true"), None).is_debug_mode);
        assert!(!DebugEnv::from_values(false, Some("1"), None).is_debug_mode);
        assert!(!DebugEnv::from_values(false, None, None).is_debug_mode);
    }

    #[test]
    fn test_version_default() {
        assert_eq!(DebugEnv::from_values(false, None, None).version, "1.0.0");
        assert_eq!(DebugEnv::from_values(false, None, Some("")).version, "1.0.0");
        assert_eq!(DebugEnv::from_values(false, None, Some("2.3.1")).version, "2.3.1");
    }

    #[test]
    fn test_default_directive() {
        let production = DebugEnv::from_values(false, None, None);
        assert!(production.is_production());
        assert_eq!(production.default_directive(), "error");

        let debug = DebugEnv::from_values(false, Some("true"), None);
        assert_eq!(debug.default_directive(), "debug");

        let development = DebugEnv::from_values(true, None, None);
        assert!(development.is_verbose());
    }

    #[test]
    fn test_second_init_fails() {
        let logger = DebugLogger::with_env(DebugEnv::from_values(false, None, None));
        // Another test may have installed a subscriber first; either way the
        // second call cannot succeed.
        let _ = logger.init();
        let error = logger.init().unwrap_err();
        assert_eq!(error.error_code(), "INITIALIZATION_FAILED");
    }
}
