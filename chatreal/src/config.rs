//! Configuration types and defaults

use crate::peer::RtcConfiguration;
use crate::simulation::RemoteSimulationConfig;
use chatreal_core::{ChatRealError, Location};
use chatreal_diagnostics::{DebugEnv, DebugLogger};

/// Environment variable naming the chat backend
pub const SOCKET_URL_ENV_VAR: &str = "CHAT_REAL_SOCKET_URL";
/// Chat backend used when none is configured
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5000";
/// Page the app is served from when none is configured
pub const DEFAULT_PAGE_URL: &str = "http://localhost:5173/";

/// Global Chat Real configuration
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Chat backend URL (`http`, `https`, `ws` or `wss`)
    pub socket_url: String,
    /// Page URL used for share links and the initial route
    pub page_url: String,
    /// Build and debug flags
    pub debug: DebugEnv,
}

impl GlobalConfig {
    /// Defaults overlaid with `CHAT_REAL_SOCKET_URL`, `CHAT_REAL_DEBUG` and
    /// `CHAT_REAL_VERSION`
    pub fn from_env() -> Self {
        Self {
            socket_url: std::env::var(SOCKET_URL_ENV_VAR)
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string()),
            debug: DebugEnv::from_env(),
            ..Self::default()
        }
    }

    /// Check that the URLs are usable
    pub fn validate(&self) -> Result<(), ChatRealError> {
        if self.socket_url.trim().is_empty() {
            return Err(ChatRealError::MissingConfiguration {
                field: "socket_url".to_string(),
            });
        }
        Location::parse(&self.page_url)?;
        Ok(())
    }

    /// The page location
    pub fn location(&self) -> Result<Location, ChatRealError> {
        Location::parse(&self.page_url)
    }

    /// Logger honouring the debug flags
    pub fn debug_logger(&self) -> DebugLogger {
        DebugLogger::with_env(self.debug.clone())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            page_url: DEFAULT_PAGE_URL.to_string(),
            debug: DebugEnv::default(),
        }
    }
}

/// Room-specific configuration
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Display name; falls back to the stored `username` or a random one
    pub username: Option<String>,
    /// Chat backend overriding the global one
    pub socket_url: Option<String>,
    /// Connect the chat socket when joining
    pub chat_enabled: bool,
    /// Peer connection settings
    pub rtc: RtcConfiguration,
    /// Simulated remote participant
    pub remote: RemoteSimulationConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            username: None,
            socket_url: None,
            chat_enabled: true,
            rtc: RtcConfiguration::default(),
            remote: RemoteSimulationConfig::default(),
        }
    }
}
