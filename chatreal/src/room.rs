//! Room joining

use crate::call::CallSession;
use crate::peer::{LocalStorePresence, RoomPresence};
use crate::simulation::RemoteSimulationConfig;
use crate::{ChatReal, RoomConfig};
use chatreal_core::{ChatRealError, KeyValueStore};
use chatreal_signaling::{SharedTransport, SocketClient};
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Local storage key holding the chat display name
pub const USERNAME_STORAGE_KEY: &str = "username";

/// Display name: the explicit one, else the stored one, else `User-<0..999>`
pub fn resolve_username(explicit: Option<&str>, store: &dyn KeyValueStore) -> String {
    explicit
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .or_else(|| store.get(USERNAME_STORAGE_KEY).filter(|name| !name.is_empty()))
        .unwrap_or_else(|| format!("User-{}", rand::thread_rng().gen_range(0..1000)))
}

/// Fluent builder for room configuration and connection
#[derive(Debug)]
pub struct RoomBuilder {
    chat_real: ChatReal,
    room_id: String,
    config: RoomConfig,
    transport: Option<SharedTransport>,
    presence: Option<Arc<dyn RoomPresence>>,
}

impl RoomBuilder {
    pub(crate) fn new(chat_real: &ChatReal, room_id: &str) -> Self {
        Self {
            chat_real: chat_real.clone(),
            room_id: room_id.trim().to_string(),
            config: RoomConfig::default(),
            transport: None,
            presence: None,
        }
    }

    /// Set the display name
    pub fn username(mut self, name: &str) -> Self {
        self.config.username = Some(name.to_string());
        self
    }

    /// Use this chat connection instead of opening one
    pub fn transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the chat backend URL for this room
    pub fn socket_url(mut self, url: &str) -> Self {
        self.config.socket_url = Some(url.to_string());
        self
    }

    /// Join without a chat connection
    pub fn without_chat(mut self) -> Self {
        self.config.chat_enabled = false;
        self
    }

    /// Decide initiator status with `presence` instead of local storage
    pub fn presence(mut self, presence: Arc<dyn RoomPresence>) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Change the simulated remote's timing or canvas
    pub fn remote_simulation(mut self, remote: RemoteSimulationConfig) -> Self {
        self.config.remote = remote;
        self
    }

    /// Replace the whole room configuration
    pub fn config(mut self, config: RoomConfig) -> Self {
        self.config = config;
        self
    }

    /// Join the room: connect the chat, open local media and start waiting
    /// for the remote
    ///
    /// Only an empty room id fails. Chat and media failures are logged or
    /// recorded on the session.
    pub async fn join(self) -> Result<CallSession, ChatRealError> {
        if self.room_id.is_empty() {
            return Err(ChatRealError::InvalidRoomId {
                room_id: self.room_id,
            });
        }

        let store = self.chat_real.store();
        let username = resolve_username(self.config.username.as_deref(), store.as_ref());
        let presence = self
            .presence
            .unwrap_or_else(|| Arc::new(LocalStorePresence::new(store.clone())));

        let transport = match self.transport {
            Some(transport) => Some(transport),
            None if self.config.chat_enabled => {
                let url = self
                    .config
                    .socket_url
                    .clone()
                    .unwrap_or_else(|| self.chat_real.config().socket_url.clone());
                match SocketClient::connect(&url).await {
                    Ok(client) => {
                        let transport: SharedTransport = Arc::new(client);
                        Some(transport)
                    }
                    Err(e) => {
                        warn!("Chat unavailable for room {}: {}", self.room_id, e);
                        None
                    }
                }
            }
            None => None,
        };

        info!("Joining room {} as {}", self.room_id, username);
        let session = CallSession::new(
            self.room_id,
            username,
            self.chat_real.devices(),
            presence,
            transport,
            &self.config,
        );
        session.connect().await;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreal_core::MemoryStore;

    #[test]
    fn test_resolve_username() {
        let store = MemoryStore::new();
        assert_eq!(resolve_username(Some("Ana"), &store), "Ana");

        let generated = resolve_username(None, &store);
        let number: u32 = generated.strip_prefix("User-").unwrap().parse().unwrap();
        assert!(number < 1000);

        store.set(USERNAME_STORAGE_KEY, "Bruno").unwrap();
        assert_eq!(resolve_username(None, &store), "Bruno");
        assert_eq!(resolve_username(Some("  "), &store), "Bruno");
    }
}
