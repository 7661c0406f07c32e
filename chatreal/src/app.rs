//! View routing driven by the `room` URL parameter

use crate::landing::LandingAction;
use chatreal_core::{History, Location};
use tracing::info;

/// Which page is shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Create or join a room
    Landing,
    /// In a call
    Call {
        /// Room of the call
        room_id: String,
    },
}

/// Top-level router
#[derive(Debug, Clone)]
pub struct App {
    history: History,
    view: View,
    room_id: String,
}

impl App {
    /// Start at `location`; a `room` parameter opens the call view directly
    pub fn new(location: Location) -> Self {
        let room_id = location.room_id().unwrap_or_default();
        let view = if room_id.is_empty() {
            View::Landing
        } else {
            info!("Opening room {} from URL", room_id);
            View::Call {
                room_id: room_id.clone(),
            }
        };
        Self {
            history: History::new(location),
            view,
            room_id,
        }
    }

    /// Current view
    pub fn view(&self) -> &View {
        &self.view
    }

    /// Navigation history
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Current page location
    pub fn location(&self) -> &Location {
        self.history.current()
    }

    /// Room of the current or last call, empty if none
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Open the call view for `room_id`, or for the current room when `None`,
    /// and put the room in the URL
    pub fn start_call(&mut self, room_id: Option<&str>) {
        if let Some(room_id) = room_id {
            self.room_id = room_id.to_string();
        }
        let path = self.history.current().room_path(&self.room_id);
        self.history.push_state(&path);
        self.view = View::Call {
            room_id: self.room_id.clone(),
        };
    }

    /// Apply a landing page action
    pub fn handle(&mut self, action: LandingAction) {
        match action {
            LandingAction::StartCall(room_id) => self.start_call(Some(&room_id)),
        }
    }

    /// Return to the landing page and drop the room from the URL
    pub fn back_to_landing(&mut self) {
        self.view = View::Landing;
        self.room_id.clear();
        let path = self.history.current().pathname().to_string();
        self.history.push_state(&path);
    }
}
