//! Landing page form: create a room, or join one by id

use chatreal_core::{generate_room_id, is_valid_room_id};

/// Shown when joining with an empty id
pub const ROOM_ID_REQUIRED: &str = "Room ID is required";
/// Shown when the id does not look like `<millis>-<suffix>`
pub const INVALID_ROOM_ID: &str =
    "Invalid room ID format. Room IDs should be in the format: numbers-letters";

/// What the landing page asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandingAction {
    /// Open the call view for this room
    StartCall(String),
}

/// State of the join form
#[derive(Debug, Clone, Default)]
pub struct LandingForm {
    join_room_id: String,
    error: Option<String>,
    camera_test_open: bool,
}

impl LandingForm {
    /// Empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a call in a freshly generated room
    pub fn create_room(&self) -> LandingAction {
        LandingAction::StartCall(generate_room_id())
    }

    /// Current input text
    pub fn join_room_id(&self) -> &str {
        &self.join_room_id
    }

    /// Validation message under the input
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Replace the input text, validating as the user types
    pub fn set_join_room_id(&mut self, value: impl Into<String>) {
        self.join_room_id = value.into();
        let trimmed = self.join_room_id.trim();
        self.error = if trimmed.is_empty() || is_valid_room_id(trimmed) {
            None
        } else {
            Some(INVALID_ROOM_ID.to_string())
        };
    }

    /// Whether the join button is enabled
    pub fn can_join(&self) -> bool {
        !self.join_room_id.trim().is_empty() && self.error.is_none()
    }

    /// Join the typed room if its id is valid
    pub fn join_room(&mut self) -> Option<LandingAction> {
        let trimmed = self.join_room_id.trim().to_string();
        if trimmed.is_empty() {
            self.error = Some(ROOM_ID_REQUIRED.to_string());
            return None;
        }
        if !is_valid_room_id(&trimmed) {
            self.error = Some(INVALID_ROOM_ID.to_string());
            return None;
        }
        self.error = None;
        Some(LandingAction::StartCall(trimmed))
    }

    /// Enter submits the form
    pub fn key_press(&mut self, key: &str) -> Option<LandingAction> {
        if key == "Enter" {
            self.join_room()
        } else {
            None
        }
    }

    /// Pasting non-blank text joins it straight away, without validation
    pub fn paste(&mut self, text: &str) -> Option<LandingAction> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.set_join_room_id(trimmed);
        Some(LandingAction::StartCall(trimmed.to_string()))
    }

    /// Show the camera test
    pub fn open_camera_test(&mut self) {
        self.camera_test_open = true;
    }

    /// Hide the camera test
    pub fn close_camera_test(&mut self) {
        self.camera_test_open = false;
    }

    /// Whether the camera test is shown
    pub fn is_camera_test_open(&self) -> bool {
        self.camera_test_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_room_generates_valid_id() {
        let LandingAction::StartCall(room_id) = LandingForm::new().create_room();
        assert!(is_valid_room_id(&room_id));
    }

    #[test]
    fn test_live_validation_and_button() {
        let mut form = LandingForm::new();
        assert!(!form.can_join());

        form.set_join_room_id("abc-123");
        assert_eq!(form.error(), Some(INVALID_ROOM_ID));
        assert!(!form.can_join());

        form.set_join_room_id(" 1699999999999-ab12cd3 ");
        assert_eq!(form.error(), None);
        assert!(form.can_join());

        form.set_join_room_id("   ");
        assert_eq!(form.error(), None);
        assert!(!form.can_join());
    }

    #[test]
    fn test_join_messages() {
        let mut form = LandingForm::new();
        assert_eq!(form.join_room(), None);
        assert_eq!(form.error(), Some(ROOM_ID_REQUIRED));

        form.set_join_room_id("abc-123");
        assert_eq!(form.key_press("Enter"), None);
        assert_eq!(form.error(), Some(INVALID_ROOM_ID));

        form.set_join_room_id("1699999999999-ab12cd3 ");
        assert_eq!(form.key_press("a"), None);
        assert_eq!(
            form.key_press("Enter"),
            Some(LandingAction::StartCall("1699999999999-ab12cd3".to_string()))
        );
    }

    #[test]
    fn test_paste_joins_without_validation() {
        let mut form = LandingForm::new();
        assert_eq!(form.paste("   "), None);
        assert_eq!(
            form.paste(" not-a-room "),
            Some(LandingAction::StartCall("not-a-room".to_string()))
        );
    }

    #[test]
    fn test_camera_test_toggle() {
        let mut form = LandingForm::new();
        form.open_camera_test();
        assert!(form.is_camera_test_open());
        form.close_camera_test();
        assert!(!form.is_camera_test_open());
    }
}
