//! Light and dark theme, remembered in local storage

use chatreal_core::SharedStore;
use std::fmt;
use tracing::{debug, warn};

/// Local storage key holding the chosen theme
pub const THEME_STORAGE_KEY: &str = "chat-real-theme";

/// Colour scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    /// Light backgrounds
    Light,
    /// Dark backgrounds
    Dark,
}

impl Theme {
    /// Stored form
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Parse the stored form; anything else is `None`
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    /// The other theme
    pub fn toggled(&self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn system(prefers_dark: bool) -> Self {
        if prefers_dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current theme, persisted on every change
#[derive(Debug)]
pub struct ThemeController {
    store: SharedStore,
    prefers_dark: bool,
    theme: Theme,
}

impl ThemeController {
    /// Stored theme if valid, otherwise the system preference
    pub fn new(store: SharedStore, prefers_dark: bool) -> Self {
        let theme = store
            .get(THEME_STORAGE_KEY)
            .and_then(|value| Theme::parse(&value))
            .unwrap_or_else(|| Theme::system(prefers_dark));
        let controller = Self {
            store,
            prefers_dark,
            theme,
        };
        controller.persist();
        controller
    }

    /// Active theme
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Switch to `theme` and store it
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.persist();
    }

    /// Switch to the other theme
    pub fn toggle_theme(&mut self) -> Theme {
        self.set_theme(self.theme.toggled());
        self.theme
    }

    /// Forget the stored choice and follow the system preference
    pub fn reset_to_system(&mut self) -> Theme {
        if let Err(e) = self.store.remove(THEME_STORAGE_KEY) {
            warn!("Failed to clear stored theme: {}", e);
        }
        self.theme = Theme::system(self.prefers_dark);
        debug!("Theme reset to system preference: {}", self.theme);
        self.theme
    }

    fn persist(&self) {
        if let Err(e) = self.store.set(THEME_STORAGE_KEY, self.theme.as_str()) {
            warn!("Failed to store theme {}: {}", self.theme, e);
        }
    }
}
