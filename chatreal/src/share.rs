//! Room link sharing

use async_trait::async_trait;
use chatreal_core::{share_room_url, ChatRealError, Location};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long the button reads "Copied!"
pub const COPIED_INDICATOR: Duration = Duration::from_secs(2);

/// A text clipboard
#[async_trait]
pub trait Clipboard: Send + Sync + fmt::Debug {
    /// Replace the clipboard contents
    async fn write_text(&self, text: &str) -> Result<(), ChatRealError>;
}

/// Clipboard held in memory
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    unavailable: AtomicBool,
}

impl MemoryClipboard {
    /// Empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard that refuses every write
    pub fn unavailable() -> Self {
        Self {
            unavailable: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Last text written
    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ChatRealError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ChatRealError::Clipboard {
                reason: "clipboard access denied".to_string(),
            });
        }
        *self.contents.lock() = Some(text.to_string());
        Ok(())
    }
}

/// The "Copy Link" button of the call view
pub struct ShareButton {
    url: String,
    clipboard: Arc<dyn Clipboard>,
    fallback: Option<Arc<dyn Clipboard>>,
    copied: Arc<AtomicBool>,
    reset: Mutex<Option<JoinHandle<()>>>,
}

impl ShareButton {
    /// Button sharing `room_id` on the page at `location`
    pub fn new(location: &Location, room_id: &str, clipboard: Arc<dyn Clipboard>) -> Self {
        Self {
            url: share_room_url(location.origin(), location.pathname(), room_id),
            clipboard,
            fallback: None,
            copied: Arc::new(AtomicBool::new(false)),
            reset: Mutex::new(None),
        }
    }

    /// Clipboard tried when the primary one fails
    pub fn with_fallback(mut self, fallback: Arc<dyn Clipboard>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Link that opens the room
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the copied indicator is showing
    pub fn is_copied(&self) -> bool {
        self.copied.load(Ordering::SeqCst)
    }

    /// Button text
    pub fn label(&self) -> &'static str {
        if self.is_copied() {
            "Copied!"
        } else {
            "Copy Link"
        }
    }

    /// Copy the link and show the indicator for [`COPIED_INDICATOR`]
    ///
    /// Clipboard failures are logged; the indicator shows regardless.
    pub async fn share(&self) {
        if let Err(e) = self.clipboard.write_text(&self.url).await {
            warn!("Clipboard write failed: {}", e);
            if let Some(fallback) = &self.fallback {
                if let Err(e) = fallback.write_text(&self.url).await {
                    warn!("Fallback copy failed: {}", e);
                }
            }
        }
        debug!("Room link copied: {}", self.url);

        self.copied.store(true, Ordering::SeqCst);
        let copied = self.copied.clone();
        let reset = tokio::spawn(async move {
            tokio::time::sleep(COPIED_INDICATOR).await;
            copied.store(false, Ordering::SeqCst);
        });
        if let Some(previous) = self.reset.lock().replace(reset) {
            previous.abort();
        }
    }
}

impl Drop for ShareButton {
    fn drop(&mut self) {
        if let Some(reset) = self.reset.lock().take() {
            reset.abort();
        }
    }
}

impl fmt::Debug for ShareButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareButton")
            .field("url", &self.url)
            .field("copied", &self.is_copied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Location {
        Location::parse("https://chat.example/app/?room=old").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_share_copies_link_and_resets() {
        let clipboard = Arc::new(MemoryClipboard::new());
        let button = ShareButton::new(&location(), "1-abcdefg", clipboard.clone());
        assert_eq!(button.label(), "Copy Link");

        button.share().await;
        assert_eq!(
            clipboard.contents().as_deref(),
            Some("https://chat.example/app/?room=1-abcdefg")
        );
        assert_eq!(button.label(), "Copied!");

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(button.is_copied());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(button.label(), "Copy Link");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_clipboard() {
        let fallback = Arc::new(MemoryClipboard::new());
        let button = ShareButton::new(&location(), "1-abcdefg", Arc::new(MemoryClipboard::unavailable()))
            .with_fallback(fallback.clone());

        button.share().await;
        assert_eq!(fallback.contents().as_deref(), Some(button.url()));
        assert!(button.is_copied());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_share_restarts_indicator() {
        let button = ShareButton::new(&location(), "1-abcdefg", Arc::new(MemoryClipboard::new()));
        button.share().await;
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        button.share().await;
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(button.is_copied());
    }
}
