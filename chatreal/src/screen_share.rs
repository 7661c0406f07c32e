//! Screen sharing
//!
//! Captures the screen through [`MediaDevices::get_display_media`] and stops
//! by itself when the captured video ends, for instance when the user presses
//! the platform's own "stop sharing" button.

use chatreal_media::{DisplayMediaConstraints, MediaStream, SharedDevices};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type ShareCallback = Arc<dyn Fn(&MediaStream) + Send + Sync>;
type EndCallback = Arc<dyn Fn() + Send + Sync>;

struct ShareInner {
    stream: Mutex<Option<MediaStream>>,
    on_end: Option<EndCallback>,
}

impl ShareInner {
    /// Stop the active share; only the first caller sees the stream
    fn stop(&self) -> bool {
        let Some(stream) = self.stream.lock().take() else {
            return false;
        };
        stream.stop_all();
        info!("Screen share {} stopped", stream.id());
        if let Some(on_end) = &self.on_end {
            on_end();
        }
        true
    }
}

/// The screen share button and its capture
pub struct ScreenShare {
    devices: SharedDevices,
    on_start: Option<ShareCallback>,
    inner: Arc<ShareInner>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ScreenShare {
    /// Share through `devices`
    pub fn new(devices: SharedDevices) -> Self {
        Self {
            devices,
            on_start: None,
            inner: Arc::new(ShareInner {
                stream: Mutex::new(None),
                on_end: None,
            }),
            watcher: Mutex::new(None),
        }
    }

    /// Called with the capture when sharing starts
    pub fn on_share_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&MediaStream) + Send + Sync + 'static,
    {
        self.on_start = Some(Arc::new(callback));
        self
    }

    /// Called once when sharing stops, however it stopped
    pub fn on_share_end<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let stream = self.inner.stream.lock().take();
        self.inner = Arc::new(ShareInner {
            stream: Mutex::new(stream),
            on_end: Some(Arc::new(callback)),
        });
        self
    }

    /// Ask for a screen capture. Returns whether sharing started.
    ///
    /// A dismissed picker or capture failure is logged and leaves the share
    /// off.
    pub async fn start_share(&self) -> bool {
        if self.is_sharing() {
            return true;
        }

        let stream = match self
            .devices
            .get_display_media(&DisplayMediaConstraints::default())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Screen-share cancelled or failed: {}", e);
                return false;
            }
        };

        info!("Screen share {} started", stream.id());
        *self.inner.stream.lock() = Some(stream.clone());
        if let Some(on_start) = &self.on_start {
            on_start(&stream);
        }

        if let Some(video) = stream.first_video_track() {
            let inner = self.inner.clone();
            let watcher = tokio::spawn(async move {
                video.ended().await;
                debug!("Captured screen track {} ended", video.id());
                inner.stop();
            });
            if let Some(previous) = self.watcher.lock().replace(watcher) {
                previous.abort();
            }
        }
        true
    }

    /// Stop sharing. Stopping when not sharing does nothing.
    pub fn stop_share(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
        }
        self.inner.stop();
    }

    /// Start or stop depending on the current state. Returns whether sharing
    /// afterwards.
    pub async fn toggle(&self) -> bool {
        if self.is_sharing() {
            self.stop_share();
            false
        } else {
            self.start_share().await
        }
    }

    /// Whether a capture is active
    pub fn is_sharing(&self) -> bool {
        self.inner.stream.lock().is_some()
    }

    /// The active capture
    pub fn stream(&self) -> Option<MediaStream> {
        self.inner.stream.lock().clone()
    }

    /// Button tooltip
    pub fn title(&self) -> &'static str {
        if self.is_sharing() {
            "Stop sharing"
        } else {
            "Share screen"
        }
    }
}

impl Drop for ScreenShare {
    fn drop(&mut self) {
        self.stop_share();
    }
}

impl fmt::Debug for ScreenShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenShare")
            .field("sharing", &self.is_sharing())
            .finish()
    }
}
