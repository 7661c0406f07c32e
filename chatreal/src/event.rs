//! Event system for call session events

use crate::call::{CallPhase, MediaState};
use crate::chat::ChatMessage;
use chatreal_media::MediaStream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Events that can occur during a call session
#[derive(Debug, Clone)]
pub enum Event {
    /// The local camera/microphone stream was opened
    LocalStream {
        /// The local stream
        stream: MediaStream,
    },
    /// A remote stream arrived on the peer connection
    RemoteStream {
        /// The remote stream
        stream: MediaStream,
    },
    /// The peer connection reported `disconnected` or `failed`
    Disconnected,
    /// The call moved to a new phase
    PhaseChanged {
        /// New phase
        phase: CallPhase,
    },
    /// Audio or video was toggled
    MediaStateChanged {
        /// State after the toggle
        state: MediaState,
    },
    /// A chat message was received from the backend
    ChatMessage {
        /// The message
        message: ChatMessage,
    },
    /// An error surfaced to the user
    Error {
        /// User-facing text
        message: String,
    },
}

impl Event {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::LocalStream { .. } => "local_stream",
            Event::RemoteStream { .. } => "remote_stream",
            Event::Disconnected => "disconnected",
            Event::PhaseChanged { .. } => "phase_changed",
            Event::MediaStateChanged { .. } => "media_state_changed",
            Event::ChatMessage { .. } => "chat_message",
            Event::Error { .. } => "error",
        }
    }

    /// Check if this is a stream-related event
    pub fn is_stream_event(&self) -> bool {
        matches!(
            self,
            Event::LocalStream { .. } | Event::RemoteStream { .. } | Event::MediaStateChanged { .. }
        )
    }

    /// Check if this is a connection-related event
    pub fn is_connection_event(&self) -> bool {
        matches!(self, Event::Disconnected | Event::PhaseChanged { .. })
    }

    /// Check if this is an error event
    pub fn is_error_event(&self) -> bool {
        matches!(self, Event::Error { .. })
    }
}

type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    observers: Vec<Observer>,
    pending: VecDeque<Event>,
    dispatching: bool,
}

/// Fans events out to synchronous observers and async subscribers
///
/// Observers run inline on the emitting task, before any subscriber sees the
/// event. An event emitted while another is being delivered, for instance by
/// an observer, is queued and delivered once the current one has reached
/// every subscriber, so subscribers see events in cause-then-effect order.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Bus with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().subscribers.push(tx);
        EventStream::new(rx)
    }

    /// Run `observer` inline for every event
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.lock().observers.push(Arc::new(observer));
    }

    /// Deliver an event
    pub fn emit(&self, event: Event) {
        debug!("Event: {}", event.event_type());
        {
            let mut inner = self.inner.lock();
            inner.pending.push_back(event);
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;
        }

        let _dispatch = DispatchGuard(&self.inner);
        loop {
            // Observers may emit in turn, so none run under the lock.
            let (event, observers) = {
                let mut inner = self.inner.lock();
                match inner.pending.pop_front() {
                    Some(event) => (event, inner.observers.clone()),
                    None => break,
                }
            };
            for observer in &observers {
                observer(&event);
            }
            self.inner
                .lock()
                .subscribers
                .retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Handle that does not keep the bus alive, for observers that emit
    pub(crate) fn downgrade(&self) -> WeakEventBus {
        WeakEventBus {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of open subscriptions
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }
}

struct DispatchGuard<'a>(&'a Mutex<BusInner>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().dispatching = false;
    }
}

/// Non-owning [`EventBus`] handle
#[derive(Clone)]
pub(crate) struct WeakEventBus {
    inner: Weak<Mutex<BusInner>>,
}

impl WeakEventBus {
    /// The bus, if it still exists
    pub(crate) fn upgrade(&self) -> Option<EventBus> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("subscribers", &inner.subscribers.len())
            .field("observers", &inner.observers.len())
            .finish()
    }
}

/// Stream of session events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<Event>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Drain every event already queued
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }
}
