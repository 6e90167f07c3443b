//! Event feed for observing component state changes.
//!
//! Session and engine events flow through a feed so UI callbacks can react
//! to warnings, forced logouts, and abandoned actions without polling.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// An event feed that distributes events to subscribers.
///
/// The feed:
/// - Preserves emit order per subscriber
/// - Supports multiple subscribers
/// - Drops subscribers whose receiver was closed
/// - Is thread-safe
pub struct EventFeed<T> {
    subscribers: RwLock<Vec<Sender<T>>>,
}

impl<T: Clone> EventFeed<T> {
    /// Creates a new feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that will receive all future events. The
    /// receiver should be polled regularly to avoid unbounded memory
    /// growth.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers.
    ///
    /// Events are cloned to each active subscriber; disconnected
    /// subscribers are removed.
    pub fn emit(&self, event: T) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Emits multiple events in order.
    pub fn emit_batch(&self, events: Vec<T>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl<T: Clone> Default for EventFeed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventFeed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFeed")
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}
