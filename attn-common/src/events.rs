//! Event types for the kiosk notification channel
//!
//! The presentation layer (toasts, modals, connection indicator) is external.
//! The core talks to it only by emitting [`KioskEvent`]s on an [`EventBus`].

use crate::models::SubmissionResult;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Kiosk notification events
///
/// Serialized with a `type` tag so a UI bridge can forward them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KioskEvent {
    /// Short transient notice
    Toast {
        level: ToastLevel,
        message: String,
    },

    /// Every worker in the batch was registered
    SubmissionSucceeded {
        title: String,
        message: String,
        results: Vec<SubmissionResult>,
    },

    /// Some workers were registered and some were not
    SubmissionPartial {
        title: String,
        message: String,
        succeeded: usize,
        failed: usize,
        results: Vec<SubmissionResult>,
    },

    /// Nothing was registered (request-level or batch-level)
    SubmissionFailed {
        message: String,
    },

    /// Remote API reachability changed
    ConnectionChanged {
        online: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl KioskEvent {
    pub fn toast(level: ToastLevel, message: impl Into<String>) -> Self {
        KioskEvent::Toast {
            level,
            message: message.into(),
        }
    }
}

/// Broadcast channel for kiosk events
pub struct EventBus {
    tx: broadcast::Sender<KioskEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use attn_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: KioskEvent) -> Result<usize, broadcast::error::SendError<KioskEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KioskEvent) {
        let _ = self.tx.send(event);
    }

    /// Convenience wrapper for toasts
    pub fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.emit_lossy(KioskEvent::toast(level, message));
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
