//! Listener registration and ordered fan-out.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use parlor_protocol::Message;

/// Error type a listener may return; it is logged, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Handle returned by listener registration, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Reacts to one decoded inbound message.
///
/// Listeners run synchronously on the receive task, in registration
/// order. Returning an error does not stop dispatch to the remaining
/// listeners and does not stop the receive loop — it is logged and
/// swallowed.
pub trait MessageListener: Send + Sync + 'static {
    fn on_message(&self, msg: &Message) -> Result<(), ListenerError>;
}

impl<F> MessageListener for F
where
    F: Fn(&Message) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    fn on_message(&self, msg: &Message) -> Result<(), ListenerError> {
        self(msg)
    }
}

/// The ordered listener list of one session.
///
/// Single-writer discipline: listeners may be added or removed between
/// dispatches, but not from within a dispatch (the list is locked for
/// the duration of the fan-out).
pub(crate) struct ListenerSet {
    entries: Mutex<Vec<(ListenerId, Box<dyn MessageListener>)>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn add(&self, listener: Box<dyn MessageListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().unwrap().push((id, listener));
        id
    }

    /// Removes a listener. Returns whether it was present.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Invokes every listener in registration order. A listener error is
    /// logged and does not prevent the remaining listeners from running.
    pub(crate) fn dispatch(&self, msg: &Message) {
        let entries = self.entries.lock().unwrap();
        for (id, listener) in entries.iter() {
            if let Err(e) = listener.on_message(msg) {
                tracing::warn!(%id, kind = %msg.kind, error = %e, "listener failed");
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
