//! The session lifecycle state machine.
//!
//! ```text
//! Connecting → Authenticated ⇄ InRoom
//!      └──────────┴──────────────┴──→ Disconnected (terminal)
//! ```
//!
//! The state is a single atomic flag: the receive loop and external
//! callers of `send`/`disconnect` coordinate only through it, so every
//! read and write must be atomic.

use std::sync::atomic::{AtomicU8, Ordering};

/// The lifecycle state of a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Transport opening; the login line has not been sent yet.
    Connecting = 0,
    /// Logged in locally (the server ack is not awaited).
    Authenticated = 1,
    /// The game layer confirmed a room join.
    InRoom = 2,
    /// Terminal: reached from any state by disconnect or I/O failure.
    Disconnected = 3,
}

impl SessionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Authenticated,
            2 => Self::InRoom,
            _ => Self::Disconnected,
        }
    }
}

/// Atomic cell holding a [`SessionState`].
///
/// `Disconnected` is absorbing: [`transition`](Self::transition) can
/// never leave it, and [`disconnect`](Self::disconnect) is the only way
/// in. The swap in `disconnect` returns the prior state, which lets
/// racing callers agree on exactly one of them doing teardown.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Moves `from → to` if the cell currently holds `from`. Returns
    /// whether the transition happened.
    pub(crate) fn transition(&self, from: SessionState, to: SessionState) -> bool {
        debug_assert_ne!(to, SessionState::Disconnected, "use disconnect()");
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Forces the terminal state and returns what the cell held before.
    pub(crate) fn disconnect(&self) -> SessionState {
        SessionState::from_u8(self.0.swap(SessionState::Disconnected as u8, Ordering::SeqCst))
    }
}

// =========================================================================
// Tests
// =========================================================================
