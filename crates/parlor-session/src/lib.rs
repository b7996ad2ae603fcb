//! Connection session management for Parlor.
//!
//! This crate owns the lifecycle of one client↔server connection:
//!
//! 1. **Connect** — open the transport, send the login line, start the
//!    background receive loop ([`Session::connect`]).
//! 2. **Pump** — one dedicated task reads lines, decodes them, and fans
//!    each message out to registered [`MessageListener`]s in registration
//!    order. A bad line or a failing listener never stops the pump; only
//!    transport failure does.
//! 3. **Disconnect** — idempotent teardown, safe to race between the
//!    receive loop and external callers ([`Session::disconnect`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Game layer (above)  ← registers listeners, reacts to messages
//!     ↕
//! Session layer (this crate)  ← lifecycle + ordered dispatch
//!     ↕
//! Protocol / transport (below)  ← lines in, lines out
//! ```

mod error;
mod listener;
mod session;
mod state;

pub use error::SessionError;
pub use listener::{ListenerError, ListenerId, MessageListener};
pub use session::{Identity, Session};
pub use state::SessionState;
