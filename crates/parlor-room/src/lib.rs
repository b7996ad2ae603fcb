//! Room layer for Parlor.
//!
//! [`RoomRegistry`] is a stateless façade over an injected
//! [`StoreProvider`](parlor_store::StoreProvider): every operation opens
//! one transaction, runs to completion or failure, and holds nothing
//! across calls. Capacity-affecting operations (`join_room`,
//! `leave_room`) take the room's row lock for the whole transaction, so
//! concurrent calls against one room serialize; rooms are independent of
//! each other.
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby handler (above)  ← reacts to decoded messages
//!     ↕
//! Room layer (this crate)  ← transactional catalog + membership
//!     ↕
//! Store layer (below)  ← row locks, commit/rollback
//! ```

mod error;
mod registry;

pub use error::RoomError;
pub use registry::{room_summary, Member, RoomRegistry};
