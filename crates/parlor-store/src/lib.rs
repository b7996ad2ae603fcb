//! Persistence provider for the Parlor room catalog.
//!
//! This crate defines the transactional store interface the room layer
//! runs against, plus an in-process implementation:
//!
//! - **Traits** ([`StoreProvider`], [`StoreTx`]) — one transaction per
//!   logical operation, with per-room row locking and commit/rollback.
//! - **Rows** ([`RoomRow`], [`MembershipRow`], [`UserRow`]) — the logical
//!   schema: `rooms`, `room_players`, `users`.
//! - **[`MemoryStore`]** — an in-memory store whose row locks are
//!   per-room async mutexes and whose transactions buffer writes and
//!   apply them atomically at commit. Doubles as the test store, and can
//!   be persisted through a JSON [`StoreSnapshot`].
//!
//! The store is injected into the room registry, so a different backend
//! (or a failure-injecting double) only has to implement the two traits.

mod error;
mod memory;
mod provider;
mod types;

pub use error::StoreError;
pub use memory::{MemoryStore, MemoryTx};
pub use provider::{StoreProvider, StoreTx};
pub use types::{MembershipRow, NewRoom, RoomRow, StoreSnapshot, UserRow};
