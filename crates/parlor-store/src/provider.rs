//! The transactional store interface.
//!
//! A provider hands out one transaction per logical operation; nothing is
//! held across calls. Row locking follows the `SELECT … FOR UPDATE`
//! model: [`StoreTx::select_room_for_update`] acquires an exclusive lock
//! on that room's row which is held until the transaction commits, rolls
//! back, or is dropped. Writes are buffered and applied atomically at
//! commit — a failed commit applies nothing.
//!
//! Methods are declared as `impl Future … + Send` (rather than
//! `async fn`) so code that is generic over the provider can still spawn
//! its futures onto the runtime. Implementations write plain `async fn`.

use std::future::Future;

use parlor_protocol::{RoomId, UserId};

use crate::{MembershipRow, NewRoom, RoomRow, StoreError, UserRow};

/// Opens transactions against the backing store.
pub trait StoreProvider: Send + Sync + 'static {
    /// The transaction type produced by this provider.
    type Tx: StoreTx;

    /// Begins a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// A single open transaction.
///
/// Reads observe the committed state overlaid with this transaction's own
/// buffered writes. Identifier-assigning inserts draw from the store's
/// sequences immediately, so a rolled-back transaction leaves a gap in
/// the sequence — the same behavior as a database autoincrement column.
pub trait StoreTx: Send {
    /// Reads a room row without locking it.
    fn select_room(
        &mut self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<RoomRow>, StoreError>> + Send;

    /// Reads a room row under an exclusive per-room lock held for the
    /// remainder of this transaction. Locking a nonexistent room is
    /// allowed and returns `None` (the caller decides how to fail).
    fn select_room_for_update(
        &mut self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<RoomRow>, StoreError>> + Send;

    /// Inserts a room row and returns its assigned identifier.
    fn insert_room(
        &mut self,
        room: NewRoom,
    ) -> impl Future<Output = Result<RoomId, StoreError>> + Send;

    /// Sets a room's `current_players` counter.
    fn update_room_players(
        &mut self,
        room_id: RoomId,
        current_players: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Buffers insertion of a membership row.
    fn insert_membership(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Buffers deletion of a membership row. Returns whether the row
    /// exists as seen by this transaction (committed state plus its own
    /// buffered writes).
    fn delete_membership(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Returns the room the user currently occupies, if any.
    fn membership_for_user(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<RoomId>, StoreError>> + Send;

    /// Lists all rooms, newest first.
    fn list_rooms(&mut self) -> impl Future<Output = Result<Vec<RoomRow>, StoreError>> + Send;

    /// Lists a room's memberships in join order, joined with the user rows.
    fn list_members(
        &mut self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<(MembershipRow, UserRow)>, StoreError>> + Send;

    /// Inserts a user, or refreshes the nickname of an existing username.
    /// Returns the user's identifier either way.
    fn upsert_user(
        &mut self,
        username: &str,
        nickname: &str,
    ) -> impl Future<Output = Result<UserId, StoreError>> + Send;

    /// Atomically applies the buffered writes and releases row locks.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Discards the buffered writes and releases row locks.
    fn rollback(self) -> impl Future<Output = ()> + Send;
}
