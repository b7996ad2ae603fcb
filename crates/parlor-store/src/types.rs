//! Row types for the logical schema.
//!
//! ```text
//! rooms(room_id PK, room_name, max_players, current_players,
//!       game_status, created_by, created_at)
//! room_players(room_id FK, user_id FK, joined_at, unique(room_id, user_id))
//! users(user_id PK, username unique, nickname)
//! ```

use parlor_protocol::{GameStatus, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// One row of the `rooms` table.
///
/// `current_players` is kept equal to the number of membership rows for
/// the room; both are only ever mutated together inside a transaction
/// holding the room's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRow {
    pub room_id: RoomId,
    pub room_name: String,
    pub max_players: u32,
    pub current_players: u32,
    pub game_status: GameStatus,
    pub created_by: UserId,
    /// Milliseconds since the Unix epoch, stamped on insert.
    pub created_at: u64,
}

/// The caller-supplied part of a room insert; the store assigns the
/// identifier, the zeroed counter, and the timestamp.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_name: String,
    pub max_players: u32,
    pub created_by: UserId,
}

/// One row of the `room_players` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRow {
    pub room_id: RoomId,
    pub user_id: UserId,
    /// Store-assigned monotonic sequence: ordering members by `joined_at`
    /// is join-time order, with no wall-clock ties.
    pub joined_at: u64,
}

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub user_id: UserId,
    pub username: String,
    pub nickname: String,
}

/// A serializable image of the whole store, used for durability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub rooms: Vec<RoomRow>,
    pub members: Vec<MembershipRow>,
    pub users: Vec<UserRow>,
    pub next_room_id: u64,
    pub next_user_id: u64,
    pub next_join_seq: u64,
}
