//! Error types for the room layer.

use parlor_protocol::{RoomId, UserId};
use parlor_store::StoreError;

/// Errors that can occur during room operations.
///
/// The first five are expected business-rule failures, reported to the
/// caller without retry; `Store` covers persistence failures, after which
/// the enclosing transaction has been rolled back.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room is full — no more player slots available.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The user has no membership row in this room.
    #[error("user {0} is not a member of room {1}")]
    MembershipNotFound(UserId, RoomId),

    /// The user already occupies a room (at most one membership at a time).
    #[error("user {0} is already in room {1}")]
    AlreadyInRoom(UserId, RoomId),

    /// A room cannot be created with this capacity.
    #[error("invalid room capacity {0}")]
    InvalidCapacity(u32),

    /// The name contains wire-reserved characters (`|`, `;`, `:`).
    #[error("name contains reserved characters: {0:?}")]
    InvalidName(String),

    /// The store failed; the transaction was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}
