//! Unified error type for the Parlor facade.

use parlor_protocol::ProtocolError;
use parlor_room::RoomError;
use parlor_session::SessionError;
use parlor_store::StoreError;
use parlor_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `parlor` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    /// A transport-level error (connect, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (decode, payload grammar, exchange rules).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (send while disconnected, login line).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not found, no membership).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A store-level error (constraint, snapshot, unavailable).
    #[error(transparent)]
    Store(#[from] StoreError),
}
