//! # Parlor
//!
//! Real-time multiplayer lobby/session layer: clients connect over a
//! persistent TCP socket, log in, browse and join capacity-bounded rooms,
//! and exchange chat messages, while a shared transactional store keeps
//! room membership consistent under concurrent access.
//!
//! The layers, leaves first:
//!
//! - [`parlor_protocol`]: the `<TYPE>:<payload>` line codec
//! - [`parlor_transport`]: line-oriented TCP transport
//! - [`parlor_session`]: the client [`Session`] with its message pump,
//!   listener fan-out, and disconnect lifecycle
//! - [`parlor_store`]: injected persistence provider with per-room row
//!   locks and commit/rollback
//! - [`parlor_room`]: the transactional [`RoomRegistry`]
//! - this crate: the [`LobbyServer`] that wires them together
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use parlor::{LobbyServerBuilder, MemoryStore};
//!
//! # async fn run() -> Result<(), parlor::ParlorError> {
//! let server = LobbyServerBuilder::new()
//!     .bind("0.0.0.0:7400")
//!     .build(MemoryStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::ParlorError;
pub use server::{LobbyServer, LobbyServerBuilder};

pub use parlor_protocol::{
    GameStatus, Message, MessageType, ProtocolError, RoomId, RoomSummary, UserId,
};
pub use parlor_room::{room_summary, Member, RoomError, RoomRegistry};
pub use parlor_session::{
    Identity, ListenerError, ListenerId, MessageListener, Session, SessionError, SessionState,
};
pub use parlor_store::{
    MemoryStore, RoomRow, StoreError, StoreProvider, StoreSnapshot, StoreTx,
};
pub use parlor_transport::{
    Connection, ConnectionId, TcpLineConnection, TcpLineTransport, Transport, TransportError,
};

/// Installs a `tracing` subscriber reading `RUST_LOG`, if none is set.
///
/// Convenience for binaries and tests; repeated calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
