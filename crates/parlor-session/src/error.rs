//! Error types for the session layer.

/// Errors that can occur while connecting or sending.
///
/// The receive loop reports nothing through this type: decode failures
/// are dropped lines, and transport failure is delivered as the state
/// transition to [`SessionState::Disconnected`](crate::SessionState).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session is disconnected; the write was not attempted.
    #[error("session is disconnected")]
    Disconnected,

    /// A protocol line could not be assembled (reserved delimiter in an
    /// identity field).
    #[error(transparent)]
    Protocol(#[from] parlor_protocol::ProtocolError),

    /// The transport failed. After a send failure the session has
    /// already transitioned to `Disconnected`.
    #[error(transparent)]
    Transport(#[from] parlor_transport::TransportError),
}
