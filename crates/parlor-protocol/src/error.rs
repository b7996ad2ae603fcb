//! Error types for the protocol layer.

/// Errors that can occur while decoding lines or assembling payloads.
///
/// Decode failures are never fatal to a connection: the session layer
/// drops the offending line and keeps reading.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The input line was empty or contained only whitespace.
    #[error("empty line")]
    EmptyLine,

    /// The line contains no `:` separating the type tag from the payload.
    #[error("missing ':' delimiter in line")]
    MissingDelimiter,

    /// The substring before the first `:` is not a known message type tag.
    #[error("unknown message type tag: {0}")]
    UnknownType(String),

    /// A payload field contains one of the reserved delimiter characters
    /// (`|`, `;`, `:`). The wire format has no escaping, so such a field
    /// is rejected up front rather than silently corrupting the line.
    #[error("field contains a reserved delimiter: {0:?}")]
    IllegalDelimiter(String),

    /// A structured payload (room list entry, player count, identifier)
    /// did not match its expected grammar.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The message is valid on the wire but violates the exchange rules
    /// — e.g., a connection whose first message is not `LOGIN`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
