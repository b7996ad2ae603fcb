//! Wire protocol for Parlor.
//!
//! This crate defines the "language" that lobby clients and servers speak:
//!
//! - **Types** ([`Message`], [`MessageType`], [`RoomSummary`], identifier
//!   newtypes): the values that travel on the wire.
//! - **Codec** ([`codec::encode`], [`codec::decode`]): how those values
//!   are converted to and from protocol lines.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding,
//!   decoding, or assembling payloads.
//!
//! # Wire format
//!
//! One message per line, UTF-8, newline-terminated:
//!
//! ```text
//! <TYPE>:<payload>
//! ```
//!
//! The payload uses `|` as an inner field separator and `;` between
//! repeated groups. There is NO escaping of delimiter characters — a field
//! containing `|`, `;`, or `:` would corrupt the line. Changing that would
//! break wire compatibility, so the payload builders reject such fields
//! with [`ProtocolError::IllegalDelimiter`] instead of escaping them.
//!
//! The protocol layer sits between the transport (raw lines) and the
//! session (connection lifecycle). It knows nothing about sockets or rooms
//! — it only maps between [`Message`] values and text lines.

mod codec;
mod error;
mod types;

pub use codec::{decode, encode, join_fields, split_fields};
pub use error::ProtocolError;
pub use types::{
    GameStatus, Message, MessageType, RoomId, RoomSummary, UserId,
};
