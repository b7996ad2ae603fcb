//! Line codec: between a [`Message`] value and a single protocol line.
//!
//! Encoding is infallible — a `Message` always has a valid tag, and its
//! payload is carried verbatim. Decoding is strict about the frame
//! (`<TYPE>:<payload>`) and deliberately lax about the payload: everything
//! after the FIRST `:` is kept as-is, unparsed and unvalidated. Type
//! specific grammar checks belong to the caller.

use crate::types::{Message, MessageType};
use crate::ProtocolError;

/// Characters that cannot appear inside a payload field because the wire
/// format performs no escaping.
const RESERVED: [char; 3] = ['|', ';', ':'];

/// Encodes a message as a protocol line (without the trailing newline).
pub fn encode(msg: &Message) -> String {
    format!("{}:{}", msg.kind.tag(), msg.payload)
}

/// Decodes one protocol line into a message.
///
/// Fails with [`ProtocolError::EmptyLine`] on empty/blank input,
/// [`ProtocolError::MissingDelimiter`] when the line has no `:`, and
/// [`ProtocolError::UnknownType`] when the tag is not recognized. The
/// payload is everything after the first `:`, returned verbatim.
pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    if line.trim().is_empty() {
        return Err(ProtocolError::EmptyLine);
    }
    let (tag, payload) = line.split_once(':').ok_or(ProtocolError::MissingDelimiter)?;
    let kind = MessageType::from_tag(tag)
        .ok_or_else(|| ProtocolError::UnknownType(tag.to_string()))?;
    Ok(Message::new(kind, payload))
}

/// Joins payload fields with `|`, rejecting any field that contains a
/// reserved delimiter character.
pub fn join_fields(fields: &[&str]) -> Result<String, ProtocolError> {
    for field in fields {
        if field.contains(RESERVED) {
            return Err(ProtocolError::IllegalDelimiter((*field).to_string()));
        }
    }
    Ok(fields.join("|"))
}

/// Splits a payload into its `|`-separated fields.
///
/// An empty payload yields no fields (rather than one empty field), so
/// `split_fields(&join_fields(&[])?)` is the empty list again.
pub fn split_fields(payload: &str) -> Vec<&str> {
    if payload.is_empty() {
        Vec::new()
    } else {
        payload.split('|').collect()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RoomId, UserId};

    #[test]
    fn test_encode_chat_message_exact_line() {
        let msg = Message::chat("alice", "hello").unwrap();
        assert_eq!(encode(&msg), "CHAT_MESSAGE:alice|hello");
        assert_eq!(decode("CHAT_MESSAGE:alice|hello").unwrap(), msg);
    }

    #[test]
    fn test_round_trip_every_constructible_message() {
        let messages = vec![
            Message::login("alice01", "Alice").unwrap(),
            Message::login_success(UserId(7), "Alice").unwrap(),
            Message::login_failed("name taken").unwrap(),
            Message::room_list_request(),
            Message::room_list_response(&[]),
            Message::room_create("parlor one", 6).unwrap(),
            Message::room_create_success(RoomId(1), "parlor one").unwrap(),
            Message::room_create_failed("bad capacity").unwrap(),
            Message::room_join(RoomId(1)),
            Message::room_join_success(RoomId(1), "parlor one").unwrap(),
            Message::room_join_failed("room is full").unwrap(),
            Message::room_leave(),
            Message::player_joined("Alice").unwrap(),
            Message::player_left("Alice").unwrap(),
            Message::player_list(&["Alice", "Bob"]).unwrap(),
            Message::chat("Alice", "good evening").unwrap(),
            Message::system("game starting").unwrap(),
            Message::error("unexpected message").unwrap(),
            Message::disconnect(),
        ];
        for msg in messages {
            assert_eq!(decode(&encode(&msg)).unwrap(), msg, "round trip for {}", msg.kind);
        }
    }

    #[test]
    fn test_decode_empty_line_fails() {
        assert!(matches!(decode(""), Err(ProtocolError::EmptyLine)));
        assert!(matches!(decode("   "), Err(ProtocolError::EmptyLine)));
    }

    #[test]
    fn test_decode_without_delimiter_fails() {
        assert!(matches!(
            decode("NOCOLONHERE"),
            Err(ProtocolError::MissingDelimiter)
        ));
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        let err = decode("BOGUS_TYPE:x").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(tag) if tag == "BOGUS_TYPE"));
    }

    #[test]
    fn test_decode_splits_at_first_colon_only() {
        // Payload content after the first ':' is opaque to the codec, even
        // when it contains further colons.
        let msg = decode("SYSTEM_MESSAGE:a:b:c").unwrap();
        assert_eq!(msg.kind, MessageType::SystemMessage);
        assert_eq!(msg.payload, "a:b:c");
    }

    #[test]
    fn test_decode_keeps_payload_unvalidated() {
        // Grammar conformance is the caller's job: a LOGIN payload with
        // too few fields still decodes.
        let msg = decode("LOGIN:justausername").unwrap();
        assert_eq!(msg.kind, MessageType::Login);
        assert_eq!(msg.payload, "justausername");
    }

    #[test]
    fn test_decode_empty_payload() {
        let msg = decode("ROOM_LEAVE:").unwrap();
        assert_eq!(msg.kind, MessageType::RoomLeave);
        assert_eq!(msg.payload, "");
    }

    #[test]
    fn test_join_fields_rejects_reserved_characters() {
        for bad in ["a|b", "a;b", "a:b"] {
            assert!(matches!(
                join_fields(&["ok", bad]),
                Err(ProtocolError::IllegalDelimiter(_))
            ));
        }
    }

    #[test]
    fn test_split_fields_inverse_of_join() {
        assert_eq!(split_fields("a|b|c"), vec!["a", "b", "c"]);
        assert!(split_fields("").is_empty());
        // A single field with no separator is one field.
        assert_eq!(split_fields("solo"), vec!["solo"]);
    }
}
