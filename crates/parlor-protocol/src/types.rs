//! Core protocol types: identifiers, message tags, and message values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::join_fields;
use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user.
///
/// Newtype over `u64` so a `UserId` can't be confused with a [`RoomId`].
/// `Display` prints the raw number because identifiers are embedded in
/// wire payloads as plain digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(RoomId)
            .map_err(|_| ProtocolError::InvalidPayload(format!("bad room id: {s:?}")))
    }
}

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// Whether a room is still gathering players or already running a game.
///
/// The wire form is the SCREAMING_SNAKE token used in room list entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Waiting,
    Playing,
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "WAITING"),
            Self::Playing => write!(f, "PLAYING"),
        }
    }
}

impl FromStr for GameStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WAITING" => Ok(Self::Waiting),
            "PLAYING" => Ok(Self::Playing),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown game status: {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The fixed token set of wire message types.
///
/// The tag is everything before the first `:` on a line. Unknown tags are
/// rejected at decode time; the payload grammar for each tag is documented
/// on the corresponding [`Message`] constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Login,
    LoginSuccess,
    LoginFailed,
    RoomListRequest,
    RoomListResponse,
    RoomCreate,
    RoomCreateSuccess,
    RoomCreateFailed,
    RoomJoin,
    RoomJoinSuccess,
    RoomJoinFailed,
    RoomLeave,
    PlayerJoined,
    PlayerLeft,
    PlayerList,
    ChatMessage,
    SystemMessage,
    Error,
    Disconnect,
}

impl MessageType {
    /// All message types, in tag order. Used by tests and by
    /// [`MessageType::from_tag`].
    pub const ALL: [MessageType; 19] = [
        Self::Login,
        Self::LoginSuccess,
        Self::LoginFailed,
        Self::RoomListRequest,
        Self::RoomListResponse,
        Self::RoomCreate,
        Self::RoomCreateSuccess,
        Self::RoomCreateFailed,
        Self::RoomJoin,
        Self::RoomJoinSuccess,
        Self::RoomJoinFailed,
        Self::RoomLeave,
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::PlayerList,
        Self::ChatMessage,
        Self::SystemMessage,
        Self::Error,
        Self::Disconnect,
    ];

    /// Returns the wire tag for this message type.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::RoomListRequest => "ROOM_LIST_REQUEST",
            Self::RoomListResponse => "ROOM_LIST_RESPONSE",
            Self::RoomCreate => "ROOM_CREATE",
            Self::RoomCreateSuccess => "ROOM_CREATE_SUCCESS",
            Self::RoomCreateFailed => "ROOM_CREATE_FAILED",
            Self::RoomJoin => "ROOM_JOIN",
            Self::RoomJoinSuccess => "ROOM_JOIN_SUCCESS",
            Self::RoomJoinFailed => "ROOM_JOIN_FAILED",
            Self::RoomLeave => "ROOM_LEAVE",
            Self::PlayerJoined => "PLAYER_JOINED",
            Self::PlayerLeft => "PLAYER_LEFT",
            Self::PlayerList => "PLAYER_LIST",
            Self::ChatMessage => "CHAT_MESSAGE",
            Self::SystemMessage => "SYSTEM_MESSAGE",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    /// Looks up a message type by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.tag() == tag)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single protocol message: a type tag and an opaque payload string.
///
/// Immutable once constructed. The typed constructors below validate their
/// fields against the delimiter rules; [`Message::new`] performs no
/// validation (decode uses it, and the payload of a decoded message is
/// deliberately left unparsed — grammar conformance is the caller's
/// responsibility).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageType,
    pub payload: String,
}

impl Message {
    /// Creates a message from raw parts, without payload validation.
    pub fn new(kind: MessageType, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// `LOGIN:username|nickname`
    pub fn login(username: &str, nickname: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::Login, join_fields(&[username, nickname])?))
    }

    /// `LOGIN_SUCCESS:userId|nickname`
    pub fn login_success(user_id: UserId, nickname: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::LoginSuccess,
            join_fields(&[&user_id.to_string(), nickname])?,
        ))
    }

    /// `LOGIN_FAILED:reason`
    pub fn login_failed(reason: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::LoginFailed, join_fields(&[reason])?))
    }

    /// `ROOM_LIST_REQUEST:` (empty payload)
    pub fn room_list_request() -> Self {
        Self::new(MessageType::RoomListRequest, "")
    }

    /// `ROOM_LIST_RESPONSE:` with `;`-joined room entries.
    ///
    /// The summaries are assumed to already satisfy the field rules (room
    /// names are validated when the room is created).
    pub fn room_list_response(rooms: &[RoomSummary]) -> Self {
        let payload = rooms
            .iter()
            .map(RoomSummary::to_entry)
            .collect::<Vec<_>>()
            .join(";");
        Self::new(MessageType::RoomListResponse, payload)
    }

    /// `ROOM_CREATE:roomName|maxPlayers`
    pub fn room_create(room_name: &str, max_players: u32) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::RoomCreate,
            join_fields(&[room_name, &max_players.to_string()])?,
        ))
    }

    /// `ROOM_CREATE_SUCCESS:roomId|roomName`
    pub fn room_create_success(room_id: RoomId, room_name: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::RoomCreateSuccess,
            join_fields(&[&room_id.to_string(), room_name])?,
        ))
    }

    /// `ROOM_CREATE_FAILED:reason`
    pub fn room_create_failed(reason: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::RoomCreateFailed, join_fields(&[reason])?))
    }

    /// `ROOM_JOIN:roomId`
    pub fn room_join(room_id: RoomId) -> Self {
        Self::new(MessageType::RoomJoin, room_id.to_string())
    }

    /// `ROOM_JOIN_SUCCESS:roomId|roomName`
    pub fn room_join_success(room_id: RoomId, room_name: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::RoomJoinSuccess,
            join_fields(&[&room_id.to_string(), room_name])?,
        ))
    }

    /// `ROOM_JOIN_FAILED:reason`
    pub fn room_join_failed(reason: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::RoomJoinFailed, join_fields(&[reason])?))
    }

    /// `ROOM_LEAVE:` (empty payload)
    pub fn room_leave() -> Self {
        Self::new(MessageType::RoomLeave, "")
    }

    /// `PLAYER_JOINED:nickname`
    pub fn player_joined(nickname: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::PlayerJoined, join_fields(&[nickname])?))
    }

    /// `PLAYER_LEFT:nickname`
    pub fn player_left(nickname: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::PlayerLeft, join_fields(&[nickname])?))
    }

    /// `PLAYER_LIST:nick1|nick2|…`
    pub fn player_list<S: AsRef<str>>(nicknames: &[S]) -> Result<Self, ProtocolError> {
        let refs: Vec<&str> = nicknames.iter().map(AsRef::as_ref).collect();
        Ok(Self::new(MessageType::PlayerList, join_fields(&refs)?))
    }

    /// `CHAT_MESSAGE:nickname|message`
    pub fn chat(nickname: &str, text: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::ChatMessage, join_fields(&[nickname, text])?))
    }

    /// `SYSTEM_MESSAGE:message`
    pub fn system(text: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::SystemMessage, join_fields(&[text])?))
    }

    /// `ERROR:message`
    pub fn error(text: &str) -> Result<Self, ProtocolError> {
        Ok(Self::new(MessageType::Error, join_fields(&[text])?))
    }

    /// `DISCONNECT:` (empty payload)
    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect, "")
    }
}

// ---------------------------------------------------------------------------
// RoomSummary
// ---------------------------------------------------------------------------

/// One entry of a `ROOM_LIST_RESPONSE` payload.
///
/// Wire form: `roomId|roomName|current/max|status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_name: String,
    pub current_players: u32,
    pub max_players: u32,
    pub status: GameStatus,
}

impl RoomSummary {
    /// Formats this summary as a room list entry.
    pub fn to_entry(&self) -> String {
        format!(
            "{}|{}|{}/{}|{}",
            self.room_id, self.room_name, self.current_players, self.max_players, self.status
        )
    }

    /// Parses a single room list entry.
    pub fn from_entry(entry: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = entry.split('|').collect();
        let [id, name, count, status] = parts.as_slice() else {
            return Err(ProtocolError::InvalidPayload(format!(
                "room entry has {} fields, expected 4: {entry:?}",
                parts.len()
            )));
        };

        let (current, max) = count.split_once('/').ok_or_else(|| {
            ProtocolError::InvalidPayload(format!("bad player count: {count:?}"))
        })?;
        let parse_count = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| ProtocolError::InvalidPayload(format!("bad player count: {count:?}")))
        };

        Ok(Self {
            room_id: id.parse()?,
            room_name: (*name).to_string(),
            current_players: parse_count(current)?,
            max_players: parse_count(max)?,
            status: status.parse()?,
        })
    }

    /// Parses a full `ROOM_LIST_RESPONSE` payload. An empty payload is an
    /// empty list, not an error.
    pub fn parse_list(payload: &str) -> Result<Vec<Self>, ProtocolError> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        payload.split(';').map(Self::from_entry).collect()
    }
}

// =========================================================================
// Tests
// =========================================================================
