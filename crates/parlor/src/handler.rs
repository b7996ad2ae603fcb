//! Per-connection handler: login, message routing, and room fan-out.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `LOGIN` (anything else is rejected) → register the user
//!   2. Send `LOGIN_SUCCESS` with the assigned user id
//!   3. Loop: read lines → decode → react by invoking registry
//!      operations and encoding replies; bad lines are dropped
//!   4. On exit — clean `DISCONNECT`, EOF, or I/O failure — a drop guard
//!      leaves the user's room and deregisters the peer

use std::collections::HashMap;
use std::sync::Arc;

use parlor_protocol::{
    self as protocol, Message, MessageType, ProtocolError, RoomId, UserId,
};
use parlor_room::{Member, RoomError, RoomRegistry};
use parlor_store::StoreProvider;
use parlor_transport::{Connection, TcpLineConnection};
use tokio::sync::Mutex;

use crate::ParlorError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<P: StoreProvider> {
    pub(crate) registry: RoomRegistry<P>,
    /// Connected peers, keyed by user id. `room` mirrors the registry's
    /// membership for routing; the registry remains the source of truth.
    pub(crate) peers: Mutex<HashMap<UserId, Peer>>,
}

/// One connected peer.
pub(crate) struct Peer {
    conn: Arc<TcpLineConnection>,
    nickname: String,
    room: Option<RoomId>,
}

/// Drop guard that deregisters a peer when its handler exits.
///
/// Cleanup must happen even if the handler errors out mid-reply. Since
/// `Drop` is synchronous, the async part runs on a fire-and-forget task.
struct PeerGuard<P: StoreProvider> {
    user_id: UserId,
    state: Arc<ServerState<P>>,
}

impl<P: StoreProvider> Drop for PeerGuard<P> {
    fn drop(&mut self) {
        let user_id = self.user_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            remove_peer(&state, user_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<P: StoreProvider>(
    conn: TcpLineConnection,
    state: Arc<ServerState<P>>,
) -> Result<(), ParlorError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    // --- Step 1: login ---
    let (user_id, nickname) = perform_login(&conn, &state).await?;
    let _guard = PeerGuard {
        user_id,
        state: Arc::clone(&state),
    };
    send(&conn, &Message::login_success(user_id, &nickname)?).await?;
    tracing::info!(%conn_id, %user_id, "user logged in");

    // --- Step 2: message loop ---
    loop {
        let line = match conn.recv_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::debug!(%user_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%user_id, error = %e, "recv error");
                break;
            }
        };

        let msg = match protocol::decode(&line) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%user_id, error = %e, line = %line, "dropped bad line");
                continue;
            }
        };

        if handle_message(&conn, &state, user_id, msg).await? {
            break;
        }
    }

    // _guard drops here → peer deregistration fires.
    Ok(())
}

/// Receives and validates the login line, registers the user, and
/// inserts the peer into the routing map.
async fn perform_login<P: StoreProvider>(
    conn: &Arc<TcpLineConnection>,
    state: &Arc<ServerState<P>>,
) -> Result<(UserId, String), ParlorError> {
    let Some(line) = conn.recv_line().await? else {
        return Err(ProtocolError::InvalidMessage(
            "connection closed before login".into(),
        )
        .into());
    };

    let msg = match protocol::decode(&line) {
        Ok(msg) if msg.kind == MessageType::Login => msg,
        Ok(msg) => {
            reject_login(conn, "first message must be LOGIN").await;
            return Err(ProtocolError::InvalidMessage(format!(
                "expected LOGIN, got {}",
                msg.kind
            ))
            .into());
        }
        Err(e) => {
            reject_login(conn, "malformed login").await;
            return Err(e.into());
        }
    };

    let fields = protocol::split_fields(&msg.payload);
    if fields.len() != 2 || fields[0].is_empty() || fields[1].is_empty() {
        reject_login(conn, "login expects username|nickname").await;
        return Err(ProtocolError::InvalidMessage("bad login payload".into()).into());
    }
    let (username, nickname) = (fields[0], fields[1]);

    let user_id = match state.registry.register_user(username, nickname).await {
        Ok(user_id) => user_id,
        Err(e) => {
            reject_login(conn, failure_reason(&e)).await;
            return Err(e.into());
        }
    };

    {
        let mut peers = state.peers.lock().await;
        if peers.contains_key(&user_id) {
            drop(peers);
            reject_login(conn, "user already connected").await;
            return Err(ProtocolError::InvalidMessage(format!(
                "user {user_id} already connected"
            ))
            .into());
        }
        peers.insert(
            user_id,
            Peer {
                conn: Arc::clone(conn),
                nickname: nickname.to_string(),
                room: None,
            },
        );
    }

    Ok((user_id, nickname.to_string()))
}

/// Best-effort `LOGIN_FAILED` reply, then close.
async fn reject_login(conn: &TcpLineConnection, reason: &str) {
    if let Ok(msg) = Message::login_failed(reason) {
        let _ = conn.send_line(&protocol::encode(&msg)).await;
    }
    let _ = conn.close().await;
}

/// Dispatches one decoded client message. Returns `true` when the client
/// asked to disconnect.
async fn handle_message<P: StoreProvider>(
    conn: &Arc<TcpLineConnection>,
    state: &Arc<ServerState<P>>,
    user_id: UserId,
    msg: Message,
) -> Result<bool, ParlorError> {
    match msg.kind {
        MessageType::RoomListRequest => match state.registry.room_summaries().await {
            Ok(summaries) => send(conn, &Message::room_list_response(&summaries)).await?,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "room list failed");
                send(conn, &Message::error("room list unavailable")?).await?;
            }
        },
        MessageType::RoomCreate => handle_room_create(conn, state, user_id, &msg).await?,
        MessageType::RoomJoin => handle_room_join(conn, state, user_id, &msg).await?,
        MessageType::RoomLeave => handle_room_leave(conn, state, user_id).await?,
        MessageType::ChatMessage => handle_chat(conn, state, user_id, &msg).await?,
        MessageType::Disconnect => {
            tracing::debug!(%user_id, "client disconnecting");
            return Ok(true);
        }
        other => {
            tracing::debug!(%user_id, kind = %other, "unexpected message from client");
            send(conn, &Message::error("unexpected message")?).await?;
        }
    }
    Ok(false)
}

/// `ROOM_CREATE:roomName|maxPlayers`
async fn handle_room_create<P: StoreProvider>(
    conn: &Arc<TcpLineConnection>,
    state: &Arc<ServerState<P>>,
    user_id: UserId,
    msg: &Message,
) -> Result<(), ParlorError> {
    let fields = protocol::split_fields(&msg.payload);
    let parsed = match fields[..] {
        [name, max] => max.parse::<u32>().ok().map(|max| (name, max)),
        _ => None,
    };
    let Some((name, max_players)) = parsed else {
        send(conn, &Message::room_create_failed("malformed create request")?).await?;
        return Ok(());
    };

    match state.registry.create_room(name, max_players, user_id).await {
        Ok(room_id) => {
            send(conn, &Message::room_create_success(room_id, name)?).await?;
        }
        Err(e) => {
            tracing::debug!(%user_id, error = %e, "room create failed");
            send(conn, &Message::room_create_failed(failure_reason(&e))?).await?;
        }
    }
    Ok(())
}

/// `ROOM_JOIN:roomId`
async fn handle_room_join<P: StoreProvider>(
    conn: &Arc<TcpLineConnection>,
    state: &Arc<ServerState<P>>,
    user_id: UserId,
    msg: &Message,
) -> Result<(), ParlorError> {
    let Ok(room_id) = msg.payload.parse::<RoomId>() else {
        send(conn, &Message::room_join_failed("malformed room id")?).await?;
        return Ok(());
    };

    match state.registry.join_room(room_id, user_id).await {
        Ok(room) => {
            let nickname = {
                let mut peers = state.peers.lock().await;
                let Some(peer) = peers.get_mut(&user_id) else {
                    // Handler teardown raced the join; membership will be
                    // cleaned up by the guard.
                    return Ok(());
                };
                peer.room = Some(room_id);
                peer.nickname.clone()
            };

            send(conn, &Message::room_join_success(room_id, &room.room_name)?).await?;

            let members = room_members(state, room_id).await;
            send_to_members(state, &members, &Message::player_joined(&nickname)?, Some(user_id))
                .await;
            broadcast_roster(state, &members).await;
        }
        Err(e) => {
            tracing::debug!(%user_id, %room_id, error = %e, "join failed");
            send(conn, &Message::room_join_failed(failure_reason(&e))?).await?;
        }
    }
    Ok(())
}

/// `ROOM_LEAVE:` — leave the current room and notify the remaining members.
async fn handle_room_leave<P: StoreProvider>(
    conn: &Arc<TcpLineConnection>,
    state: &Arc<ServerState<P>>,
    user_id: UserId,
) -> Result<(), ParlorError> {
    let (room_id, nickname) = {
        let peers = state.peers.lock().await;
        match peers.get(&user_id) {
            Some(peer) => (peer.room, peer.nickname.clone()),
            None => (None, String::new()),
        }
    };
    let Some(room_id) = room_id else {
        send(conn, &Message::error("not in a room")?).await?;
        return Ok(());
    };

    match state.registry.leave_room(room_id, user_id).await {
        Ok(_) => {
            if let Some(peer) = state.peers.lock().await.get_mut(&user_id) {
                peer.room = None;
            }
            send(conn, &Message::system("left room")?).await?;

            let members = room_members(state, room_id).await;
            send_to_members(state, &members, &Message::player_left(&nickname)?, None).await;
            broadcast_roster(state, &members).await;
        }
        Err(e) => {
            tracing::debug!(%user_id, %room_id, error = %e, "leave failed");
            if matches!(e, RoomError::MembershipNotFound(_, _)) {
                // The routing map was ahead of the registry; resync it.
                if let Some(peer) = state.peers.lock().await.get_mut(&user_id) {
                    peer.room = None;
                }
            }
            send(conn, &Message::error(failure_reason(&e))?).await?;
        }
    }
    Ok(())
}

/// `CHAT_MESSAGE:nickname|message` — relay to every member of the
/// sender's room, with the server-side nickname as the authoritative one.
async fn handle_chat<P: StoreProvider>(
    conn: &Arc<TcpLineConnection>,
    state: &Arc<ServerState<P>>,
    user_id: UserId,
    msg: &Message,
) -> Result<(), ParlorError> {
    let (room_id, nickname) = {
        let peers = state.peers.lock().await;
        match peers.get(&user_id) {
            Some(peer) => (peer.room, peer.nickname.clone()),
            None => (None, String::new()),
        }
    };
    let Some(room_id) = room_id else {
        send(conn, &Message::error("not in a room")?).await?;
        return Ok(());
    };

    let fields = protocol::split_fields(&msg.payload);
    let text = fields.last().copied().unwrap_or("");

    match Message::chat(&nickname, text) {
        Ok(chat) => {
            let members = room_members(state, room_id).await;
            send_to_members(state, &members, &chat, None).await;
        }
        Err(_) => {
            send(conn, &Message::error("message contains reserved characters")?).await?;
        }
    }
    Ok(())
}

/// Removes a peer from the routing map, leaving its room on the way out.
async fn remove_peer<P: StoreProvider>(state: &Arc<ServerState<P>>, user_id: UserId) {
    let Some(peer) = state.peers.lock().await.remove(&user_id) else {
        return;
    };

    if let Some(room_id) = peer.room {
        match state.registry.leave_room(room_id, user_id).await {
            Ok(_) => {
                let members = room_members(state, room_id).await;
                if let Ok(msg) = Message::player_left(&peer.nickname) {
                    send_to_members(state, &members, &msg, None).await;
                }
                broadcast_roster(state, &members).await;
            }
            Err(e) => {
                tracing::debug!(%user_id, %room_id, error = %e, "cleanup leave failed");
            }
        }
    }

    let _ = peer.conn.close().await;
    tracing::debug!(%user_id, "peer deregistered");
}

/// Current members of a room, or empty (logged) when the lookup fails.
async fn room_members<P: StoreProvider>(
    state: &Arc<ServerState<P>>,
    room_id: RoomId,
) -> Vec<Member> {
    match state.registry.list_members(room_id).await {
        Ok(members) => members,
        Err(e) => {
            tracing::debug!(%room_id, error = %e, "member lookup failed");
            Vec::new()
        }
    }
}

/// Sends one message to every listed member with a live connection.
/// Connections are collected under the lock, written outside it.
async fn send_to_members<P: StoreProvider>(
    state: &Arc<ServerState<P>>,
    members: &[Member],
    msg: &Message,
    except: Option<UserId>,
) {
    let targets: Vec<(UserId, Arc<TcpLineConnection>)> = {
        let peers = state.peers.lock().await;
        members
            .iter()
            .filter(|member| Some(member.user_id) != except)
            .filter_map(|member| {
                peers
                    .get(&member.user_id)
                    .map(|peer| (member.user_id, Arc::clone(&peer.conn)))
            })
            .collect()
    };

    let line = protocol::encode(msg);
    for (peer_id, conn) in targets {
        if let Err(e) = conn.send_line(&line).await {
            tracing::debug!(%peer_id, error = %e, "skipping unreachable peer");
        }
    }
}

/// Sends the room roster (`PLAYER_LIST`) to all listed members.
async fn broadcast_roster<P: StoreProvider>(state: &Arc<ServerState<P>>, members: &[Member]) {
    let nicknames: Vec<&str> = members.iter().map(|m| m.nickname.as_str()).collect();
    match Message::player_list(&nicknames) {
        Ok(msg) => send_to_members(state, members, &msg, None).await,
        Err(e) => tracing::debug!(error = %e, "roster not broadcast"),
    }
}

/// Maps a registry failure to a wire-safe reason string.
fn failure_reason(err: &RoomError) -> &'static str {
    match err {
        RoomError::NotFound(_) => "room not found",
        RoomError::RoomFull(_) => "room is full",
        RoomError::MembershipNotFound(_, _) => "not a member of this room",
        RoomError::AlreadyInRoom(_, _) => "already in a room",
        RoomError::InvalidCapacity(_) => "invalid capacity",
        RoomError::InvalidName(_) => "name contains reserved characters",
        RoomError::Store(_) => "store unavailable",
    }
}

/// Encodes and writes one message to a single connection.
async fn send(conn: &TcpLineConnection, msg: &Message) -> Result<(), ParlorError> {
    conn.send_line(&protocol::encode(msg)).await?;
    Ok(())
}
