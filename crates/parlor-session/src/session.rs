//! The client session: connect, send, background receive loop, disconnect.

use std::sync::{Arc, OnceLock};

use parlor_protocol::{Message, UserId};
use parlor_transport::{Connection, TcpLineConnection};

use crate::listener::ListenerSet;
use crate::state::StateCell;
use crate::{ListenerId, MessageListener, SessionError, SessionState};

/// The identity a session logs in with. The user identifier is assigned
/// by the server and attached later via [`Session::set_user_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub nickname: String,
}

impl Identity {
    pub fn new(username: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            nickname: nickname.into(),
        }
    }
}

/// One live client↔server connection.
///
/// The caller owns the `Session`; the background receive task only holds
/// the shared internals (connection, state cell, listener set) and exits
/// on its own once the state turns `Disconnected` or the stream ends.
pub struct Session {
    conn: Arc<TcpLineConnection>,
    identity: Identity,
    user_id: OnceLock<UserId>,
    state: Arc<StateCell>,
    listeners: Arc<ListenerSet>,
    first_listener_id: Option<ListenerId>,
}

impl Session {
    /// Opens the transport, sends the login line, and starts the receive
    /// loop. Returns with state `Authenticated` — the server's reply is
    /// not awaited; it arrives through the listeners like any message.
    ///
    /// On failure nothing is left behind: no task, no open connection.
    pub async fn connect(addr: &str, identity: Identity) -> Result<Self, SessionError> {
        Self::connect_inner(addr, identity, None).await
    }

    /// Like [`connect`](Self::connect), but registers a listener before
    /// the receive loop starts, so even the very first server reply is
    /// dispatched to it.
    pub async fn connect_with_listener(
        addr: &str,
        identity: Identity,
        listener: impl MessageListener,
    ) -> Result<(Self, ListenerId), SessionError> {
        let session = Self::connect_inner(addr, identity, Some(Box::new(listener))).await?;
        let id = session
            .first_listener_id
            .expect("connect_inner registers the listener");
        Ok((session, id))
    }

    async fn connect_inner(
        addr: &str,
        identity: Identity,
        listener: Option<Box<dyn MessageListener>>,
    ) -> Result<Self, SessionError> {
        let login = Message::login(&identity.username, &identity.nickname)?;

        let conn = Arc::new(TcpLineConnection::connect(addr).await?);
        let listeners = Arc::new(ListenerSet::new());
        let first_listener_id = listener.map(|l| listeners.add(l));

        conn.send_line(&parlor_protocol::encode(&login)).await?;

        let state = Arc::new(StateCell::new(SessionState::Connecting));
        state.transition(SessionState::Connecting, SessionState::Authenticated);

        tokio::spawn(receive_loop(
            Arc::clone(&conn),
            Arc::clone(&state),
            Arc::clone(&listeners),
        ));

        tracing::info!(
            id = %conn.id(),
            username = %identity.username,
            "session connected"
        );

        Ok(Self {
            conn,
            identity,
            user_id: OnceLock::new(),
            state,
            listeners,
            first_listener_id,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// The identity this session logged in with.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The server-assigned user id, once known.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id.get().copied()
    }

    /// Records the server-assigned user id. Set-once; returns whether
    /// this call was the one that set it.
    pub fn set_user_id(&self, user_id: UserId) -> bool {
        self.user_id.set(user_id).is_ok()
    }

    /// Registers a listener; it will see messages dispatched after this
    /// call, in registration order relative to other listeners.
    pub fn add_listener(&self, listener: impl MessageListener) -> ListenerId {
        self.listeners.add(Box::new(listener))
    }

    /// Removes a listener. Must not be called from within a dispatch.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Encodes and writes one message.
    ///
    /// While disconnected this is a no-op reported as
    /// [`SessionError::Disconnected`]. Writes are serialized by the
    /// connection itself. A transport write failure is fatal: the
    /// session disconnects, then the error is returned.
    pub async fn send(&self, msg: &Message) -> Result<(), SessionError> {
        if self.state.load() == SessionState::Disconnected {
            return Err(SessionError::Disconnected);
        }
        if let Err(e) = self.conn.send_line(&parlor_protocol::encode(msg)).await {
            tracing::debug!(id = %self.conn.id(), error = %e, "send failed, disconnecting");
            shutdown(&self.conn, &self.state).await;
            return Err(SessionError::Transport(e));
        }
        Ok(())
    }

    /// Disconnects the session. Idempotent and safe to race with the
    /// receive loop's own failure-triggered disconnect: only the first
    /// caller performs teardown, later calls are no-ops.
    pub async fn disconnect(&self) {
        shutdown(&self.conn, &self.state).await;
    }

    /// Records a confirmed room join (`Authenticated → InRoom`).
    /// Returns `false` when the session is not in `Authenticated`.
    pub fn mark_in_room(&self) -> bool {
        self.state
            .transition(SessionState::Authenticated, SessionState::InRoom)
    }

    /// Records a confirmed room leave (`InRoom → Authenticated`).
    pub fn mark_lobby(&self) -> bool {
        self.state
            .transition(SessionState::InRoom, SessionState::Authenticated)
    }
}

/// Teardown shared by `disconnect()` and the receive loop.
///
/// The state flips to `Disconnected` FIRST, so the loop condition exits
/// naturally; every following step is best-effort so a failure in one
/// cannot skip the rest.
async fn shutdown(conn: &TcpLineConnection, state: &StateCell) {
    if state.disconnect() == SessionState::Disconnected {
        return;
    }
    if let Err(e) = conn
        .send_line(&parlor_protocol::encode(&Message::disconnect()))
        .await
    {
        tracing::debug!(id = %conn.id(), error = %e, "disconnect notice not delivered");
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(id = %conn.id(), error = %e, "transport close failed");
    }
    tracing::info!(id = %conn.id(), "session disconnected");
}

/// The message pump: one blocking read at a time, for the lifetime of
/// the session.
async fn receive_loop(
    conn: Arc<TcpLineConnection>,
    state: Arc<StateCell>,
    listeners: Arc<ListenerSet>,
) {
    loop {
        if state.load() == SessionState::Disconnected {
            break;
        }
        match conn.recv_line().await {
            Ok(Some(line)) => match parlor_protocol::decode(&line) {
                // Dispatch synchronously: per-connection arrival order is
                // exactly listener order.
                Ok(msg) => listeners.dispatch(&msg),
                Err(e) => {
                    tracing::debug!(id = %conn.id(), error = %e, line = %line, "dropped bad line");
                }
            },
            Ok(None) => {
                tracing::debug!(id = %conn.id(), "stream ended");
                break;
            }
            Err(e) => {
                if state.load() != SessionState::Disconnected {
                    tracing::debug!(id = %conn.id(), error = %e, "receive failed");
                }
                break;
            }
        }
    }
    shutdown(&conn, &state).await;
}
