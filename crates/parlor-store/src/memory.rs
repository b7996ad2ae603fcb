//! In-memory store with per-room row locks and buffered transactions.
//!
//! Row locking is emulated with one async mutex per room identifier:
//! `select_room_for_update` takes that mutex and keeps it until the
//! transaction finishes, which serializes all capacity-affecting
//! transactions on the same room while leaving other rooms untouched.
//!
//! A transaction never mutates the shared tables directly. It buffers
//! write operations and, at commit, replays them onto a copy of the
//! committed tables — constraint checks included — then swaps the copy
//! in. Either every buffered write lands or none does.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{SystemTime, UNIX_EPOCH};

use parlor_protocol::{GameStatus, RoomId, UserId};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    MembershipRow, NewRoom, RoomRow, StoreError, StoreProvider, StoreSnapshot, StoreTx, UserRow,
};

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// The committed state: all three tables plus the identifier sequences.
#[derive(Debug, Clone)]
struct Tables {
    rooms: BTreeMap<RoomId, RoomRow>,
    /// Kept in insertion order; `joined_at` sequences follow it.
    members: Vec<MembershipRow>,
    users: BTreeMap<UserId, UserRow>,
    next_room_id: u64,
    next_user_id: u64,
    next_join_seq: u64,
}

impl Tables {
    fn new() -> Self {
        Self {
            rooms: BTreeMap::new(),
            members: Vec::new(),
            users: BTreeMap::new(),
            next_room_id: 1,
            next_user_id: 1,
            next_join_seq: 1,
        }
    }

    /// Applies one buffered write, enforcing the schema constraints.
    fn apply(&mut self, op: &WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::InsertRoom(row) => {
                if self.rooms.contains_key(&row.room_id) {
                    return Err(StoreError::Constraint(format!(
                        "duplicate room id {}",
                        row.room_id
                    )));
                }
                self.rooms.insert(row.room_id, row.clone());
            }
            WriteOp::UpdateRoomPlayers(room_id, count) => {
                let room = self.rooms.get_mut(room_id).ok_or_else(|| {
                    StoreError::Constraint(format!("room {room_id} does not exist"))
                })?;
                if *count > room.max_players {
                    return Err(StoreError::Constraint(format!(
                        "current_players {count} exceeds max_players {} for room {room_id}",
                        room.max_players
                    )));
                }
                room.current_players = *count;
            }
            WriteOp::InsertMembership(room_id, user_id) => {
                if !self.rooms.contains_key(room_id) {
                    return Err(StoreError::Constraint(format!(
                        "room {room_id} does not exist"
                    )));
                }
                if !self.users.contains_key(user_id) {
                    return Err(StoreError::Constraint(format!(
                        "user {user_id} does not exist"
                    )));
                }
                if self
                    .members
                    .iter()
                    .any(|m| m.room_id == *room_id && m.user_id == *user_id)
                {
                    return Err(StoreError::Constraint(format!(
                        "user {user_id} is already a member of room {room_id}"
                    )));
                }
                if self.members.iter().any(|m| m.user_id == *user_id) {
                    return Err(StoreError::Constraint(format!(
                        "user {user_id} is already in another room"
                    )));
                }
                self.members.push(MembershipRow {
                    room_id: *room_id,
                    user_id: *user_id,
                    joined_at: self.next_join_seq,
                });
                self.next_join_seq += 1;
            }
            WriteOp::DeleteMembership(room_id, user_id) => {
                // Deleting an absent row affects zero rows; not an error.
                self.members
                    .retain(|m| !(m.room_id == *room_id && m.user_id == *user_id));
            }
            WriteOp::InsertUser(row) => {
                if self.users.values().any(|u| u.username == row.username) {
                    return Err(StoreError::Constraint(format!(
                        "duplicate username {:?}",
                        row.username
                    )));
                }
                self.users.insert(row.user_id, row.clone());
            }
            WriteOp::UpdateUserNickname(user_id, nickname) => {
                let user = self.users.get_mut(user_id).ok_or_else(|| {
                    StoreError::Constraint(format!("user {user_id} does not exist"))
                })?;
                user.nickname = nickname.clone();
            }
        }
        Ok(())
    }
}

/// One buffered write operation.
#[derive(Debug, Clone)]
enum WriteOp {
    InsertRoom(RoomRow),
    UpdateRoomPlayers(RoomId, u32),
    InsertMembership(RoomId, UserId),
    DeleteMembership(RoomId, UserId),
    InsertUser(UserRow),
    UpdateUserNickname(UserId, String),
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

struct Shared {
    tables: StdMutex<Tables>,
    /// One lock per room identifier, created lazily. Entries for rooms
    /// that were never created are harmless: locking them just guards a
    /// row that `select_room_for_update` will report as absent.
    row_locks: StdMutex<HashMap<RoomId, Arc<AsyncMutex<()>>>>,
}

impl Shared {
    fn room_lock(&self, room_id: RoomId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.row_locks.lock().unwrap();
        Arc::clone(locks.entry(room_id).or_default())
    }
}

/// In-memory [`StoreProvider`]. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_tables(Tables::new())
    }

    /// Restores a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut tables = Tables::new();
        tables.rooms = snapshot.rooms.into_iter().map(|r| (r.room_id, r)).collect();
        tables.members = snapshot.members;
        tables.users = snapshot.users.into_iter().map(|u| (u.user_id, u)).collect();
        tables.next_room_id = snapshot.next_room_id;
        tables.next_user_id = snapshot.next_user_id;
        tables.next_join_seq = snapshot.next_join_seq;
        Self::with_tables(tables)
    }

    fn with_tables(tables: Tables) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: StdMutex::new(tables),
                row_locks: StdMutex::new(HashMap::new()),
            }),
        }
    }

    /// Takes a serializable image of the committed state.
    pub fn snapshot(&self) -> StoreSnapshot {
        let tables = self.shared.tables.lock().unwrap();
        StoreSnapshot {
            rooms: tables.rooms.values().cloned().collect(),
            members: tables.members.clone(),
            users: tables.users.values().cloned().collect(),
            next_room_id: tables.next_room_id,
            next_user_id: tables.next_user_id,
            next_join_seq: tables.next_join_seq,
        }
    }

    /// Writes a JSON snapshot to the given path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Loads a store from a JSON snapshot written by [`save_to`](Self::save_to).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_snapshot(serde_json::from_slice(&bytes)?))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreProvider for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            writes: Vec::new(),
            locks: Vec::new(),
            locked_rooms: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryTx
// ---------------------------------------------------------------------------

/// An open transaction against a [`MemoryStore`].
///
/// Dropping the transaction without committing is a rollback: the write
/// buffer is discarded and any held row locks are released.
pub struct MemoryTx {
    shared: Arc<Shared>,
    writes: Vec<WriteOp>,
    locks: Vec<OwnedMutexGuard<()>>,
    locked_rooms: Vec<RoomId>,
}

impl MemoryTx {
    /// The committed tables with this transaction's writes replayed on
    /// top — the state reads should observe. Writes that would violate a
    /// constraint at commit are skipped here; commit reports them.
    fn staged_view(&self) -> Tables {
        let mut view = self.shared.tables.lock().unwrap().clone();
        for op in &self.writes {
            let _ = view.apply(op);
        }
        view
    }
}

impl StoreTx for MemoryTx {
    async fn select_room(&mut self, room_id: RoomId) -> Result<Option<RoomRow>, StoreError> {
        Ok(self.staged_view().rooms.get(&room_id).cloned())
    }

    async fn select_room_for_update(
        &mut self,
        room_id: RoomId,
    ) -> Result<Option<RoomRow>, StoreError> {
        if !self.locked_rooms.contains(&room_id) {
            let lock = self.shared.room_lock(room_id);
            let guard = lock.lock_owned().await;
            self.locks.push(guard);
            self.locked_rooms.push(room_id);
            tracing::trace!(%room_id, "room row locked");
        }
        self.select_room(room_id).await
    }

    async fn insert_room(&mut self, room: NewRoom) -> Result<RoomId, StoreError> {
        let room_id = {
            let mut tables = self.shared.tables.lock().unwrap();
            let id = RoomId(tables.next_room_id);
            tables.next_room_id += 1;
            id
        };
        self.writes.push(WriteOp::InsertRoom(RoomRow {
            room_id,
            room_name: room.room_name,
            max_players: room.max_players,
            current_players: 0,
            game_status: GameStatus::Waiting,
            created_by: room.created_by,
            created_at: now_ms(),
        }));
        Ok(room_id)
    }

    async fn update_room_players(
        &mut self,
        room_id: RoomId,
        current_players: u32,
    ) -> Result<(), StoreError> {
        self.writes
            .push(WriteOp::UpdateRoomPlayers(room_id, current_players));
        Ok(())
    }

    async fn insert_membership(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        self.writes.push(WriteOp::InsertMembership(room_id, user_id));
        Ok(())
    }

    async fn delete_membership(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let exists = self
            .staged_view()
            .members
            .iter()
            .any(|m| m.room_id == room_id && m.user_id == user_id);
        if exists {
            self.writes.push(WriteOp::DeleteMembership(room_id, user_id));
        }
        Ok(exists)
    }

    async fn membership_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<RoomId>, StoreError> {
        Ok(self
            .staged_view()
            .members
            .iter()
            .find(|m| m.user_id == user_id)
            .map(|m| m.room_id))
    }

    async fn list_rooms(&mut self) -> Result<Vec<RoomRow>, StoreError> {
        // Room identifiers are a monotonic sequence, so descending id
        // order is newest-first.
        Ok(self.staged_view().rooms.into_values().rev().collect())
    }

    async fn list_members(
        &mut self,
        room_id: RoomId,
    ) -> Result<Vec<(MembershipRow, UserRow)>, StoreError> {
        let view = self.staged_view();
        let mut rows = Vec::new();
        for member in view.members.iter().filter(|m| m.room_id == room_id) {
            let user = view.users.get(&member.user_id).ok_or_else(|| {
                StoreError::Constraint(format!(
                    "membership references missing user {}",
                    member.user_id
                ))
            })?;
            rows.push((member.clone(), user.clone()));
        }
        Ok(rows)
    }

    async fn upsert_user(
        &mut self,
        username: &str,
        nickname: &str,
    ) -> Result<UserId, StoreError> {
        let existing = self
            .staged_view()
            .users
            .into_values()
            .find(|u| u.username == username);
        if let Some(user) = existing {
            if user.nickname != nickname {
                self.writes.push(WriteOp::UpdateUserNickname(
                    user.user_id,
                    nickname.to_string(),
                ));
            }
            return Ok(user.user_id);
        }

        let user_id = {
            let mut tables = self.shared.tables.lock().unwrap();
            let id = UserId(tables.next_user_id);
            tables.next_user_id += 1;
            id
        };
        self.writes.push(WriteOp::InsertUser(UserRow {
            user_id,
            username: username.to_string(),
            nickname: nickname.to_string(),
        }));
        Ok(user_id)
    }

    async fn commit(self) -> Result<(), StoreError> {
        let mut tables = self.shared.tables.lock().unwrap();
        let mut staged = tables.clone();
        for op in &self.writes {
            staged.apply(op)?;
        }
        *tables = staged;
        tracing::trace!(writes = self.writes.len(), "transaction committed");
        Ok(())
        // Row locks in `self.locks` release here.
    }

    async fn rollback(self) {
        tracing::trace!(writes = self.writes.len(), "transaction rolled back");
        // Dropping self discards the buffer and releases row locks.
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// =========================================================================
// Tests
// =========================================================================
