//! The room registry: catalog CRUD and transactional membership changes.

use parlor_protocol::{RoomId, RoomSummary, UserId};
use parlor_store::{NewRoom, RoomRow, StoreProvider, StoreTx};

use crate::RoomError;

/// One member of a room, in join order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub nickname: String,
}

/// Converts a stored room row into its wire summary form.
pub fn room_summary(row: &RoomRow) -> RoomSummary {
    RoomSummary {
        room_id: row.room_id,
        room_name: row.room_name.clone(),
        current_players: row.current_players,
        max_players: row.max_players,
        status: row.game_status,
    }
}

/// Stateless façade over the persistent room catalog.
///
/// Each operation opens its own transaction. Early business-rule failures
/// roll the transaction back explicitly; error propagation with `?` drops
/// the transaction, which is also a rollback. Either way no partial
/// mutation survives.
pub struct RoomRegistry<P: StoreProvider> {
    store: P,
}

impl<P: StoreProvider> RoomRegistry<P> {
    /// Creates a registry over the given store provider.
    pub fn new(store: P) -> Self {
        Self { store }
    }

    /// Registers (or refreshes) a user and returns their identifier.
    ///
    /// Login pass-through: accounts are not managed here beyond the
    /// username/nickname pair the wire protocol carries.
    pub async fn register_user(
        &self,
        username: &str,
        nickname: &str,
    ) -> Result<UserId, RoomError> {
        wire_safe(username)?;
        wire_safe(nickname)?;
        let mut tx = self.store.begin().await?;
        let user_id = tx.upsert_user(username, nickname).await?;
        tx.commit().await?;
        tracing::debug!(%user_id, username, "user registered");
        Ok(user_id)
    }

    /// Lists all rooms, newest first.
    pub async fn list_rooms(&self) -> Result<Vec<RoomRow>, RoomError> {
        let mut tx = self.store.begin().await?;
        let rooms = tx.list_rooms().await?;
        tx.commit().await?;
        Ok(rooms)
    }

    /// Lists all rooms as wire summaries, newest first.
    pub async fn room_summaries(&self) -> Result<Vec<RoomSummary>, RoomError> {
        Ok(self.list_rooms().await?.iter().map(room_summary).collect())
    }

    /// Looks up a single room.
    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomRow, RoomError> {
        let mut tx = self.store.begin().await?;
        let room = tx.select_room(room_id).await?;
        tx.commit().await?;
        room.ok_or(RoomError::NotFound(room_id))
    }

    /// Creates a room and returns its generated identifier.
    pub async fn create_room(
        &self,
        room_name: &str,
        max_players: u32,
        created_by: UserId,
    ) -> Result<RoomId, RoomError> {
        if max_players == 0 {
            return Err(RoomError::InvalidCapacity(max_players));
        }
        wire_safe(room_name)?;

        let mut tx = self.store.begin().await?;
        let room_id = tx
            .insert_room(NewRoom {
                room_name: room_name.to_string(),
                max_players,
                created_by,
            })
            .await?;
        tx.commit().await?;
        tracing::info!(%room_id, room_name, max_players, "room created");
        Ok(room_id)
    }

    /// Adds a user to a room, atomically: the room row is read and its
    /// counter updated under the room's exclusive lock, held until the
    /// transaction finishes. Returns the room row as of after the join.
    ///
    /// Failure leaves no trace: a full or missing room releases the lock
    /// with no mutation, and a store failure rolls back the membership
    /// insert together with the counter update.
    pub async fn join_room(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<RoomRow, RoomError> {
        let mut tx = self.store.begin().await?;

        let Some(mut room) = tx.select_room_for_update(room_id).await? else {
            tx.rollback().await;
            return Err(RoomError::NotFound(room_id));
        };
        if room.current_players >= room.max_players {
            tx.rollback().await;
            return Err(RoomError::RoomFull(room_id));
        }
        if let Some(occupied) = tx.membership_for_user(user_id).await? {
            tx.rollback().await;
            return Err(RoomError::AlreadyInRoom(user_id, occupied));
        }

        tx.insert_membership(room_id, user_id).await?;
        room.current_players += 1;
        tx.update_room_players(room_id, room.current_players).await?;
        tx.commit().await?;

        tracing::info!(
            %room_id,
            %user_id,
            players = room.current_players,
            "user joined room"
        );
        Ok(room)
    }

    /// Removes a user from a room: delete-if-exists, decrement-if-deleted,
    /// as one transaction under the room's lock. The counter is updated
    /// only when a membership row was actually deleted, and the decrement
    /// saturates at zero, so `current_players` can never go negative.
    pub async fn leave_room(
        &self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<RoomRow, RoomError> {
        let mut tx = self.store.begin().await?;

        let Some(mut room) = tx.select_room_for_update(room_id).await? else {
            tx.rollback().await;
            return Err(RoomError::NotFound(room_id));
        };
        if !tx.delete_membership(room_id, user_id).await? {
            tx.rollback().await;
            return Err(RoomError::MembershipNotFound(user_id, room_id));
        }

        room.current_players = room.current_players.saturating_sub(1);
        tx.update_room_players(room_id, room.current_players).await?;
        tx.commit().await?;

        tracing::info!(
            %room_id,
            %user_id,
            players = room.current_players,
            "user left room"
        );
        Ok(room)
    }

    /// Lists a room's members (nickname per member) in join order.
    pub async fn list_members(&self, room_id: RoomId) -> Result<Vec<Member>, RoomError> {
        let mut tx = self.store.begin().await?;
        if tx.select_room(room_id).await?.is_none() {
            tx.rollback().await;
            return Err(RoomError::NotFound(room_id));
        }
        let rows = tx.list_members(room_id).await?;
        tx.commit().await?;
        Ok(rows
            .into_iter()
            .map(|(membership, user)| Member {
                user_id: membership.user_id,
                nickname: user.nickname,
            })
            .collect())
    }
}

/// Rejects names that would corrupt the unescaped wire format.
fn wire_safe(name: &str) -> Result<(), RoomError> {
    parlor_protocol::join_fields(&[name])
        .map_err(|_| RoomError::InvalidName(name.to_string()))?;
    Ok(())
}
