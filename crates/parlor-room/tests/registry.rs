//! Integration tests for the room registry: catalog operations, the
//! capacity invariant under contention, and rollback on store failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parlor_protocol::{RoomId, UserId};
use parlor_room::{room_summary, RoomError, RoomRegistry};
use parlor_store::{
    MembershipRow, MemoryStore, MemoryTx, NewRoom, RoomRow, StoreError, StoreProvider, StoreTx,
    UserRow,
};

// =========================================================================
// Helpers
// =========================================================================

fn registry() -> (RoomRegistry<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    (RoomRegistry::new(store.clone()), store)
}

async fn users(registry: &RoomRegistry<MemoryStore>, names: &[&str]) -> Vec<UserId> {
    let mut ids = Vec::new();
    for name in names {
        let nickname = {
            let mut n = name.to_string();
            if let Some(first) = n.get_mut(0..1) {
                first.make_ascii_uppercase();
            }
            n
        };
        ids.push(
            registry
                .register_user(name, &nickname)
                .await
                .expect("register user"),
        );
    }
    ids
}

// =========================================================================
// Catalog operations
// =========================================================================

#[tokio::test]
async fn test_create_room_and_get_it_back() {
    let (registry, _) = registry();
    let host = users(&registry, &["host"]).await[0];

    let room_id = registry.create_room("evening table", 6, host).await.unwrap();
    let room = registry.get_room(room_id).await.unwrap();

    assert_eq!(room.room_name, "evening table");
    assert_eq!(room.max_players, 6);
    assert_eq!(room.current_players, 0);
    assert_eq!(room.created_by, host);
}

#[tokio::test]
async fn test_get_room_not_found() {
    let (registry, _) = registry();
    assert!(matches!(
        registry.get_room(RoomId(999)).await,
        Err(RoomError::NotFound(RoomId(999)))
    ));
}

#[tokio::test]
async fn test_create_room_rejects_zero_capacity() {
    let (registry, _) = registry();
    let host = users(&registry, &["host"]).await[0];
    assert!(matches!(
        registry.create_room("empty", 0, host).await,
        Err(RoomError::InvalidCapacity(0))
    ));
}

#[tokio::test]
async fn test_wire_unsafe_names_are_rejected() {
    let (registry, _) = registry();
    let host = users(&registry, &["host"]).await[0];

    assert!(matches!(
        registry.create_room("bad|name", 4, host).await,
        Err(RoomError::InvalidName(_))
    ));
    assert!(matches!(
        registry.register_user("semi;colon", "Nick").await,
        Err(RoomError::InvalidName(_))
    ));
    assert!(matches!(
        registry.register_user("fine", "co:lon").await,
        Err(RoomError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_list_rooms_newest_first_with_summaries() {
    let (registry, _) = registry();
    let host = users(&registry, &["host"]).await[0];

    let first = registry.create_room("first", 4, host).await.unwrap();
    let second = registry.create_room("second", 8, host).await.unwrap();

    let summaries = registry.room_summaries().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].room_id, second);
    assert_eq!(summaries[1].room_id, first);
    assert_eq!(summaries[0].to_entry(), format!("{second}|second|0/8|WAITING"));

    let room = registry.get_room(first).await.unwrap();
    assert_eq!(room_summary(&room).to_entry(), format!("{first}|first|0/4|WAITING"));
}

// =========================================================================
// Join / leave
// =========================================================================

#[tokio::test]
async fn test_join_updates_counter_and_member_list() {
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "alice", "bob"]).await;
    let (host, alice, bob) = (ids[0], ids[1], ids[2]);

    let room_id = registry.create_room("table", 4, host).await.unwrap();

    let after_alice = registry.join_room(room_id, alice).await.unwrap();
    assert_eq!(after_alice.current_players, 1);
    let after_bob = registry.join_room(room_id, bob).await.unwrap();
    assert_eq!(after_bob.current_players, 2);

    let members = registry.list_members(room_id).await.unwrap();
    let nicknames: Vec<&str> = members.iter().map(|m| m.nickname.as_str()).collect();
    assert_eq!(nicknames, vec!["Alice", "Bob"], "members in join order");
}

#[tokio::test]
async fn test_join_missing_room_fails() {
    let (registry, _) = registry();
    let alice = users(&registry, &["alice"]).await[0];
    assert!(matches!(
        registry.join_room(RoomId(42), alice).await,
        Err(RoomError::NotFound(RoomId(42)))
    ));
}

#[tokio::test]
async fn test_join_full_room_fails_without_mutation() {
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "alice", "bob", "cleo"]).await;
    let room_id = registry.create_room("duo", 2, ids[0]).await.unwrap();

    registry.join_room(room_id, ids[1]).await.unwrap();
    registry.join_room(room_id, ids[2]).await.unwrap();

    assert!(matches!(
        registry.join_room(room_id, ids[3]).await,
        Err(RoomError::RoomFull(_))
    ));

    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 2);
    assert_eq!(registry.list_members(room_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_user_cannot_hold_two_memberships() {
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "alice"]).await;
    let first = registry.create_room("first", 4, ids[0]).await.unwrap();
    let second = registry.create_room("second", 4, ids[0]).await.unwrap();

    registry.join_room(first, ids[1]).await.unwrap();

    // Same room again and a different room both violate the
    // one-membership-per-user invariant.
    assert!(matches!(
        registry.join_room(first, ids[1]).await,
        Err(RoomError::AlreadyInRoom(_, r)) if r == first
    ));
    assert!(matches!(
        registry.join_room(second, ids[1]).await,
        Err(RoomError::AlreadyInRoom(_, r)) if r == first
    ));
}

#[tokio::test]
async fn test_leave_nonmember_fails_and_counter_unchanged() {
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "alice", "bob"]).await;
    let room_id = registry.create_room("table", 4, ids[0]).await.unwrap();
    registry.join_room(room_id, ids[1]).await.unwrap();

    assert!(matches!(
        registry.leave_room(room_id, ids[2]).await,
        Err(RoomError::MembershipNotFound(_, _))
    ));
    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 1);
}

#[tokio::test]
async fn test_leave_succeeds_exactly_once() {
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "alice"]).await;
    let room_id = registry.create_room("table", 4, ids[0]).await.unwrap();
    registry.join_room(room_id, ids[1]).await.unwrap();

    let after = registry.leave_room(room_id, ids[1]).await.unwrap();
    assert_eq!(after.current_players, 0);

    assert!(matches!(
        registry.leave_room(room_id, ids[1]).await,
        Err(RoomError::MembershipNotFound(_, _))
    ));
    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 0);
}

// =========================================================================
// Contention
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_admit_exactly_capacity() {
    // Room{max=2}; A, B, C join concurrently: exactly 2 admitted, 1 gets
    // RoomFull, and the member list matches the admitted pair.
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "a", "b", "c"]).await;
    let room_id = registry.create_room("duo", 2, ids[0]).await.unwrap();

    let registry = Arc::new(registry);
    let mut handles = Vec::new();
    for user in [ids[1], ids[2], ids[3]] {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            (user, registry.join_room(room_id, user).await)
        }));
    }

    let mut admitted = Vec::new();
    let mut full = 0;
    for handle in handles {
        let (user, result) = handle.await.expect("join task");
        match result {
            Ok(_) => admitted.push(user),
            Err(RoomError::RoomFull(r)) => {
                assert_eq!(r, room_id);
                full += 1;
            }
            Err(other) => panic!("unexpected join failure: {other}"),
        }
    }

    assert_eq!(admitted.len(), 2);
    assert_eq!(full, 1);

    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 2);

    let mut member_ids: Vec<UserId> = registry
        .list_members(room_id)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.user_id)
        .collect();
    member_ids.sort();
    admitted.sort();
    assert_eq!(member_ids, admitted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_oversubscribed_room_admits_exactly_capacity() {
    let (registry, _) = registry();
    let names: Vec<String> = (0..9).map(|i| format!("user{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let ids = users(&registry, &name_refs).await;

    let room_id = registry.create_room("crowded", 4, ids[0]).await.unwrap();
    let registry = Arc::new(registry);

    let mut handles = Vec::new();
    for user in ids {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry.join_room(room_id, user).await
        }));
    }

    let mut ok = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.expect("join task") {
            Ok(_) => ok += 1,
            Err(RoomError::RoomFull(_)) => full += 1,
            Err(other) => panic!("unexpected join failure: {other}"),
        }
    }

    assert_eq!(ok, 4);
    assert_eq!(full, 5);
    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 4);
    assert_eq!(registry.list_members(room_id).await.unwrap().len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_double_leave_decrements_once() {
    let (registry, _) = registry();
    let ids = users(&registry, &["host", "alice", "bob"]).await;
    let room_id = registry.create_room("table", 4, ids[0]).await.unwrap();
    registry.join_room(room_id, ids[1]).await.unwrap();
    registry.join_room(room_id, ids[2]).await.unwrap();

    let registry = Arc::new(registry);
    let alice = ids[1];
    let mut handles = Vec::new();
    for _ in 0..2 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry.leave_room(room_id, alice).await
        }));
    }

    let mut ok = 0;
    let mut missing = 0;
    for handle in handles {
        match handle.await.expect("leave task") {
            Ok(_) => ok += 1,
            Err(RoomError::MembershipNotFound(_, _)) => missing += 1,
            Err(other) => panic!("unexpected leave failure: {other}"),
        }
    }

    assert_eq!(ok, 1, "exactly one leave may succeed");
    assert_eq!(missing, 1);

    // Bob is still in: the counter lost exactly one, and never dipped
    // below the membership count.
    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 1);
    assert_eq!(registry.list_members(room_id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_leave_storm_keeps_counter_consistent() {
    let (registry, _) = registry();
    let names: Vec<String> = (0..6).map(|i| format!("user{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let ids = users(&registry, &name_refs).await;
    let room_id = registry.create_room("storm", 3, ids[0]).await.unwrap();

    let registry = Arc::new(registry);
    let mut handles = Vec::new();
    for user in ids {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            for _ in 0..20 {
                match registry.join_room(room_id, user).await {
                    Ok(_) => {
                        let _ = registry.leave_room(room_id, user).await;
                    }
                    Err(RoomError::RoomFull(_)) | Err(RoomError::AlreadyInRoom(_, _)) => {}
                    Err(other) => panic!("unexpected join failure: {other}"),
                }
            }
        }));
    }
    for handle in handles {
        handle.await.expect("storm task");
    }

    let room = registry.get_room(room_id).await.unwrap();
    let members = registry.list_members(room_id).await.unwrap();
    assert_eq!(
        room.current_players as usize,
        members.len(),
        "counter must equal membership rows"
    );
    assert!(room.current_players <= room.max_players);
}

// =========================================================================
// Store failure injection
// =========================================================================

/// A provider that delegates to [`MemoryStore`] but fails commits on
/// demand, simulating an unreachable store at the worst moment.
#[derive(Clone)]
struct FaultyStore {
    inner: MemoryStore,
    fail_commits: Arc<AtomicBool>,
}

struct FaultyTx {
    inner: MemoryTx,
    fail_commits: Arc<AtomicBool>,
}

impl StoreProvider for FaultyStore {
    type Tx = FaultyTx;

    async fn begin(&self) -> Result<FaultyTx, StoreError> {
        Ok(FaultyTx {
            inner: self.inner.begin().await?,
            fail_commits: Arc::clone(&self.fail_commits),
        })
    }
}

impl StoreTx for FaultyTx {
    async fn select_room(&mut self, room_id: RoomId) -> Result<Option<RoomRow>, StoreError> {
        self.inner.select_room(room_id).await
    }

    async fn select_room_for_update(
        &mut self,
        room_id: RoomId,
    ) -> Result<Option<RoomRow>, StoreError> {
        self.inner.select_room_for_update(room_id).await
    }

    async fn insert_room(&mut self, room: NewRoom) -> Result<RoomId, StoreError> {
        self.inner.insert_room(room).await
    }

    async fn update_room_players(
        &mut self,
        room_id: RoomId,
        current_players: u32,
    ) -> Result<(), StoreError> {
        self.inner.update_room_players(room_id, current_players).await
    }

    async fn insert_membership(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<(), StoreError> {
        self.inner.insert_membership(room_id, user_id).await
    }

    async fn delete_membership(
        &mut self,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        self.inner.delete_membership(room_id, user_id).await
    }

    async fn membership_for_user(
        &mut self,
        user_id: UserId,
    ) -> Result<Option<RoomId>, StoreError> {
        self.inner.membership_for_user(user_id).await
    }

    async fn list_rooms(&mut self) -> Result<Vec<RoomRow>, StoreError> {
        self.inner.list_rooms().await
    }

    async fn list_members(
        &mut self,
        room_id: RoomId,
    ) -> Result<Vec<(MembershipRow, UserRow)>, StoreError> {
        self.inner.list_members(room_id).await
    }

    async fn upsert_user(
        &mut self,
        username: &str,
        nickname: &str,
    ) -> Result<UserId, StoreError> {
        self.inner.upsert_user(username, nickname).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            self.inner.rollback().await;
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        self.inner.commit().await
    }

    async fn rollback(self) {
        self.inner.rollback().await;
    }
}

#[tokio::test]
async fn test_failed_commit_leaves_no_partial_state() {
    let memory = MemoryStore::new();
    let fail_commits = Arc::new(AtomicBool::new(false));
    let registry = RoomRegistry::new(FaultyStore {
        inner: memory.clone(),
        fail_commits: Arc::clone(&fail_commits),
    });

    let alice = registry.register_user("alice", "Alice").await.unwrap();
    let room_id = registry.create_room("fragile", 4, alice).await.unwrap();

    fail_commits.store(true, Ordering::SeqCst);
    assert!(matches!(
        registry.join_room(room_id, alice).await,
        Err(RoomError::Store(StoreError::Unavailable(_)))
    ));
    fail_commits.store(false, Ordering::SeqCst);

    // Neither the membership row nor the counter increment survived.
    let room = registry.get_room(room_id).await.unwrap();
    assert_eq!(room.current_players, 0);
    assert!(registry.list_members(room_id).await.unwrap().is_empty());

    // The room lock was released by the rollback: the next join works.
    let after = registry.join_room(room_id, alice).await.unwrap();
    assert_eq!(after.current_players, 1);
}
