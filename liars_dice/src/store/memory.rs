//! Process-local store backed by a `tokio` lock.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{RwLock, broadcast};

use super::{Mutation, PlayerPatch, RoomPatch, StateStore, StoreError, StoreEvent, StoreResult};
use crate::game::entities::{Player, PlayerId, Room, RoomCode};

/// Capacity of each room's change feed.
const FEED_CAPACITY: usize = 256;

struct RoomEntry {
    room: Room,
    players: Vec<Player>,
    feed: broadcast::Sender<StoreEvent>,
}

impl RoomEntry {
    fn check_version(&self, expected: Option<u64>) -> StoreResult<()> {
        match expected {
            Some(expected) if expected != self.room.version => Err(StoreError::StaleVersion {
                code: self.room.code.clone(),
                expected,
                actual: self.room.version,
            }),
            _ => Ok(()),
        }
    }

    fn player_mut(&mut self, id: PlayerId) -> StoreResult<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::PlayerNotFound(id))
    }

    fn publish(&self, event: StoreEvent) {
        // no receivers is fine
        let _ = self.feed.send(event);
    }
}

/// In-memory [`StateStore`]. Commits are atomic under a single write lock.
#[derive(Default)]
pub struct InMemoryStore {
    rooms: RwLock<HashMap<RoomCode, RoomEntry>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms currently stored
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn create_room(&self, room: &Room) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.code) {
            return Err(StoreError::RoomExists(room.code.clone()));
        }
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        rooms.insert(
            room.code.clone(),
            RoomEntry {
                room: room.clone(),
                players: Vec::new(),
                feed,
            },
        );
        Ok(())
    }

    async fn read_room(&self, code: &RoomCode) -> StoreResult<Room> {
        let rooms = self.rooms.read().await;
        rooms
            .get(code)
            .map(|entry| entry.room.clone())
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))
    }

    async fn read_players(&self, code: &RoomCode) -> StoreResult<Vec<Player>> {
        let rooms = self.rooms.read().await;
        rooms
            .get(code)
            .map(|entry| entry.players.clone())
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))
    }

    async fn insert_player(&self, code: &RoomCode, player: &Player) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        entry.players.push(player.clone());
        entry.publish(StoreEvent::Roster { code: code.clone() });
        Ok(())
    }

    async fn write_room(
        &self,
        code: &RoomCode,
        patch: &RoomPatch,
        expected_version: Option<u64>,
    ) -> StoreResult<u64> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        entry.check_version(expected_version)?;
        patch.apply(&mut entry.room);
        entry.room.version += 1;
        let version = entry.room.version;
        entry.publish(StoreEvent::Room {
            code: code.clone(),
            version,
        });
        Ok(version)
    }

    async fn write_player(
        &self,
        code: &RoomCode,
        id: PlayerId,
        patch: &PlayerPatch,
    ) -> StoreResult<()> {
        self.bulk_write_players(code, &[(id, patch.clone())]).await
    }

    async fn delete_player(&self, code: &RoomCode, id: PlayerId) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        let before = entry.players.len();
        entry.players.retain(|p| p.id != id);
        if entry.players.len() == before {
            return Err(StoreError::PlayerNotFound(id));
        }
        entry.publish(StoreEvent::Roster { code: code.clone() });
        Ok(())
    }

    async fn bulk_write_players(
        &self,
        code: &RoomCode,
        patches: &[(PlayerId, PlayerPatch)],
    ) -> StoreResult<()> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        if let Some((missing, _)) = patches
            .iter()
            .find(|(id, _)| !entry.players.iter().any(|p| p.id == *id))
        {
            return Err(StoreError::PlayerNotFound(*missing));
        }
        for (id, patch) in patches {
            patch.apply(entry.player_mut(*id)?);
        }
        entry.publish(StoreEvent::Roster { code: code.clone() });
        Ok(())
    }

    async fn subscribe(&self, code: &RoomCode) -> StoreResult<broadcast::Receiver<StoreEvent>> {
        let rooms = self.rooms.read().await;
        rooms
            .get(code)
            .map(|entry| entry.feed.subscribe())
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))
    }

    async fn commit(
        &self,
        code: &RoomCode,
        expected_version: u64,
        mutation: &Mutation,
    ) -> StoreResult<u64> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::RoomNotFound(code.clone()))?;
        entry.check_version(Some(expected_version))?;

        // Validate every target row before touching anything.
        for (id, _) in &mutation.players {
            if !entry.players.iter().any(|p| p.id == *id) {
                return Err(StoreError::PlayerNotFound(*id));
            }
        }

        mutation.room.apply(&mut entry.room);
        entry.room.version += 1;
        for (id, patch) in &mutation.players {
            patch.apply(entry.player_mut(*id)?);
        }
        entry
            .players
            .retain(|p| !mutation.removed.contains(&p.id));

        let version = entry.room.version;
        if !mutation.players.is_empty() || !mutation.removed.is_empty() {
            entry.publish(StoreEvent::Roster { code: code.clone() });
        }
        entry.publish(StoreEvent::Room {
            code: code.clone(),
            version,
        });
        Ok(version)
    }
}
