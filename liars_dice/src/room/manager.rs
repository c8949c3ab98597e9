//! Room manager for spawning and managing room actors.

use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use super::{
    actor::{RoomActor, RoomHandle},
    config::RoomConfig,
    messages::{RoomError, RoomResult},
};
use crate::{
    game::entities::{Coins, Player, Room, RoomCode, RoomStatus, UserId},
    store::{StateStore, StoreError},
};

/// Attempts at drawing an unused room code
const CODE_ATTEMPTS: usize = 16;

/// Room metadata for discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomMetadata {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub player_count: usize,
    pub max_players: usize,
    pub entry_fee: Coins,
    pub pot: Coins,
    pub allow_cheats: bool,
}

struct ManagedRoom {
    handle: RoomHandle,
    config: RoomConfig,
}

/// Room manager for managing multiple room instances
pub struct RoomManager {
    store: Arc<dyn StateStore>,

    /// Active room actors
    rooms: Arc<RwLock<HashMap<RoomCode, ManagedRoom>>>,
}

impl RoomManager {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a room under a fresh code and spawn its actor
    pub async fn create_room(&self, config: RoomConfig) -> RoomResult<RoomHandle> {
        config.validate().map_err(RoomError::InvalidConfig)?;

        for _ in 0..CODE_ATTEMPTS {
            let code = RoomCode::generate(&mut rand::rng());
            let room = Room::new(code.clone(), config.entry_fee, config.allow_cheats);
            match self.store.create_room(&room).await {
                Ok(()) => {
                    log::info!("Created room {}", code);
                    return Ok(self.spawn(code, config).await);
                }
                Err(StoreError::RoomExists(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(RoomError::InvalidConfig("couldn't find an unused room code".to_string()))
    }

    /// Spawn an actor for a room that already lives in the store, e.g.
    /// after a restart. Pending transitions are picked up on its first tick.
    pub async fn resume_room(&self, code: &RoomCode, config: RoomConfig) -> RoomResult<RoomHandle> {
        config.validate().map_err(RoomError::InvalidConfig)?;
        if let Some(handle) = self.get_room(code).await {
            return Ok(handle);
        }
        match self.store.read_room(code).await {
            Ok(_) => Ok(self.spawn(code.clone(), config).await),
            Err(StoreError::RoomNotFound(_)) => Err(RoomError::RoomNotFound(code.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn spawn(&self, code: RoomCode, config: RoomConfig) -> RoomHandle {
        let (actor, handle) = RoomActor::new(code.clone(), config.clone(), self.store.clone());

        let mut rooms = self.rooms.write().await;
        rooms.insert(
            code,
            ManagedRoom {
                handle: handle.clone(),
                config,
            },
        );
        drop(rooms);

        tokio::spawn(actor.run());
        handle
    }

    /// Get a room handle
    pub async fn get_room(&self, code: &RoomCode) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms
            .get(code)
            .map(|room| room.handle.clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Join a room by code
    pub async fn join_room(
        &self,
        code: &RoomCode,
        user_id: UserId,
        name: &str,
    ) -> RoomResult<(RoomHandle, Player)> {
        let handle = self
            .get_room(code)
            .await
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let player = handle.join(user_id, name).await?;
        Ok((handle, player))
    }

    /// List all active rooms
    pub async fn list_rooms(&self) -> RoomResult<Vec<RoomMetadata>> {
        let rooms: Vec<(RoomCode, usize)> = {
            let rooms = self.rooms.read().await;
            rooms
                .iter()
                .filter(|(_, room)| !room.handle.is_closed())
                .map(|(code, room)| (code.clone(), room.config.max_players))
                .collect()
        };

        let mut metadata = Vec::with_capacity(rooms.len());
        for (code, max_players) in rooms {
            let snapshot = match self.store.read_snapshot(&code).await {
                Ok(snapshot) => snapshot,
                Err(StoreError::RoomNotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            metadata.push(RoomMetadata {
                code,
                status: snapshot.room.status,
                player_count: snapshot.players.len(),
                max_players,
                entry_fee: snapshot.room.entry_fee,
                pot: snapshot.room.pot,
                allow_cheats: snapshot.room.allow_cheats,
            });
        }
        metadata.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(metadata)
    }

    /// Stop a room's actor. The stored room is left in place.
    pub async fn close_room(&self, code: &RoomCode) -> RoomResult<()> {
        let room = self.rooms.write().await.remove(code);
        let Some(room) = room else {
            return Err(RoomError::RoomNotFound(code.clone()));
        };
        // An actor that already stopped counts as closed.
        match room.handle.close().await {
            Ok(()) | Err(RoomError::RoomClosed) => {}
            Err(e) => return Err(e),
        }
        log::info!("Closed room {}", code);
        Ok(())
    }

    /// Get active room count
    pub async fn active_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms
            .values()
            .filter(|room| !room.handle.is_closed())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameError;
    use crate::store::InMemoryStore;

    fn manager() -> RoomManager {
        RoomManager::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn created_rooms_are_listed() {
        let manager = manager();
        let handle = manager.create_room(RoomConfig::default()).await.unwrap();
        manager.join_room(handle.code(), 1, "alice").await.unwrap();

        let rooms = manager.list_rooms().await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(&rooms[0].code, handle.code());
        assert_eq!(rooms[0].player_count, 1);
        assert_eq!(rooms[0].status, RoomStatus::Waiting);
    }

    #[tokio::test]
    async fn invalid_configs_are_refused() {
        let manager = manager();
        let config = RoomConfig {
            max_players: 0,
            ..RoomConfig::default()
        };
        assert!(matches!(
            manager.create_room(config).await,
            Err(RoomError::InvalidConfig(_))
        ));
        assert_eq!(manager.active_room_count().await, 0);
    }

    #[tokio::test]
    async fn max_players_is_enforced() {
        let manager = manager();
        let config = RoomConfig {
            max_players: 2,
            ..RoomConfig::default()
        };
        let handle = manager.create_room(config).await.unwrap();
        let code = handle.code().clone();
        manager.join_room(&code, 1, "a").await.unwrap();
        manager.join_room(&code, 2, "b").await.unwrap();
        let err = manager.join_room(&code, 3, "c").await.unwrap_err();
        assert!(matches!(err, RoomError::Game(GameError::RoomFull)));
    }

    #[tokio::test]
    async fn unknown_codes_are_not_found() {
        let manager = manager();
        let err = manager
            .join_room(&RoomCode::new("NOPE22"), 1, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn closing_removes_the_room() {
        let manager = manager();
        let handle = manager.create_room(RoomConfig::default()).await.unwrap();
        manager.close_room(handle.code()).await.unwrap();
        assert!(manager.get_room(handle.code()).await.is_none());
        assert_eq!(manager.active_room_count().await, 0);
    }
}
