//! Shared state store abstraction.
//!
//! The store holds one [`Room`] record and its [`Player`] rows per game and
//! offers point reads, partial writes and a change feed. Two implementations
//! ship with the crate:
//! - [`InMemoryStore`]: process-local, used by tests and the bot driver
//! - [`crate::db::PgStore`]: PostgreSQL-backed via sqlx
//!
//! ## Versioning
//!
//! Every room write bumps [`Room::version`]. Writers pass the version they
//! read as `expected_version`; a mismatch is rejected with
//! [`StoreError::StaleVersion`] instead of silently overwriting a newer
//! state.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::game::{
    RoomSnapshot,
    entities::{
        Bet, Coins, Face, GameOverData, Notification, Player, PlayerId, Room, RoomCode,
        RoomStatus, SeatIndex,
    },
};

pub mod memory;

pub use memory::InMemoryStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Room not found
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),

    /// Room code already taken
    #[error("Room already exists: {0}")]
    RoomExists(RoomCode),

    /// Player row not found
    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// Write carried an out-of-date room version
    #[error("Stale write on room {code}: expected v{expected}, found v{actual}")]
    StaleVersion {
        code: RoomCode,
        expected: u64,
        actual: u64,
    },

    /// A write landed but reading it back showed a different value
    #[error("Room {code} didn't echo {field}: wrote {expected}, read {actual}")]
    WriteNotEchoed {
        code: RoomCode,
        field: &'static str,
        expected: i64,
        actual: i64,
    },

    /// Row contents couldn't be mapped onto the data model
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// Storage didn't answer in time
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self {
            StoreError::Database(_)
            | StoreError::Serialization(_)
            | StoreError::Corrupt(_)
            | StoreError::Timeout(_) => "Internal server error".to_string(),
            StoreError::StaleVersion { .. } => {
                "The table changed while you were acting, try again".to_string()
            }
            StoreError::WriteNotEchoed { .. } => "Couldn't start the round, try again".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether re-reading and recomputing may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::StaleVersion { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Change-feed events. Delivery is at least once and unordered across
/// rooms; consumers re-read rather than trust the payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreEvent {
    /// The room record changed and now has `version`.
    Room { code: RoomCode, version: u64 },
    /// A player row was inserted, updated or deleted.
    Roster { code: RoomCode },
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
    (before != after).then(|| after.clone())
}

/// Partial update of a room record. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomPatch {
    pub status: Option<RoomStatus>,
    pub pot: Option<Coins>,
    pub entry_fee: Option<Coins>,
    pub current_turn_player_id: Option<Option<PlayerId>>,
    pub current_bet: Option<Bet>,
    pub allow_cheats: Option<bool>,
    pub notification: Option<Option<Notification>>,
    pub game_over: Option<Option<GameOverData>>,
    pub participants: Option<Vec<PlayerId>>,
}

impl RoomPatch {
    #[must_use]
    pub fn diff(before: &Room, after: &Room) -> Self {
        Self {
            status: changed(&before.status, &after.status),
            pot: changed(&before.pot, &after.pot),
            entry_fee: changed(&before.entry_fee, &after.entry_fee),
            current_turn_player_id: changed(
                &before.current_turn_player_id,
                &after.current_turn_player_id,
            ),
            current_bet: changed(&before.current_bet, &after.current_bet),
            allow_cheats: changed(&before.allow_cheats, &after.allow_cheats),
            notification: changed(&before.notification, &after.notification),
            game_over: changed(&before.game_over, &after.game_over),
            participants: changed(&before.participants, &after.participants),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, room: &mut Room) {
        if let Some(status) = self.status {
            room.status = status;
        }
        if let Some(pot) = self.pot {
            room.pot = pot;
        }
        if let Some(entry_fee) = self.entry_fee {
            room.entry_fee = entry_fee;
        }
        if let Some(turn) = self.current_turn_player_id {
            room.current_turn_player_id = turn;
        }
        if let Some(bet) = self.current_bet {
            room.current_bet = bet;
        }
        if let Some(allow_cheats) = self.allow_cheats {
            room.allow_cheats = allow_cheats;
        }
        if let Some(notification) = &self.notification {
            room.notification.clone_from(notification);
        }
        if let Some(game_over) = &self.game_over {
            room.game_over.clone_from(game_over);
        }
        if let Some(participants) = &self.participants {
            room.participants.clone_from(participants);
        }
    }
}

/// Partial update of a player row. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerPatch {
    pub is_host: Option<bool>,
    pub money: Option<Coins>,
    pub dice_values: Option<Option<Vec<Face>>>,
    pub is_ready: Option<bool>,
    pub seat_index: Option<Option<SeatIndex>>,
    pub current_contribution: Option<Coins>,
    pub has_used_cheat: Option<bool>,
}

impl PlayerPatch {
    #[must_use]
    pub fn diff(before: &Player, after: &Player) -> Self {
        Self {
            is_host: changed(&before.is_host, &after.is_host),
            money: changed(&before.money, &after.money),
            dice_values: changed(&before.dice_values, &after.dice_values),
            is_ready: changed(&before.is_ready, &after.is_ready),
            seat_index: changed(&before.seat_index, &after.seat_index),
            current_contribution: changed(
                &before.current_contribution,
                &after.current_contribution,
            ),
            has_used_cheat: changed(&before.has_used_cheat, &after.has_used_cheat),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, player: &mut Player) {
        if let Some(is_host) = self.is_host {
            player.is_host = is_host;
        }
        if let Some(money) = self.money {
            player.money = money;
        }
        if let Some(dice) = &self.dice_values {
            player.dice_values.clone_from(dice);
        }
        if let Some(is_ready) = self.is_ready {
            player.is_ready = is_ready;
        }
        if let Some(seat) = self.seat_index {
            player.seat_index = seat;
        }
        if let Some(contribution) = self.current_contribution {
            player.current_contribution = contribution;
        }
        if let Some(used) = self.has_used_cheat {
            player.has_used_cheat = used;
        }
    }
}

/// Everything an operation changed, ready to be committed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mutation {
    pub room: RoomPatch,
    pub players: Vec<(PlayerId, PlayerPatch)>,
    pub removed: Vec<PlayerId>,
}

impl Mutation {
    /// Diff two snapshots of the same room.
    ///
    /// Rows present in `before` but missing from `after` become deletions.
    /// Rows only present in `after` are ignored: joins go through
    /// [`StateStore::insert_player`].
    #[must_use]
    pub fn between(before: &RoomSnapshot, after: &RoomSnapshot) -> Self {
        let mut players = Vec::new();
        let mut removed = Vec::new();
        for old in &before.players {
            match after.players.iter().find(|p| p.id == old.id) {
                Some(new) => {
                    let patch = PlayerPatch::diff(old, new);
                    if !patch.is_empty() {
                        players.push((old.id, patch));
                    }
                }
                None => removed.push(old.id),
            }
        }
        Self {
            room: RoomPatch::diff(&before.room, &after.room),
            players,
            removed,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.room.is_empty() && self.players.is_empty() && self.removed.is_empty()
    }
}

/// Persistent home of rooms and players.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Insert a new room record
    async fn create_room(&self, room: &Room) -> StoreResult<()>;

    /// Read a room record
    async fn read_room(&self, code: &RoomCode) -> StoreResult<Room>;

    /// Read a room's roster in join order
    async fn read_players(&self, code: &RoomCode) -> StoreResult<Vec<Player>>;

    /// Insert a player row on join
    async fn insert_player(&self, code: &RoomCode, player: &Player) -> StoreResult<()>;

    /// Apply a partial room update and return the new version.
    ///
    /// With `expected_version` set, the write only lands if the stored
    /// version still matches.
    async fn write_room(
        &self,
        code: &RoomCode,
        patch: &RoomPatch,
        expected_version: Option<u64>,
    ) -> StoreResult<u64>;

    /// Apply a partial player update
    async fn write_player(
        &self,
        code: &RoomCode,
        id: PlayerId,
        patch: &PlayerPatch,
    ) -> StoreResult<()>;

    /// Physically remove a player row
    async fn delete_player(&self, code: &RoomCode, id: PlayerId) -> StoreResult<()>;

    /// Apply several player updates
    async fn bulk_write_players(
        &self,
        code: &RoomCode,
        patches: &[(PlayerId, PlayerPatch)],
    ) -> StoreResult<()>;

    /// Subscribe to changes of one room
    async fn subscribe(&self, code: &RoomCode) -> StoreResult<broadcast::Receiver<StoreEvent>>;

    /// Read the room and its roster
    async fn read_snapshot(&self, code: &RoomCode) -> StoreResult<RoomSnapshot> {
        let room = self.read_room(code).await?;
        let players = self.read_players(code).await?;
        Ok(RoomSnapshot::new(room, players))
    }

    /// Land a whole mutation, gated on the room version.
    ///
    /// The default writes the room first so a stale version is rejected
    /// before any player row changes. Implementations that can do so
    /// should override this to be atomic.
    async fn commit(
        &self,
        code: &RoomCode,
        expected_version: u64,
        mutation: &Mutation,
    ) -> StoreResult<u64> {
        let version = self
            .write_room(code, &mutation.room, Some(expected_version))
            .await?;
        if !mutation.players.is_empty() {
            self.bulk_write_players(code, &mutation.players).await?;
        }
        for id in &mutation.removed {
            self.delete_player(code, *id).await?;
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Player, Room, RoomCode};

    fn snapshot() -> RoomSnapshot {
        let room = Room::new(RoomCode::new("DIFF00"), 100, false);
        let players = vec![
            Player::new(1, "alice", true, 500),
            Player::new(2, "bob", false, 500),
        ];
        RoomSnapshot::new(room, players)
    }

    #[test]
    fn identical_snapshots_produce_no_mutation() {
        let before = snapshot();
        assert!(Mutation::between(&before, &before.clone()).is_empty());
    }

    #[test]
    fn diff_captures_changed_fields_only() {
        let before = snapshot();
        let mut after = before.clone();
        after.room.pot = 200;
        after.room.current_turn_player_id = Some(after.players[1].id);
        after.players[0].money = 400;
        after.players[0].dice_values = Some(vec![1, 2]);

        let mutation = Mutation::between(&before, &after);
        assert_eq!(mutation.room.pot, Some(200));
        assert_eq!(
            mutation.room.current_turn_player_id,
            Some(Some(after.players[1].id))
        );
        assert_eq!(mutation.room.status, None);
        assert_eq!(mutation.players.len(), 1);
        let (id, patch) = &mutation.players[0];
        assert_eq!(*id, before.players[0].id);
        assert_eq!(patch.money, Some(400));
        assert_eq!(patch.dice_values, Some(Some(vec![1, 2])));
        assert_eq!(patch.is_ready, None);
    }

    #[test]
    fn clearing_a_nullable_field_is_recorded() {
        let mut before = snapshot();
        before.room.current_turn_player_id = Some(before.players[0].id);
        let mut after = before.clone();
        after.room.current_turn_player_id = None;

        let patch = RoomPatch::diff(&before.room, &after.room);
        assert_eq!(patch.current_turn_player_id, Some(None));

        let mut room = before.room.clone();
        patch.apply(&mut room);
        assert_eq!(room.current_turn_player_id, None);
    }

    #[test]
    fn removed_rows_become_deletions() {
        let before = snapshot();
        let mut after = before.clone();
        let gone = after.players.remove(1);

        let mutation = Mutation::between(&before, &after);
        assert_eq!(mutation.removed, vec![gone.id]);
        assert!(mutation.players.is_empty());
    }

    #[test]
    fn patches_reproduce_the_after_state() {
        let before = snapshot();
        let mut after = before.clone();
        after.room.status = RoomStatus::Boarding;
        after.players[1].is_ready = true;
        after.players[1].current_contribution = 100;
        after.players[1].money = 400;

        let mutation = Mutation::between(&before, &after);
        let mut replay = before.clone();
        mutation.room.apply(&mut replay.room);
        for (id, patch) in &mutation.players {
            patch.apply(replay.player_mut(*id).unwrap());
        }
        assert_eq!(replay, after);
    }

    #[test]
    fn stale_versions_are_retryable() {
        let err = StoreError::StaleVersion {
            code: RoomCode::new("ABCDEF"),
            expected: 1,
            actual: 2,
        };
        assert!(err.is_retryable());
        let missing = StoreError::RoomNotFound(RoomCode::new("ABCDEF"));
        assert!(!missing.is_retryable());
    }
}
