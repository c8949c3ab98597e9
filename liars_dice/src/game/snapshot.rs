//! The freshly-read room state every operation computes on.

use serde::{Deserialize, Serialize};

use super::{
    entities::{Player, PlayerId, Room, RoomStatus},
    errors::GameError,
};

/// A room record together with its live roster.
///
/// Operations never cache a snapshot across actions: the room service
/// re-reads one from the store immediately before computing each mutation.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub room: Room,
    /// Roster in join order.
    pub players: Vec<Player>,
}

impl RoomSnapshot {
    #[must_use]
    pub fn new(room: Room, mut players: Vec<Player>) -> Self {
        players.sort_by_key(|p| p.joined_at);
        Self { room, players }
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, GameError> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or(GameError::PlayerNotFound(id))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GameError::PlayerNotFound(id))
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub(crate) fn require_host(&self, caller: PlayerId) -> Result<(), GameError> {
        if self.player(caller)?.is_host {
            Ok(())
        } else {
            Err(GameError::NotHost)
        }
    }

    pub(crate) fn require_status(&self, status: RoomStatus) -> Result<(), GameError> {
        if self.room.status == status {
            Ok(())
        } else {
            Err(GameError::InvalidPhase(self.room.status))
        }
    }

    /// Checks that `caller` holds the turn in a live round.
    pub(crate) fn require_turn(&self, caller: PlayerId) -> Result<(), GameError> {
        self.require_status(RoomStatus::Playing)?;
        self.player(caller)?;
        if self.room.current_turn_player_id != Some(caller) {
            return Err(GameError::OutOfTurnAction);
        }
        if self.room.notification.is_some() {
            return Err(GameError::RoundPending);
        }
        Ok(())
    }

    pub fn survivors(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_survivor())
    }

    pub fn survivor_count(&self) -> usize {
        self.survivors().count()
    }

    pub fn dice_in_play(&self) -> usize {
        self.players.iter().map(Player::dice_count).sum()
    }

    pub fn total_contributions(&self) -> i64 {
        self.players.iter().map(|p| p.current_contribution).sum()
    }

    /// Projection of this snapshot for one viewer.
    ///
    /// While a round is live only the viewer's own dice are visible.
    #[must_use]
    pub fn view_for(&self, viewer: PlayerId) -> RoomView {
        let hide = self.room.status == RoomStatus::Playing;
        let players = self
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                is_host: p.is_host,
                money: p.money,
                dice_count: p.dice_count(),
                dice_values: if hide && p.id != viewer {
                    None
                } else {
                    p.dice_values.clone()
                },
                is_ready: p.is_ready,
                seat_index: p.seat_index,
                is_eliminated: p.is_eliminated(),
            })
            .collect();
        RoomView {
            room: self.room.clone(),
            players,
            viewer,
        }
    }
}

/// What a single player is shown of another player.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub money: i64,
    pub dice_count: usize,
    pub dice_values: Option<Vec<u8>>,
    pub is_ready: bool,
    pub seat_index: Option<usize>,
    pub is_eliminated: bool,
}

/// A room as seen by one player.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoomView {
    pub room: Room,
    pub players: Vec<PlayerView>,
    pub viewer: PlayerId,
}
