//! Bot manager: seats bots in a room and plays them through games.

use std::{collections::HashSet, time::Duration};

use super::{
    decision::{BotDecision, BotDecisionContext, BotStrategy},
    models::{BotDifficulty, BotPlayer},
};
use crate::{
    game::{
        GameError, RoomSnapshot,
        entities::{GameOverData, PlayerId, RoomStatus, UserId},
    },
    room::{RoomError, RoomHandle, RoomResult},
};

/// Bot user ids count down from here so they never collide with real accounts
const BOT_USER_ID_BASE: UserId = -1;

/// How long to wait before re-reading a room nobody can act in
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Actions a single game may take before the manager gives up
const DEFAULT_MAX_ACTIONS: usize = 10_000;

const BOT_NAMES: &[&str] = &[
    "Blackbeard",
    "Calico Jack",
    "Anne Bonny",
    "Mary Read",
    "Kidd",
    "Morgan",
    "Roberts",
    "Vane",
    "Teach",
    "Rackham",
    "Every",
    "Low",
];

/// Bot manager for a single room
pub struct BotManager {
    room: RoomHandle,

    /// Seated bots in join order
    bots: Vec<(BotPlayer, BotStrategy)>,

    /// Bots that spent their peek this game
    peeked: HashSet<PlayerId>,

    next_user_id: UserId,

    /// Sleep for each bot's think time before acting
    paced: bool,

    max_actions: usize,
}

impl BotManager {
    pub fn new(room: RoomHandle) -> Self {
        Self {
            room,
            bots: Vec::new(),
            peeked: HashSet::new(),
            next_user_id: BOT_USER_ID_BASE,
            paced: false,
            max_actions: DEFAULT_MAX_ACTIONS,
        }
    }

    /// Pause for a randomized think time before every bot action
    #[must_use]
    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    #[must_use]
    pub fn with_max_actions(mut self, max_actions: usize) -> Self {
        self.max_actions = max_actions;
        self
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    pub fn bots(&self) -> impl Iterator<Item = &BotPlayer> {
        self.bots.iter().map(|(bot, _)| bot)
    }

    fn is_bot(&self, id: PlayerId) -> bool {
        self.bots.iter().any(|(bot, _)| bot.player_id == id)
    }

    /// Seat `count` bots with entropy-seeded strategies
    pub async fn spawn_bots(
        &mut self,
        count: usize,
        difficulty: BotDifficulty,
    ) -> RoomResult<usize> {
        for _ in 0..count {
            let strategy = BotStrategy::new(difficulty);
            self.add_bot(strategy, difficulty).await?;
        }
        Ok(count)
    }

    /// Seat one bot playing `strategy`
    pub async fn add_bot(
        &mut self,
        strategy: BotStrategy,
        difficulty: BotDifficulty,
    ) -> RoomResult<PlayerId> {
        let user_id = self.next_user_id;
        self.next_user_id -= 1;

        let index = self.bots.len();
        let name = match BOT_NAMES.get(index) {
            Some(name) => (*name).to_string(),
            None => format!("Bot {}", index + 1),
        };

        let player = self.room.join(user_id, &name).await?;
        log::info!(
            "Seated bot {} ({}) in room {}",
            player.name,
            difficulty,
            self.room.code()
        );
        let bot = BotPlayer {
            player_id: player.id,
            user_id,
            name: player.name,
            difficulty,
        };
        self.bots.push((bot, strategy));
        Ok(player.id)
    }

    /// Remove bots that can't cover the entry fee. The host bot stays.
    /// Returns how many were kicked.
    pub async fn retire_broke_bots(&mut self) -> RoomResult<usize> {
        let snapshot = self.room.snapshot().await?;
        let Some(host) = snapshot.host().map(|p| p.id) else {
            return Ok(0);
        };
        if !self.is_bot(host) {
            return Ok(0);
        }

        let fee = snapshot.room.entry_fee;
        let broke: Vec<PlayerId> = snapshot
            .players
            .iter()
            .filter(|p| p.id != host && p.money < fee && self.is_bot(p.id))
            .map(|p| p.id)
            .collect();

        for id in &broke {
            self.room.kick_player(host, *id).await?;
            log::info!("Room {}: retired broke bot {}", self.room.code(), id);
        }
        self.bots.retain(|(bot, _)| !broke.contains(&bot.player_id));
        Ok(broke.len())
    }

    /// Drive the room from wherever it is to the end of a game.
    ///
    /// The host bot opens the table, every bot pays in, and bots act
    /// whenever they hold the turn. Re-deals are left to the room's own
    /// auto-advance. Humans in the room are waited on.
    pub async fn play_game(&mut self) -> RoomResult<GameOverData> {
        self.peeked.clear();
        let mut actions = 0;

        loop {
            if actions >= self.max_actions {
                return Err(GameError::InternalStateError(format!(
                    "game in room {} did not finish after {} actions",
                    self.room.code(),
                    actions
                ))
                .into());
            }

            let snapshot = self.room.snapshot().await?;
            let acted = match snapshot.room.status {
                RoomStatus::Waiting => self.open_if_hosting(&snapshot).await?,
                RoomStatus::Boarding => self.pay_in(&snapshot).await?,
                RoomStatus::Playing => self.take_turn(&snapshot).await?,
                RoomStatus::Finished => {
                    return snapshot.room.game_over.ok_or_else(|| {
                        GameError::InternalStateError("finished room has no payout".into()).into()
                    });
                }
            };

            if acted {
                actions += 1;
            } else {
                self.room.tick().await?;
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    /// Host bot resets a finished room straight into boarding
    pub async fn rematch(&mut self) -> RoomResult<()> {
        let snapshot = self.room.snapshot().await?;
        match snapshot.host() {
            Some(host) if self.is_bot(host.id) => {
                self.room.reset_room(host.id, true).await
            }
            _ => Err(GameError::NotHost.into()),
        }
    }

    async fn open_if_hosting(&mut self, snapshot: &RoomSnapshot) -> RoomResult<bool> {
        match snapshot.host() {
            Some(host) if self.is_bot(host.id) => {
                self.room.open_table(host.id).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pay_in(&mut self, snapshot: &RoomSnapshot) -> RoomResult<bool> {
        let unpaid: Vec<PlayerId> = snapshot
            .players
            .iter()
            .filter(|p| !p.is_ready && self.is_bot(p.id))
            .map(|p| p.id)
            .collect();

        for id in &unpaid {
            match self.room.pay_entry(*id).await {
                Ok(_) | Err(RoomError::Game(GameError::AlreadyReady)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(!unpaid.is_empty())
    }

    async fn take_turn(&mut self, snapshot: &RoomSnapshot) -> RoomResult<bool> {
        if snapshot.room.notification.is_some() {
            return Ok(false);
        }
        let Some(turn) = snapshot.room.current_turn_player_id else {
            return Ok(false);
        };
        let Some(index) = self.bots.iter().position(|(bot, _)| bot.player_id == turn) else {
            return Ok(false);
        };

        let view = self.room.view(turn).await?;
        let own_dice = view
            .players
            .iter()
            .find(|p| p.id == turn)
            .and_then(|p| p.dice_values.clone())
            .unwrap_or_default();
        let mut ctx = BotDecisionContext {
            own_dice: &own_dice,
            current_bet: view.room.current_bet,
            dice_in_play: view.players.iter().map(|p| p.dice_count).sum(),
            known_count: None,
        };

        let wants_peek = view.room.allow_cheats
            && !self.peeked.contains(&turn)
            && self.bots[index].1.wants_peek(&ctx);
        if wants_peek {
            self.peeked.insert(turn);
            match self.room.use_cheat(turn).await {
                Ok(count) => ctx.known_count = Some(count),
                Err(e) => log::debug!("Room {}: peek refused: {}", self.room.code(), e),
            }
        }

        let (bot, strategy) = &mut self.bots[index];
        if self.paced {
            tokio::time::sleep(strategy.think_time()).await;
        }

        let result = match strategy.decide(&ctx) {
            BotDecision::Raise(bet) => {
                log::debug!("{} bets {}", bot.name, bet);
                self.room.place_bet(turn, bet).await.map(|_| ())
            }
            BotDecision::Challenge(action) => {
                log::debug!("{} calls {} on {}", bot.name, action, ctx.current_bet);
                self.room.resolve_round(turn, action).await.map(|_| ())
            }
        };

        match result {
            Ok(()) => Ok(true),
            // the room moved on underneath us; re-read and try again
            Err(RoomError::Game(e)) => {
                log::debug!("Room {}: bot action rejected: {}", self.room.code(), e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::constants::DEFAULT_STARTING_MONEY,
        room::{RoomConfig, RoomManager},
        store::InMemoryStore,
    };
    use std::sync::Arc;

    fn fast_config() -> RoomConfig {
        RoomConfig {
            auto_advance_ms: 0,
            tick_interval_ms: 5,
            ..RoomConfig::default()
        }
    }

    #[tokio::test]
    async fn bots_get_distinct_identities() {
        let rooms = RoomManager::new(Arc::new(InMemoryStore::new()));
        let room = rooms.create_room(fast_config()).await.unwrap();
        let mut manager = BotManager::new(room);
        manager.spawn_bots(3, BotDifficulty::Easy).await.unwrap();

        let bots: Vec<_> = manager.bots().cloned().collect();
        assert_eq!(bots.len(), 3);
        assert_eq!(bots[0].user_id, -1);
        assert_eq!(bots[2].user_id, -3);
        assert_ne!(bots[0].name, bots[1].name);
    }

    #[tokio::test]
    async fn bots_play_a_game_to_the_end() {
        let rooms = RoomManager::new(Arc::new(InMemoryStore::new()));
        let room = rooms.create_room(fast_config()).await.unwrap();
        let mut manager = BotManager::new(room.clone());
        let difficulties = [
            BotDifficulty::Easy,
            BotDifficulty::Standard,
            BotDifficulty::Sharp,
        ];
        for (i, difficulty) in difficulties.into_iter().enumerate() {
            manager
                .add_bot(BotStrategy::with_seed(difficulty, i as u64), difficulty)
                .await
                .unwrap();
        }

        let over = manager.play_game().await.unwrap();
        let snapshot = room.snapshot().await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Finished);

        let total: i64 = snapshot.players.iter().map(|p| p.money).sum();
        assert_eq!(total, 3 * DEFAULT_STARTING_MONEY);
        assert_eq!(over.amounts.winner + over.amounts.runner_up, over.total_pot);

        manager.rematch().await.unwrap();
        let snapshot = room.snapshot().await.unwrap();
        assert_eq!(snapshot.room.status, RoomStatus::Boarding);
    }
}
