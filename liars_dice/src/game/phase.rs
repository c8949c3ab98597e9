//! Room phase controller: `waiting → boarding → playing → finished`.

use rand::Rng;

use super::{
    constants::{DICE_PER_PLAYER, MIN_PLAYERS},
    entities::{Bet, Coins, PlayerId, RoomStatus, roll_dice},
    errors::GameError,
    seating::assign_seats,
    snapshot::RoomSnapshot,
};

/// A transition that is due but has not been applied yet.
///
/// Any observer can derive these from a snapshot and apply them, so a
/// transition abandoned by one writer is picked up by the next one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    /// Everyone present has paid; deal the round.
    StartRound,
    /// A resolution was published and the table waits for the re-deal.
    AdvanceRound,
    /// One survivor is left but the payout hasn't been written.
    FinishGame,
}

impl RoomSnapshot {
    pub fn update_entry_fee(&mut self, caller: PlayerId, fee: Coins) -> Result<(), GameError> {
        self.require_host(caller)?;
        self.require_status(RoomStatus::Waiting)?;
        if fee < 0 {
            return Err(GameError::InvalidEntryFee);
        }
        self.room.entry_fee = fee;
        Ok(())
    }

    /// Flip whether players may peek. Returns the new setting.
    pub fn toggle_cheats(&mut self, caller: PlayerId) -> Result<bool, GameError> {
        self.require_host(caller)?;
        self.room.allow_cheats = !self.room.allow_cheats;
        Ok(self.room.allow_cheats)
    }

    /// `waiting → boarding`. Everyone has to pay again.
    pub fn open_table(&mut self, caller: PlayerId) -> Result<(), GameError> {
        self.require_host(caller)?;
        self.require_status(RoomStatus::Waiting)?;
        for player in &mut self.players {
            player.is_ready = false;
        }
        self.room.status = RoomStatus::Boarding;
        Ok(())
    }

    /// Pay the entry fee for the current boarding cycle.
    pub fn pay_entry(&mut self, caller: PlayerId) -> Result<(), GameError> {
        self.require_status(RoomStatus::Boarding)?;
        let fee = self.room.entry_fee;
        let player = self.player_mut(caller)?;
        if player.is_ready {
            return Err(GameError::AlreadyReady);
        }
        if player.money < fee {
            return Err(GameError::InsufficientFunds {
                required: fee,
                available: player.money,
            });
        }
        player.money -= fee;
        player.current_contribution += fee;
        player.is_ready = true;
        Ok(())
    }

    /// Every player present has paid and there are enough of them.
    #[must_use]
    pub fn ready_to_start(&self) -> bool {
        self.room.status == RoomStatus::Boarding
            && self.players.len() >= MIN_PLAYERS
            && self.players.iter().all(|p| p.is_ready)
    }

    /// Pot the boarding → playing transition writes and then verifies.
    #[must_use]
    pub fn expected_pot(&self) -> Coins {
        self.total_contributions()
    }

    /// `boarding → playing`: collect the pot, seat, deal and hand the
    /// first turn to seat 0. Returns the first player to act.
    pub fn start_round<R: Rng>(&mut self, rng: &mut R) -> Result<PlayerId, GameError> {
        self.require_status(RoomStatus::Boarding)?;
        if !self.ready_to_start() {
            return Err(GameError::NotEnoughPlayers);
        }

        self.room.pot = self.expected_pot();
        let order = assign_seats(&mut self.players, rng);
        for player in &mut self.players {
            player.dice_values = if player.is_ready {
                Some(roll_dice(rng, DICE_PER_PLAYER))
            } else {
                None
            };
        }

        let first = *order
            .first()
            .ok_or_else(|| GameError::InternalStateError("no seated players".into()))?;
        self.room.participants = order;
        self.room.current_turn_player_id = Some(first);
        self.room.current_bet = Bet::NONE;
        self.room.notification = None;
        self.room.game_over = None;
        self.room.status = RoomStatus::Playing;
        Ok(first)
    }

    /// `finished → waiting`, or straight to `boarding` when `reopen` is set.
    pub fn reset_room(&mut self, caller: PlayerId, reopen: bool) -> Result<(), GameError> {
        self.require_host(caller)?;
        self.require_status(RoomStatus::Finished)?;
        for player in &mut self.players {
            player.dice_values = None;
            player.current_contribution = 0;
            player.seat_index = None;
            player.has_used_cheat = false;
            player.is_ready = false;
        }
        self.room.pot = 0;
        self.room.current_turn_player_id = None;
        self.room.current_bet = Bet::NONE;
        self.room.notification = None;
        self.room.game_over = None;
        self.room.participants.clear();
        self.room.status = if reopen {
            RoomStatus::Boarding
        } else {
            RoomStatus::Waiting
        };
        Ok(())
    }

    #[must_use]
    pub fn pending_transition(&self) -> Option<Transition> {
        match self.room.status {
            RoomStatus::Boarding if self.ready_to_start() => Some(Transition::StartRound),
            RoomStatus::Playing if self.survivor_count() == 1 => Some(Transition::FinishGame),
            RoomStatus::Playing if self.room.notification.is_some() => {
                Some(Transition::AdvanceRound)
            }
            _ => None,
        }
    }
}
