//! Game-over detection and pot distribution.

use super::{
    constants::{PAYOUT_ROUNDING, RUNNER_UP_SHARE_PERCENT, WINNER_SHARE_PERCENT},
    entities::{Bet, Coins, GameOverData, PayoutAmounts, PlayerId, RoomStatus},
    errors::GameError,
    snapshot::RoomSnapshot,
};

/// `pot * percent / 100`, rounded half-up to the nearest payout unit.
fn rounded_share(pot: Coins, percent: Coins) -> Coins {
    let unit = PAYOUT_ROUNDING;
    (2 * pot * percent + 100 * unit).div_euclid(200 * unit) * unit
}

/// Split the pot between winner and runner-up.
///
/// Two participants: winner takes everything. Three or more: 80/20,
/// each rounded to the nearest 50, with the rounding remainder folded
/// into the winner's share so the two always sum to `pot`.
#[must_use]
pub fn split_pot(pot: Coins, participants: usize) -> PayoutAmounts {
    if participants < 3 {
        return PayoutAmounts {
            winner: pot,
            runner_up: 0,
        };
    }
    let winner = rounded_share(pot, WINNER_SHARE_PERCENT);
    let runner_up = rounded_share(pot, RUNNER_UP_SHARE_PERCENT);
    let remainder = pot - winner - runner_up;
    PayoutAmounts {
        winner: winner + remainder,
        runner_up,
    }
}

impl RoomSnapshot {
    /// `playing → finished`. Requires exactly one survivor.
    ///
    /// `runner_up` is whoever lost the final adjudication; without one
    /// (the game ended through departures) the winner takes the pot.
    pub fn finish_game(&mut self, runner_up: Option<PlayerId>) -> Result<GameOverData, GameError> {
        self.require_status(RoomStatus::Playing)?;
        let (winner_id, winner_name) = {
            let mut survivors = self.survivors();
            match (survivors.next(), survivors.next()) {
                (Some(winner), None) => (winner.id, winner.name.clone()),
                _ => {
                    return Err(GameError::InternalStateError(format!(
                        "game over needs exactly one survivor, found {}",
                        self.survivor_count()
                    )));
                }
            }
        };

        let runner_up = runner_up
            .and_then(|id| self.players.iter().find(|p| p.id == id))
            .map(|p| (p.id, p.name.clone()));

        // everyone dealt in this game, including players who have since left
        let mut participants = self.room.participants.clone();
        for player in self.players.iter().filter(|p| p.seat_index.is_some()) {
            if !participants.contains(&player.id) {
                participants.push(player.id);
            }
        }

        let pot = self.room.pot;
        let amounts = match runner_up {
            Some(_) => split_pot(pot, participants.len()),
            None => PayoutAmounts {
                winner: pot,
                runner_up: 0,
            },
        };

        let losing_ids = participants
            .into_iter()
            .filter(|id| *id != winner_id)
            .collect();

        for player in &mut self.players {
            if player.id == winner_id {
                player.money += amounts.winner;
            } else if runner_up.as_ref().is_some_and(|(id, _)| *id == player.id) {
                player.money += amounts.runner_up;
            }
            player.current_contribution = 0;
        }

        let data = GameOverData {
            winner_id,
            winner_name,
            runner_up_id: runner_up.as_ref().map(|(id, _)| *id),
            runner_up_name: runner_up.map(|(_, name)| name),
            amounts,
            losing_ids,
            total_pot: pot,
        };

        log::info!(
            "Room {}: {} wins ${} of ${}",
            self.room.code,
            data.winner_name,
            amounts.winner,
            pot
        );

        self.room.pot = 0;
        self.room.current_turn_player_id = None;
        self.room.current_bet = Bet::NONE;
        self.room.notification = None;
        self.room.game_over = Some(data.clone());
        self.room.status = RoomStatus::Finished;
        Ok(data)
    }
}
