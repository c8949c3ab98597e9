//! Round resolution: counting the table and adjudicating a challenge.

use serde::{Deserialize, Serialize};

use super::{
    entities::{
        Bet, ChallengeAction, Face, GameOverData, Notification, NotificationKind, Player, PlayerId,
    },
    errors::GameError,
    seating::{next_active_player, previous_active_player},
    snapshot::RoomSnapshot,
};

/// Dice across the whole table showing `face`. Ones are not wild.
#[must_use]
pub fn count_face(players: &[Player], face: Face) -> usize {
    players
        .iter()
        .filter_map(|p| p.dice_values.as_ref())
        .flatten()
        .filter(|&&d| d == face)
        .count()
}

/// Which side of a challenge loses a die.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Loser {
    Caller,
    Accused,
}

/// Decide a challenge.
///
/// | action | condition                  | loser   |
/// |--------|----------------------------|---------|
/// | Liar   | `true_count >= quantity`   | caller  |
/// | Liar   | `true_count < quantity`    | accused |
/// | Exact  | `true_count == quantity`   | accused |
/// | Exact  | otherwise                  | caller  |
#[must_use]
pub fn adjudicate(action: ChallengeAction, true_count: usize, quantity: u32) -> Loser {
    let quantity = quantity as usize;
    match action {
        ChallengeAction::Liar if true_count >= quantity => Loser::Caller,
        ChallengeAction::Liar => Loser::Accused,
        ChallengeAction::Exact if true_count == quantity => Loser::Accused,
        ChallengeAction::Exact => Loser::Caller,
    }
}

/// What happens to the room after a resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoundOutcome {
    /// More than one survivor; `next_turn` opens the next round.
    Continue { next_turn: PlayerId },
    /// The loser's last die decided the game.
    GameOver(GameOverData),
}

/// Result of one adjudicated challenge.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resolution {
    pub action: ChallengeAction,
    pub bet: Bet,
    pub caller: PlayerId,
    pub accused: PlayerId,
    pub true_count: usize,
    pub loser: PlayerId,
    pub loser_eliminated: bool,
    pub outcome: RoundOutcome,
}

impl RoomSnapshot {
    /// Challenge the standing bet as the current-turn player.
    ///
    /// The loser drops one die. With a single survivor left the game is
    /// paid out, otherwise the bet is cleared, the turn goes to the loser
    /// (or the next survivor) and a notification is published.
    pub fn resolve(
        &mut self,
        caller: PlayerId,
        action: ChallengeAction,
        now_ms: i64,
    ) -> Result<Resolution, GameError> {
        self.require_turn(caller)?;
        let bet = self.room.current_bet;
        if !bet.is_active() {
            return Err(GameError::NoActiveBet);
        }
        let accused = previous_active_player(caller, &self.players).ok_or(GameError::NoAccused)?;

        let true_count = count_face(&self.players, bet.face);
        let loser = match adjudicate(action, true_count, bet.quantity) {
            Loser::Caller => caller,
            Loser::Accused => accused,
        };

        let loser_player = self.player_mut(loser)?;
        if let Some(dice) = loser_player.dice_values.as_mut() {
            dice.pop();
        }
        let loser_eliminated = loser_player.is_eliminated();
        let loser_name = loser_player.name.clone();

        log::debug!(
            "Room {}: {} on {} counted {}, {} loses a die",
            self.room.code,
            action,
            bet,
            true_count,
            loser_name
        );

        let outcome = if self.survivor_count() == 1 {
            RoundOutcome::GameOver(self.finish_game(Some(loser))?)
        } else {
            let next_turn = if loser_eliminated {
                next_active_player(loser, &self.players).ok_or_else(|| {
                    GameError::InternalStateError("no survivor after resolution".to_string())
                })?
            } else {
                loser
            };
            let caller_name = self.player(caller)?.name.clone();
            let accused_name = self.player(accused)?.name.clone();
            let kind = if loser == accused {
                NotificationKind::Success
            } else {
                NotificationKind::Error
            };
            let mut message = format!(
                "{caller_name} called {action} on {accused_name}'s {bet}: the table had {true_count}. {loser_name} loses a die."
            );
            if loser_eliminated {
                message.push_str(&format!(" {loser_name} is out!"));
            }

            self.room.current_bet = Bet::NONE;
            self.room.current_turn_player_id = Some(next_turn);
            self.room.notification = Some(Notification {
                message,
                kind,
                loser_id: loser,
                timestamp: now_ms,
            });
            RoundOutcome::Continue { next_turn }
        };

        Ok(Resolution {
            action,
            bet,
            caller,
            accused,
            true_count,
            loser,
            loser_eliminated,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Room, RoomCode, RoomStatus};

    fn table(hands: &[&[Face]]) -> RoomSnapshot {
        let mut room = Room::new(RoomCode::new("RESOLV"), 100, false);
        room.status = RoomStatus::Playing;
        room.pot = 100 * hands.len() as i64;
        let players: Vec<Player> = hands
            .iter()
            .enumerate()
            .map(|(i, hand)| {
                let mut p = Player::new(i as i64, &format!("p{i}"), i == 0, 0);
                p.seat_index = Some(i);
                p.dice_values = Some(hand.to_vec());
                p.current_contribution = 100;
                p.is_ready = true;
                p
            })
            .collect();
        RoomSnapshot::new(room, players)
    }

    #[test]
    fn counts_exact_faces_only() {
        let snapshot = table(&[&[1, 3, 3], &[3, 1, 6], &[]]);
        assert_eq!(count_face(&snapshot.players, 3), 3);
        assert_eq!(count_face(&snapshot.players, 1), 2);
        assert_eq!(count_face(&snapshot.players, 2), 0);
    }

    #[test]
    fn liar_boundaries() {
        assert_eq!(adjudicate(ChallengeAction::Liar, 3, 4), Loser::Accused);
        assert_eq!(adjudicate(ChallengeAction::Liar, 4, 4), Loser::Caller);
        assert_eq!(adjudicate(ChallengeAction::Liar, 5, 4), Loser::Caller);
    }

    #[test]
    fn exact_boundaries() {
        assert_eq!(adjudicate(ChallengeAction::Exact, 3, 4), Loser::Caller);
        assert_eq!(adjudicate(ChallengeAction::Exact, 4, 4), Loser::Accused);
        assert_eq!(adjudicate(ChallengeAction::Exact, 5, 4), Loser::Caller);
    }

    #[test]
    fn liar_on_an_overstated_bet_punishes_the_accused() {
        // three 3s on the table against a bet of four 3s
        let mut snapshot = table(&[&[3, 3, 1, 2, 5], &[3, 6, 6, 2, 1], &[4, 4, 4, 5, 5]]);
        let p0 = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;
        snapshot.room.current_bet = Bet::new(4, 3);
        snapshot.room.current_turn_player_id = Some(p1);

        let resolution = snapshot.resolve(p1, ChallengeAction::Liar, 10).unwrap();
        assert_eq!(resolution.accused, p0);
        assert_eq!(resolution.true_count, 3);
        assert_eq!(resolution.loser, p0);
        assert_eq!(snapshot.player(p0).unwrap().dice_count(), 4);
        assert_eq!(resolution.outcome, RoundOutcome::Continue { next_turn: p0 });
        assert_eq!(snapshot.room.current_bet, Bet::NONE);
        assert_eq!(snapshot.room.current_turn_player_id, Some(p0));

        let notification = snapshot.room.notification.as_ref().unwrap();
        assert_eq!(notification.loser_id, p0);
        assert_eq!(notification.kind, NotificationKind::Success);
        assert_eq!(notification.timestamp, 10);
    }

    #[test]
    fn exact_call_on_an_exact_bet_punishes_the_accused() {
        let mut snapshot = table(&[&[3, 3, 1, 2, 5], &[3, 3, 6, 2, 1], &[4, 4, 4, 5, 5]]);
        let p1 = snapshot.players[1].id;
        let p2 = snapshot.players[2].id;
        snapshot.room.current_bet = Bet::new(4, 3);
        snapshot.room.current_turn_player_id = Some(p2);

        let resolution = snapshot.resolve(p2, ChallengeAction::Exact, 0).unwrap();
        assert_eq!(resolution.accused, p1);
        assert_eq!(resolution.true_count, 4);
        assert_eq!(resolution.loser, p1);
    }

    #[test]
    fn losing_the_last_die_eliminates_but_keeps_the_row() {
        let mut snapshot = table(&[&[2], &[5, 5], &[5, 5]]);
        let p0 = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;
        let p2 = snapshot.players[2].id;
        snapshot.room.current_bet = Bet::new(1, 5);
        snapshot.room.current_turn_player_id = Some(p0);

        // the bet holds, so the caller loses
        let resolution = snapshot.resolve(p0, ChallengeAction::Liar, 0).unwrap();
        assert_eq!(resolution.loser, p0);
        assert!(resolution.loser_eliminated);
        assert_eq!(snapshot.players.len(), 3);
        assert!(snapshot.player(p0).unwrap().is_eliminated());
        assert_eq!(resolution.outcome, RoundOutcome::Continue { next_turn: p1 });

        // the eliminated player is skipped from then on
        assert_eq!(next_active_player(p2, &snapshot.players), Some(p1));
    }

    #[test]
    fn final_elimination_finishes_the_game() {
        let mut snapshot = table(&[&[2], &[5, 5], &[]]);
        let p0 = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;
        snapshot.room.current_bet = Bet::new(2, 5);
        snapshot.room.current_turn_player_id = Some(p0);

        let resolution = snapshot.resolve(p0, ChallengeAction::Liar, 0).unwrap();
        match resolution.outcome {
            RoundOutcome::GameOver(data) => {
                assert_eq!(data.winner_id, p1);
                assert_eq!(data.runner_up_id, Some(p0));
                assert_eq!(data.total_pot, 300);
            }
            other => panic!("expected game over, got {other:?}"),
        }
        assert_eq!(snapshot.room.status, RoomStatus::Finished);
        assert_eq!(snapshot.room.current_turn_player_id, None);
    }

    #[test]
    fn resolving_without_a_bet_is_rejected() {
        let mut snapshot = table(&[&[1], &[2]]);
        let p0 = snapshot.players[0].id;
        snapshot.room.current_turn_player_id = Some(p0);
        assert_eq!(
            snapshot.resolve(p0, ChallengeAction::Liar, 0),
            Err(GameError::NoActiveBet)
        );
    }
}
