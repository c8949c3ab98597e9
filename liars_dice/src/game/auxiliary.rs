//! Re-deal between rounds, the one-shot peek, kicks and voluntary exits.

use rand::Rng;

use super::{
    entities::{Bet, GameOverData, Player, PlayerId, RoomStatus, roll_dice},
    errors::GameError,
    resolution::count_face,
    seating::next_active_player,
    snapshot::RoomSnapshot,
};

impl RoomSnapshot {
    /// Deal the next round after a published resolution.
    ///
    /// Every survivor re-rolls the dice they still hold. The turn goes to
    /// the last loser, or the survivor after them if they were knocked out.
    pub fn advance_round<R: Rng>(&mut self, rng: &mut R) -> Result<PlayerId, GameError> {
        self.require_status(RoomStatus::Playing)?;
        let notification = self.room.notification.take().ok_or_else(|| {
            GameError::InternalStateError("no resolved round to advance".to_string())
        })?;

        for player in &mut self.players {
            if let Some(dice) = player.dice_values.as_mut()
                && !dice.is_empty()
            {
                *dice = roll_dice(rng, dice.len());
            }
        }

        let loser = notification.loser_id;
        let next = if self.player(loser).is_ok_and(Player::is_survivor) {
            loser
        } else {
            next_active_player(loser, &self.players).ok_or_else(|| {
                GameError::InternalStateError("no survivor to deal to".to_string())
            })?
        };
        self.room.current_bet = Bet::NONE;
        self.room.current_turn_player_id = Some(next);
        Ok(next)
    }

    /// Count the dice matching the standing bet's face, for the caller's
    /// eyes only. Usable once per game.
    pub fn peek(&mut self, caller: PlayerId) -> Result<usize, GameError> {
        self.require_status(RoomStatus::Playing)?;
        if !self.room.allow_cheats {
            return Err(GameError::CheatsDisabled);
        }
        let face = self.room.current_bet.face;
        if !self.room.current_bet.is_active() {
            return Err(GameError::NoActiveBet);
        }
        let player = self.player(caller)?;
        if player.has_used_cheat {
            return Err(GameError::CheatAlreadyUsed);
        }
        if !player.is_survivor() {
            return Err(GameError::PlayerEliminated);
        }

        let count = count_face(&self.players, face);
        self.player_mut(caller)?.has_used_cheat = true;
        Ok(count)
    }

    /// Host-only removal of another player.
    pub fn kick_player(&mut self, caller: PlayerId, target: PlayerId) -> Result<Player, GameError> {
        self.require_host(caller)?;
        if caller == target {
            return Err(GameError::CannotKickSelf);
        }
        self.remove_player(target)
    }

    /// Voluntary exit. A departing host hands the role to the earliest
    /// remaining joiner.
    pub fn leave_room(&mut self, caller: PlayerId) -> Result<Player, GameError> {
        let removed = self.remove_player(caller)?;
        if removed.is_host
            && let Some(next_host) = self.players.first_mut()
        {
            next_host.is_host = true;
        }
        Ok(removed)
    }

    /// Delete a row, rerouting the turn over the roster as it stood
    /// before the removal.
    fn remove_player(&mut self, target: PlayerId) -> Result<Player, GameError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.id == target)
            .ok_or(GameError::PlayerNotFound(target))?;

        if self.room.current_turn_player_id == Some(target) {
            self.room.current_turn_player_id =
                next_active_player(target, &self.players).filter(|id| *id != target);
        }
        Ok(self.players.remove(idx))
    }

    /// Ends the game if departures left a single survivor mid-round.
    pub fn settle_after_departure(&mut self) -> Result<Option<GameOverData>, GameError> {
        if self.room.status == RoomStatus::Playing && self.survivor_count() == 1 {
            return self.finish_game(None).map(Some);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Notification, NotificationKind, Room, RoomCode};
    use rand::{SeedableRng, rngs::StdRng};

    fn table(hands: &[&[u8]]) -> RoomSnapshot {
        let mut room = Room::new(RoomCode::new("AUXAUX"), 100, true);
        room.status = RoomStatus::Playing;
        let players: Vec<Player> = hands
            .iter()
            .enumerate()
            .map(|(i, hand)| {
                let mut p = Player::new(i as i64, &format!("p{i}"), i == 0, 0);
                p.seat_index = Some(i);
                p.dice_values = Some(hand.to_vec());
                p
            })
            .collect();
        room.current_turn_player_id = Some(players[0].id);
        RoomSnapshot::new(room, players)
    }

    fn pending(snapshot: &mut RoomSnapshot, loser: PlayerId) {
        snapshot.room.notification = Some(Notification {
            message: "resolved".to_string(),
            kind: NotificationKind::Error,
            loser_id: loser,
            timestamp: 1,
        });
    }

    #[test]
    fn advance_rerolls_keeping_dice_counts() {
        let mut snapshot = table(&[&[1, 1, 1], &[2, 2], &[]]);
        let p1 = snapshot.players[1].id;
        pending(&mut snapshot, p1);

        let mut rng = StdRng::seed_from_u64(9);
        let next = snapshot.advance_round(&mut rng).unwrap();

        assert_eq!(next, p1);
        assert_eq!(snapshot.players[0].dice_count(), 3);
        assert_eq!(snapshot.players[1].dice_count(), 2);
        assert!(snapshot.players[2].is_eliminated());
        assert!(snapshot.room.notification.is_none());
        assert_eq!(snapshot.room.current_turn_player_id, Some(p1));
    }

    #[test]
    fn advance_skips_an_eliminated_loser() {
        let mut snapshot = table(&[&[1, 1], &[], &[3]]);
        let p1 = snapshot.players[1].id;
        let p2 = snapshot.players[2].id;
        pending(&mut snapshot, p1);

        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(snapshot.advance_round(&mut rng), Ok(p2));
    }

    #[test]
    fn advance_without_a_resolution_fails() {
        let mut snapshot = table(&[&[1], &[2]]);
        let mut rng = StdRng::seed_from_u64(9);
        assert!(snapshot.advance_round(&mut rng).is_err());
    }

    #[test]
    fn peek_counts_once() {
        let mut snapshot = table(&[&[4, 4, 1], &[4, 2], &[6]]);
        let p1 = snapshot.players[1].id;
        snapshot.room.current_bet = Bet::new(2, 4);

        assert_eq!(snapshot.peek(p1), Ok(3));
        assert!(snapshot.player(p1).unwrap().has_used_cheat);
        assert_eq!(snapshot.peek(p1), Err(GameError::CheatAlreadyUsed));
    }

    #[test]
    fn peek_needs_cheats_and_a_bet() {
        let mut snapshot = table(&[&[4], &[4]]);
        let p0 = snapshot.players[0].id;
        assert_eq!(snapshot.peek(p0), Err(GameError::NoActiveBet));

        snapshot.room.current_bet = Bet::new(1, 4);
        snapshot.room.allow_cheats = false;
        assert_eq!(snapshot.peek(p0), Err(GameError::CheatsDisabled));
        assert!(!snapshot.player(p0).unwrap().has_used_cheat);
    }

    #[test]
    fn kicking_the_turn_holder_reroutes_the_turn() {
        let mut snapshot = table(&[&[1], &[2], &[3]]);
        let host = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;
        let p2 = snapshot.players[2].id;
        snapshot.room.current_turn_player_id = Some(p1);

        let removed = snapshot.kick_player(host, p1).unwrap();
        assert_eq!(removed.id, p1);
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.room.current_turn_player_id, Some(p2));
    }

    #[test]
    fn kick_is_host_only_and_not_self() {
        let mut snapshot = table(&[&[1], &[2], &[3]]);
        let host = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;
        let p2 = snapshot.players[2].id;
        assert_eq!(snapshot.kick_player(p1, p2), Err(GameError::NotHost));
        assert_eq!(
            snapshot.kick_player(host, host),
            Err(GameError::CannotKickSelf)
        );
    }

    #[test]
    fn departing_host_hands_over_the_role() {
        let mut snapshot = table(&[&[1], &[2], &[3]]);
        let host = snapshot.players[0].id;
        snapshot.leave_room(host).unwrap();
        assert!(snapshot.players[0].is_host);
        assert_eq!(snapshot.players.iter().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn departure_down_to_one_survivor_ends_the_game() {
        let mut snapshot = table(&[&[1], &[2]]);
        snapshot.room.pot = 200;
        let p1 = snapshot.players[1].id;
        snapshot.leave_room(p1).unwrap();

        let data = snapshot.settle_after_departure().unwrap().unwrap();
        assert_eq!(data.amounts.winner, 200);
        assert_eq!(snapshot.room.status, RoomStatus::Finished);
    }
}
