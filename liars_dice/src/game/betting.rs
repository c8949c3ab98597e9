//! Bet escalation.

use super::{
    constants::MAX_FACE,
    entities::{Bet, PlayerId},
    errors::GameError,
    seating::next_active_player,
    snapshot::RoomSnapshot,
};

/// Checks that `proposed` may follow `current`.
///
/// Once a bet is active the quantity has to strictly increase; the face is
/// free. The quantity can't exceed the dice still on the table.
pub fn validate_escalation(
    current: Bet,
    proposed: Bet,
    dice_in_play: usize,
) -> Result<(), GameError> {
    if !(1..=MAX_FACE).contains(&proposed.face) {
        return Err(GameError::InvalidFace(proposed.face));
    }
    if proposed.quantity == 0 {
        return Err(GameError::InvalidQuantity);
    }
    if current.is_active() && proposed.quantity <= current.quantity {
        return Err(GameError::BetNotEscalated { current });
    }
    if proposed.quantity as usize > dice_in_play {
        return Err(GameError::QuantityExceedsDice {
            in_play: dice_in_play,
        });
    }
    Ok(())
}

impl RoomSnapshot {
    /// Raise the standing bet and pass the turn. Returns who acts next.
    pub fn place_bet(&mut self, caller: PlayerId, bet: Bet) -> Result<PlayerId, GameError> {
        self.require_turn(caller)?;
        if !self.player(caller)?.is_survivor() {
            return Err(GameError::PlayerEliminated);
        }
        validate_escalation(self.room.current_bet, bet, self.dice_in_play())?;

        let next = next_active_player(caller, &self.players).ok_or_else(|| {
            GameError::InternalStateError("no survivor to pass the turn to".to_string())
        })?;
        self.room.current_bet = bet;
        self.room.current_turn_player_id = Some(next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Player, Room, RoomCode, RoomStatus};

    fn table() -> RoomSnapshot {
        let mut room = Room::new(RoomCode::new("BETS00"), 100, false);
        room.status = RoomStatus::Playing;
        let players: Vec<Player> = (0..3)
            .map(|i| {
                let mut p = Player::new(i, &format!("p{i}"), i == 0, 0);
                p.seat_index = Some(i as usize);
                p.dice_values = Some(vec![2, 3, 4, 5, 6]);
                p
            })
            .collect();
        room.current_turn_player_id = Some(players[0].id);
        RoomSnapshot::new(room, players)
    }

    #[test]
    fn first_bet_passes_turn_forward() {
        let mut snapshot = table();
        let p0 = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;

        assert_eq!(snapshot.place_bet(p0, Bet::new(2, 3)), Ok(p1));
        assert_eq!(snapshot.room.current_bet, Bet::new(2, 3));
        assert_eq!(snapshot.room.current_turn_player_id, Some(p1));
    }

    #[test]
    fn quantity_must_strictly_increase_regardless_of_face() {
        let mut snapshot = table();
        let p0 = snapshot.players[0].id;
        let p1 = snapshot.players[1].id;
        snapshot.place_bet(p0, Bet::new(3, 2)).unwrap();

        assert_eq!(
            snapshot.place_bet(p1, Bet::new(3, 6)),
            Err(GameError::BetNotEscalated {
                current: Bet::new(3, 2)
            })
        );
        assert_eq!(snapshot.room.current_bet, Bet::new(3, 2));
        assert_eq!(snapshot.room.current_turn_player_id, Some(p1));

        // a lower face with a higher quantity is fine
        snapshot.place_bet(p1, Bet::new(4, 1)).unwrap();
        assert_eq!(snapshot.room.current_bet, Bet::new(4, 1));
    }

    #[test]
    fn out_of_turn_bets_are_rejected() {
        let mut snapshot = table();
        let p2 = snapshot.players[2].id;
        assert_eq!(
            snapshot.place_bet(p2, Bet::new(1, 1)),
            Err(GameError::OutOfTurnAction)
        );
    }

    #[test]
    fn bets_are_rejected_while_a_resolution_is_pending() {
        let mut snapshot = table();
        let p0 = snapshot.players[0].id;
        snapshot.room.notification = Some(crate::game::entities::Notification {
            message: "pending".to_string(),
            kind: crate::game::entities::NotificationKind::Success,
            loser_id: p0,
            timestamp: 1,
        });
        assert_eq!(
            snapshot.place_bet(p0, Bet::new(1, 1)),
            Err(GameError::RoundPending)
        );
    }

    #[test]
    fn validates_face_and_quantity_bounds() {
        assert_eq!(
            validate_escalation(Bet::NONE, Bet::new(1, 0), 10),
            Err(GameError::InvalidFace(0))
        );
        assert_eq!(
            validate_escalation(Bet::NONE, Bet::new(1, 7), 10),
            Err(GameError::InvalidFace(7))
        );
        assert_eq!(
            validate_escalation(Bet::NONE, Bet::new(0, 3), 10),
            Err(GameError::InvalidQuantity)
        );
        assert_eq!(
            validate_escalation(Bet::NONE, Bet::new(11, 3), 10),
            Err(GameError::QuantityExceedsDice { in_play: 10 })
        );
        assert_eq!(validate_escalation(Bet::NONE, Bet::new(10, 3), 10), Ok(()));
    }

    #[test]
    fn turn_skips_eliminated_players() {
        let mut snapshot = table();
        snapshot.players[1].dice_values = Some(vec![]);
        let p0 = snapshot.players[0].id;
        let p2 = snapshot.players[2].id;
        assert_eq!(snapshot.place_bet(p0, Bet::new(1, 4)), Ok(p2));
    }
}
