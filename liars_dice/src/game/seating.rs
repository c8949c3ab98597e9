//! Seat assignment and turn-order derivation.
//!
//! Turn order is always derived from the live roster handed in by the
//! caller. Players are removed physically on kick or exit, so nothing here
//! keeps positions between calls.

use rand::{Rng, seq::SliceRandom};

use super::entities::{Player, PlayerId};

/// Shuffle the ready players into seats `0..k`.
///
/// The shuffle is a Fisher–Yates permutation. Players that are not ready
/// lose any seat they held. Returns the ready players' ids in seat order,
/// so the first element takes the first turn.
pub fn assign_seats<R: Rng>(players: &mut [Player], rng: &mut R) -> Vec<PlayerId> {
    let mut ready: Vec<usize> = players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_ready)
        .map(|(idx, _)| idx)
        .collect();
    ready.shuffle(rng);

    for player in players.iter_mut() {
        player.seat_index = None;
    }

    ready
        .into_iter()
        .enumerate()
        .map(|(seat, idx)| {
            players[idx].seat_index = Some(seat);
            players[idx].id
        })
        .collect()
}

/// Roster sorted by seat. Unseated players trail in join order.
#[must_use]
pub fn seat_order(roster: &[Player]) -> Vec<&Player> {
    let mut ordered: Vec<&Player> = roster.iter().collect();
    ordered.sort_by_key(|p| p.seat_index.unwrap_or(usize::MAX));
    ordered
}

/// First survivor strictly after `from` in seat order, wrapping around.
///
/// `from` itself is the last candidate considered. If `from` is no longer
/// on the roster the scan starts at the first seat. Returns `None` when
/// nobody holds dice.
#[must_use]
pub fn next_active_player(from: PlayerId, roster: &[Player]) -> Option<PlayerId> {
    let ordered = seat_order(roster);
    let n = ordered.len();
    let start = ordered
        .iter()
        .position(|p| p.id == from)
        .map_or(0, |idx| idx + 1);
    (0..n)
        .map(|step| ordered[(start + step) % n])
        .find(|p| p.is_survivor())
        .map(|p| p.id)
}

/// Closest survivor before `from` in seat order, wrapping around.
///
/// This is whoever placed the bet `from` is now facing. Never returns
/// `from` itself.
#[must_use]
pub fn previous_active_player(from: PlayerId, roster: &[Player]) -> Option<PlayerId> {
    let ordered = seat_order(roster);
    let n = ordered.len();
    let idx = ordered.iter().position(|p| p.id == from)?;
    (1..n)
        .map(|step| ordered[(idx + n - step) % n])
        .find(|p| p.is_survivor())
        .map(|p| p.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn seated(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| {
                let mut p = Player::new(i as i64, &format!("p{i}"), i == 0, 0);
                p.seat_index = Some(i);
                p.dice_values = Some(vec![1, 2, 3]);
                p
            })
            .collect()
    }

    #[test]
    fn assigns_contiguous_seats_to_ready_players() {
        let mut players = seated(5);
        for p in &mut players {
            p.is_ready = true;
        }
        players[2].is_ready = false;

        let mut rng = StdRng::seed_from_u64(1);
        let order = assign_seats(&mut players, &mut rng);

        assert_eq!(order.len(), 4);
        assert_eq!(players[2].seat_index, None);
        let mut seats: Vec<usize> = players.iter().filter_map(|p| p.seat_index).collect();
        seats.sort_unstable();
        assert_eq!(seats, vec![0, 1, 2, 3]);

        let first = players.iter().find(|p| p.seat_index == Some(0)).unwrap();
        assert_eq!(order[0], first.id);
    }

    #[test]
    fn seating_varies_with_the_rng() {
        let mut distinct = std::collections::HashSet::new();
        for seed in 0..20 {
            let mut players = seated(6);
            for p in &mut players {
                p.is_ready = true;
            }
            let mut rng = StdRng::seed_from_u64(seed);
            let order = assign_seats(&mut players, &mut rng);
            let positions: Vec<usize> = order
                .iter()
                .map(|id| players.iter().position(|p| p.id == *id).unwrap())
                .collect();
            distinct.insert(positions);
        }
        assert!(distinct.len() > 1, "seating should be randomized");
    }

    #[test]
    fn next_wraps_around_the_table() {
        let players = seated(3);
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        assert_eq!(next_active_player(ids[0], &players), Some(ids[1]));
        assert_eq!(next_active_player(ids[2], &players), Some(ids[0]));
    }

    #[test]
    fn next_skips_eliminated_players() {
        let mut players = seated(4);
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        players[1].dice_values = Some(vec![]);
        players[2].dice_values = Some(vec![]);
        assert_eq!(next_active_player(ids[0], &players), Some(ids[3]));
    }

    #[test]
    fn next_follows_seats_not_roster_order() {
        let mut players = seated(3);
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        players[0].seat_index = Some(2);
        players[2].seat_index = Some(0);
        // seat order: p2, p1, p0
        assert_eq!(next_active_player(ids[2], &players), Some(ids[1]));
        assert_eq!(next_active_player(ids[0], &players), Some(ids[2]));
    }

    #[test]
    fn next_returns_none_without_survivors() {
        let mut players = seated(2);
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        for p in &mut players {
            p.dice_values = Some(vec![]);
        }
        assert_eq!(next_active_player(ids[0], &players), None);
    }

    #[test]
    fn next_from_missing_player_starts_at_first_seat() {
        let players = seated(3);
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        assert_eq!(next_active_player(PlayerId::new(), &players), Some(ids[0]));
    }

    #[test]
    fn previous_skips_eliminated_and_wraps() {
        let mut players = seated(4);
        let ids: Vec<PlayerId> = players.iter().map(|p| p.id).collect();
        players[3].dice_values = Some(vec![]);
        assert_eq!(previous_active_player(ids[0], &players), Some(ids[2]));
        assert_eq!(previous_active_player(ids[2], &players), Some(ids[1]));
    }

    #[test]
    fn previous_never_returns_self() {
        let mut players = seated(2);
        players[1].dice_values = Some(vec![]);
        assert_eq!(previous_active_player(players[0].id, &players), None);
    }
}
