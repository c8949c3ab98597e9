use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::constants::{self, MAX_FACE};

/// Type alias for whole coins. Entry fees, pots and balances are all
/// whole amounts.
pub type Coins = i64;

/// Identity of the account behind a player. Distinct from the seat id.
pub type UserId = i64;

/// A die face, `1..=6`.
pub type Face = u8;

/// Type alias for seat positions during a round.
pub type SeatIndex = usize;

/// Identifier of one seated participant in one room.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PlayerId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Short shareable room identifier.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_ascii_uppercase())
    }

    /// Draw a fresh random code. Uniqueness is the caller's concern.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let alphabet = constants::ROOM_CODE_ALPHABET;
        let code = (0..constants::ROOM_CODE_LENGTH)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for RoomCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<&str> for RoomCode {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Coarse room lifecycle.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Boarding,
    Playing,
    Finished,
}

impl RoomStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Boarding => "boarding",
            Self::Playing => "playing",
            Self::Finished => "finished",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "boarding" => Ok(Self::Boarding),
            "playing" => Ok(Self::Playing),
            "finished" => Ok(Self::Finished),
            other => Err(format!("unknown room status '{other}'")),
        }
    }
}

/// A claim that at least `quantity` dice on the table show `face`.
///
/// `quantity == 0` means no bet is active. Only the quantity escalates;
/// the face carries no ordering weight.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Bet {
    pub quantity: u32,
    pub face: Face,
}

impl Bet {
    pub const NONE: Self = Self {
        quantity: 0,
        face: 0,
    };

    #[must_use]
    pub const fn new(quantity: u32, face: Face) -> Self {
        Self { quantity, face }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.quantity > 0
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_active() {
            write!(f, "{} × {}", self.quantity, self.face)
        } else {
            write!(f, "no bet")
        }
    }
}

/// The two ways the current-turn player can challenge the standing bet.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChallengeAction {
    /// The bet overstates the table.
    Liar,
    /// The bet is exactly right.
    Exact,
}

impl fmt::Display for ChallengeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Liar => "liar",
            Self::Exact => "exact",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Outcome of the last adjudication, shown to every client until the
/// next round is dealt. Clients dedupe on `timestamp`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
    pub loser_id: PlayerId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Amounts credited at game over.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PayoutAmounts {
    pub winner: Coins,
    pub runner_up: Coins,
}

/// Payout summary written when a room finishes.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameOverData {
    pub winner_id: PlayerId,
    pub winner_name: String,
    pub runner_up_id: Option<PlayerId>,
    pub runner_up_name: Option<String>,
    pub amounts: PayoutAmounts,
    pub losing_ids: Vec<PlayerId>,
    pub total_pot: Coins,
}

/// The shared record for one game instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Room {
    pub code: RoomCode,
    pub status: RoomStatus,
    pub pot: Coins,
    pub entry_fee: Coins,
    pub current_turn_player_id: Option<PlayerId>,
    pub current_bet: Bet,
    pub allow_cheats: bool,
    pub notification: Option<Notification>,
    pub game_over: Option<GameOverData>,
    /// Everyone seated when the round started. Departures don't shrink it.
    pub participants: Vec<PlayerId>,
    /// Bumped by the store on every room write. Writers pass the version
    /// they read to reject stale updates.
    pub version: u64,
}

impl Room {
    #[must_use]
    pub fn new(code: RoomCode, entry_fee: Coins, allow_cheats: bool) -> Self {
        Self {
            code,
            status: RoomStatus::Waiting,
            pot: 0,
            entry_fee,
            current_turn_player_id: None,
            current_bet: Bet::NONE,
            allow_cheats,
            notification: None,
            game_over: None,
            participants: Vec::new(),
            version: 0,
        }
    }
}

/// A seated participant within a room.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub user_id: UserId,
    pub name: String,
    pub is_host: bool,
    pub money: Coins,
    /// `None` until dealt; empty once eliminated.
    pub dice_values: Option<Vec<Face>>,
    pub is_ready: bool,
    pub seat_index: Option<SeatIndex>,
    pub current_contribution: Coins,
    pub has_used_cheat: bool,
    pub joined_at: DateTime<Utc>,
}

impl Player {
    #[must_use]
    pub fn new(user_id: UserId, name: &str, is_host: bool, money: Coins) -> Self {
        let mut name: String = name.trim().to_string();
        if let Some((idx, _)) = name.char_indices().nth(constants::MAX_NAME_LENGTH) {
            name.truncate(idx);
        }
        Self {
            id: PlayerId::new(),
            user_id,
            name,
            is_host,
            money,
            dice_values: None,
            is_ready: false,
            seat_index: None,
            current_contribution: 0,
            has_used_cheat: false,
            joined_at: Utc::now(),
        }
    }

    /// Still holds at least one die.
    #[must_use]
    pub fn is_survivor(&self) -> bool {
        self.dice_values.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// Was dealt into the round and has lost every die.
    #[must_use]
    pub fn is_eliminated(&self) -> bool {
        self.dice_values.as_ref().is_some_and(Vec::is_empty)
    }

    #[must_use]
    pub fn dice_count(&self) -> usize {
        self.dice_values.as_ref().map_or(0, Vec::len)
    }
}

/// Roll `count` fresh dice.
pub fn roll_dice<R: Rng>(rng: &mut R, count: usize) -> Vec<Face> {
    (0..count).map(|_| rng.random_range(1..=MAX_FACE)).collect()
}

/// Unicode die glyph for a face.
#[must_use]
pub fn dice_emoji(face: Face) -> Option<char> {
    match face {
        1..=MAX_FACE => char::from_u32(0x2680 + u32::from(face) - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn dice_emoji_maps_every_face() {
        assert_eq!(dice_emoji(1), Some('⚀'));
        assert_eq!(dice_emoji(6), Some('⚅'));
        assert_eq!(dice_emoji(0), None);
        assert_eq!(dice_emoji(7), None);
    }

    #[test]
    fn room_code_is_normalized() {
        assert_eq!(RoomCode::new("  abc123 ").as_str(), "ABC123");
    }

    #[test]
    fn generated_room_codes_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), constants::ROOM_CODE_LENGTH);
            assert!(
                code.as_str()
                    .bytes()
                    .all(|b| constants::ROOM_CODE_ALPHABET.contains(&b))
            );
        }
    }

    #[test]
    fn survivor_and_eliminated_are_exclusive() {
        let mut player = Player::new(1, "alice", false, 100);
        assert!(!player.is_survivor());
        assert!(!player.is_eliminated());

        player.dice_values = Some(vec![3]);
        assert!(player.is_survivor());
        assert!(!player.is_eliminated());

        player.dice_values = Some(vec![]);
        assert!(!player.is_survivor());
        assert!(player.is_eliminated());
    }

    #[test]
    fn long_names_are_truncated() {
        let player = Player::new(1, &"x".repeat(100), false, 0);
        assert_eq!(player.name.len(), constants::MAX_NAME_LENGTH);
    }

    #[test]
    fn rolled_dice_are_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let dice = roll_dice(&mut rng, 500);
        assert_eq!(dice.len(), 500);
        assert!(dice.iter().all(|&d| (1..=MAX_FACE).contains(&d)));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            RoomStatus::Waiting,
            RoomStatus::Boarding,
            RoomStatus::Playing,
            RoomStatus::Finished,
        ] {
            assert_eq!(status.as_str().parse::<RoomStatus>(), Ok(status));
        }
    }
}
