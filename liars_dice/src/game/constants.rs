//! Game-wide constants.

use super::entities::Coins;

/// Dice dealt to every ready player at round start.
pub const DICE_PER_PLAYER: usize = 5;

/// Highest face on a die. Faces are numbered `1..=MAX_FACE`.
pub const MAX_FACE: u8 = 6;

/// Minimum number of ready players needed to start a round.
pub const MIN_PLAYERS: usize = 2;

/// Default seats per room.
pub const DEFAULT_MAX_PLAYERS: usize = 8;

/// Default entry fee charged when the table opens.
pub const DEFAULT_ENTRY_FEE: Coins = 100;

/// Money a player starts with when joining a room.
pub const DEFAULT_STARTING_MONEY: Coins = 1_000;

/// Payout shares are rounded to the nearest multiple of this.
pub const PAYOUT_ROUNDING: Coins = 50;

/// Winner's share of the pot (in percent) when three or more players took part.
pub const WINNER_SHARE_PERCENT: Coins = 80;

/// Runner-up's share of the pot (in percent) when three or more players took part.
pub const RUNNER_UP_SHARE_PERCENT: Coins = 20;

/// Delay between a round's adjudication and the re-deal.
pub const DEFAULT_AUTO_ADVANCE_MS: u64 = 5_000;

/// Length of a room code.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Characters room codes are drawn from. Excludes `0/O` and `1/I/L`.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Longest accepted display name.
pub const MAX_NAME_LENGTH: usize = 24;
