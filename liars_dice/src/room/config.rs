//! Room configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{
    constants::{
        DEFAULT_AUTO_ADVANCE_MS, DEFAULT_ENTRY_FEE, DEFAULT_MAX_PLAYERS, DEFAULT_STARTING_MONEY,
        MIN_PLAYERS,
    },
    entities::Coins,
};

/// Hard cap on seats; beyond this the dice count gets unwieldy
pub const ABSOLUTE_MAX_PLAYERS: usize = 12;

/// Room configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Entry fee new rooms start with (host can change it while waiting)
    pub entry_fee: Coins,

    /// Whether peeking is allowed when the room opens
    pub allow_cheats: bool,

    /// Balance a player is given on join
    pub starting_money: Coins,

    /// Maximum number of players (default: 8)
    pub max_players: usize,

    /// Delay between a published resolution and the re-deal
    pub auto_advance_ms: u64,

    /// How often the actor checks deadlines and pending transitions
    pub tick_interval_ms: u64,

    /// Re-read/recompute attempts before a contended write gives up
    pub max_commit_attempts: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            entry_fee: DEFAULT_ENTRY_FEE,
            allow_cheats: false,
            starting_money: DEFAULT_STARTING_MONEY,
            max_players: DEFAULT_MAX_PLAYERS,
            auto_advance_ms: DEFAULT_AUTO_ADVANCE_MS,
            tick_interval_ms: 250,
            max_commit_attempts: 5,
        }
    }
}

impl RoomConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.entry_fee < 0 {
            return Err("Entry fee can't be negative".to_string());
        }

        if self.starting_money < 0 {
            return Err("Starting money can't be negative".to_string());
        }

        if self.max_players < MIN_PLAYERS || self.max_players > ABSOLUTE_MAX_PLAYERS {
            return Err(format!(
                "Max players must be between {MIN_PLAYERS} and {ABSOLUTE_MAX_PLAYERS}"
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err("Tick interval must be positive".to_string());
        }

        if self.max_commit_attempts == 0 {
            return Err("At least one commit attempt is required".to_string());
        }

        Ok(())
    }

    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RoomConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_player_counts() {
        let config = RoomConfig {
            max_players: 1,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RoomConfig {
            max_players: ABSOLUTE_MAX_PLAYERS + 1,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_money() {
        let config = RoomConfig {
            entry_fee: -5,
            ..RoomConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err("Entry fee can't be negative".to_string())
        );
    }

    #[test]
    fn rejects_a_zero_tick() {
        let config = RoomConfig {
            tick_interval_ms: 0,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
