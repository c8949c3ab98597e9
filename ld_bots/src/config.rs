//! Bot runner configuration.
//!
//! Environment variables supply defaults; command-line flags override them.

use liars_dice::{
    bot::BotDifficulty,
    db::DatabaseConfig,
    room::{RoomConfig, config::ABSOLUTE_MAX_PLAYERS},
};

/// Command-line overrides, all optional
#[derive(Debug, Default)]
pub struct Overrides {
    pub bots: Option<usize>,
    pub games: Option<usize>,
    pub difficulty: Option<BotDifficulty>,
    pub entry_fee: Option<i64>,
    pub cheats: bool,
    pub paced: bool,
    pub seed: Option<u64>,
    pub database_url: Option<String>,
}

/// Complete runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Bots seated in the room
    pub bots: usize,
    /// Games to play back to back
    pub games: usize,
    pub difficulty: BotDifficulty,
    pub room: RoomConfig,
    /// PostgreSQL store; `None` plays against the in-memory store
    pub database: Option<DatabaseConfig>,
    /// Pause for think times between actions
    pub paced: bool,
    /// Base seed for bot strategies
    pub seed: Option<u64>,
}

impl RunnerConfig {
    /// Load configuration from environment variables, then apply overrides
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but can't be parsed
    pub fn from_env(overrides: Overrides) -> Result<Self, ConfigError> {
        let defaults = RoomConfig::default();

        let difficulty = match overrides.difficulty {
            Some(difficulty) => difficulty,
            None => match std::env::var("BOT_DIFFICULTY") {
                Ok(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                    var: "BOT_DIFFICULTY".to_string(),
                    reason,
                })?,
                Err(_) => BotDifficulty::Standard,
            },
        };

        let room = RoomConfig {
            entry_fee: match overrides.entry_fee {
                Some(fee) => fee,
                None => parse_env_or("ROOM_ENTRY_FEE", defaults.entry_fee)?,
            },
            allow_cheats: overrides.cheats || parse_env_or("ROOM_ALLOW_CHEATS", false)?,
            starting_money: parse_env_or("ROOM_STARTING_MONEY", defaults.starting_money)?,
            max_players: parse_env_or("ROOM_MAX_PLAYERS", defaults.max_players)?,
            auto_advance_ms: parse_env_or("ROOM_AUTO_ADVANCE_MS", defaults.auto_advance_ms)?,
            tick_interval_ms: parse_env_or("ROOM_TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            max_commit_attempts: defaults.max_commit_attempts,
        };

        let database_url = overrides
            .database_url
            .or_else(|| std::env::var("DATABASE_URL").ok());
        let database = database_url.map(|database_url| DatabaseConfig {
            database_url,
            ..DatabaseConfig::from_env()
        });

        let seed = match overrides.seed {
            Some(seed) => Some(seed),
            None => match std::env::var("BOT_SEED") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "BOT_SEED".to_string(),
                    reason: format!("'{raw}' is not an unsigned integer"),
                })?),
                Err(_) => None,
            },
        };

        Ok(Self {
            bots: match overrides.bots {
                Some(bots) => bots,
                None => parse_env_or("BOT_COUNT", 4)?,
            },
            games: match overrides.games {
                Some(games) => games,
                None => parse_env_or("BOT_GAMES", 1)?,
            },
            difficulty,
            room,
            database,
            paced: overrides.paced,
            seed,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.room.validate().map_err(|reason| ConfigError::Invalid {
            var: "ROOM_*".to_string(),
            reason,
        })?;

        if self.bots < 2 {
            return Err(ConfigError::Invalid {
                var: "BOT_COUNT".to_string(),
                reason: "Need at least 2 bots to play".to_string(),
            });
        }

        if self.bots > self.room.max_players {
            return Err(ConfigError::Invalid {
                var: "BOT_COUNT".to_string(),
                reason: format!(
                    "Cannot exceed max players ({}, at most {})",
                    self.room.max_players, ABSOLUTE_MAX_PLAYERS
                ),
            });
        }

        if self.games == 0 {
            return Err(ConfigError::Invalid {
                var: "BOT_GAMES".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("can't parse '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunnerConfig {
        RunnerConfig {
            bots: 4,
            games: 1,
            difficulty: BotDifficulty::Standard,
            room: RoomConfig::default(),
            database: None,
            paced: false,
            seed: Some(7),
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "BOT_COUNT".to_string(),
            reason: "too few".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("BOT_COUNT"));
        assert!(msg.contains("too few"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_single_bot_is_rejected() {
        let config = RunnerConfig {
            bots: 1,
            ..config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_more_bots_than_seats_is_rejected() {
        let mut config = config();
        config.room.max_players = 3;
        config.bots = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_games_is_rejected() {
        let config = RunnerConfig {
            games: 0,
            ..config()
        };
        assert!(config.validate().is_err());
    }
}
