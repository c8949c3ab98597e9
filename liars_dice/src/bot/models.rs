//! Bot player models and configuration.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::game::entities::{PlayerId, UserId};

/// Bot difficulty presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    Easy,     // Gullible, never bluffs
    Standard, // Reasonable reads, bluffs now and then
    Sharp,    // Challenges close to the odds, bluffs more
}

impl fmt::Display for BotDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotDifficulty::Easy => write!(f, "easy"),
            BotDifficulty::Standard => write!(f, "standard"),
            BotDifficulty::Sharp => write!(f, "sharp"),
        }
    }
}

impl FromStr for BotDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "standard" => Ok(Self::Standard),
            "sharp" => Ok(Self::Sharp),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Bot difficulty parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyParams {
    /// How far a bet may exceed the expected count before the bot calls liar
    pub bluff_tolerance: f64,

    /// A bet within this distance of the expected count is an exact-call candidate
    pub exact_window: f64,

    /// Chance of calling exact when the bet is inside the window
    pub exact_frequency: f64,

    /// Whether the bot raises past what it believes
    pub bluffs: bool,

    /// Bluff frequency (0.0 to 1.0)
    pub bluff_frequency: f64,

    /// Whether the bot spends its one peek when cheats are on
    pub peeks: bool,

    /// Average thinking time in milliseconds (base)
    pub base_think_time_ms: u64,

    /// Random variance in thinking time (±milliseconds)
    pub think_time_variance_ms: u64,
}

impl DifficultyParams {
    pub fn easy() -> Self {
        Self {
            bluff_tolerance: 1.5,
            exact_window: 0.25,
            exact_frequency: 0.05,
            bluffs: false,
            bluff_frequency: 0.0,
            peeks: false,
            base_think_time_ms: 600,
            think_time_variance_ms: 400,
        }
    }

    pub fn standard() -> Self {
        Self {
            bluff_tolerance: 0.75,
            exact_window: 0.5,
            exact_frequency: 0.15,
            bluffs: true,
            bluff_frequency: 0.10,
            peeks: true,
            base_think_time_ms: 900,
            think_time_variance_ms: 600,
        }
    }

    pub fn sharp() -> Self {
        Self {
            bluff_tolerance: 0.25,
            exact_window: 0.5,
            exact_frequency: 0.30,
            bluffs: true,
            bluff_frequency: 0.20,
            peeks: true,
            base_think_time_ms: 1200,
            think_time_variance_ms: 800,
        }
    }

    /// Get parameters for a given difficulty
    pub fn from_difficulty(difficulty: BotDifficulty) -> Self {
        match difficulty {
            BotDifficulty::Easy => Self::easy(),
            BotDifficulty::Standard => Self::standard(),
            BotDifficulty::Sharp => Self::sharp(),
        }
    }
}

/// A bot seated in a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotPlayer {
    pub player_id: PlayerId,
    pub user_id: UserId,
    pub name: String,
    pub difficulty: BotDifficulty,
}
