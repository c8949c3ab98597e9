//! Bot module providing automatic bot players with difficulty presets.
//!
//! This module implements:
//! - BotStrategy: bet-or-challenge decisions from a bot's own dice
//! - BotManager: seats bots in a room and plays them through games
//! - Difficulty presets (Easy, Standard, Sharp) with distinct play styles
//! - Human-like pacing with randomized delays
//!
//! ## Difficulty Presets
//!
//! ### Easy
//! - Only calls liar on bets well past the odds
//! - Rarely calls exact
//! - Never bluffs, never peeks
//!
//! ### Standard
//! - Calls liar a little past the expected count
//! - Bluffs 10% of the time and peeks when cheats are on
//!
//! ### Sharp
//! - Calls liar close to the expected count
//! - Calls exact often on bets that sit right on the odds
//! - Bluffs 20% of the time
//!
//! ## Example
//!
//! ```no_run
//! use liars_dice::bot::{BotDifficulty, BotManager};
//! use liars_dice::room::{RoomConfig, RoomManager};
//! use liars_dice::store::InMemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rooms = RoomManager::new(Arc::new(InMemoryStore::new()));
//!     let room = rooms.create_room(RoomConfig::default()).await?;
//!
//!     let mut bots = BotManager::new(room);
//!     bots.spawn_bots(4, BotDifficulty::Standard).await?;
//!     let over = bots.play_game().await?;
//!     println!("{} wins ${}", over.winner_name, over.amounts.winner);
//!     Ok(())
//! }
//! ```

pub mod decision;
pub mod manager;
pub mod models;

pub use decision::{BotDecision, BotDecisionContext, BotStrategy};
pub use manager::BotManager;
pub use models::{BotDifficulty, BotPlayer, DifficultyParams};
