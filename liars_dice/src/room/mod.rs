//! Room service: one async actor per room.
//!
//! This module implements:
//! - RoomActor: owns every write to one room, validating the caller
//!   against freshly-read state before committing
//! - RoomManager: creates rooms, routes joins and tracks live actors
//! - Message-based communication with tokio channels
//!
//! ## Architecture
//!
//! Each room runs in a separate Tokio task with an mpsc inbox. Actions
//! arrive as [`RoomMessage`]s carrying a oneshot reply channel. The actor
//! re-reads the room, runs the engine operation, and commits the diff
//! gated on the room version it read. A periodic tick and the store's
//! change feed both trigger reconciliation, which applies any transition
//! the stored state says is due: the boarding start, the delayed re-deal
//! after a resolution, or a game over left behind by departures.
//!
//! ## Example
//!
//! ```no_run
//! use liars_dice::room::{RoomConfig, RoomManager};
//! use liars_dice::store::InMemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = RoomManager::new(Arc::new(InMemoryStore::new()));
//!     let room = manager.create_room(RoomConfig::default()).await?;
//!     let host = room.join(1, "alice").await?;
//!     room.join(2, "bob").await?;
//!     room.open_table(host.id).await?;
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod config;
pub mod manager;
pub mod messages;

pub use actor::{RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use manager::{RoomManager, RoomMetadata};
pub use messages::{RoomError, RoomMessage, RoomResult, StateChangeNotification};
