//! # Liar's Dice
//!
//! A turn-based liar's dice wagering engine for small groups of players
//! sharing a room.
//!
//! Players join a room, pay an entry fee into a shared pot, receive five
//! hidden dice each, and take turns escalating bets about how many dice
//! across the table show a face. Any turn holder may challenge the
//! standing bet as a lie or as exactly right; the loser of the challenge
//! drops a die. The last player holding dice wins most of the pot and the
//! final eliminated player takes the rest.
//!
//! ## Architecture
//!
//! A room moves through four phases:
//!
//! - **Waiting**: players join, the host tunes the entry fee and cheats
//! - **Boarding**: everyone pays in; the last payment starts the round
//! - **Playing**: bets, challenges and timed re-deals
//! - **Finished**: payout recorded, the host may reset
//!
//! ## Core Modules
//!
//! - [`game`]: pure round engine over a [`RoomSnapshot`]
//! - [`store`]: shared-state contract with a versioned compare-and-swap commit
//! - [`db`]: PostgreSQL-backed store
//! - [`room`]: per-room actor that validates every action and schedules re-deals
//! - [`bot`]: computer opponents
//!
//! ## Example
//!
//! ```
//! use liars_dice::{Bet, validate_escalation};
//!
//! let current = Bet::new(3, 4);
//! assert!(validate_escalation(current, Bet::new(4, 2), 10).is_ok());
//! assert!(validate_escalation(current, Bet::new(3, 6), 10).is_err());
//! ```

/// Bot players and difficulty presets.
pub mod bot;

/// PostgreSQL connection management and store.
pub mod db;

/// Core game logic and entities.
pub mod game;
pub use game::{
    GameError, Resolution, RoomSnapshot, RoomView, RoundOutcome, Transition,
    constants::{self, DICE_PER_PLAYER, MAX_FACE, MIN_PLAYERS},
    entities::{
        self, Bet, ChallengeAction, Coins, Face, GameOverData, Notification, Player, PlayerId,
        Room, RoomCode, RoomStatus, UserId,
    },
    validate_escalation,
};

/// Room actors and the room manager.
pub mod room;

/// Shared-state contract and the in-memory store.
pub mod store;
pub use store::{InMemoryStore, StateStore, StoreError};
