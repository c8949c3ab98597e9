//! Liar's dice round engine.
//!
//! This module provides the pure game logic the room service drives:
//! - Room phase controller (`waiting → boarding → playing → finished`)
//! - Seat shuffling and turn-order derivation over the live roster
//! - Bet escalation and challenge adjudication
//! - Elimination bookkeeping and pot distribution
//! - Re-deals, the one-shot peek, kicks and voluntary exits
//!
//! Every operation is a method on [`RoomSnapshot`] that validates the
//! caller and mutates the snapshot in place. Nothing here touches the
//! store; the caller diffs the snapshot and commits the result.

pub mod auxiliary;
pub mod betting;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod payout;
pub mod phase;
pub mod resolution;
pub mod seating;
pub mod snapshot;

pub use betting::validate_escalation;
pub use errors::GameError;
pub use payout::split_pot;
pub use phase::Transition;
pub use resolution::{Loser, Resolution, RoundOutcome, adjudicate, count_face};
pub use seating::{assign_seats, next_active_player, previous_active_player, seat_order};
pub use snapshot::{PlayerView, RoomSnapshot, RoomView};
