//! Validation errors raised before any store write.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{Bet, Coins, Face, PlayerId, RoomStatus};

/// Errors that can occur while validating a player's action.
///
/// Every variant is recoverable: the action is rejected without touching
/// the store and the caller may try again.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum GameError {
    #[error("only the host can do that")]
    NotHost,
    #[error("not your turn")]
    OutOfTurnAction,
    #[error("player {0} is not in this room")]
    PlayerNotFound(PlayerId),
    #[error("can't do that while the room is {0}")]
    InvalidPhase(RoomStatus),
    #[error("bet quantity must exceed {current}")]
    BetNotEscalated { current: Bet },
    #[error("face {0} is not between 1 and 6")]
    InvalidFace(Face),
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("only {in_play} dice are in play")]
    QuantityExceedsDice { in_play: usize },
    #[error("there is no bet to challenge")]
    NoActiveBet,
    #[error("wait for the next round to be dealt")]
    RoundPending,
    #[error("need ${required} to pay the entry fee, have ${available}")]
    InsufficientFunds { required: Coins, available: Coins },
    #[error("already paid the entry fee")]
    AlreadyReady,
    #[error("entry fee can't be negative")]
    InvalidEntryFee,
    #[error("need 2+ ready players")]
    NotEnoughPlayers,
    #[error("cheats are disabled in this room")]
    CheatsDisabled,
    #[error("cheat already used")]
    CheatAlreadyUsed,
    #[error("eliminated players can't do that")]
    PlayerEliminated,
    #[error("the host can't kick themselves")]
    CannotKickSelf,
    #[error("room is full")]
    RoomFull,
    #[error("no previous bettor to accuse")]
    NoAccused,
    #[error("invalid game state: {0}")]
    InternalStateError(String),
}
