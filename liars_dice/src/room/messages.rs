//! Room actor message types.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::game::{
    GameError, Resolution, RoomSnapshot, RoomView,
    entities::{Bet, ChallengeAction, Coins, Player, PlayerId, RoomCode, UserId},
};
use crate::store::StoreError;

/// Service-level errors
#[derive(Debug, Error)]
pub enum RoomError {
    /// The action was rejected by the rules
    #[error(transparent)]
    Game(#[from] GameError),

    /// The store refused or failed the write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every commit attempt raced with another writer
    #[error("Room {0} is busy, try again")]
    Contention(RoomCode),

    /// The room's actor has shut down
    #[error("Room is closed")]
    RoomClosed,

    /// No room with this code
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),

    /// Rejected room configuration
    #[error("Invalid room configuration: {0}")]
    InvalidConfig(String),
}

impl RoomError {
    /// Get a client-safe error message
    pub fn client_message(&self) -> String {
        match self {
            RoomError::Store(err) => err.client_message(),
            _ => self.to_string(),
        }
    }
}

/// Result type for room operations
pub type RoomResult<T> = Result<T, RoomError>;

type Reply<T> = oneshot::Sender<RoomResult<T>>;

/// Messages that can be sent to a RoomActor
#[derive(Debug)]
pub enum RoomMessage {
    /// Take a seat (or get the existing one back)
    Join {
        user_id: UserId,
        name: String,
        response: Reply<Player>,
    },

    UpdateEntryFee {
        caller: PlayerId,
        fee: Coins,
        response: Reply<()>,
    },

    ToggleCheats {
        caller: PlayerId,
        response: Reply<bool>,
    },

    OpenTable {
        caller: PlayerId,
        response: Reply<()>,
    },

    /// Pay the entry fee; replies whether the payment started the round
    PayEntry {
        caller: PlayerId,
        response: Reply<bool>,
    },

    PlaceBet {
        caller: PlayerId,
        bet: Bet,
        response: Reply<PlayerId>,
    },

    ResolveRound {
        caller: PlayerId,
        action: ChallengeAction,
        response: Reply<Resolution>,
    },

    KickPlayer {
        caller: PlayerId,
        target: PlayerId,
        response: Reply<Player>,
    },

    /// Voluntary exit
    AbandonGame {
        caller: PlayerId,
        response: Reply<Player>,
    },

    ResetRoom {
        caller: PlayerId,
        reopen: bool,
        response: Reply<()>,
    },

    /// Peek at the count of the bet's face
    UseCheat {
        caller: PlayerId,
        response: Reply<usize>,
    },

    /// Full unfiltered state
    GetSnapshot { response: Reply<RoomSnapshot> },

    /// State as one player may see it
    GetView {
        viewer: PlayerId,
        response: Reply<RoomView>,
    },

    /// Internal: check deadlines and pending transitions
    Tick,

    /// Subscribe to state change notifications
    Subscribe {
        subscriber: PlayerId,
        sender: mpsc::Sender<StateChangeNotification>,
    },

    /// Unsubscribe from state change notifications
    Unsubscribe { subscriber: PlayerId },

    /// Stop the actor
    Close { response: oneshot::Sender<()> },
}

/// Notification sent when room state changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChangeNotification {
    /// Room record changed (bet placed, round resolved, phase moved, ...)
    StateChanged,
    /// Player joined, left, paid or lost a die
    PlayerListChanged,
    /// Pot size changed
    PotChanged,
}
