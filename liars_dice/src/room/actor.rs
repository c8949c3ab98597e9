//! Room actor implementation with async message handling.
//!
//! The actor is the only writer for its room inside this process. Every
//! action re-reads the room from the store, validates the caller against
//! that fresh state, and commits the diff gated on the version it read.

use chrono::Utc;
use rand::{SeedableRng, rngs::StdRng};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Instant, MissedTickBehavior, interval},
};

use super::{
    config::RoomConfig,
    messages::{RoomError, RoomMessage, RoomResult, StateChangeNotification},
};
use crate::{
    game::{
        GameError, Resolution, RoomSnapshot, RoomView, Transition,
        entities::{Bet, ChallengeAction, Coins, Player, PlayerId, RoomCode, RoomStatus, UserId},
    },
    store::{Mutation, RoomPatch, StateStore, StoreError, StoreEvent},
};

const INBOX_CAPACITY: usize = 100;
const SUBSCRIBER_CAPACITY: usize = 32;

/// Room actor handle for sending messages
#[derive(Clone, Debug)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    code: RoomCode,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, code: RoomCode) -> Self {
        Self { sender, code }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Send a message to the room
    pub async fn send(&self, message: RoomMessage) -> RoomResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RoomError::RoomClosed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<RoomResult<T>>) -> RoomMessage,
    ) -> RoomResult<T> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| RoomError::RoomClosed)?
    }

    /// Take a seat. Joining again with the same user id returns the
    /// existing row.
    pub async fn join(&self, user_id: UserId, name: &str) -> RoomResult<Player> {
        let name = name.to_string();
        self.request(|response| RoomMessage::Join {
            user_id,
            name,
            response,
        })
        .await
    }

    pub async fn update_entry_fee(&self, caller: PlayerId, fee: Coins) -> RoomResult<()> {
        self.request(|response| RoomMessage::UpdateEntryFee {
            caller,
            fee,
            response,
        })
        .await
    }

    pub async fn toggle_cheats(&self, caller: PlayerId) -> RoomResult<bool> {
        self.request(|response| RoomMessage::ToggleCheats { caller, response })
            .await
    }

    pub async fn open_table(&self, caller: PlayerId) -> RoomResult<()> {
        self.request(|response| RoomMessage::OpenTable { caller, response })
            .await
    }

    /// Pay the entry fee. Returns `true` if this payment completed
    /// boarding and the round was dealt.
    ///
    /// A [`StoreError::WriteNotEchoed`] means the payment stands but the
    /// round could not be started yet; the room retries on its next tick.
    pub async fn pay_entry(&self, caller: PlayerId) -> RoomResult<bool> {
        self.request(|response| RoomMessage::PayEntry { caller, response })
            .await
    }

    /// Raise the bet. Returns the player now on turn.
    pub async fn place_bet(&self, caller: PlayerId, bet: Bet) -> RoomResult<PlayerId> {
        self.request(|response| RoomMessage::PlaceBet {
            caller,
            bet,
            response,
        })
        .await
    }

    pub async fn resolve_round(
        &self,
        caller: PlayerId,
        action: ChallengeAction,
    ) -> RoomResult<Resolution> {
        self.request(|response| RoomMessage::ResolveRound {
            caller,
            action,
            response,
        })
        .await
    }

    pub async fn kick_player(&self, caller: PlayerId, target: PlayerId) -> RoomResult<Player> {
        self.request(|response| RoomMessage::KickPlayer {
            caller,
            target,
            response,
        })
        .await
    }

    /// Leave the room for good
    pub async fn abandon_game(&self, caller: PlayerId) -> RoomResult<Player> {
        self.request(|response| RoomMessage::AbandonGame { caller, response })
            .await
    }

    pub async fn reset_room(&self, caller: PlayerId, reopen: bool) -> RoomResult<()> {
        self.request(|response| RoomMessage::ResetRoom {
            caller,
            reopen,
            response,
        })
        .await
    }

    /// Peek at how many dice show the current bet's face
    pub async fn use_cheat(&self, caller: PlayerId) -> RoomResult<usize> {
        self.request(|response| RoomMessage::UseCheat { caller, response })
            .await
    }

    pub async fn snapshot(&self) -> RoomResult<RoomSnapshot> {
        self.request(|response| RoomMessage::GetSnapshot { response })
            .await
    }

    pub async fn view(&self, viewer: PlayerId) -> RoomResult<RoomView> {
        self.request(|response| RoomMessage::GetView { viewer, response })
            .await
    }

    /// Subscribe to state change notifications
    pub async fn subscribe(
        &self,
        subscriber: PlayerId,
    ) -> RoomResult<mpsc::Receiver<StateChangeNotification>> {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_CAPACITY);
        self.send(RoomMessage::Subscribe { subscriber, sender })
            .await?;
        Ok(receiver)
    }

    pub async fn unsubscribe(&self, subscriber: PlayerId) -> RoomResult<()> {
        self.send(RoomMessage::Unsubscribe { subscriber }).await
    }

    /// Ask the actor to check deadlines and pending transitions now
    pub async fn tick(&self) -> RoomResult<()> {
        self.send(RoomMessage::Tick).await
    }

    /// Stop the actor and wait until it has acknowledged
    pub async fn close(&self) -> RoomResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Close { response: tx }).await?;
        rx.await.map_err(|_| RoomError::RoomClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

async fn next_event(
    feed: &mut Option<broadcast::Receiver<StoreEvent>>,
) -> Result<StoreEvent, broadcast::error::RecvError> {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

/// Room actor managing a single room
pub struct RoomActor {
    code: RoomCode,

    config: RoomConfig,

    store: Arc<dyn StateStore>,

    /// Message inbox
    inbox: mpsc::Receiver<RoomMessage>,

    /// Seating and dealing
    rng: StdRng,

    /// Notification timestamp of the pending re-deal, and when it's due
    auto_advance: Option<(i64, Instant)>,

    /// Newest room version this actor wrote or read
    last_version: Option<u64>,

    /// Subscribers for state change notifications
    subscribers: HashMap<PlayerId, mpsc::Sender<StateChangeNotification>>,

    is_closed: bool,
}

impl RoomActor {
    /// Create a new room actor for a room that already exists in `store`
    pub fn new(
        code: RoomCode,
        config: RoomConfig,
        store: Arc<dyn StateStore>,
    ) -> (Self, RoomHandle) {
        Self::with_rng(code, config, store, StdRng::from_os_rng())
    }

    /// Like [`RoomActor::new`] with a caller-supplied generator
    pub fn with_rng(
        code: RoomCode,
        config: RoomConfig,
        store: Arc<dyn StateStore>,
        rng: StdRng,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = RoomHandle::new(sender, code.clone());
        let actor = Self {
            code,
            config,
            store,
            inbox,
            rng,
            auto_advance: None,
            last_version: None,
            subscribers: HashMap::new(),
            is_closed: false,
        };
        (actor, handle)
    }

    /// Run the room actor event loop
    pub async fn run(mut self) {
        log::info!("Room {} starting", self.code);

        let mut feed = match self.store.subscribe(&self.code).await {
            Ok(feed) => Some(feed),
            Err(e) => {
                log::error!("Room {}: no change feed: {}", self.code, e);
                None
            }
        };
        let mut ticker = interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.is_closed {
            tokio::select! {
                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.handle_message(message).await;
                }

                _ = ticker.tick() => {
                    self.reconcile_logged().await;
                }

                event = next_event(&mut feed) => match event {
                    Ok(event) => {
                        if self.is_foreign(&event) {
                            self.reconcile_logged().await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::debug!("Room {}: change feed skipped {} events", self.code, skipped);
                        self.reconcile_logged().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::warn!("Room {}: change feed closed", self.code);
                        feed = None;
                    }
                },
            }
        }

        log::info!("Room {} closed", self.code);
    }

    /// Handle a room message
    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join {
                user_id,
                name,
                response,
            } => {
                let result = self.handle_join(user_id, &name).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::UpdateEntryFee {
                caller,
                fee,
                response,
            } => {
                let result = self.apply(|s, _| s.update_entry_fee(caller, fee)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::ToggleCheats { caller, response } => {
                let result = self.apply(|s, _| s.toggle_cheats(caller)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::OpenTable { caller, response } => {
                let result = self.apply(|s, _| s.open_table(caller)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::PayEntry { caller, response } => {
                let result = self.handle_pay_entry(caller).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::PlaceBet {
                caller,
                bet,
                response,
            } => {
                let result = self.apply(|s, _| s.place_bet(caller, bet)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::ResolveRound {
                caller,
                action,
                response,
            } => {
                let now = Utc::now().timestamp_millis();
                let result = self.apply(|s, _| s.resolve(caller, action, now)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::KickPlayer {
                caller,
                target,
                response,
            } => {
                let result = self
                    .apply(|s, _| {
                        let removed = s.kick_player(caller, target)?;
                        s.settle_after_departure()?;
                        Ok(removed)
                    })
                    .await;
                if let Ok(removed) = &result {
                    log::info!("Room {}: {} was kicked", self.code, removed.name);
                    self.subscribers.remove(&removed.id);
                }
                let _ = response.send(self.logged(result));
            }

            RoomMessage::AbandonGame { caller, response } => {
                let result = self
                    .apply(|s, _| {
                        let removed = s.leave_room(caller)?;
                        s.settle_after_departure()?;
                        Ok(removed)
                    })
                    .await;
                if let Ok(removed) = &result {
                    log::info!("Room {}: {} left", self.code, removed.name);
                    self.subscribers.remove(&removed.id);
                }
                let _ = response.send(self.logged(result));
            }

            RoomMessage::ResetRoom {
                caller,
                reopen,
                response,
            } => {
                let result = self.apply(|s, _| s.reset_room(caller, reopen)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::UseCheat { caller, response } => {
                let result = self.apply(|s, _| s.peek(caller)).await;
                let _ = response.send(self.logged(result));
            }

            RoomMessage::GetSnapshot { response } => {
                let result = self
                    .store
                    .read_snapshot(&self.code)
                    .await
                    .map_err(RoomError::from);
                let _ = response.send(result);
            }

            RoomMessage::GetView { viewer, response } => {
                let result = self.view(viewer).await;
                let _ = response.send(result);
            }

            RoomMessage::Tick => {}

            RoomMessage::Subscribe { subscriber, sender } => {
                self.subscribers.insert(subscriber, sender);
                log::debug!("{} subscribed to room {}", subscriber, self.code);
            }

            RoomMessage::Unsubscribe { subscriber } => {
                self.subscribers.remove(&subscriber);
                log::debug!("{} unsubscribed from room {}", subscriber, self.code);
            }

            RoomMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
                return;
            }
        }

        // Whatever just happened may have made a transition due.
        self.reconcile_logged().await;
    }

    fn logged<T>(&self, result: RoomResult<T>) -> RoomResult<T> {
        match &result {
            Err(RoomError::Game(e)) => log::debug!("Room {}: rejected: {}", self.code, e),
            Err(e) => log::warn!("Room {}: {}", self.code, e),
            Ok(_) => {}
        }
        result
    }

    /// Read, compute, commit. A stale version re-reads and recomputes up
    /// to the configured number of attempts.
    async fn apply<T, F>(&mut self, mut op: F) -> RoomResult<T>
    where
        F: FnMut(&mut RoomSnapshot, &mut StdRng) -> Result<T, GameError>,
    {
        let mut attempt = 1;
        loop {
            let before = self.store.read_snapshot(&self.code).await?;
            let mut after = before.clone();
            let value = op(&mut after, &mut self.rng)?;

            let mutation = Mutation::between(&before, &after);
            if mutation.is_empty() {
                return Ok(value);
            }

            match self
                .store
                .commit(&self.code, before.room.version, &mutation)
                .await
            {
                Ok(version) => {
                    self.last_version = Some(version);
                    self.notify_mutation(&mutation);
                    self.schedule_auto_advance(&after);
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    log::warn!(
                        "Room {}: {} (attempt {}/{})",
                        self.code,
                        e,
                        attempt,
                        self.config.max_commit_attempts
                    );
                    if attempt >= self.config.max_commit_attempts {
                        return Err(RoomError::Contention(self.code.clone()));
                    }
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Room {}: commit failed: {}", self.code, e);
                    return Err(e.into());
                }
            }
        }
    }

    async fn handle_join(&mut self, user_id: UserId, name: &str) -> RoomResult<Player> {
        let snapshot = self.store.read_snapshot(&self.code).await?;
        if let Some(existing) = snapshot.players.iter().find(|p| p.user_id == user_id) {
            return Ok(existing.clone());
        }
        if !matches!(
            snapshot.room.status,
            RoomStatus::Waiting | RoomStatus::Boarding
        ) {
            return Err(GameError::InvalidPhase(snapshot.room.status).into());
        }
        if snapshot.players.len() >= self.config.max_players {
            return Err(GameError::RoomFull.into());
        }

        let player = Player::new(
            user_id,
            name,
            snapshot.host().is_none(),
            self.config.starting_money,
        );
        self.store.insert_player(&self.code, &player).await?;
        log::info!(
            "Room {}: {} joined{}",
            self.code,
            player.name,
            if player.is_host { " as host" } else { "" }
        );
        self.notify_state_change(StateChangeNotification::PlayerListChanged);
        Ok(player)
    }

    async fn handle_pay_entry(&mut self, caller: PlayerId) -> RoomResult<bool> {
        self.apply(|s, _| s.pay_entry(caller)).await?;
        let started = self.reconcile().await?;
        Ok(started == Some(Transition::StartRound))
    }

    async fn view(&self, viewer: PlayerId) -> RoomResult<RoomView> {
        let snapshot = self.store.read_snapshot(&self.code).await?;
        snapshot.player(viewer)?;
        Ok(snapshot.view_for(viewer))
    }

    /// Apply whatever transition the stored state says is due.
    async fn reconcile(&mut self) -> RoomResult<Option<Transition>> {
        let snapshot = self.store.read_snapshot(&self.code).await?;
        self.last_version = Some(snapshot.room.version);
        self.schedule_auto_advance(&snapshot);

        let Some(transition) = snapshot.pending_transition() else {
            return Ok(None);
        };
        match transition {
            Transition::StartRound => self.start_round(snapshot).await?,
            Transition::FinishGame => {
                self.apply(|s, _| s.finish_game(None)).await?;
            }
            Transition::AdvanceRound => {
                let due = self
                    .auto_advance
                    .is_some_and(|(_, at)| at <= Instant::now());
                if !due {
                    return Ok(None);
                }
                let next = self.apply(|s, rng| s.advance_round(rng)).await?;
                log::debug!("Room {}: next round dealt, {} opens", self.code, next);
            }
        }
        Ok(Some(transition))
    }

    async fn reconcile_logged(&mut self) {
        match self.reconcile().await {
            Ok(_) => {}
            Err(RoomError::Store(StoreError::RoomNotFound(_))) => {
                log::warn!("Room {} vanished from the store, shutting down", self.code);
                self.is_closed = true;
            }
            Err(e) => log::warn!("Room {}: pending transition failed: {}", self.code, e),
        }
    }

    /// `boarding → playing`. The pot is written and read back before the
    /// phase moves; a read-back that disagrees aborts the start.
    async fn start_round(&mut self, snapshot: RoomSnapshot) -> RoomResult<()> {
        let expected = snapshot.expected_pot();
        let patch = RoomPatch {
            pot: Some(expected),
            ..RoomPatch::default()
        };
        let version = self
            .store
            .write_room(&self.code, &patch, Some(snapshot.room.version))
            .await?;
        self.last_version = Some(version);

        let echoed = self.store.read_room(&self.code).await?;
        if echoed.pot != expected {
            return Err(StoreError::WriteNotEchoed {
                code: self.code.clone(),
                field: "pot",
                expected,
                actual: echoed.pot,
            }
            .into());
        }

        let first = self.apply(|s, rng| s.start_round(rng)).await?;
        log::info!(
            "Room {}: round started, pot ${}, {} opens",
            self.code,
            expected,
            first
        );
        Ok(())
    }

    /// Keep the re-deal deadline in step with the stored notification.
    ///
    /// The deadline is derived from the notification's own timestamp, so a
    /// restarted actor picks up where the previous one left off.
    fn schedule_auto_advance(&mut self, snapshot: &RoomSnapshot) {
        let pending = match (&snapshot.room.notification, snapshot.room.status) {
            (Some(notification), RoomStatus::Playing) => Some(notification.timestamp),
            _ => None,
        };
        let Some(stamp) = pending else {
            self.auto_advance = None;
            return;
        };
        if self.auto_advance.is_some_and(|(s, _)| s == stamp) {
            return;
        }

        let delay = i64::try_from(self.config.auto_advance_ms).unwrap_or(i64::MAX);
        let remaining = stamp
            .saturating_add(delay)
            .saturating_sub(Utc::now().timestamp_millis())
            .clamp(0, delay);
        let due = Instant::now() + Duration::from_millis(u64::try_from(remaining).unwrap_or(0));
        self.auto_advance = Some((stamp, due));
        log::debug!("Room {}: re-deal in {}ms", self.code, remaining);
    }

    fn is_foreign(&self, event: &StoreEvent) -> bool {
        match event {
            StoreEvent::Room { version, .. } => {
                self.last_version.is_none_or(|seen| *version > seen)
            }
            StoreEvent::Roster { .. } => true,
        }
    }

    fn notify_mutation(&mut self, mutation: &Mutation) {
        if !mutation.players.is_empty() || !mutation.removed.is_empty() {
            self.notify_state_change(StateChangeNotification::PlayerListChanged);
        }
        if mutation.room.pot.is_some() {
            self.notify_state_change(StateChangeNotification::PotChanged);
        }
        if !mutation.room.is_empty() {
            self.notify_state_change(StateChangeNotification::StateChanged);
        }
    }

    /// Broadcast state change notification to all subscribers
    fn notify_state_change(&mut self, notification: StateChangeNotification) {
        self.subscribers
            .retain(|id, sender| match sender.try_send(notification.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("Subscriber {} channel full, dropping notification", id);
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {} disconnected, removing", id);
                    false
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Room;
    use crate::store::InMemoryStore;

    async fn spawn_room() -> (Arc<InMemoryStore>, RoomHandle) {
        let store = Arc::new(InMemoryStore::new());
        let code = RoomCode::new("ACTOR1");
        store
            .create_room(&Room::new(code.clone(), 100, false))
            .await
            .unwrap();
        let (actor, handle) = RoomActor::with_rng(
            code,
            RoomConfig::default(),
            store.clone(),
            StdRng::seed_from_u64(1),
        );
        tokio::spawn(actor.run());
        (store, handle)
    }

    #[tokio::test]
    async fn first_joiner_hosts() {
        let (_, handle) = spawn_room().await;
        let alice = handle.join(1, "alice").await.unwrap();
        let bob = handle.join(2, "bob").await.unwrap();
        assert!(alice.is_host);
        assert!(!bob.is_host);
        assert_eq!(alice.money, RoomConfig::default().starting_money);
    }

    #[tokio::test]
    async fn rejoining_returns_the_same_seat() {
        let (store, handle) = spawn_room().await;
        let first = handle.join(7, "carol").await.unwrap();
        let again = handle.join(7, "carol").await.unwrap();
        assert_eq!(first.id, again.id);
        let players = store.read_players(handle.code()).await.unwrap();
        assert_eq!(players.len(), 1);
    }

    #[tokio::test]
    async fn guests_cannot_open_the_table() {
        let (_, handle) = spawn_room().await;
        handle.join(1, "alice").await.unwrap();
        let bob = handle.join(2, "bob").await.unwrap();
        let err = handle.open_table(bob.id).await.unwrap_err();
        assert!(matches!(err, RoomError::Game(GameError::NotHost)));
    }

    #[tokio::test]
    async fn subscribers_hear_about_joins() {
        let (_, handle) = spawn_room().await;
        let alice = handle.join(1, "alice").await.unwrap();
        let mut rx = handle.subscribe(alice.id).await.unwrap();
        handle.join(2, "bob").await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(StateChangeNotification::PlayerListChanged)
        );
    }

    #[tokio::test]
    async fn closed_rooms_refuse_messages() {
        let (_, handle) = spawn_room().await;
        handle.close().await.unwrap();
        let err = handle.join(1, "alice").await.unwrap_err();
        assert!(matches!(err, RoomError::RoomClosed));
    }
}
