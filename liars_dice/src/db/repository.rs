//! PostgreSQL implementation of [`StateStore`].
//!
//! Rooms live in `rooms`, players in `room_players`. The bet is split into
//! two scalar columns, dice are a `SMALLINT[]` (NULL when unseated), and
//! the notification and game-over payloads are JSONB.
//!
//! The change feed is process-local: every write made through a
//! [`PgStore`] is published to subscribers of the same instance.

use async_trait::async_trait;
use sqlx::{
    PgConnection, PgPool, Postgres, QueryBuilder, Row,
    postgres::PgRow,
    types::{Json, Uuid},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, broadcast};

use super::timeouts::{DEFAULT_QUERY_TIMEOUT, DEFAULT_TRANSACTION_TIMEOUT, with_timeout};
use crate::game::entities::{
    Bet, Face, GameOverData, Notification, Player, PlayerId, Room, RoomCode,
};
use crate::store::{
    Mutation, PlayerPatch, RoomPatch, StateStore, StoreError, StoreEvent, StoreResult,
};

const FEED_CAPACITY: usize = 256;

const ROOM_COLUMNS: &str = "code, status, pot, entry_fee, current_turn_player_id, bet_quantity, \
     bet_face, allow_cheats, notification, game_over, participants, version";

const PLAYER_COLUMNS: &str = "id, user_id, name, is_host, money, dice_values, is_ready, \
     seat_index, current_contribution, has_used_cheat, joined_at";

fn corrupt(what: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what} out of range: {value}"))
}

fn room_from_row(row: &PgRow) -> StoreResult<Room> {
    let code: String = row.try_get("code")?;
    let status: String = row.try_get("status")?;
    let bet_quantity: i32 = row.try_get("bet_quantity")?;
    let bet_face: i16 = row.try_get("bet_face")?;
    let version: i64 = row.try_get("version")?;
    let notification: Option<Json<Notification>> = row.try_get("notification")?;
    let game_over: Option<Json<GameOverData>> = row.try_get("game_over")?;
    let participants: Vec<Uuid> = row.try_get("participants")?;

    Ok(Room {
        code: RoomCode::new(&code),
        status: status.parse().map_err(StoreError::Corrupt)?,
        pot: row.try_get("pot")?,
        entry_fee: row.try_get("entry_fee")?,
        current_turn_player_id: row
            .try_get::<Option<Uuid>, _>("current_turn_player_id")?
            .map(PlayerId::from),
        current_bet: Bet::new(
            u32::try_from(bet_quantity).map_err(|_| corrupt("bet_quantity", bet_quantity))?,
            Face::try_from(bet_face).map_err(|_| corrupt("bet_face", bet_face))?,
        ),
        allow_cheats: row.try_get("allow_cheats")?,
        notification: notification.map(|Json(n)| n),
        game_over: game_over.map(|Json(g)| g),
        participants: participants.into_iter().map(PlayerId::from).collect(),
        version: u64::try_from(version).map_err(|_| corrupt("version", version))?,
    })
}

fn player_from_row(row: &PgRow) -> StoreResult<Player> {
    let dice: Option<Vec<i16>> = row.try_get("dice_values")?;
    let dice_values = dice
        .map(|dice| {
            dice.into_iter()
                .map(|d| Face::try_from(d).map_err(|_| corrupt("die", d)))
                .collect::<StoreResult<Vec<Face>>>()
        })
        .transpose()?;
    let seat: Option<i32> = row.try_get("seat_index")?;
    let seat_index = seat
        .map(|s| usize::try_from(s).map_err(|_| corrupt("seat_index", s)))
        .transpose()?;

    Ok(Player {
        id: PlayerId::from(row.try_get::<Uuid, _>("id")?),
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        is_host: row.try_get("is_host")?,
        money: row.try_get("money")?,
        dice_values,
        is_ready: row.try_get("is_ready")?,
        seat_index,
        current_contribution: row.try_get("current_contribution")?,
        has_used_cheat: row.try_get("has_used_cheat")?,
        joined_at: row.try_get("joined_at")?,
    })
}

fn dice_column(dice: Option<&Vec<Face>>) -> Option<Vec<i16>> {
    dice.map(|dice| dice.iter().map(|&d| i16::from(d)).collect())
}

fn seat_column(seat: Option<usize>) -> StoreResult<Option<i32>> {
    seat.map(|s| i32::try_from(s).map_err(|_| corrupt("seat_index", s)))
        .transpose()
}

fn participant_column(participants: &[PlayerId]) -> Vec<Uuid> {
    participants.iter().map(PlayerId::as_uuid).collect()
}

fn version_column(version: u64) -> StoreResult<i64> {
    i64::try_from(version).map_err(|_| corrupt("version", version))
}

async fn current_version(conn: &mut PgConnection, code: &RoomCode) -> StoreResult<Option<u64>> {
    let row = sqlx::query("SELECT version FROM rooms WHERE code = $1")
        .bind(code.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|r| {
        let version: i64 = r.try_get("version")?;
        u64::try_from(version).map_err(|_| corrupt("version", version))
    })
    .transpose()
}

async fn update_room(
    conn: &mut PgConnection,
    code: &RoomCode,
    patch: &RoomPatch,
    expected_version: Option<u64>,
) -> StoreResult<u64> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("UPDATE rooms SET version = version + 1, updated_at = NOW()");
    if let Some(status) = patch.status {
        qb.push(", status = ")
            .push_bind(status.as_str().to_string());
    }
    if let Some(pot) = patch.pot {
        qb.push(", pot = ").push_bind(pot);
    }
    if let Some(entry_fee) = patch.entry_fee {
        qb.push(", entry_fee = ").push_bind(entry_fee);
    }
    if let Some(turn) = patch.current_turn_player_id {
        qb.push(", current_turn_player_id = ")
            .push_bind(turn.map(|id| id.as_uuid()));
    }
    if let Some(bet) = patch.current_bet {
        let quantity = i32::try_from(bet.quantity).map_err(|_| corrupt("bet_quantity", bet))?;
        qb.push(", bet_quantity = ").push_bind(quantity);
        qb.push(", bet_face = ").push_bind(i16::from(bet.face));
    }
    if let Some(allow_cheats) = patch.allow_cheats {
        qb.push(", allow_cheats = ").push_bind(allow_cheats);
    }
    if let Some(notification) = &patch.notification {
        qb.push(", notification = ")
            .push_bind(notification.clone().map(Json));
    }
    if let Some(game_over) = &patch.game_over {
        qb.push(", game_over = ")
            .push_bind(game_over.clone().map(Json));
    }
    if let Some(participants) = &patch.participants {
        qb.push(", participants = ")
            .push_bind(participant_column(participants));
    }
    qb.push(" WHERE code = ")
        .push_bind(code.as_str().to_string());
    if let Some(expected) = expected_version {
        qb.push(" AND version = ")
            .push_bind(version_column(expected)?);
    }
    qb.push(" RETURNING version");

    let row = qb.build().fetch_optional(&mut *conn).await?;
    if let Some(row) = row {
        let version: i64 = row.try_get("version")?;
        return u64::try_from(version).map_err(|_| corrupt("version", version));
    }

    match (expected_version, current_version(conn, code).await?) {
        (Some(expected), Some(actual)) => Err(StoreError::StaleVersion {
            code: code.clone(),
            expected,
            actual,
        }),
        _ => Err(StoreError::RoomNotFound(code.clone())),
    }
}

async fn update_player(
    conn: &mut PgConnection,
    code: &RoomCode,
    id: PlayerId,
    patch: &PlayerPatch,
) -> StoreResult<()> {
    // `id = id` keeps the SET list valid for an empty patch, which still
    // checks that the row exists.
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE room_players SET id = id");
    if let Some(is_host) = patch.is_host {
        qb.push(", is_host = ").push_bind(is_host);
    }
    if let Some(money) = patch.money {
        qb.push(", money = ").push_bind(money);
    }
    if let Some(dice) = &patch.dice_values {
        qb.push(", dice_values = ")
            .push_bind(dice_column(dice.as_ref()));
    }
    if let Some(is_ready) = patch.is_ready {
        qb.push(", is_ready = ").push_bind(is_ready);
    }
    if let Some(seat) = patch.seat_index {
        qb.push(", seat_index = ").push_bind(seat_column(seat)?);
    }
    if let Some(contribution) = patch.current_contribution {
        qb.push(", current_contribution = ").push_bind(contribution);
    }
    if let Some(used) = patch.has_used_cheat {
        qb.push(", has_used_cheat = ").push_bind(used);
    }
    qb.push(" WHERE id = ").push_bind(id.as_uuid());
    qb.push(" AND room_code = ")
        .push_bind(code.as_str().to_string());

    let result = qb.build().execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::PlayerNotFound(id));
    }
    Ok(())
}

async fn remove_player(conn: &mut PgConnection, code: &RoomCode, id: PlayerId) -> StoreResult<()> {
    let result = sqlx::query("DELETE FROM room_players WHERE id = $1 AND room_code = $2")
        .bind(id.as_uuid())
        .bind(code.as_str())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::PlayerNotFound(id));
    }
    Ok(())
}

/// [`StateStore`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    feeds: Arc<RwLock<HashMap<RoomCode, broadcast::Sender<StoreEvent>>>>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            feeds: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn publish(&self, event: StoreEvent) {
        let code = match &event {
            StoreEvent::Room { code, .. } | StoreEvent::Roster { code } => code,
        };
        if let Some(feed) = self.feeds.read().await.get(code) {
            let _ = feed.send(event);
        }
    }

    async fn roster_changed(&self, code: &RoomCode) {
        self.publish(StoreEvent::Roster { code: code.clone() })
            .await;
    }

    /// Remove a room and, through the foreign key, its players.
    pub async fn delete_room(&self, code: &RoomCode) -> StoreResult<()> {
        let result = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let result = sqlx::query("DELETE FROM rooms WHERE code = $1")
                .bind(code.as_str())
                .execute(&self.pool)
                .await?;
            Ok::<_, StoreError>(result)
        })
        .await?;
        self.feeds.write().await.remove(code);
        if result.rows_affected() == 0 {
            return Err(StoreError::RoomNotFound(code.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for PgStore {
    async fn create_room(&self, room: &Room) -> StoreResult<()> {
        let quantity = i32::try_from(room.current_bet.quantity)
            .map_err(|_| corrupt("bet_quantity", room.current_bet))?;
        let result = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let result = sqlx::query(
                "INSERT INTO rooms (code, status, pot, entry_fee, current_turn_player_id,
                                    bet_quantity, bet_face, allow_cheats, notification,
                                    game_over, participants, version)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(room.code.as_str())
            .bind(room.status.as_str())
            .bind(room.pot)
            .bind(room.entry_fee)
            .bind(room.current_turn_player_id.map(|id| id.as_uuid()))
            .bind(quantity)
            .bind(i16::from(room.current_bet.face))
            .bind(room.allow_cheats)
            .bind(room.notification.clone().map(Json))
            .bind(room.game_over.clone().map(Json))
            .bind(participant_column(&room.participants))
            .bind(version_column(room.version)?)
            .execute(&self.pool)
            .await?;
            Ok::<_, StoreError>(result)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RoomExists(room.code.clone()));
        }
        Ok(())
    }

    async fn read_room(&self, code: &RoomCode) -> StoreResult<Room> {
        let row = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE code = $1"))
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await?;
            Ok::<_, StoreError>(row)
        })
        .await?;
        match row {
            Some(row) => room_from_row(&row),
            None => Err(StoreError::RoomNotFound(code.clone())),
        }
    }

    async fn read_players(&self, code: &RoomCode) -> StoreResult<Vec<Player>> {
        // An unknown room and an empty one both return no rows.
        self.read_room(code).await?;
        let rows = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let rows = sqlx::query(&format!(
                "SELECT {PLAYER_COLUMNS} FROM room_players
                 WHERE room_code = $1 ORDER BY joined_at, id"
            ))
            .bind(code.as_str())
            .fetch_all(&self.pool)
            .await?;
            Ok::<_, StoreError>(rows)
        })
        .await?;
        rows.iter().map(player_from_row).collect()
    }

    async fn insert_player(&self, code: &RoomCode, player: &Player) -> StoreResult<()> {
        let seat = seat_column(player.seat_index)?;
        with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let result = sqlx::query(
                "INSERT INTO room_players (id, room_code, user_id, name, is_host, money,
                                           dice_values, is_ready, seat_index,
                                           current_contribution, has_used_cheat, joined_at)
                 SELECT $1, code, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12
                 FROM rooms WHERE code = $2",
            )
            .bind(player.id.as_uuid())
            .bind(code.as_str())
            .bind(player.user_id)
            .bind(&player.name)
            .bind(player.is_host)
            .bind(player.money)
            .bind(dice_column(player.dice_values.as_ref()))
            .bind(player.is_ready)
            .bind(seat)
            .bind(player.current_contribution)
            .bind(player.has_used_cheat)
            .bind(player.joined_at)
            .execute(&self.pool)
            .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::RoomNotFound(code.clone()));
            }
            Ok(())
        })
        .await?;
        self.roster_changed(code).await;
        Ok(())
    }

    async fn write_room(
        &self,
        code: &RoomCode,
        patch: &RoomPatch,
        expected_version: Option<u64>,
    ) -> StoreResult<u64> {
        let version = with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let mut conn = self.pool.acquire().await?;
            update_room(&mut conn, code, patch, expected_version).await
        })
        .await?;
        self.publish(StoreEvent::Room {
            code: code.clone(),
            version,
        })
        .await;
        Ok(version)
    }

    async fn write_player(
        &self,
        code: &RoomCode,
        id: PlayerId,
        patch: &PlayerPatch,
    ) -> StoreResult<()> {
        with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let mut conn = self.pool.acquire().await?;
            update_player(&mut conn, code, id, patch).await
        })
        .await?;
        self.roster_changed(code).await;
        Ok(())
    }

    async fn delete_player(&self, code: &RoomCode, id: PlayerId) -> StoreResult<()> {
        with_timeout(DEFAULT_QUERY_TIMEOUT, async {
            let mut conn = self.pool.acquire().await?;
            remove_player(&mut conn, code, id).await
        })
        .await?;
        self.roster_changed(code).await;
        Ok(())
    }

    async fn bulk_write_players(
        &self,
        code: &RoomCode,
        patches: &[(PlayerId, PlayerPatch)],
    ) -> StoreResult<()> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;
            for (id, patch) in patches {
                update_player(&mut tx, code, *id, patch).await?;
            }
            tx.commit().await?;
            Ok(())
        })
        .await?;
        self.roster_changed(code).await;
        Ok(())
    }

    async fn subscribe(&self, code: &RoomCode) -> StoreResult<broadcast::Receiver<StoreEvent>> {
        self.read_room(code).await?;
        let mut feeds = self.feeds.write().await;
        let feed = feeds
            .entry(code.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0);
        Ok(feed.subscribe())
    }

    async fn commit(
        &self,
        code: &RoomCode,
        expected_version: u64,
        mutation: &Mutation,
    ) -> StoreResult<u64> {
        let version = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.pool.begin().await?;
            let version = update_room(&mut tx, code, &mutation.room, Some(expected_version)).await?;
            for (id, patch) in &mutation.players {
                update_player(&mut tx, code, *id, patch).await?;
            }
            for id in &mutation.removed {
                remove_player(&mut tx, code, *id).await?;
            }
            tx.commit().await?;
            Ok(version)
        })
        .await?;

        if !mutation.players.is_empty() || !mutation.removed.is_empty() {
            self.roster_changed(code).await;
        }
        self.publish(StoreEvent::Room {
            code: code.clone(),
            version,
        })
        .await;
        Ok(version)
    }
}
