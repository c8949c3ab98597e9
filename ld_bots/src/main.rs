//! Headless liar's dice bot games.
//!
//! Creates a room, seats bot players and plays games to completion
//! against the room service, backed by PostgreSQL or the in-memory store.

mod config;

use std::sync::Arc;

use anyhow::Error;
use ctrlc::set_handler;
use liars_dice::{
    GameError, InMemoryStore, StateStore,
    bot::{BotManager, BotStrategy},
    db::Database,
    room::{RoomError, RoomManager},
};
use log::info;
use pico_args::Arguments;

use config::{Overrides, RunnerConfig};

const HELP: &str = "\
Play liar's dice games between bots

USAGE:
  ld_bots [OPTIONS]

OPTIONS:
  --bots        N          Bots to seat                  [default: env BOT_COUNT or 4]
  --games       N          Games to play back to back    [default: env BOT_GAMES or 1]
  --difficulty  LEVEL      easy, standard or sharp       [default: env BOT_DIFFICULTY or standard]
  --fee         COINS      Entry fee per game            [default: env ROOM_ENTRY_FEE or 100]
  --seed        N          Seed bot strategies           [default: env BOT_SEED or random]
  --db-url      URL        Play against PostgreSQL       [default: env DATABASE_URL, else in-memory]

FLAGS:
  --cheats                 Allow each bot one peek per game
  --paced                  Pause for bot think times
  -h, --help               Print help information

ENVIRONMENT:
  ROOM_STARTING_MONEY      Balance each bot joins with
  ROOM_AUTO_ADVANCE_MS     Delay between a challenge and the re-deal
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = Overrides {
        cheats: pargs.contains("--cheats"),
        paced: pargs.contains("--paced"),
        bots: pargs.opt_value_from_str("--bots")?,
        games: pargs.opt_value_from_str("--games")?,
        difficulty: pargs.opt_value_from_str("--difficulty")?,
        entry_fee: pargs.opt_value_from_str("--fee")?,
        seed: pargs.opt_value_from_str("--seed")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };
    let config = RunnerConfig::from_env(overrides)?;
    config.validate()?;

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    env_logger::builder().format_target(false).init();

    let store: Arc<dyn StateStore> = match &config.database {
        Some(db_config) => {
            info!("Connecting to database: {}", db_config.database_url);
            let db = Database::new(db_config)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
            db.migrate()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database connected successfully");
            Arc::new(db.store())
        }
        None => {
            info!("Using the in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let rooms = RoomManager::new(store);
    let room = rooms.create_room(config.room.clone()).await?;
    let cheats = config.room.allow_cheats;
    info!(
        "Created room {} (entry fee ${}, cheats {})",
        room.code(),
        config.room.entry_fee,
        if cheats { "on" } else { "off" }
    );

    let base_seed = config.seed.unwrap_or_else(rand::random);
    info!(
        "Seeding {} {} bots from {}",
        config.bots, config.difficulty, base_seed
    );

    let mut bots = BotManager::new(room.clone()).paced(config.paced);
    for i in 0..config.bots {
        let strategy = BotStrategy::with_seed(config.difficulty, base_seed.wrapping_add(i as u64));
        bots.add_bot(strategy, config.difficulty).await?;
    }

    for game in 1..=config.games {
        let over = match bots.play_game().await {
            Ok(over) => over,
            // the host bot itself can't cover the fee
            Err(RoomError::Game(e @ GameError::InsufficientFunds { .. })) => {
                info!("Stopping after {} game(s): {}", game - 1, e);
                break;
            }
            Err(e) => return Err(e.into()),
        };
        let winner = &over.winner_name;
        match &over.runner_up_name {
            Some(runner_up) => info!(
                "Game {game}: {winner} wins ${}, {runner_up} takes ${} (pot ${})",
                over.amounts.winner, over.amounts.runner_up, over.total_pot
            ),
            None => info!(
                "Game {game}: {winner} wins ${} (pot ${})",
                over.amounts.winner, over.total_pot
            ),
        }

        if game == config.games {
            break;
        }
        let retired = bots.retire_broke_bots().await?;
        if retired > 0 {
            info!("{} bot(s) went broke", retired);
        }
        if bots.bot_count() < 2 {
            info!("Not enough solvent bots, stopping after {game} game(s)");
            break;
        }
        bots.rematch().await?;
    }

    let snapshot = room.snapshot().await?;
    info!("Final balances:");
    for player in &snapshot.players {
        info!("  - {}: ${}", player.name, player.money);
    }

    rooms.close_room(room.code()).await?;
    info!("Shutting down...");

    Ok(())
}
