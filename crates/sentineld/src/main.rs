use anyhow::Result;
use sentinel_core::{KeyValueStore, MemoryStore, Sentinel, SentinelOptions, SqliteStore};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod audio;
mod board;
mod config;
mod dbus_interface;
mod engine;

use audio::CommandAudio;
use board::StatusBoard;
use config::Config;
use dbus_interface::{SentinelService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("sentineld starting");
    let config = Config::load();

    let engine = engine::spawn_engine(config.engine_command.clone())?;

    // A broken database degrades to an in-memory store rather than refusing to run.
    let backend: Box<dyn KeyValueStore> = match SqliteStore::open(&config.db_path) {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %config.db_path.display(),
                "enrollment database unavailable; enrollments will not persist"
            );
            Box::new(MemoryStore::new())
        }
    };

    let audio = Arc::new(CommandAudio::new(
        config.audio_player.clone(),
        config.alert_sound.clone(),
        config.audio_mute_args.clone(),
    ));
    let board = Arc::new(StatusBoard::new());

    let sentinel = Arc::new(Sentinel::new(
        engine,
        backend,
        audio,
        board.clone(),
        SentinelOptions {
            detect: config.detect_options(),
            ..SentinelOptions::default()
        },
    ));

    let _connection = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, SentinelService::new(sentinel, board))?
        .build()
        .await?;

    tracing::info!(bus_name = BUS_NAME, path = OBJECT_PATH, "sentineld ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("sentineld shutting down");

    Ok(())
}
