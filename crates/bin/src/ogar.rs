//! Ogar - headless arena simulation

use server::{HeadlessListener, Router, ServerHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Ogar - Headless Arena Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Name: {}", config.server.name);
    info!("  Tick interval: {}ms", config.server.tick_interval_ms);
    info!("  Border: {}x{}", config.border.width, config.border.height);
    info!("  Game mode: {}", config.server.gamemode);

    let bots = config.server.bots;
    let mut handle = ServerHandle::new(config, Box::new(HeadlessListener::new()));
    handle.start();
    info!("Game mode {} active", handle.gamemode().name());

    if let Some(&world_id) = handle.worlds().keys().next() {
        for n in 1..=bots {
            let id = handle.create_player(Router::bot());
            if !handle.join_world(id, world_id) || !handle.request_spawn(id, &format!("Bot{n}")) {
                warn!("Bot {} could not spawn in world {}", id, world_id);
            }
        }
        if bots > 0 {
            info!("Spawned {} bots", bots);
        }
    }

    tokio::select! {
        _ = handle.run() => {
            info!("Ticker stopped");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received Ctrl-C");
        }
    }

    let stats = handle.stats();
    info!(
        "Shutting down after {} ticks (avg {:.3}ms)",
        stats.tick, stats.average_tick_time
    );
    handle.stop();

    Ok(())
}
