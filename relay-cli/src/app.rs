//! Process wiring: load the snapshot, build the core, run dispatcher, liveness endpoint and
//! periodic snapshots, save once more on shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use relay_core::{init_console_tracing, init_tracing, RelayCore};
use relay_storage::SnapshotRepository;
use relay_telegram::{
    build_bot, run_dispatcher, serve_liveness, RelayBotConfig, TelegramTransport,
    DEFAULT_DATABASE_URL,
};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// Main entry for `run`: init logging, restore state, serve until Ctrl-C.
#[instrument(skip(config))]
pub async fn run_relay(config: RelayBotConfig) -> Result<()> {
    init_tracing(&config.log_file)?;

    info!(
        operator_id = config.operator_id,
        database_url = %config.database_url,
        forward_mode = %config.forward_mode,
        debounce_ms = config.debounce_ms,
        binding_capacity = config.binding_capacity,
        sender_header = config.sender_header,
        "Initializing relay bot"
    );

    let repo = SnapshotRepository::new(&config.database_url)
        .await
        .with_context(|| format!("Open database {}", config.database_url))?;
    let snapshot = repo.load().await.context("Load relay snapshot")?;

    let bot = build_bot(&config)?;
    let transport = Arc::new(TelegramTransport::new(bot.clone(), config.forward_mode));
    let relay = Arc::new(RelayCore::with_snapshot(
        transport,
        config.relay_config(),
        snapshot,
    ));

    let port = config.port;
    let liveness = tokio::spawn(async move {
        if let Err(e) = serve_liveness(port).await {
            error!(error = %e, "Liveness endpoint stopped");
        }
    });
    let saver = spawn_snapshot_loop(
        relay.clone(),
        repo.clone(),
        Duration::from_secs(config.snapshot_interval_secs),
    );

    info!("Relay bot started");
    let outcome = run_dispatcher(bot, relay.clone()).await;

    saver.abort();
    liveness.abort();
    save_snapshot(&relay, &repo)
        .await
        .context("Save relay snapshot on shutdown")?;
    info!("Relay bot stopped");

    outcome
}

/// Writes the current state through the repository.
pub async fn save_snapshot(relay: &RelayCore, repo: &SnapshotRepository) -> Result<()> {
    let snapshot = relay.snapshot().await;
    repo.save(&snapshot).await?;
    Ok(())
}

/// Saves every `period`; failures are logged and retried on the next tick.
pub fn spawn_snapshot_loop(
    relay: Arc<RelayCore>,
    repo: SnapshotRepository,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately; nothing has changed yet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = save_snapshot(&relay, &repo).await {
                error!(error = %e, "Periodic snapshot failed");
            }
        }
    })
}

/// `stats` subcommand: prints persisted totals.
pub async fn print_stats(database_url: Option<String>) -> Result<()> {
    init_console_tracing();

    let database_url = database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
    let repo = SnapshotRepository::new(&database_url)
        .await
        .with_context(|| format!("Open database {}", database_url))?;
    let stats = repo.stats().await?;

    println!("Database: {}", database_url);
    println!("{:<12} {}", "users", stats.users);
    println!("{:<12} {}", "banned", stats.banned);
    println!("{:<12} {}", "silenced", stats.silenced);
    println!("{:<12} {}", "messages", stats.messages);
    println!("{:<12} {}", "bindings", stats.bindings);

    Ok(())
}
