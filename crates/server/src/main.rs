//! Arena server entry point.
//!
//! Connects to the database, runs migrations and keeps the deadline
//! sweeps running until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use arena_common::{Config, LogConfig};
use arena_core::{CompetitionEngine, StatsLedger, Stores, TracingNotifier};
use arena_queue::{SchedulerConfig, run_scheduler};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminate = terminate.recv();

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Option<()>>();

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arena=debug,sea_orm=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set ARENA_* directly.
    dotenvy::dotenv().ok();

    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.log);

    info!("Starting arena server...");

    let db = arena_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    arena_db::migrate(&db).await?;
    info!("Migrations completed");

    let stores = Stores::from_connection(Arc::new(db));
    let ledger = Arc::new(StatsLedger::new(stores.stats.clone()));
    let engine = Arc::new(CompetitionEngine::new(
        stores,
        ledger,
        Arc::new(TracingNotifier),
        config.competition.clone(),
        config.rewards.clone(),
    ));

    let scheduler = run_scheduler(SchedulerConfig::from(&config.scheduler), engine);
    info!("Deadline sweeps running");

    let signal = shutdown_signal().await;
    scheduler.shutdown().await;
    signal?;

    info!("Server shutdown complete");
    Ok(())
}
