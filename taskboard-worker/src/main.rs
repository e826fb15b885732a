//! # Taskboard Worker
//!
//! Polls the notification outbox and sends the queued emails. Several workers
//! can run against the same database; claimed rows are leased so each mail is
//! handed to one worker at a time.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/taskboard MAIL_TRANSPORT=log cargo run -p taskboard-worker
//! ```

use anyhow::Context;
use taskboard_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use taskboard_worker::{config::WorkerConfig, dispatcher::Dispatcher, mailer::build_mailer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!(
        "Taskboard Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::with_url(config.database.url.clone())
    })
    .await
    .context("Failed to connect to database")?;

    let mailer = build_mailer(&config.mail).context("Failed to set up mail transport")?;
    let dispatcher = Dispatcher::new(pool.clone(), mailer, config.mail.from.clone(), config.dispatcher);

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received, finishing current batch..."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    dispatcher.run().await?;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}

/// `LOG_FORMAT=json` switches to one JSON object per line
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taskboard_worker=debug,taskboard_shared=info".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
