mod bootstrap;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use leadneedle_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use leadneedle_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let router = routes::router(app.state.clone()).merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "leadneedle-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "leadneedle-server stopping"
    );

    // Let queued email finish within the graceful window, then stop the
    // worker exactly once.
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let drained = app.state.queue.drain_and_wait(grace).await;
    if !drained {
        tracing::warn!(
            event_name = "system.server.drain_incomplete",
            correlation_id = "shutdown",
            "email queue did not drain before shutdown"
        );
    }
    app.state.queue.shutdown().await;
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
