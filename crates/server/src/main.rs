mod bootstrap;
mod catalog;
mod customers;
mod errors;
mod health;
mod inventory;
mod orders;
mod payments;
mod purchases;
mod quotations;
#[cfg(test)]
mod testing;

use anyhow::Result;
use axum::Router;
use pozinox_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use pozinox_core::config::LogFormat::*;
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

    let router = Router::new()
        .merge(catalog::router())
        .merge(customers::router())
        .merge(quotations::router())
        .merge(orders::router())
        .merge(purchases::router())
        .merge(inventory::router())
        .with_state(app.state.clone())
        .merge(health::router(app.state.db_pool.clone()));

    let bind = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %bind,
        "pozinox-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "pozinox-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
