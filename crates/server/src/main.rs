mod bootstrap;
mod dispatch;
mod health;
mod routes;
#[cfg(test)]
mod test_support;

use std::time::Duration;

use aisdr_core::config::LoadOptions;
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let app = bootstrap::bootstrap(LoadOptions::default()).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener =
        TcpListener::bind(&address).await.with_context(|| format!("could not bind {address}"))?;

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        address = %address,
        export_enabled = app.config.telemetry.export_enabled,
        "aisdr-server listening"
    );

    axum::serve(listener, routes::router(app.state.clone()))
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("server terminated unexpectedly")?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "aisdr-server stopping"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let telemetry = app.telemetry.clone();
    match tokio::time::timeout(grace, tokio::task::spawn_blocking(move || telemetry.shutdown()))
        .await
    {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => eprintln!("telemetry shutdown failed: {error}"),
        Ok(Err(error)) => eprintln!("telemetry shutdown task panicked: {error}"),
        Err(_) => eprintln!("telemetry shutdown exceeded {}s", grace.as_secs()),
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
}
