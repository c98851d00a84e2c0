// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Folio-Session app shell
//!
//! Serves the login, OAuth callback and protected routes of the portfolio
//! app, gated on the locally resolved session.

use anyhow::Context;
use folio_session::{config::Config, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        port = config.port,
        api_url = %config.api_url,
        persistent = config.token_store_path.is_some(),
        "Starting Folio-Session app shell"
    );

    let state = Arc::new(AppState::new(config.clone()).context("Failed to initialize services")?);

    // Resolve the session for as long as the shell runs
    let _mounted = state.session.mount();

    // Build router
    let app = folio_session::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("folio_session=debug".parse()?)
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .with(format)
        .init();
    Ok(())
}
