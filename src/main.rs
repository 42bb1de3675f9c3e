// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride Coach API Server
//!
//! Gathers a runner's recent Strava runs, has Gemini analyze them and write
//! a training plan, and adds the plan to Google Calendar.

use std::sync::Arc;
use stride_coach::{
    config::Config,
    services::{session::SessionToken, Provider, TokenStore},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(
        port = config.port,
        data_dir = %config.data_dir.display(),
        "Starting Stride Coach API"
    );

    // Seed sessions from configured refresh tokens; OAuth callbacks replace them
    let tokens = TokenStore::new();
    if let Some(refresh) = &config.strava_refresh_token {
        tokens.insert(Provider::Strava, SessionToken::from_refresh_token(refresh));
        tracing::info!("Strava session bootstrapped from refresh token");
    }
    if let Some(refresh) = &config.google_refresh_token {
        tokens.insert(Provider::Google, SessionToken::from_refresh_token(refresh));
        tracing::info!("Google session bootstrapped from refresh token");
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config, tokens));

    // Build router
    let app = stride_coach::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stride_coach=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
