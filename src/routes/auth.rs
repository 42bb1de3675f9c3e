// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava and Google OAuth routes.
//!
//! Each flow carries a signed `state` value. Callbacks refuse a missing,
//! forged, stale, or cross-provider state before touching the code, then
//! exchange the code, store the session in the shared
//! [`TokenStore`](crate::services::TokenStore), and send the browser back to
//! the frontend.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::services::oauth_state::{sign_state, verify_state};
use crate::services::Provider;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(strava_start))
        .route("/auth/strava/callback", get(strava_callback))
        .route("/auth/google", get(google_start))
        .route("/auth/google/callback", get(google_callback))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl CallbackParams {
    /// The authorization code, or the `error=` query to send the frontend.
    fn authorized_code(
        self,
        app: &AppState,
        provider: Provider,
    ) -> std::result::Result<String, String> {
        if let Some(error) = self.error {
            tracing::warn!(
                provider = provider.as_str(),
                error = %error,
                "OAuth error from provider"
            );
            return Err(format!("error={}", urlencoding::encode(&error)));
        }

        let state_ok = self.state.as_deref().is_some_and(|state| {
            verify_state(state, provider, &app.config.oauth_state_key, Utc::now())
        });
        if !state_ok {
            return Err("error=invalid_state".to_string());
        }

        self.code.ok_or_else(|| "error=missing_code".to_string())
    }
}

fn callback_url(state: &AppState, provider: &str) -> String {
    format!(
        "{}/auth/{}/callback",
        state.config.api_url.trim_end_matches('/'),
        provider
    )
}

fn frontend_redirect(state: &AppState, query: &str) -> Redirect {
    Redirect::temporary(&format!("{}?{}", state.config.frontend_url, query))
}

/// Start OAuth flow - redirect to Strava authorization.
async fn strava_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(Provider::Strava, &state.config.oauth_state_key, Utc::now())?;
    let auth_url = state
        .strava
        .authorize_url(&callback_url(&state, "strava"), &oauth_state);

    tracing::info!("Starting Strava OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

/// OAuth callback - exchange the code and start the Strava session.
async fn strava_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let code = match params.authorized_code(&state, Provider::Strava) {
        Ok(code) => code,
        Err(query) => return Ok(frontend_redirect(&state, &query)),
    };

    tracing::info!("Exchanging Strava authorization code for tokens");
    let athlete = state.strava.exchange_code(&code).await?;

    tracing::info!(athlete_id = athlete.id, "Strava OAuth successful");
    Ok(frontend_redirect(&state, "connected=strava"))
}

/// Start OAuth flow - redirect to the Google consent screen.
async fn google_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let oauth_state = sign_state(Provider::Google, &state.config.oauth_state_key, Utc::now())?;
    let auth_url = state
        .calendar
        .authorize_url(&callback_url(&state, "google"), &oauth_state)?;

    tracing::info!("Starting Google OAuth flow");
    Ok(Redirect::temporary(&auth_url))
}

/// OAuth callback - exchange the code and start the Google Calendar session.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let code = match params.authorized_code(&state, Provider::Google) {
        Ok(code) => code,
        Err(query) => return Ok(frontend_redirect(&state, &query)),
    };

    state
        .calendar
        .exchange_code(&code, &callback_url(&state, "google"))
        .await?;

    tracing::info!("Google OAuth successful");
    Ok(frontend_redirect(&state, "connected=google"))
}
