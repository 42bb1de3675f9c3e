// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// File name of the persisted activity batch inside `data_dir`.
pub const BATCH_FILE: &str = "running_data.json";
/// File name of the persisted training plan inside `data_dir`.
pub const PLAN_FILE: &str = "training_plan.json";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Strava ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// Long-lived refresh token used to bootstrap a session without the browser flow
    pub strava_refresh_token: Option<String>,

    // --- Gemini ---
    pub gemini_api_key: String,
    pub gemini_model: String,

    // --- Google Calendar ---
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_refresh_token: Option<String>,

    // --- Server ---
    /// Frontend URL for CORS and OAuth redirects
    pub frontend_url: String,
    /// Public URL of this API (OAuth callback base)
    pub api_url: String,
    /// HMAC key for signing the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
    /// Directory holding the persisted batch and plan
    pub data_dir: PathBuf,
    /// Server port
    pub port: u16,

    /// Fetch tunables
    pub fetch: FetchConfig,
}

/// Tunables for the activity gathering stage.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempts per activity before giving up.
    pub max_attempts: u32,
    /// Wait after a rate-limit response.
    pub rate_limit_cooldown: Duration,
    /// Wait between consecutive activities in a batch.
    pub inter_item_delay: Duration,
    /// How many feed entries to scan for runs.
    pub feed_window: u32,
    /// How many runs to gather.
    pub run_count: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(60),
            inter_item_delay: Duration::from_millis(500),
            feed_window: 200,
            run_count: 10,
        }
    }
}

impl FetchConfig {
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: parse_var("FETCH_MAX_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            rate_limit_cooldown: parse_var("RATE_LIMIT_COOLDOWN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit_cooldown),
            inter_item_delay: parse_var("INTER_ITEM_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.inter_item_delay),
            feed_window: parse_var("FEED_WINDOW")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.feed_window),
            run_count: parse_var("RUN_COUNT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.run_count),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            strava_refresh_token: optional("STRAVA_REFRESH_TOKEN"),
            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            google_client_id: optional("GOOGLE_CLIENT_ID"),
            google_client_secret: optional("GOOGLE_CLIENT_SECRET"),
            google_refresh_token: optional("GOOGLE_REFRESH_TOKEN"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            port: parse_var("PORT").unwrap_or(8000),
            fetch: FetchConfig::from_env(),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_refresh_token: None,
            gemini_api_key: "test_gemini_key".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            google_client_id: None,
            google_client_secret: None,
            google_refresh_token: None,
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8000".to_string(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            data_dir: env::temp_dir().join("stride-coach-test"),
            port: 8000,
            fetch: FetchConfig {
                rate_limit_cooldown: Duration::ZERO,
                inter_item_delay: Duration::ZERO,
                ..FetchConfig::default()
            },
        }
    }

    pub fn batch_path(&self) -> PathBuf {
        self.data_dir.join(BATCH_FILE)
    }

    pub fn plan_path(&self) -> PathBuf {
        self.data_dir.join(PLAN_FILE)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
