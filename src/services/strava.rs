// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client for fetching the athlete's activities.
//!
//! Handles:
//! - OAuth code exchange and token refresh (tokens live in the [`TokenStore`])
//! - Athlete profile and recent-activity feed
//! - Detailed activity fetch with failure classification for retries

use crate::error::AppError;
use crate::models::AthleteIdentity;
use crate::services::activity::ActivityDetailSource;
use crate::services::pipeline::Authenticator;
use crate::services::selector::ActivityFeed;
use crate::services::session::{Provider, SessionToken, TokenStore};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

const API_BASE_URL: &str = "https://www.strava.com/api/v3";
const OAUTH_BASE_URL: &str = "https://www.strava.com/oauth";
const OAUTH_SCOPES: &str = "read_all,profile:read_all,activity:read_all";

/// Failure classes of a Strava call, as seen by the retry logic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StravaError {
    #[error("Strava rate limit exceeded")]
    RateLimited,

    #[error("Strava server error ({0})")]
    ServerError(String),

    #[error("Access to Strava denied")]
    Unauthorized,

    #[error("Not found on Strava")]
    NotFound,

    #[error("Strava request failed: {0}")]
    Fault(String),

    #[error("Unexpected Strava response: {0}")]
    Malformed(String),
}

impl StravaError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => StravaError::RateLimited,
            401 | 403 => StravaError::Unauthorized,
            404 => StravaError::NotFound,
            s if (500..600).contains(&s) => StravaError::ServerError(format!("HTTP {}", status)),
            _ => StravaError::Fault(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<StravaError> for AppError {
    fn from(e: StravaError) -> Self {
        match e {
            StravaError::Unauthorized => AppError::Unauthorized(e.to_string()),
            StravaError::NotFound => AppError::NotFound(e.to_string()),
            other => AppError::StravaApi(other.to_string()),
        }
    }
}

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    base_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
    tokens: TokenStore,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String, tokens: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_BASE_URL.to_string(),
            oauth_url: OAUTH_BASE_URL.to_string(),
            client_id,
            client_secret,
            tokens,
        }
    }

    /// Point the client at another host (local stubs, tests).
    pub fn with_base_urls(mut self, api: impl Into<String>, oauth: impl Into<String>) -> Self {
        self.base_url = api.into();
        self.oauth_url = oauth.into();
        self
    }

    /// URL of the Strava consent screen.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code&approval_prompt=auto&scope={}&state={}",
            self.oauth_url,
            self.client_id,
            urlencoding::encode(redirect_uri),
            OAUTH_SCOPES,
            urlencoding::encode(state)
        )
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Exchange an authorization code for tokens and start a session.
    pub async fn exchange_code(&self, code: &str) -> Result<AthleteIdentity, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        let exchange: TokenExchangeResponse = read_json(response).await?;
        self.tokens.insert(
            Provider::Strava,
            SessionToken {
                access_token: exchange.access_token,
                refresh_token: Some(exchange.refresh_token),
                expires_at: timestamp(exchange.expires_at),
            },
        );

        tracing::info!(athlete_id = exchange.athlete.id, "Strava session started");
        Ok(exchange.athlete)
    }

    /// Refresh the access token if it is missing or about to expire.
    pub async fn refresh_if_needed(&self) -> Result<(), AppError> {
        let token = self
            .tokens
            .get(Provider::Strava)
            .ok_or_else(|| AppError::Unauthorized("Not connected to Strava".to_string()))?;

        if !token.needs_refresh(Utc::now()) {
            return Ok(());
        }

        let refresh_token = token.refresh_token.ok_or_else(|| {
            AppError::Unauthorized("Strava session expired, reconnect required".to_string())
        })?;

        tracing::info!("Strava access token expired, refreshing");

        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        let refreshed: TokenRefreshResponse = read_json(response).await?;
        self.tokens.update_access(
            Provider::Strava,
            refreshed.access_token,
            Some(refreshed.refresh_token),
            timestamp(refreshed.expires_at),
        );

        tracing::info!("Strava token refreshed");
        Ok(())
    }

    /// Get a valid access token, refreshing first if needed.
    async fn access_token(&self) -> Result<String, AppError> {
        self.refresh_if_needed().await?;
        self.tokens
            .get(Provider::Strava)
            .map(|t| t.access_token)
            .ok_or_else(|| AppError::Unauthorized("Not connected to Strava".to_string()))
    }

    // ─── API Calls ───────────────────────────────────────────────────────────

    /// Get authenticated athlete profile.
    pub async fn get_athlete(&self) -> Result<AthleteIdentity, AppError> {
        let token = self.access_token().await?;
        let url = format!("{}/athlete", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        Ok(read_json(response).await?)
    }

    /// List the most recent activities (single page, newest first).
    pub async fn list_activities(&self, per_page: u32) -> Result<Vec<ActivitySummary>, AppError> {
        let token = self.access_token().await?;
        let url = format!("{}/athlete/activities", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("page", "1".to_string()), ("per_page", per_page.to_string())])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        Ok(read_json(response).await?)
    }

    /// Get a detailed activity by ID.
    pub async fn get_activity(&self, activity_id: u64) -> Result<StravaActivity, StravaError> {
        let token = self.access_token().await.map_err(|e| match e {
            AppError::Unauthorized(_) => StravaError::Unauthorized,
            other => StravaError::Fault(other.to_string()),
        })?;

        let url = format!("{}/activities/{}", self.base_url, activity_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[("include_all_efforts", "false")])
            .send()
            .await
            .map_err(|e| StravaError::Fault(e.to_string()))?;

        read_json(response).await
    }
}

impl Authenticator for StravaClient {
    async fn authenticate(&self) -> Result<AthleteIdentity, AppError> {
        self.get_athlete().await
    }

    async fn refresh_if_needed(&self) -> Result<(), AppError> {
        StravaClient::refresh_if_needed(self).await
    }
}

impl ActivityFeed for StravaClient {
    async fn list_recent_activities(&self, limit: u32) -> Result<Vec<ActivitySummary>, AppError> {
        self.list_activities(limit).await
    }
}

impl ActivityDetailSource for StravaClient {
    async fn fetch_activity_detail(&self, activity_id: u64) -> Result<StravaActivity, StravaError> {
        self.get_activity(activity_id).await
    }
}

/// Check response status and parse the JSON body.
async fn read_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, StravaError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = StravaError::from_status(status, &body);
        if err == StravaError::RateLimited {
            tracing::warn!("Strava rate limit hit (429)");
        }
        return Err(err);
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| StravaError::Fault(e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| StravaError::Malformed(e.to_string()))
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    athlete: AthleteIdentity,
}

/// Summary activity for the feed endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Detailed Strava activity response.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    /// Metres
    pub distance: f64,
    /// Seconds
    pub moving_time: u64,
    /// Metres per second
    pub average_speed: f64,
    #[serde(default)]
    pub has_heartrate: bool,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
    #[serde(default)]
    pub max_heartrate: Option<f64>,
    #[serde(default)]
    pub splits_metric: Vec<StravaSplit>,
}

/// Per-kilometre split as reported by Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaSplit {
    /// 1-based split index
    pub split: u32,
    pub distance: f64,
    pub moving_time: u64,
    pub average_speed: f64,
    #[serde(default)]
    pub elevation_difference: Option<f64>,
    #[serde(default)]
    pub average_heartrate: Option<f64>,
}
