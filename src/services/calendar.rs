// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Calendar client and workout → event formatting.

use crate::error::AppError;
use crate::models::Workout;
use crate::services::pipeline::CalendarSink;
use crate::services::session::{Provider, SessionToken, TokenStore};
use crate::time_utils::{is_iana_like, parse_time_of_day};
use chrono::{Duration, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

const API_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Event length when a workout has no duration.
const DEFAULT_EVENT_MINUTES: i64 = 10;
/// Google Calendar colour id used for workouts.
const WORKOUT_COLOR_ID: &str = "6";

/// Validated time-of-day and timezone for scheduling workouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRequest {
    start_time: NaiveTime,
    time_zone: String,
}

impl ScheduleRequest {
    /// Check a `HH:MM:SS` time and an IANA-style timezone.
    pub fn new(start_time: &str, time_zone: &str) -> Result<Self, AppError> {
        let start = parse_time_of_day(start_time).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Invalid time format {:?}. Use HH:MM:SS (e.g. 09:00:00)",
                start_time
            ))
        })?;

        if !is_iana_like(time_zone) {
            return Err(AppError::BadRequest(format!(
                "Invalid timezone {:?}. Use an IANA name (e.g. Europe/London, America/New_York)",
                time_zone
            )));
        }

        Ok(Self {
            start_time: start,
            time_zone: time_zone.to_string(),
        })
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn time_zone(&self) -> &str {
        &self.time_zone
    }
}

/// One calendar event, in the calendar's local time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub time_zone: String,
}

/// Confirmation returned for a created event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfirmation {
    pub id: String,
    #[serde(rename = "htmlLink", default)]
    pub html_link: Option<String>,
}

/// Build the calendar event for one workout.
pub fn format_workout_event(
    workout: &Workout,
    request: &ScheduleRequest,
) -> Result<CalendarEvent, AppError> {
    let date = workout.calendar_date().ok_or_else(|| {
        AppError::BadRequest(format!("Workout date {:?} is not YYYY-MM-DD", workout.date))
    })?;

    let mut description = workout.description.clone();
    if let Some(km) = workout.distance_km.filter(|d| *d > 0.0) {
        description.push_str(&format!(" Total Distance: {} KM .", km));
    }
    if let Some(pace) = workout.target_pace_min_km.as_deref().filter(|p| !p.is_empty()) {
        description.push_str(&format!(
            " Aim for {} as a successful pace for this workout.",
            pace
        ));
    }
    let minutes = match workout.duration_minutes.filter(|m| *m > 0.0) {
        Some(m) => {
            description.push_str(&format!(" This should take you around {} minutes.", m));
            m.round() as i64
        }
        None => DEFAULT_EVENT_MINUTES,
    };

    let start = date.and_time(request.start_time());
    let end = TimeDelta::try_minutes(minutes)
        .and_then(|length| start.checked_add_signed(length))
        .ok_or_else(|| {
            AppError::BadRequest(format!(
                "Workout duration of {} minutes is out of range",
                minutes
            ))
        })?;
    Ok(CalendarEvent {
        summary: workout.kind.clone(),
        description,
        start,
        end,
        time_zone: request.time_zone().to_string(),
    })
}

/// Google Calendar API client.
#[derive(Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    tokens: TokenStore,
}

impl CalendarClient {
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        tokens: TokenStore,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_BASE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            client_id,
            client_secret,
            tokens,
        }
    }

    pub fn with_base_urls(mut self, api: impl Into<String>, token: impl Into<String>) -> Self {
        self.base_url = api.into();
        self.token_url = token.into();
        self
    }

    fn credentials(&self) -> Result<(&str, &str), AppError> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(AppError::Calendar(
                "Google OAuth client is not configured".to_string(),
            )),
        }
    }

    /// URL of the Google consent screen.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        let (client_id, _) = self.credentials()?;
        Ok(format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&access_type=offline&prompt=consent&scope={}&state={}",
            AUTH_URL,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
            urlencoding::encode(state)
        ))
    }

    /// Exchange an authorization code and store the Google session.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<(), AppError> {
        let (client_id, client_secret) = self.credentials()?;
        let tokens: GoogleTokenResponse = self
            .post_token_form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        self.tokens.insert(
            Provider::Google,
            SessionToken {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
            },
        );
        tracing::info!("Google Calendar session started");
        Ok(())
    }

    /// Get a valid access token, refreshing it if it is about to expire.
    async fn access_token(&self) -> Result<String, AppError> {
        let token = self.tokens.get(Provider::Google).ok_or_else(|| {
            AppError::Unauthorized("Not connected to Google Calendar".to_string())
        })?;

        if !token.needs_refresh(Utc::now()) {
            return Ok(token.access_token);
        }

        let refresh_token = token.refresh_token.ok_or_else(|| {
            AppError::Unauthorized("Google session expired, reconnect required".to_string())
        })?;
        let (client_id, client_secret) = self.credentials()?;

        tracing::info!("Google access token expired, refreshing");
        let refreshed: GoogleTokenResponse = self
            .post_token_form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let access_token = refreshed.access_token.clone();
        self.tokens.update_access(
            Provider::Google,
            refreshed.access_token,
            refreshed.refresh_token,
            Utc::now() + Duration::seconds(refreshed.expires_in),
        );
        Ok(access_token)
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<GoogleTokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Calendar(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token request failed");
            return Err(AppError::Unauthorized(format!(
                "Google token request failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("Failed to parse token response: {}", e)))
    }
}

impl CalendarSink for CalendarClient {
    async fn create_event(&self, event: &CalendarEvent) -> Result<EventConfirmation, AppError> {
        let token = self.access_token().await?;
        let url = format!("{}/calendars/primary/events", self.base_url);

        let body = serde_json::json!({
            "summary": event.summary,
            "description": event.description,
            "colorId": WORKOUT_COLOR_ID,
            "start": {
                "dateTime": event.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": event.time_zone,
            },
            "end": {
                "dateTime": event.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
                "timeZone": event.time_zone,
            },
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Calendar(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Calendar(format!("HTTP {}: {}", status, body)));
        }

        let confirmation: EventConfirmation = response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("JSON parse error: {}", e)))?;

        tracing::info!(
            event_id = %confirmation.id,
            link = ?confirmation.html_link,
            "Calendar event created"
        );
        Ok(confirmation)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workout() -> Workout {
        Workout {
            day: "Wednesday".into(),
            date: "2025-06-18".into(),
            kind: "Tempo Run".into(),
            description: "Warm up, 20 minutes at threshold.".into(),
            distance_km: Some(8.0),
            target_pace_min_km: Some("4:45".into()),
            duration_minutes: Some(45.0),
        }
    }

    #[test]
    fn test_schedule_request_validation() {
        assert!(ScheduleRequest::new("25:00:00", "Europe/London").is_err());
        assert!(ScheduleRequest::new("09:00:00", "Nowhere").is_err());
        assert!(ScheduleRequest::new("09:00", "Europe/London").is_err());

        let req = ScheduleRequest::new("09:00:00", "Europe/London").unwrap();
        assert_eq!(req.time_zone(), "Europe/London");
        assert_eq!(req.start_time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn test_format_full_workout() {
        let req = ScheduleRequest::new("07:30:00", "America/New_York").unwrap();
        let event = format_workout_event(&workout(), &req).unwrap();

        assert_eq!(event.summary, "Tempo Run");
        assert_eq!(
            event.description,
            "Warm up, 20 minutes at threshold. Total Distance: 8 KM . \
             Aim for 4:45 as a successful pace for this workout. \
             This should take you around 45 minutes."
        );
        assert_eq!(event.start.to_string(), "2025-06-18 07:30:00");
        assert_eq!(event.end.to_string(), "2025-06-18 08:15:00");
        assert_eq!(event.time_zone, "America/New_York");
    }

    #[test]
    fn test_rest_day_gets_default_length() {
        let rest = Workout {
            kind: "Rest".into(),
            description: "Full rest.".into(),
            distance_km: None,
            target_pace_min_km: None,
            duration_minutes: None,
            ..workout()
        };
        let req = ScheduleRequest::new("09:00:00", "Europe/London").unwrap();
        let event = format_workout_event(&rest, &req).unwrap();
        assert_eq!(event.description, "Full rest.");
        assert_eq!(event.end - event.start, Duration::minutes(10));
    }

    #[test]
    fn test_late_workout_rolls_past_midnight() {
        let req = ScheduleRequest::new("23:30:00", "Europe/London").unwrap();
        let event = format_workout_event(&workout(), &req).unwrap();
        assert_eq!(event.end.to_string(), "2025-06-19 00:15:00");
    }

    #[test]
    fn test_huge_duration_is_rejected() {
        let endless = Workout {
            duration_minutes: Some(1e13),
            ..workout()
        };
        let req = ScheduleRequest::new("09:00:00", "Europe/London").unwrap();
        let err = format_workout_event(&endless, &req).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let infinite = Workout {
            duration_minutes: Some(f64::INFINITY),
            ..workout()
        };
        assert!(format_workout_event(&infinite, &req).is_err());
    }

    #[test]
    fn test_bad_workout_date() {
        let bad = Workout {
            date: "18-06-2025".into(),
            ..workout()
        };
        let req = ScheduleRequest::new("09:00:00", "Europe/London").unwrap();
        assert!(format_workout_event(&bad, &req).is_err());
    }

    #[test]
    fn test_authorize_url_requires_client() {
        let client = CalendarClient::new(None, None, TokenStore::new());
        assert!(client.authorize_url("http://localhost/cb", "xyz").is_err());

        let client = CalendarClient::new(Some("cid".into()), Some("s".into()), TokenStore::new());
        let url = client.authorize_url("http://localhost/cb", "xyz").unwrap();
        assert!(url.contains("client_id=cid"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("state=xyz"));
    }
}
