// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use chrono::TimeZone;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stride_coach::config::{Config, FetchConfig};
use stride_coach::db::JsonStore;
use stride_coach::error::AppError;
use stride_coach::models::{ActivityRecord, AthleteIdentity};
use stride_coach::routes::create_router;
use stride_coach::services::activity::ActivityDetailSource;
use stride_coach::services::calendar::{CalendarEvent, EventConfirmation};
use stride_coach::services::pipeline::{
    Authenticator, CalendarSink, PlanGenerator, RunAnalyzer,
};
use stride_coach::services::selector::ActivityFeed;
use stride_coach::services::strava::{ActivitySummary, StravaActivity, StravaError, StravaSplit};
use stride_coach::services::{PipelineManager, TokenStore};
use stride_coach::time_utils::Sleeper;
use stride_coach::AppState;

/// Create a test app with unconnected production clients.
/// Returns the router and the shared state.
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(Config::test_default(), TokenStore::new()));
    (create_router(state.clone()), state)
}

// ─── Sample data ─────────────────────────────────────────────

/// A 2 km run with heart rate and two splits.
pub fn sample_detail(id: u64) -> StravaActivity {
    StravaActivity {
        id,
        name: format!("Run {}", id),
        description: Some("Steady".to_string()),
        start_date: chrono::Utc.with_ymd_and_hms(2025, 5, 4, 7, 0, 0).unwrap(),
        distance: 2000.0,
        moving_time: 600,
        average_speed: 2000.0 / 600.0,
        has_heartrate: true,
        average_heartrate: Some(150.0),
        max_heartrate: Some(170.0),
        splits_metric: (1..=2)
            .map(|split| StravaSplit {
                split,
                distance: 1000.0,
                moving_time: 300,
                average_speed: 1000.0 / 300.0,
                elevation_difference: Some(1.0),
                average_heartrate: Some(149.6),
            })
            .collect(),
    }
}

pub fn summary(id: u64, kind: &str) -> ActivitySummary {
    ActivitySummary {
        id,
        name: format!("Activity {}", id),
        kind: kind.to_string(),
    }
}

pub fn sample_plan() -> Value {
    json!({
        "weeks": [{
            "week_number": 1,
            "workouts": [
                {
                    "day": "Monday",
                    "date": "2025-06-16",
                    "type": "Easy Run",
                    "description": "Relaxed pace.",
                    "distance_km": 6,
                    "target_pace_min_km": "6:00",
                    "duration_minutes": 36
                },
                {
                    "day": "Tuesday",
                    "date": "2025-06-17",
                    "type": "Rest",
                    "description": "Full rest.",
                    "distance_km": null,
                    "target_pace_min_km": null,
                    "duration_minutes": null
                }
            ]
        }]
    })
}

pub fn athlete() -> AthleteIdentity {
    AthleteIdentity {
        id: 99,
        firstname: "Sam".to_string(),
        lastname: "Runner".to_string(),
    }
}

// ─── Fakes ───────────────────────────────────────────────────

/// Sleeper that records requested waits instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Detail source replaying scripted responses per activity.
///
/// Once an activity's script runs out, further calls answer `NotFound`.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<u64, VecDeque<Result<StravaActivity, StravaError>>>>,
    calls: Mutex<Vec<u64>>,
}

impl ScriptedSource {
    pub fn script(
        self,
        id: u64,
        responses: impl IntoIterator<Item = Result<StravaActivity, StravaError>>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id, responses.into_iter().collect());
        self
    }

    pub fn succeed(self, id: u64) -> Self {
        self.script(id, [Ok(sample_detail(id))])
    }

    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self, id: u64) -> usize {
        self.calls().iter().filter(|c| **c == id).count()
    }
}

impl ActivityDetailSource for ScriptedSource {
    async fn fetch_activity_detail(&self, activity_id: u64) -> Result<StravaActivity, StravaError> {
        self.calls.lock().unwrap().push(activity_id);
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&activity_id)
            .and_then(|script| script.pop_front())
            .unwrap_or(Err(StravaError::NotFound))
    }
}

/// Strava stand-in: identity, feed, and scripted details.
pub struct FakeStrava {
    pub athlete: Option<AthleteIdentity>,
    pub feed: Vec<ActivitySummary>,
    pub details: ScriptedSource,
}

impl FakeStrava {
    /// An athlete whose feed holds runs `ids`, all fetchable.
    pub fn with_runs(ids: &[u64]) -> Self {
        let details = ids
            .iter()
            .fold(ScriptedSource::default(), |source, id| source.succeed(*id));
        Self {
            athlete: Some(athlete()),
            feed: ids.iter().map(|id| summary(*id, "Run")).collect(),
            details,
        }
    }
}

impl Authenticator for FakeStrava {
    async fn authenticate(&self) -> Result<AthleteIdentity, AppError> {
        self.athlete
            .clone()
            .ok_or_else(|| AppError::Unauthorized("Not connected to Strava".to_string()))
    }

    async fn refresh_if_needed(&self) -> Result<(), AppError> {
        Ok(())
    }
}

impl ActivityFeed for FakeStrava {
    async fn list_recent_activities(&self, limit: u32) -> Result<Vec<ActivitySummary>, AppError> {
        Ok(self.feed.iter().take(limit as usize).cloned().collect())
    }
}

impl ActivityDetailSource for FakeStrava {
    async fn fetch_activity_detail(&self, activity_id: u64) -> Result<StravaActivity, StravaError> {
        self.details.fetch_activity_detail(activity_id).await
    }
}

/// AI stand-in returning canned analysis and plan.
pub struct FakeAi {
    pub analysis: Mutex<String>,
    pub plan: Mutex<Value>,
    pub analyzed: Mutex<Vec<Vec<ActivityRecord>>>,
}

impl FakeAi {
    pub fn new(analysis: &str, plan: Value) -> Self {
        Self {
            analysis: Mutex::new(analysis.to_string()),
            plan: Mutex::new(plan),
            analyzed: Mutex::new(Vec::new()),
        }
    }

    pub fn set_analysis(&self, analysis: &str) {
        *self.analysis.lock().unwrap() = analysis.to_string();
    }
}

impl RunAnalyzer for FakeAi {
    async fn analyze(&self, batch: &[ActivityRecord]) -> Result<String, AppError> {
        self.analyzed.lock().unwrap().push(batch.to_vec());
        Ok(self.analysis.lock().unwrap().clone())
    }
}

impl PlanGenerator for FakeAi {
    async fn generate_plan(&self, _analysis: &str) -> Result<Value, AppError> {
        Ok(self.plan.lock().unwrap().clone())
    }
}

/// Calendar stand-in recording created events.
#[derive(Default)]
pub struct FakeCalendar {
    pub events: Mutex<Vec<CalendarEvent>>,
    /// Event summaries to reject.
    pub reject: Vec<String>,
}

impl CalendarSink for FakeCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> Result<EventConfirmation, AppError> {
        if self.reject.contains(&event.summary) {
            return Err(AppError::Calendar("HTTP 400 Bad Request".to_string()));
        }
        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        Ok(EventConfirmation {
            id: format!("evt-{}", events.len()),
            html_link: None,
        })
    }
}

pub type TestPipeline = PipelineManager<FakeStrava, FakeAi, FakeCalendar, RecordingSleeper>;

/// Fetch settings with no waiting between items.
pub fn test_fetch_config() -> FetchConfig {
    Config::test_default().fetch
}

/// Pipeline over fakes, persisting into `dir`.
pub fn test_pipeline(
    dir: &std::path::Path,
    strava: FakeStrava,
    ai: FakeAi,
    calendar: FakeCalendar,
) -> TestPipeline {
    PipelineManager::with_sleeper(
        strava,
        ai,
        calendar,
        JsonStore::new(dir.join("running_data.json")),
        JsonStore::new(dir.join("training_plan.json")),
        test_fetch_config(),
        RecordingSleeper::default(),
    )
}
