// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pipeline routes: gather, analyze, plan, schedule.
//!
//! Every handler takes the pipeline lock for its whole duration, so stages
//! never interleave.

use crate::error::{AppError, Result};
use crate::models::{ActivityRecord, PlanOutcome};
use crate::services::calendar::EventConfirmation;
use crate::services::pipeline::{FailedEvent, StageFailure};
use crate::services::{Provider, ScheduleRequest};
use crate::time_utils::{validate_time_of_day, validate_timezone};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/runner", get(get_runner))
        .route("/analysis", post(post_analysis))
        .route("/plan", post(post_plan))
        .route("/analysis-plan", get(get_analysis_plan))
        .route("/times", post(post_times))
        .route("/schedule", post(post_schedule))
        .route("/schedule/decline", post(post_decline))
        .route("/pipeline", get(get_pipeline))
}

// ─── Gather ──────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerData {
    pub runner_id: u64,
    pub runner_name: String,
    pub activities: Vec<ActivityRecord>,
    pub failed_activities: Vec<u64>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Serialize)]
pub struct RunnerResponse {
    pub success: bool,
    pub data: RunnerData,
}

/// Authenticate with Strava and gather the most recent runs.
async fn get_runner(State(state): State<Arc<AppState>>) -> Result<Json<RunnerResponse>> {
    let mut pipeline = state.pipeline.lock().await;

    let athlete = pipeline.authenticate().await?;
    let batch = pipeline.gather().await?;

    Ok(Json(RunnerResponse {
        success: true,
        data: RunnerData {
            runner_id: athlete.id,
            runner_name: athlete.full_name(),
            succeeded: batch.succeeded(),
            failed: batch.failed(),
            activities: batch.activities,
            failed_activities: batch.failed_ids,
        },
    }))
}

// ─── Analysis & Plan ─────────────────────────────────────────

#[derive(Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis: String,
}

async fn post_analysis(State(state): State<Arc<AppState>>) -> Result<Json<AnalysisResponse>> {
    let analysis = state.pipeline.lock().await.analyze().await?;
    Ok(Json(AnalysisResponse {
        success: true,
        analysis,
    }))
}

#[derive(Deserialize)]
struct PlanQuery {
    #[serde(default)]
    validate: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    pub plan_data: Value,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_warnings: Option<Vec<String>>,
}

impl PlanResponse {
    fn new(analysis: Option<String>, outcome: PlanOutcome, validated: bool) -> Self {
        let message = match (validated, outcome.is_valid()) {
            (false, _) => "Training plan generated",
            (true, true) => "Training plan generated and validated",
            (true, false) => "Training plan generated but failed validation",
        };
        Self {
            success: true,
            analysis,
            message: message.to_string(),
            validation_warnings: (!outcome.warnings.is_empty()).then_some(outcome.warnings),
            plan_data: outcome.raw,
        }
    }
}

async fn post_plan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PlanResponse>> {
    let outcome = state
        .pipeline
        .lock()
        .await
        .generate_plan(query.validate)
        .await?;
    Ok(Json(PlanResponse::new(None, outcome, query.validate)))
}

/// Analyze the gathered runs and produce a plan in one call.
async fn get_analysis_plan(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<PlanResponse>> {
    let mut pipeline = state.pipeline.lock().await;
    let analysis = pipeline.analyze().await?;
    let outcome = pipeline.generate_plan(query.validate).await?;
    Ok(Json(PlanResponse::new(
        Some(analysis),
        outcome,
        query.validate,
    )))
}

// ─── Scheduling ──────────────────────────────────────────────

/// Time of day and timezone for calendar events.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TimesRequest {
    #[validate(custom(function = "validate_time_of_day"))]
    pub start_time: String,
    #[validate(custom(function = "validate_timezone"))]
    pub time_zone: String,
}

impl TimesRequest {
    fn into_schedule_request(self) -> Result<ScheduleRequest> {
        self.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        ScheduleRequest::new(&self.start_time, &self.time_zone)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesResponse {
    pub success: bool,
    pub start_time: String,
    pub time_zone: String,
    pub message: String,
}

/// Check a start time and timezone without touching the calendar.
async fn post_times(Json(body): Json<TimesRequest>) -> Result<Json<TimesResponse>> {
    let request = body.into_schedule_request()?;
    let start_time = request.start_time().format("%H:%M:%S").to_string();

    tracing::info!(start_time = %start_time, time_zone = request.time_zone(), "Times accepted");
    Ok(Json(TimesResponse {
        success: true,
        message: format!(
            "Workouts will start at {} ({})",
            start_time,
            request.time_zone()
        ),
        start_time,
        time_zone: request.time_zone().to_string(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub success: bool,
    pub message: String,
    pub created: usize,
    pub failed: usize,
    pub events: Vec<EventConfirmation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<FailedEvent>,
}

async fn post_schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TimesRequest>,
) -> Result<Json<ScheduleResponse>> {
    let request = body.into_schedule_request()?;
    let report = state.pipeline.lock().await.schedule(&request).await?;

    Ok(Json(ScheduleResponse {
        success: true,
        message: format!("Added {} workouts to your calendar", report.created.len()),
        created: report.created.len(),
        failed: report.failed.len(),
        events: report.created,
        failures: report.failed,
    }))
}

#[derive(Serialize)]
pub struct DeclineResponse {
    pub success: bool,
    pub message: String,
}

async fn post_decline(State(state): State<Arc<AppState>>) -> Result<Json<DeclineResponse>> {
    state.pipeline.lock().await.decline()?;
    Ok(Json(DeclineResponse {
        success: true,
        message: "Plan declined, nothing was added to your calendar".to_string(),
    }))
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct Connections {
    pub strava: bool,
    pub google: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub state: &'static str,
    pub resume_state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<StageFailure>,
    pub connected: Connections,
}

async fn get_pipeline(State(state): State<Arc<AppState>>) -> Json<PipelineStatus> {
    let pipeline = state.pipeline.lock().await;
    let current = pipeline.state();
    let failure = current.failure();

    Json(PipelineStatus {
        state: current.name(),
        resume_state: current.effective().name(),
        failed_stage: failure.map(|(stage, _)| stage.as_str()),
        failure: failure.map(|(_, reason)| reason.clone()),
        connected: Connections {
            strava: state.tokens.is_connected(Provider::Strava),
            google: state.tokens.is_connected(Provider::Google),
        },
    })
}
