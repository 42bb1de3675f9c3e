// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stage sequencing for one coaching run.
//!
//! The pipeline moves through
//! `Unauthenticated → Authenticated → Gathered → Analyzed → Planned →
//! Scheduled | Declined`. Each state carries everything produced so far. A
//! failing stage moves to `Failed`, which remembers the state that stage
//! started from. The stage can be retried without redoing upstream work, and
//! later stages stay blocked until it succeeds.

use crate::config::FetchConfig;
use crate::db::{BatchStore, PlanStore};
use crate::error::AppError;
use crate::models::{
    validate_plan, ActivityRecord, AthleteIdentity, BatchResult, PlanOutcome, TrainingPlan,
};
use crate::services::activity::{ActivityDetailSource, RetryPolicy};
use crate::services::batch::{persist_batch, BatchOrchestrator};
use crate::services::calendar::{
    format_workout_event, CalendarEvent, EventConfirmation, ScheduleRequest,
};
use crate::services::selector::{select_recent_runs, ActivityFeed, SelectionError};
use crate::time_utils::{Sleeper, TokioSleeper};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// Establishes the athlete's identity with the activity source.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self) -> impl Future<Output = Result<AthleteIdentity, AppError>> + Send;
    fn refresh_if_needed(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Turns a batch of runs into a free-text analysis.
pub trait RunAnalyzer: Send + Sync {
    fn analyze(
        &self,
        batch: &[ActivityRecord],
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns an analysis into a raw training plan payload.
pub trait PlanGenerator: Send + Sync {
    fn generate_plan(&self, analysis: &str)
        -> impl Future<Output = Result<Value, AppError>> + Send;
}

/// Destination for scheduled workouts.
pub trait CalendarSink: Send + Sync {
    fn create_event(
        &self,
        event: &CalendarEvent,
    ) -> impl Future<Output = Result<EventConfirmation, AppError>> + Send;
}

/// Machine-readable reason a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    StageNotReady,
    AuthenticationFailed,
    StravaUnavailable,
    NoActivities,
    NoRunsFound,
    NoSuccessfulActivities,
    StorageError,
    BatchUnavailable,
    AnalysisFailed,
    AnalysisEmpty,
    PlanGenerationFailed,
    PlanEmpty,
    PlanNotValid,
    CalendarFailed,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::StageNotReady => "STAGE_NOT_READY",
            FailureCode::AuthenticationFailed => "AUTHENTICATION_FAILED",
            FailureCode::StravaUnavailable => "STRAVA_UNAVAILABLE",
            FailureCode::NoActivities => "NO_ACTIVITIES",
            FailureCode::NoRunsFound => "NO_RUNS_FOUND",
            FailureCode::NoSuccessfulActivities => "NO_SUCCESSFUL_ACTIVITIES",
            FailureCode::StorageError => "STORAGE_ERROR",
            FailureCode::BatchUnavailable => "BATCH_UNAVAILABLE",
            FailureCode::AnalysisFailed => "ANALYSIS_FAILED",
            FailureCode::AnalysisEmpty => "ANALYSIS_EMPTY",
            FailureCode::PlanGenerationFailed => "PLAN_GENERATION_FAILED",
            FailureCode::PlanEmpty => "PLAN_EMPTY",
            FailureCode::PlanNotValid => "PLAN_NOT_VALID",
            FailureCode::CalendarFailed => "CALENDAR_FAILED",
        }
    }
}

/// Structured reason for a failed stage.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct StageFailure {
    pub code: FailureCode,
    pub message: String,
}

impl StageFailure {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Pipeline stage, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Authenticate,
    Gather,
    Analyze,
    Plan,
    Schedule,
    Decline,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Authenticate => "authenticate",
            Stage::Gather => "gather",
            Stage::Analyze => "analyze",
            Stage::Plan => "plan",
            Stage::Schedule => "schedule",
            Stage::Decline => "decline",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub athlete: AthleteIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatherContext {
    pub athlete: AthleteIdentity,
    pub batch: BatchResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    pub gathered: GatherContext,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanContext {
    pub analyzed: AnalysisContext,
    pub plan: PlanOutcome,
}

/// Created and rejected calendar events for one schedule call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScheduleReport {
    pub created: Vec<EventConfirmation>,
    pub failed: Vec<FailedEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEvent {
    pub date: String,
    pub summary: String,
    pub error: String,
}

/// Where a pipeline run stands.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Unauthenticated,
    Authenticated(AuthContext),
    Gathered(GatherContext),
    Analyzed(AnalysisContext),
    Planned(PlanContext),
    Scheduled {
        planned: PlanContext,
        report: ScheduleReport,
    },
    Declined(PlanContext),
    Failed {
        stage: Stage,
        reason: StageFailure,
        /// Last good state; never itself `Failed`.
        resume: Box<PipelineState>,
    },
}

impl PipelineState {
    /// Short name for logs and the status endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Unauthenticated => "unauthenticated",
            PipelineState::Authenticated(_) => "authenticated",
            PipelineState::Gathered(_) => "gathered",
            PipelineState::Analyzed(_) => "analyzed",
            PipelineState::Planned(_) => "planned",
            PipelineState::Scheduled { .. } => "scheduled",
            PipelineState::Declined(_) => "declined",
            PipelineState::Failed { .. } => "failed",
        }
    }

    /// The state to resume from: the state itself, or the last good state if failed.
    pub fn effective(&self) -> &PipelineState {
        match self {
            PipelineState::Failed { resume, .. } => resume,
            other => other,
        }
    }

    pub fn failure(&self) -> Option<(Stage, &StageFailure)> {
        match self {
            PipelineState::Failed { stage, reason, .. } => Some((*stage, reason)),
            _ => None,
        }
    }

    /// The state `stage` starts from, dropping anything produced downstream of it.
    fn prerequisite_of(&self, stage: Stage) -> PipelineState {
        let state = match stage {
            Stage::Authenticate => None,
            Stage::Gather => self.athlete().map(|athlete| {
                PipelineState::Authenticated(AuthContext {
                    athlete: athlete.clone(),
                })
            }),
            Stage::Analyze => self.gathered().cloned().map(PipelineState::Gathered),
            Stage::Plan => self.analyzed().cloned().map(PipelineState::Analyzed),
            Stage::Schedule | Stage::Decline => {
                self.planned().cloned().map(PipelineState::Planned)
            }
        };
        state.unwrap_or(PipelineState::Unauthenticated)
    }

    fn athlete(&self) -> Option<&AthleteIdentity> {
        match self.effective() {
            PipelineState::Authenticated(ctx) => Some(&ctx.athlete),
            _ => self.gathered().map(|g| &g.athlete),
        }
    }

    fn gathered(&self) -> Option<&GatherContext> {
        match self.effective() {
            PipelineState::Gathered(ctx) => Some(ctx),
            _ => self.analyzed().map(|a| &a.gathered),
        }
    }

    fn analyzed(&self) -> Option<&AnalysisContext> {
        match self.effective() {
            PipelineState::Analyzed(ctx) => Some(ctx),
            _ => self.planned().map(|p| &p.analyzed),
        }
    }

    fn planned(&self) -> Option<&PlanContext> {
        match self.effective() {
            PipelineState::Planned(ctx) | PipelineState::Declined(ctx) => Some(ctx),
            PipelineState::Scheduled { planned, .. } => Some(planned),
            _ => None,
        }
    }
}

/// Sequences the stages of one coaching run over its collaborators.
///
/// `S` is the activity source (identity, feed and detail), `A` the AI
/// service (analysis and plan) and `C` the calendar.
pub struct PipelineManager<S, A, C, Z = TokioSleeper> {
    strava: S,
    ai: A,
    calendar: C,
    batch_store: BatchStore,
    plan_store: PlanStore,
    fetch: FetchConfig,
    sleeper: Z,
    state: PipelineState,
}

impl<S, A, C> PipelineManager<S, A, C, TokioSleeper>
where
    S: Authenticator + ActivityFeed + ActivityDetailSource,
    A: RunAnalyzer + PlanGenerator,
    C: CalendarSink,
{
    pub fn new(
        strava: S,
        ai: A,
        calendar: C,
        batch_store: BatchStore,
        plan_store: PlanStore,
        fetch: FetchConfig,
    ) -> Self {
        Self::with_sleeper(strava, ai, calendar, batch_store, plan_store, fetch, TokioSleeper)
    }
}

impl<S, A, C, Z> PipelineManager<S, A, C, Z>
where
    S: Authenticator + ActivityFeed + ActivityDetailSource,
    A: RunAnalyzer + PlanGenerator,
    C: CalendarSink,
    Z: Sleeper,
{
    pub fn with_sleeper(
        strava: S,
        ai: A,
        calendar: C,
        batch_store: BatchStore,
        plan_store: PlanStore,
        fetch: FetchConfig,
        sleeper: Z,
    ) -> Self {
        Self {
            strava,
            ai,
            calendar,
            batch_store,
            plan_store,
            fetch,
            sleeper,
            state: PipelineState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn strava(&self) -> &S {
        &self.strava
    }

    pub fn ai(&self) -> &A {
        &self.ai
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn batch_store(&self) -> &BatchStore {
        &self.batch_store
    }

    pub fn plan_store(&self) -> &PlanStore {
        &self.plan_store
    }

    /// Record a stage failure. The run falls back to the state the stage
    /// started from, so nothing downstream of it survives.
    fn fail(&mut self, stage: Stage, reason: StageFailure) -> StageFailure {
        tracing::warn!(
            stage = stage.as_str(),
            code = reason.code.as_str(),
            message = %reason.message,
            "Pipeline stage failed"
        );
        let resume = self.state.prerequisite_of(stage);
        self.state = PipelineState::Failed {
            stage,
            reason: reason.clone(),
            resume: Box::new(resume),
        };
        reason
    }

    fn advance(&mut self, stage: Stage, next: PipelineState) {
        tracing::info!(stage = stage.as_str(), state = next.name(), "Pipeline stage complete");
        self.state = next;
    }

    fn not_ready(stage: Stage, needs: &str) -> StageFailure {
        StageFailure::new(
            FailureCode::StageNotReady,
            format!("Cannot {} yet: {} first", stage.as_str(), needs),
        )
    }

    /// Establish the athlete's identity. Valid from any state; restarts the run.
    pub async fn authenticate(&mut self) -> Result<AthleteIdentity, StageFailure> {
        match self.strava.authenticate().await {
            Ok(athlete) => {
                tracing::info!(athlete_id = athlete.id, "Authenticated athlete");
                self.advance(
                    Stage::Authenticate,
                    PipelineState::Authenticated(AuthContext {
                        athlete: athlete.clone(),
                    }),
                );
                Ok(athlete)
            }
            Err(e) => Err(self.fail(
                Stage::Authenticate,
                StageFailure::new(FailureCode::AuthenticationFailed, e.to_string()),
            )),
        }
    }

    /// Select recent runs, fetch them, and persist the successes.
    pub async fn gather(&mut self) -> Result<BatchResult, StageFailure> {
        let athlete = self
            .state
            .athlete()
            .cloned()
            .ok_or_else(|| Self::not_ready(Stage::Gather, "authenticate"))?;

        if let Err(e) = self.strava.refresh_if_needed().await {
            return Err(self.fail(
                Stage::Gather,
                StageFailure::new(FailureCode::AuthenticationFailed, e.to_string()),
            ));
        }

        let feed = match self.strava.list_recent_activities(self.fetch.feed_window).await {
            Ok(feed) => feed,
            Err(e) => {
                return Err(self.fail(
                    Stage::Gather,
                    StageFailure::new(FailureCode::StravaUnavailable, e.to_string()),
                ))
            }
        };

        let run_ids = match select_recent_runs(&feed, self.fetch.run_count) {
            Ok(ids) => ids,
            Err(e) => {
                let code = match e {
                    SelectionError::NoActivities => FailureCode::NoActivities,
                    SelectionError::NoRuns { .. } => FailureCode::NoRunsFound,
                };
                return Err(self.fail(Stage::Gather, StageFailure::new(code, e.to_string())));
            }
        };
        tracing::info!(count = run_ids.len(), window = feed.len(), "Selected runs");

        let batch = BatchOrchestrator::new(
            &self.strava,
            &self.sleeper,
            RetryPolicy::from(&self.fetch),
            self.fetch.inter_item_delay,
        )
        .run(&run_ids)
        .await;

        if batch.is_empty() {
            return Err(self.fail(
                Stage::Gather,
                StageFailure::new(
                    FailureCode::NoSuccessfulActivities,
                    format!(
                        "Could not fetch any of {} selected runs (failed IDs: {:?})",
                        run_ids.len(),
                        batch.failed_ids
                    ),
                ),
            ));
        }

        if let Err(e) = persist_batch(&batch, &self.batch_store).await {
            return Err(self.fail(
                Stage::Gather,
                StageFailure::new(FailureCode::StorageError, e.to_string()),
            ));
        }

        self.advance(
            Stage::Gather,
            PipelineState::Gathered(GatherContext {
                athlete,
                batch: batch.clone(),
            }),
        );
        Ok(batch)
    }

    /// Analyze the persisted batch.
    pub async fn analyze(&mut self) -> Result<String, StageFailure> {
        let gathered = self
            .state
            .gathered()
            .cloned()
            .ok_or_else(|| Self::not_ready(Stage::Analyze, "gather runs"))?;

        let records = match self.batch_store.load().await {
            Ok(records) => records,
            Err(e) => {
                return Err(self.fail(
                    Stage::Analyze,
                    StageFailure::new(FailureCode::BatchUnavailable, e.to_string()),
                ))
            }
        };

        let analysis = match self.ai.analyze(&records).await {
            Ok(text) => text,
            Err(e) => {
                return Err(self.fail(
                    Stage::Analyze,
                    StageFailure::new(FailureCode::AnalysisFailed, e.to_string()),
                ))
            }
        };

        if analysis.trim().is_empty() {
            return Err(self.fail(
                Stage::Analyze,
                StageFailure::new(FailureCode::AnalysisEmpty, "Analysis came back empty"),
            ));
        }

        tracing::info!(chars = analysis.len(), "Analysis complete");
        self.advance(
            Stage::Analyze,
            PipelineState::Analyzed(AnalysisContext {
                gathered,
                analysis: analysis.clone(),
            }),
        );
        Ok(analysis)
    }

    /// Generate a plan from the analysis, optionally validate it, and persist it.
    pub async fn generate_plan(&mut self, validate: bool) -> Result<PlanOutcome, StageFailure> {
        let analyzed = self
            .state
            .analyzed()
            .cloned()
            .ok_or_else(|| Self::not_ready(Stage::Plan, "analyze runs"))?;

        let raw = match self.ai.generate_plan(&analyzed.analysis).await {
            Ok(raw) => raw,
            Err(e) => {
                return Err(self.fail(
                    Stage::Plan,
                    StageFailure::new(FailureCode::PlanGenerationFailed, e.to_string()),
                ))
            }
        };

        if raw.is_null() {
            return Err(self.fail(
                Stage::Plan,
                StageFailure::new(FailureCode::PlanEmpty, "Plan generation returned nothing"),
            ));
        }

        let outcome = if validate {
            validate_plan(raw)
        } else {
            PlanOutcome::unvalidated(raw)
        };
        if !outcome.warnings.is_empty() {
            tracing::warn!(warnings = ?outcome.warnings, "Plan failed validation");
        }

        if let Err(e) = self.plan_store.save(&outcome.raw).await {
            return Err(self.fail(
                Stage::Plan,
                StageFailure::new(FailureCode::StorageError, e.to_string()),
            ));
        }

        self.advance(
            Stage::Plan,
            PipelineState::Planned(PlanContext {
                analyzed,
                plan: outcome.clone(),
            }),
        );
        Ok(outcome)
    }

    /// Create one calendar event per workout in the planned schedule.
    pub async fn schedule(
        &mut self,
        request: &ScheduleRequest,
    ) -> Result<ScheduleReport, StageFailure> {
        let planned = match self.state.effective() {
            PipelineState::Planned(ctx) => ctx.clone(),
            _ => return Err(Self::not_ready(Stage::Schedule, "generate a plan")),
        };

        let plan = match schedulable_plan(&planned.plan) {
            Ok(plan) => plan,
            Err(warnings) => {
                return Err(self.fail(
                    Stage::Schedule,
                    StageFailure::new(
                        FailureCode::PlanNotValid,
                        format!("Plan cannot be scheduled: {}", warnings.join("; ")),
                    ),
                ))
            }
        };

        let mut report = ScheduleReport::default();
        for workout in plan.workouts() {
            let result = match format_workout_event(workout, request) {
                Ok(event) => self.calendar.create_event(&event).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(confirmation) => report.created.push(confirmation),
                Err(e) => {
                    tracing::warn!(date = %workout.date, error = %e, "Failed to create event");
                    report.failed.push(FailedEvent {
                        date: workout.date.clone(),
                        summary: workout.kind.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            created = report.created.len(),
            failed = report.failed.len(),
            time_zone = request.time_zone(),
            "Scheduling complete"
        );

        if report.created.is_empty() {
            let detail = report
                .failed
                .first()
                .map(|f| f.error.clone())
                .unwrap_or_else(|| "plan has no workouts".to_string());
            return Err(self.fail(
                Stage::Schedule,
                StageFailure::new(
                    FailureCode::CalendarFailed,
                    format!("No events were created: {}", detail),
                ),
            ));
        }

        self.advance(
            Stage::Schedule,
            PipelineState::Scheduled {
                planned,
                report: report.clone(),
            },
        );
        Ok(report)
    }

    /// Turn down the plan. Only valid once a plan is ready.
    pub fn decline(&mut self) -> Result<(), StageFailure> {
        let planned = match self.state.effective() {
            PipelineState::Planned(ctx) => ctx.clone(),
            _ => return Err(Self::not_ready(Stage::Decline, "generate a plan")),
        };
        self.advance(Stage::Decline, PipelineState::Declined(planned));
        Ok(())
    }
}

/// Typed plan to schedule, validating now if that was skipped at generation.
fn schedulable_plan(outcome: &PlanOutcome) -> Result<TrainingPlan, Vec<String>> {
    if let Some(plan) = &outcome.plan {
        return Ok(plan.clone());
    }
    let validated = validate_plan(outcome.raw.clone());
    validated.plan.ok_or(validated.warnings)
}
