// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod batch;
pub mod calendar;
pub mod gemini;
pub mod oauth_state;
pub mod pace;
pub mod pipeline;
pub mod selector;
pub mod session;
pub mod strava;

pub use activity::{ActivityFetcher, RetryPolicy};
pub use batch::BatchOrchestrator;
pub use calendar::{CalendarClient, ScheduleRequest};
pub use gemini::GeminiClient;
pub use pipeline::{FailureCode, PipelineManager, PipelineState, StageFailure};
pub use session::{Provider, TokenStore};
pub use strava::StravaClient;
