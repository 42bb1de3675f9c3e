// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod athlete;
pub mod plan;

pub use activity::{ActivityRecord, BatchResult, SplitRecord};
pub use athlete::AthleteIdentity;
pub use plan::{validate_plan, PlanOutcome, TrainingPlan, Week, Workout};
