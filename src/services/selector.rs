// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Picks the most recent runs out of an athlete's activity feed.

use crate::error::AppError;
use crate::services::strava::ActivitySummary;
use std::future::Future;

/// Type tag identifying runs in the feed.
pub const RUN_TYPE: &str = "Run";

/// Source of the athlete's recent activities, most recent first.
pub trait ActivityFeed: Send + Sync {
    fn list_recent_activities(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ActivitySummary>, AppError>> + Send;
}

/// Why a feed window yielded no runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("No activities on this account")]
    NoActivities,

    #[error("No runs found in your last {window} activities, get running to gather data")]
    NoRuns { window: usize },
}

/// Return the IDs of the first `run_count` runs in `feed`, in feed order.
pub fn select_recent_runs(
    feed: &[ActivitySummary],
    run_count: usize,
) -> Result<Vec<u64>, SelectionError> {
    if feed.is_empty() {
        return Err(SelectionError::NoActivities);
    }

    let run_ids: Vec<u64> = feed
        .iter()
        .filter(|a| a.kind == RUN_TYPE)
        .map(|a| a.id)
        .take(run_count)
        .collect();

    if run_ids.is_empty() {
        return Err(SelectionError::NoRuns { window: feed.len() });
    }

    Ok(run_ids)
}
