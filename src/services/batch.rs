// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sequential batch fetch of selected runs.

use crate::db::{BatchStore, StoreError};
use crate::models::BatchResult;
use crate::services::activity::{ActivityDetailSource, ActivityFetcher, RetryPolicy};
use crate::time_utils::{Sleeper, TokioSleeper};
use std::time::Duration;

/// Drives the fetcher over a list of IDs, one at a time.
///
/// Items are never fetched concurrently: the fixed gap between them is what
/// keeps a batch inside Strava's request budget.
pub struct BatchOrchestrator<'a, D, Z = TokioSleeper> {
    fetcher: ActivityFetcher<'a, D, Z>,
    sleeper: &'a Z,
    inter_item_delay: Duration,
}

impl<'a, D: ActivityDetailSource, Z: Sleeper> BatchOrchestrator<'a, D, Z> {
    pub fn new(
        source: &'a D,
        sleeper: &'a Z,
        policy: RetryPolicy,
        inter_item_delay: Duration,
    ) -> Self {
        Self {
            fetcher: ActivityFetcher::new(source, sleeper, policy),
            sleeper,
            inter_item_delay,
        }
    }

    /// Fetch every ID in order. Failures are recorded, never fatal.
    pub async fn run(&self, activity_ids: &[u64]) -> BatchResult {
        let total = activity_ids.len();
        let mut result = BatchResult::default();

        tracing::info!(total, "Processing runs");

        for (i, &activity_id) in activity_ids.iter().enumerate() {
            if i > 0 {
                self.sleeper.sleep(self.inter_item_delay).await;
            }

            match self.fetcher.fetch(activity_id).await {
                Some(record) => {
                    tracing::info!(activity_id, position = i + 1, total, "Processed activity");
                    result.activities.push(record);
                }
                None => {
                    tracing::warn!(activity_id, position = i + 1, total, "Failed to process activity");
                    result.failed_ids.push(activity_id);
                }
            }
        }

        if result.failed_ids.is_empty() {
            tracing::info!(succeeded = result.succeeded(), "Processing complete");
        } else {
            tracing::warn!(
                succeeded = result.succeeded(),
                failed = result.failed(),
                failed_ids = ?result.failed_ids,
                "Processing complete with failures"
            );
        }

        result
    }
}

/// Replace the persisted batch with this run's successes.
///
/// An empty batch is not written, so a fully failed run leaves the previous
/// batch in place. Returns whether anything was written.
pub async fn persist_batch(result: &BatchResult, store: &BatchStore) -> Result<bool, StoreError> {
    if result.is_empty() {
        tracing::info!("No activities to save");
        return Ok(false);
    }

    store.save(&result.activities).await?;
    tracing::info!(
        count = result.succeeded(),
        path = %store.path().display(),
        "Saved activities"
    );
    Ok(true)
}
