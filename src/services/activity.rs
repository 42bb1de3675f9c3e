// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resilient fetch and normalization of a single activity.
//!
//! Handles:
//! 1. Fetch the detailed activity from Strava
//! 2. Retry rate limits (fixed cooldown) and server errors (exponential backoff)
//! 3. Give up immediately on denied, missing, or malformed activities
//! 4. Normalize the detail into an [`ActivityRecord`]

use crate::config::FetchConfig;
use crate::models::{ActivityRecord, SplitRecord};
use crate::services::pace::{format_pace, PaceError};
use crate::services::strava::{StravaActivity, StravaError, StravaSplit};
use crate::time_utils::{format_day, format_distance_km, format_duration, Sleeper, TokioSleeper};
use std::future::Future;
use std::time::Duration;

/// Source of detailed activities.
pub trait ActivityDetailSource: Send + Sync {
    fn fetch_activity_detail(
        &self,
        activity_id: u64,
    ) -> impl Future<Output = Result<StravaActivity, StravaError>> + Send;
}

/// Attempt budget and waits for one activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Rate-limit waits consume attempts too.
    pub max_attempts: u32,
    pub rate_limit_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_cooldown: Duration::from_secs(60),
        }
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            rate_limit_cooldown: config.rate_limit_cooldown,
        }
    }
}

impl RetryPolicy {
    /// Backoff after a server error on the zero-based `attempt`: 1s, 2s, 4s, ...
    pub fn server_error_backoff(attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt.min(16))
    }
}

/// What to do after a failed attempt.
enum Next {
    RetryAfter(Duration),
    GiveUp,
}

/// Fetches one activity at a time, absorbing every failure.
pub struct ActivityFetcher<'a, D, Z = TokioSleeper> {
    source: &'a D,
    sleeper: &'a Z,
    policy: RetryPolicy,
}

impl<'a, D: ActivityDetailSource, Z: Sleeper> ActivityFetcher<'a, D, Z> {
    pub fn new(source: &'a D, sleeper: &'a Z, policy: RetryPolicy) -> Self {
        Self {
            source,
            sleeper,
            policy,
        }
    }

    /// Fetch and normalize `activity_id`.
    ///
    /// Returns `None` when the activity cannot be fetched: the reason is
    /// logged, never propagated.
    pub async fn fetch(&self, activity_id: u64) -> Option<ActivityRecord> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            tracing::info!(
                activity_id,
                attempt = attempt + 1,
                max_attempts,
                "Fetching activity"
            );

            let err = match self.source.fetch_activity_detail(activity_id).await {
                Ok(detail) => {
                    return match normalize_activity(&detail) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            tracing::warn!(activity_id, error = %e, "Malformed activity, skipping");
                            None
                        }
                    };
                }
                Err(e) => e,
            };

            let last_attempt = attempt + 1 == max_attempts;
            match self.classify(activity_id, attempt, &err) {
                Next::RetryAfter(_) if last_attempt => {
                    tracing::warn!(
                        activity_id,
                        attempts = max_attempts,
                        error = %err,
                        "Giving up on activity after exhausting attempts"
                    );
                    return None;
                }
                Next::RetryAfter(wait) => {
                    tracing::info!(activity_id, wait_secs = wait.as_secs_f64(), "Retrying after wait");
                    self.sleeper.sleep(wait).await;
                }
                Next::GiveUp => return None,
            }
        }

        None
    }

    fn classify(&self, activity_id: u64, attempt: u32, err: &StravaError) -> Next {
        match err {
            StravaError::RateLimited => {
                tracing::warn!(activity_id, "Rate limit exceeded, cooling down");
                Next::RetryAfter(self.policy.rate_limit_cooldown)
            }
            StravaError::ServerError(msg) => {
                tracing::warn!(activity_id, error = %msg, "Server error fetching activity");
                Next::RetryAfter(RetryPolicy::server_error_backoff(attempt))
            }
            StravaError::Unauthorized => {
                tracing::warn!(activity_id, "Access denied for activity, skipping");
                Next::GiveUp
            }
            StravaError::NotFound => {
                tracing::warn!(activity_id, "Activity not found, skipping");
                Next::GiveUp
            }
            StravaError::Fault(msg) | StravaError::Malformed(msg) => {
                tracing::warn!(activity_id, error = %msg, "Activity fetch failed, skipping");
                Next::GiveUp
            }
        }
    }
}

/// Why a fetched activity could not be normalized.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("activity pace: {0}")]
    Pace(#[source] PaceError),

    #[error("split {index} pace: {source}")]
    SplitPace {
        index: u32,
        #[source]
        source: PaceError,
    },

    #[error("heart rate flagged but average/max not both present")]
    IncompleteHeartRate,

    #[error("split {0} has no heart rate in a heart-rate activity")]
    SplitMissingHeartRate(u32),

    #[error("split indices not contiguous from 1: expected {expected}, got {found}")]
    SplitSequence { expected: u32, found: u32 },
}

/// Convert a detailed Strava activity into an [`ActivityRecord`].
pub fn normalize_activity(detail: &StravaActivity) -> Result<ActivityRecord, NormalizeError> {
    let (avg_hr, max_hr) = if detail.has_heartrate {
        match (detail.average_heartrate, detail.max_heartrate) {
            (Some(avg), Some(max)) => (Some(avg), Some(max)),
            _ => return Err(NormalizeError::IncompleteHeartRate),
        }
    } else {
        (None, None)
    };

    let splits = detail
        .splits_metric
        .iter()
        .enumerate()
        .map(|(i, split)| normalize_split(i as u32 + 1, split, detail.has_heartrate))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ActivityRecord {
        id: detail.id,
        name: detail.name.clone(),
        description: detail.description.clone().unwrap_or_default(),
        average_speed: format_pace(detail.average_speed).map_err(NormalizeError::Pace)?,
        date: format_day(detail.start_date),
        distance_total: format_distance_km(detail.distance),
        moving_time: format_duration(detail.moving_time),
        avg_hr,
        max_hr,
        splits,
    })
}

fn normalize_split(
    expected: u32,
    split: &StravaSplit,
    has_heartrate: bool,
) -> Result<SplitRecord, NormalizeError> {
    if split.split != expected {
        return Err(NormalizeError::SplitSequence {
            expected,
            found: split.split,
        });
    }

    let avg_hr = match (has_heartrate, split.average_heartrate) {
        (true, Some(hr)) => Some(hr.round() as u32),
        (true, None) => return Err(NormalizeError::SplitMissingHeartRate(split.split)),
        (false, _) => None,
    };

    Ok(SplitRecord {
        id: split.split,
        distance: split.distance,
        avg_speed: format_pace(split.average_speed).map_err(|source| NormalizeError::SplitPace {
            index: split.split,
            source,
        })?,
        time: format_duration(split.moving_time),
        elevation_diff: split.elevation_difference.unwrap_or(0.0),
        avg_hr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn split(index: u32, hr: Option<f64>) -> StravaSplit {
        StravaSplit {
            split: index,
            distance: 1000.0,
            moving_time: 300,
            average_speed: 1000.0 / 300.0,
            elevation_difference: Some(-2.5),
            average_heartrate: hr,
        }
    }

    fn detail() -> StravaActivity {
        StravaActivity {
            id: 7,
            name: "Morning Run".into(),
            description: Some("Felt easy".into()),
            start_date: chrono::Utc.with_ymd_and_hms(2025, 5, 4, 7, 15, 0).unwrap(),
            distance: 2012.0,
            moving_time: 612,
            average_speed: 2012.0 / 612.0,
            has_heartrate: true,
            average_heartrate: Some(151.4),
            max_heartrate: Some(172.0),
            splits_metric: vec![split(1, Some(148.6)), split(2, Some(154.2))],
        }
    }

    #[test]
    fn test_normalize_full_activity() {
        let record = normalize_activity(&detail()).unwrap();
        assert_eq!(record.id, 7);
        assert_eq!(record.description, "Felt easy");
        assert_eq!(record.date, "04-05-2025");
        assert_eq!(record.distance_total, "2.01 KM");
        assert_eq!(record.moving_time, "0:10:12");
        assert_eq!(record.average_speed, "5:04/km");
        assert_eq!(record.heart_rate(), Some((151.4, 172.0)));
        assert_eq!(record.splits.len(), 2);
        assert_eq!(record.splits[0].id, 1);
        assert_eq!(record.splits[0].avg_hr, Some(149));
        assert_eq!(record.splits[1].avg_hr, Some(154));
        assert_eq!(record.splits[0].avg_speed, "5:00/km");
        assert_eq!(record.splits[0].time, "0:05:00");
        assert_eq!(record.splits[0].elevation_diff, -2.5);
    }

    #[test]
    fn test_no_heart_rate_sensor() {
        let mut d = detail();
        d.has_heartrate = false;
        d.average_heartrate = None;
        d.max_heartrate = None;
        d.description = None;
        d.splits_metric = vec![split(1, None)];

        let record = normalize_activity(&d).unwrap();
        assert_eq!(record.avg_hr, None);
        assert_eq!(record.max_hr, None);
        assert_eq!(record.description, "");
        assert_eq!(record.splits[0].avg_hr, None);
    }

    #[test]
    fn test_half_heart_rate_pair_is_malformed() {
        let mut d = detail();
        d.max_heartrate = None;
        assert_eq!(
            normalize_activity(&d),
            Err(NormalizeError::IncompleteHeartRate)
        );
    }

    #[test]
    fn test_split_gap_is_malformed() {
        let mut d = detail();
        d.splits_metric = vec![split(1, Some(150.0)), split(3, Some(150.0))];
        assert_eq!(
            normalize_activity(&d),
            Err(NormalizeError::SplitSequence {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn test_stationary_split_is_malformed() {
        let mut d = detail();
        d.splits_metric[1].average_speed = 0.0;
        assert!(matches!(
            normalize_activity(&d),
            Err(NormalizeError::SplitPace { index: 2, .. })
        ));
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(RetryPolicy::server_error_backoff(0), Duration::from_secs(1));
        assert_eq!(RetryPolicy::server_error_backoff(1), Duration::from_secs(2));
        assert_eq!(RetryPolicy::server_error_backoff(2), Duration::from_secs(4));
    }
}
