// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Normalized run records, as persisted and handed to the analyzer.

use serde::{Deserialize, Serialize};

/// One processed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Strava activity ID
    pub id: u64,
    pub name: String,
    /// Free-text description (empty when the athlete wrote none)
    pub description: String,
    /// Average pace, e.g. `5:12/km`
    pub average_speed: String,
    /// Start date as `DD-MM-YYYY`
    pub date: String,
    /// Total distance, e.g. `10.02 KM`
    pub distance_total: String,
    /// Moving time as `H:MM:SS`
    pub moving_time: String,
    /// Average heart rate; present iff `max_hr` is present
    pub avg_hr: Option<f64>,
    /// Maximum heart rate; present iff `avg_hr` is present
    pub max_hr: Option<f64>,
    /// Kilometre splits, indexed from 1
    pub splits: Vec<SplitRecord>,
}

/// One kilometre split within an activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitRecord {
    /// 1-based position within the activity
    pub id: u32,
    /// Distance in metres
    pub distance: f64,
    pub avg_speed: String,
    pub time: String,
    /// Elevation change in metres
    pub elevation_diff: f64,
    pub avg_hr: Option<u32>,
}

impl ActivityRecord {
    /// Heart-rate pair, if the activity was recorded with a sensor.
    pub fn heart_rate(&self) -> Option<(f64, f64)> {
        self.avg_hr.zip(self.max_hr)
    }
}

/// Outcome of one batch run: successes and failed IDs, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub activities: Vec<ActivityRecord>,
    pub failed_ids: Vec<u64>,
}

impl BatchResult {
    pub fn succeeded(&self) -> usize {
        self.activities.len()
    }

    pub fn failed(&self) -> usize {
        self.failed_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}
