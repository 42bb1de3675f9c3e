// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer (JSON documents on local disk).

pub mod json_file;

pub use json_file::{JsonStore, StoreError};

use crate::models::ActivityRecord;
use serde_json::Value;

/// Persisted batch of normalized runs.
pub type BatchStore = JsonStore<Vec<ActivityRecord>>;

/// Persisted training plan payload (kept raw so unvalidated plans survive too).
pub type PlanStore = JsonStore<Value>;
