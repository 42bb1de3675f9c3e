// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated athlete identity.

use serde::{Deserialize, Serialize};

/// Athlete profile returned by Strava once authenticated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteIdentity {
    pub id: u64,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

impl AthleteIdentity {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
            .trim()
            .to_string()
    }
}
