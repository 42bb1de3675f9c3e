// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Training plan model and validation of AI-produced payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Multi-week training plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub weeks: Vec<Week>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_weeks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub week_number: u32,
    pub workouts: Vec<Workout>,
}

/// One scheduled session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    /// Day label, e.g. "Monday"
    pub day: String,
    /// Calendar date (`YYYY-MM-DD`)
    pub date: String,
    /// Session kind, e.g. "Tempo Run" or "Rest"
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub target_pace_min_km: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

impl Workout {
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

impl TrainingPlan {
    pub fn workouts(&self) -> impl Iterator<Item = &Workout> {
        self.weeks.iter().flat_map(|w| w.workouts.iter())
    }
}

/// A generated plan: the raw payload, plus the typed plan when it validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutcome {
    pub raw: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<TrainingPlan>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PlanOutcome {
    /// Keep the payload as-is without checking its shape.
    pub fn unvalidated(raw: Value) -> Self {
        Self {
            raw,
            plan: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.plan.is_some()
    }
}

/// Check a raw plan payload against [`TrainingPlan`].
///
/// Never fails: shape problems are collected as warnings, one per offending
/// week or workout, and the raw payload is kept alongside.
pub fn validate_plan(raw: Value) -> PlanOutcome {
    let mut warnings = Vec::new();

    match raw.get("weeks") {
        Some(Value::Array(weeks)) => {
            for (wi, week) in weeks.iter().enumerate() {
                collect_week_warnings(wi, week, &mut warnings);
            }
        }
        Some(_) => warnings.push("weeks: expected an array".to_string()),
        None => warnings.push("weeks: missing field".to_string()),
    }

    let plan = if warnings.is_empty() {
        match serde_json::from_value::<TrainingPlan>(raw.clone()) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warnings.push(format!("plan: {}", e));
                None
            }
        }
    } else {
        None
    };

    PlanOutcome {
        raw,
        plan,
        warnings,
    }
}

fn collect_week_warnings(wi: usize, week: &Value, warnings: &mut Vec<String>) {
    if week.get("week_number").and_then(Value::as_u64).is_none() {
        warnings.push(format!("weeks[{}].week_number: expected a whole number", wi));
    }

    let Some(workouts) = week.get("workouts").and_then(Value::as_array) else {
        warnings.push(format!("weeks[{}].workouts: expected an array", wi));
        return;
    };

    for (di, workout) in workouts.iter().enumerate() {
        match serde_json::from_value::<Workout>(workout.clone()) {
            Ok(w) if w.calendar_date().is_none() => warnings.push(format!(
                "weeks[{}].workouts[{}].date: expected YYYY-MM-DD, got {:?}",
                wi, di, w.date
            )),
            Ok(_) => {}
            Err(e) => warnings.push(format!("weeks[{}].workouts[{}]: {}", wi, di, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_plan() -> Value {
        json!({
            "weeks": [{
                "week_number": 1,
                "workouts": [
                    {
                        "day": "Monday",
                        "date": "2025-06-16",
                        "type": "Easy Run",
                        "description": "Relaxed conversational pace",
                        "distance_km": 6,
                        "target_pace_min_km": "6:00",
                        "duration_minutes": 36
                    },
                    {
                        "day": "Tuesday",
                        "date": "2025-06-17",
                        "type": "Rest",
                        "description": "Full rest",
                        "distance_km": null,
                        "target_pace_min_km": null,
                        "duration_minutes": null
                    }
                ]
            }],
            "plan_type": "speed"
        })
    }

    #[test]
    fn test_valid_plan() {
        let outcome = validate_plan(sample_plan());
        assert!(outcome.is_valid(), "warnings: {:?}", outcome.warnings);
        let plan = outcome.plan.unwrap();
        assert_eq!(plan.workouts().count(), 2);
        assert_eq!(plan.weeks[0].workouts[0].kind, "Easy Run");
        assert_eq!(plan.weeks[0].workouts[0].duration_minutes, Some(36.0));
        assert_eq!(plan.plan_type.as_deref(), Some("speed"));
    }

    #[test]
    fn test_missing_fields_become_warnings() {
        let mut raw = sample_plan();
        raw["weeks"][0]["workouts"][1]
            .as_object_mut()
            .unwrap()
            .remove("date");
        raw["weeks"][0]["week_number"] = json!("one");

        let outcome = validate_plan(raw.clone());
        assert!(!outcome.is_valid());
        assert_eq!(outcome.raw, raw);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[0].starts_with("weeks[0].week_number"));
        assert!(outcome.warnings[1].contains("missing field `date`"));
    }

    #[test]
    fn test_bad_date_is_flagged() {
        let mut raw = sample_plan();
        raw["weeks"][0]["workouts"][0]["date"] = json!("16/06/2025");
        let outcome = validate_plan(raw);
        assert!(!outcome.is_valid());
        assert!(outcome.warnings[0].contains("expected YYYY-MM-DD"));
    }

    #[test]
    fn test_weeks_not_array() {
        let outcome = validate_plan(json!({ "weeks": "soon" }));
        assert_eq!(outcome.warnings, vec!["weeks: expected an array".to_string()]);
        assert!(outcome.plan.is_none());
    }
}
