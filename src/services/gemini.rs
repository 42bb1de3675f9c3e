// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gemini client for run analysis and training plan generation.

use crate::error::AppError;
use crate::models::ActivityRecord;
use crate::services::pipeline::{PlanGenerator, RunAnalyzer};
use crate::time_utils::next_monday;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_BASE_URL.to_string(),
            api_key,
            model,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run one prompt and return the concatenated text of the first candidate.
    async fn generate(&self, prompt: &str, response_schema: Option<Value>) -> Result<String, AppError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        if let Some(schema) = response_schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            });
        }

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Gemini(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Gemini request failed");
            return Err(AppError::Gemini(format!("HTTP {}", status)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Gemini(format!("JSON parse error: {}", e)))?;

        Ok(parsed.text())
    }
}

impl RunAnalyzer for GeminiClient {
    async fn analyze(&self, batch: &[ActivityRecord]) -> Result<String, AppError> {
        tracing::info!(activities = batch.len(), model = %self.model, "Analysing runs");
        let prompt = analysis_prompt(batch)?;
        self.generate(&prompt, None).await
    }
}

impl PlanGenerator for GeminiClient {
    async fn generate_plan(&self, analysis: &str) -> Result<Value, AppError> {
        tracing::info!(model = %self.model, "Generating training plan");
        let prompt = plan_prompt(analysis, Local::now().date_naive());
        let text = self.generate(&prompt, Some(plan_response_schema())).await?;

        serde_json::from_str(&text)
            .map_err(|e| AppError::Gemini(format!("AI model returned invalid JSON: {}", e)))
    }
}

fn analysis_prompt(batch: &[ActivityRecord]) -> Result<String, AppError> {
    let data = serde_json::to_string(&json!({ "activities": batch }))
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(format!(
        "The following JSON holds a runner's {} most recent runs. Give a brief overview of \
         perceived effort, performance trends, and any concerning health patterns. Use average \
         pace, heart rate, distance, per-kilometre splits, and the run descriptions to infer \
         effort levels and identify trends.\n\nData: {}",
        batch.len(),
        data
    ))
}

fn plan_prompt(analysis: &str, today: NaiveDate) -> String {
    let start = next_monday(today);
    format!(
        "Using the analysis below of a runner's recent performance, write a 5 week training plan \
         that starts on Monday {start} and covers every day of each week. Schedule 4 training days \
         per week and make the remaining days rest or light recovery. The goal is to get faster: \
         mix interval sessions, tempo runs, easy runs and long runs while leaving enough rest to \
         recover. Give target paces as minutes per kilometre, distances in kilometres, and an \
         estimated duration in minutes for every workout so it can be added to a calendar. Dates \
         must be YYYY-MM-DD. Every workout object must carry every field of the response schema.\n\n\
         Analysis:\n{analysis}",
        start = start.format("%Y-%m-%d"),
        analysis = analysis
    )
}

/// Response schema mirroring [`crate::models::TrainingPlan`].
fn plan_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "weeks": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "week_number": { "type": "INTEGER" },
                        "workouts": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "day": { "type": "STRING" },
                                    "date": { "type": "STRING" },
                                    "type": { "type": "STRING" },
                                    "description": { "type": "STRING" },
                                    "distance_km": { "type": "NUMBER", "nullable": true },
                                    "target_pace_min_km": { "type": "STRING", "nullable": true },
                                    "duration_minutes": { "type": "INTEGER", "nullable": true }
                                },
                                "required": ["day", "date", "type", "description"]
                            }
                        }
                    },
                    "required": ["week_number", "workouts"]
                }
            }
        },
        "required": ["weeks"]
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Steady "},{"text":"progress."}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text(), "Steady progress.");
    }

    #[test]
    fn test_response_without_candidates_is_empty() {
        let parsed: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[test]
    fn test_plan_prompt_starts_next_monday() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let prompt = plan_prompt("Consistent easy pace.", today);
        assert!(prompt.contains("Monday 2025-06-16"));
        assert!(prompt.ends_with("Consistent easy pace."));
    }

    #[test]
    fn test_analysis_prompt_embeds_activities() {
        let prompt = analysis_prompt(&[]).unwrap();
        assert!(prompt.contains(r#"{"activities":[]}"#));
    }
}
