// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride Coach: turn recent Strava runs into an AI training plan.
//!
//! This crate fetches a runner's recent activities from Strava, hands the
//! normalized history to Gemini for analysis and plan synthesis, and pushes
//! the resulting plan into Google Calendar.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{CalendarClient, GeminiClient, PipelineManager, StravaClient, TokenStore};
use tokio::sync::Mutex;

/// Pipeline wired to the production collaborators.
pub type Pipeline = PipelineManager<StravaClient, GeminiClient, CalendarClient>;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenStore,
    pub strava: StravaClient,
    pub calendar: CalendarClient,
    /// One pipeline run at a time.
    pub pipeline: Mutex<Pipeline>,
}

impl AppState {
    /// Wire the production clients around a shared token store.
    pub fn new(config: Config, tokens: TokenStore) -> Self {
        let strava = StravaClient::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            tokens.clone(),
        );
        let gemini = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone());
        let calendar = CalendarClient::new(
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
            tokens.clone(),
        );

        let pipeline = PipelineManager::new(
            strava.clone(),
            gemini,
            calendar.clone(),
            db::JsonStore::new(config.batch_path()),
            db::JsonStore::new(config.plan_path()),
            config.fetch.clone(),
        );

        Self {
            config,
            tokens,
            strava,
            calendar,
            pipeline: Mutex::new(pipeline),
        }
    }
}
