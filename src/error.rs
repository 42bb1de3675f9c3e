// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::pipeline::{FailureCode, StageFailure};

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Gemini API error: {0}")]
    Gemini(String),

    #[error("Calendar API error: {0}")]
    Calendar(String),

    #[error("{0}")]
    Stage(#[from] StageFailure),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Machine-readable error code for API clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "validation_error",
            AppError::StravaApi(_) => "strava_error",
            AppError::Gemini(_) => "gemini_error",
            AppError::Calendar(_) => "calendar_error",
            AppError::Stage(failure) => failure.code.as_str(),
            AppError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StravaApi(_) | AppError::Gemini(_) | AppError::Calendar(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Stage(failure) => stage_status(failure.code),
        }
    }
}

fn stage_status(code: FailureCode) -> StatusCode {
    match code {
        FailureCode::StageNotReady => StatusCode::CONFLICT,
        FailureCode::AuthenticationFailed => StatusCode::UNAUTHORIZED,
        FailureCode::NoActivities | FailureCode::NoRunsFound => StatusCode::NOT_FOUND,
        FailureCode::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        FailureCode::PlanNotValid => StatusCode::UNPROCESSABLE_ENTITY,
        FailureCode::StravaUnavailable
        | FailureCode::NoSuccessfulActivities
        | FailureCode::BatchUnavailable
        | FailureCode::AnalysisFailed
        | FailureCode::AnalysisEmpty
        | FailureCode::PlanGenerationFailed
        | FailureCode::PlanEmpty
        | FailureCode::CalendarFailed => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.code().to_string();

        let (message, details) = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                ("An unexpected error occurred".to_string(), None)
            }
            AppError::Stage(failure) => (failure.message.clone(), None),
            AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::StravaApi(msg)
            | AppError::Gemini(msg)
            | AppError::Calendar(msg) => (self.to_string(), Some(msg.clone())),
        };

        let body = ErrorResponse {
            success: false,
            error,
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
