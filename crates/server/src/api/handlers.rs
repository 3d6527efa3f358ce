use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use droughtwatch_core::{staging::describe_date, SanitizedConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body shared by the API handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Dates that drive the pipeline, as seen today.
#[derive(Debug, Serialize)]
pub struct DatesResponse {
    pub today: NaiveDate,
    /// Most recent day present in the raw staging area.
    pub latest_data_date: Option<NaiveDate>,
    /// Human-readable form of `latest_data_date`.
    pub latest_data: String,
    /// `mon_year` token of the current calibration window.
    pub calibration_window: String,
    pub reset_date: Option<NaiveDate>,
    pub run_in_progress: bool,
}

pub async fn get_dates(State(state): State<Arc<AppState>>) -> Json<DatesResponse> {
    let today = state.today();
    let calendar = state.calendar();
    let latest = state.orchestrator().staging().latest_data_date().await;

    Json(DatesResponse {
        today,
        latest_data_date: latest,
        latest_data: describe_date(latest),
        calibration_window: calendar.calibration_window(today).label(),
        reset_date: calendar.reset_date(today).ok(),
        run_in_progress: state.orchestrator().is_running(),
    })
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    collect_dynamic_metrics(&state);
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}
