//! Run history API handlers.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use droughtwatch_core::PipelineRun;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Upper bound on `limit`.
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RunsResponse {
    pub runs: Vec<PipelineRun>,
    pub run_in_progress: bool,
}

/// Most recent runs first.
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<RunsResponse>, impl IntoResponse> {
    let limit = query
        .limit
        .unwrap_or(state.config().orchestrator.history_limit)
        .min(MAX_LIMIT);
    let run_in_progress = state.orchestrator().is_running();

    let Some(history) = state.history() else {
        return Ok(Json(RunsResponse {
            runs: Vec::new(),
            run_in_progress,
        }));
    };

    match history.recent_runs(limit) {
        Ok(runs) => Ok(Json(RunsResponse {
            runs,
            run_in_progress,
        })),
        Err(e) => {
            error!(error = %e, "Failed to read run history");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            ))
        }
    }
}
