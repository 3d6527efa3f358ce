//! On-demand product bundles.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use droughtwatch_core::archive::bundle_to_bytes;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Body of a 404: the identifiers with no file yet.
#[derive(Debug, Serialize)]
pub struct MissingProductsResponse {
    pub error: String,
    pub missing: Vec<String>,
}

/// Bundles the requested products (`PTM`, `SPI_<scale>`, comma separated)
/// for the current calibration window into one zip.
pub async fn download_products(
    State(state): State<Arc<AppState>>,
    Path(ids): Path<String>,
) -> Response {
    let window = state.calendar().calibration_window(state.today());
    let products = state.products();

    let resolved = match products.resolve(&ids, &window).await {
        Ok(resolved) => resolved,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
                .into_response();
        }
    };

    if !resolved.missing.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(MissingProductsResponse {
                error: format!("Products not available: {}", resolved.missing.join(", ")),
                missing: resolved.missing,
            }),
        )
            .into_response();
    }

    let files = resolved.found;
    let count = files.len();
    let bundle = tokio::task::spawn_blocking(move || bundle_to_bytes(&files)).await;

    match bundle {
        Ok(Ok(bytes)) => {
            info!(ids = %ids, files = count, bytes = bytes.len(), "Serving product bundle");
            let disposition = format!("attachment; filename=\"{}\"", products.bundle_name());
            (
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!(ids = %ids, error = %e, "Failed to build product bundle");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
        Err(e) => {
            error!(ids = %ids, error = %e, "Bundle task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("bundle task failed")),
            )
                .into_response()
        }
    }
}
