use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::metrics;
use crate::models::barcode::Barcode;
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Opaque caller identity. Empty is allowed.
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    pub code: String,
}

impl RedeemRequest {
    fn validate(&self) -> Result<(), AppError> {
        if self.code.trim().is_empty() {
            return Err(AppError::InvalidRequest("code must not be empty".into()));
        }
        Ok(())
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /generate-barcode: issue a barcode for a user
pub async fn generate_barcode(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<Barcode>, AppError> {
    let barcode = state.barcodes.generate(&payload.user_id).await?;
    Ok(Json(barcode))
}

/// GET /get-barcode/:code: current state of a barcode, `null` when absent
pub async fn get_barcode(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Option<Barcode>>, AppError> {
    let barcode = state.barcodes.fetch(&code).await?;
    Ok(Json(barcode))
}

/// POST /update-barcode-status: mark a barcode as used
pub async fn update_barcode_status(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RedeemRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    state.barcodes.redeem(&payload.code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /is-barcode-valid/:code
pub async fn is_barcode_valid(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<bool>, AppError> {
    let valid = state.barcodes.is_valid(&code).await?;
    Ok(Json(valid))
}

/// GET /readyz: 200 once the store answers
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.barcodes.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /metrics: Prometheus scrape endpoint
pub async fn get_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}
