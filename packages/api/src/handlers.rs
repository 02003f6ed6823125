use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use pccc_compliance::ComplianceResponse;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health() -> &'static str {
    "OK"
}

/// `POST /api/compliance/analyze`
///
/// The body is read raw so that malformed JSON is reported in the same
/// `{message, errors}` shape as validation failures.
pub async fn analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ComplianceResponse>, ApiError> {
    let input: Value =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidJson(e.to_string()))?;

    let report = state.analyzer.analyze(&input).await?;

    Ok(Json(report))
}
