use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pccc_compliance::{ComplianceError, FieldErrors, ValidationError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid request: {0}")]
    Validation(ValidationError),

    #[error("analysis failed")]
    AnalysisFailed,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        match err {
            ComplianceError::InvalidRequest(errors) => ApiError::Validation(errors),
            ComplianceError::TotalFailure { .. } => ApiError::AnalysisFailed,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidJson(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message: "Invalid request",
                    errors: Some(ValidationError::single("body", reason).into_errors()),
                },
            ),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    message: "Invalid request",
                    errors: Some(errors.into_errors()),
                },
            ),
            ApiError::AnalysisFailed => {
                tracing::error!("analysis failed for every section");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse {
                        message: "Analysis failed, please retry",
                        errors: None,
                    },
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error during analysis");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: "Internal server error",
                        errors: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
