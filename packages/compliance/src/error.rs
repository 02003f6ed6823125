use thiserror::Error;

use crate::schema::ValidationError;
use crate::section::Section;

/// Failure of a single call to the model provider.
///
/// Callers treat every variant the same way; the split only exists for logs.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode provider response: {0}")]
    Envelope(String),

    #[error("provider returned empty content")]
    EmptyContent,
}

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("invalid request: {0}")]
    InvalidRequest(ValidationError),

    #[error("LLM gateway failure: {0}")]
    Gateway(#[from] GatewayError),

    #[error("model output is not valid JSON: {reason}")]
    MalformedModelOutput { reason: String, raw: String },

    #[error("model output for section {section} violates the schema: {errors}")]
    SchemaViolation {
        section: Section,
        errors: ValidationError,
    },

    #[error("section {section} did not finish before the analysis deadline")]
    DeadlineExceeded { section: Section },

    #[error("section {section} task was aborted")]
    SectionAborted { section: Section },

    #[error("all {attempted} sections failed")]
    TotalFailure { attempted: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("schema load error: {0}")]
    SchemaLoad(String),
}

impl ComplianceError {
    /// Short, stable label for logs and outcome summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Gateway(_) => "gateway",
            Self::MalformedModelOutput { .. } => "malformed_model_output",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::SectionAborted { .. } => "section_aborted",
            Self::TotalFailure { .. } => "total_failure",
            Self::Config(_) => "config",
            Self::SchemaLoad(_) => "schema_load",
        }
    }
}

pub type Result<T> = std::result::Result<T, ComplianceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_is_single_kind() {
        let err: ComplianceError = GatewayError::EmptyContent.into();
        assert_eq!(err.kind(), "gateway");
        assert!(err.to_string().contains("empty content"));
    }

    #[test]
    fn test_total_failure_display() {
        let err = ComplianceError::TotalFailure { attempted: 5 };
        assert_eq!(err.to_string(), "all 5 sections failed");
    }

    #[test]
    fn test_malformed_output_hides_raw_text_from_display() {
        let err = ComplianceError::MalformedModelOutput {
            reason: "expected value at line 1 column 1".into(),
            raw: "provider secret sauce".into(),
        };
        assert!(!err.to_string().contains("secret sauce"));
    }
}
