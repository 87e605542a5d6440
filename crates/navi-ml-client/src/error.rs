//! ML client error types.

use navi_pipeline::PipelineError;
use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MlError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::ServiceUnavailable(_) => true,
            MlError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Map an unsuccessful HTTP status to an error, 5xx and 429 being
    /// transient.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        let msg = format!("service returned {}: {}", status, body);
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            MlError::ServiceUnavailable(msg)
        } else {
            MlError::RequestFailed(msg)
        }
    }

    pub fn into_detector_error(self) -> PipelineError {
        PipelineError::detector_failed(self.to_string())
    }

    pub fn into_summarizer_error(self) -> PipelineError {
        PipelineError::summarizer_failed(self.to_string())
    }
}
