//! Pipeline error types.

use navi_models::SessionId;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors raised inside the pipeline.
///
/// Only `SessionNotFound` crosses the registry boundary. Everything else is
/// produced by a session worker, logged and absorbed there.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    #[error("Detection failed: {0}")]
    DetectorFailed(String),

    #[error("Summarization failed: {0}")]
    SummarizerFailed(String),

    #[error("Listener delivery failed: {0}")]
    ListenerFailed(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn session_not_found(id: &SessionId) -> Self {
        Self::SessionNotFound(id.clone())
    }

    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    pub fn detector_failed(msg: impl Into<String>) -> Self {
        Self::DetectorFailed(msg.into())
    }

    pub fn summarizer_failed(msg: impl Into<String>) -> Self {
        Self::SummarizerFailed(msg.into())
    }

    pub fn listener_failed(msg: impl Into<String>) -> Self {
        Self::ListenerFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if the error means the addressed session does not exist.
    pub fn is_session_not_found(&self) -> bool {
        matches!(self, PipelineError::SessionNotFound(_))
    }
}
