//! Structured session logging.
//!
//! Every line emitted on behalf of a session carries its id and the
//! component that wrote it, so one session can be followed across
//! interleaved workers.

use std::fmt::Display;

use navi_models::SessionId;
use tracing::{error, info, warn, Span};

/// Logger bound to one session and one pipeline component.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: SessionId,
    component: &'static str,
}

impl SessionLogger {
    /// `component` names the writer, e.g. `"worker"` or `"fanout"`.
    pub fn new(session_id: &SessionId, component: &'static str) -> Self {
        Self {
            session_id: session_id.clone(),
            component,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn log_start(&self, detail: impl Display) {
        info!(session_id = %self.session_id, component = self.component, %detail, "Session started");
    }

    pub fn log_progress(&self, detail: impl Display) {
        info!(session_id = %self.session_id, component = self.component, %detail, "Session progress");
    }

    pub fn log_warning(&self, detail: impl Display) {
        warn!(session_id = %self.session_id, component = self.component, %detail, "Session degraded");
    }

    pub fn log_error(&self, detail: impl Display) {
        error!(session_id = %self.session_id, component = self.component, %detail, "Session fault");
    }

    pub fn log_completion(&self, detail: impl Display) {
        info!(session_id = %self.session_id, component = self.component, %detail, "Session stopped");
    }

    /// Span for instrumenting a session task; nested adapter logs inherit
    /// the session id from it.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("session", session_id = %self.session_id, component = self.component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_carries_session_and_component() {
        let id = SessionId::from("s-1");
        let logger = SessionLogger::new(&id, "worker");

        assert_eq!(logger.session_id(), &id);
        assert_eq!(logger.component(), "worker");
        logger.log_progress(format_args!("{} events", 3));
    }
}
