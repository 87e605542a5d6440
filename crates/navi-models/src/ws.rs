//! WebSocket message types for the summary push channel.
//!
//! These messages keep the JSON shape the mobile client already consumes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{SessionId, Summary};

/// Push message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMessageType {
    Summary,
    Error,
}

impl SummaryMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryMessageType::Summary => "summary",
            SummaryMessageType::Error => "error",
        }
    }
}

/// Push message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryMessage {
    /// A new summary for the session
    Summary {
        session_id: SessionId,
        /// Seconds since the Unix epoch
        ts: f64,
        version: u64,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_url: Option<String>,
        #[serde(default)]
        extra: Map<String, Value>,
    },

    /// Subscription rejected or terminated
    Error { detail: String },
}

impl SummaryMessage {
    pub fn summary(session_id: &SessionId, summary: &Summary) -> Self {
        Self::Summary {
            session_id: session_id.clone(),
            ts: summary.epoch_seconds(),
            version: summary.version,
            text: summary.text.clone(),
            audio_url: summary.audio_url.clone(),
            extra: summary.extra.clone(),
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self::Error {
            detail: detail.into(),
        }
    }

    pub fn message_type(&self) -> SummaryMessageType {
        match self {
            SummaryMessage::Summary { .. } => SummaryMessageType::Summary,
            SummaryMessage::Error { .. } => SummaryMessageType::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_message_shape() {
        let id = SessionId::from("s1");
        let msg = SummaryMessage::summary(&id, &Summary::new(2, "A door is on your right."));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "summary");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["version"], 2);
        assert!(json["ts"].is_f64());
        assert_eq!(msg.message_type().as_str(), "summary");
    }

    #[test]
    fn test_error_message_shape() {
        let json = serde_json::to_value(SummaryMessage::error("session not found")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["detail"], "session not found");
    }
}
