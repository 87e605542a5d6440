//! Session identity and tuning overrides.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for one stream-processing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Optional per-session tuning supplied when a session is created.
///
/// Every field is optional; absent or non-positive values fall back to the
/// process-wide defaults. Unknown fields in the request body are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionOverrides {
    /// Run detection on every Nth ingested frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_rate: Option<u32>,
    /// Summary window length in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_interval_s: Option<f64>,
    /// Minimum seconds between two successful summaries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_cooldown_s: Option<f64>,
}

impl SessionOverrides {
    /// True when no override is set.
    pub fn is_empty(&self) -> bool {
        self.sampling_rate.is_none()
            && self.summary_interval_s.is_none()
            && self.summary_cooldown_s.is_none()
    }
}
