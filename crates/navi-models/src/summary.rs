//! Versioned natural-language summaries.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot broadcast to subscribers whenever the pipeline describes the
/// scene. `version` starts at 1 and increases by one per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub ts: DateTime<Utc>,
    pub version: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Summary {
    pub fn new(version: u64, text: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            version,
            text: text.into(),
            audio_url: None,
            extra: Map::new(),
        }
    }

    /// Creation time as fractional seconds since the Unix epoch, the form
    /// clients receive on the wire.
    pub fn epoch_seconds(&self) -> f64 {
        self.ts.timestamp_millis() as f64 / 1000.0
    }

    /// Attach a free-form metadata entry.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
