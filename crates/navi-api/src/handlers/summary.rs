//! Latest-summary polling handler.

use axum::extract::{Query, State};
use axum::Json;
use navi_models::{SessionId, Summary};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LatestSummaryQuery {
    pub session_id: SessionId,
}

/// Latest summary of a session. Every field but `session_id` is null until
/// the first summary has been produced.
#[derive(Debug, Serialize, Deserialize)]
pub struct LatestSummaryResponse {
    pub session_id: SessionId,
    /// Seconds since the Unix epoch
    pub ts: Option<f64>,
    pub version: Option<u64>,
    pub text: Option<String>,
    pub audio_url: Option<String>,
    pub extra: Option<Map<String, Value>>,
}

impl LatestSummaryResponse {
    fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            ts: None,
            version: None,
            text: None,
            audio_url: None,
            extra: None,
        }
    }

    fn from_summary(session_id: SessionId, summary: &Summary) -> Self {
        Self {
            session_id,
            ts: Some(summary.epoch_seconds()),
            version: Some(summary.version),
            text: Some(summary.text.clone()),
            audio_url: summary.audio_url.clone(),
            extra: Some(summary.extra.clone()),
        }
    }
}

pub async fn latest_summary(
    State(state): State<AppState>,
    Query(query): Query<LatestSummaryQuery>,
) -> ApiResult<Json<LatestSummaryResponse>> {
    let latest = state.registry.latest_summary(&query.session_id).await?;

    let response = match latest {
        Some(summary) => LatestSummaryResponse::from_summary(query.session_id, &summary),
        None => LatestSummaryResponse::empty(query.session_id),
    };
    Ok(Json(response))
}
