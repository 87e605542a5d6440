//! Session lifecycle handlers.

use axum::extract::State;
use axum::Json;
use navi_models::{SessionId, SessionOverrides};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct StopSessionRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Start a session. The body is optional; absent fields use server defaults.
pub async fn start_session(
    State(state): State<AppState>,
    body: Option<Json<SessionOverrides>>,
) -> Json<StartSessionResponse> {
    let overrides = body.map(|Json(o)| o).unwrap_or_default();
    let session_id = state.registry.create_session(&overrides).await;
    Json(StartSessionResponse { session_id })
}

/// Stop a session. Unknown sessions are accepted so clients can retry.
pub async fn stop_session(
    State(state): State<AppState>,
    Json(request): Json<StopSessionRequest>,
) -> Json<OkResponse> {
    let stopped = state.registry.stop_session(&request.session_id).await;
    if !stopped {
        info!(session_id = %request.session_id, "Stop requested for unknown session");
    }
    Json(OkResponse::ok())
}
