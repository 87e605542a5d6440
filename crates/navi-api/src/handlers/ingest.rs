//! Frame and clip upload handlers.
//!
//! Both endpoints only validate and enqueue; decoding and detection run on
//! the session's worker after the response is sent.

use axum::extract::{Multipart, State};
use axum::Json;
use navi_models::SessionId;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::handlers::sessions::OkResponse;
use crate::state::AppState;

const TIMESTAMPS_ERROR: &str = "timestamps_json must be a JSON array of floats";

/// Parsed `/cv/frames` form.
#[derive(Debug, Default)]
struct FramesForm {
    session_id: Option<SessionId>,
    frames: Vec<Vec<u8>>,
    timestamps_json: Option<String>,
}

/// Parsed `/cv/clip` form.
#[derive(Debug, Default)]
struct ClipForm {
    session_id: Option<SessionId>,
    clip: Option<Vec<u8>>,
    fps: Option<String>,
}

/// Upload a batch of encoded frames.
///
/// Multipart fields: `session_id`, one or more `frames`, and an optional
/// `timestamps_json` array paired with frames by position.
pub async fn upload_frames(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<OkResponse>> {
    let mut form = FramesForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("session_id") => form.session_id = Some(SessionId::from(field.text().await?)),
            Some("frames") => form.frames.push(field.bytes().await?.to_vec()),
            Some("timestamps_json") => form.timestamps_json = Some(field.text().await?),
            _ => {}
        }
    }

    let session_id = form
        .session_id
        .ok_or_else(|| ApiError::bad_request("session_id is required"))?;
    if form.frames.is_empty() {
        return Err(ApiError::bad_request("at least one frame is required"));
    }
    let timestamps = parse_timestamps(form.timestamps_json.as_deref())?;

    debug!(session_id = %session_id, frames = form.frames.len(), "Frames received");
    state
        .registry
        .enqueue_frames(&session_id, form.frames, timestamps)
        .await?;

    Ok(Json(OkResponse::ok()))
}

/// Upload a short encoded video clip.
///
/// Multipart fields: `session_id`, `clip`, and an optional `fps` hint.
pub async fn upload_clip(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<OkResponse>> {
    let mut form = ClipForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("session_id") => form.session_id = Some(SessionId::from(field.text().await?)),
            Some("clip") => form.clip = Some(field.bytes().await?.to_vec()),
            Some("fps") => form.fps = Some(field.text().await?),
            _ => {}
        }
    }

    let session_id = form
        .session_id
        .ok_or_else(|| ApiError::bad_request("session_id is required"))?;
    let clip = form
        .clip
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("clip is required"))?;
    let fps = parse_fps(form.fps.as_deref())?;

    debug!(session_id = %session_id, bytes = clip.len(), "Clip received");
    state.registry.enqueue_clip(&session_id, clip, fps).await?;

    Ok(Json(OkResponse::ok()))
}

/// Blank means absent.
fn parse_timestamps(raw: Option<&str>) -> ApiResult<Option<Vec<f64>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => serde_json::from_str::<Vec<f64>>(raw)
            .map(Some)
            .map_err(|_| ApiError::bad_request(TIMESTAMPS_ERROR)),
    }
}

fn parse_fps(raw: Option<&str>) -> ApiResult<Option<f64>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(fps) if fps.is_finite() && fps > 0.0 => Ok(Some(fps)),
            _ => Err(ApiError::bad_request("fps must be a positive number")),
        },
    }
}
