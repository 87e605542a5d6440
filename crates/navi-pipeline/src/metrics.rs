//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder. Without a recorder these calls are no-ops.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Session lifecycle
    pub const SESSIONS_CREATED_TOTAL: &str = "navi_sessions_created_total";
    pub const SESSIONS_STOPPED_TOTAL: &str = "navi_sessions_stopped_total";
    pub const SESSIONS_ACTIVE: &str = "navi_sessions_active";

    // Ingestion
    pub const FRAMES_INGESTED_TOTAL: &str = "navi_frames_ingested_total";
    pub const FRAMES_SAMPLED_TOTAL: &str = "navi_frames_sampled_total";
    pub const CLIPS_INGESTED_TOTAL: &str = "navi_clips_ingested_total";
    pub const DECODE_FAILURES_TOTAL: &str = "navi_decode_failures_total";

    // Detection
    pub const DETECTIONS_TOTAL: &str = "navi_detections_total";
    pub const DETECTOR_FAILURES_TOTAL: &str = "navi_detector_failures_total";
    pub const DETECTION_DURATION_SECONDS: &str = "navi_detection_duration_seconds";

    // Scene events and summaries
    pub const SCENE_EVENTS_TOTAL: &str = "navi_scene_events_total";
    pub const SUMMARIES_TOTAL: &str = "navi_summaries_total";
    pub const SUMMARIZER_FAILURES_TOTAL: &str = "navi_summarizer_failures_total";
    pub const SUMMARIES_DEFERRED_TOTAL: &str = "navi_summaries_deferred_total";
    pub const SUMMARY_DURATION_SECONDS: &str = "navi_summary_duration_seconds";

    // Fan-out
    pub const LISTENER_FAILURES_TOTAL: &str = "navi_listener_failures_total";
    pub const LISTENER_LAGGED_TOTAL: &str = "navi_listener_lagged_summaries_total";
}

/// Record a session creation.
pub fn record_session_created() {
    counter!(names::SESSIONS_CREATED_TOTAL).increment(1);
}

/// Record a session teardown, labelled by what triggered it.
pub fn record_session_stopped(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::SESSIONS_STOPPED_TOTAL, &labels).increment(1);
}

/// Update active sessions gauge.
pub fn set_active_sessions(count: usize) {
    gauge!(names::SESSIONS_ACTIVE).set(count as f64);
}

pub fn record_frames_ingested(count: usize) {
    counter!(names::FRAMES_INGESTED_TOTAL).increment(count as u64);
}

pub fn record_clip_ingested() {
    counter!(names::CLIPS_INGESTED_TOTAL).increment(1);
}

pub fn record_frame_sampled() {
    counter!(names::FRAMES_SAMPLED_TOTAL).increment(1);
}

/// Record a frame or clip that could not be decoded.
pub fn record_decode_failure(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::DECODE_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a completed detection call.
pub fn record_detection(count: usize, duration_secs: f64) {
    counter!(names::DETECTIONS_TOTAL).increment(count as u64);
    histogram!(names::DETECTION_DURATION_SECONDS).record(duration_secs);
}

pub fn record_detector_failure() {
    counter!(names::DETECTOR_FAILURES_TOTAL).increment(1);
}

/// Record a scene event by kind.
pub fn record_scene_event(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::SCENE_EVENTS_TOTAL, &labels).increment(1);
}

/// Record a published summary.
pub fn record_summary(duration_secs: f64) {
    counter!(names::SUMMARIES_TOTAL).increment(1);
    histogram!(names::SUMMARY_DURATION_SECONDS).record(duration_secs);
}

pub fn record_summarizer_failure() {
    counter!(names::SUMMARIZER_FAILURES_TOTAL).increment(1);
}

/// Record a window that had events but was held back by the cooldown.
pub fn record_summary_deferred() {
    counter!(names::SUMMARIES_DEFERRED_TOTAL).increment(1);
}

pub fn record_listener_failure() {
    counter!(names::LISTENER_FAILURES_TOTAL).increment(1);
}

/// Record summaries dropped for a subscriber that fell behind.
pub fn record_listener_lagged(skipped: u64) {
    counter!(names::LISTENER_LAGGED_TOTAL).increment(skipped);
}
