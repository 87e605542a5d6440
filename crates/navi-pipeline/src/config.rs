//! Pipeline configuration.

use std::str::FromStr;
use std::time::Duration;

use navi_models::SessionOverrides;

use crate::tracker::TrackerThresholds;

/// Process-wide pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run detection on every Nth ingested frame
    pub sample_every_n: u32,
    /// Consecutive sampled frames before a position change is confirmed
    pub position_stability_frames: u32,
    /// Consecutive sampled frames before a distance change is confirmed
    pub distance_stability_frames: u32,
    /// Summary window cadence
    pub summary_window: Duration,
    /// Minimum spacing between successful summaries
    pub summary_cooldown: Duration,
    /// Sessions without ingestion for this long are reaped
    pub idle_timeout: Duration,
    /// How often the reaper scans for idle sessions
    pub reaper_interval: Duration,
    /// Detection calls admitted concurrently across all sessions
    pub max_concurrent_detections: usize,
    /// Upper bound on one detector call; waiting for a gate permit is not counted
    pub detection_timeout: Duration,
    /// Upper bound on one summarizer call
    pub summary_timeout: Duration,
    /// Summaries buffered per subscriber before the oldest are dropped
    pub subscriber_buffer: usize,
    /// Upper bound on decoding one clip into frames
    pub clip_decode_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_every_n: 8,
            position_stability_frames: 6,
            distance_stability_frames: 8,
            summary_window: Duration::from_secs(3),
            summary_cooldown: Duration::from_secs(6),
            idle_timeout: Duration::from_secs(300), // 5 minutes
            reaper_interval: Duration::from_secs(5),
            max_concurrent_detections: 2,
            detection_timeout: Duration::from_secs(10),
            summary_timeout: Duration::from_secs(20),
            subscriber_buffer: 16,
            clip_decode_timeout: Duration::from_secs(60),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_every_n: env_or("NAVI_SAMPLE_EVERY_N", defaults.sample_every_n).max(1),
            position_stability_frames: env_or(
                "NAVI_POSITION_STABILITY_FRAMES",
                defaults.position_stability_frames,
            )
            .max(1),
            distance_stability_frames: env_or(
                "NAVI_DISTANCE_STABILITY_FRAMES",
                defaults.distance_stability_frames,
            )
            .max(1),
            summary_window: Duration::from_secs(env_or("NAVI_SUMMARY_WINDOW_SECS", 3)),
            summary_cooldown: Duration::from_secs(env_or("NAVI_SUMMARY_COOLDOWN_SECS", 6)),
            idle_timeout: Duration::from_secs(env_or("NAVI_IDLE_TIMEOUT_SECS", 300)),
            reaper_interval: Duration::from_secs(env_or("NAVI_REAPER_INTERVAL_SECS", 5).max(1)),
            max_concurrent_detections: env_or(
                "NAVI_MAX_CONCURRENT_DETECTIONS",
                defaults.max_concurrent_detections,
            )
            .max(1),
            detection_timeout: Duration::from_secs(env_or("NAVI_DETECTION_TIMEOUT_SECS", 10)),
            summary_timeout: Duration::from_secs(env_or("NAVI_SUMMARY_TIMEOUT_SECS", 20)),
            subscriber_buffer: env_or("NAVI_SUBSCRIBER_BUFFER", defaults.subscriber_buffer).max(1),
            clip_decode_timeout: Duration::from_secs(env_or("NAVI_CLIP_DECODE_TIMEOUT_SECS", 60)),
        }
    }

    /// Tracker thresholds derived from this config.
    pub fn thresholds(&self) -> TrackerThresholds {
        TrackerThresholds {
            position_frames: self.position_stability_frames,
            distance_frames: self.distance_stability_frames,
        }
    }

    /// Resolve the settings of one session, applying its overrides.
    ///
    /// Zero, negative or non-finite overrides are ignored.
    pub fn session_settings(&self, overrides: &SessionOverrides) -> SessionSettings {
        let sample_every_n = overrides
            .sampling_rate
            .filter(|n| *n > 0)
            .unwrap_or(self.sample_every_n);

        SessionSettings {
            sample_every_n,
            summary_window: positive_secs(overrides.summary_interval_s)
                .unwrap_or(self.summary_window),
            summary_cooldown: positive_secs(overrides.summary_cooldown_s)
                .unwrap_or(self.summary_cooldown),
            thresholds: self.thresholds(),
            summary_timeout: self.summary_timeout,
            subscriber_buffer: self.subscriber_buffer,
        }
    }
}

fn positive_secs(value: Option<f64>) -> Option<Duration> {
    value
        .filter(|s| s.is_finite() && *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

/// Effective settings of one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub sample_every_n: u32,
    pub summary_window: Duration,
    pub summary_cooldown: Duration,
    pub thresholds: TrackerThresholds,
    pub summary_timeout: Duration,
    pub subscriber_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        PipelineConfig::default().session_settings(&SessionOverrides::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_every_n, 8);
        assert_eq!(config.position_stability_frames, 6);
        assert_eq!(config.distance_stability_frames, 8);
        assert_eq!(config.summary_window, Duration::from_secs(3));
        assert_eq!(config.summary_cooldown, Duration::from_secs(6));
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.reaper_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_applied() {
        let config = PipelineConfig::default();
        let settings = config.session_settings(&SessionOverrides {
            sampling_rate: Some(4),
            summary_interval_s: Some(1.5),
            summary_cooldown_s: None,
        });
        assert_eq!(settings.sample_every_n, 4);
        assert_eq!(settings.summary_window, Duration::from_millis(1500));
        assert_eq!(settings.summary_cooldown, Duration::from_secs(6));
    }

    #[test]
    fn test_invalid_overrides_fall_back() {
        let config = PipelineConfig::default();
        let settings = config.session_settings(&SessionOverrides {
            sampling_rate: Some(0),
            summary_interval_s: Some(-2.0),
            summary_cooldown_s: Some(f64::NAN),
        });
        assert_eq!(settings.sample_every_n, 8);
        assert_eq!(settings.summary_window, Duration::from_secs(3));
        assert_eq!(settings.summary_cooldown, Duration::from_secs(6));
    }
}
