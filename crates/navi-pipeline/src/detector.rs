//! Object detector seam and the shared admission gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use navi_models::Detection;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::decode::DecodedFrame;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;

/// Black-box object detector with its own multi-frame tracker.
///
/// Implementations must return an empty list when nothing is detected and
/// report failures as `DetectorFailed`.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    async fn detect(&self, frame: &DecodedFrame) -> PipelineResult<Vec<Detection>>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Bounded-concurrency gate shared by every session's worker.
///
/// Callers beyond the limit wait for a permit rather than failing. A failed
/// or timed-out call is reported as zero detections.
#[derive(Clone)]
pub struct DetectionGate {
    detector: Arc<dyn ObjectDetector>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl DetectionGate {
    pub fn new(detector: Arc<dyn ObjectDetector>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            detector,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    /// Run detection, propagating failures.
    ///
    /// Waiting for a permit is unbounded; the timeout covers only the
    /// detector call itself.
    pub async fn try_detect(&self, frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PipelineError::detector_failed("detection gate closed"))?;

        let started = Instant::now();
        let detections = tokio::time::timeout(self.timeout, self.detector.detect(frame))
            .await
            .map_err(|_| PipelineError::Timeout(self.timeout))??;
        metrics::record_detection(detections.len(), started.elapsed().as_secs_f64());
        Ok(detections)
    }

    /// Run detection, mapping any failure to "no detections".
    pub async fn detect(&self, frame: &DecodedFrame) -> Vec<Detection> {
        match self.try_detect(frame).await {
            Ok(detections) => {
                debug!(
                    detector = self.detector.name(),
                    count = detections.len(),
                    "Detection completed"
                );
                detections
            }
            Err(e) => {
                metrics::record_detector_failure();
                warn!(detector = self.detector.name(), "Detection failed, treating frame as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
