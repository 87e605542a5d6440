//! HTTP client for the object detection service.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use navi_models::Detection;
use navi_pipeline::{DecodedFrame, ObjectDetector, PipelineResult};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::retry::with_retry;
use crate::types::{DetectRequest, DetectResponse, HealthResponse};

/// Configuration for the detection client.
#[derive(Debug, Clone)]
pub struct DetectorClientConfig {
    /// Base URL of the detection service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for DetectorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
        }
    }
}

impl DetectorClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(
                std::env::var("DETECTOR_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("DETECTOR_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }
}

/// Object detector backed by a remote detection service.
pub struct HttpDetector {
    http: Client,
    config: DetectorClientConfig,
}

impl HttpDetector {
    pub fn new(config: DetectorClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(DetectorClientConfig::from_env())
    }

    pub fn config(&self) -> &DetectorClientConfig {
        &self.config
    }

    /// Check if the detection service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Detection service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Detection service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Run detection on one frame.
    pub async fn detect_frame(&self, frame: &DecodedFrame) -> MlResult<Vec<Detection>> {
        let url = format!("{}/detect", self.config.base_url);
        let request = DetectRequest {
            image_base64: STANDARD.encode(&frame.encoded),
            width: frame.width,
            height: frame.height,
        };

        let response = with_retry("detector", self.config.max_retries, || async {
            let response = self
                .http
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(MlError::Network)?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(MlError::from_status(status, body));
            }
            Ok(response)
        })
        .await?;

        let body: DetectResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;

        debug!(count = body.detections.len(), "Detection service responded");
        Ok(body.detections.into_iter().map(Detection::from).collect())
    }
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    async fn detect(&self, frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        self.detect_frame(frame)
            .await
            .map_err(MlError::into_detector_error)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
