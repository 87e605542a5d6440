//! Application state.

use std::sync::Arc;

use navi_ml_client::{GeminiSummarizer, HttpDetector};
use navi_pipeline::{
    DetectionGate, FfmpegClipDecoder, ObjectDetector, PipelineConfig, PipelineDeps,
    SessionRegistry, Summarizer, TemplateSummarizer,
};
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: ApiConfig, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }

    /// Build the pipeline from environment variables and start it.
    ///
    /// Without `GEMINI_API_KEY` summaries come from the local template
    /// summarizer.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let pipeline_config = PipelineConfig::from_env();

        let detector: Arc<dyn ObjectDetector> = Arc::new(HttpDetector::from_env()?);

        let summarizer: Arc<dyn Summarizer> = match GeminiSummarizer::from_env() {
            Ok(gemini) => {
                info!("Using Gemini summarizer");
                Arc::new(gemini)
            }
            Err(e) => {
                warn!("Gemini unavailable ({}), using template summarizer", e);
                Arc::new(TemplateSummarizer::new())
            }
        };

        let deps = PipelineDeps::new(
            DetectionGate::new(
                detector,
                pipeline_config.max_concurrent_detections,
                pipeline_config.detection_timeout,
            ),
            summarizer,
            Arc::new(FfmpegClipDecoder::new(pipeline_config.clip_decode_timeout)),
        );

        info!(
            sample_every_n = pipeline_config.sample_every_n,
            idle_timeout_secs = pipeline_config.idle_timeout.as_secs(),
            "Pipeline configured"
        );

        let registry = SessionRegistry::start(pipeline_config, deps).await;
        Ok(Self::new(config, registry))
    }
}
