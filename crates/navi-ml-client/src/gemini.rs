//! Gemini summarizer.
//!
//! Turns a batch of scene events into a short spoken-style description
//! for a visually impaired user, using Google's Gemini `generateContent`
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use navi_models::{SceneEvent, SceneEventKind};
use navi_pipeline::{PipelineResult, Summarizer};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MlError, MlResult};
use crate::retry::with_retry;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    /// API root, overridable for tests
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(15),
            max_retries: 1,
        }
    }

    /// Create config from environment variables.
    ///
    /// Fails when `GEMINI_API_KEY` is not set.
    pub fn from_env() -> MlResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MlError::Config("GEMINI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Summarizer backed by the Gemini API.
pub struct GeminiSummarizer {
    http: Client,
    config: GeminiConfig,
}

impl GeminiSummarizer {
    pub fn new(config: GeminiConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    /// Build the prompt describing `events`, oldest first.
    pub fn build_prompt(events: &[SceneEvent]) -> String {
        let mut prompt = String::from(
            "You are a navigation assistant for a blind or low-vision pedestrian. \
             Describe the following changes in their surroundings in one or two short, \
             calm sentences. Mention only what matters for moving safely. \
             Do not use lists or markdown.\n\nChanges, oldest first:\n",
        );

        for event in events {
            let line = match event.kind {
                SceneEventKind::NewObject => format!(
                    "- a {} appeared {}, {}",
                    event.class_label,
                    event.position.phrase(),
                    event.distance.phrase()
                ),
                SceneEventKind::PositionChange => format!(
                    "- the {} (#{}) is now {}",
                    event.class_label,
                    event.track_id,
                    event.position.phrase()
                ),
                SceneEventKind::DistanceChange => format!(
                    "- the {} (#{}) is now {}",
                    event.class_label,
                    event.track_id,
                    event.distance.phrase()
                ),
            };
            prompt.push_str(&line);
            prompt.push('\n');
        }

        prompt
    }

    /// Ask Gemini for a description of `events`.
    pub async fn generate(&self, events: &[SceneEvent]) -> MlResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::build_prompt(events),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                max_output_tokens: 120,
            },
        };

        let response = with_retry("gemini", self.config.max_retries, || async {
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

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| MlError::InvalidResponse("No content in Gemini response".to_string()))?;

        debug!(model = %self.config.model, chars = text.len(), "Gemini summary generated");
        Ok(text)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    async fn summarize(&self, events: &[SceneEvent]) -> PipelineResult<String> {
        self.generate(events)
            .await
            .map_err(MlError::into_summarizer_error)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
