//! Summarizer seam and a local template implementation.

use async_trait::async_trait;
use navi_models::{SceneEvent, SceneEventKind};

use crate::error::PipelineResult;

/// Black-box text generator turning scene events into prose.
///
/// Treated as unreliable: callers bound it with a timeout and treat an
/// empty string as a failure.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, events: &[SceneEvent]) -> PipelineResult<String>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Deterministic summarizer rendering one sentence per event.
///
/// Used when no text-generation service is configured.
#[derive(Debug, Clone, Default)]
pub struct TemplateSummarizer;

impl TemplateSummarizer {
    pub fn new() -> Self {
        Self
    }

    fn sentence(event: &SceneEvent) -> String {
        let label = event.class_label.replace('_', " ");
        let subject = capitalize(&article_for(&label, &label));
        match event.kind {
            SceneEventKind::NewObject => format!(
                "{} appeared {}, {}.",
                subject,
                event.position.phrase(),
                event.distance.phrase()
            ),
            SceneEventKind::PositionChange => format!(
                "The {} moved {}.",
                label,
                event.position.phrase()
            ),
            SceneEventKind::DistanceChange => format!(
                "The {} is now {}.",
                label,
                event.distance.phrase()
            ),
        }
    }
}

fn article_for(word: &str, phrase: &str) -> String {
    let starts_with_vowel = word
        .chars()
        .next()
        .map(|c| "aeiouAEIOU".contains(c))
        .unwrap_or(false);
    if starts_with_vowel {
        format!("an {}", phrase)
    } else {
        format!("a {}", phrase)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn summarize(&self, events: &[SceneEvent]) -> PipelineResult<String> {
        Ok(events
            .iter()
            .map(Self::sentence)
            .collect::<Vec<_>>()
            .join(" "))
    }

    fn name(&self) -> &'static str {
        "template"
    }
}
