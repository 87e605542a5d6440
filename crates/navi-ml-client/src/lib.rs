//! Clients for the external inference services.
//!
//! Two black-box collaborators of the pipeline live behind HTTP:
//! an object detection service with its own multi-frame tracker, and
//! Google's Gemini API for turning scene events into prose. Both are
//! exposed through the pipeline's `ObjectDetector` and `Summarizer`
//! traits.

pub mod detector;
pub mod error;
pub mod gemini;
mod retry;
pub mod types;

pub use detector::{DetectorClientConfig, HttpDetector};
pub use error::{MlError, MlResult};
pub use gemini::{GeminiConfig, GeminiSummarizer};
