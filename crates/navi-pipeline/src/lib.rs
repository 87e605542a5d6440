//! Session-based stream processing pipeline.
//!
//! Each session owns one worker task that drains an ingestion queue,
//! samples frames for detection, smooths raw detections into discrete
//! scene events and periodically asks a summarizer to describe them.
//! Summaries are fanned out to subscribers over per-listener channels.
//!
//! The detector and summarizer are injected as trait objects so the
//! pipeline never depends on a particular model or service.

pub mod buffer;
pub mod config;
pub mod decode;
pub mod detector;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod reaper;
pub mod registry;
pub mod sampler;
pub mod session;
pub mod summarizer;
pub mod tracker;
pub mod trigger;
pub mod worker;

pub use buffer::EventBuffer;
pub use config::{PipelineConfig, SessionSettings};
pub use decode::{decode_frame, ClipDecoder, DecodedFrame, EncodedFrame, FfmpegClipDecoder};
pub use detector::{DetectionGate, ObjectDetector};
pub use error::{PipelineError, PipelineResult};
pub use fanout::{ChannelListener, SubscriptionId, SummaryListener};
pub use ingest::IngestItem;
pub use logging::SessionLogger;
pub use registry::{PipelineDeps, SessionRegistry};
pub use sampler::FrameSampler;
pub use session::SessionHandle;
pub use summarizer::{Summarizer, TemplateSummarizer};
pub use tracker::{SceneTracker, TrackerThresholds};
pub use trigger::{SummaryTrigger, TriggerDecision};
