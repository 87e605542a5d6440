//! Items carried on a session's ingestion queue.

use crate::decode::EncodedFrame;

/// One unit of work for a session worker, processed in enqueue order.
#[derive(Debug, Clone)]
pub enum IngestItem {
    /// A batch of still frames, each counted by the sampler.
    Frames { frames: Vec<EncodedFrame> },
    /// An encoded video clip, split into frames by the worker.
    Clip { bytes: Vec<u8>, fps: Option<f64> },
}

impl IngestItem {
    pub fn frames(frames: Vec<EncodedFrame>) -> Self {
        Self::Frames { frames }
    }

    pub fn clip(bytes: Vec<u8>, fps: Option<f64>) -> Self {
        Self::Clip { bytes, fps }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frames { .. } => "frames",
            Self::Clip { .. } => "clip",
        }
    }
}
