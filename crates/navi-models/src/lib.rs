//! Shared data models for the Navi backend.
//!
//! This crate provides Serde-serializable types for:
//! - Session identifiers and per-session tuning overrides
//! - Raw detections and the discrete scene events derived from them
//! - Versioned summaries pushed to assistive clients
//! - WebSocket message schemas

pub mod detection;
pub mod scene;
pub mod session;
pub mod summary;
pub mod ws;

// Re-export common types
pub use detection::{BoundingBox, Detection};
pub use scene::{DistanceBucket, ObjectKey, PositionBucket, SceneEvent, SceneEventKind};
pub use session::{SessionId, SessionOverrides};
pub use summary::Summary;
pub use ws::{SummaryMessage, SummaryMessageType};
