//! Scene state buckets and the discrete events derived from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a tracked object within one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ObjectKey {
    pub class_label: String,
    pub track_id: i64,
}

impl ObjectKey {
    pub fn new(class_label: impl Into<String>, track_id: i64) -> Self {
        Self {
            class_label: class_label.into(),
            track_id,
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_label, self.track_id)
    }
}

/// Horizontal position of an object relative to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PositionBucket {
    Left,
    Center,
    Right,
}

impl PositionBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionBucket::Left => "left",
            PositionBucket::Center => "center",
            PositionBucket::Right => "right",
        }
    }

    /// Spoken form used in generated prose.
    pub fn phrase(&self) -> &'static str {
        match self {
            PositionBucket::Left => "on your left",
            PositionBucket::Center => "ahead of you",
            PositionBucket::Right => "on your right",
        }
    }
}

impl fmt::Display for PositionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse distance estimated from how much of the frame an object covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBucket {
    VeryClose,
    Near,
    Far,
}

impl DistanceBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceBucket::VeryClose => "very_close",
            DistanceBucket::Near => "near",
            DistanceBucket::Far => "far",
        }
    }

    /// Spoken form used in generated prose.
    pub fn phrase(&self) -> &'static str {
        match self {
            DistanceBucket::VeryClose => "very close",
            DistanceBucket::Near => "near",
            DistanceBucket::Far => "far away",
        }
    }
}

impl fmt::Display for DistanceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of confirmed scene change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SceneEventKind {
    /// First sighting of an object in the session
    NewObject,
    /// Confirmed move to another horizontal bucket
    PositionChange,
    /// Confirmed move to another distance bucket
    DistanceChange,
}

impl SceneEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneEventKind::NewObject => "new_object",
            SceneEventKind::PositionChange => "position_change",
            SceneEventKind::DistanceChange => "distance_change",
        }
    }
}

/// Immutable record of a confirmed change. Position and distance hold the
/// values after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneEvent {
    pub kind: SceneEventKind,
    pub class_label: String,
    pub track_id: i64,
    pub position: PositionBucket,
    pub distance: DistanceBucket,
}

impl SceneEvent {
    pub fn new(
        kind: SceneEventKind,
        key: &ObjectKey,
        position: PositionBucket,
        distance: DistanceBucket,
    ) -> Self {
        Self {
            kind,
            class_label: key.class_label.clone(),
            track_id: key.track_id,
            position,
            distance,
        }
    }

    pub fn object_key(&self) -> ObjectKey {
        ObjectKey::new(self.class_label.clone(), self.track_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&DistanceBucket::VeryClose).unwrap(),
            "\"very_close\""
        );
        assert_eq!(
            serde_json::to_string(&SceneEventKind::PositionChange).unwrap(),
            "\"position_change\""
        );
    }

    #[test]
    fn test_event_keeps_object_identity() {
        let key = ObjectKey::new("person", 1);
        let event = SceneEvent::new(
            SceneEventKind::NewObject,
            &key,
            PositionBucket::Left,
            DistanceBucket::Near,
        );
        assert_eq!(event.object_key(), key);
        assert_eq!(key.to_string(), "person#1");
    }
}
