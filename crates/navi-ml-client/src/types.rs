//! Detection service request/response types.

use navi_models::{BoundingBox, Detection};
use serde::{Deserialize, Serialize};

/// Request for object detection on one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectRequest {
    /// Encoded frame (JPEG/PNG), base64
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
}

/// One tracked object as reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDetection {
    pub class_label: String,
    /// Tracker id, stable across frames for the same object
    pub track_id: i64,
    /// `[x1, y1, x2, y2]` in pixels
    pub bbox: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl From<RemoteDetection> for Detection {
    fn from(remote: RemoteDetection) -> Self {
        Detection::new(remote.class_label, remote.track_id, BoundingBox::from(remote.bbox))
    }
}

/// Response from the detection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<RemoteDetection>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_maps_to_detections() {
        let response: DetectResponse = serde_json::from_str(
            r#"{"detections":[{"class_label":"person","track_id":3,"bbox":[10,20,30,60]}]}"#,
        )
        .unwrap();

        let detections: Vec<Detection> = response.detections.into_iter().map(Into::into).collect();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].track_id, 3);
        assert_eq!(detections[0].bbox.width(), 20.0);
    }

    #[test]
    fn test_missing_detections_is_empty() {
        let response: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(response.detections.is_empty());
    }
}
