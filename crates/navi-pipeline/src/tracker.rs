//! Per-object scene tracking with hysteresis.
//!
//! Raw detections jitter from frame to frame. Each tracked object keeps a
//! confirmed position and distance bucket and only moves them after the
//! same new raw bucket has been observed for a configurable number of
//! consecutive sampled frames. First sightings bypass the filter and are
//! announced immediately.

use std::collections::HashMap;

use navi_models::{
    BoundingBox, Detection, DistanceBucket, ObjectKey, PositionBucket, SceneEvent, SceneEventKind,
};

/// Horizontal center below this fraction of the frame width is `left`.
pub const LEFT_BOUNDARY: f32 = 0.33;
/// Horizontal center above this fraction of the frame width is `right`.
pub const RIGHT_BOUNDARY: f32 = 0.66;
/// Box covering more than this fraction of the frame is `very_close`.
pub const VERY_CLOSE_AREA_RATIO: f32 = 0.25;
/// Box covering more than this fraction of the frame is `near`.
pub const NEAR_AREA_RATIO: f32 = 0.10;

/// Consecutive-frame thresholds for confirming a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerThresholds {
    pub position_frames: u32,
    pub distance_frames: u32,
}

impl Default for TrackerThresholds {
    fn default() -> Self {
        Self {
            position_frames: 6,
            distance_frames: 8,
        }
    }
}

/// Classify the horizontal position of a box within a frame.
pub fn classify_position(bbox: &BoundingBox, frame_width: u32) -> PositionBucket {
    if frame_width == 0 {
        return PositionBucket::Center;
    }
    let ratio = bbox.center_x() / frame_width as f32;
    if ratio < LEFT_BOUNDARY {
        PositionBucket::Left
    } else if ratio > RIGHT_BOUNDARY {
        PositionBucket::Right
    } else {
        PositionBucket::Center
    }
}

/// Classify distance from the share of the frame a box covers.
pub fn classify_distance(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> DistanceBucket {
    let frame_area = frame_width as f32 * frame_height as f32;
    if frame_area <= 0.0 {
        return DistanceBucket::Far;
    }
    let ratio = bbox.area() / frame_area;
    if ratio > VERY_CLOSE_AREA_RATIO {
        DistanceBucket::VeryClose
    } else if ratio > NEAR_AREA_RATIO {
        DistanceBucket::Near
    } else {
        DistanceBucket::Far
    }
}

/// Confirmed value plus the pending candidate for one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Hysteresis<T> {
    confirmed: T,
    candidate: Option<(T, u32)>,
}

impl<T: Copy + PartialEq> Hysteresis<T> {
    pub fn new(initial: T) -> Self {
        Self {
            confirmed: initial,
            candidate: None,
        }
    }

    pub fn confirmed(&self) -> T {
        self.confirmed
    }

    /// Pending value and how many consecutive frames have reported it.
    pub fn candidate(&self) -> Option<(T, u32)> {
        self.candidate
    }

    /// Feed one raw reading. Returns the newly confirmed value when the
    /// candidate reaches `threshold` consecutive observations.
    pub fn observe(&mut self, raw: T, threshold: u32) -> Option<T> {
        if raw == self.confirmed {
            self.candidate = None;
            return None;
        }

        let count = match self.candidate {
            Some((value, count)) if value == raw => count + 1,
            _ => 1,
        };

        if count >= threshold {
            self.confirmed = raw;
            self.candidate = None;
            Some(raw)
        } else {
            self.candidate = Some((raw, count));
            None
        }
    }
}

/// Smoothed state of one object inside a session.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub key: ObjectKey,
    position: Hysteresis<PositionBucket>,
    distance: Hysteresis<DistanceBucket>,
}

impl TrackedObject {
    fn new(key: ObjectKey, position: PositionBucket, distance: DistanceBucket) -> Self {
        Self {
            key,
            position: Hysteresis::new(position),
            distance: Hysteresis::new(distance),
        }
    }

    pub fn confirmed_position(&self) -> PositionBucket {
        self.position.confirmed()
    }

    pub fn confirmed_distance(&self) -> DistanceBucket {
        self.distance.confirmed()
    }

    pub fn candidate_position(&self) -> Option<(PositionBucket, u32)> {
        self.position.candidate()
    }

    pub fn candidate_distance(&self) -> Option<(DistanceBucket, u32)> {
        self.distance.candidate()
    }
}

/// Scene tracker for one session.
///
/// Objects are never evicted; an object that leaves the frame keeps its
/// last confirmed state until the session ends.
#[derive(Debug, Default)]
pub struct SceneTracker {
    thresholds: TrackerThresholds,
    objects: HashMap<ObjectKey, TrackedObject>,
}

impl SceneTracker {
    pub fn new(thresholds: TrackerThresholds) -> Self {
        Self {
            thresholds,
            objects: HashMap::new(),
        }
    }

    /// Apply one processed frame's detections and return the confirmed
    /// changes in detection order.
    pub fn update(
        &mut self,
        detections: &[Detection],
        frame_width: u32,
        frame_height: u32,
    ) -> Vec<SceneEvent> {
        let mut events = Vec::new();

        for det in detections {
            let position = classify_position(&det.bbox, frame_width);
            let distance = classify_distance(&det.bbox, frame_width, frame_height);
            self.observe(
                ObjectKey::new(det.class_label.clone(), det.track_id),
                position,
                distance,
                &mut events,
            );
        }

        events
    }

    /// Feed one already-classified reading for an object.
    pub fn observe(
        &mut self,
        key: ObjectKey,
        position: PositionBucket,
        distance: DistanceBucket,
        events: &mut Vec<SceneEvent>,
    ) {
        let thresholds = self.thresholds;

        let Some(object) = self.objects.get_mut(&key) else {
            events.push(SceneEvent::new(
                SceneEventKind::NewObject,
                &key,
                position,
                distance,
            ));
            self.objects
                .insert(key.clone(), TrackedObject::new(key, position, distance));
            return;
        };

        if let Some(confirmed) = object.position.observe(position, thresholds.position_frames) {
            events.push(SceneEvent::new(
                SceneEventKind::PositionChange,
                &object.key,
                confirmed,
                object.confirmed_distance(),
            ));
        }

        if let Some(confirmed) = object.distance.observe(distance, thresholds.distance_frames) {
            events.push(SceneEvent::new(
                SceneEventKind::DistanceChange,
                &object.key,
                object.confirmed_position(),
                confirmed,
            ));
        }
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&TrackedObject> {
        self.objects.get(key)
    }

    /// Number of distinct objects seen in this session.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn thresholds(&self) -> TrackerThresholds {
        self.thresholds
    }
}
