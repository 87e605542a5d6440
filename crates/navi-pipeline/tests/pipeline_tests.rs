//! End-to-end tests of the session pipeline with in-process fakes.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use tokio::sync::{mpsc, Notify};
use tokio_test::assert_ok;

use navi_models::{
    BoundingBox, Detection, PositionBucket, SceneEvent, SceneEventKind, SessionId,
    SessionOverrides, Summary,
};
use navi_pipeline::{
    ChannelListener, DecodedFrame, DetectionGate, FfmpegClipDecoder, ObjectDetector,
    PipelineConfig, PipelineDeps, PipelineError, PipelineResult, SessionRegistry, Summarizer,
    SummaryListener,
};

const FRAME_SIZE: u32 = 100;

fn png_frame() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(FRAME_SIZE, FRAME_SIZE, Rgb([0, 0, 0]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// `count` frames stamped `start, start + 1, ...`.
fn frames(start: usize, count: usize) -> (Vec<Vec<u8>>, Option<Vec<f64>>) {
    let png = png_frame();
    let frames = vec![png; count];
    let timestamps = (start..start + count).map(|i| i as f64).collect();
    (frames, Some(timestamps))
}

fn left_box() -> BoundingBox {
    BoundingBox::new(5.0, 40.0, 25.0, 60.0)
}

fn right_box() -> BoundingBox {
    BoundingBox::new(75.0, 40.0, 95.0, 60.0)
}

/// Detector whose output is a function of the frame timestamp.
struct ScriptedDetector {
    script: Box<dyn Fn(f64) -> Vec<Detection> + Send + Sync>,
    seen: Mutex<Vec<f64>>,
}

impl ScriptedDetector {
    fn new(script: impl Fn(f64) -> Vec<Detection> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<f64> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectDetector for ScriptedDetector {
    async fn detect(&self, frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        let ts = frame.timestamp.unwrap_or(-1.0);
        self.seen.lock().unwrap().push(ts);
        Ok((self.script)(ts))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Detector that parks until released, to observe cancellation.
struct BlockingDetector {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ObjectDetector for BlockingDetector {
    async fn detect(&self, _frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(vec![Detection::new("person", 1, left_box())])
    }

    fn name(&self) -> &'static str {
        "blocking"
    }
}

#[derive(Default)]
struct RecordingSummarizer {
    calls: Mutex<Vec<Vec<SceneEvent>>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
    latency: Duration,
}

impl RecordingSummarizer {
    fn calls(&self) -> Vec<Vec<SceneEvent>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, events: &[SceneEvent]) -> PipelineResult<String> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(events.to_vec());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PipelineError::summarizer_failed("service unavailable"));
        }
        Ok(format!("{} scene changes", events.len()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct FailingListener;

#[async_trait]
impl SummaryListener for FailingListener {
    async fn on_summary(&self, _summary: &Arc<Summary>) -> PipelineResult<()> {
        Err(PipelineError::listener_failed("socket closed"))
    }
}

/// Listener that parks inside delivery until released.
#[derive(Default)]
struct GatedListener {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SummaryListener for GatedListener {
    async fn on_summary(&self, _summary: &Arc<Summary>) -> PipelineResult<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

/// Summaries on every processed item: zero window, zero cooldown.
fn eager_config(sample_every_n: u32) -> PipelineConfig {
    PipelineConfig {
        sample_every_n,
        summary_window: Duration::ZERO,
        summary_cooldown: Duration::ZERO,
        ..PipelineConfig::default()
    }
}

fn registry_with(
    config: PipelineConfig,
    detector: Arc<dyn ObjectDetector>,
    summarizer: Arc<dyn Summarizer>,
) -> Arc<SessionRegistry> {
    let deps = PipelineDeps::new(
        DetectionGate::new(detector, 2, Duration::from_secs(5)),
        summarizer,
        Arc::new(FfmpegClipDecoder::default()),
    );
    SessionRegistry::new(config, deps)
}

async fn next_summary(rx: &mut mpsc::Receiver<Arc<Summary>>) -> Arc<Summary> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a summary")
        .expect("listener channel closed")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn person_moves_right_at(frame: f64) -> impl Fn(f64) -> Vec<Detection> + Send + Sync {
    move |ts| {
        let bbox = if ts < frame { left_box() } else { right_box() };
        vec![Detection::new("person", 1, bbox)]
    }
}

#[tokio::test]
async fn test_position_change_confirmed_on_sixth_sampled_frame() {
    let detector = ScriptedDetector::new(person_moves_right_at(40.0));
    let summarizer = Arc::new(RecordingSummarizer::default());
    let registry = registry_with(eager_config(8), detector.clone(), summarizer.clone());

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    let (batch, timestamps) = frames(0, 88);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);

    let summary = next_summary(&mut rx).await;
    assert_eq!(summary.version, 1);

    // Frames 0, 8, ..., 80 reach the detector.
    let expected: Vec<f64> = (0..=80).step_by(8).map(|i| i as f64).collect();
    assert_eq!(detector.seen(), expected);

    let events = &summarizer.calls()[0];
    let kinds: Vec<SceneEventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![SceneEventKind::NewObject, SceneEventKind::PositionChange]);
    assert_eq!(events[0].position, PositionBucket::Left);
    assert_eq!(events[1].position, PositionBucket::Right);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_five_stable_frames_do_not_confirm_a_move() {
    let detector = ScriptedDetector::new(person_moves_right_at(40.0));
    let summarizer = Arc::new(RecordingSummarizer::default());
    let registry = registry_with(eager_config(8), detector.clone(), summarizer.clone());

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    // 64 frames leave only 40, 48 and 56 sampled after the move.
    let (batch, timestamps) = frames(0, 64);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    next_summary(&mut rx).await;

    let kinds: Vec<SceneEventKind> = summarizer.calls()[0].iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![SceneEventKind::NewObject]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_summarizer_failure_keeps_buffered_events() {
    let detector = ScriptedDetector::new(|ts| vec![Detection::new("chair", ts as i64, left_box())]);
    let summarizer = Arc::new(RecordingSummarizer::default());
    summarizer.fail.store(true, Ordering::SeqCst);
    let registry = registry_with(eager_config(1), detector, summarizer.clone());

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    let (batch, timestamps) = frames(1, 1);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    let attempts = summarizer.clone();
    wait_until(move || attempts.attempts.load(Ordering::SeqCst) >= 1).await;
    assert!(registry.latest_summary(&id).await.unwrap().is_none());

    summarizer.fail.store(false, Ordering::SeqCst);
    let (batch, timestamps) = frames(2, 1);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);

    let summary = next_summary(&mut rx).await;
    assert_eq!(summary.version, 1);
    assert_eq!(summary.extra.get("event_count"), Some(&serde_json::json!(2)));

    let last_call = summarizer.calls().pop().unwrap();
    let tracks: Vec<i64> = last_call.iter().map(|e| e.track_id).collect();
    assert_eq!(tracks, vec![1, 2]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_versions_increase_and_latest_tracks_newest() {
    let detector = ScriptedDetector::new(|ts| vec![Detection::new("dog", ts as i64, right_box())]);
    let summarizer = Arc::new(RecordingSummarizer::default());
    let registry = registry_with(eager_config(1), detector, summarizer);

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    for n in 0..3 {
        let (batch, timestamps) = frames(n, 1);
        assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    }

    let mut versions = Vec::new();
    for _ in 0..3 {
        versions.push(next_summary(&mut rx).await.version);
    }
    assert_eq!(versions, vec![1, 2, 3]);

    let latest = registry.latest_summary(&id).await.unwrap().unwrap();
    assert_eq!(latest.version, 3);
    assert_eq!(latest.text, "1 scene changes");

    registry.shutdown().await;
}

#[tokio::test]
async fn test_cooldown_defers_second_summary() {
    let detector = ScriptedDetector::new(|ts| vec![Detection::new("cat", ts as i64, left_box())]);
    let summarizer = Arc::new(RecordingSummarizer::default());
    let config = PipelineConfig {
        summary_cooldown: Duration::from_secs(60),
        ..eager_config(1)
    };
    let registry = registry_with(config, detector.clone(), summarizer.clone());

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    let (batch, timestamps) = frames(0, 1);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    assert_eq!(next_summary(&mut rx).await.version, 1);

    let (batch, timestamps) = frames(1, 1);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    let seen = detector.clone();
    wait_until(move || seen.seen().len() >= 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(summarizer.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(registry.latest_summary(&id).await.unwrap().unwrap().version, 1);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_cooldown_measured_from_summary_decision() {
    // A cup joins the person once the first summary has been requested.
    let detector = ScriptedDetector::new(|ts| {
        let mut detections = vec![Detection::new("person", 1, left_box())];
        if ts >= 0.35 {
            detections.push(Detection::new("cup", 2, right_box()));
        }
        detections
    });
    let summarizer = Arc::new(RecordingSummarizer {
        latency: Duration::from_millis(150),
        ..RecordingSummarizer::default()
    });
    let config = PipelineConfig {
        sample_every_n: 1,
        summary_window: Duration::from_millis(300),
        summary_cooldown: Duration::from_millis(600),
        ..PipelineConfig::default()
    };
    let registry = registry_with(config, detector, summarizer.clone());

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();
    let started = tokio::time::Instant::now();

    // Frame at 300ms triggers the first summary, 650ms is inside the cooldown
    // and 1000ms is 700ms after the first decision.
    for at_ms in [100u64, 300, 400, 650, 1000] {
        tokio::time::sleep_until(started + Duration::from_millis(at_ms)).await;
        let timestamp = at_ms as f64 / 1000.0;
        assert_ok!(
            registry
                .enqueue_frames(&id, vec![png_frame()], Some(vec![timestamp]))
                .await
        );
    }

    let first = next_summary(&mut rx).await;
    let second = next_summary(&mut rx).await;
    assert_eq!((first.version, second.version), (1, 2));
    assert_eq!(summarizer.attempts.load(Ordering::SeqCst), 2);
    let calls = summarizer.calls();
    assert_eq!(calls[1].len(), 1);
    assert_eq!(calls[1][0].class_label, "cup");

    registry.shutdown().await;
}

#[tokio::test]
async fn test_failing_listener_does_not_block_others() {
    let detector = ScriptedDetector::new(|ts| vec![Detection::new("car", ts as i64, left_box())]);
    let registry = registry_with(
        eager_config(1),
        detector,
        Arc::new(RecordingSummarizer::default()),
    );

    let id = registry.create_session(&SessionOverrides::default()).await;
    registry.subscribe(&id, Arc::new(FailingListener)).await.unwrap();
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    for n in 0..2 {
        let (batch, timestamps) = frames(n, 1);
        assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    }

    assert_eq!(next_summary(&mut rx).await.version, 1);
    assert_eq!(next_summary(&mut rx).await.version, 2);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_undecodable_frames_are_skipped() {
    let detector = ScriptedDetector::new(|_| vec![Detection::new("cup", 1, left_box())]);
    let registry = registry_with(
        eager_config(1),
        detector.clone(),
        Arc::new(RecordingSummarizer::default()),
    );

    let id = registry.create_session(&SessionOverrides::default()).await;
    let (listener, mut rx) = ChannelListener::channel(8);
    registry.subscribe(&id, Arc::new(listener)).await.unwrap();

    let batch = vec![b"garbage".to_vec(), png_frame()];
    assert_ok!(registry.enqueue_frames(&id, batch, Some(vec![0.0, 1.0])).await);

    next_summary(&mut rx).await;
    assert_eq!(detector.seen(), vec![1.0]);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_stopped_session_rejects_work() {
    let detector = ScriptedDetector::new(|_| Vec::new());
    let registry = registry_with(
        eager_config(8),
        detector,
        Arc::new(RecordingSummarizer::default()),
    );

    let id = registry.create_session(&SessionOverrides::default()).await;
    let session = registry.get_session(&id).await.unwrap();
    assert!(registry.stop_session(&id).await);
    assert!(!registry.stop_session(&id).await);

    let (batch, timestamps) = frames(0, 1);
    let err = registry.enqueue_frames(&id, batch, timestamps).await.unwrap_err();
    assert!(err.is_session_not_found());

    // A handle obtained before the stop also refuses work.
    let err = session.enqueue_clip(vec![0, 1, 2], Some(30.0)).unwrap_err();
    assert!(matches!(err, PipelineError::SessionNotFound(ref gone) if gone == &id));

    let (listener, _rx) = ChannelListener::channel(1);
    assert!(session.subscribe(Arc::new(listener)).await.is_err());
}

#[tokio::test]
async fn test_stop_discards_in_flight_detection() {
    let detector = Arc::new(BlockingDetector {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let summarizer = Arc::new(RecordingSummarizer::default());
    let registry = registry_with(eager_config(1), detector.clone(), summarizer.clone());

    let id = registry.create_session(&SessionOverrides::default()).await;
    let session = registry.get_session(&id).await.unwrap();
    let (batch, timestamps) = frames(0, 1);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);

    tokio::time::timeout(Duration::from_secs(5), detector.entered.notified())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), registry.stop_session(&id))
        .await
        .expect("stop must not wait for the detector");
    detector.release.notify_one();

    assert!(session.latest_summary().is_none());
    assert_eq!(summarizer.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_idle_sessions_are_reaped() {
    let config = PipelineConfig {
        idle_timeout: Duration::from_millis(100),
        reaper_interval: Duration::from_millis(20),
        ..PipelineConfig::default()
    };
    let deps = PipelineDeps::new(
        DetectionGate::new(ScriptedDetector::new(|_| Vec::new()), 1, Duration::from_secs(1)),
        Arc::new(RecordingSummarizer::default()),
        Arc::new(FfmpegClipDecoder::default()),
    );
    let registry = SessionRegistry::start(config, deps).await;

    let idle = registry.create_session(&SessionOverrides::default()).await;
    let busy = registry.create_session(&SessionOverrides::default()).await;

    for n in 0..15 {
        let (batch, timestamps) = frames(n, 1);
        assert_ok!(registry.enqueue_frames(&busy, batch, timestamps).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(registry.get_session(&idle).await.unwrap_err().is_session_not_found());
    assert!(registry.get_session(&busy).await.is_ok());

    registry.shutdown().await;
    assert_eq!(registry.session_count().await, 0);
}

#[tokio::test]
async fn test_shutdown_stops_sessions_and_listeners() {
    let registry = registry_with(
        eager_config(8),
        ScriptedDetector::new(|_| Vec::new()),
        Arc::new(RecordingSummarizer::default()),
    );

    let mut receivers = Vec::new();
    let mut ids: Vec<SessionId> = Vec::new();
    for _ in 0..3 {
        let id = registry.create_session(&SessionOverrides::default()).await;
        let (listener, rx) = ChannelListener::channel(4);
        registry.subscribe(&id, Arc::new(listener)).await.unwrap();
        receivers.push(rx);
        ids.push(id);
    }
    assert_eq!(registry.session_count().await, 3);

    registry.shutdown().await;

    assert_eq!(registry.session_count().await, 0);
    for mut rx in receivers {
        // Delivery tasks are joined during teardown, dropping their listeners.
        assert!(rx.recv().await.is_none());
    }
    for id in &ids {
        assert!(!registry.stop_session(id).await);
    }
}

#[tokio::test]
async fn test_shutdown_waits_for_stop_in_progress() {
    let registry = registry_with(
        eager_config(1),
        ScriptedDetector::new(|_| vec![Detection::new("dog", 1, left_box())]),
        Arc::new(RecordingSummarizer::default()),
    );
    let id = registry.create_session(&SessionOverrides::default()).await;
    let listener = Arc::new(GatedListener::default());
    registry.subscribe(&id, listener.clone()).await.unwrap();

    let (batch, timestamps) = frames(0, 1);
    assert_ok!(registry.enqueue_frames(&id, batch, timestamps).await);
    tokio::time::timeout(Duration::from_secs(5), listener.entered.notified())
        .await
        .unwrap();

    // The stop removes the session, then blocks joining the parked delivery.
    let stop = tokio::spawn({
        let registry = registry.clone();
        let id = id.clone();
        async move { registry.stop_session(&id).await }
    });
    tokio::time::timeout(Duration::from_secs(5), async {
        while registry.session_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let mut shutdown = tokio::spawn({
        let registry = registry.clone();
        async move { registry.shutdown().await }
    });
    assert!(
        tokio::time::timeout(Duration::from_millis(100), &mut shutdown)
            .await
            .is_err(),
        "shutdown returned while a session was still stopping"
    );

    listener.release.notify_one();
    tokio::time::timeout(Duration::from_secs(5), shutdown)
        .await
        .unwrap()
        .unwrap();
    let stopped = tokio::time::timeout(Duration::from_secs(5), stop).await.unwrap();
    assert!(stopped.unwrap());
}
