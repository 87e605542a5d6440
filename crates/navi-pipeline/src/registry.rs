//! Session registry.
//!
//! Owns every live session, creates and tears them down, and resolves
//! session ids for ingestion and subscription calls. Sessions are stored
//! behind an `RwLock` that is held only for map operations; workers never
//! touch it, so sessions do not serialize against each other.

use std::collections::HashMap;
use std::sync::Arc;

use navi_models::{SessionId, SessionOverrides, Summary};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::decode::ClipDecoder;
use crate::detector::DetectionGate;
use crate::error::{PipelineError, PipelineResult};
use crate::fanout::{SubscriptionId, SummaryListener};
use crate::metrics;
use crate::reaper::IdleReaper;
use crate::session::SessionHandle;
use crate::summarizer::Summarizer;

/// Collaborators shared by every session, injected once at start-up.
#[derive(Clone)]
pub struct PipelineDeps {
    pub detector: DetectionGate,
    pub summarizer: Arc<dyn Summarizer>,
    pub clip_decoder: Arc<dyn ClipDecoder>,
}

impl PipelineDeps {
    pub fn new(
        detector: DetectionGate,
        summarizer: Arc<dyn Summarizer>,
        clip_decoder: Arc<dyn ClipDecoder>,
    ) -> Self {
        Self {
            detector,
            summarizer,
            clip_decoder,
        }
    }
}

/// Why a session was torn down; used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    Requested,
    Idle,
    Shutdown,
}

impl StopReason {
    fn as_str(&self) -> &'static str {
        match self {
            StopReason::Requested => "requested",
            StopReason::Idle => "idle",
            StopReason::Shutdown => "shutdown",
        }
    }
}

pub struct SessionRegistry {
    config: PipelineConfig,
    deps: PipelineDeps,
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    /// Sessions removed from `sessions` whose teardown is still running
    stopping: Mutex<HashMap<SessionId, Arc<SessionHandle>>>,
    shutdown_tx: watch::Sender<bool>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionRegistry {
    /// Create a registry without an idle reaper.
    pub fn new(config: PipelineConfig, deps: PipelineDeps) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        Arc::new(Self {
            config,
            deps,
            sessions: RwLock::new(HashMap::new()),
            stopping: Mutex::new(HashMap::new()),
            shutdown_tx,
            reaper: Mutex::new(None),
        })
    }

    /// Create a registry and start its idle reaper.
    pub async fn start(config: PipelineConfig, deps: PipelineDeps) -> Arc<Self> {
        let registry = Self::new(config, deps);

        let reaper = IdleReaper::new(
            Arc::downgrade(&registry),
            registry.config.reaper_interval,
            registry.config.idle_timeout,
            registry.shutdown_tx.subscribe(),
        );
        *registry.reaper.lock().await = Some(tokio::spawn(reaper.run()));

        registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Allocate a session and start its worker.
    pub async fn create_session(&self, overrides: &SessionOverrides) -> SessionId {
        let id = SessionId::new();
        let settings = self.config.session_settings(overrides);
        let handle = SessionHandle::spawn(id.clone(), settings, self.deps.clone());

        let active = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(id.clone(), handle);
            sessions.len()
        };

        metrics::record_session_created();
        metrics::set_active_sessions(active);
        info!(session_id = %id, active, "Session created");
        id
    }

    /// Stop a session. Stopping an unknown or already-stopped session is a
    /// no-op; returns whether this call removed it.
    pub async fn stop_session(&self, id: &SessionId) -> bool {
        self.stop_with_reason(id, StopReason::Requested).await
    }

    pub(crate) async fn stop_with_reason(&self, id: &SessionId, reason: StopReason) -> bool {
        let (handle, active) = {
            let mut sessions = self.sessions.write().await;
            let Some(handle) = sessions.remove(id) else {
                return false;
            };
            // Visible to shutdown until teardown completes.
            self.stopping.lock().await.insert(id.clone(), Arc::clone(&handle));
            (handle, sessions.len())
        };

        handle.teardown().await;
        self.stopping.lock().await.remove(id);
        metrics::record_session_stopped(reason.as_str());
        metrics::set_active_sessions(active);
        info!(session_id = %id, reason = reason.as_str(), "Session stopped");
        true
    }

    pub async fn get_session(&self, id: &SessionId) -> PipelineResult<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PipelineError::session_not_found(id))
    }

    pub async fn enqueue_frames(
        &self,
        id: &SessionId,
        frames: Vec<Vec<u8>>,
        timestamps: Option<Vec<f64>>,
    ) -> PipelineResult<()> {
        self.get_session(id).await?.enqueue_frames(frames, timestamps)
    }

    pub async fn enqueue_clip(
        &self,
        id: &SessionId,
        clip: Vec<u8>,
        fps: Option<f64>,
    ) -> PipelineResult<()> {
        self.get_session(id).await?.enqueue_clip(clip, fps)
    }

    /// Latest summary of a session; `Ok(None)` until the first one.
    pub async fn latest_summary(&self, id: &SessionId) -> PipelineResult<Option<Arc<Summary>>> {
        Ok(self.get_session(id).await?.latest_summary())
    }

    pub async fn subscribe(
        &self,
        id: &SessionId,
        listener: Arc<dyn SummaryListener>,
    ) -> PipelineResult<SubscriptionId> {
        self.get_session(id).await?.subscribe(listener).await
    }

    /// Remove a subscription. Unknown sessions and subscriptions are ignored.
    pub async fn unsubscribe(&self, id: &SessionId, subscription: SubscriptionId) {
        if let Ok(session) = self.get_session(id).await {
            session.unsubscribe(subscription).await;
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Sessions idle for at least `idle_timeout`.
    pub(crate) async fn idle_sessions(&self, idle_timeout: std::time::Duration) -> Vec<SessionId> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|session| session.idle_for() >= idle_timeout)
            .map(|session| session.id().clone())
            .collect()
    }

    /// Stop the reaper, then every remaining session.
    ///
    /// Returns once every worker has exited.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let reaper = self.reaper.lock().await.take();
        if let Some(reaper) = reaper {
            if let Err(e) = reaper.await {
                warn!("Idle reaper ended abnormally: {}", e);
            }
        }

        let ids = self.session_ids().await;
        info!(sessions = ids.len(), "Shutting down session registry");
        for id in ids {
            // A concurrent stop may already have removed it.
            self.stop_with_reason(&id, StopReason::Shutdown).await;
        }

        // Wait out stops that were already running when shutdown began.
        let in_progress: Vec<Arc<SessionHandle>> =
            self.stopping.lock().await.values().cloned().collect();
        for handle in in_progress {
            handle.teardown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedFrame, FfmpegClipDecoder};
    use crate::detector::ObjectDetector;
    use crate::fanout::ChannelListener;
    use crate::summarizer::TemplateSummarizer;
    use async_trait::async_trait;
    use navi_models::Detection;
    use std::time::Duration;

    struct NoDetections;

    #[async_trait]
    impl ObjectDetector for NoDetections {
        async fn detect(&self, _frame: &DecodedFrame) -> PipelineResult<Vec<Detection>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &'static str {
            "none"
        }
    }

    fn deps() -> PipelineDeps {
        PipelineDeps::new(
            DetectionGate::new(Arc::new(NoDetections), 1, Duration::from_secs(1)),
            Arc::new(TemplateSummarizer::new()),
            Arc::new(FfmpegClipDecoder::default()),
        )
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let registry = SessionRegistry::new(PipelineConfig::default(), deps());
        let id = registry.create_session(&SessionOverrides::default()).await;
        assert_eq!(registry.session_count().await, 1);

        assert!(registry.stop_session(&id).await);
        assert!(!registry.stop_session(&id).await);
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let registry = SessionRegistry::new(PipelineConfig::default(), deps());
        let missing = SessionId::from("missing");

        let err = registry.enqueue_frames(&missing, vec![vec![1]], None).await.unwrap_err();
        assert!(err.is_session_not_found());
        let err = registry.enqueue_clip(&missing, vec![1], None).await.unwrap_err();
        assert!(err.is_session_not_found());
        assert!(registry.latest_summary(&missing).await.unwrap_err().is_session_not_found());

        let (listener, _rx) = ChannelListener::channel(1);
        let err = registry.subscribe(&missing, Arc::new(listener)).await.unwrap_err();
        assert!(err.is_session_not_found());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let registry = SessionRegistry::new(PipelineConfig::default(), deps());
        let id = registry.create_session(&SessionOverrides::default()).await;
        let (listener, _rx) = ChannelListener::channel(1);
        let sub = registry.subscribe(&id, Arc::new(listener)).await.unwrap();
        let session = registry.get_session(&id).await.unwrap();

        registry.unsubscribe(&SessionId::from("missing"), sub).await;
        assert_eq!(session.subscriber_count().await, 1);

        registry.unsubscribe(&id, sub).await;
        registry.unsubscribe(&id, sub).await;
        assert_eq!(session.subscriber_count().await, 0);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_overrides_reach_session() {
        let registry = SessionRegistry::new(PipelineConfig::default(), deps());
        let id = registry
            .create_session(&SessionOverrides {
                sampling_rate: Some(2),
                ..Default::default()
            })
            .await;
        let session = registry.get_session(&id).await.unwrap();
        assert_eq!(session.settings().sample_every_n, 2);
        registry.shutdown().await;
    }
}
