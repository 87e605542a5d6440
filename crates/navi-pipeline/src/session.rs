//! Handle to one running session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use navi_models::{SessionId, Summary};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use crate::config::SessionSettings;
use crate::decode::EncodedFrame;
use crate::error::{PipelineError, PipelineResult};
use crate::fanout::{SubscriptionId, Subscriptions, SummaryListener};
use crate::ingest::IngestItem;
use crate::metrics;
use crate::registry::PipelineDeps;
use crate::worker::SessionWorker;

/// Shared, thread-safe view of a session.
///
/// Everything that mutates tracking state lives in the session's worker
/// task; the handle only enqueues work, reads the latest summary and
/// manages subscriptions.
pub struct SessionHandle {
    id: SessionId,
    settings: SessionSettings,
    queue: mpsc::UnboundedSender<IngestItem>,
    created_at: Instant,
    /// Milliseconds after `created_at` of the last successful enqueue
    last_activity_ms: AtomicU64,
    latest: watch::Receiver<Option<Arc<Summary>>>,
    subscriptions: Subscriptions,
    cancel: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    /// Create the session and start its worker.
    pub(crate) fn spawn(id: SessionId, settings: SessionSettings, deps: PipelineDeps) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (latest_tx, latest_rx) = watch::channel(None);
        let (summaries_tx, _) = broadcast::channel(settings.subscriber_buffer.max(1));

        let worker = SessionWorker::new(
            &id,
            settings.clone(),
            deps,
            queue_rx,
            cancel_rx.clone(),
            latest_tx,
            summaries_tx.clone(),
        );
        let task = tokio::spawn(worker.run());

        Arc::new(Self {
            subscriptions: Subscriptions::new(id.clone(), summaries_tx, cancel_rx),
            id,
            settings,
            queue: queue_tx,
            created_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            latest: latest_rx,
            cancel: cancel_tx,
            worker: Mutex::new(Some(task)),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether the session was asked to stop.
    pub fn is_stopping(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Append an item to the queue without waiting for it to be processed.
    pub fn enqueue(&self, item: IngestItem) -> PipelineResult<()> {
        if self.is_stopping() {
            return Err(PipelineError::session_not_found(&self.id));
        }
        self.queue
            .send(item)
            .map_err(|_| PipelineError::session_not_found(&self.id))?;
        self.touch();
        Ok(())
    }

    /// Enqueue a batch of still frames. Timestamps pair with frames by
    /// position; frames without a matching timestamp get none.
    pub fn enqueue_frames(
        &self,
        frames: Vec<Vec<u8>>,
        timestamps: Option<Vec<f64>>,
    ) -> PipelineResult<()> {
        let mut timestamps = timestamps.unwrap_or_default().into_iter();
        let frames: Vec<EncodedFrame> = frames
            .into_iter()
            .map(|bytes| EncodedFrame::new(bytes, timestamps.next()))
            .collect();
        let count = frames.len();

        self.enqueue(IngestItem::frames(frames))?;
        metrics::record_frames_ingested(count);
        Ok(())
    }

    pub fn enqueue_clip(&self, clip: Vec<u8>, fps: Option<f64>) -> PipelineResult<()> {
        self.enqueue(IngestItem::clip(clip, fps))?;
        metrics::record_clip_ingested();
        Ok(())
    }

    /// Most recent summary, if any was produced yet.
    pub fn latest_summary(&self) -> Option<Arc<Summary>> {
        self.latest.borrow().clone()
    }

    pub async fn subscribe(&self, listener: Arc<dyn SummaryListener>) -> PipelineResult<SubscriptionId> {
        if self.is_stopping() {
            return Err(PipelineError::session_not_found(&self.id));
        }
        Ok(self.subscriptions.subscribe(listener).await)
    }

    /// Remove a subscription. Returns whether it existed.
    pub async fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(subscription).await
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscriptions.len().await
    }

    /// Time since the last successful enqueue (or creation).
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        self.created_at.elapsed().saturating_sub(last)
    }

    fn touch(&self) {
        let elapsed = self.created_at.elapsed().as_millis();
        let elapsed = u64::try_from(elapsed).unwrap_or(u64::MAX);
        self.last_activity_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Cancel the worker, wait for it to exit and stop all delivery tasks.
    ///
    /// Safe to call more than once, including concurrently: a later call
    /// returns only after the first one has finished.
    pub(crate) async fn teardown(&self) {
        self.cancel.send_replace(true);

        let mut worker = self.worker.lock().await;
        if let Some(task) = worker.take() {
            if let Err(e) = task.await {
                warn!(session_id = %self.id, "Session worker ended abnormally: {}", e);
            }
        }

        self.subscriptions.close_all().await;
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("stopping", &self.is_stopping())
            .finish()
    }
}
