//! Summary fan-out to subscribed listeners.
//!
//! The worker publishes each summary once onto a per-session broadcast
//! channel. Every listener gets its own delivery task draining its own
//! receiver, so a slow or failing listener never touches the worker's
//! timing. A listener that falls more than the channel capacity behind
//! loses the oldest summaries it had not yet received.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use navi_models::{SessionId, Summary};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::logging::SessionLogger;
use crate::metrics;

/// Receives the summaries of one session.
#[async_trait]
pub trait SummaryListener: Send + Sync {
    /// Handle one summary. Errors are logged and do not stop delivery.
    async fn on_summary(&self, summary: &Arc<Summary>) -> PipelineResult<()>;

    /// Whether the listener can no longer accept summaries at all.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Listener forwarding summaries into an mpsc channel.
///
/// Transports (WebSocket handlers, tests) hold the receiving end.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::Sender<Arc<Summary>>,
}

impl ChannelListener {
    pub fn new(tx: mpsc::Sender<Arc<Summary>>) -> Self {
        Self { tx }
    }

    /// Create a listener and the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<Summary>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl SummaryListener for ChannelListener {
    async fn on_summary(&self, summary: &Arc<Summary>) -> PipelineResult<()> {
        self.tx
            .send(Arc::clone(summary))
            .await
            .map_err(|_| PipelineError::listener_failed("receiver dropped"))
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Per-session registry of listener delivery tasks.
pub(crate) struct Subscriptions {
    session_id: SessionId,
    summaries: broadcast::Sender<Arc<Summary>>,
    cancel: watch::Receiver<bool>,
    entries: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl Subscriptions {
    pub(crate) fn new(
        session_id: SessionId,
        summaries: broadcast::Sender<Arc<Summary>>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session_id,
            summaries,
            cancel,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Register a listener and start its delivery task.
    ///
    /// The listener only sees summaries published after this returns.
    pub(crate) async fn subscribe(&self, listener: Arc<dyn SummaryListener>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let (stop_tx, stop_rx) = oneshot::channel();
        let rx = self.summaries.subscribe();
        let logger = SessionLogger::new(&self.session_id, "fanout");

        let task = tokio::spawn(deliver(listener, rx, stop_rx, self.cancel.clone(), logger, id));

        self.entries.lock().await.insert(
            id,
            Subscription {
                stop: stop_tx,
                task,
            },
        );
        debug!(session_id = %self.session_id, subscription = %id, "Listener subscribed");
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub(crate) async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.entries.lock().await.remove(&id);
        match removed {
            Some(subscription) => {
                // The delivery task exits on its own; dropping the task
                // handle detaches it.
                let _ = subscription.stop.send(());
                debug!(session_id = %self.session_id, subscription = %id, "Listener unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Stop every delivery task and wait for them to finish.
    pub(crate) async fn close_all(&self) {
        let drained: Vec<Subscription> = self.entries.lock().await.drain().map(|(_, s)| s).collect();
        for subscription in drained {
            let _ = subscription.stop.send(());
            let _ = subscription.task.await;
        }
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

async fn deliver(
    listener: Arc<dyn SummaryListener>,
    mut rx: broadcast::Receiver<Arc<Summary>>,
    mut stop: oneshot::Receiver<()>,
    mut cancel: watch::Receiver<bool>,
    logger: SessionLogger,
    id: SubscriptionId,
) {
    loop {
        if *cancel.borrow() {
            break;
        }

        tokio::select! {
            biased;

            _ = &mut stop => break,

            changed = cancel.changed() => {
                if changed.is_err() {
                    break;
                }
            }

            received = rx.recv() => match received {
                Ok(summary) => {
                    if let Err(e) = listener.on_summary(&summary).await {
                        metrics::record_listener_failure();
                        logger.log_warning(&format!(
                            "delivery of v{} to {} failed: {}",
                            summary.version, id, e
                        ));
                        if listener.is_closed() {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    metrics::record_listener_lagged(skipped);
                    logger.log_warning(&format!(
                        "listener {} lagged, dropped {} oldest summaries",
                        id, skipped
                    ));
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}
