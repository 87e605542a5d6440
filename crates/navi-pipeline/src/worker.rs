//! Per-session worker loop.
//!
//! The worker is the only writer of a session's tracking state. It drains
//! the ingestion queue in order, runs sampled frames through the detector
//! gate and tracker, and evaluates the summary trigger after every item.

use std::future::Future;
use std::sync::Arc;

use navi_models::{SessionId, Summary};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, Instrument};

use crate::buffer::EventBuffer;
use crate::config::SessionSettings;
use crate::decode::{decode_frame, EncodedFrame};
use crate::error::PipelineError;
use crate::ingest::IngestItem;
use crate::logging::SessionLogger;
use crate::metrics;
use crate::registry::PipelineDeps;
use crate::sampler::FrameSampler;
use crate::tracker::SceneTracker;
use crate::trigger::{SummaryTrigger, TriggerDecision};

/// Whether the worker should keep running after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Cancelled,
}

pub(crate) struct SessionWorker {
    logger: SessionLogger,
    settings: SessionSettings,
    deps: PipelineDeps,
    queue: mpsc::UnboundedReceiver<IngestItem>,
    cancel: watch::Receiver<bool>,
    latest: watch::Sender<Option<Arc<Summary>>>,
    summaries: broadcast::Sender<Arc<Summary>>,
    sampler: FrameSampler,
    tracker: SceneTracker,
    buffer: EventBuffer,
    trigger: SummaryTrigger,
    version: u64,
}

impl SessionWorker {
    pub(crate) fn new(
        session_id: &SessionId,
        settings: SessionSettings,
        deps: PipelineDeps,
        queue: mpsc::UnboundedReceiver<IngestItem>,
        cancel: watch::Receiver<bool>,
        latest: watch::Sender<Option<Arc<Summary>>>,
        summaries: broadcast::Sender<Arc<Summary>>,
    ) -> Self {
        Self {
            logger: SessionLogger::new(session_id, "worker"),
            sampler: FrameSampler::new(settings.sample_every_n),
            tracker: SceneTracker::new(settings.thresholds),
            buffer: EventBuffer::new(),
            trigger: SummaryTrigger::new(
                settings.summary_window,
                settings.summary_cooldown,
                Instant::now(),
            ),
            version: 0,
            settings,
            deps,
            queue,
            cancel,
            latest,
            summaries,
        }
    }

    pub(crate) async fn run(self) {
        let span = self.logger.create_span();
        self.run_loop().instrument(span).await
    }

    async fn run_loop(mut self) {
        self.logger.log_start(&format!(
            "sampling every {} frames, window {:?}, cooldown {:?}",
            self.settings.sample_every_n,
            self.settings.summary_window,
            self.settings.summary_cooldown
        ));

        loop {
            if self.is_cancelled() {
                break;
            }

            let item = tokio::select! {
                biased;

                _ = cancelled(&mut self.cancel) => break,

                item = self.queue.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            if self.process_item(item).await == Step::Cancelled {
                break;
            }
            if self.maybe_summarize().await == Step::Cancelled {
                break;
            }
        }

        self.logger.log_completion(&format!(
            "{} frames seen, {} objects tracked, {} summaries",
            self.sampler.frame_counter(),
            self.tracker.len(),
            self.version
        ));
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    async fn process_item(&mut self, item: IngestItem) -> Step {
        debug!(kind = item.kind(), "Processing ingestion item");
        match item {
            IngestItem::Frames { frames } => self.process_frames(frames).await,
            IngestItem::Clip { bytes, fps } => {
                let decoded = until_cancelled(
                    &mut self.cancel,
                    self.deps.clip_decoder.decode_clip(&bytes, fps),
                )
                .await;

                match decoded {
                    None => Step::Cancelled,
                    Some(Ok(frames)) => {
                        debug!(frames = frames.len(), "Clip split into frames");
                        self.process_frames(frames).await
                    }
                    Some(Err(e)) => {
                        metrics::record_decode_failure("clip");
                        self.logger.log_warning(&format!("clip skipped: {}", e));
                        Step::Continue
                    }
                }
            }
        }
    }

    async fn process_frames(&mut self, frames: Vec<EncodedFrame>) -> Step {
        for frame in frames {
            if self.process_frame(frame).await == Step::Cancelled {
                return Step::Cancelled;
            }
        }
        Step::Continue
    }

    async fn process_frame(&mut self, frame: EncodedFrame) -> Step {
        if self.is_cancelled() {
            return Step::Cancelled;
        }
        let Some(index) = self.sampler.next_frame() else {
            return Step::Continue;
        };
        metrics::record_frame_sampled();

        let decoded = match tokio::task::spawn_blocking(move || decode_frame(frame)).await {
            Ok(Ok(decoded)) => decoded,
            Ok(Err(e)) => {
                metrics::record_decode_failure("frame");
                self.logger.log_warning(&format!("frame {} skipped: {}", index, e));
                return Step::Continue;
            }
            Err(e) => {
                metrics::record_decode_failure("frame");
                self.logger.log_error(&format!("decode task for frame {} failed: {}", index, e));
                return Step::Continue;
            }
        };

        let Some(detections) =
            until_cancelled(&mut self.cancel, self.deps.detector.detect(&decoded)).await
        else {
            return Step::Cancelled;
        };
        // Results that land after a stop request are discarded.
        if self.is_cancelled() {
            return Step::Cancelled;
        }

        let events = self
            .tracker
            .update(&detections, decoded.width, decoded.height);
        for event in &events {
            metrics::record_scene_event(event.kind.as_str());
            debug!(
                frame = index,
                kind = event.kind.as_str(),
                object = %event.object_key(),
                position = event.position.as_str(),
                distance = event.distance.as_str(),
                "Scene event"
            );
        }
        self.buffer.extend(events);
        Step::Continue
    }

    async fn maybe_summarize(&mut self) -> Step {
        let now = Instant::now();
        match self.trigger.evaluate(now, !self.buffer.is_empty()) {
            TriggerDecision::Wait | TriggerDecision::WindowEmpty => return Step::Continue,
            TriggerDecision::CoolingDown => {
                metrics::record_summary_deferred();
                debug!(pending = self.buffer.len(), "Summary deferred by cooldown");
                return Step::Continue;
            }
            TriggerDecision::Summarize => {}
        }

        let snapshot = self.buffer.snapshot();
        let started = Instant::now();
        let call = tokio::time::timeout(
            self.settings.summary_timeout,
            self.deps.summarizer.summarize(&snapshot),
        );

        let Some(result) = until_cancelled(&mut self.cancel, call).await else {
            return Step::Cancelled;
        };
        if self.is_cancelled() {
            return Step::Cancelled;
        }

        let text = match result {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                return self.summary_failed(&PipelineError::summarizer_failed("empty text"));
            }
            Ok(Err(e)) => return self.summary_failed(&e),
            Err(_) => {
                return self.summary_failed(&PipelineError::Timeout(self.settings.summary_timeout));
            }
        };

        self.version += 1;
        let summary = Arc::new(
            Summary::new(self.version, text).with_extra("event_count", snapshot.len()),
        );
        self.latest.send_replace(Some(Arc::clone(&summary)));
        // No receivers just means nobody is subscribed right now.
        let _ = self.summaries.send(summary);

        self.buffer.consume(snapshot.len());
        // Cooldown runs from the decision, not from when the summarizer answered.
        self.trigger.record_success(now);
        metrics::record_summary(started.elapsed().as_secs_f64());
        self.logger.log_progress(&format!(
            "summary v{} published from {} events",
            self.version,
            snapshot.len()
        ));
        Step::Continue
    }

    fn summary_failed(&self, error: &PipelineError) -> Step {
        metrics::record_summarizer_failure();
        self.logger.log_warning(&format!(
            "summarizer {} failed, keeping {} events: {}",
            self.deps.summarizer.name(),
            self.buffer.len(),
            error
        ));
        Step::Continue
    }
}

/// Resolves once the session is asked to stop, or its handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|stop| *stop).await;
}

/// Run `fut` unless the session is stopped first.
async fn until_cancelled<F: Future>(
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;

        _ = cancelled(cancel) => None,
        output = fut => Some(output),
    }
}
