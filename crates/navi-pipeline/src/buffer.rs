//! Ordered accumulation of scene events awaiting summarization.

use navi_models::SceneEvent;

/// Events since the last successful summary, in detection order.
///
/// A summarization attempt works on a snapshot; the buffer is only cleared
/// once the summary built from that snapshot has been published.
#[derive(Debug, Default, Clone)]
pub struct EventBuffer {
    events: Vec<SceneEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = SceneEvent>) {
        self.events.extend(events);
    }

    pub fn push(&mut self, event: SceneEvent) {
        self.events.push(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Copy of the current contents to hand to the summarizer.
    pub fn snapshot(&self) -> Vec<SceneEvent> {
        self.events.clone()
    }

    /// Drop the first `count` events after they were summarized, keeping
    /// anything appended since the snapshot was taken.
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.events.len());
        self.events.drain(..count);
    }
}
