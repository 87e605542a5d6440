//! Windowed, cooled-down summarization trigger.
//!
//! Two timers are kept apart: the window batches bursts of events, the
//! cooldown bounds how often the summarizer is invoked. The window always
//! advances when it elapses, whether or not a summary follows, so a long
//! run of skipped windows never turns into a burst of catch-up calls.

use std::time::Duration;

use tokio::time::Instant;

/// Outcome of evaluating the trigger at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The current window has not elapsed yet
    Wait,
    /// A window elapsed with nothing buffered
    WindowEmpty,
    /// A window elapsed with events, but the last summary is too recent
    CoolingDown,
    /// Invoke the summarizer with the buffered events
    Summarize,
}

#[derive(Debug, Clone)]
pub struct SummaryTrigger {
    window: Duration,
    cooldown: Duration,
    last_window: Instant,
    last_summary: Option<Instant>,
}

impl SummaryTrigger {
    /// Start a trigger whose first window begins at `started_at`.
    pub fn new(window: Duration, cooldown: Duration, started_at: Instant) -> Self {
        Self {
            window,
            cooldown,
            last_window: started_at,
            last_summary: None,
        }
    }

    /// Evaluate the trigger once, advancing the window if it elapsed.
    pub fn evaluate(&mut self, now: Instant, has_events: bool) -> TriggerDecision {
        if now.saturating_duration_since(self.last_window) < self.window {
            return TriggerDecision::Wait;
        }
        self.last_window = now;

        if !has_events {
            return TriggerDecision::WindowEmpty;
        }

        match self.last_summary {
            Some(last) if now.saturating_duration_since(last) < self.cooldown => {
                TriggerDecision::CoolingDown
            }
            _ => TriggerDecision::Summarize,
        }
    }

    /// Record a published summary; starts the cooldown.
    pub fn record_success(&mut self, now: Instant) {
        self.last_summary = Some(now);
    }
}
