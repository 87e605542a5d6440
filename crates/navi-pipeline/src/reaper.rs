//! Background reaping of idle sessions.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::registry::{SessionRegistry, StopReason};

/// Periodically stops sessions that have not ingested anything for
/// `idle_timeout`, through the same teardown as an explicit stop.
pub(crate) struct IdleReaper {
    registry: Weak<SessionRegistry>,
    poll_interval: Duration,
    idle_timeout: Duration,
    shutdown: watch::Receiver<bool>,
}

impl IdleReaper {
    pub(crate) fn new(
        registry: Weak<SessionRegistry>,
        poll_interval: Duration,
        idle_timeout: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            poll_interval,
            idle_timeout,
            shutdown,
        }
    }

    /// Run until the registry shuts down or is dropped.
    pub(crate) async fn run(mut self) {
        info!(
            "Starting idle session reaper (interval: {:?}, idle timeout: {:?})",
            self.poll_interval, self.idle_timeout
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let Some(registry) = self.registry.upgrade() else {
                        break;
                    };
                    self.reap(&registry).await;
                }
            }
        }

        info!("Idle session reaper stopped");
    }

    async fn reap(&self, registry: &SessionRegistry) {
        let idle = registry.idle_sessions(self.idle_timeout).await;
        if idle.is_empty() {
            return;
        }

        let mut reaped = 0usize;
        for id in &idle {
            if registry.stop_with_reason(id, StopReason::Idle).await {
                info!(session_id = %id, "Reaped idle session");
                reaped += 1;
            }
        }

        if reaped > 0 {
            info!("Idle reaping complete: {} sessions stopped", reaped);
        }
    }
}
