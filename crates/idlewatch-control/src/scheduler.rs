use std::{sync::Arc, time::Duration};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::orchestrator::{ShutdownOrchestrator, ShutdownOutcome};
use crate::registry::InstanceRegistry;
use crate::remote::RemoteControl;
use crate::tracker::IdleTracker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub polled: usize,
    pub fetch_failures: usize,
    pub shutdowns_attempted: usize,
    pub shutdowns_completed: usize,
}

/// Polls every registered instance once per interval and hands idle ones to
/// the orchestrator. Owns the idle tracker; nothing else mutates it.
pub struct PollScheduler {
    registry: Arc<InstanceRegistry>,
    remote: Arc<dyn RemoteControl>,
    tracker: IdleTracker,
    orchestrator: ShutdownOrchestrator,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        registry: Arc<InstanceRegistry>,
        remote: Arc<dyn RemoteControl>,
        orchestrator: ShutdownOrchestrator,
        idle_threshold: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            remote,
            tracker: IdleTracker::new(idle_threshold),
            orchestrator,
            interval,
        }
    }

    pub fn tracker(&self) -> &IdleTracker {
        &self.tracker
    }

    /// One pass over all instances. A failure on one instance never stops the pass.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        for instance in self.registry.iter() {
            report.polled += 1;

            let snap = match self.remote.fetch_stats(&instance.remote_id).await {
                Ok(v) => v,
                Err(e) => {
                    report.fetch_failures += 1;
                    tracing::warn!(
                        instance = %instance.name,
                        remote_id = %instance.remote_id,
                        error = %e,
                        "error checking server"
                    );
                    continue;
                }
            };

            let verdict = self.tracker.observe(instance, &snap);
            if !verdict.is_due_for_shutdown() {
                continue;
            }

            report.shutdowns_attempted += 1;
            let outcome = self
                .orchestrator
                .maybe_shutdown(instance, &mut self.tracker)
                .await;
            if outcome == ShutdownOutcome::Stopped {
                report.shutdowns_completed += 1;
            }
        }

        report
    }

    /// Waits for `ready`, then ticks until `shutdown` flips to true.
    ///
    /// Shutdown is only observed between ticks, so a started shutdown
    /// sequence always runs to completion.
    pub async fn run(mut self, ready: oneshot::Receiver<()>, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            res = ready => {
                if res.is_err() {
                    tracing::warn!("ready signal dropped, poll scheduler not started");
                    return;
                }
            }
            _ = shutdown_requested(&mut shutdown) => {
                tracing::info!("shutdown requested before ready, poll scheduler not started");
                return;
            }
        }

        tracing::info!(
            instances = self.registry.len(),
            interval_secs = self.interval.as_secs(),
            "poll scheduler started"
        );

        loop {
            let report = self.tick().await;
            tracing::debug!(?report, "poll tick finished");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        tracing::info!("poll scheduler stopped");
    }

    pub fn spawn(
        self,
        ready: oneshot::Receiver<()>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let span = tracing::info_span!("poll_scheduler");
        tokio::spawn(self.run(ready, shutdown).instrument(span))
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown.
    let _ = rx.wait_for(|stop| *stop).await;
}
