use std::{sync::Arc, time::Duration};

use idlewatch_core::{Instance, ServerAction};

use crate::notifier::Notifier;
use crate::remote::RemoteControl;
use crate::tracker::IdleTracker;

/// Upper bound on how long a shutdown notice may hold up the poll pass.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Backup failed; stop was not attempted and the idle timer is untouched.
    BackupFailed(String),
    /// Backup succeeded but stop failed; the idle timer is untouched.
    StopFailed(String),
    Stopped,
}

/// Runs the backup-then-stop sequence for an instance that crossed the idle threshold.
#[derive(Clone)]
pub struct ShutdownOrchestrator {
    remote: Arc<dyn RemoteControl>,
    notifier: Arc<dyn Notifier>,
    threshold: Duration,
    notify_timeout: Duration,
}

impl ShutdownOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteControl>,
        notifier: Arc<dyn Notifier>,
        threshold: Duration,
    ) -> Self {
        Self {
            remote,
            notifier,
            threshold,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub async fn maybe_shutdown(
        &self,
        instance: &Instance,
        tracker: &mut IdleTracker,
    ) -> ShutdownOutcome {
        let minutes = self.threshold.as_secs() / 60;
        tracing::info!(
            instance = %instance.name,
            idle_minutes = minutes,
            "server inactive past threshold, starting shutdown"
        );

        let backup = self
            .remote
            .invoke_action(&instance.remote_id, ServerAction::Backup)
            .await;
        if !backup.success {
            tracing::warn!(
                instance = %instance.name,
                error = backup.error_text(),
                "backup failed, skipping stop until next poll"
            );
            return ShutdownOutcome::BackupFailed(backup.error_text().to_string());
        }

        let stop = self
            .remote
            .invoke_action(&instance.remote_id, ServerAction::Stop)
            .await;
        if !stop.success {
            tracing::warn!(
                instance = %instance.name,
                error = stop.error_text(),
                "stop failed after backup, will re-evaluate next poll"
            );
            return ShutdownOutcome::StopFailed(stop.error_text().to_string());
        }

        tracker.reset(&instance.remote_id);
        tracing::info!(instance = %instance.name, "server stopped after inactivity");

        let notice = self.notifier.idle_shutdown(&instance.name, self.threshold);
        match tokio::time::timeout(self.notify_timeout, notice).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(instance = %instance.name, error = %e, "failed to post shutdown notice");
            }
            Err(_) => {
                tracing::warn!(
                    instance = %instance.name,
                    timeout_ms = self.notify_timeout.as_millis() as u64,
                    "shutdown notice timed out"
                );
            }
        }

        ShutdownOutcome::Stopped
    }
}
