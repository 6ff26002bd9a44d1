//! In-process fakes for the remote API and notifier.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use idlewatch_core::{ActionOutcome, InstanceName, RemoteId, ServerAction, StatsSnapshot};

use crate::error::{NotifyError, RemoteError};
use crate::notifier::Notifier;
use crate::remote::RemoteControl;

#[derive(Default)]
pub struct FakeRemote {
    stats: Mutex<HashMap<String, VecDeque<Result<StatsSnapshot, RemoteError>>>>,
    failing_actions: Mutex<HashMap<ServerAction, String>>,
    failing_for: Mutex<HashMap<(String, ServerAction), String>>,
    calls: Mutex<Vec<(String, ServerAction)>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a stats response for `remote_id`. The last one repeats once the queue drains.
    pub fn push_stats(&self, remote_id: &str, stats: Result<StatsSnapshot, RemoteError>) {
        self.stats
            .lock()
            .unwrap()
            .entry(remote_id.to_string())
            .or_default()
            .push_back(stats);
    }

    pub fn fail_action(&self, action: ServerAction, error: &str) {
        self.failing_actions
            .lock()
            .unwrap()
            .insert(action, error.to_string());
    }

    /// Like `fail_action`, but only for one remote id.
    pub fn fail_action_for(&self, remote_id: &str, action: ServerAction, error: &str) {
        self.failing_for
            .lock()
            .unwrap()
            .insert((remote_id.to_string(), action), error.to_string());
    }

    pub fn calls(&self) -> Vec<(String, ServerAction)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteControl for FakeRemote {
    async fn fetch_stats(&self, remote_id: &RemoteId) -> Result<StatsSnapshot, RemoteError> {
        self.fetches.lock().unwrap().push(remote_id.0.clone());
        let mut stats = self.stats.lock().unwrap();
        let queue = stats
            .get_mut(&remote_id.0)
            .ok_or_else(|| RemoteError::Transport(format!("no route to {remote_id}")))?;
        if queue.len() > 1 {
            return queue.pop_front().unwrap();
        }
        queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err(RemoteError::Transport("no stats queued".to_string())))
    }

    async fn invoke_action(&self, remote_id: &RemoteId, action: ServerAction) -> ActionOutcome {
        self.calls.lock().unwrap().push((remote_id.0.clone(), action));
        let scoped = self
            .failing_for
            .lock()
            .unwrap()
            .get(&(remote_id.0.clone(), action))
            .cloned();
        let global = self.failing_actions.lock().unwrap().get(&action).cloned();
        match scoped.or(global) {
            Some(err) => ActionOutcome::failed(err),
            None => ActionOutcome::ok(),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub fail: bool,
    sent: Mutex<Vec<(String, Duration)>>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, Duration)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn idle_shutdown(
        &self,
        instance: &InstanceName,
        threshold: Duration,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((instance.0.clone(), threshold));
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 500,
                body: "webhook down".to_string(),
            });
        }
        Ok(())
    }
}
