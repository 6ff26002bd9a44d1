//! Per-instance idle tracking.
//!
//! The tracker classifies each stats snapshot; it never acts on its own.
//! One [`IdleState`] record exists per polled instance, keyed by remote id,
//! and `empty_since` is set only while the latest observation was
//! "running with zero players" and no later observation had players.

use std::{collections::HashMap, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use idlewatch_core::{Instance, RemoteId, StatsSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdleState {
    pub empty_since: Option<DateTime<Utc>>,
    /// Only used to log player count transitions.
    pub last_known_player_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Has players, or is not running.
    Active,
    Idle {
        since: DateTime<Utc>,
        idle_for: TimeDelta,
    },
    DueForShutdown {
        since: DateTime<Utc>,
        idle_for: TimeDelta,
    },
}

impl Verdict {
    pub fn is_due_for_shutdown(&self) -> bool {
        matches!(self, Verdict::DueForShutdown { .. })
    }
}

#[derive(Debug)]
pub struct IdleTracker {
    threshold: TimeDelta,
    states: HashMap<RemoteId, IdleState>,
}

impl IdleTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
            states: HashMap::new(),
        }
    }

    pub fn state(&self, remote_id: &RemoteId) -> Option<&IdleState> {
        self.states.get(remote_id)
    }

    /// Feeds one snapshot through the state machine and classifies the instance.
    pub fn observe(&mut self, instance: &Instance, snap: &StatsSnapshot) -> Verdict {
        let name = &instance.name;

        if !snap.running {
            // No idle tracking while stopped; the record is rebuilt on the next running poll.
            if let Some(prev) = self.states.remove(&instance.remote_id)
                && prev.empty_since.is_some()
            {
                tracing::info!(instance = %name, "server is not running, clearing inactive timer");
            }
            return Verdict::Active;
        }

        let state = self.states.entry(instance.remote_id.clone()).or_default();

        if snap.player_count != state.last_known_player_count {
            tracing::info!(
                instance = %name,
                from = state.last_known_player_count,
                to = snap.player_count,
                "player count changed"
            );
            if snap.player_count > 0 && !snap.players.is_empty() {
                tracing::info!(instance = %name, players = %snap.players.join(", "), "players online");
            }
            state.last_known_player_count = snap.player_count;
        }

        if snap.player_count > 0 {
            if state.empty_since.take().is_some() {
                tracing::info!(instance = %name, "server now has players, resetting inactive timer");
            }
            return Verdict::Active;
        }

        let since = *state.empty_since.get_or_insert_with(|| {
            tracing::info!(instance = %name, "server is empty, starting inactive timer");
            snap.observed_at
        });
        let idle_for = snap.observed_at - since;

        if idle_for >= self.threshold {
            Verdict::DueForShutdown { since, idle_for }
        } else {
            Verdict::Idle { since, idle_for }
        }
    }

    /// Clears the idle timer after a completed shutdown.
    pub fn reset(&mut self, remote_id: &RemoteId) {
        if let Some(state) = self.states.get_mut(remote_id) {
            state.empty_since = None;
        }
    }
}
