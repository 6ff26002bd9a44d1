use chrono::{DateTime, Utc};

/// Human-assigned instance name, unique within the registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct InstanceName(pub String);

impl std::fmt::Display for InstanceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier assigned by the remote management API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RemoteId(pub String);

impl std::fmt::Display for RemoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instance {
    pub name: InstanceName,
    pub remote_id: RemoteId,
}

impl Instance {
    pub fn new(name: impl Into<String>, remote_id: impl Into<String>) -> Self {
        Self {
            name: InstanceName(name.into()),
            remote_id: RemoteId(remote_id.into()),
        }
    }
}

/// Actions the remote API can run against an instance.
///
/// NOTE: The set is closed on purpose; path segments are derived from the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerAction {
    Start,
    Stop,
    Restart,
    Backup,
}

impl ServerAction {
    pub fn path_segment(self) -> &'static str {
        match self {
            ServerAction::Start => "start_server",
            ServerAction::Stop => "stop_server",
            ServerAction::Restart => "restart_server",
            ServerAction::Backup => "backup_server",
        }
    }
}

impl std::fmt::Display for ServerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// One poll of an instance's stats.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    pub running: bool,
    pub player_count: u32,
    /// Player names, when the remote reports them as a structured list.
    #[serde(default)]
    pub players: Vec<String>,
    pub observed_at: DateTime<Utc>,
}

impl StatsSnapshot {
    pub fn is_idle(&self) -> bool {
        self.running && self.player_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Error text for logs; empty detail is reported as "unknown error".
    pub fn error_text(&self) -> &str {
        self.error
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("unknown error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_path_segments_match_remote_api() {
        assert_eq!(ServerAction::Start.path_segment(), "start_server");
        assert_eq!(ServerAction::Stop.path_segment(), "stop_server");
        assert_eq!(ServerAction::Restart.path_segment(), "restart_server");
        assert_eq!(ServerAction::Backup.path_segment(), "backup_server");
    }

    #[test]
    fn action_serializes_as_snake_case() {
        let s = serde_json::to_string(&ServerAction::Backup).unwrap();
        assert_eq!(s, "\"backup\"");
    }

    #[test]
    fn snapshot_is_idle_only_when_running_and_empty() {
        let mut snap = StatsSnapshot {
            running: true,
            player_count: 0,
            players: Vec::new(),
            observed_at: Utc::now(),
        };
        assert!(snap.is_idle());

        snap.player_count = 2;
        assert!(!snap.is_idle());

        snap.player_count = 0;
        snap.running = false;
        assert!(!snap.is_idle());
    }

    #[test]
    fn failed_outcome_keeps_error_text() {
        let outcome = ActionOutcome::failed("disk full");
        assert!(!outcome.success);
        assert_eq!(outcome.error_text(), "disk full");
        assert_eq!(ActionOutcome::failed("").error_text(), "unknown error");
    }
}
