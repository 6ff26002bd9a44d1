//! Manual start/status commands.
//!
//! These share the remote client with the poll scheduler but never touch idle
//! tracking state. Every failure is turned into a readable reply.

use idlewatch_core::{Instance, InstanceName, ServerAction};

use crate::error::CommandError;
use crate::registry::InstanceRegistry;
use crate::remote::RemoteControl;

fn resolve<'a>(registry: &'a InstanceRegistry, name: &str) -> Result<&'a Instance, CommandError> {
    registry
        .get(name)
        .ok_or_else(|| CommandError::UnknownInstance(name.to_string()))
}

pub fn list(registry: &InstanceRegistry) -> Vec<InstanceName> {
    registry.names()
}

pub async fn start(registry: &InstanceRegistry, remote: &dyn RemoteControl, name: &str) -> String {
    match try_start(registry, remote, name).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(instance = name, error = %e, "error starting server");
            format!("Error starting server: {e}")
        }
    }
}

async fn try_start(
    registry: &InstanceRegistry,
    remote: &dyn RemoteControl,
    name: &str,
) -> Result<String, CommandError> {
    let instance = resolve(registry, name)?;
    tracing::info!(instance = %instance.name, remote_id = %instance.remote_id, "starting server");

    let stats = remote.fetch_stats(&instance.remote_id).await?;
    if stats.running {
        return Ok(format!("Server {} is already running!", instance.name));
    }

    let outcome = remote
        .invoke_action(&instance.remote_id, ServerAction::Start)
        .await;
    if outcome.success {
        Ok(format!("Starting server {}...", instance.name))
    } else {
        Ok(format!("Failed to start server {}.", instance.name))
    }
}

pub async fn status(registry: &InstanceRegistry, remote: &dyn RemoteControl, name: &str) -> String {
    let result = async {
        let instance = resolve(registry, name)?;
        let stats = remote.fetch_stats(&instance.remote_id).await?;
        Ok::<_, CommandError>(format!(
            "Server: {}\nStatus: {}\nPlayers online: {}",
            instance.name,
            if stats.running { "🟢 Running" } else { "🔴 Stopped" },
            stats.player_count
        ))
    }
    .await;

    match result {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(instance = name, error = %e, "error checking status");
            format!("Error checking server status: {e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::testing::FakeRemote;
    use chrono::Utc;
    use idlewatch_core::StatsSnapshot;

    fn registry() -> InstanceRegistry {
        InstanceRegistry::parse("survival:abc").unwrap()
    }

    fn stats(running: bool, players: u32) -> Result<StatsSnapshot, RemoteError> {
        Ok(StatsSnapshot {
            running,
            player_count: players,
            players: Vec::new(),
            observed_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn start_stopped_server_invokes_start() {
        let remote = FakeRemote::new();
        remote.push_stats("abc", stats(false, 0));

        let reply = start(&registry(), &remote, "survival").await;

        assert_eq!(reply, "Starting server survival...");
        assert_eq!(remote.calls(), vec![("abc".to_string(), ServerAction::Start)]);
    }

    #[tokio::test]
    async fn start_running_server_is_a_no_op() {
        let remote = FakeRemote::new();
        remote.push_stats("abc", stats(true, 2));

        let reply = start(&registry(), &remote, "survival").await;

        assert_eq!(reply, "Server survival is already running!");
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn start_reports_failed_action() {
        let remote = FakeRemote::new();
        remote.push_stats("abc", stats(false, 0));
        remote.fail_action(ServerAction::Start, "nope");

        let reply = start(&registry(), &remote, "survival").await;
        assert_eq!(reply, "Failed to start server survival.");
    }

    #[tokio::test]
    async fn start_unknown_server_is_readable() {
        let remote = FakeRemote::new();
        let reply = start(&registry(), &remote, "creative").await;
        assert_eq!(reply, "Error starting server: unknown server: creative");
        assert!(remote.fetches().is_empty());
    }

    #[tokio::test]
    async fn status_reports_players() {
        let remote = FakeRemote::new();
        remote.push_stats("abc", stats(true, 3));

        let reply = status(&registry(), &remote, "survival").await;
        assert_eq!(reply, "Server: survival\nStatus: 🟢 Running\nPlayers online: 3");
    }

    #[tokio::test]
    async fn status_transport_error_is_readable() {
        let remote = FakeRemote::new();
        remote.push_stats("abc", Err(RemoteError::Transport("timed out".into())));

        let reply = status(&registry(), &remote, "survival").await;
        assert_eq!(reply, "Error checking server status: transport error: timed out");
    }
}
