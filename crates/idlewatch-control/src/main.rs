use std::sync::Arc;

use anyhow::Context;
use idlewatch_control::config::Config;
use idlewatch_control::http;
use idlewatch_control::notifier::{LogNotifier, Notifier, WebhookNotifier};
use idlewatch_control::orchestrator::{DEFAULT_NOTIFY_TIMEOUT, ShutdownOrchestrator};
use idlewatch_control::remote::{RemoteClient, RemoteControl};
use idlewatch_control::scheduler::PollScheduler;
use idlewatch_control::state::AppState;
use tokio::sync::{oneshot, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().context("load configuration")?;
    config.log_summary();

    let remote: Arc<dyn RemoteControl> =
        Arc::new(RemoteClient::new(&config.api).context("build remote API client")?);
    let registry = Arc::new(config.registry.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (ready_tx, ready_rx) = oneshot::channel();

    let scheduler = if config.auto_shutdown {
        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => Arc::new(
                WebhookNotifier::new(url.clone(), DEFAULT_NOTIFY_TIMEOUT)
                    .context("build webhook notifier")?,
            ),
            None => Arc::new(LogNotifier),
        };
        let orchestrator =
            ShutdownOrchestrator::new(remote.clone(), notifier, config.idle_threshold);
        let scheduler = PollScheduler::new(
            registry.clone(),
            remote.clone(),
            orchestrator,
            config.idle_threshold,
            config.poll_interval,
        );
        Some(scheduler.spawn(ready_rx, shutdown_rx.clone()))
    } else {
        None
    };

    let app = http::router(AppState {
        registry,
        remote,
        allowed_origins: Arc::new(config.allowed_origins.clone()),
        auto_shutdown: config.auto_shutdown,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "idlewatch-control HTTP listening");

    // The scheduler may be disabled, in which case nobody is waiting.
    let _ = ready_tx.send(());

    let mut http_shutdown = shutdown_rx;
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = http_shutdown.wait_for(|stop| *stop).await;
    });

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            // Dropping the sender would read as a shutdown request; keep it alive.
            tracing::warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutdown requested, finishing current poll");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    if let Some(handle) = scheduler {
        handle.await.context("poll scheduler task")?;
    }

    Ok(())
}
