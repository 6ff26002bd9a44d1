use std::time::Duration;

use async_trait::async_trait;
use idlewatch_core::InstanceName;

use crate::error::NotifyError;

/// One-way channel for human-readable events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn idle_shutdown(
        &self,
        instance: &InstanceName,
        threshold: Duration,
    ) -> Result<(), NotifyError>;
}

pub fn idle_shutdown_message(instance: &InstanceName, threshold: Duration) -> String {
    let minutes = threshold.as_secs() / 60;
    format!(
        "Server {instance} has been automatically stopped after {minutes} minutes of inactivity. \
         A backup was created before shutdown. Use `/start {instance}` to start it again."
    )
}

/// Used when no webhook is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn idle_shutdown(
        &self,
        instance: &InstanceName,
        threshold: Duration,
    ) -> Result<(), NotifyError> {
        tracing::info!(%instance, message = %idle_shutdown_message(instance, threshold), "notice");
        Ok(())
    }
}

/// Posts notices to a chat webhook as `{"content": "..."}`.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

#[derive(serde::Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("idlewatch-control/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn idle_shutdown(
        &self,
        instance: &InstanceName,
        threshold: Duration,
    ) -> Result<(), NotifyError> {
        let message = idle_shutdown_message(instance, threshold);
        let resp = self
            .http
            .post(&self.url)
            .json(&WebhookBody { content: &message })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> InstanceName {
        InstanceName("survival".to_string())
    }

    #[test]
    fn message_names_instance_and_threshold() {
        let msg = idle_shutdown_message(&name(), Duration::from_secs(30 * 60));
        assert!(msg.starts_with("Server survival has been automatically stopped after 30 minutes"));
        assert!(msg.contains("`/start survival`"));
    }

    #[tokio::test]
    async fn webhook_posts_content() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "content": idle_shutdown_message(&name(), Duration::from_secs(600)),
            })))
            .with_status(204)
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        notifier
            .idle_shutdown(&name(), Duration::from_secs(600))
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_rejection_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let notifier =
            WebhookNotifier::new(format!("{}/hook", server.url()), Duration::from_secs(5)).unwrap();
        let err = notifier
            .idle_shutdown(&name(), Duration::from_secs(600))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 429, .. }));
    }
}
