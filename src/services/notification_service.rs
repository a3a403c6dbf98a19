// ============================================================================
// NOTIFICATION DISPATCHER - fire-and-forget webhook delivery
// ============================================================================
//
// The delivery channel (push/email templates) lives outside this core; we
// hand events to it over a webhook. Dispatch failures are logged and never
// propagated into the operation that raised the event.
//
// Configuration:
// - NOTIFICATION_WEBHOOK_URL: where events are POSTed; unset disables
//   dispatch entirely.

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub struct NotificationService {
    client: Client,
    webhook_url: Option<String>,
}

impl NotificationService {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url,
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("NOTIFICATION_WEBHOOK_URL").ok())
    }

    /// Deliver one event for one user. Callers treat this as fire-and-forget.
    pub async fn notify(
        &self,
        user_id: i64,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            debug!(
                "Notification dispatch disabled, dropping {} for user {}",
                event_type, user_id
            );
            return Ok(());
        };

        let body = json!({
            "user_id": user_id,
            "event_type": event_type,
            "payload": payload,
            "sent_at": Utc::now(),
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("notification webhook request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("notification webhook returned {}", response.status());
        }

        Ok(())
    }

    pub async fn notify_like_received(&self, target_id: i64, actor_id: i64) -> Result<()> {
        self.notify(
            target_id,
            "like_received",
            json!({ "from_user_id": actor_id }),
        )
        .await
    }

    pub async fn notify_match_created(
        &self,
        user_id: i64,
        other_user_id: i64,
        match_id: Uuid,
    ) -> Result<()> {
        self.notify(
            user_id,
            "match_created",
            json!({ "with_user_id": other_user_id, "match_id": match_id }),
        )
        .await
    }
}

// ============================================================================
// SHARED INSTANCE
// ============================================================================

static NOTIFICATION_SERVICE: OnceLock<Arc<NotificationService>> = OnceLock::new();

pub fn init_notification_service(service: Arc<NotificationService>) {
    if NOTIFICATION_SERVICE.set(service).is_err() {
        tracing::warn!("Notification service already initialized");
    }
}

pub fn get_notification_service() -> Option<Arc<NotificationService>> {
    NOTIFICATION_SERVICE.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_event_to_configured_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let service = NotificationService::new(Some(format!("{}/events", server.uri())));
        service
            .notify_like_received(42, 7)
            .await
            .expect("dispatch should succeed");
    }

    #[tokio::test]
    async fn unconfigured_dispatcher_is_a_noop() {
        let service = NotificationService::new(None);
        service
            .notify(1, "like_received", json!({}))
            .await
            .expect("noop dispatch should succeed");
    }

    #[tokio::test]
    async fn server_error_is_reported_to_caller_for_logging() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let service = NotificationService::new(Some(server.uri()));
        assert!(service.notify(1, "match_created", json!({})).await.is_err());
    }
}
