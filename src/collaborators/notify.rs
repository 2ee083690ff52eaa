//! New-post notification dispatchers

use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::NotificationDispatch;

/// Payload delivered for every new post
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPostNotification {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub body: String,
    pub url: String,
    pub group_id: String,
    pub post_id: String,
    pub excluded_user_id: String,
}

impl NewPostNotification {
    pub fn new(group_id: Uuid, excluded_user_id: Uuid, post_id: &str, author_name: &str) -> Self {
        Self {
            kind: "NEW_POST",
            title: "New post in your group".to_string(),
            body: format!("{} shared a memory", author_name),
            url: format!("/groups/{}", group_id),
            group_id: group_id.to_string(),
            post_id: post_id.to_string(),
            excluded_user_id: excluded_user_id.to_string(),
        }
    }
}

/// Logs notifications instead of delivering them
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl NotificationDispatch for LoggingNotifier {
    fn notify_new_post(
        &self,
        group_id: Uuid,
        excluded_user_id: Uuid,
        post_id: &str,
        author_name: &str,
    ) -> anyhow::Result<()> {
        let payload = NewPostNotification::new(group_id, excluded_user_id, post_id, author_name);
        info!(
            group_id = %payload.group_id,
            post_id = %payload.post_id,
            "Notification: {}",
            payload.body
        );
        Ok(())
    }
}

/// POSTs notifications to a webhook from a background task
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl NotificationDispatch for WebhookNotifier {
    fn notify_new_post(
        &self,
        group_id: Uuid,
        excluded_user_id: Uuid,
        post_id: &str,
        author_name: &str,
    ) -> anyhow::Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| anyhow!("No tokio runtime to deliver webhook on"))?;

        let payload = NewPostNotification::new(group_id, excluded_user_id, post_id, author_name);
        let client = self.client.clone();
        let url = self.url.clone();

        handle.spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(post_id = %payload.post_id, "Webhook notification delivered");
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), url = %url, "Webhook rejected notification");
                }
                Err(e) => {
                    warn!(error = %e, url = %url, "Webhook notification failed");
                }
            }
        });

        Ok(())
    }
}
