use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use crate::config::FcmConfig;
use crate::error::Error;

pub const COMPLETION_TITLE: &str = "Posture analysis complete!";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), Error>;
}

/// Title and body announcing a finished report.
pub fn completion_message(created_at: DateTime<Utc>) -> (String, String) {
    let body = format!(
        "Your report measured on {} has arrived!",
        created_at.format("%Y-%m-%d")
    );
    (COMPLETION_TITLE.to_string(), body)
}

/// Firebase Cloud Messaging HTTP v1 sender.
pub struct FcmNotifier {
    client: reqwest::Client,
    config: FcmConfig,
}

impl FcmNotifier {
    pub fn new(config: FcmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn send_url(&self) -> String {
        format!(
            "{}/projects/{}/messages:send",
            self.config.endpoint.as_str().trim_end_matches('/'),
            self.config.project_id
        )
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), Error> {
        let message = json!({
            "message": {
                "token": token,
                "notification": { "title": title, "body": body },
                "data": { "title": title, "body": body },
            }
        });

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(&self.config.access_token)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!("FCM returned {status}: {detail}")));
        }
        Ok(())
    }
}

/// Used when no push credentials are configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, token: &str, title: &str, body: &str) -> Result<(), Error> {
        if token.is_empty() {
            warn!(title, "user has no push token, notification dropped");
        } else {
            info!(title, body, "push credentials not configured, notification logged only");
        }
        Ok(())
    }
}
