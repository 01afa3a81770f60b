//! Slack channel notifications (`chat.postMessage`)

use crate::error::{IntegrationError, IntegrationResult};
use crate::http::{build_client, endpoint, handle_response};
use crate::Notifier;
use agent_runtime::{env_or, require_env};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
    pub base_url: String,
}

impl SlackConfig {
    /// `SLACK_BOT_TOKEN`, `SLACK_CHANNEL_ID`, optional `SLACK_API_URL`
    pub fn from_env() -> IntegrationResult<Self> {
        Ok(SlackConfig {
            bot_token: require_env("SLACK_BOT_TOKEN")?,
            channel_id: require_env("SLACK_CHANNEL_ID")?,
            base_url: env_or("SLACK_API_URL", "https://slack.com/api"),
        })
    }
}

/// Slack answers 200 with `ok: false` for most failures
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct SlackNotifier {
    config: Arc<SlackConfig>,
    http_client: Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig) -> IntegrationResult<Self> {
        Ok(SlackNotifier {
            config: Arc::new(config),
            http_client: build_client()?,
        })
    }

    pub fn from_env() -> IntegrationResult<Self> {
        Self::new(SlackConfig::from_env()?)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, text: &str) -> IntegrationResult<()> {
        let url = endpoint(&self.config.base_url, &["chat.postMessage"])?;
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.config.bot_token)
            .json(&json!({
                "channel": self.config.channel_id,
                "text": text,
            }))
            .send()
            .await?;

        let body: SlackResponse = handle_response(response).await?;
        if !body.ok {
            return Err(IntegrationError::Api {
                status: 200,
                message: body.error.unwrap_or_else(|| "unknown_error".to_string()),
            });
        }

        tracing::debug!(channel = %self.config.channel_id, "Slack message posted");
        Ok(())
    }
}
