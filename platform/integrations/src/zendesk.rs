//! Zendesk Support API v2

use crate::error::IntegrationResult;
use crate::http::{build_client, endpoint, handle_empty};
use crate::Helpdesk;
use agent_runtime::require_env;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ZendeskConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
}

impl ZendeskConfig {
    /// `ZENDESK_SUBDOMAIN`, `ZENDESK_EMAIL`, `ZENDESK_API_TOKEN`;
    /// `ZENDESK_API_URL` overrides the subdomain-derived base
    pub fn from_env() -> IntegrationResult<Self> {
        let base_url = match std::env::var("ZENDESK_API_URL") {
            Ok(url) => url,
            Err(_) => {
                let subdomain = require_env("ZENDESK_SUBDOMAIN")?;
                format!("https://{}.zendesk.com/api/v2", subdomain)
            }
        };
        Ok(ZendeskConfig {
            base_url,
            email: require_env("ZENDESK_EMAIL")?,
            api_token: require_env("ZENDESK_API_TOKEN")?,
        })
    }
}

#[derive(Clone)]
pub struct ZendeskClient {
    config: Arc<ZendeskConfig>,
    http_client: Client,
}

impl ZendeskClient {
    pub fn new(config: ZendeskConfig) -> IntegrationResult<Self> {
        Ok(ZendeskClient {
            config: Arc::new(config),
            http_client: build_client()?,
        })
    }

    pub fn from_env() -> IntegrationResult<Self> {
        Self::new(ZendeskConfig::from_env()?)
    }
}

#[async_trait]
impl Helpdesk for ZendeskClient {
    async fn close_ticket(&self, ticket_id: &str, comment: &str) -> IntegrationResult<()> {
        let file = format!("{}.json", ticket_id);
        let url = endpoint(&self.config.base_url, &["tickets", &file])?;
        let response = self
            .http_client
            .put(url)
            // API-token auth: "<email>/token" as the user name
            .basic_auth(format!("{}/token", self.config.email), Some(&self.config.api_token))
            .json(&json!({
                "ticket": {
                    "status": "closed",
                    "comment": { "body": comment },
                }
            }))
            .send()
            .await?;

        handle_empty(response).await?;
        tracing::info!(ticket_id = %ticket_id, "Zendesk ticket closed");
        Ok(())
    }
}
