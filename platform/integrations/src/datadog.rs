//! Datadog Logs search (API v2)

use crate::error::IntegrationResult;
use crate::http::{build_client, endpoint, handle_response};
use crate::LogMonitor;
use agent_runtime::{env_or, require_env};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct DatadogConfig {
    pub api_key: String,
    pub app_key: String,
    pub base_url: String,
}

impl DatadogConfig {
    /// `DATADOG_API_KEY`, `DATADOG_APP_KEY`; `DATADOG_SITE` (default
    /// `datadoghq.com`) picks the regional API host
    pub fn from_env() -> IntegrationResult<Self> {
        let site = env_or("DATADOG_SITE", "datadoghq.com");
        Ok(DatadogConfig {
            api_key: require_env("DATADOG_API_KEY")?,
            app_key: require_env("DATADOG_APP_KEY")?,
            base_url: env_or("DATADOG_API_URL", &format!("https://api.{}", site)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LogsPage {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Clone)]
pub struct DatadogLogs {
    config: Arc<DatadogConfig>,
    http_client: Client,
}

impl DatadogLogs {
    pub fn new(config: DatadogConfig) -> IntegrationResult<Self> {
        Ok(DatadogLogs {
            config: Arc::new(config),
            http_client: build_client()?,
        })
    }

    pub fn from_env() -> IntegrationResult<Self> {
        Self::new(DatadogConfig::from_env()?)
    }
}

#[async_trait]
impl LogMonitor for DatadogLogs {
    async fn count_logs(&self, query: &str, from: &str, to: &str, limit: u32) -> IntegrationResult<usize> {
        let url = endpoint(&self.config.base_url, &["api", "v2", "logs", "events", "search"])?;
        let response = self
            .http_client
            .post(url)
            .header("DD-API-KEY", &self.config.api_key)
            .header("DD-APPLICATION-KEY", &self.config.app_key)
            .json(&json!({
                "filter": { "query": query, "from": from, "to": to },
                "sort": "-timestamp",
                "page": { "limit": limit },
            }))
            .send()
            .await?;

        let page: LogsPage = handle_response(response).await?;
        tracing::debug!(query = %query, matched = page.data.len(), "Datadog logs searched");
        Ok(page.data.len())
    }
}
