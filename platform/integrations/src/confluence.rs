//! Confluence content API (storage-format pages)

use crate::error::IntegrationResult;
use crate::http::{build_client, endpoint, handle_response};
use crate::{Wiki, WikiPage};
use agent_runtime::require_env;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ConfluenceConfig {
    pub base_url: String,
    pub user_email: String,
    pub api_token: String,
}

impl ConfluenceConfig {
    /// `CONFLUENCE_BASE_URL`, `CONFLUENCE_USER_EMAIL`, `CONFLUENCE_API_TOKEN`
    pub fn from_env() -> IntegrationResult<Self> {
        Ok(ConfluenceConfig {
            base_url: require_env("CONFLUENCE_BASE_URL")?,
            user_email: require_env("CONFLUENCE_USER_EMAIL")?,
            api_token: require_env("CONFLUENCE_API_TOKEN")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ContentSearch {
    #[serde(default)]
    results: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    id: String,
    #[serde(default)]
    version: Option<Version>,
}

#[derive(Debug, Deserialize)]
struct Version {
    number: u32,
}

fn page_body(space: &str, title: &str, storage: &str) -> Value {
    json!({
        "type": "page",
        "title": title,
        "space": { "key": space },
        "body": {
            "storage": {
                "value": storage,
                "representation": "storage",
            }
        },
    })
}

#[derive(Clone)]
pub struct ConfluenceClient {
    config: Arc<ConfluenceConfig>,
    http_client: Client,
}

impl ConfluenceClient {
    pub fn new(config: ConfluenceConfig) -> IntegrationResult<Self> {
        Ok(ConfluenceClient {
            config: Arc::new(config),
            http_client: build_client()?,
        })
    }

    pub fn from_env() -> IntegrationResult<Self> {
        Self::new(ConfluenceConfig::from_env()?)
    }
}

#[async_trait]
impl Wiki for ConfluenceClient {
    async fn find_page(&self, space: &str, title: &str) -> IntegrationResult<Option<WikiPage>> {
        let url = endpoint(&self.config.base_url, &["rest", "api", "content"])?;
        let response = self
            .http_client
            .get(url)
            .basic_auth(&self.config.user_email, Some(&self.config.api_token))
            .query(&[("title", title), ("spaceKey", space), ("expand", "version")])
            .send()
            .await?;

        let found: ContentSearch = handle_response(response).await?;
        Ok(found.results.into_iter().next().map(|item| WikiPage {
            id: item.id,
            version: item.version.map(|v| v.number).unwrap_or(1),
        }))
    }

    async fn create_page(&self, space: &str, title: &str, storage: &str) -> IntegrationResult<String> {
        let url = endpoint(&self.config.base_url, &["rest", "api", "content"])?;
        let response = self
            .http_client
            .post(url)
            .basic_auth(&self.config.user_email, Some(&self.config.api_token))
            .json(&page_body(space, title, storage))
            .send()
            .await?;

        let created: ContentItem = handle_response(response).await?;
        tracing::info!(page_id = %created.id, title = %title, "Confluence page created");
        Ok(created.id)
    }

    async fn update_page(
        &self,
        page: &WikiPage,
        space: &str,
        title: &str,
        storage: &str,
    ) -> IntegrationResult<()> {
        let url = endpoint(&self.config.base_url, &["rest", "api", "content", &page.id])?;
        let mut body = page_body(space, title, storage);
        body["id"] = json!(page.id);
        body["version"] = json!({ "number": page.version + 1 });

        let response = self
            .http_client
            .put(url)
            .basic_auth(&self.config.user_email, Some(&self.config.api_token))
            .json(&body)
            .send()
            .await?;

        let _: Value = handle_response(response).await?;
        tracing::info!(page_id = %page.id, version = page.version + 1, "Confluence page updated");
        Ok(())
    }
}
