//! Jira Cloud REST v3: task creation and the "recently changed" search

use crate::error::IntegrationResult;
use crate::http::{build_client, endpoint, handle_response};
use crate::{IssueTracker, TrackedIssue};
use agent_runtime::require_env;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub email: String,
    pub api_token: String,
    pub project_key: String,
}

impl JiraConfig {
    /// `JIRA_BASE_URL`, `JIRA_EMAIL`, `JIRA_API_TOKEN`, `JIRA_PROJECT_KEY`
    pub fn from_env() -> IntegrationResult<Self> {
        Ok(JiraConfig {
            base_url: require_env("JIRA_BASE_URL")?,
            email: require_env("JIRA_EMAIL")?,
            api_token: require_env("JIRA_API_TOKEN")?,
            project_key: require_env("JIRA_PROJECT_KEY")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    assignee: Option<Assignee>,
    #[serde(default)]
    status: Option<Status>,
    #[serde(default)]
    duedate: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct Assignee {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    name: String,
}

/// Plain text as an Atlassian Document Format paragraph
fn adf_paragraph(text: &str) -> Value {
    json!({
        "type": "doc",
        "version": 1,
        "content": [{
            "type": "paragraph",
            "content": [{ "type": "text", "text": text }],
        }],
    })
}

#[derive(Clone)]
pub struct JiraClient {
    config: Arc<JiraConfig>,
    http_client: Client,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> IntegrationResult<Self> {
        Ok(JiraClient {
            config: Arc::new(config),
            http_client: build_client()?,
        })
    }

    pub fn from_env() -> IntegrationResult<Self> {
        Self::new(JiraConfig::from_env()?)
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn create_task(&self, summary: &str, description: &str) -> IntegrationResult<String> {
        let url = endpoint(&self.config.base_url, &["rest", "api", "3", "issue"])?;
        let response = self
            .http_client
            .post(url)
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .json(&json!({
                "fields": {
                    "project": { "key": self.config.project_key },
                    "summary": summary,
                    "description": adf_paragraph(description),
                    "issuetype": { "name": "Task" },
                }
            }))
            .send()
            .await?;

        let created: CreatedIssue = handle_response(response).await?;
        tracing::info!(issue = %created.key, "Jira task created");
        Ok(created.key)
    }

    async fn changed_issues(&self) -> IntegrationResult<Vec<TrackedIssue>> {
        let url = endpoint(&self.config.base_url, &["rest", "api", "3", "search"])?;
        let jql = format!("project = {} AND status changed", self.config.project_key);
        let response = self
            .http_client
            .get(url)
            .basic_auth(&self.config.email, Some(&self.config.api_token))
            .query(&[
                ("jql", jql.as_str()),
                ("fields", "summary,assignee,status,duedate"),
            ])
            .send()
            .await?;

        let found: SearchResponse = handle_response(response).await?;
        Ok(found
            .issues
            .into_iter()
            .map(|issue| TrackedIssue {
                key: issue.key,
                summary: issue.fields.summary,
                assignee: issue.fields.assignee.map(|a| a.display_name),
                status: issue
                    .fields
                    .status
                    .map(|s| s.name)
                    .unwrap_or_default(),
                due_date: issue.fields.duedate,
            })
            .collect())
    }
}
