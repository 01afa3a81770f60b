//! GitHub REST API: issues, workflow dispatch, branches, contents, pulls

use crate::error::{IntegrationError, IntegrationResult};
use crate::http::{build_client, endpoint, handle_empty, handle_response};
use crate::{CodeHost, CreatedIssue, RepoFile};
use agent_runtime::{env_or, require_env};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub base_url: String,
    /// GitHub rejects requests without a User-Agent
    pub user_agent: String,
}

impl GitHubConfig {
    /// `GITHUB_TOKEN`, `GITHUB_REPO_OWNER`, `GITHUB_REPO_NAME`, optional `GITHUB_API_URL`
    pub fn from_env(user_agent: &str) -> IntegrationResult<Self> {
        Ok(GitHubConfig {
            token: require_env("GITHUB_TOKEN")?,
            owner: require_env("GITHUB_REPO_OWNER")?,
            repo: require_env("GITHUB_REPO_NAME")?,
            base_url: env_or("GITHUB_API_URL", "https://api.github.com"),
            user_agent: user_agent.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: CommitRef,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    html_url: String,
}

#[derive(Clone)]
pub struct GitHubClient {
    config: Arc<GitHubConfig>,
    http_client: Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> IntegrationResult<Self> {
        Ok(GitHubClient {
            config: Arc::new(config),
            http_client: build_client()?,
        })
    }

    pub fn from_env(user_agent: &str) -> IntegrationResult<Self> {
        Self::new(GitHubConfig::from_env(user_agent)?)
    }

    /// `/repos/{owner}/{repo}/...`
    fn repo_url(&self, path: &[&str]) -> IntegrationResult<Url> {
        let mut segments = vec!["repos", self.config.owner.as_str(), self.config.repo.as_str()];
        segments.extend_from_slice(path);
        endpoint(&self.config.base_url, &segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.config.user_agent)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

/// Repository file paths keep their `/` separators as path segments
fn content_path(path: &str) -> Vec<&str> {
    let mut segments = vec!["contents"];
    segments.extend(path.split('/').filter(|s| !s.is_empty()));
    segments
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignees: &[String],
        labels: &[String],
    ) -> IntegrationResult<CreatedIssue> {
        let url = self.repo_url(&["issues"])?;
        let response = self
            .authorized(self.http_client.post(url))
            .json(&json!({
                "title": title,
                "body": body,
                "assignees": assignees,
                "labels": labels,
            }))
            .send()
            .await?;

        let issue: IssueResponse = handle_response(response).await?;
        tracing::info!(number = issue.number, url = %issue.html_url, "GitHub issue created");
        Ok(CreatedIssue {
            number: issue.number,
            url: issue.html_url,
        })
    }

    async fn dispatch_workflow(
        &self,
        workflow: &str,
        git_ref: &str,
        inputs: &Value,
    ) -> IntegrationResult<()> {
        let url = self.repo_url(&["actions", "workflows", workflow, "dispatches"])?;
        let response = self
            .authorized(self.http_client.post(url))
            .json(&json!({ "ref": git_ref, "inputs": inputs }))
            .send()
            .await?;

        handle_empty(response).await?;
        tracing::info!(workflow = %workflow, git_ref = %git_ref, "Workflow dispatched");
        Ok(())
    }

    async fn branch_head(&self, branch: &str) -> IntegrationResult<String> {
        let url = self.repo_url(&["branches", branch])?;
        let response = self.authorized(self.http_client.get(url)).send().await?;
        let branch: BranchResponse = handle_response(response).await?;
        Ok(branch.commit.sha)
    }

    async fn create_branch(&self, name: &str, sha: &str) -> IntegrationResult<()> {
        let url = self.repo_url(&["git", "refs"])?;
        let response = self
            .authorized(self.http_client.post(url))
            .json(&json!({ "ref": format!("refs/heads/{}", name), "sha": sha }))
            .send()
            .await?;
        handle_empty(response).await
    }

    async fn get_file(&self, path: &str, git_ref: &str) -> IntegrationResult<Option<RepoFile>> {
        let url = self.repo_url(&content_path(path))?;
        let response = self
            .authorized(self.http_client.get(url))
            .query(&[("ref", git_ref)])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let file: ContentResponse = handle_response(response).await?;
        // The API wraps base64 at 60 columns
        let packed: String = file.content.split_whitespace().collect();
        let bytes = STANDARD
            .decode(packed)
            .map_err(|e| IntegrationError::Parse(format!("file content is not base64: {}", e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| IntegrationError::Parse(format!("file content is not UTF-8: {}", e)))?;

        Ok(Some(RepoFile {
            content,
            sha: file.sha,
        }))
    }

    async fn put_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> IntegrationResult<()> {
        let url = self.repo_url(&content_path(path))?;
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": branch,
        });
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let response = self
            .authorized(self.http_client.put(url))
            .json(&body)
            .send()
            .await?;
        handle_empty(response).await
    }

    async fn open_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> IntegrationResult<String> {
        let url = self.repo_url(&["pulls"])?;
        let response = self
            .authorized(self.http_client.post(url))
            .json(&json!({
                "title": title,
                "head": head,
                "base": base,
                "body": body,
            }))
            .send()
            .await?;

        let pull: PullResponse = handle_response(response).await?;
        tracing::info!(url = %pull.html_url, "Pull request opened");
        Ok(pull.html_url)
    }
}
