//! # Vendor Integrations
//!
//! Every outside service an agent talks to sits behind a trait here, so
//! handlers depend on the capability (`Notifier`, `CodeHost`, ...) and tests
//! swap in the recording fakes from [`testing`].
//!
//! | Trait | Implementation | Service |
//! |---|---|---|
//! | [`Notifier`] | [`SlackNotifier`] | Slack `chat.postMessage` |
//! | [`Mailer`] | [`GoogleWorkspace`] | Gmail `messages.send` |
//! | [`Calendar`] | [`GoogleWorkspace`] | Google Calendar `events.insert` |
//! | [`IssueTracker`] | [`JiraClient`] | Jira Cloud REST v3 |
//! | [`CodeHost`] | [`GitHubClient`] | GitHub REST |
//! | [`Helpdesk`] | [`ZendeskClient`] | Zendesk Support v2 |
//! | [`Wiki`] | [`ConfluenceClient`] | Confluence content API |
//! | [`LogMonitor`] | [`DatadogLogs`] | Datadog Logs search v2 |
//! | [`TestRunner`] | [`CommandTestRunner`] | local process |
//!
//! HTTP clients share a 30 s timeout; any non-2xx answer becomes
//! [`IntegrationError::Api`] carrying the status and body.

pub mod confluence;
pub mod datadog;
pub mod error;
pub mod github;
pub mod google;
mod http;
pub mod jira;
pub mod slack;
pub mod test_runner;
pub mod testing;
pub mod zendesk;

pub use confluence::{ConfluenceClient, ConfluenceConfig};
pub use datadog::{DatadogConfig, DatadogLogs};
pub use error::{IntegrationError, IntegrationResult};
pub use github::{GitHubClient, GitHubConfig};
pub use google::{CalendarEvent, GoogleConfig, GoogleWorkspace, Reminder};
pub use jira::{JiraClient, JiraConfig};
pub use slack::{SlackConfig, SlackNotifier};
pub use test_runner::CommandTestRunner;
pub use zendesk::{ZendeskClient, ZendeskConfig};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

/// Team chat notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> IntegrationResult<()>;
}

/// Outgoing plain-text email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> IntegrationResult<()>;
}

#[async_trait]
pub trait Calendar: Send + Sync {
    /// Returns a link to (or the id of) the created event
    async fn create_event(&self, event: &CalendarEvent) -> IntegrationResult<String>;
}

/// An issue as seen by the project-tracking sync
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedIssue {
    pub key: String,
    pub summary: String,
    pub assignee: Option<String>,
    pub status: String,
    pub due_date: Option<NaiveDate>,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Create a task in the configured project; returns the issue key
    async fn create_task(&self, summary: &str, description: &str) -> IntegrationResult<String>;

    /// Issues of the configured project whose status changed
    async fn changed_issues(&self) -> IntegrationResult<Vec<TrackedIssue>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedIssue {
    pub number: u64,
    pub url: String,
}

/// A repository file, decoded
#[derive(Debug, Clone, PartialEq)]
pub struct RepoFile {
    pub content: String,
    pub sha: String,
}

/// Source hosting: issues, CI workflows, branches, files and pull requests
/// of one configured repository
#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignees: &[String],
        labels: &[String],
    ) -> IntegrationResult<CreatedIssue>;

    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str, inputs: &Value)
        -> IntegrationResult<()>;

    /// Commit sha at the tip of a branch
    async fn branch_head(&self, branch: &str) -> IntegrationResult<String>;

    async fn create_branch(&self, name: &str, sha: &str) -> IntegrationResult<()>;

    /// `None` when the file does not exist at that ref
    async fn get_file(&self, path: &str, git_ref: &str) -> IntegrationResult<Option<RepoFile>>;

    /// Create (`sha` = None) or update a file with one commit
    async fn put_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> IntegrationResult<()>;

    /// Returns the pull request URL
    async fn open_pull_request(&self, title: &str, head: &str, base: &str, body: &str)
        -> IntegrationResult<String>;
}

#[async_trait]
pub trait Helpdesk: Send + Sync {
    async fn close_ticket(&self, ticket_id: &str, comment: &str) -> IntegrationResult<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WikiPage {
    pub id: String,
    pub version: u32,
}

#[async_trait]
pub trait Wiki: Send + Sync {
    async fn find_page(&self, space: &str, title: &str) -> IntegrationResult<Option<WikiPage>>;

    /// `storage` is the page body in storage (XHTML) format; returns the page id
    async fn create_page(&self, space: &str, title: &str, storage: &str) -> IntegrationResult<String>;

    /// Replace the body, bumping the version past `page.version`
    async fn update_page(&self, page: &WikiPage, space: &str, title: &str, storage: &str)
        -> IntegrationResult<()>;
}

#[async_trait]
pub trait LogMonitor: Send + Sync {
    /// Number of log events matching `query` in `[from, to]` (relative
    /// times such as `now-1h`), capped at `limit`
    async fn count_logs(&self, query: &str, from: &str, to: &str, limit: u32) -> IntegrationResult<usize>;
}

#[async_trait]
pub trait TestRunner: Send + Sync {
    /// Whether the task's tests passed
    async fn run_tests(&self, task_id: &str) -> bool;
}
