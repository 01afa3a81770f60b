//! Recording fakes for handler tests
//!
//! Each fake records what it was asked to do and can be switched into a
//! failing mode (`failing(status)`) that answers every call with
//! [`IntegrationError::Api`].

use crate::error::{IntegrationError, IntegrationResult};
use crate::{
    Calendar, CalendarEvent, CodeHost, CreatedIssue, Helpdesk, IssueTracker, LogMonitor, Mailer,
    Notifier, RepoFile, TestRunner, TrackedIssue, Wiki, WikiPage,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(fail: Option<u16>) -> IntegrationResult<()> {
    match fail {
        Some(status) => Err(IntegrationError::Api {
            status,
            message: "injected failure".to_string(),
        }),
        None => Ok(()),
    }
}

// ============================================================================
// Notifier / Mailer / Calendar
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: Option<u16>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        RecordingNotifier {
            fail: Some(status),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        guard(&self.messages).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> IntegrationResult<()> {
        injected(self.fail)?;
        guard(&self.messages).push(text.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    fail: Option<u16>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        RecordingMailer {
            fail: Some(status),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        guard(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> IntegrationResult<()> {
        injected(self.fail)?;
        guard(&self.sent).push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingCalendar {
    events: Mutex<Vec<CalendarEvent>>,
}

impl RecordingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        guard(&self.events).clone()
    }
}

#[async_trait]
impl Calendar for RecordingCalendar {
    async fn create_event(&self, event: &CalendarEvent) -> IntegrationResult<String> {
        let mut events = guard(&self.events);
        events.push(event.clone());
        Ok(format!("https://calendar.test/event/{}", events.len()))
    }
}

// ============================================================================
// IssueTracker
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeIssueTracker {
    created: Mutex<Vec<(String, String)>>,
    changed: Vec<TrackedIssue>,
    fail: Option<u16>,
}

impl FakeIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues returned by every `changed_issues` call
    pub fn with_changed(mut self, issues: Vec<TrackedIssue>) -> Self {
        self.changed = issues;
        self
    }

    pub fn failing(status: u16) -> Self {
        FakeIssueTracker {
            fail: Some(status),
            ..Self::default()
        }
    }

    /// `(summary, description)` of each created task
    pub fn created(&self) -> Vec<(String, String)> {
        guard(&self.created).clone()
    }
}

#[async_trait]
impl IssueTracker for FakeIssueTracker {
    async fn create_task(&self, summary: &str, description: &str) -> IntegrationResult<String> {
        injected(self.fail)?;
        let mut created = guard(&self.created);
        created.push((summary.to_string(), description.to_string()));
        Ok(format!("PROJ-{}", created.len()))
    }

    async fn changed_issues(&self) -> IntegrationResult<Vec<TrackedIssue>> {
        injected(self.fail)?;
        Ok(self.changed.clone())
    }
}

// ============================================================================
// CodeHost
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CodeHostCall {
    CreateIssue {
        title: String,
        body: String,
        assignees: Vec<String>,
        labels: Vec<String>,
    },
    DispatchWorkflow {
        workflow: String,
        git_ref: String,
        inputs: Value,
    },
    CreateBranch {
        name: String,
        sha: String,
    },
    PutFile {
        path: String,
        branch: String,
        message: String,
        content: String,
        sha: Option<String>,
    },
    OpenPullRequest {
        title: String,
        head: String,
        base: String,
        body: String,
    },
}

/// Single-repository fake; files are shared across refs
#[derive(Debug, Default)]
pub struct FakeCodeHost {
    calls: Mutex<Vec<CodeHostCall>>,
    files: Mutex<BTreeMap<String, RepoFile>>,
    fail: Option<u16>,
}

impl FakeCodeHost {
    pub const HEAD_SHA: &'static str = "0000000000000000000000000000000000000abc";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        FakeCodeHost {
            fail: Some(status),
            ..Self::default()
        }
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        guard(&self.files).insert(
            path.to_string(),
            RepoFile {
                content: content.to_string(),
                sha: format!("sha-{}", path),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<CodeHostCall> {
        guard(&self.calls).clone()
    }

    pub fn file(&self, path: &str) -> Option<RepoFile> {
        guard(&self.files).get(path).cloned()
    }

    pub fn dispatches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CodeHostCall::DispatchWorkflow { .. }))
            .count()
    }

    fn record(&self, call: CodeHostCall) {
        guard(&self.calls).push(call);
    }
}

#[async_trait]
impl CodeHost for FakeCodeHost {
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        assignees: &[String],
        labels: &[String],
    ) -> IntegrationResult<CreatedIssue> {
        injected(self.fail)?;
        self.record(CodeHostCall::CreateIssue {
            title: title.to_string(),
            body: body.to_string(),
            assignees: assignees.to_vec(),
            labels: labels.to_vec(),
        });
        let number = self
            .calls()
            .iter()
            .filter(|c| matches!(c, CodeHostCall::CreateIssue { .. }))
            .count() as u64;
        Ok(CreatedIssue {
            number,
            url: format!("https://github.test/acme/app/issues/{}", number),
        })
    }

    async fn dispatch_workflow(&self, workflow: &str, git_ref: &str, inputs: &Value) -> IntegrationResult<()> {
        injected(self.fail)?;
        self.record(CodeHostCall::DispatchWorkflow {
            workflow: workflow.to_string(),
            git_ref: git_ref.to_string(),
            inputs: inputs.clone(),
        });
        Ok(())
    }

    async fn branch_head(&self, _branch: &str) -> IntegrationResult<String> {
        injected(self.fail)?;
        Ok(Self::HEAD_SHA.to_string())
    }

    async fn create_branch(&self, name: &str, sha: &str) -> IntegrationResult<()> {
        injected(self.fail)?;
        self.record(CodeHostCall::CreateBranch {
            name: name.to_string(),
            sha: sha.to_string(),
        });
        Ok(())
    }

    async fn get_file(&self, path: &str, _git_ref: &str) -> IntegrationResult<Option<RepoFile>> {
        injected(self.fail)?;
        Ok(self.file(path))
    }

    async fn put_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
        sha: Option<&str>,
    ) -> IntegrationResult<()> {
        injected(self.fail)?;
        self.record(CodeHostCall::PutFile {
            path: path.to_string(),
            branch: branch.to_string(),
            message: message.to_string(),
            content: content.to_string(),
            sha: sha.map(str::to_string),
        });
        guard(&self.files).insert(
            path.to_string(),
            RepoFile {
                content: content.to_string(),
                sha: format!("sha-{}-{}", path, branch),
            },
        );
        Ok(())
    }

    async fn open_pull_request(&self, title: &str, head: &str, base: &str, body: &str) -> IntegrationResult<String> {
        injected(self.fail)?;
        self.record(CodeHostCall::OpenPullRequest {
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
            body: body.to_string(),
        });
        Ok("https://github.test/acme/app/pull/1".to_string())
    }
}

// ============================================================================
// Helpdesk / Wiki / LogMonitor / TestRunner
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingHelpdesk {
    closed: Mutex<Vec<(String, String)>>,
    fail: Option<u16>,
}

impl RecordingHelpdesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        RecordingHelpdesk {
            fail: Some(status),
            ..Self::default()
        }
    }

    /// `(ticket_id, comment)` per close call
    pub fn closed(&self) -> Vec<(String, String)> {
        guard(&self.closed).clone()
    }
}

#[async_trait]
impl Helpdesk for RecordingHelpdesk {
    async fn close_ticket(&self, ticket_id: &str, comment: &str) -> IntegrationResult<()> {
        injected(self.fail)?;
        guard(&self.closed).push((ticket_id.to_string(), comment.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPage {
    pub page: WikiPage,
    pub space: String,
    pub storage: String,
}

/// Pages keyed by title
#[derive(Debug, Default)]
pub struct FakeWiki {
    pages: Mutex<BTreeMap<String, StoredPage>>,
    fail: Option<u16>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(status: u16) -> Self {
        FakeWiki {
            fail: Some(status),
            ..Self::default()
        }
    }

    pub fn with_page(self, space: &str, title: &str, id: &str, version: u32) -> Self {
        guard(&self.pages).insert(
            title.to_string(),
            StoredPage {
                page: WikiPage {
                    id: id.to_string(),
                    version,
                },
                space: space.to_string(),
                storage: String::new(),
            },
        );
        self
    }

    pub fn page(&self, title: &str) -> Option<StoredPage> {
        guard(&self.pages).get(title).cloned()
    }

    pub fn page_count(&self) -> usize {
        guard(&self.pages).len()
    }
}

#[async_trait]
impl Wiki for FakeWiki {
    async fn find_page(&self, space: &str, title: &str) -> IntegrationResult<Option<WikiPage>> {
        injected(self.fail)?;
        Ok(guard(&self.pages)
            .get(title)
            .filter(|stored| stored.space == space)
            .map(|stored| stored.page.clone()))
    }

    async fn create_page(&self, space: &str, title: &str, storage: &str) -> IntegrationResult<String> {
        injected(self.fail)?;
        let mut pages = guard(&self.pages);
        let id = format!("{}", 1000 + pages.len());
        pages.insert(
            title.to_string(),
            StoredPage {
                page: WikiPage {
                    id: id.clone(),
                    version: 1,
                },
                space: space.to_string(),
                storage: storage.to_string(),
            },
        );
        Ok(id)
    }

    async fn update_page(&self, page: &WikiPage, space: &str, title: &str, storage: &str) -> IntegrationResult<()> {
        injected(self.fail)?;
        guard(&self.pages).insert(
            title.to_string(),
            StoredPage {
                page: WikiPage {
                    id: page.id.clone(),
                    version: page.version + 1,
                },
                space: space.to_string(),
                storage: storage.to_string(),
            },
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeLogMonitor {
    matches: usize,
    queries: Mutex<Vec<String>>,
    fail: Option<u16>,
}

impl FakeLogMonitor {
    /// Every query matches `matches` events (before the limit)
    pub fn with_matches(matches: usize) -> Self {
        FakeLogMonitor {
            matches,
            ..Self::default()
        }
    }

    pub fn failing(status: u16) -> Self {
        FakeLogMonitor {
            fail: Some(status),
            ..Self::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        guard(&self.queries).clone()
    }
}

#[async_trait]
impl LogMonitor for FakeLogMonitor {
    async fn count_logs(&self, query: &str, _from: &str, _to: &str, limit: u32) -> IntegrationResult<usize> {
        guard(&self.queries).push(query.to_string());
        injected(self.fail)?;
        Ok(self.matches.min(limit as usize))
    }
}

#[derive(Debug)]
pub struct FakeTestRunner {
    passes: bool,
    runs: Mutex<Vec<String>>,
}

impl FakeTestRunner {
    pub fn passing() -> Self {
        FakeTestRunner {
            passes: true,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        FakeTestRunner {
            passes: false,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<String> {
        guard(&self.runs).clone()
    }
}

#[async_trait]
impl TestRunner for FakeTestRunner {
    async fn run_tests(&self, task_id: &str) -> bool {
        guard(&self.runs).push(task_id.to_string());
        self.passes
    }
}
