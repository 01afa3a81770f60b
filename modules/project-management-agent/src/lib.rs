//! # Project Management Agent
//!
//! - `client_email_received` mentioning a scheduled meeting opens a
//!   follow-up task in the tracker and records it.
//! - The sync trigger (`PM_SYNC_CRON`, hourly by default) pulls issues
//!   whose status changed and mirrors them onto the stored tasks.
//!
//! Records carry the tracker project key as their project id.

use agent_runtime::{parse_data_product, tag, HandlerError, HandlerRegistry, MetricsSink};
use agent_store::{ProjectManagementRecord, RecordStore, TaskUpdate};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use integrations::{IssueTracker, TrackedIssue};
use platform_contracts::payloads::ClientCommunication;
use platform_contracts::{agents, now_millis, task_slug, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::PROJECT_MANAGEMENT;

pub const DEFAULT_SYNC_CRON: &str = "0 * * * *";

/// Project manager who owns follow-up tasks
pub const FOLLOW_UP_ASSIGNEE: &str = "employee-004";

const FOLLOW_UP_DAYS: i64 = 14;
const DEFAULT_DUE_DAYS: i64 = 7;

pub fn mentions_scheduled_meeting(message: &str) -> bool {
    message.to_lowercase().contains("meeting scheduled")
}

/// Deadline for a synced issue: its due date at midnight UTC, else a week out
pub fn issue_deadline(issue: &TrackedIssue, now: DateTime<Utc>) -> DateTime<Utc> {
    issue
        .due_date
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or_else(|| now + Duration::days(DEFAULT_DUE_DAYS))
}

pub struct ProjectManagementAgent {
    pub store: Arc<dyn RecordStore>,
    pub tracker: Arc<dyn IssueTracker>,
    /// Tracker project key, stored as the record's project id
    pub project_key: String,
    pub metrics: Arc<dyn MetricsSink>,
}

impl ProjectManagementAgent {
    pub async fn on_email_received(&self, communication: ClientCommunication) -> Result<(), HandlerError> {
        tracing::info!(client_id = %communication.client_id, "Processing client email");

        if !mentions_scheduled_meeting(&communication.message) {
            tracing::debug!(client_id = %communication.client_id, "No scheduled meeting mentioned");
            return Ok(());
        }
        self.create_follow_up(&communication.client_id, &communication.message)
            .await
    }

    async fn create_follow_up(&self, client_id: &str, message: &str) -> Result<(), HandlerError> {
        let summary = format!("Follow-up Meeting with Client {}", client_id);
        let description = format!(
            "A meeting has been scheduled with client {}. Details: {}",
            client_id, message
        );

        let key = self.tracker.create_task(&summary, &description).await?;
        tracing::info!(issue = %key, client_id = %client_id, "Follow-up task created");

        self.store
            .insert_project_management(&ProjectManagementRecord {
                project_id: self.project_key.clone(),
                task: summary,
                assigned_to: FOLLOW_UP_ASSIGNEE.to_string(),
                status: "To Do".to_string(),
                deadline: Utc::now() + Duration::days(FOLLOW_UP_DAYS),
                timestamp: now_millis(),
            })
            .await?;

        self.metrics.gauge(
            "ai_agent.project_management.tasks_created",
            1.0,
            &[tag("agent", AGENT), tag("project", &self.project_key)],
        );
        Ok(())
    }

    /// Mirror changed tracker issues onto stored tasks; returns how many were synced
    pub async fn sync_updates(&self) -> Result<usize, HandlerError> {
        tracing::info!("Fetching project updates from tracker");
        let issues = self.tracker.changed_issues().await?;
        let now = Utc::now();

        for issue in &issues {
            let task_id = task_slug(&issue.summary);
            let assigned_to = issue
                .assignee
                .clone()
                .unwrap_or_else(|| "Unassigned".to_string());
            let deadline = issue_deadline(issue, now);

            let update = TaskUpdate {
                task_id: task_id.clone(),
                status: issue.status.clone(),
                assigned_to: assigned_to.clone(),
                deadline,
            };
            if !self.store.update_task(&update).await? {
                tracing::warn!(task_id = %task_id, issue = %issue.key, "No stored task for issue");
            }

            self.store
                .insert_project_management(&ProjectManagementRecord {
                    project_id: self.project_key.clone(),
                    task: issue.summary.clone(),
                    assigned_to,
                    status: issue.status.clone(),
                    deadline,
                    timestamp: now_millis(),
                })
                .await?;

            self.metrics.gauge(
                "ai_agent.project_management.tasks_updated",
                1.0,
                &[tag("agent", AGENT), tag("project", &self.project_key)],
            );
        }

        tracing::info!(synced = issues.len(), "Project tasks updated");
        Ok(issues.len())
    }
}

pub fn registry(agent: Arc<ProjectManagementAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::ClientEmailReceived, move |data| {
        let agent = agent.clone();
        async move {
            let product = parse_data_product::<ClientCommunication>(data)?;
            agent.on_email_received(product.payload).await
        }
    });
    registry
}
