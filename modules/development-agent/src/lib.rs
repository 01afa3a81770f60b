//! # Development Agent
//!
//! `project_management_task_created` -> GitHub issue labelled
//! `development`, then the development task (keyed by the task-text slug)
//! moves to `in-progress` with the issue URL attached. Terminal step.

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink};
use agent_store::RecordStore;
use integrations::CodeHost;
use platform_contracts::payloads::ProjectManagement;
use platform_contracts::{agents, task_slug, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::DEVELOPMENT;

pub const ISSUE_LABEL: &str = "development";
pub const IN_PROGRESS: &str = "in-progress";

pub struct DevelopmentAgent {
    pub store: Arc<dyn RecordStore>,
    pub code_host: Arc<dyn CodeHost>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl DevelopmentAgent {
    pub async fn on_task_created(&self, task: ProjectManagement) -> Result<(), HandlerError> {
        tracing::info!(project_id = %task.project_id, task = %task.task, "Handling new project task");

        let issue = self
            .code_host
            .create_issue(
                &task.task,
                &format!("Assigned to {}", task.assigned_to),
                std::slice::from_ref(&task.assigned_to),
                &[ISSUE_LABEL.to_string()],
            )
            .await?;
        self.metrics.gauge(
            "ai_agent.development.issues_created",
            1.0,
            &[tag("agent", AGENT), tag("issue", issue.number)],
        );

        let task_id = task_slug(&task.task);
        let updated = self
            .store
            .update_development_task(&task_id, IN_PROGRESS, Some(&issue.url))
            .await?;
        if !updated {
            tracing::warn!(task_id = %task_id, issue = issue.number, "No development task row for issue");
        }

        self.metrics.gauge(
            "ai_agent.development.tasks_updated",
            1.0,
            &[tag("agent", AGENT), tag("task", &task_id), tag("status", IN_PROGRESS)],
        );
        Ok(())
    }
}

pub fn registry(agent: Arc<DevelopmentAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::ProjectManagementTaskCreated, move |data| {
        let agent = agent.clone();
        async move { agent.on_task_created(parse_payload(data)?).await }
    });
    registry
}
