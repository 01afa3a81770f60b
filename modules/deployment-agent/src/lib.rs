//! # Deployment Agent
//!
//! Reacts to test outcomes:
//! - `testing_result_passed`: dispatch the deploy workflow for the task
//! - `testing_result_failed`: tell the team, record the halted deployment
//!
//! Both paths write a `deployment_info` row; neither publishes.

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink};
use agent_store::{DeploymentRecord, RecordStore};
use integrations::{CodeHost, Notifier};
use platform_contracts::payloads::TestOutcome;
use platform_contracts::{agents, now_millis, prefixed_id, EventType};
use serde_json::json;
use std::sync::Arc;

pub const AGENT: &str = agents::DEPLOYMENT;

pub const DEPLOY_WORKFLOW: &str = "deploy.yml";
pub const DEPLOY_REF: &str = "main";
pub const ENVIRONMENT: &str = "production";

pub struct DeploymentAgent {
    pub store: Arc<dyn RecordStore>,
    pub code_host: Arc<dyn CodeHost>,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl DeploymentAgent {
    pub async fn deploy(&self, outcome: TestOutcome) -> Result<(), HandlerError> {
        let task_id = outcome.task_id;
        tracing::info!(task_id = %task_id, "Triggering deployment");

        self.code_host
            .dispatch_workflow(DEPLOY_WORKFLOW, DEPLOY_REF, &json!({ "task_id": task_id }))
            .await?;

        self.record(&task_id, "triggered").await?;

        self.metrics.gauge(
            "ai_agent.deployment.deployments_triggered",
            1.0,
            &[tag("agent", AGENT), tag("task", &task_id)],
        );
        Ok(())
    }

    pub async fn halt(&self, outcome: TestOutcome) -> Result<(), HandlerError> {
        let task_id = outcome.task_id;
        tracing::warn!(task_id = %task_id, "Tests failed, deployment halted");

        self.notifier
            .notify(&format!(
                "Deployment halted for task {} due to failed tests.",
                task_id
            ))
            .await?;

        self.record(&task_id, "failed").await?;

        self.metrics.gauge(
            "ai_agent.deployment.deployments_failed",
            1.0,
            &[tag("agent", AGENT), tag("task", &task_id)],
        );
        Ok(())
    }

    async fn record(&self, task_id: &str, status: &str) -> Result<(), HandlerError> {
        let record = DeploymentRecord {
            deployment_id: prefixed_id("deploy"),
            task_id: task_id.to_string(),
            environment: ENVIRONMENT.to_string(),
            status: status.to_string(),
            timestamp: now_millis(),
        };
        self.store.insert_deployment(&record).await?;
        tracing::info!(
            deployment_id = %record.deployment_id,
            task_id = %task_id,
            status = %status,
            "Deployment recorded"
        );
        Ok(())
    }
}

pub fn registry(agent: Arc<DeploymentAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    let passed = agent.clone();
    registry.on(EventType::TestingResultPassed, move |data| {
        let agent = passed.clone();
        async move { agent.deploy(parse_payload(data)?).await }
    });

    let failed = agent;
    registry.on(EventType::TestingResultFailed, move |data| {
        let agent = failed.clone();
        async move { agent.halt(parse_payload(data)?).await }
    });

    registry
}
