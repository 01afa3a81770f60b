//! # Testing Agent
//!
//! `development_issue_created` -> run the task's tests -> mark the
//! development task `completed` or `failed`, record the run, publish
//! `testing_result_passed` / `testing_result_failed` for deployment.

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink, Publisher};
use agent_store::{RecordStore, TestingResultRecord};
use integrations::TestRunner;
use platform_contracts::payloads::{DevelopmentIssue, TestingResult};
use platform_contracts::{agents, now_millis, prefixed_id, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::TESTING;

pub struct TestingAgent {
    pub store: Arc<dyn RecordStore>,
    pub runner: Arc<dyn TestRunner>,
    pub publisher: Publisher,
    pub metrics: Arc<dyn MetricsSink>,
}

impl TestingAgent {
    pub async fn on_development_issue(&self, issue: DevelopmentIssue) -> Result<(), HandlerError> {
        let task_id = issue.task_id;
        tracing::info!(
            task_id = %task_id,
            repository_url = ?issue.repository_url,
            "Running tests for development issue"
        );

        let passed = self.runner.run_tests(&task_id).await;
        let result = TestingResult {
            test_id: prefixed_id("test"),
            task_id: task_id.clone(),
            passed,
            timestamp: now_millis(),
        };

        let status = if passed { "completed" } else { "failed" };
        if !self.store.update_development_task(&task_id, status, None).await? {
            tracing::warn!(task_id = %task_id, "No development task row to update");
        }
        self.metrics.gauge(
            "ai_agent.testing.tasks_updated",
            1.0,
            &[tag("agent", AGENT), tag("task", &task_id), tag("status", status)],
        );

        self.store
            .insert_testing_result(&TestingResultRecord {
                test_id: result.test_id.clone(),
                task_id: task_id.clone(),
                passed,
                timestamp: result.timestamp,
            })
            .await?;

        self.metrics.gauge(
            "ai_agent.testing.tests_run",
            1.0,
            &[
                tag("agent", AGENT),
                tag("task", &task_id),
                tag("result", if passed { "passed" } else { "failed" }),
            ],
        );

        let event_type = if passed {
            EventType::TestingResultPassed
        } else {
            EventType::TestingResultFailed
        };
        self.publisher.publish(event_type, &result).await?;
        tracing::info!(task_id = %task_id, test_id = %result.test_id, event_type = %event_type, "Testing result published");
        Ok(())
    }
}

pub fn registry(agent: Arc<TestingAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::DevelopmentIssueCreated, move |data| {
        let agent = agent.clone();
        async move { agent.on_development_issue(parse_payload(data)?).await }
    });
    registry
}
