//! # Self-Improvement Agent
//!
//! Proposes improvements as pull requests against the configured
//! repository. A proposal adds an entry to [`IMPROVEMENTS_PATH`] on a fresh
//! `improvement-<uuid>` branch cut from `main` and opens a PR for it.
//!
//! Triggers:
//! - `system_monitoring_alert` with `alertType = high_error_rate`
//! - the health check (`HEALTH_CHECK_CRON`, hourly by default), when the
//!   last hour of logs holds any `status:error` entry

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink};
use chrono::{SecondsFormat, Utc};
use integrations::{CodeHost, LogMonitor};
use platform_contracts::payloads::{MonitoringAlert, HIGH_ERROR_RATE};
use platform_contracts::{agents, prefixed_id, EventType};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const AGENT: &str = agents::SELF_IMPROVEMENT;

pub const DEFAULT_HEALTH_CHECK_CRON: &str = "0 * * * *";

pub const IMPROVEMENTS_PATH: &str = "config/improvements.json";

pub const BASE_BRANCH: &str = "main";

pub const DB_OPTIMIZATION: &str = "Optimize database queries for better performance";

const ERROR_QUERY: &str = "status:error";

/// Add one improvement entry to the existing file content (or an empty object)
pub fn append_improvement(existing: Option<&str>, id: &str, description: &str, timestamp: &str) -> String {
    let mut entries = match existing.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(_) => {
            tracing::warn!(path = IMPROVEMENTS_PATH, "Existing improvements file is not a JSON object, starting over");
            Map::new()
        }
        None => Map::new(),
    };

    entries.insert(
        id.to_string(),
        json!({
            "description": description,
            "proposedBy": "SelfImprovementAgent",
            "timestamp": timestamp,
        }),
    );

    // A Value built from a Map always serializes
    serde_json::to_string_pretty(&Value::Object(entries)).unwrap_or_default()
}

pub struct SelfImprovementAgent {
    pub code_host: Arc<dyn CodeHost>,
    pub monitor: Arc<dyn LogMonitor>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl SelfImprovementAgent {
    pub async fn on_alert(&self, alert: MonitoringAlert) -> Result<(), HandlerError> {
        tracing::info!(alert_type = %alert.alert_type, details = %alert.details, "Handling system alert");

        if alert.alert_type == HIGH_ERROR_RATE {
            self.propose_improvement(DB_OPTIMIZATION).await?;
        } else {
            tracing::info!(alert_type = %alert.alert_type, "No improvement defined for alert type");
        }
        Ok(())
    }

    /// Branch, commit the entry and open a PR; returns the PR URL
    pub async fn propose_improvement(&self, description: &str) -> Result<String, HandlerError> {
        let branch = prefixed_id("improvement");
        tracing::info!(branch = %branch, "Proposing improvement");

        let head = self.code_host.branch_head(BASE_BRANCH).await?;
        self.code_host.create_branch(&branch, &head).await?;

        let existing = self.code_host.get_file(IMPROVEMENTS_PATH, &branch).await?;
        let content = append_improvement(
            existing.as_ref().map(|f| f.content.as_str()),
            &prefixed_id("improvement"),
            description,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );

        self.code_host
            .put_file(
                IMPROVEMENTS_PATH,
                &branch,
                &format!("Propose system improvement: {}", description),
                &content,
                existing.as_ref().map(|f| f.sha.as_str()),
            )
            .await?;

        let url = self
            .code_host
            .open_pull_request(
                &format!("Proposed Improvement: {}", description),
                &branch,
                BASE_BRANCH,
                &format!(
                    "This PR was automatically generated by the Self-Improvement Agent to address the following improvement:\n\n{}",
                    description
                ),
            )
            .await?;

        self.metrics.gauge(
            "ai_agent.self_improvement.proposals",
            1.0,
            &[tag("agent", AGENT), tag("action", "propose-improvement")],
        );
        tracing::info!(pull_request = %url, "Improvement proposal created");
        Ok(url)
    }

    /// True when errors were logged in the last hour; a failed query counts as healthy
    pub async fn is_unhealthy(&self) -> bool {
        match self.monitor.count_logs(ERROR_QUERY, "now-1h", "now", 1).await {
            Ok(count) => count > 0,
            Err(e) => {
                tracing::error!(error = %e, "Log query failed");
                false
            }
        }
    }

    pub async fn health_check(&self) -> Result<(), HandlerError> {
        let unhealthy = self.is_unhealthy().await;

        let proposed = if unhealthy {
            self.propose_improvement(DB_OPTIMIZATION).await.map(|_| ())
        } else {
            tracing::info!("System performance is healthy, no improvements needed");
            Ok(())
        };

        self.metrics.gauge(
            "ai_agent.self_improvement.checks",
            1.0,
            &[
                tag("agent", AGENT),
                tag("health", if unhealthy { "unhealthy" } else { "healthy" }),
            ],
        );
        proposed
    }
}

pub fn registry(agent: Arc<SelfImprovementAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::SystemMonitoringAlert, move |data| {
        let agent = agent.clone();
        async move { agent.on_alert(parse_payload(data)?).await }
    });
    registry
}
