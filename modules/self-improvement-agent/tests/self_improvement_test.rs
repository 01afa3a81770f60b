use agent_runtime::metrics::RecordingSink;
use integrations::testing::{CodeHostCall, FakeCodeHost, FakeLogMonitor};
use platform_contracts::payloads::MonitoringAlert;
use platform_contracts::workflow;
use self_improvement_agent::{registry, SelfImprovementAgent, AGENT, DB_OPTIMIZATION, IMPROVEMENTS_PATH};
use serde_json::{json, Value};
use std::sync::Arc;

struct Harness {
    code_host: Arc<FakeCodeHost>,
    monitor: Arc<FakeLogMonitor>,
    metrics: Arc<RecordingSink>,
    agent: Arc<SelfImprovementAgent>,
}

fn harness(code_host: FakeCodeHost, monitor: FakeLogMonitor) -> Harness {
    let code_host = Arc::new(code_host);
    let monitor = Arc::new(monitor);
    let metrics = Arc::new(RecordingSink::new());
    let agent = Arc::new(SelfImprovementAgent {
        code_host: code_host.clone(),
        monitor: monitor.clone(),
        metrics: metrics.clone(),
    });
    Harness {
        code_host,
        monitor,
        metrics,
        agent,
    }
}

fn alert(alert_type: &str) -> MonitoringAlert {
    MonitoringAlert {
        alert_type: alert_type.to_string(),
        details: json!({"service": "api", "rate": 0.12}),
    }
}

fn pull_requests(code_host: &FakeCodeHost) -> usize {
    code_host
        .calls()
        .iter()
        .filter(|c| matches!(c, CodeHostCall::OpenPullRequest { .. }))
        .count()
}

#[test]
fn test_registry_matches_workflow() {
    let h = harness(FakeCodeHost::new(), FakeLogMonitor::default());
    assert_eq!(registry(h.agent.clone()).event_types(), workflow::handled_by(AGENT));
}

#[tokio::test]
async fn test_high_error_rate_opens_pull_request() {
    let h = harness(FakeCodeHost::new(), FakeLogMonitor::default());
    h.agent.on_alert(alert("high_error_rate")).await.unwrap();

    let calls = h.code_host.calls();
    assert_eq!(calls.len(), 3);

    let CodeHostCall::CreateBranch { name: branch, sha } = &calls[0] else {
        panic!("expected branch creation first, got {:?}", calls[0]);
    };
    assert!(branch.starts_with("improvement-"));
    assert_eq!(sha, FakeCodeHost::HEAD_SHA);

    let CodeHostCall::PutFile {
        path,
        branch: file_branch,
        message,
        content,
        sha,
    } = &calls[1]
    else {
        panic!("expected file commit, got {:?}", calls[1]);
    };
    assert_eq!(path, IMPROVEMENTS_PATH);
    assert_eq!(file_branch, branch);
    assert_eq!(message, &format!("Propose system improvement: {}", DB_OPTIMIZATION));
    assert_eq!(sha, &None);
    let entries: Value = serde_json::from_str(content).unwrap();
    let entries = entries.as_object().unwrap();
    assert_eq!(entries.len(), 1);
    let (id, entry) = entries.iter().next().unwrap();
    assert!(id.starts_with("improvement-"));
    assert_eq!(entry["description"], DB_OPTIMIZATION);

    let CodeHostCall::OpenPullRequest { title, head, base, body } = &calls[2] else {
        panic!("expected pull request, got {:?}", calls[2]);
    };
    assert_eq!(title, &format!("Proposed Improvement: {}", DB_OPTIMIZATION));
    assert_eq!(head, branch);
    assert_eq!(base, "main");
    assert!(body.ends_with(&format!("\n\n{}", DB_OPTIMIZATION)));

    let proposals = h.metrics.named("ai_agent.self_improvement.proposals");
    assert_eq!(proposals.len(), 1);
    assert!(proposals[0].tags.contains(&"action:propose-improvement".to_string()));
}

#[tokio::test]
async fn test_existing_improvements_are_kept() {
    let existing = r#"{"improvement-old": {"description": "Cache sessions"}}"#;
    let h = harness(
        FakeCodeHost::new().with_file(IMPROVEMENTS_PATH, existing),
        FakeLogMonitor::default(),
    );
    h.agent.propose_improvement("Add retries").await.unwrap();

    let put = h
        .code_host
        .calls()
        .into_iter()
        .find_map(|c| match c {
            CodeHostCall::PutFile { content, sha, .. } => Some((content, sha)),
            _ => None,
        })
        .unwrap();
    assert_eq!(put.1.as_deref(), Some("sha-config/improvements.json"));

    let entries: Value = serde_json::from_str(&put.0).unwrap();
    assert_eq!(entries.as_object().unwrap().len(), 2);
    assert_eq!(entries["improvement-old"]["description"], "Cache sessions");
}

#[tokio::test]
async fn test_other_alerts_are_logged_only() {
    let h = harness(FakeCodeHost::new(), FakeLogMonitor::default());
    h.agent.on_alert(alert("disk_full")).await.unwrap();

    assert!(h.code_host.calls().is_empty());
    assert!(h.metrics.recorded().is_empty());
}

#[tokio::test]
async fn test_code_host_failure_is_retriable() {
    let h = harness(FakeCodeHost::failing(502), FakeLogMonitor::default());
    let err = h.agent.on_alert(alert("high_error_rate")).await.unwrap_err();

    assert!(err.is_retriable());
    assert!(h.metrics.named("ai_agent.self_improvement.proposals").is_empty());
}

#[tokio::test]
async fn test_health_check_with_errors_proposes() {
    let h = harness(FakeCodeHost::new(), FakeLogMonitor::with_matches(3));
    h.agent.health_check().await.unwrap();

    assert_eq!(h.monitor.queries(), vec!["status:error".to_string()]);
    assert_eq!(pull_requests(&h.code_host), 1);

    let checks = h.metrics.named("ai_agent.self_improvement.checks");
    assert_eq!(checks.len(), 1);
    assert!(checks[0].tags.contains(&"health:unhealthy".to_string()));
}

#[tokio::test]
async fn test_health_check_without_errors_is_healthy() {
    let h = harness(FakeCodeHost::new(), FakeLogMonitor::with_matches(0));
    h.agent.health_check().await.unwrap();

    assert_eq!(pull_requests(&h.code_host), 0);
    let checks = h.metrics.named("ai_agent.self_improvement.checks");
    assert!(checks[0].tags.contains(&"health:healthy".to_string()));
}

#[tokio::test]
async fn test_monitor_failure_counts_as_healthy() {
    let h = harness(FakeCodeHost::new(), FakeLogMonitor::failing(403));
    h.agent.health_check().await.unwrap();

    assert_eq!(pull_requests(&h.code_host), 0);
    let checks = h.metrics.named("ai_agent.self_improvement.checks");
    assert!(checks[0].tags.contains(&"health:healthy".to_string()));
}

#[tokio::test]
async fn test_failed_proposal_still_counts_check() {
    let h = harness(FakeCodeHost::failing(500), FakeLogMonitor::with_matches(1));
    assert!(h.agent.health_check().await.is_err());

    let checks = h.metrics.named("ai_agent.self_improvement.checks");
    assert_eq!(checks.len(), 1);
    assert!(checks[0].tags.contains(&"health:unhealthy".to_string()));
}
