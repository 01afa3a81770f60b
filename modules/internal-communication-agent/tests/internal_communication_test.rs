use agent_runtime::metrics::RecordingSink;
use agent_runtime::{EventHandler, Publisher};
use agent_store::MemoryStore;
use event_bus::{decode, Broker, InMemoryBroker, AGENT_QUEUE};
use integrations::testing::RecordingNotifier;
use internal_communication_agent::{registry, InternalCommunicationAgent, AGENT};
use platform_contracts::payloads::InternalCommunication;
use platform_contracts::workflow;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    broker: InMemoryBroker,
    notifier: Arc<RecordingNotifier>,
    metrics: Arc<RecordingSink>,
    agent: Arc<InternalCommunicationAgent>,
}

async fn harness(notifier: RecordingNotifier) -> Harness {
    let broker = InMemoryBroker::new();
    broker.declare_queue(AGENT_QUEUE, true).await.unwrap();
    let store = MemoryStore::new().with_employee("employee-001", "Alice Smith");
    let notifier = Arc::new(notifier);
    let metrics = Arc::new(RecordingSink::new());
    let agent = Arc::new(InternalCommunicationAgent {
        store: Arc::new(store),
        notifier: notifier.clone(),
        publisher: Publisher::new(Arc::new(broker.clone()), AGENT_QUEUE, AGENT),
        metrics: metrics.clone(),
    });
    Harness {
        broker,
        notifier,
        metrics,
        agent,
    }
}

fn message(employee_id: &str, text: &str) -> InternalCommunication {
    InternalCommunication {
        employee_id: employee_id.to_string(),
        message: text.to_string(),
        timestamp: 1,
    }
}

#[tokio::test]
async fn test_registry_matches_workflow() {
    let h = harness(RecordingNotifier::new()).await;
    assert_eq!(registry(h.agent.clone()).event_types(), workflow::handled_by(AGENT));
}

#[tokio::test]
async fn test_known_employee_gets_reply_and_response_event() {
    let h = harness(RecordingNotifier::new()).await;
    h.agent
        .on_message(message("employee-001", "Please check my code review"))
        .await
        .unwrap();

    assert_eq!(
        h.notifier.messages(),
        vec!["Responded to Alice Smith: \"Great job on the code review!\"".to_string()]
    );

    let published = h.broker.published(AGENT_QUEUE);
    assert_eq!(published.len(), 1);
    let envelope = decode(&published[0]).unwrap();
    assert_eq!(envelope.event_type, "internal_comm_response");
    assert_eq!(envelope.data["name"], "internal-communication");
    assert_eq!(envelope.data["schemaVersion"], "1.0.0");
    assert_eq!(envelope.data["payload"]["employeeId"], "employee-001");
    assert_eq!(envelope.data["payload"]["message"], "Great job on the code review!");

    let processed = h.metrics.named("ai_agent.internal_communication.messages_processed");
    assert_eq!(processed.len(), 1);
    assert!(processed[0].tags.contains(&"employee:employee-001".to_string()));
}

#[tokio::test]
async fn test_unknown_employee_has_no_effect() {
    let h = harness(RecordingNotifier::new()).await;
    h.agent.on_message(message("employee-404", "hello")).await.unwrap();

    assert!(h.notifier.messages().is_empty());
    assert!(h.broker.published(AGENT_QUEUE).is_empty());
    assert!(h.metrics.recorded().is_empty());
}

#[tokio::test]
async fn test_slack_failure_publishes_nothing() {
    let h = harness(RecordingNotifier::failing(500)).await;
    let err = h
        .agent
        .on_message(message("employee-001", "hello"))
        .await
        .unwrap_err();

    assert!(err.is_retriable());
    assert!(h.broker.published(AGENT_QUEUE).is_empty());
}

#[tokio::test]
async fn test_raw_message_through_registry_publishes_response() {
    let h = harness(RecordingNotifier::new()).await;
    let handlers = registry(h.agent.clone());
    let handle = handlers.get("internal_comm_message").unwrap();

    handle
        .handle(json!({
            "employeeId": "employee-001",
            "message": "Can you update the documentation?",
            "timestamp": 1
        }))
        .await
        .unwrap();

    let published = h.broker.published(AGENT_QUEUE);
    assert_eq!(published.len(), 1);
    let envelope = decode(&published[0]).unwrap();
    assert_eq!(
        envelope.data["payload"]["message"],
        json!("Will update the documentation by EOD.")
    );
}
