use agent_runtime::metrics::RecordingSink;
use agent_runtime::{EventHandler, HandlerError};
use agent_store::MemoryStore;
use integrations::testing::RecordingHelpdesk;
use platform_contracts::payloads::SupportTicket;
use platform_contracts::workflow;
use serde_json::json;
use std::sync::Arc;
use support_agent::{registry, resolution_text, SupportAgent, AGENT};

struct Harness {
    store: MemoryStore,
    helpdesk: Arc<RecordingHelpdesk>,
    metrics: Arc<RecordingSink>,
    agent: Arc<SupportAgent>,
}

fn harness(store: MemoryStore, helpdesk: RecordingHelpdesk) -> Harness {
    let helpdesk = Arc::new(helpdesk);
    let metrics = Arc::new(RecordingSink::new());
    let agent = Arc::new(SupportAgent {
        store: Arc::new(store.clone()),
        helpdesk: helpdesk.clone(),
        metrics: metrics.clone(),
    });
    Harness {
        store,
        helpdesk,
        metrics,
        agent,
    }
}

fn ticket() -> SupportTicket {
    SupportTicket {
        ticket_id: "ticket-001".to_string(),
        client_id: "client-001".to_string(),
        issue: "Login page not loading.".to_string(),
        status: "open".to_string(),
        timestamp: 1,
    }
}

fn open_ticket_store() -> MemoryStore {
    MemoryStore::new().with_ticket("ticket-001", "client-001", "Login page not loading.", "open")
}

#[test]
fn test_registry_matches_workflow() {
    let h = harness(MemoryStore::new(), RecordingHelpdesk::new());
    assert_eq!(registry(h.agent.clone()).event_types(), workflow::handled_by(AGENT));
}

#[test]
fn test_resolution_text() {
    assert_eq!(
        resolution_text("Login page not loading."),
        "Issue \"Login page not loading.\" has been resolved. Thank you for contacting us."
    );
}

#[tokio::test]
async fn test_open_ticket_is_resolved_once() {
    let h = harness(open_ticket_store(), RecordingHelpdesk::new());
    h.agent.on_ticket_created(ticket()).await.unwrap();

    assert_eq!(
        h.helpdesk.closed(),
        vec![("ticket-001".to_string(), resolution_text("Login page not loading."))]
    );
    assert_eq!(h.store.ticket("ticket-001").unwrap().status, "resolved");

    let resolutions = h.store.resolutions();
    assert_eq!(resolutions.len(), 1);
    assert!(resolutions[0].resolution_id.starts_with("res-"));
    assert_eq!(resolutions[0].ticket_id, "ticket-001");
    assert_eq!(h.metrics.count("ai_agent.support.tickets_resolved"), 1);
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let h = harness(open_ticket_store(), RecordingHelpdesk::new());
    h.agent.on_ticket_created(ticket()).await.unwrap();
    h.agent.on_ticket_created(ticket()).await.unwrap();

    assert_eq!(h.helpdesk.closed().len(), 1);
    assert_eq!(h.store.resolutions().len(), 1);
    assert_eq!(h.metrics.count("ai_agent.support.tickets_resolved"), 1);
}

#[tokio::test]
async fn test_helpdesk_failure_keeps_ticket_open() {
    let h = harness(open_ticket_store(), RecordingHelpdesk::failing(503));
    let err = h.agent.on_ticket_created(ticket()).await.unwrap_err();

    assert!(err.is_retriable());
    assert_eq!(h.store.ticket("ticket-001").unwrap().status, "open");
    assert!(h.store.resolutions().is_empty());
    assert!(h.metrics.recorded().is_empty());
}

#[tokio::test]
async fn test_unknown_ticket_is_still_closed_remotely() {
    let h = harness(MemoryStore::new(), RecordingHelpdesk::new());
    h.agent.on_ticket_created(ticket()).await.unwrap();

    assert_eq!(h.helpdesk.closed().len(), 1);
    assert_eq!(h.store.resolutions().len(), 1);
}

#[tokio::test]
async fn test_raw_payload_redelivered_through_registry_resolves_once() {
    let h = harness(open_ticket_store(), RecordingHelpdesk::new());
    let handlers = registry(h.agent.clone());
    let handle = handlers.get("support_ticket_created").unwrap();

    let payload = json!({
        "ticketId": "ticket-001",
        "clientId": "client-001",
        "issue": "Login page not loading.",
        "status": "open",
        "timestamp": 1_717_171_717_000_i64
    });
    handle.handle(payload.clone()).await.unwrap();
    handle.handle(payload).await.unwrap();

    assert_eq!(h.helpdesk.closed().len(), 1);
    assert_eq!(h.store.resolutions().len(), 1);
    assert_eq!(h.metrics.count("ai_agent.support.tickets_resolved"), 1);
}

#[tokio::test]
async fn test_payload_without_ticket_id_is_rejected() {
    let h = harness(open_ticket_store(), RecordingHelpdesk::new());
    let handlers = registry(h.agent.clone());
    let handle = handlers.get("support_ticket_created").unwrap();

    let err = handle
        .handle(json!({"clientId": "client-001", "issue": "x", "status": "open", "timestamp": 1}))
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::InvalidPayload(_)));
    assert!(!err.is_retriable());
    assert!(h.helpdesk.closed().is_empty());
}
