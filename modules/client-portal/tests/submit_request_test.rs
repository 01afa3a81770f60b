use agent_runtime::metrics::RecordingSink;
use agent_runtime::Publisher;
use agent_store::MemoryStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use client_portal::{registry, routes, PortalState, AGENT};
use event_bus::{decode, Broker, InMemoryBroker, AGENT_QUEUE};
use http_body_util::BodyExt;
use platform_contracts::workflow;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    broker: InMemoryBroker,
    store: MemoryStore,
    metrics: Arc<RecordingSink>,
    app: Router,
}

async fn harness(store: MemoryStore) -> Harness {
    let broker = InMemoryBroker::new();
    broker.declare_queue(AGENT_QUEUE, true).await.unwrap();
    let metrics = Arc::new(RecordingSink::new());
    let app = routes(PortalState {
        store: Arc::new(store.clone()),
        publisher: Publisher::new(Arc::new(broker.clone()), AGENT_QUEUE, AGENT),
        metrics: metrics.clone(),
    });
    Harness {
        broker,
        store,
        metrics,
        app,
    }
}

async fn post(app: Router, body: Body) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/submit-request")
                .header("content-type", "application/json")
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn json_body(value: Value) -> Body {
    Body::from(serde_json::to_vec(&value).unwrap())
}

#[test]
fn test_portal_handles_no_events() {
    assert!(registry().is_empty());
    assert!(workflow::handled_by(AGENT).is_empty());
}

#[tokio::test]
async fn test_new_client_request_is_published() {
    let h = harness(MemoryStore::new()).await;
    let (status, text) = post(
        h.app.clone(),
        json_body(json!({
            "clientEmail": "jane.doe@example.com",
            "projectTitle": "Website Redesign",
            "projectDescription": "Refresh the marketing site"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Project request submitted successfully.");

    let clients = h.store.clients();
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].name, "jane.doe");
    assert!(clients[0].client_id.starts_with("client-"));

    let projects = h.store.projects();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].status, "active");
    assert_eq!(projects[0].client_id, clients[0].client_id);

    let published = h.broker.published(AGENT_QUEUE);
    assert_eq!(published.len(), 1);
    let envelope = decode(&published[0]).unwrap();
    assert_eq!(envelope.event_type, "new_project_request");
    assert_eq!(envelope.data["projectId"], projects[0].project_id.as_str());
    assert_eq!(envelope.data["clientId"], clients[0].client_id.as_str());
    assert_eq!(envelope.data["projectTitle"], "Website Redesign");
    assert_eq!(envelope.data["projectDescription"], "Refresh the marketing site");

    let submitted = h.metrics.named("ai_agent.client_portal.requests_submitted");
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0]
        .tags
        .contains(&format!("project:{}", projects[0].project_id)));
}

#[tokio::test]
async fn test_known_client_is_reused() {
    let store = MemoryStore::new().with_client("client-001", "Acme Corp", "ops@acme.test");
    let h = harness(store).await;
    let (status, _) = post(
        h.app.clone(),
        json_body(json!({
            "clientEmail": "ops@acme.test",
            "projectTitle": "Mobile App",
            "projectDescription": "iOS first"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.store.clients().len(), 1);
    assert_eq!(h.store.projects()[0].client_id, "client-001");
}

#[tokio::test]
async fn test_missing_or_blank_fields_are_rejected() {
    let h = harness(MemoryStore::new()).await;

    for body in [
        json!({"clientEmail": "a@b.com", "projectTitle": "Site"}),
        json!({"clientEmail": "a@b.com", "projectTitle": " ", "projectDescription": "x"}),
        json!({}),
    ] {
        let (status, text) = post(h.app.clone(), json_body(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, "All fields are required.");
    }

    let (status, _) = post(h.app.clone(), Body::from("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(h.store.clients().is_empty());
    assert!(h.broker.published(AGENT_QUEUE).is_empty());
}
