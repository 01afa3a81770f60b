//! # Client Portal
//!
//! Entry point of the delivery workflow. `POST /submit-request` records
//! the client (found or created by email) and a new project, then
//! publishes `new_project_request`.
//!
//! The portal consumes the queue with an empty dispatch table, so every
//! delivery is acknowledged as unhandled.

use agent_runtime::{tag, HandlerRegistry, MetricsSink, Publisher};
use agent_store::{Client, Project, RecordStore};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use platform_contracts::payloads::NewProjectRequest;
use platform_contracts::{agents, now_millis, prefixed_id, EventType};
use serde::Deserialize;
use std::sync::Arc;

pub const AGENT: &str = agents::CLIENT_PORTAL;

pub const DEFAULT_PORT: u16 = 4000;

#[derive(Clone)]
pub struct PortalState {
    pub store: Arc<dyn RecordStore>,
    pub publisher: Publisher,
    pub metrics: Arc<dyn MetricsSink>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub client_email: Option<String>,
    pub project_title: Option<String>,
    pub project_description: Option<String>,
}

/// The three fields, each present and non-blank
fn required(req: SubmitRequest) -> Option<(String, String, String)> {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    Some((
        present(req.client_email)?,
        present(req.project_title)?,
        present(req.project_description)?,
    ))
}

/// Display name derived from an email address
pub fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

pub fn routes(state: PortalState) -> Router {
    Router::new()
        .route("/submit-request", post(submit_request))
        .with_state(state)
}

pub fn registry() -> HandlerRegistry {
    HandlerRegistry::new()
}

type Reply = (StatusCode, &'static str);

const INTERNAL_ERROR: Reply = (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");

async fn submit_request(
    State(state): State<PortalState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Reply {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let Some((email, title, description)) = required(req) else {
        return (StatusCode::BAD_REQUEST, "All fields are required.");
    };

    match submit(&state, &email, &title, &description).await {
        Ok(project_id) => {
            tracing::info!(project_id = %project_id, "Project request submitted");
            (StatusCode::OK, "Project request submitted successfully.")
        }
        Err(e) => {
            tracing::error!(error = %e, client_email = %email, "Failed to submit project request");
            INTERNAL_ERROR
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum SubmitError {
    #[error(transparent)]
    Store(#[from] agent_store::StoreError),

    #[error(transparent)]
    Publish(#[from] event_bus::BusError),
}

async fn find_or_create_client(store: &dyn RecordStore, email: &str) -> Result<String, SubmitError> {
    if let Some(client_id) = store.find_client_id_by_email(email).await? {
        return Ok(client_id);
    }

    let client = Client {
        client_id: prefixed_id("client"),
        name: local_part(email).to_string(),
        email: email.to_string(),
        phone: None,
    };
    store.insert_client(&client).await?;
    tracing::info!(client_id = %client.client_id, "New client created");
    Ok(client.client_id)
}

async fn submit(
    state: &PortalState,
    email: &str,
    title: &str,
    description: &str,
) -> Result<String, SubmitError> {
    let client_id = find_or_create_client(state.store.as_ref(), email).await?;

    let project = Project {
        project_id: prefixed_id("project"),
        client_id: client_id.clone(),
        name: title.to_string(),
        description: Some(description.to_string()),
        status: "active".to_string(),
    };
    state.store.insert_project(&project).await?;

    let request = NewProjectRequest {
        project_id: project.project_id.clone(),
        client_id,
        project_title: title.to_string(),
        project_description: description.to_string(),
        timestamp: now_millis(),
    };
    state
        .publisher
        .publish(EventType::NewProjectRequest, &request)
        .await?;

    state.metrics.gauge(
        "ai_agent.client_portal.requests_submitted",
        1.0,
        &[tag("agent", AGENT), tag("project", &project.project_id)],
    );
    Ok(project.project_id)
}
