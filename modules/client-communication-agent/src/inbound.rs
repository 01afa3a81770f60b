//! Inbound mail webhook

use agent_runtime::Publisher;
use agent_store::RecordStore;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use platform_contracts::data_product::names;
use platform_contracts::payloads::ClientCommunication;
use platform_contracts::{now_millis, DataProduct, EventType};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct InboundState {
    pub store: Arc<dyn RecordStore>,
    pub publisher: Publisher,
}

#[derive(Debug, Default, Deserialize)]
pub struct InboundEmail {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

pub fn routes(state: InboundState) -> Router {
    Router::new()
        .route("/gmail/inbound", post(receive_email))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
enum InboundError {
    #[error(transparent)]
    Store(#[from] agent_store::StoreError),

    #[error(transparent)]
    Publish(#[from] event_bus::BusError),
}

async fn receive_email(
    State(state): State<InboundState>,
    body: Result<Json<InboundEmail>, JsonRejection>,
) -> (StatusCode, &'static str) {
    let email = body.map(|Json(email)| email).unwrap_or_default();
    let (Some(from), Some(subject), Some(body)) = (email.from, email.subject, email.body) else {
        return (StatusCode::BAD_REQUEST, "Missing required fields");
    };

    tracing::info!(from = %from, subject = %subject, "Received client email");

    match forward(&state, &from, body).await {
        Ok(true) => (StatusCode::OK, "Email received and processed"),
        Ok(false) => {
            tracing::warn!(from = %from, "No client with this email");
            (StatusCode::BAD_REQUEST, "Client not found")
        }
        Err(e) => {
            tracing::error!(error = %e, from = %from, "Failed to process inbound email");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Publish the email as `client_email_received`; false when the sender is unknown
async fn forward(state: &InboundState, from: &str, body: String) -> Result<bool, InboundError> {
    let Some(client_id) = state.store.find_client_id_by_email(from).await? else {
        return Ok(false);
    };

    let product = DataProduct::new(
        names::CLIENT_COMMUNICATION,
        ClientCommunication {
            client_id,
            message: body,
            timestamp: now_millis(),
        },
    );
    state
        .publisher
        .publish(EventType::ClientEmailReceived, &product)
        .await?;
    Ok(true)
}
