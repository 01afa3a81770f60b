//! # Internal Communication Agent
//!
//! `internal_comm_message` -> canned reply chosen by message content,
//! posted to the team channel and published as `internal_comm_response`.

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink, Publisher};
use agent_store::RecordStore;
use integrations::Notifier;
use platform_contracts::data_product::names;
use platform_contracts::payloads::InternalCommunication;
use platform_contracts::{agents, now_millis, DataProduct, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::INTERNAL_COMMUNICATION;

/// Reply for an employee message, first matching rule wins
pub fn response_for(message: &str) -> &'static str {
    let lower = message.to_lowercase();
    if lower.contains("code review") {
        "Great job on the code review!"
    } else if lower.contains("update the documentation") {
        "Will update the documentation by EOD."
    } else {
        "Acknowledged."
    }
}

pub struct InternalCommunicationAgent {
    pub store: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
    pub publisher: Publisher,
    pub metrics: Arc<dyn MetricsSink>,
}

impl InternalCommunicationAgent {
    pub async fn on_message(&self, message: InternalCommunication) -> Result<(), HandlerError> {
        let employee_id = message.employee_id;
        tracing::info!(employee_id = %employee_id, "Processing internal message");

        let Some(name) = self.store.employee_name(&employee_id).await? else {
            tracing::warn!(employee_id = %employee_id, "Employee not found, message ignored");
            return Ok(());
        };

        let response = response_for(&message.message);
        self.notifier
            .notify(&format!("Responded to {}: \"{}\"", name, response))
            .await?;

        let product = DataProduct::new(
            names::INTERNAL_COMMUNICATION,
            InternalCommunication {
                employee_id: employee_id.clone(),
                message: response.to_string(),
                timestamp: now_millis(),
            },
        );
        self.publisher
            .publish(EventType::InternalCommResponse, &product)
            .await?;

        self.metrics.gauge(
            "ai_agent.internal_communication.messages_processed",
            1.0,
            &[tag("agent", AGENT), tag("employee", &employee_id)],
        );
        Ok(())
    }
}

pub fn registry(agent: Arc<InternalCommunicationAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::InternalCommMessage, move |data| {
        let agent = agent.clone();
        async move { agent.on_message(parse_payload(data)?).await }
    });
    registry
}
