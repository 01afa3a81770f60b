//! # Support Agent
//!
//! `support_ticket_created` -> close the Zendesk ticket with a resolution
//! comment, mark the stored ticket `resolved`, record the resolution.
//!
//! A ticket already stored as `resolved` is skipped, so a redelivered
//! event neither comments twice nor double-counts the metric.

use agent_runtime::{parse_payload, tag, HandlerError, HandlerRegistry, MetricsSink};
use agent_store::{RecordStore, Resolution};
use integrations::Helpdesk;
use platform_contracts::payloads::SupportTicket;
use platform_contracts::{agents, now_millis, prefixed_id, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::SUPPORT;

pub const RESOLVED: &str = "resolved";

pub fn resolution_text(issue: &str) -> String {
    format!("Issue \"{}\" has been resolved. Thank you for contacting us.", issue)
}

pub struct SupportAgent {
    pub store: Arc<dyn RecordStore>,
    pub helpdesk: Arc<dyn Helpdesk>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl SupportAgent {
    pub async fn on_ticket_created(&self, ticket: SupportTicket) -> Result<(), HandlerError> {
        tracing::info!(ticket_id = %ticket.ticket_id, client_id = %ticket.client_id, "Handling support ticket");

        if self.store.ticket_status(&ticket.ticket_id).await?.as_deref() == Some(RESOLVED) {
            tracing::info!(ticket_id = %ticket.ticket_id, "Ticket already resolved, skipping");
            return Ok(());
        }

        let resolution = resolution_text(&ticket.issue);
        self.helpdesk.close_ticket(&ticket.ticket_id, &resolution).await?;

        if !self.store.update_ticket_status(&ticket.ticket_id, RESOLVED).await? {
            tracing::warn!(ticket_id = %ticket.ticket_id, "No stored ticket to mark resolved");
        }

        let record = Resolution {
            resolution_id: prefixed_id("res"),
            ticket_id: ticket.ticket_id.clone(),
            resolution,
            timestamp: now_millis(),
        };
        self.store.insert_resolution(&record).await?;

        self.metrics.gauge(
            "ai_agent.support.tickets_resolved",
            1.0,
            &[tag("agent", AGENT), tag("ticket", &ticket.ticket_id)],
        );
        tracing::info!(ticket_id = %ticket.ticket_id, resolution_id = %record.resolution_id, "Ticket resolved");
        Ok(())
    }
}

pub fn registry(agent: Arc<SupportAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::SupportTicketCreated, move |data| {
        let agent = agent.clone();
        async move { agent.on_ticket_created(parse_payload(data)?).await }
    });
    registry
}
