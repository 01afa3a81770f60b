//! # Client Communication Agent
//!
//! Two halves:
//!
//! - [`inbound`]: `POST /gmail/inbound` turns a client email into a
//!   `client_email_received` data product.
//! - [`ClientCommunicationAgent`]: consumes that event and either answers a
//!   general inquiry or books a kickoff meeting, then publishes
//!   `client_email_response`.

pub mod inbound;

use agent_runtime::{parse_data_product, tag, HandlerError, HandlerRegistry, MetricsSink, Publisher};
use agent_store::RecordStore;
use chrono::{DateTime, Duration, Utc};
use integrations::{Calendar, CalendarEvent, Mailer, Notifier, Reminder};
use platform_contracts::data_product::names;
use platform_contracts::payloads::ClientCommunication;
use platform_contracts::{agents, now_millis, DataProduct, EventType};
use std::sync::Arc;

pub const AGENT: &str = agents::CLIENT_COMMUNICATION;

pub const DEFAULT_PORT: u16 = 3001;

pub const MEETING_TIME_ZONE: &str = "America/Los_Angeles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    MeetingRequest,
    GeneralInquiry,
}

pub fn categorize(message: &str) -> Category {
    let lower = message.to_lowercase();
    if lower.contains("schedule a meeting") || lower.contains("call") {
        Category::MeetingRequest
    } else {
        Category::GeneralInquiry
    }
}

/// Kickoff meeting one day after `now`, lasting an hour
pub fn kickoff_meeting(client_email: &str, now: DateTime<Utc>) -> CalendarEvent {
    let start = now + Duration::days(1);
    CalendarEvent {
        summary: "Project Kickoff Meeting".to_string(),
        location: "Google Meet".to_string(),
        description: "Initial meeting to discuss project requirements and timelines.".to_string(),
        start,
        end: start + Duration::hours(1),
        time_zone: MEETING_TIME_ZONE.to_string(),
        attendees: vec![client_email.to_string()],
        reminders: vec![
            Reminder {
                method: "email".to_string(),
                minutes: 24 * 60,
            },
            Reminder {
                method: "popup".to_string(),
                minutes: 10,
            },
        ],
    }
}

pub struct ClientCommunicationAgent {
    pub store: Arc<dyn RecordStore>,
    pub mailer: Arc<dyn Mailer>,
    pub calendar: Arc<dyn Calendar>,
    pub notifier: Arc<dyn Notifier>,
    pub publisher: Publisher,
    pub metrics: Arc<dyn MetricsSink>,
}

impl ClientCommunicationAgent {
    pub async fn on_email_received(&self, communication: ClientCommunication) -> Result<(), HandlerError> {
        let client_id = communication.client_id;
        tracing::info!(client_id = %client_id, "Processing client communication");

        let Some(email) = self.store.client_email(&client_id).await? else {
            tracing::warn!(client_id = %client_id, "Client not found, communication ignored");
            return Ok(());
        };

        match categorize(&communication.message) {
            Category::MeetingRequest => self.schedule_meeting(&client_id, &email).await,
            Category::GeneralInquiry => self.answer_inquiry(&client_id, &email).await,
        }
    }

    async fn answer_inquiry(&self, client_id: &str, email: &str) -> Result<(), HandlerError> {
        let subject = "Re: Your Inquiry";
        let response =
            "Thank you for reaching out. We have received your message and will get back to you shortly.";

        self.mailer.send_email(email, subject, response).await?;
        self.notifier
            .notify(&format!("Responded to {}: \"{}\"", client_id, subject))
            .await?;
        self.publish_response(client_id, response).await?;

        self.metrics.gauge(
            "ai_agent.client_communication.messages_processed",
            1.0,
            &[tag("agent", AGENT), tag("client", client_id)],
        );
        Ok(())
    }

    async fn schedule_meeting(&self, client_id: &str, email: &str) -> Result<(), HandlerError> {
        let link = self
            .calendar
            .create_event(&kickoff_meeting(email, Utc::now()))
            .await?;
        tracing::info!(client_id = %client_id, event = %link, "Kickoff meeting created");

        let response = "Your meeting has been scheduled. Please check your Google Calendar for details.";
        self.mailer.send_email(email, "Meeting Scheduled", response).await?;
        self.notifier
            .notify(&format!("Scheduled a meeting with client {}.", client_id))
            .await?;
        self.publish_response(client_id, response).await?;

        self.metrics.gauge(
            "ai_agent.client_communication.meetings_scheduled",
            1.0,
            &[tag("agent", AGENT), tag("client", client_id)],
        );
        Ok(())
    }

    async fn publish_response(&self, client_id: &str, message: &str) -> Result<(), HandlerError> {
        let product = DataProduct::new(
            names::CLIENT_COMMUNICATION,
            ClientCommunication {
                client_id: client_id.to_string(),
                message: message.to_string(),
                timestamp: now_millis(),
            },
        );
        self.publisher
            .publish(EventType::ClientEmailResponse, &product)
            .await?;
        Ok(())
    }
}

pub fn registry(agent: Arc<ClientCommunicationAgent>) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.on(EventType::ClientEmailReceived, move |data| {
        let agent = agent.clone();
        async move {
            let product = parse_data_product::<ClientCommunication>(data)?;
            agent.on_email_received(product.payload).await
        }
    });
    registry
}
