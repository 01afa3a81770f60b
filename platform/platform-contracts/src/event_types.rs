//! Closed catalogue of event types carried on the agent queue
//!
//! The catalogue is closed for producers: every agent publishes one of these
//! tags. Consumers still accept tags outside it; [`EventType::parse`] returns
//! `None` and dispatch treats the envelope as unhandled.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ClientEmailReceived,
    ClientEmailResponse,
    NewProjectRequest,
    ProjectManagementTaskCreated,
    DevelopmentIssueCreated,
    TestingResultPassed,
    TestingResultFailed,
    SupportTicketCreated,
    InternalCommMessage,
    InternalCommResponse,
    DocumentationUpdate,
    SystemMonitoringAlert,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::ClientEmailReceived,
        EventType::ClientEmailResponse,
        EventType::NewProjectRequest,
        EventType::ProjectManagementTaskCreated,
        EventType::DevelopmentIssueCreated,
        EventType::TestingResultPassed,
        EventType::TestingResultFailed,
        EventType::SupportTicketCreated,
        EventType::InternalCommMessage,
        EventType::InternalCommResponse,
        EventType::DocumentationUpdate,
        EventType::SystemMonitoringAlert,
    ];

    /// Wire tag used in the envelope's `type` field
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::ClientEmailReceived => "client_email_received",
            EventType::ClientEmailResponse => "client_email_response",
            EventType::NewProjectRequest => "new_project_request",
            EventType::ProjectManagementTaskCreated => "project_management_task_created",
            EventType::DevelopmentIssueCreated => "development_issue_created",
            EventType::TestingResultPassed => "testing_result_passed",
            EventType::TestingResultFailed => "testing_result_failed",
            EventType::SupportTicketCreated => "support_ticket_created",
            EventType::InternalCommMessage => "internal_comm_message",
            EventType::InternalCommResponse => "internal_comm_response",
            EventType::DocumentationUpdate => "documentation_update",
            EventType::SystemMonitoringAlert => "system_monitoring_alert",
        }
    }

    /// Look up a wire tag; `None` for tags outside the catalogue
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownEventType(s.to_string()))
    }
}
