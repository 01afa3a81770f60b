//! The cross-agent workflow as a static graph
//!
//! No process enforces this graph at runtime. It documents which agent
//! reacts to which trigger and which events that reaction may publish, and
//! agent tests check their dispatch tables against it.
//!
//! Several event types have consumers but no producer inside the graph
//! (see [`unproduced`]); they arrive from external triggers.

use crate::event_types::EventType;

/// Agent names; also the default consumer group and the `agent:` metric tag
pub mod agents {
    pub const CLIENT_PORTAL: &str = "client-portal";
    pub const CLIENT_COMMUNICATION: &str = "client-communication";
    pub const PROJECT_MANAGEMENT: &str = "project-management";
    pub const DEVELOPMENT: &str = "development";
    pub const TESTING: &str = "testing";
    pub const DEPLOYMENT: &str = "deployment";
    pub const SUPPORT: &str = "support";
    pub const INTERNAL_COMMUNICATION: &str = "internal-communication";
    pub const DOCUMENTATION: &str = "documentation";
    pub const SELF_IMPROVEMENT: &str = "self-improvement";

    pub const ALL: [&str; 10] = [
        CLIENT_PORTAL,
        CLIENT_COMMUNICATION,
        PROJECT_MANAGEMENT,
        DEVELOPMENT,
        TESTING,
        DEPLOYMENT,
        SUPPORT,
        INTERNAL_COMMUNICATION,
        DOCUMENTATION,
        SELF_IMPROVEMENT,
    ];
}

/// What starts a workflow step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// An event consumed from the queue
    Event(EventType),
    /// An inbound HTTP route on the agent
    Http(&'static str),
    /// A cron schedule, named by the env var that configures it
    Schedule(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub agent: &'static str,
    pub trigger: Trigger,
    /// Events the step may publish; empty for terminal steps
    pub emits: &'static [EventType],
}

use agents::*;
use EventType::*;

pub const WORKFLOW: &[Step] = &[
    Step {
        agent: CLIENT_PORTAL,
        trigger: Trigger::Http("POST /submit-request"),
        emits: &[NewProjectRequest],
    },
    Step {
        agent: CLIENT_COMMUNICATION,
        trigger: Trigger::Http("POST /gmail/inbound"),
        emits: &[ClientEmailReceived],
    },
    Step {
        agent: CLIENT_COMMUNICATION,
        trigger: Trigger::Event(ClientEmailReceived),
        emits: &[ClientEmailResponse],
    },
    Step {
        agent: PROJECT_MANAGEMENT,
        trigger: Trigger::Event(ClientEmailReceived),
        emits: &[],
    },
    Step {
        agent: PROJECT_MANAGEMENT,
        trigger: Trigger::Schedule("PM_SYNC_CRON"),
        emits: &[],
    },
    Step {
        agent: DEVELOPMENT,
        trigger: Trigger::Event(ProjectManagementTaskCreated),
        emits: &[],
    },
    Step {
        agent: TESTING,
        trigger: Trigger::Event(DevelopmentIssueCreated),
        emits: &[TestingResultPassed, TestingResultFailed],
    },
    Step {
        agent: DEPLOYMENT,
        trigger: Trigger::Event(TestingResultPassed),
        emits: &[],
    },
    Step {
        agent: DEPLOYMENT,
        trigger: Trigger::Event(TestingResultFailed),
        emits: &[],
    },
    Step {
        agent: SUPPORT,
        trigger: Trigger::Event(SupportTicketCreated),
        emits: &[],
    },
    Step {
        agent: INTERNAL_COMMUNICATION,
        trigger: Trigger::Event(InternalCommMessage),
        emits: &[InternalCommResponse],
    },
    Step {
        agent: DOCUMENTATION,
        trigger: Trigger::Event(DocumentationUpdate),
        emits: &[],
    },
    Step {
        agent: SELF_IMPROVEMENT,
        trigger: Trigger::Event(SystemMonitoringAlert),
        emits: &[],
    },
    Step {
        agent: SELF_IMPROVEMENT,
        trigger: Trigger::Schedule("HEALTH_CHECK_CRON"),
        emits: &[],
    },
];

/// Event types the agent registers handlers for, in catalogue order
pub fn handled_by(agent: &str) -> Vec<EventType> {
    let mut handled: Vec<EventType> = WORKFLOW
        .iter()
        .filter(|step| step.agent == agent)
        .filter_map(|step| match step.trigger {
            Trigger::Event(event_type) => Some(event_type),
            _ => None,
        })
        .collect();
    handled.sort();
    handled.dedup();
    handled
}

/// Agents that consume `event_type`
pub fn consumers_of(event_type: EventType) -> Vec<&'static str> {
    WORKFLOW
        .iter()
        .filter(|step| step.trigger == Trigger::Event(event_type))
        .map(|step| step.agent)
        .collect()
}

/// Agents that may publish `event_type`
pub fn producers_of(event_type: EventType) -> Vec<&'static str> {
    let mut producers: Vec<&'static str> = WORKFLOW
        .iter()
        .filter(|step| step.emits.contains(&event_type))
        .map(|step| step.agent)
        .collect();
    producers.dedup();
    producers
}

/// Whether `agent` may publish `emitted` while reacting to `trigger`
pub fn may_emit(agent: &str, trigger: Trigger, emitted: EventType) -> bool {
    WORKFLOW
        .iter()
        .any(|step| step.agent == agent && step.trigger == trigger && step.emits.contains(&emitted))
}

/// Event types nothing inside the graph publishes (external triggers only)
pub fn unproduced() -> Vec<EventType> {
    EventType::ALL
        .into_iter()
        .filter(|t| producers_of(*t).is_empty())
        .collect()
}

/// Event types nothing inside the graph consumes
pub fn unconsumed() -> Vec<EventType> {
    EventType::ALL
        .into_iter()
        .filter(|t| consumers_of(*t).is_empty())
        .collect()
}
