//! # Agent Event Contracts
//!
//! Shared vocabulary of the agent federation:
//!
//! - [`EventType`]: the closed catalogue of envelope `type` tags
//! - [`workflow`]: which agent reacts to what, and what it may publish next
//! - [`DataProduct`]: the versioned wrapper for durable records
//! - [`payloads`]: the `data` shape implied by each event type
//!
//! ## Building an envelope
//!
//! ```rust
//! use platform_contracts::{envelope, payloads::TestOutcome, EventType};
//!
//! let outcome = TestOutcome { task_id: "task-001".to_string() };
//! let env = envelope(EventType::TestingResultPassed, &outcome).unwrap();
//! assert_eq!(env.event_type, "testing_result_passed");
//! assert_eq!(env.data["taskId"], "task-001");
//! ```

pub mod data_product;
pub mod event_types;
pub mod payloads;
pub mod workflow;

pub use data_product::{check_schema_version, DataProduct, SchemaVersionError, SCHEMA_VERSION};
pub use event_types::{EventType, UnknownEventType};
pub use workflow::agents;

use event_bus::Envelope;
use serde::Serialize;

/// Build an envelope for a catalogued event type
pub fn envelope<T: Serialize>(
    event_type: EventType,
    data: &T,
) -> Result<Envelope, serde_json::Error> {
    Ok(Envelope::new(event_type.as_str(), serde_json::to_value(data)?))
}

/// Current instant in epoch milliseconds, the unit of every `timestamp` field
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Identifier of the form `<prefix>-<uuid v4>` (`client-…`, `deploy-…`)
pub fn prefixed_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Task identifier derived from task text: lowercased, spaces become dashes
pub fn task_slug(task: &str) -> String {
    task.to_lowercase().replace(' ', "-")
}
