//! Dead-letter path
//!
//! A delivery the runtime gives up on is written to `<queue>.dead_letter`
//! as a JSON [`DeadLetter`] record, then acknowledged on the work queue.

use chrono::{DateTime, Utc};
use event_bus::{dead_letter_queue, Broker, BusError, BusResult};
use serde::{Deserialize, Serialize};

/// Record of a delivery that was given up on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub agent: String,
    /// Work queue the delivery came from
    pub queue: String,
    pub reason: String,
    /// Deliveries made before giving up
    pub attempts: u32,
    /// `None` when the body never decoded far enough to read a type
    pub event_type: Option<String>,
    /// Original body (lossy UTF-8)
    pub body: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(
        agent: &str,
        queue: &str,
        reason: &str,
        attempts: u32,
        event_type: Option<&str>,
        payload: &[u8],
    ) -> Self {
        Self {
            agent: agent.to_string(),
            queue: queue.to_string(),
            reason: reason.to_string(),
            attempts,
            event_type: event_type.map(str::to_string),
            body: String::from_utf8_lossy(payload).into_owned(),
            failed_at: Utc::now(),
        }
    }
}

/// Publish a dead-letter record next to its work queue
pub async fn send_to_dlq(broker: &dyn Broker, record: &DeadLetter) -> BusResult<()> {
    let payload =
        serde_json::to_vec(record).map_err(|e| BusError::SerializationError(e.to_string()))?;

    let dlq = dead_letter_queue(&record.queue);
    match broker.publish(&dlq, payload, true).await {
        Ok(()) => {
            tracing::error!(
                agent = %record.agent,
                queue = %record.queue,
                event_type = %record.event_type.as_deref().unwrap_or("unknown"),
                attempts = record.attempts,
                reason = %record.reason,
                "Delivery dead-lettered"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                agent = %record.agent,
                dlq = %dlq,
                reason = %record.reason,
                publish_error = %e,
                "CRITICAL: Failed to write dead-letter record"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::InMemoryBroker;

    #[tokio::test]
    async fn test_dead_letter_lands_on_dlq() {
        let broker = InMemoryBroker::new();
        broker
            .declare_queue("agent_communication.dead_letter", true)
            .await
            .unwrap();

        let record = DeadLetter::new(
            "deployment",
            "agent_communication",
            "external service error: github 502",
            5,
            Some("testing_result_passed"),
            br#"{"type":"testing_result_passed","data":{}}"#,
        );
        send_to_dlq(&broker, &record).await.unwrap();

        let published = broker.published("agent_communication.dead_letter");
        assert_eq!(published.len(), 1);
        let stored: serde_json::Value = serde_json::from_slice(&published[0]).unwrap();
        assert_eq!(stored["agent"], "deployment");
        assert_eq!(stored["eventType"], "testing_result_passed");
        assert_eq!(stored["attempts"], 5);
        assert!(stored["failedAt"].is_string());
    }

    #[tokio::test]
    async fn test_undeclared_dlq_is_an_error() {
        let broker = InMemoryBroker::new();
        let record = DeadLetter::new("support", "agent_communication", "x", 1, None, b"\xff");
        assert!(send_to_dlq(&broker, &record).await.is_err());
        assert_eq!(record.body, "\u{fffd}");
    }
}
