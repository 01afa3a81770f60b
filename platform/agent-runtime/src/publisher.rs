use event_bus::consumer_retry::{retry_with_backoff, RetryConfig};
use event_bus::{Broker, BusError, BusResult};
use platform_contracts::EventType;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Publishes workflow events on the agent's queue
///
/// Bound to the broker handle the runtime owns; cheap to clone into handlers.
#[derive(Clone)]
pub struct Publisher {
    broker: Arc<dyn Broker>,
    queue: String,
    agent: String,
    retry: RetryConfig,
}

impl Publisher {
    pub fn new(broker: Arc<dyn Broker>, queue: &str, agent: &str) -> Self {
        Self {
            broker,
            queue: queue.to_string(),
            agent: agent.to_string(),
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(100),
                max_backoff: Duration::from_secs(2),
            },
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        self.broker.clone()
    }

    /// Publish `{type, data}` as a persistent message
    ///
    /// A transient broker error is retried in-process; the error surfaces
    /// once the retry budget is spent.
    pub async fn publish<T: Serialize>(&self, event_type: EventType, data: &T) -> BusResult<()> {
        let envelope = platform_contracts::envelope(event_type, data)
            .map_err(|e| BusError::SerializationError(e.to_string()))?;

        retry_with_backoff(
            || self.broker.publish_envelope(&self.queue, &envelope),
            &self.retry,
            "publish_event",
        )
        .await?;

        tracing::info!(
            agent = %self.agent,
            event_type = %event_type,
            queue = %self.queue,
            "Event published"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("queue", &self.queue)
            .field("agent", &self.agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_bus::{decode, InMemoryBroker};
    use platform_contracts::payloads::TestOutcome;

    #[tokio::test]
    async fn test_publish_wraps_data_in_envelope() {
        let broker = InMemoryBroker::new();
        broker.declare_queue("agent_communication", true).await.unwrap();

        let publisher = Publisher::new(Arc::new(broker.clone()), "agent_communication", "testing");
        publisher
            .publish(
                EventType::TestingResultFailed,
                &TestOutcome {
                    task_id: "task-002".to_string(),
                },
            )
            .await
            .unwrap();

        let published = broker.published("agent_communication");
        assert_eq!(published.len(), 1);
        let envelope = decode(&published[0]).unwrap();
        assert_eq!(envelope.event_type, "testing_result_failed");
        assert_eq!(envelope.data["taskId"], "task-002");
    }

    #[tokio::test]
    async fn test_publish_gives_up_after_retries() {
        let broker = InMemoryBroker::new();
        let publisher = Publisher::new(Arc::new(broker), "undeclared", "testing").with_retry(
            RetryConfig {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(1),
            },
        );

        let err = publisher
            .publish(EventType::TestingResultPassed, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::PublishError(_)));
    }
}
