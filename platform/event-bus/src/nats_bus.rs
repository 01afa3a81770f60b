//! NATS JetStream implementation of the Broker trait

use crate::{Acknowledger, Broker, BusError, BusResult, Delivery, Subscription};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy},
    stream::{Config, RetentionPolicy, StorageType},
    AckKind,
};
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::time::Duration;

/// How long a stored message is kept if no consumer group ever acks it
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 14); // 14 days

/// How long the server waits for an ack before redelivering
const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker implementation using NATS JetStream
///
/// Mapping onto JetStream:
/// - a queue is a stream whose single subject is the queue name
/// - a consumer group is a durable pull consumer `<queue>-<group>` with
///   explicit acks, fetching one message at a time
/// - `nack(requeue = true)` is a NAK (optionally delayed), `nack(false)` is TERM
///
/// # Example
/// ```rust,no_run
/// use event_bus::{Broker, NatsBroker, AGENT_QUEUE};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = NatsBroker::connect("nats://localhost:4222").await?;
/// broker.declare_queue(AGENT_QUEUE, true).await?;
/// broker.publish(AGENT_QUEUE, b"{\"type\":\"x\"}".to_vec(), true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NatsBroker {
    client: Client,
    jetstream: jetstream::Context,
    max_age: Duration,
    ack_wait: Duration,
}

impl NatsBroker {
    /// Connect to a NATS server; fails fast if it is unreachable
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = ConnectOptions::new()
            .connection_timeout(CONNECT_TIMEOUT)
            .connect(url)
            .await
            .map_err(|e| BusError::ConnectionError(format!("{url}: {e}")))?;

        Ok(Self::new(client))
    }

    /// Create a broker from an existing NATS client
    pub fn new(client: Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self {
            client,
            jetstream,
            max_age: DEFAULT_MAX_AGE,
            ack_wait: DEFAULT_ACK_WAIT,
        }
    }

    /// Retention for streams declared by this broker
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Redelivery timeout for unacked messages; keep it above the handler timeout
    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }

    /// Get a reference to the underlying NATS client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// JetStream stream and consumer names may not contain dots
fn stream_name(queue: &str) -> String {
    queue.replace('.', "_")
}

fn consumer_name(queue: &str, group: &str) -> String {
    format!("{}-{}", stream_name(queue), group.replace('.', "_"))
}

struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acknowledger for NatsAcker {
    async fn ack(&self) -> BusResult<()> {
        self.message
            .ack()
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }

    async fn nack(&self, requeue: bool, delay: Option<Duration>) -> BusResult<()> {
        let kind = if requeue {
            AckKind::Nak(delay)
        } else {
            AckKind::Term
        };

        self.message
            .ack_with(kind)
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }
}

#[async_trait]
impl Broker for NatsBroker {
    async fn declare_queue(&self, name: &str, durable: bool) -> BusResult<()> {
        let config = Config {
            name: stream_name(name),
            subjects: vec![name.to_string()],
            retention: RetentionPolicy::Limits,
            max_age: self.max_age,
            storage: if durable {
                StorageType::File
            } else {
                StorageType::Memory
            },
            ..Default::default()
        };

        self.jetstream
            .get_or_create_stream(config)
            .await
            .map_err(|e| BusError::DeclareError(format!("{name}: {e}")))?;

        tracing::debug!(queue = %name, durable, "Stream declared");
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>, persistent: bool) -> BusResult<()> {
        if !persistent {
            return self
                .client
                .publish(queue.to_string(), payload.into())
                .await
                .map_err(|e| BusError::PublishError(e.to_string()));
        }

        // Wait for the server's PubAck so the message is stored before we return
        self.jetstream
            .publish(queue.to_string(), payload.into())
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?;

        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_group: &str) -> BusResult<Subscription> {
        let stream = self
            .jetstream
            .get_stream(stream_name(queue))
            .await
            .map_err(|e| BusError::SubscribeError(format!("{queue}: {e}")))?;

        let durable = consumer_name(queue, consumer_group);
        let consumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: self.ack_wait,
                    filter_subject: queue.to_string(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| BusError::SubscribeError(format!("{durable}: {e}")))?;

        let messages = consumer
            .stream()
            .max_messages_per_batch(1)
            .messages()
            .await
            .map_err(|e| BusError::SubscribeError(format!("{durable}: {e}")))?;

        tracing::info!(queue = %queue, consumer = %durable, "Subscribed to stream");

        let deliveries = messages.map(|result| {
            let message = result.map_err(|e| BusError::SubscribeError(e.to_string()))?;
            let delivery_count = message
                .info()
                .map(|info| u32::try_from(info.delivered).unwrap_or(u32::MAX))
                .unwrap_or(1);
            let payload = message.payload.to_vec();

            Ok(Delivery::new(
                payload,
                delivery_count,
                Box::new(NatsAcker { message }),
            ))
        });

        Ok(deliveries.boxed())
    }

    async fn close(&self) -> BusResult<()> {
        self.client
            .flush()
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_have_no_dots() {
        assert_eq!(stream_name("agent_communication"), "agent_communication");
        assert_eq!(
            stream_name("agent_communication.dead_letter"),
            "agent_communication_dead_letter"
        );
        assert_eq!(
            consumer_name("agent_communication", "support"),
            "agent_communication-support"
        );
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails_fast() {
        let result = NatsBroker::connect("nats://127.0.0.1:1").await;
        assert!(matches!(result, Err(BusError::ConnectionError(_))));
    }

    // For manual testing: docker run -p 4222:4222 nats:2.10-alpine -js

    #[tokio::test]
    #[ignore] // Requires NATS server with JetStream
    async fn test_publish_consume_ack() {
        let broker = NatsBroker::connect("nats://localhost:4222")
            .await
            .expect("NATS server must be running on localhost:4222");

        let queue = "event_bus_test_queue";
        broker.declare_queue(queue, true).await.unwrap();
        broker.declare_queue(queue, true).await.unwrap();

        broker
            .publish(queue, b"{\"type\":\"ping\"}".to_vec(), true)
            .await
            .unwrap();

        let mut sub = broker.consume(queue, "nats_test").await.unwrap();
        let delivery = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .unwrap();

        assert_eq!(delivery.payload, b"{\"type\":\"ping\"}");
        delivery.ack().await.unwrap();
    }
}
