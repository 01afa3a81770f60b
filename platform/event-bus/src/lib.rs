//! # Agent Queue Abstraction
//!
//! Every agent process talks to the others through exactly one durable
//! queue. This crate owns the pieces every agent shares:
//!
//! - the `{type, data}` envelope and its JSON codec
//! - the [`Broker`] trait (declare, publish, consume, ack/nack)
//! - two brokers behind that trait, selected by config
//!
//! ## Implementations
//!
//! - **NatsBroker**: production broker on NATS JetStream
//! - **InMemoryBroker**: test/dev broker with the same delivery semantics
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_bus::{Broker, Envelope, InMemoryBroker, AGENT_QUEUE};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = InMemoryBroker::new();
//! broker.declare_queue(AGENT_QUEUE, true).await?;
//!
//! let envelope = Envelope::new("testing_result_passed", serde_json::json!({"taskId": "task-001"}));
//! broker.publish_envelope(AGENT_QUEUE, &envelope).await?;
//!
//! let mut deliveries = broker.consume(AGENT_QUEUE, "deployment").await?;
//! if let Some(Ok(delivery)) = deliveries.next().await {
//!     let received = event_bus::decode(&delivery.payload)?;
//!     assert_eq!(received.event_type, "testing_result_passed");
//!     delivery.ack().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod consumer_retry;
mod envelope;
mod inmemory_bus;
mod nats_bus;

pub use envelope::{decode, encode, DecodeError, Envelope};
pub use inmemory_bus::InMemoryBroker;
pub use nats_bus::NatsBroker;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::time::Duration;

/// Name of the single queue shared by every agent
pub const AGENT_QUEUE: &str = "agent_communication";

/// Suffix of the queue that receives dead-lettered deliveries
pub const DEAD_LETTER_SUFFIX: &str = ".dead_letter";

/// Dead-letter queue name for a given work queue
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}{DEAD_LETTER_SUFFIX}")
}

/// Errors that can occur when talking to the broker
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("failed to declare queue: {0}")]
    DeclareError(String),

    #[error("failed to publish message: {0}")]
    PublishError(String),

    #[error("failed to subscribe to queue: {0}")]
    SubscribeError(String),

    #[error("failed to settle delivery: {0}")]
    AckError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for broker operations
pub type BusResult<T> = Result<T, BusError>;

/// Settles one delivery with the broker.
///
/// Implementations are handed out inside a [`Delivery`]; a delivery dropped
/// without being settled is redelivered by the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> BusResult<()>;

    /// Negative acknowledgement. `requeue = false` discards the message;
    /// `delay` asks the broker to hold the redelivery back.
    async fn nack(&self, requeue: bool, delay: Option<Duration>) -> BusResult<()>;
}

/// A message handed to a consumer, awaiting acknowledgement
pub struct Delivery {
    /// Raw message body as published
    pub payload: Vec<u8>,
    /// How many times this message has been delivered, starting at 1
    pub delivery_count: u32,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, delivery_count: u32, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            delivery_count,
            acker,
        }
    }

    /// True when the broker has delivered this message before
    pub fn redelivered(&self) -> bool {
        self.delivery_count > 1
    }

    pub async fn ack(self) -> BusResult<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> BusResult<()> {
        self.acker.nack(requeue, None).await
    }

    /// Requeue after `delay`, so a failing message is not redelivered in a hot loop
    pub async fn nack_with_delay(self, delay: Duration) -> BusResult<()> {
        self.acker.nack(true, Some(delay)).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("delivery_count", &self.delivery_count)
            .finish()
    }
}

/// Stream of deliveries for one subscription
pub type Subscription = BoxStream<'static, BusResult<Delivery>>;

/// Broker client shared by all agents.
///
/// A subscription never holds more than one unacknowledged delivery, so one
/// slow agent cannot hoard the backlog.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declare a queue. Idempotent: every agent calls it on startup.
    async fn declare_queue(&self, name: &str, durable: bool) -> BusResult<()>;

    /// Publish raw bytes to a queue.
    ///
    /// With `persistent = true` the call returns once the broker has stored
    /// the message; it never waits for consumer processing.
    async fn publish(&self, queue: &str, payload: Vec<u8>, persistent: bool) -> BusResult<()>;

    /// Subscribe to a queue as a member of `consumer_group`.
    ///
    /// Subscribers in the same group compete for messages; each group
    /// receives every message published to the queue.
    async fn consume(&self, queue: &str, consumer_group: &str) -> BusResult<Subscription>;

    /// Release the connection. Pending publishes are flushed first.
    async fn close(&self) -> BusResult<()> {
        Ok(())
    }

    /// Encode and publish an envelope as a persistent message
    async fn publish_envelope(&self, queue: &str, envelope: &Envelope) -> BusResult<()> {
        let payload =
            encode(envelope).map_err(|e| BusError::SerializationError(e.to_string()))?;
        self.publish(queue, payload, true).await
    }
}

impl fmt::Debug for dyn Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Broker")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letter_queue_name() {
        assert_eq!(
            dead_letter_queue(AGENT_QUEUE),
            "agent_communication.dead_letter"
        );
    }
}
