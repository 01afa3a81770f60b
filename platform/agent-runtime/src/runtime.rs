//! The per-process agent harness
//!
//! One [`AgentRuntime`] per process owns the broker handle created while
//! `STARTING`, hands out a [`Publisher`] bound to it, and runs the consume
//! loop one delivery at a time.

use event_bus::{decode, Broker, BusError, Delivery, InMemoryBroker, NatsBroker};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::{BusType, RuntimeConfig};
use crate::dispatch::{HandlerError, HandlerRegistry};
use crate::dlq::{send_to_dlq, DeadLetter};
use crate::failure::{decide, Disposition};
use crate::metrics::{DeliveryOutcome, RuntimeMetrics};
use crate::publisher::Publisher;
use crate::state::{AgentState, StateHandle};

/// Extra time the broker waits for an ack beyond the handler timeout
const ACK_WAIT_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("broker connection failed: {0}")]
    Connection(BusError),

    #[error("broker error: {0}")]
    Broker(BusError),

    #[error("delivery stream ended unexpectedly")]
    StreamEnded,

    #[error("operation not allowed in state {0}")]
    InvalidState(AgentState),

    #[error("metrics registry: {0}")]
    Metrics(String),
}

pub struct AgentRuntime {
    agent: String,
    config: RuntimeConfig,
    state: Arc<StateHandle>,
    metrics: RuntimeMetrics,
    broker: Option<Arc<dyn Broker>>,
}

impl AgentRuntime {
    pub fn new(agent: &str, config: RuntimeConfig) -> Result<Self, RuntimeError> {
        let metrics = RuntimeMetrics::new().map_err(|e| RuntimeError::Metrics(e.to_string()))?;
        Ok(Self {
            agent: agent.to_string(),
            config,
            state: Arc::new(StateHandle::new()),
            metrics,
            broker: None,
        })
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        self.state.current()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.metrics.clone()
    }

    /// Health and metrics router for this agent
    pub fn health_router(&self) -> axum::Router {
        crate::health::router(&self.agent, self.subscribe_state(), self.metrics())
    }

    /// Build the configured broker (one attempt) and declare the queues
    pub async fn connect(&mut self) -> Result<Publisher, RuntimeError> {
        let broker: Arc<dyn Broker> = match self.config.bus_type {
            BusType::InMemory => {
                tracing::info!(agent = %self.agent, "Using in-memory broker");
                Arc::new(InMemoryBroker::new())
            }
            BusType::Nats => {
                tracing::info!(agent = %self.agent, url = %self.config.broker_url, "Connecting to NATS");
                match NatsBroker::connect(&self.config.broker_url).await {
                    Ok(broker) => {
                        Arc::new(broker.with_ack_wait(self.config.handler_timeout + ACK_WAIT_MARGIN))
                    }
                    Err(e) => {
                        self.state.transition(AgentState::Crashed);
                        tracing::error!(agent = %self.agent, error = %e, "Broker connection failed");
                        return Err(RuntimeError::Connection(e));
                    }
                }
            }
        };

        self.connect_with(broker).await
    }

    /// Adopt an already-built broker (tests, embedding) and declare the queues
    pub async fn connect_with(&mut self, broker: Arc<dyn Broker>) -> Result<Publisher, RuntimeError> {
        let current = self.state.current();
        if current != AgentState::Starting {
            return Err(RuntimeError::InvalidState(current));
        }

        let queue = &self.config.queue_name;
        let declared = async {
            broker.declare_queue(queue, true).await?;
            broker
                .declare_queue(&event_bus::dead_letter_queue(queue), true)
                .await
        }
        .await;

        if let Err(e) = declared {
            self.state.transition(AgentState::Crashed);
            tracing::error!(agent = %self.agent, queue = %queue, error = %e, "Queue declaration failed");
            return Err(RuntimeError::Broker(e));
        }

        self.state.transition(AgentState::Connected);
        self.broker = Some(broker.clone());

        Ok(Publisher::new(broker, queue, &self.agent))
    }

    /// Consume until `shutdown` resolves or the subscription fails
    ///
    /// Deliveries are processed strictly one at a time; `shutdown` is only
    /// observed between deliveries, so the in-flight handler always finishes.
    pub async fn run<S>(&self, registry: HandlerRegistry, shutdown: S) -> Result<(), RuntimeError>
    where
        S: Future<Output = ()> + Send,
    {
        let current = self.state.current();
        let broker = match (&self.broker, current) {
            (Some(broker), AgentState::Connected) => broker.clone(),
            _ => return Err(RuntimeError::InvalidState(current)),
        };

        let handled: Vec<&'static str> = registry.event_types().iter().map(|t| t.as_str()).collect();
        tracing::info!(
            agent = %self.agent,
            queue = %self.config.queue_name,
            consumer_group = %self.config.consumer_group,
            handled = ?handled,
            "Registering dispatch table"
        );

        let mut deliveries = match broker
            .consume(&self.config.queue_name, &self.config.consumer_group)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                self.state.transition(AgentState::Crashed);
                tracing::error!(agent = %self.agent, error = %e, "Subscribe failed");
                return Err(RuntimeError::Broker(e));
            }
        };

        self.state.transition(AgentState::Consuming);
        self.metrics.agent_up.with_label_values(&[self.agent.as_str()]).set(1);

        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                item = deliveries.next() => Some(item),
            };

            match next {
                None => break,
                Some(Some(Ok(delivery))) => self.process(broker.as_ref(), &registry, delivery).await,
                Some(Some(Err(e))) => {
                    self.crash();
                    tracing::error!(agent = %self.agent, error = %e, "Delivery stream failed");
                    return Err(RuntimeError::Broker(e));
                }
                Some(None) => {
                    self.crash();
                    tracing::error!(agent = %self.agent, "Delivery stream ended");
                    return Err(RuntimeError::StreamEnded);
                }
            }
        }

        self.state.transition(AgentState::ShuttingDown);
        self.metrics.agent_up.with_label_values(&[self.agent.as_str()]).set(0);
        drop(deliveries);

        if let Err(e) = broker.close().await {
            tracing::warn!(agent = %self.agent, error = %e, "Broker close failed");
        }
        tracing::info!(agent = %self.agent, "Agent stopped");
        Ok(())
    }

    fn crash(&self) {
        self.state.transition(AgentState::Crashed);
        self.metrics.agent_up.with_label_values(&[self.agent.as_str()]).set(0);
    }

    async fn process(&self, broker: &dyn Broker, registry: &HandlerRegistry, delivery: Delivery) {
        let envelope = match decode(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(
                    agent = %self.agent,
                    delivery_count = delivery.delivery_count,
                    error = %e,
                    "Dropping undecodable message"
                );
                self.settle_ack(delivery, DeliveryOutcome::DecodeFailed).await;
                return;
            }
        };

        let span = tracing::info_span!(
            "handle_event",
            agent = %self.agent,
            event_type = %envelope.event_type,
            delivery_count = delivery.delivery_count
        );

        async {
            let Some(handler) = registry.get(&envelope.event_type) else {
                tracing::info!("No handler for event type, acknowledging");
                self.settle_ack(delivery, DeliveryOutcome::Unhandled).await;
                return;
            };

            let timeout = self.config.handler_timeout;
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, handler.handle(envelope.data)).await {
                Ok(result) => result,
                Err(_) => Err(HandlerError::Timeout(timeout)),
            };
            self.metrics
                .handler_duration_seconds
                .with_label_values(&[self.agent.as_str(), envelope.event_type.as_str()])
                .observe(started.elapsed().as_secs_f64());

            let disposition = decide(
                self.config.failure_policy,
                &self.config.retry,
                &outcome,
                delivery.delivery_count,
            );

            match (disposition, &outcome) {
                (Disposition::Ack, Ok(())) => {
                    tracing::debug!("Event handled");
                    self.settle_ack(delivery, DeliveryOutcome::Acked).await;
                }
                (Disposition::Ack, Err(e)) => {
                    tracing::error!(error = %e, "Handler failed, acknowledging without retry");
                    self.settle_ack(delivery, DeliveryOutcome::Acked).await;
                }
                (Disposition::Requeue { delay }, _) => {
                    if let Err(e) = &outcome {
                        tracing::warn!(
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Handler failed, requeueing"
                        );
                    }
                    if let Err(e) = delivery.nack_with_delay(delay).await {
                        tracing::warn!(error = %e, "Requeue failed");
                    }
                    self.metrics.record(&self.agent, DeliveryOutcome::Requeued);
                }
                (Disposition::DeadLetter { reason }, _) => {
                    let record = DeadLetter::new(
                        &self.agent,
                        &self.config.queue_name,
                        &reason,
                        delivery.delivery_count,
                        Some(&envelope.event_type),
                        &delivery.payload,
                    );

                    if send_to_dlq(broker, &record).await.is_ok() {
                        self.settle_ack(delivery, DeliveryOutcome::DeadLettered).await;
                    } else {
                        // Keep the message rather than lose it
                        if let Err(e) = delivery.nack_with_delay(self.config.retry.max_backoff).await {
                            tracing::warn!(error = %e, "Requeue failed");
                        }
                        self.metrics.record(&self.agent, DeliveryOutcome::Requeued);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn settle_ack(&self, delivery: Delivery, outcome: DeliveryOutcome) {
        match delivery.ack().await {
            Ok(()) => self.metrics.record(&self.agent, outcome),
            Err(e) => tracing::warn!(agent = %self.agent, error = %e, "Ack failed"),
        }
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("agent", &self.agent)
            .field("state", &self.state.current())
            .field("queue", &self.config.queue_name)
            .finish()
    }
}

/// Log a startup failure and exit nonzero
pub fn fatal(context: &str, error: impl std::fmt::Display) -> ! {
    tracing::error!(error = %error, "{context}");
    std::process::exit(1)
}
