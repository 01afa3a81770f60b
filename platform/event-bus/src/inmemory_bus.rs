//! In-memory implementation of the Broker trait for testing and development

use crate::{Acknowledger, Broker, BusError, BusResult, Delivery, Subscription};
use async_trait::async_trait;
use futures::stream::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Broker implementation backed by in-process state
///
/// Suitable for unit tests, local development (`BUS_TYPE=inmemory`) and
/// end-to-end scenarios that need the real delivery semantics without a
/// server:
///
/// - each queue is an append-only log
/// - each consumer group reads the log with its own cursor, so every group
///   sees every message and members of one group compete
/// - a subscription holds at most one unsettled delivery
/// - `nack(requeue = true)` puts the message back at the front of the group
/// - a delivery dropped without ack/nack is redelivered, as after a crash
///
/// Nothing survives the process, so durability flags are recorded but have
/// no effect.
///
/// # Example
/// ```rust
/// use event_bus::{Broker, InMemoryBroker};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let broker = InMemoryBroker::new();
/// broker.declare_queue("agent_communication", true).await?;
/// broker.publish("agent_communication", b"{\"type\":\"x\"}".to_vec(), true).await?;
///
/// let mut deliveries = broker.consume("agent_communication", "support").await?;
/// let delivery = deliveries.next().await.unwrap()?;
/// assert_eq!(delivery.delivery_count, 1);
/// delivery.ack().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
}

struct QueueState {
    durable: bool,
    log: Vec<Vec<u8>>,
    groups: HashMap<String, GroupState>,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct GroupState {
    cursor: usize,
    redeliver: VecDeque<usize>,
    attempts: HashMap<usize, u32>,
    in_flight: usize,
    /// Nacked with a delay and not yet back in `redeliver`
    delayed: usize,
    acked: usize,
    discarded: usize,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, QueueState>> {
        lock_queues(&self.queues)
    }

    /// Every message body ever published to `queue`, in publish order
    pub fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .get(queue)
            .map(|q| q.log.clone())
            .unwrap_or_default()
    }

    /// Whether `queue` was declared durable; `None` if never declared
    pub fn is_durable(&self, queue: &str) -> Option<bool> {
        self.lock().get(queue).map(|q| q.durable)
    }

    /// Messages the group has not yet settled (ready, in flight, or waiting out a requeue delay)
    pub fn pending(&self, queue: &str, group: &str) -> usize {
        let queues = self.lock();
        let Some(q) = queues.get(queue) else {
            return 0;
        };
        match q.groups.get(group) {
            Some(g) => (q.log.len() - g.cursor) + g.redeliver.len() + g.in_flight + g.delayed,
            None => q.log.len(),
        }
    }

    /// Messages the group has acknowledged
    pub fn acked(&self, queue: &str, group: &str) -> usize {
        self.lock()
            .get(queue)
            .and_then(|q| q.groups.get(group))
            .map(|g| g.acked)
            .unwrap_or(0)
    }

    /// Messages the group rejected without requeue
    pub fn discarded(&self, queue: &str, group: &str) -> usize {
        self.lock()
            .get(queue)
            .and_then(|q| q.groups.get(group))
            .map(|g| g.discarded)
            .unwrap_or(0)
    }

    fn take_next(
        queues: &Mutex<HashMap<String, QueueState>>,
        queue: &str,
        group: &str,
    ) -> BusResult<Option<(usize, Vec<u8>, u32)>> {
        let mut queues = lock_queues(queues);
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| BusError::SubscribeError(format!("queue {queue} was deleted")))?;

        let group_state = state.groups.entry(group.to_string()).or_default();
        let index = match group_state.redeliver.pop_front() {
            Some(index) => index,
            None if group_state.cursor < state.log.len() => {
                group_state.cursor += 1;
                group_state.cursor - 1
            }
            None => return Ok(None),
        };

        let attempts = group_state.attempts.entry(index).or_insert(0);
        *attempts += 1;
        let delivery_count = *attempts;
        group_state.in_flight += 1;

        Ok(Some((index, state.log[index].clone(), delivery_count)))
    }

    fn settle(
        queues: &Mutex<HashMap<String, QueueState>>,
        queue: &str,
        group: &str,
        index: usize,
        settlement: Settlement,
    ) {
        let mut queues = lock_queues(queues);
        let Some(state) = queues.get_mut(queue) else {
            return;
        };
        let Some(group_state) = state.groups.get_mut(group) else {
            return;
        };

        group_state.in_flight = group_state.in_flight.saturating_sub(1);
        match settlement {
            Settlement::Ack => {
                group_state.acked += 1;
                group_state.attempts.remove(&index);
            }
            Settlement::Discard => {
                group_state.discarded += 1;
                group_state.attempts.remove(&index);
            }
            Settlement::Requeue => {
                group_state.redeliver.push_front(index);
                state.notify.notify_waiters();
            }
        }
    }
}

fn lock_queues(
    queues: &Mutex<HashMap<String, QueueState>>,
) -> MutexGuard<'_, HashMap<String, QueueState>> {
    // A panicking test thread must not wedge every other subscriber
    queues.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

enum Settlement {
    Ack,
    Discard,
    Requeue,
}

struct InMemoryAcker {
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
    queue: String,
    group: String,
    index: usize,
    settled: Mutex<bool>,
    _slot: OwnedSemaphorePermit,
}

impl InMemoryAcker {
    /// Returns false if the delivery was already settled
    fn mark_settled(&self) -> bool {
        let mut settled = self.settled.lock().unwrap_or_else(|p| p.into_inner());
        !std::mem::replace(&mut *settled, true)
    }
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&self) -> BusResult<()> {
        if !self.mark_settled() {
            return Err(BusError::AckError("delivery already settled".to_string()));
        }
        InMemoryBroker::settle(&self.queues, &self.queue, &self.group, self.index, Settlement::Ack);
        Ok(())
    }

    async fn nack(&self, requeue: bool, delay: Option<Duration>) -> BusResult<()> {
        if !self.mark_settled() {
            return Err(BusError::AckError("delivery already settled".to_string()));
        }

        if !requeue {
            InMemoryBroker::settle(
                &self.queues,
                &self.queue,
                &self.group,
                self.index,
                Settlement::Discard,
            );
            return Ok(());
        }

        match delay {
            Some(delay) if !delay.is_zero() => {
                // Leave the slot free while the message waits out its delay
                {
                    let mut queues = lock_queues(&self.queues);
                    if let Some(group_state) = queues
                        .get_mut(&self.queue)
                        .and_then(|q| q.groups.get_mut(&self.group))
                    {
                        group_state.in_flight = group_state.in_flight.saturating_sub(1);
                        group_state.delayed += 1;
                    }
                }
                let queues = self.queues.clone();
                let queue = self.queue.clone();
                let group = self.group.clone();
                let index = self.index;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut guard = lock_queues(&queues);
                    if let Some(state) = guard.get_mut(&queue) {
                        if let Some(group_state) = state.groups.get_mut(&group) {
                            group_state.delayed = group_state.delayed.saturating_sub(1);
                            group_state.redeliver.push_front(index);
                        }
                        state.notify.notify_waiters();
                    }
                });
            }
            _ => InMemoryBroker::settle(
                &self.queues,
                &self.queue,
                &self.group,
                self.index,
                Settlement::Requeue,
            ),
        }
        Ok(())
    }
}

impl Drop for InMemoryAcker {
    fn drop(&mut self) {
        if self.mark_settled() {
            tracing::debug!(
                queue = %self.queue,
                group = %self.group,
                "Delivery dropped without ack, requeueing"
            );
            InMemoryBroker::settle(
                &self.queues,
                &self.queue,
                &self.group,
                self.index,
                Settlement::Requeue,
            );
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_queue(&self, name: &str, durable: bool) -> BusResult<()> {
        let mut queues = self.lock();
        if let Some(existing) = queues.get(name) {
            if existing.durable != durable {
                return Err(BusError::DeclareError(format!(
                    "queue {name} already declared with durable={}",
                    existing.durable
                )));
            }
            return Ok(());
        }

        queues.insert(
            name.to_string(),
            QueueState {
                durable,
                log: Vec::new(),
                groups: HashMap::new(),
                notify: Arc::new(Notify::new()),
            },
        );
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>, _persistent: bool) -> BusResult<()> {
        let mut queues = self.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| BusError::PublishError(format!("queue {queue} is not declared")))?;

        state.log.push(payload);
        state.notify.notify_waiters();
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_group: &str) -> BusResult<Subscription> {
        let notify = {
            let mut queues = self.lock();
            let state = queues.get_mut(queue).ok_or_else(|| {
                BusError::SubscribeError(format!("queue {queue} is not declared"))
            })?;
            state.groups.entry(consumer_group.to_string()).or_default();
            state.notify.clone()
        };

        let queues = self.queues.clone();
        let queue = queue.to_string();
        let group = consumer_group.to_string();
        let slots = Arc::new(Semaphore::new(1));

        let stream = async_stream::stream! {
            loop {
                let Ok(slot) = slots.clone().acquire_owned().await else {
                    break;
                };

                let next = loop {
                    let notified = notify.notified();
                    match InMemoryBroker::take_next(&queues, &queue, &group) {
                        Ok(Some(next)) => break Ok(next),
                        Ok(None) => notified.await,
                        Err(e) => break Err(e),
                    }
                };

                match next {
                    Ok((index, payload, delivery_count)) => {
                        let acker = InMemoryAcker {
                            queues: queues.clone(),
                            queue: queue.clone(),
                            group: group.clone(),
                            index,
                            settled: Mutex::new(false),
                            _slot: slot,
                        };
                        yield Ok(Delivery::new(payload, delivery_count, Box::new(acker)));
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}
