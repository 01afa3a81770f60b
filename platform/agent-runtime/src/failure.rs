//! Delivery disposition after a handler has run

use event_bus::consumer_retry::RetryConfig;
use std::str::FromStr;
use std::time::Duration;

use crate::dispatch::HandlerError;

/// What the runtime does with a failed delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Requeue retriable failures with backoff, dead-letter the rest
    Retry,
    /// Log and acknowledge every failure (the work is dropped)
    Ack,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retry" => Ok(FailurePolicy::Retry),
            "ack" => Ok(FailurePolicy::Ack),
            _ => Err("must be 'retry' or 'ack'".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Requeue { delay: Duration },
    DeadLetter { reason: String },
}

/// Decide how to settle a delivery given the handler outcome
///
/// `delivery_count` is 1 on first delivery. A retriable failure is requeued
/// while `delivery_count < retry.max_attempts`; the delivery that reaches the
/// bound is dead-lettered instead.
pub fn decide(
    policy: FailurePolicy,
    retry: &RetryConfig,
    outcome: &Result<(), HandlerError>,
    delivery_count: u32,
) -> Disposition {
    let error = match outcome {
        Ok(()) => return Disposition::Ack,
        Err(error) => error,
    };

    match policy {
        FailurePolicy::Ack => Disposition::Ack,
        FailurePolicy::Retry if !error.is_retriable() => Disposition::DeadLetter {
            reason: error.to_string(),
        },
        FailurePolicy::Retry if retry.is_exhausted(delivery_count) => Disposition::DeadLetter {
            reason: format!("{error} (gave up after {delivery_count} deliveries)"),
        },
        FailurePolicy::Retry => Disposition::Requeue {
            delay: retry.backoff_for(delivery_count),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }

    fn external() -> Result<(), HandlerError> {
        Err(HandlerError::External("slack: 503".to_string()))
    }

    #[test]
    fn test_success_is_acked_under_every_policy() {
        for policy in [FailurePolicy::Retry, FailurePolicy::Ack] {
            assert_eq!(decide(policy, &retry(3), &Ok(()), 1), Disposition::Ack);
            assert_eq!(decide(policy, &retry(3), &Ok(()), 9), Disposition::Ack);
        }
    }

    #[test]
    fn test_retriable_failure_is_requeued_with_growing_delay() {
        assert_eq!(
            decide(FailurePolicy::Retry, &retry(5), &external(), 1),
            Disposition::Requeue {
                delay: Duration::from_millis(100)
            }
        );
        assert_eq!(
            decide(FailurePolicy::Retry, &retry(5), &external(), 3),
            Disposition::Requeue {
                delay: Duration::from_millis(400)
            }
        );
    }

    #[test]
    fn test_retriable_failure_at_bound_is_dead_lettered() {
        let disposition = decide(FailurePolicy::Retry, &retry(3), &external(), 3);
        match disposition {
            Disposition::DeadLetter { reason } => {
                assert!(reason.contains("slack: 503"));
                assert!(reason.contains("3 deliveries"));
            }
            other => panic!("expected dead letter, got {other:?}"),
        }
    }

    #[test]
    fn test_permanent_failure_is_dead_lettered_on_first_delivery() {
        let outcome = Err(HandlerError::InvalidPayload("missing taskId".to_string()));
        assert!(matches!(
            decide(FailurePolicy::Retry, &retry(5), &outcome, 1),
            Disposition::DeadLetter { .. }
        ));
    }

    #[test]
    fn test_timeout_is_retriable() {
        let outcome = Err(HandlerError::Timeout(Duration::from_secs(30)));
        assert!(matches!(
            decide(FailurePolicy::Retry, &retry(5), &outcome, 1),
            Disposition::Requeue { .. }
        ));
    }

    #[test]
    fn test_ack_policy_drops_failures() {
        assert_eq!(
            decide(FailurePolicy::Ack, &retry(5), &external(), 1),
            Disposition::Ack
        );
        let permanent = Err(HandlerError::NotFound("client-9".to_string()));
        assert_eq!(
            decide(FailurePolicy::Ack, &retry(5), &permanent, 1),
            Disposition::Ack
        );
    }

    #[test]
    fn test_single_delivery_budget_never_requeues() {
        assert!(matches!(
            decide(FailurePolicy::Retry, &retry(1), &external(), 1),
            Disposition::DeadLetter { .. }
        ));
    }
}
