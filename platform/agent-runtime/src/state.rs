//! Lifecycle state of an agent process

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// `STARTING → CONNECTED → CONSUMING → (SHUTTING_DOWN | CRASHED)`
///
/// `STARTING` and `CONNECTED` may also go straight to `CRASHED`. There is
/// no way back from a terminal state; restarting is the supervisor's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    Starting,
    Connected,
    Consuming,
    ShuttingDown,
    Crashed,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Starting => "STARTING",
            AgentState::Connected => "CONNECTED",
            AgentState::Consuming => "CONSUMING",
            AgentState::ShuttingDown => "SHUTTING_DOWN",
            AgentState::Crashed => "CRASHED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::ShuttingDown | AgentState::Crashed)
    }

    pub fn can_transition_to(&self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Starting, Connected)
                | (Starting, Crashed)
                | (Connected, Consuming)
                | (Connected, Crashed)
                | (Connected, ShuttingDown)
                | (Consuming, ShuttingDown)
                | (Consuming, Crashed)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner side of the state; readers subscribe through a watch channel
#[derive(Debug)]
pub struct StateHandle {
    tx: watch::Sender<AgentState>,
}

impl StateHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AgentState::Starting);
        Self { tx }
    }

    pub fn current(&self) -> AgentState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.tx.subscribe()
    }

    /// Move to `next`; returns false and leaves the state unchanged if the
    /// transition is not allowed
    pub fn transition(&self, next: AgentState) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                tracing::info!(from = %state, to = %next, "Agent state changed");
                *state = next;
                applied = true;
            }
            applied
        });
        applied
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = StateHandle::new();
        assert_eq!(state.current(), AgentState::Starting);
        assert!(state.transition(AgentState::Connected));
        assert!(state.transition(AgentState::Consuming));
        assert!(state.transition(AgentState::ShuttingDown));
        assert_eq!(state.current(), AgentState::ShuttingDown);
    }

    #[test]
    fn test_connection_failure_never_reaches_consuming() {
        let state = StateHandle::new();
        assert!(state.transition(AgentState::Crashed));
        assert!(!state.transition(AgentState::Consuming));
        assert!(!state.transition(AgentState::Starting));
        assert_eq!(state.current(), AgentState::Crashed);
    }

    #[test]
    fn test_cannot_skip_connected() {
        let state = StateHandle::new();
        assert!(!state.transition(AgentState::Consuming));
        assert_eq!(state.current(), AgentState::Starting);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = StateHandle::new();
        let mut rx = state.subscribe();

        state.transition(AgentState::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), AgentState::Connected);
    }

    #[test]
    fn test_serializes_as_screaming_snake_case() {
        assert_eq!(
            serde_json::to_value(AgentState::ShuttingDown).unwrap(),
            "SHUTTING_DOWN"
        );
        assert_eq!(AgentState::Crashed.to_string(), "CRASHED");
    }
}
