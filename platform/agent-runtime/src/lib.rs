//! # Agent Runtime
//!
//! The harness every agent process runs in:
//!
//! ```text
//! STARTING ──connect──▶ CONNECTED ──run──▶ CONSUMING ──shutdown──▶ SHUTTING_DOWN
//!     │                     │                  │
//!     └──────────────┬──────┴──────────────────┘
//!                    ▼
//!                 CRASHED  (process exits nonzero; restart is external)
//! ```
//!
//! Per delivery the runtime decodes the envelope, looks the `type` up in
//! the [`HandlerRegistry`] and settles the delivery from the handler's
//! [`HandlerError`] class:
//!
//! | Outcome | Settlement |
//! |---|---|
//! | undecodable body | ack, error log |
//! | unknown / unregistered type | ack, info log |
//! | `Ok(())` | ack |
//! | retriable error, budget left | nack with backoff delay |
//! | retriable error at `MAX_DELIVERIES`, or permanent error | dead-letter record, then ack |
//!
//! With `FAILURE_POLICY=ack` every handler failure is logged and acked.

pub mod config;
pub mod dispatch;
pub mod dlq;
pub mod failure;
pub mod health;
pub mod metrics;
pub mod publisher;
pub mod runtime;
pub mod scheduler;
pub mod shutdown;
pub mod state;
pub mod telemetry;

pub use config::{env_or, require_env, BusType, ConfigError, RuntimeConfig};
pub use dispatch::{parse_data_product, parse_payload, EventHandler, HandlerError, HandlerRegistry};
pub use failure::FailurePolicy;
pub use metrics::{tag, MetricsSink};
pub use publisher::Publisher;
pub use runtime::{fatal, AgentRuntime, RuntimeError};
pub use state::AgentState;
