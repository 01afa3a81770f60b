//! Event-type dispatch table and the handler contract
//!
//! A handler receives the envelope's `data` and returns a [`HandlerError`]
//! on failure; the runtime maps the error class onto ack, requeue or
//! dead-letter. Handlers may run more than once for the same event.

use async_trait::async_trait;
use event_bus::BusError;
use platform_contracts::{DataProduct, EventType, SchemaVersionError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Failure outcome of a handler
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    SchemaVersion(#[from] SchemaVersionError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("external service error: {0}")]
    External(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("publish failed: {0}")]
    Publish(String),

    #[error("handler timed out after {0:?}")]
    Timeout(Duration),
}

impl HandlerError {
    /// Whether a later delivery of the same event could succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            HandlerError::InvalidPayload(_)
            | HandlerError::SchemaVersion(_)
            | HandlerError::NotFound(_) => false,
            HandlerError::External(_)
            | HandlerError::Store(_)
            | HandlerError::Publish(_)
            | HandlerError::Timeout(_) => true,
        }
    }
}

impl From<BusError> for HandlerError {
    fn from(e: BusError) -> Self {
        HandlerError::Publish(e.to_string())
    }
}

/// Parse an envelope's `data` into a typed payload
pub fn parse_payload<T: DeserializeOwned>(data: Value) -> Result<T, HandlerError> {
    serde_json::from_value(data).map_err(|e| HandlerError::InvalidPayload(e.to_string()))
}

/// Parse a data product and check its schema version before exposing the payload
pub fn parse_data_product<T: DeserializeOwned>(
    data: Value,
) -> Result<DataProduct<T>, HandlerError> {
    // Version first, so a future major with a new shape reports SchemaVersion
    if let Some(version) = data.get("schemaVersion").and_then(Value::as_str) {
        platform_contracts::check_schema_version(version)?;
    }

    let product: DataProduct<T> = parse_payload(data)?;
    product.check_schema_version()?;
    Ok(product)
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, data: Value) -> Result<(), HandlerError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, data: Value) -> Result<(), HandlerError> {
        (self.0)(data).await
    }
}

/// Mapping from event type to handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<EventType, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; a second registration for the same type replaces the first
    pub fn register(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) -> &mut Self {
        if self.handlers.insert(event_type, handler).is_some() {
            tracing::warn!(event_type = %event_type, "Handler replaced");
        }
        self
    }

    /// Register an async closure as a handler
    pub fn on<F, Fut>(&mut self, event_type: EventType, f: F) -> &mut Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.register(event_type, Arc::new(FnHandler(f)))
    }

    /// Handler for a wire tag; `None` for unregistered or unknown tags
    pub fn get(&self, tag: &str) -> Option<Arc<dyn EventHandler>> {
        EventType::parse(tag).and_then(|t| self.handlers.get(&t).cloned())
    }

    /// Registered event types in catalogue order
    pub fn event_types(&self) -> Vec<EventType> {
        self.handlers.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.event_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform_contracts::payloads::{ClientCommunication, TestOutcome};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_error_classes() {
        assert!(!HandlerError::InvalidPayload("x".into()).is_retriable());
        assert!(!HandlerError::NotFound("x".into()).is_retriable());
        assert!(HandlerError::External("x".into()).is_retriable());
        assert!(HandlerError::Store("x".into()).is_retriable());
        assert!(HandlerError::Publish("x".into()).is_retriable());
        assert!(HandlerError::Timeout(Duration::from_secs(1)).is_retriable());

        let schema = HandlerError::from(SchemaVersionError::Malformed("x".into()));
        assert!(!schema.is_retriable());
    }

    #[test]
    fn test_parse_payload_reports_shape_errors() {
        let outcome: TestOutcome = parse_payload(json!({"taskId": "task-001"})).unwrap();
        assert_eq!(outcome.task_id, "task-001");

        let err = parse_payload::<TestOutcome>(json!({"task": "task-001"})).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));

        let err = parse_payload::<TestOutcome>(Value::Null).unwrap_err();
        assert!(matches!(err, HandlerError::InvalidPayload(_)));
    }

    #[test]
    fn test_parse_data_product_checks_version_first() {
        let future = json!({
            "name": "client-communication",
            "schemaVersion": "2.0.0",
            "timestamp": 1,
            "payload": {"client": "renamed field"}
        });
        let err = parse_data_product::<ClientCommunication>(future).unwrap_err();
        assert!(matches!(err, HandlerError::SchemaVersion(_)));

        let current = json!({
            "name": "client-communication",
            "schemaVersion": "1.2.0",
            "timestamp": 1,
            "payload": {"clientId": "client-1", "message": "hi", "timestamp": 2}
        });
        let product = parse_data_product::<ClientCommunication>(current).unwrap();
        assert_eq!(product.payload.client_id, "client-1");
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_tag() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut registry = HandlerRegistry::new();
        registry.on(EventType::SupportTicketCreated, move |_data| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handler = registry.get("support_ticket_created").unwrap();
        handler.handle(json!({})).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(registry.get("documentation_update").is_none());
        assert!(registry.get("not_a_catalogued_type").is_none());
        assert!(registry.get("").is_none());
        assert_eq!(registry.event_types(), vec![EventType::SupportTicketCreated]);
    }

    #[tokio::test]
    async fn test_second_registration_replaces_first() {
        let mut registry = HandlerRegistry::new();
        registry
            .on(EventType::DocumentationUpdate, |_| async {
                Err(HandlerError::External("old".into()))
            })
            .on(EventType::DocumentationUpdate, |_| async { Ok(()) });

        let handler = registry.get("documentation_update").unwrap();
        assert!(handler.handle(json!({})).await.is_ok());
        assert_eq!(registry.event_types().len(), 1);
    }
}
