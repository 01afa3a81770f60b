//! # Agent Record Store
//!
//! The relational records the agents read and write, keyed by the same
//! string identifiers that travel in event payloads (`client-…`,
//! `task-…`, `ticket-…`).
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, migrations embedded
//! - [`MemoryStore`]: same contract in memory, for tests and `STORE=memory`
//!
//! Update operations return whether a row matched, so handlers can tell a
//! missing record from a successful write without a second query.

pub mod db;
mod memory;
pub mod models;
mod pg;

pub use memory::MemoryStore;
pub use models::*;
pub use pg::PgStore;

use agent_runtime::{ConfigError, HandlerError};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("duplicate {entity}: {id}")]
    Duplicate { entity: &'static str, id: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        HandlerError::Store(e.to_string())
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    // clients / projects
    async fn find_client_id_by_email(&self, email: &str) -> StoreResult<Option<String>>;
    async fn client_email(&self, client_id: &str) -> StoreResult<Option<String>>;
    async fn insert_client(&self, client: &Client) -> StoreResult<()>;
    async fn insert_project(&self, project: &Project) -> StoreResult<()>;

    async fn employee_name(&self, employee_id: &str) -> StoreResult<Option<String>>;

    // project tracking
    async fn insert_project_management(&self, record: &ProjectManagementRecord) -> StoreResult<()>;
    async fn update_task(&self, update: &TaskUpdate) -> StoreResult<bool>;

    /// Set status, and the issue URL when given
    async fn update_development_task(
        &self,
        task_id: &str,
        status: &str,
        repository_url: Option<&str>,
    ) -> StoreResult<bool>;

    async fn insert_testing_result(&self, result: &TestingResultRecord) -> StoreResult<()>;
    async fn insert_deployment(&self, deployment: &DeploymentRecord) -> StoreResult<()>;

    // support
    async fn ticket_status(&self, ticket_id: &str) -> StoreResult<Option<String>>;
    async fn update_ticket_status(&self, ticket_id: &str, status: &str) -> StoreResult<bool>;
    async fn insert_resolution(&self, resolution: &Resolution) -> StoreResult<()>;

    // documents
    async fn document_processed(&self, document_id: &str) -> StoreResult<Option<bool>>;
    async fn mark_document_processed(&self, document_id: &str) -> StoreResult<bool>;
}

/// Build the store selected by `STORE` (`postgres` default, or `memory`)
pub async fn from_env() -> StoreResult<Arc<dyn RecordStore>> {
    let kind = agent_runtime::env_or("STORE", "postgres");
    match kind.to_lowercase().as_str() {
        "memory" => {
            tracing::warn!("Using in-memory record store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        "postgres" => {
            let url = agent_runtime::require_env("DATABASE_URL")?;
            Ok(Arc::new(PgStore::connect(&url).await?))
        }
        _ => Err(StoreError::Config(ConfigError::Invalid {
            var: "STORE".to_string(),
            value: kind,
            reason: "must be 'postgres' or 'memory'".to_string(),
        })),
    }
}
