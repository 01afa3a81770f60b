use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{init_pool, run_migrations};
use crate::models::*;
use crate::{RecordStore, StoreError, StoreResult};

/// PostgreSQL-backed [`RecordStore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and bring the schema up to date (fail-fast)
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        tracing::info!("Record store connected, migrations applied");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn duplicate(entity: &'static str, id: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                entity,
                id: id.to_string(),
            };
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_client_id_by_email(&self, email: &str) -> StoreResult<Option<String>> {
        let id = sqlx::query_scalar::<_, String>(
            "SELECT client_id FROM clients WHERE email = $1 ORDER BY id LIMIT 1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn client_email(&self, client_id: &str) -> StoreResult<Option<String>> {
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM clients WHERE client_id = $1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(email)
    }

    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (client_id, name, email, phone, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.name)
        .bind(&client.email)
        .bind(&client.phone)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate("client", &client.client_id, e))?;
        Ok(())
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (project_id, client_id, name, description, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            "#,
        )
        .bind(&project.project_id)
        .bind(&project.client_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.status)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate("project", &project.project_id, e))?;
        Ok(())
    }

    async fn employee_name(&self, employee_id: &str) -> StoreResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM employees WHERE employee_id = $1")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn insert_project_management(&self, record: &ProjectManagementRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO project_management
                (project_id, task, assigned_to, status, deadline, timestamp, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            "#,
        )
        .bind(&record.project_id)
        .bind(&record.task)
        .bind(&record.assigned_to)
        .bind(&record.status)
        .bind(record.deadline)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_task(&self, update: &TaskUpdate) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $1, assigned_to = $2, deadline = $3, updated_at = NOW()
            WHERE task_id = $4
            "#,
        )
        .bind(&update.status)
        .bind(&update.assigned_to)
        .bind(update.deadline)
        .bind(&update.task_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_development_task(
        &self,
        task_id: &str,
        status: &str,
        repository_url: Option<&str>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE development_tasks
            SET status = $1, repository_url = COALESCE($2, repository_url), updated_at = NOW()
            WHERE task_id = $3
            "#,
        )
        .bind(status)
        .bind(repository_url)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_testing_result(&self, result: &TestingResultRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO testing_results (test_id, task_id, passed, timestamp, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
        )
        .bind(&result.test_id)
        .bind(&result.task_id)
        .bind(result.passed)
        .bind(result.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate("testing result", &result.test_id, e))?;
        Ok(())
    }

    async fn insert_deployment(&self, deployment: &DeploymentRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deployment_info
                (deployment_id, task_id, environment, status, timestamp, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            "#,
        )
        .bind(&deployment.deployment_id)
        .bind(&deployment.task_id)
        .bind(&deployment.environment)
        .bind(&deployment.status)
        .bind(deployment.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate("deployment", &deployment.deployment_id, e))?;
        Ok(())
    }

    async fn ticket_status(&self, ticket_id: &str) -> StoreResult<Option<String>> {
        let status =
            sqlx::query_scalar::<_, String>("SELECT status FROM support_tickets WHERE ticket_id = $1")
                .bind(ticket_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(status)
    }

    async fn update_ticket_status(&self, ticket_id: &str, status: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE support_tickets SET status = $1, updated_at = NOW() WHERE ticket_id = $2",
        )
        .bind(status)
        .bind(ticket_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_resolution(&self, resolution: &Resolution) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO support_resolutions (resolution_id, ticket_id, resolution, timestamp, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
        )
        .bind(&resolution.resolution_id)
        .bind(&resolution.ticket_id)
        .bind(&resolution.resolution)
        .bind(resolution.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate("resolution", &resolution.resolution_id, e))?;
        Ok(())
    }

    async fn document_processed(&self, document_id: &str) -> StoreResult<Option<bool>> {
        let processed =
            sqlx::query_scalar::<_, bool>("SELECT processed FROM documents WHERE document_id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(processed)
    }

    async fn mark_document_processed(&self, document_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE documents SET processed = TRUE, updated_at = NOW() WHERE document_id = $1",
        )
        .bind(document_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
