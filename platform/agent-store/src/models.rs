use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub client_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub project_id: String,
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub employee_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// A row of `project_management`: one task as seen by the project tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectManagementRecord {
    pub project_id: String,
    pub task: String,
    pub assigned_to: String,
    pub status: String,
    pub deadline: DateTime<Utc>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// New state of a row in `tasks`
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub task_id: String,
    pub status: String,
    pub assigned_to: String,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub task_id: String,
    pub project_id: Option<String>,
    pub description: String,
    pub assigned_to: String,
    pub status: String,
    pub deadline: Option<DateTime<Utc>>,
    pub repository_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DevelopmentTask {
    pub task_id: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub status: String,
    pub repository_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TestingResultRecord {
    pub test_id: String,
    pub task_id: String,
    pub passed: bool,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeploymentRecord {
    pub deployment_id: String,
    pub task_id: String,
    pub environment: String,
    pub status: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupportTicketRecord {
    pub ticket_id: String,
    pub client_id: String,
    pub issue: String,
    pub status: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resolution {
    pub resolution_id: String,
    pub ticket_id: String,
    pub resolution: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub document_id: String,
    pub project_id: String,
    pub title: String,
    pub content: String,
    pub timestamp: i64,
    pub processed: bool,
}
