use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::*;
use crate::{RecordStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    clients: Vec<Client>,
    projects: Vec<Project>,
    employees: BTreeMap<String, Employee>,
    tasks: BTreeMap<String, Task>,
    development_tasks: BTreeMap<String, DevelopmentTask>,
    project_management: Vec<ProjectManagementRecord>,
    testing_results: Vec<TestingResultRecord>,
    deployments: Vec<DeploymentRecord>,
    tickets: BTreeMap<String, SupportTicketRecord>,
    resolutions: Vec<Resolution>,
    documents: BTreeMap<String, Document>,
}

/// In-memory [`RecordStore`]
///
/// Clones share the same tables. The `with_*` builders seed rows and the
/// accessor methods expose what handlers wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_client(self, client_id: &str, name: &str, email: &str) -> Self {
        self.lock().clients.push(Client {
            client_id: client_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            phone: None,
        });
        self
    }

    pub fn with_employee(self, employee_id: &str, name: &str) -> Self {
        self.lock().employees.insert(
            employee_id.to_string(),
            Employee {
                employee_id: employee_id.to_string(),
                name: name.to_string(),
                email: format!("{employee_id}@example.com"),
                role: "Developer".to_string(),
            },
        );
        self
    }

    pub fn with_task(self, task_id: &str, description: &str) -> Self {
        self.lock().tasks.insert(
            task_id.to_string(),
            Task {
                task_id: task_id.to_string(),
                project_id: None,
                description: description.to_string(),
                assigned_to: "unassigned".to_string(),
                status: "pending".to_string(),
                deadline: None,
                repository_url: None,
            },
        );
        self
    }

    pub fn with_development_task(self, task_id: &str, description: &str) -> Self {
        self.lock().development_tasks.insert(
            task_id.to_string(),
            DevelopmentTask {
                task_id: task_id.to_string(),
                description: description.to_string(),
                assigned_to: None,
                status: "pending".to_string(),
                repository_url: None,
            },
        );
        self
    }

    pub fn with_ticket(self, ticket_id: &str, client_id: &str, issue: &str, status: &str) -> Self {
        self.lock().tickets.insert(
            ticket_id.to_string(),
            SupportTicketRecord {
                ticket_id: ticket_id.to_string(),
                client_id: client_id.to_string(),
                issue: issue.to_string(),
                status: status.to_string(),
                timestamp: 0,
            },
        );
        self
    }

    pub fn with_document(self, document_id: &str, project_id: &str, content: &str) -> Self {
        self.lock().documents.insert(
            document_id.to_string(),
            Document {
                document_id: document_id.to_string(),
                project_id: project_id.to_string(),
                title: format!("Document {document_id}"),
                content: content.to_string(),
                timestamp: 0,
                processed: false,
            },
        );
        self
    }

    pub fn clients(&self) -> Vec<Client> {
        self.lock().clients.clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.lock().projects.clone()
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.lock().tasks.get(task_id).cloned()
    }

    pub fn development_task(&self, task_id: &str) -> Option<DevelopmentTask> {
        self.lock().development_tasks.get(task_id).cloned()
    }

    pub fn project_management(&self) -> Vec<ProjectManagementRecord> {
        self.lock().project_management.clone()
    }

    pub fn testing_results(&self) -> Vec<TestingResultRecord> {
        self.lock().testing_results.clone()
    }

    pub fn deployments(&self) -> Vec<DeploymentRecord> {
        self.lock().deployments.clone()
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<SupportTicketRecord> {
        self.lock().tickets.get(ticket_id).cloned()
    }

    pub fn resolutions(&self) -> Vec<Resolution> {
        self.lock().resolutions.clone()
    }

    pub fn document(&self, document_id: &str) -> Option<Document> {
        self.lock().documents.get(document_id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_client_id_by_email(&self, email: &str) -> StoreResult<Option<String>> {
        Ok(self
            .lock()
            .clients
            .iter()
            .find(|c| c.email == email)
            .map(|c| c.client_id.clone()))
    }

    async fn client_email(&self, client_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .lock()
            .clients
            .iter()
            .find(|c| c.client_id == client_id)
            .map(|c| c.email.clone()))
    }

    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.clients.iter().any(|c| c.client_id == client.client_id) {
            return Err(StoreError::Duplicate {
                entity: "client",
                id: client.client_id.clone(),
            });
        }
        tables.clients.push(client.clone());
        Ok(())
    }

    async fn insert_project(&self, project: &Project) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.projects.iter().any(|p| p.project_id == project.project_id) {
            return Err(StoreError::Duplicate {
                entity: "project",
                id: project.project_id.clone(),
            });
        }
        tables.projects.push(project.clone());
        Ok(())
    }

    async fn employee_name(&self, employee_id: &str) -> StoreResult<Option<String>> {
        Ok(self.lock().employees.get(employee_id).map(|e| e.name.clone()))
    }

    async fn insert_project_management(&self, record: &ProjectManagementRecord) -> StoreResult<()> {
        self.lock().project_management.push(record.clone());
        Ok(())
    }

    async fn update_task(&self, update: &TaskUpdate) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(task) = tables.tasks.get_mut(&update.task_id) else {
            return Ok(false);
        };
        task.status = update.status.clone();
        task.assigned_to = update.assigned_to.clone();
        task.deadline = Some(update.deadline);
        Ok(true)
    }

    async fn update_development_task(
        &self,
        task_id: &str,
        status: &str,
        repository_url: Option<&str>,
    ) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(task) = tables.development_tasks.get_mut(task_id) else {
            return Ok(false);
        };
        task.status = status.to_string();
        if let Some(url) = repository_url {
            task.repository_url = Some(url.to_string());
        }
        Ok(true)
    }

    async fn insert_testing_result(&self, result: &TestingResultRecord) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.testing_results.iter().any(|r| r.test_id == result.test_id) {
            return Err(StoreError::Duplicate {
                entity: "testing result",
                id: result.test_id.clone(),
            });
        }
        tables.testing_results.push(result.clone());
        Ok(())
    }

    async fn insert_deployment(&self, deployment: &DeploymentRecord) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables
            .deployments
            .iter()
            .any(|d| d.deployment_id == deployment.deployment_id)
        {
            return Err(StoreError::Duplicate {
                entity: "deployment",
                id: deployment.deployment_id.clone(),
            });
        }
        tables.deployments.push(deployment.clone());
        Ok(())
    }

    async fn ticket_status(&self, ticket_id: &str) -> StoreResult<Option<String>> {
        Ok(self.lock().tickets.get(ticket_id).map(|t| t.status.clone()))
    }

    async fn update_ticket_status(&self, ticket_id: &str, status: &str) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(ticket) = tables.tickets.get_mut(ticket_id) else {
            return Ok(false);
        };
        ticket.status = status.to_string();
        Ok(true)
    }

    async fn insert_resolution(&self, resolution: &Resolution) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables
            .resolutions
            .iter()
            .any(|r| r.resolution_id == resolution.resolution_id)
        {
            return Err(StoreError::Duplicate {
                entity: "resolution",
                id: resolution.resolution_id.clone(),
            });
        }
        tables.resolutions.push(resolution.clone());
        Ok(())
    }

    async fn document_processed(&self, document_id: &str) -> StoreResult<Option<bool>> {
        Ok(self.lock().documents.get(document_id).map(|d| d.processed))
    }

    async fn mark_document_processed(&self, document_id: &str) -> StoreResult<bool> {
        let mut tables = self.lock();
        let Some(document) = tables.documents.get_mut(document_id) else {
            return Ok(false);
        };
        document.processed = true;
        Ok(true)
    }
}
