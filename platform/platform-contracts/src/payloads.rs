use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// CLIENT-FACING PAYLOADS
// ============================================================================

/// A message to or from a client (`client_email_received`, `client_email_response`,
/// wrapped in a data product)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCommunication {
    pub client_id: String,
    pub message: String,
    pub timestamp: i64,
}

/// Payload for `new_project_request` (bare, not a data product)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProjectRequest {
    pub project_id: String,
    pub client_id: String,
    pub project_title: String,
    pub project_description: String,
    pub timestamp: i64,
}

/// Payload for `support_ticket_created`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportTicket {
    pub ticket_id: String,
    pub client_id: String,
    pub issue: String,
    pub status: String,
    pub timestamp: i64,
}

// ============================================================================
// DELIVERY PIPELINE PAYLOADS
// ============================================================================

/// A project task (`project_management_task_created`, and the
/// `project-management` data product)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManagement {
    pub project_id: String,
    pub task: String,
    pub assigned_to: String,
    pub status: String,
    /// Epoch milliseconds
    pub deadline: i64,
}

/// Payload for `development_issue_created`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevelopmentIssue {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
}

/// Outcome of a test run; payload of `testing_result_passed|failed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestingResult {
    pub test_id: String,
    pub task_id: String,
    pub passed: bool,
    pub timestamp: i64,
}

/// The part of a testing result the deployment agent reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub task_id: String,
}

/// A deployment attempt, as recorded in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub deployment_id: String,
    pub task_id: String,
    pub environment: String,
    pub status: String,
    pub timestamp: i64,
}

// ============================================================================
// INTERNAL PAYLOADS
// ============================================================================

/// An employee message (`internal_comm_message`, and the
/// `internal_comm_response` data product)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalCommunication {
    pub employee_id: String,
    pub message: String,
    pub timestamp: i64,
}

/// Payload for `documentation_update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    pub document_id: String,
    pub project_id: String,
    pub content: String,
    pub timestamp: i64,
}

/// Payload for `system_monitoring_alert`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringAlert {
    pub alert_type: String,
    #[serde(default)]
    pub details: Value,
}

/// Alert type that leads to an improvement proposal
pub const HIGH_ERROR_RATE: &str = "high_error_rate";

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_testing_result_reads_as_test_outcome() {
        let result = TestingResult {
            test_id: "test-1".to_string(),
            task_id: "task-001".to_string(),
            passed: true,
            timestamp: 1,
        };
        let outcome: TestOutcome =
            serde_json::from_value(serde_json::to_value(&result).unwrap()).unwrap();
        assert_eq!(outcome.task_id, "task-001");
    }

    #[test]
    fn test_bare_task_id_is_a_test_outcome() {
        let outcome: TestOutcome = serde_json::from_value(json!({"taskId": "task-002"})).unwrap();
        assert_eq!(outcome.task_id, "task-002");
    }

    #[test]
    fn test_development_issue_repository_is_optional() {
        let issue: DevelopmentIssue = serde_json::from_value(json!({"taskId": "t"})).unwrap();
        assert_eq!(issue.repository_url, None);
    }

    #[test]
    fn test_monitoring_alert_details_default_to_null() {
        let alert: MonitoringAlert =
            serde_json::from_value(json!({"alertType": "high_error_rate"})).unwrap();
        assert_eq!(alert.alert_type, HIGH_ERROR_RATE);
        assert!(alert.details.is_null());
    }

    #[test]
    fn test_snake_case_fields_are_rejected() {
        let result = serde_json::from_value::<SupportTicket>(json!({
            "ticket_id": "t-1",
            "client_id": "c-1",
            "issue": "login",
            "status": "open",
            "timestamp": 1
        }));
        assert!(result.is_err());
    }
}
