use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{
    Project, ProjectBillingInput, ProjectInput, ProjectPayment, ProjectWithBilling,
    RecordProjectPaymentInput,
};
use serde_json::json;

pub const PROJECTS: &str = r#"
query Projects {
  projects {
    id name slug description color isActive provider monthlyCost currency
    nextPaymentDate lastPaymentDate createdAt
  }
}"#;

pub const PROJECT: &str = r#"
query GetProject($id: ID!) {
  project(id: $id) {
    id name slug description color isActive provider monthlyCost currency
    nextPaymentDate lastPaymentDate createdAt updatedAt
  }
}"#;

pub const PROJECTS_WITH_BILLING: &str = r#"
query ProjectsWithBilling {
  projectsWithBilling {
    id name provider monthlyCost currency nextPaymentDate lastPaymentDate
    daysUntilPayment isOverdue
  }
}"#;

pub const PROJECT_PAYMENT_HISTORY: &str = r#"
query ProjectPaymentHistory($projectId: ID!) {
  projectPaymentHistory(projectId: $projectId) {
    id amount paymentDate note monthsCovered projectId createdAt
  }
}"#;

pub const ALL_PAYMENT_HISTORY: &str = r#"
query AllPaymentHistory($limit: Int) {
  allPaymentHistory(limit: $limit) {
    id amount paymentDate note monthsCovered createdAt
    project { id name color }
  }
}"#;

pub const CREATE_PROJECT: &str = r#"
mutation CreateProject($input: CreateProjectInput!) {
  createProject(input: $input) {
    id name slug provider monthlyCost currency nextPaymentDate
  }
}"#;

pub const UPDATE_PROJECT: &str = r#"
mutation UpdateProject($input: UpdateProjectInput!) {
  updateProject(input: $input) {
    id name description provider monthlyCost currency nextPaymentDate
  }
}"#;

pub const DELETE_PROJECT: &str = r#"
mutation DeleteProject($projectId: ID!) {
  deleteProject(projectId: $projectId)
}"#;

pub const ARCHIVE_PROJECT: &str = r#"
mutation ArchiveProject($projectId: ID!) {
  archiveProject(projectId: $projectId) { id name isActive }
}"#;

pub const RECORD_PROJECT_PAYMENT: &str = r#"
mutation RecordProjectPayment($input: RecordProjectPaymentInput!) {
  recordProjectPayment(input: $input) {
    id amount paymentDate note monthsCovered projectId createdAt
  }
}"#;

pub const UPDATE_PROJECT_BILLING: &str = r#"
mutation UpdateProjectBilling($input: UpdateProjectBillingInput!) {
  updateProjectBilling(input: $input) {
    id name provider monthlyCost currency nextPaymentDate
  }
}"#;

pub async fn list(client: &ApiClient) -> Result<Vec<Project>> {
    client.query(PROJECTS, "Projects", json!({}), "projects").await
}

pub async fn get(client: &ApiClient, id: &str) -> Result<Project> {
    let project: Option<Project> = client
        .query(PROJECT, "GetProject", json!({ "id": id }), "project")
        .await?;
    project.ok_or_else(|| Error::NotFound {
        what: format!("Project {}", id),
    })
}

pub async fn create(client: &ApiClient, input: ProjectInput) -> Result<Project> {
    validate(&input)?;
    client
        .query(
            CREATE_PROJECT,
            "CreateProject",
            json!({ "input": input }),
            "createProject",
        )
        .await
}

pub async fn update(client: &ApiClient, input: ProjectInput) -> Result<Project> {
    if input.project_id.is_none() {
        return Err(Error::validation("projectId", "required for update"));
    }
    validate(&input)?;
    client
        .query(
            UPDATE_PROJECT,
            "UpdateProject",
            json!({ "input": input }),
            "updateProject",
        )
        .await
}

fn validate(input: &ProjectInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(Error::validation("name", "must not be empty"));
    }
    if matches!(input.monthly_cost, Some(cost) if cost < 0.0) {
        return Err(Error::validation("monthlyCost", "must not be negative"));
    }
    Ok(())
}

pub async fn delete(client: &ApiClient, project_id: &str) -> Result<bool> {
    client
        .query(
            DELETE_PROJECT,
            "DeleteProject",
            json!({ "projectId": project_id }),
            "deleteProject",
        )
        .await
}

/// Toggles between archived and active
pub async fn archive(client: &ApiClient, project_id: &str) -> Result<Project> {
    client
        .query(
            ARCHIVE_PROJECT,
            "ArchiveProject",
            json!({ "projectId": project_id }),
            "archiveProject",
        )
        .await
}

pub async fn with_billing(client: &ApiClient) -> Result<Vec<ProjectWithBilling>> {
    client
        .query(
            PROJECTS_WITH_BILLING,
            "ProjectsWithBilling",
            json!({}),
            "projectsWithBilling",
        )
        .await
}

pub async fn payment_history(client: &ApiClient, project_id: &str) -> Result<Vec<ProjectPayment>> {
    client
        .query(
            PROJECT_PAYMENT_HISTORY,
            "ProjectPaymentHistory",
            json!({ "projectId": project_id }),
            "projectPaymentHistory",
        )
        .await
}

pub async fn all_payment_history(
    client: &ApiClient,
    limit: Option<u32>,
) -> Result<Vec<ProjectPayment>> {
    client
        .query(
            ALL_PAYMENT_HISTORY,
            "AllPaymentHistory",
            json!({ "limit": limit }),
            "allPaymentHistory",
        )
        .await
}

pub async fn record_payment(
    client: &ApiClient,
    input: RecordProjectPaymentInput,
) -> Result<ProjectPayment> {
    if input.amount <= 0.0 {
        return Err(Error::validation("amount", "must be greater than zero"));
    }
    client
        .query(
            RECORD_PROJECT_PAYMENT,
            "RecordProjectPayment",
            json!({ "input": input }),
            "recordProjectPayment",
        )
        .await
}

pub async fn update_billing(client: &ApiClient, input: ProjectBillingInput) -> Result<Project> {
    client
        .query(
            UPDATE_PROJECT_BILLING,
            "UpdateProjectBilling",
            json!({ "input": input }),
            "updateProjectBilling",
        )
        .await
}
