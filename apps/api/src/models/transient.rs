use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Submission of an organization, carrying the approval chain (adviser then
/// OSAS) and an optional file in storage. Deleted when its term archives.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationDocumentRow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub academic_year_id: Option<Uuid>,
    pub title: String,
    pub file_key: Option<String>,
    pub status: String,
    pub adviser_approved_at: Option<DateTime<Utc>>,
    pub osas_approved_at: Option<DateTime<Utc>>,
    pub resubmission_deadline: Option<NaiveDate>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CouncilDocumentRow {
    pub id: Uuid,
    pub council_id: Uuid,
    pub academic_year_id: Option<Uuid>,
    pub title: String,
    pub file_key: Option<String>,
    pub status: String,
    pub adviser_approved_at: Option<DateTime<Utc>>,
    pub osas_approved_at: Option<DateTime<Utc>>,
    pub resubmission_deadline: Option<NaiveDate>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentDataRow {
    pub id: Uuid,
    pub semester_id: Option<Uuid>,
    pub organization_id: Option<Uuid>,
    pub student_number: String,
    pub full_name: String,
    pub program: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventApprovalRow {
    pub id: Uuid,
    pub semester_id: Option<Uuid>,
    pub organization_id: Uuid,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventDocumentRow {
    pub id: Uuid,
    pub event_approval_id: Uuid,
    pub file_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
