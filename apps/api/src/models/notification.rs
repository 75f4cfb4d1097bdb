use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Notification types tied to the document approval flow. These carry an
/// `academic_year_id` stamped at creation time from the active term.
pub const DOCUMENT_TYPES: [&str; 4] = [
    "document_submitted",
    "document_approved",
    "document_rejected",
    "document_resubmission",
];

/// Notification types tied to event approvals. These carry no semester
/// reference; cleanup resolves the semester's owning term instead.
pub const EVENT_TYPES: [&str; 3] = ["event_submitted", "event_approved", "event_rejected"];

/// Values allowed in `related_type` for document notifications.
pub mod related {
    pub const ORGANIZATION_DOCUMENT: &str = "organization_document";
    pub const COUNCIL_DOCUMENT: &str = "council_document";
}

pub fn is_document_type(notification_type: &str) -> bool {
    DOCUMENT_TYPES.contains(&notification_type)
}

pub fn is_event_type(notification_type: &str) -> bool {
    EVENT_TYPES.contains(&notification_type)
}

/// Owned copy of a type set, in the form sqlx binds as a Postgres text[].
pub fn type_list(kinds: &[&str]) -> Vec<String> {
    kinds.iter().map(|k| k.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub academic_year_id: Option<Uuid>,
    pub extra_data: Option<Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
