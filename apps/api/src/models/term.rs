use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Term lifecycle states. A term is never deleted; `archived` is terminal
/// for the scheduler (only an explicit activation can bring one back).
pub mod term_status {
    pub const ACTIVE: &str = "active";
    pub const ARCHIVED: &str = "archived";
}

/// Semester lifecycle states: inactive (future) -> active -> archived.
pub mod semester_status {
    pub const INACTIVE: &str = "inactive";
    pub const ACTIVE: &str = "active";
    pub const ARCHIVED: &str = "archived";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AcademicTermRow {
    pub id: Uuid,
    pub school_year: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Document submission window, a subset of the term range.
    pub document_start_date: NaiveDate,
    pub document_end_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AcademicSemesterRow {
    pub id: Uuid,
    pub academic_term_id: Uuid,
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Inclusive date-range check used by both term and semester activation.
pub fn within_range(today: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    start <= today && today <= end
}

/// True once a period's end date has passed.
pub fn is_expired(today: NaiveDate, end: NaiveDate) -> bool {
    end < today
}

/// The status a semester should carry given today's date and its range.
/// `archived` is terminal, so callers must not apply this to an already
/// archived semester.
pub fn semester_status_for(today: NaiveDate, start: NaiveDate, end: NaiveDate) -> &'static str {
    if is_expired(today, end) {
        semester_status::ARCHIVED
    } else if start > today {
        semester_status::INACTIVE
    } else {
        semester_status::ACTIVE
    }
}
