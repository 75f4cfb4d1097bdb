//! Seed helpers for database-backed tests. Each helper inserts one row with
//! the smallest shape the schema accepts and returns its id.

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub async fn term(
    pool: &PgPool,
    school_year: &str,
    start: NaiveDate,
    end: NaiveDate,
    status: &str,
) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO academic_terms
             (school_year, start_date, end_date, document_start_date, document_end_date, status)
         VALUES ($1, $2, $3, $2, $3, $4)
         RETURNING id",
    )
    .bind(school_year)
    .bind(start)
    .bind(end)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn semester(
    pool: &PgPool,
    term_id: Uuid,
    label: &str,
    start: NaiveDate,
    end: NaiveDate,
    status: &str,
) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO academic_semesters (academic_term_id, label, start_date, end_date, status)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(term_id)
    .bind(label)
    .bind(start)
    .bind(end)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn user(pool: &PgPool, email: &str, role: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO users (email, role, google_id) VALUES ($1, $2, $3) RETURNING id")
        .bind(email)
        .bind(role)
        .bind(format!("google-{email}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A recognized, first-term organization with both officer names filled in,
/// so the reset paths have something to revoke and clear.
pub async fn organization(pool: &PgPool, name: &str, year: Option<Uuid>) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO organizations
             (name, academic_year_id, status, entity_type, adviser_name, president_name)
         VALUES ($1, $2, 'recognized', 'new', 'Adviser', 'President')
         RETURNING id",
    )
    .bind(name)
    .bind(year)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn organization_document(
    pool: &PgPool,
    organization_id: Uuid,
    year: Option<Uuid>,
    file_key: Option<&str>,
) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO organization_documents (organization_id, academic_year_id, title, file_key)
         VALUES ($1, $2, 'Constitution', $3)
         RETURNING id",
    )
    .bind(organization_id)
    .bind(year)
    .bind(file_key)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn roster_row(pool: &PgPool, semester_id: Option<Uuid>, student_number: &str) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO student_data (semester_id, student_number, full_name)
         VALUES ($1, $2, 'Juan Dela Cruz')
         RETURNING id",
    )
    .bind(semester_id)
    .bind(student_number)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn event_approval(pool: &PgPool, semester_id: Option<Uuid>, organization_id: Uuid) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO event_approvals (semester_id, organization_id, title)
         VALUES ($1, $2, 'Org Fair')
         RETURNING id",
    )
    .bind(semester_id)
    .bind(organization_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn event_document(pool: &PgPool, event_approval_id: Uuid, file_key: Option<&str>) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO event_documents (event_approval_id, file_key)
         VALUES ($1, $2)
         RETURNING id",
    )
    .bind(event_approval_id)
    .bind(file_key)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn notification(
    pool: &PgPool,
    user_id: Uuid,
    notification_type: &str,
    year: Option<Uuid>,
    related: Option<(Uuid, &str)>,
) -> Uuid {
    let (related_id, related_type) = match related {
        Some((id, kind)) => (Some(id), Some(kind)),
        None => (None, None),
    };
    sqlx::query_scalar(
        "INSERT INTO notifications
             (user_id, title, message, notification_type, related_id, related_type, academic_year_id)
         VALUES ($1, 'Title', 'Message', $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(user_id)
    .bind(notification_type)
    .bind(related_id)
    .bind(related_type)
    .bind(year)
    .fetch_one(pool)
    .await
    .unwrap()
}
