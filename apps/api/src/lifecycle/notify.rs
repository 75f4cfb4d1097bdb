//! Notification cleanup service.
//!
//! Document notifications carry the term id they were created under; event
//! notifications carry it indirectly through the semester's owning term.
//! Either way, once that term is archived (or the reference is lost) the
//! notification is stale and is deleted.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::lifecycle::store;
use crate::models::notification::{
    is_document_type, is_event_type, related, type_list, NotificationRow, DOCUMENT_TYPES,
    EVENT_TYPES,
};
use crate::storage::{reclaim_files, FileStore};

#[derive(Debug, Default, Serialize)]
pub struct NotificationCleanupReport {
    pub notifications_removed: u64,
    pub files_reclaimed: usize,
    pub errors: Vec<String>,
}

/// Deletes document-related notifications pinned to the given term. Called
/// once per archived term, inside the archive transaction.
pub async fn purge_document_notifications(
    tx: &mut Transaction<'_, Postgres>,
    term_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "DELETE FROM notifications
         WHERE notification_type = ANY($1) AND academic_year_id = $2",
    )
    .bind(type_list(&DOCUMENT_TYPES))
    .bind(term_id)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected())
}

/// Deletes event-related notifications for the semester's owning term.
/// Event notifications store no semester reference, so cleanup is scoped at
/// term granularity; a second call for a sibling semester deletes nothing.
pub async fn purge_event_notifications(
    tx: &mut Transaction<'_, Postgres>,
    semester_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let Some(term_id) = store::term_of_semester(&mut **tx, semester_id).await? else {
        return Ok(0);
    };

    let res = sqlx::query(
        "DELETE FROM notifications
         WHERE notification_type = ANY($1) AND academic_year_id = $2",
    )
    .bind(type_list(&EVENT_TYPES))
    .bind(term_id)
    .execute(&mut **tx)
    .await?;
    Ok(res.rows_affected())
}

/// Safety-net pass run on every authenticated request: document notifications
/// with a NULL year or an archived year are stale, whatever left them behind.
/// Files referenced by the documents they point to are reclaimed as well.
pub async fn enforce_continuous_cleanup(
    pool: &PgPool,
    files: &dyn FileStore,
) -> Result<NotificationCleanupReport, AppError> {
    let mut report = NotificationCleanupReport::default();

    let mut tx = pool.begin().await?;

    let stale: Vec<NotificationRow> = sqlx::query_as(
        "SELECT * FROM notifications
         WHERE notification_type = ANY($1)
           AND (academic_year_id IS NULL
                OR academic_year_id IN
                    (SELECT id FROM academic_terms WHERE status = 'archived'))",
    )
    .bind(type_list(&DOCUMENT_TYPES))
    .fetch_all(&mut *tx)
    .await?;

    if stale.is_empty() {
        tx.rollback().await?;
        return Ok(report);
    }

    let mut org_doc_ids = Vec::new();
    let mut council_doc_ids = Vec::new();
    for notification in &stale {
        match (notification.related_id, notification.related_type.as_deref()) {
            (Some(id), Some(related::ORGANIZATION_DOCUMENT)) => org_doc_ids.push(id),
            (Some(id), Some(related::COUNCIL_DOCUMENT)) => council_doc_ids.push(id),
            _ => {}
        }
    }

    let mut keys: Vec<String> = Vec::new();
    if !org_doc_ids.is_empty() {
        let mut org_keys: Vec<String> = sqlx::query_scalar(
            "SELECT file_key FROM organization_documents
             WHERE id = ANY($1) AND file_key IS NOT NULL",
        )
        .bind(&org_doc_ids)
        .fetch_all(&mut *tx)
        .await?;
        keys.append(&mut org_keys);
    }
    if !council_doc_ids.is_empty() {
        let mut council_keys: Vec<String> = sqlx::query_scalar(
            "SELECT file_key FROM council_documents
             WHERE id = ANY($1) AND file_key IS NOT NULL",
        )
        .bind(&council_doc_ids)
        .fetch_all(&mut *tx)
        .await?;
        keys.append(&mut council_keys);
    }

    let stale_ids: Vec<Uuid> = stale.iter().map(|n| n.id).collect();
    let removed = sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
        .bind(&stale_ids)
        .execute(&mut *tx)
        .await?;
    report.notifications_removed = removed.rows_affected();

    tx.commit().await?;

    report.files_reclaimed = keys.len();
    report.errors = reclaim_files(files, &keys).await;

    info!(
        "Continuous cleanup removed {} stale notifications",
        report.notifications_removed
    );
    Ok(report)
}

/// Payload of the notification creation API used by the surrounding document
/// and event approval flows.
#[derive(Debug, Deserialize)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_id: Option<Uuid>,
    pub related_type: Option<String>,
    pub extra_data: Option<serde_json::Value>,
    /// Explicit term override. Document-related notifications default to the
    /// currently active term when this is absent.
    pub academic_year_id: Option<Uuid>,
}

/// Creates a notification row. Document-related types are stamped with the
/// active term's id so the cleanup passes can scope them later.
pub async fn create_notification(
    pool: &PgPool,
    new: NewNotification,
) -> Result<NotificationRow, AppError> {
    if !is_document_type(&new.notification_type) && !is_event_type(&new.notification_type) {
        return Err(AppError::Validation(format!(
            "Unknown notification type '{}'",
            new.notification_type
        )));
    }

    let academic_year_id = match new.academic_year_id {
        Some(id) => Some(id),
        None if is_document_type(&new.notification_type) => store::current_active_term(pool)
            .await?
            .map(|term| term.id),
        None => None,
    };

    let row = sqlx::query_as::<_, NotificationRow>(
        r#"
        INSERT INTO notifications
            (user_id, title, message, notification_type,
             related_id, related_type, academic_year_id, extra_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(new.user_id)
    .bind(&new.title)
    .bind(&new.message)
    .bind(&new.notification_type)
    .bind(new.related_id)
    .bind(&new.related_type)
    .bind(academic_year_id)
    .bind(&new.extra_data)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
