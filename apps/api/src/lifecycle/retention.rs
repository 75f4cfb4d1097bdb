//! Retention enforcer.
//!
//! Documents, roster rows and event approvals are transient: they belong to
//! exactly one term or semester and are deleted once that period is archived
//! or the reference is lost. Deletion is hard and final; there is no archive
//! copy. Row deletion happens inside the caller's transaction, file
//! reclamation happens after commit so a rollback never loses a file.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::lifecycle::store;
use crate::models::transient::{
    CouncilDocumentRow, EventApprovalRow, EventDocumentRow, OrganizationDocumentRow,
};
use crate::storage::{reclaim_files, FileStore};

#[derive(Debug, Default, Serialize)]
pub struct TermPurge {
    pub documents_purged: u64,
    pub roster_rows_purged: u64,
    /// File keys referenced by the purged documents, to be reclaimed from
    /// storage once the transaction commits.
    #[serde(skip)]
    pub file_keys: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct StudentDataReport {
    pub rows_removed: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct EventCleanupReport {
    pub approvals_removed: u64,
    pub documents_removed: u64,
    pub approvals_reassigned: u64,
    pub orphan_documents_removed: u64,
    pub errors: Vec<String>,
}

/// Deletes every organization/council document pinned to the term and every
/// roster row whose semester belongs to it. Returns counts for auditing plus
/// the file keys the caller must reclaim after commit.
pub async fn purge_for_term(
    tx: &mut Transaction<'_, Postgres>,
    term_id: Uuid,
) -> Result<TermPurge, sqlx::Error> {
    let mut purge = TermPurge::default();

    let org_docs_rows = sqlx::query_as::<_, OrganizationDocumentRow>(
        "SELECT * FROM organization_documents WHERE academic_year_id = $1",
    )
    .bind(term_id)
    .fetch_all(&mut **tx)
    .await?;
    purge
        .file_keys
        .extend(org_docs_rows.into_iter().filter_map(|d| d.file_key));

    let council_doc_rows = sqlx::query_as::<_, CouncilDocumentRow>(
        "SELECT * FROM council_documents WHERE academic_year_id = $1",
    )
    .bind(term_id)
    .fetch_all(&mut **tx)
    .await?;
    purge
        .file_keys
        .extend(council_doc_rows.into_iter().filter_map(|d| d.file_key));

    let org_docs = sqlx::query("DELETE FROM organization_documents WHERE academic_year_id = $1")
        .bind(term_id)
        .execute(&mut **tx)
        .await?;
    purge.documents_purged += org_docs.rows_affected();

    let council_docs = sqlx::query("DELETE FROM council_documents WHERE academic_year_id = $1")
        .bind(term_id)
        .execute(&mut **tx)
        .await?;
    purge.documents_purged += council_docs.rows_affected();

    let roster = sqlx::query(
        "DELETE FROM student_data
         WHERE semester_id IN (SELECT id FROM academic_semesters WHERE academic_term_id = $1)",
    )
    .bind(term_id)
    .execute(&mut **tx)
    .await?;
    purge.roster_rows_purged = roster.rows_affected();

    info!(
        "Purged {} documents and {} roster rows for term {term_id}",
        purge.documents_purged, purge.roster_rows_purged
    );
    Ok(purge)
}

/// Enforces the roster invariant: at most one semester's roster data exists
/// at a time. Rows with a NULL or archived semester go unconditionally; if
/// exactly one semester is active, rows belonging to any other semester go
/// as well.
pub async fn enforce_student_data_invariant(pool: &PgPool) -> Result<StudentDataReport, AppError> {
    let mut tx = pool.begin().await?;
    let mut removed = 0;

    let null_refs = sqlx::query("DELETE FROM student_data WHERE semester_id IS NULL")
        .execute(&mut *tx)
        .await?;
    removed += null_refs.rows_affected();

    let archived = sqlx::query(
        "DELETE FROM student_data
         WHERE semester_id IN (SELECT id FROM academic_semesters WHERE status = 'archived')",
    )
    .execute(&mut *tx)
    .await?;
    removed += archived.rows_affected();

    let active = store::active_semesters(&mut *tx).await?;
    if let [only] = active.as_slice() {
        let mismatched = sqlx::query("DELETE FROM student_data WHERE semester_id <> $1")
            .bind(only.id)
            .execute(&mut *tx)
            .await?;
        removed += mismatched.rows_affected();
    }

    tx.commit().await?;
    if removed > 0 {
        info!("Student data invariant removed {removed} roster rows");
    }
    Ok(StudentDataReport { rows_removed: removed })
}

/// Enforces the event approval invariant:
/// - approvals with a NULL or archived semester are deleted along with their
///   documents, and each document's file is reclaimed;
/// - approvals pinned to a future (inactive) semester move to the active
///   semester, when there is one;
/// - event documents whose parent approval is gone are swept regardless of
///   semester state, as a safety net against partial failures elsewhere.
pub async fn enforce_event_approval_invariant(
    pool: &PgPool,
    files: &dyn FileStore,
) -> Result<EventCleanupReport, AppError> {
    let mut report = EventCleanupReport::default();
    let mut keys_to_reclaim: Vec<String> = Vec::new();

    let mut tx = pool.begin().await?;

    let stale: Vec<EventApprovalRow> = sqlx::query_as(
        "SELECT * FROM event_approvals
         WHERE semester_id IS NULL
            OR semester_id IN (SELECT id FROM academic_semesters WHERE status = 'archived')",
    )
    .fetch_all(&mut *tx)
    .await?;
    let stale_ids: Vec<Uuid> = stale.iter().map(|a| a.id).collect();

    if !stale_ids.is_empty() {
        let stale_docs: Vec<EventDocumentRow> = sqlx::query_as(
            "SELECT * FROM event_documents WHERE event_approval_id = ANY($1)",
        )
        .bind(&stale_ids)
        .fetch_all(&mut *tx)
        .await?;
        keys_to_reclaim.extend(stale_docs.into_iter().filter_map(|d| d.file_key));

        let docs = sqlx::query("DELETE FROM event_documents WHERE event_approval_id = ANY($1)")
            .bind(&stale_ids)
            .execute(&mut *tx)
            .await?;
        report.documents_removed = docs.rows_affected();

        let approvals = sqlx::query("DELETE FROM event_approvals WHERE id = ANY($1)")
            .bind(&stale_ids)
            .execute(&mut *tx)
            .await?;
        report.approvals_removed = approvals.rows_affected();
    }

    // Approvals filed under a future semester follow the calendar: once some
    // semester is active, they belong to it.
    let active = store::active_semesters(&mut *tx).await?;
    if let [only] = active.as_slice() {
        let reassigned = sqlx::query(
            "UPDATE event_approvals SET semester_id = $1
             WHERE semester_id IN (SELECT id FROM academic_semesters WHERE status = 'inactive')",
        )
        .bind(only.id)
        .execute(&mut *tx)
        .await?;
        report.approvals_reassigned = reassigned.rows_affected();
    }

    // Orphan sweep.
    let orphan_docs: Vec<EventDocumentRow> = sqlx::query_as(
        "SELECT * FROM event_documents d
         WHERE NOT EXISTS (SELECT 1 FROM event_approvals a WHERE a.id = d.event_approval_id)",
    )
    .fetch_all(&mut *tx)
    .await?;
    keys_to_reclaim.extend(orphan_docs.into_iter().filter_map(|d| d.file_key));

    let orphans = sqlx::query(
        "DELETE FROM event_documents d
         WHERE NOT EXISTS (SELECT 1 FROM event_approvals a WHERE a.id = d.event_approval_id)",
    )
    .execute(&mut *tx)
    .await?;
    report.orphan_documents_removed = orphans.rows_affected();

    tx.commit().await?;

    report.errors = reclaim_files(files, &keys_to_reclaim).await;

    if report.approvals_removed > 0 || report.orphan_documents_removed > 0 {
        info!(
            "Event approval invariant removed {} approvals, {} documents, {} orphans",
            report.approvals_removed, report.documents_removed, report.orphan_documents_removed
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing as seed;
    use crate::lifecycle::testing::d;
    use crate::storage::testing::MemoryFileStore;

    #[sqlx::test]
    async fn roster_rows_outside_the_active_semester_are_removed(pool: PgPool) {
        let term = seed::term(&pool, "2024-2025", d(2024, 6, 1), d(2025, 5, 31), "active").await;
        let active =
            seed::semester(&pool, term, "1st Semester", d(2024, 8, 1), d(2024, 12, 20), "active")
                .await;
        let archived =
            seed::semester(&pool, term, "Summer", d(2024, 6, 1), d(2024, 7, 31), "archived").await;
        let inactive =
            seed::semester(&pool, term, "2nd Semester", d(2025, 1, 6), d(2025, 5, 31), "inactive")
                .await;

        let kept = seed::roster_row(&pool, Some(active), "2021-00001").await;
        seed::roster_row(&pool, None, "2021-00002").await;
        seed::roster_row(&pool, Some(archived), "2021-00003").await;
        seed::roster_row(&pool, Some(inactive), "2021-00004").await;

        let report = enforce_student_data_invariant(&pool).await.unwrap();
        assert_eq!(report.rows_removed, 3);

        let remaining: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM student_data")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, vec![kept]);
    }

    #[sqlx::test]
    async fn stale_event_approvals_and_orphans_are_swept(pool: PgPool) {
        let term = seed::term(&pool, "2024-2025", d(2024, 6, 1), d(2025, 5, 31), "active").await;
        let active =
            seed::semester(&pool, term, "1st Semester", d(2024, 8, 1), d(2024, 12, 20), "active")
                .await;
        let archived =
            seed::semester(&pool, term, "Summer", d(2024, 6, 1), d(2024, 7, 31), "archived").await;
        let inactive =
            seed::semester(&pool, term, "2nd Semester", d(2025, 1, 6), d(2025, 5, 31), "inactive")
                .await;
        let org = seed::organization(&pool, "Robotics Club", Some(term)).await;

        let null_ref = seed::event_approval(&pool, None, org).await;
        seed::event_document(&pool, null_ref, Some("events/null.pdf")).await;
        let stale = seed::event_approval(&pool, Some(archived), org).await;
        seed::event_document(&pool, stale, Some("events/stale.pdf")).await;
        let future = seed::event_approval(&pool, Some(inactive), org).await;
        seed::event_document(&pool, Uuid::new_v4(), Some("events/orphan.pdf")).await;

        let files =
            MemoryFileStore::with_keys(&["events/null.pdf", "events/stale.pdf", "events/orphan.pdf"]);
        let report = enforce_event_approval_invariant(&pool, &files)
            .await
            .unwrap();

        assert_eq!(report.approvals_removed, 2);
        assert_eq!(report.documents_removed, 2);
        assert_eq!(report.approvals_reassigned, 1);
        assert_eq!(report.orphan_documents_removed, 1);
        assert!(report.errors.is_empty());
        assert!(!files.contains("events/null.pdf"));
        assert!(!files.contains("events/stale.pdf"));
        assert!(!files.contains("events/orphan.pdf"));

        // The future-semester approval followed the calendar to the active one.
        let semester: Option<Uuid> =
            sqlx::query_scalar("SELECT semester_id FROM event_approvals WHERE id = $1")
                .bind(future)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(semester, Some(active));
    }
}
