//! Lifecycle engine: the only code that moves terms and semesters between
//! states. Every transition is a status-guarded UPDATE running in its own
//! transaction, so concurrent triggers (two users logging in at once, or a
//! login racing the scheduler) resolve by affected-row count: whoever loses
//! the race updates zero rows and skips the cascade.
//!
//! Discipline: one transaction per record, true partial success across a
//! batch. A failed cascade rolls back only that record and is recorded in
//! the report's `errors`; the rest of the batch proceeds.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::lifecycle::{notify, reset, retention, store};
use crate::models::term::{
    semester_status, semester_status_for, term_status, within_range, AcademicSemesterRow,
    AcademicTermRow,
};
use crate::storage::{reclaim_files, FileStore};

/// What archiving one term touched.
#[derive(Debug, Serialize)]
pub struct TermArchiveOutcome {
    pub term_id: Uuid,
    pub school_year: String,
    /// The term dependent entities were reassigned to, if another term was
    /// active; otherwise they were unassigned.
    pub reassigned_to: Option<Uuid>,
    pub semesters_archived: u64,
    pub entities_affected: u64,
    pub documents_purged: u64,
    pub roster_rows_purged: u64,
    pub notifications_purged: u64,
    pub files_reclaimed: usize,
}

#[derive(Debug, Default, Serialize)]
pub struct ArchiveReport {
    pub outcomes: Vec<TermArchiveOutcome>,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct ActivationReport {
    pub activated: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SemesterArchiveReport {
    pub archived: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct HybridCheckReport {
    pub terms_archived: Vec<TermArchiveOutcome>,
    pub terms_activated: u64,
    pub semesters_archived: u64,
    pub semesters_activated: u64,
    pub semesters_demoted: u64,
    pub errors: Vec<String>,
}

/// Archives every active term whose end date has passed, cascading to child
/// semesters, dependent entities, transient data and notifications.
pub async fn archive_expired_terms(
    pool: &PgPool,
    files: &dyn FileStore,
    today: NaiveDate,
) -> Result<ArchiveReport, AppError> {
    let expired = sqlx::query_as::<_, AcademicTermRow>(
        "SELECT * FROM academic_terms WHERE status = 'active' AND end_date < $1",
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    let mut report = ArchiveReport::default();
    for term in expired {
        match archive_cascade(pool, files, &term).await {
            Ok(Some(outcome)) => report.outcomes.push(outcome),
            Ok(None) => {
                // A concurrent trigger archived it between the SELECT and the
                // guarded UPDATE. Nothing left to do.
            }
            Err(e) => {
                warn!("Archiving term {} failed: {e}", term.id);
                report.errors.push(format!("term {}: {e}", term.id));
            }
        }
    }
    Ok(report)
}

/// Manual administrative archive of one explicit term.
pub async fn archive_term(
    pool: &PgPool,
    files: &dyn FileStore,
    id: Uuid,
) -> Result<TermArchiveOutcome, AppError> {
    let term = store::find_term(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Term {id} not found")))?;

    if term.status == term_status::ARCHIVED {
        return Err(AppError::AlreadyArchived(id));
    }

    // None here means we lost a race with another archiver after the status
    // check above; surface it the same way as a stale request.
    archive_cascade(pool, files, &term)
        .await?
        .ok_or(AppError::AlreadyArchived(id))
}

/// The full archive cascade for one term, in one transaction. Returns None
/// when the guarded UPDATE affects zero rows (someone else already archived
/// the term), in which case nothing was changed.
async fn archive_cascade(
    pool: &PgPool,
    files: &dyn FileStore,
    term: &AcademicTermRow,
) -> Result<Option<TermArchiveOutcome>, AppError> {
    let mut tx = pool.begin().await?;

    let guard = sqlx::query(
        "UPDATE academic_terms SET status = 'archived' WHERE id = $1 AND status = 'active'",
    )
    .bind(term.id)
    .execute(&mut *tx)
    .await?;
    if guard.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    let semesters = sqlx::query(
        "UPDATE academic_semesters SET status = 'archived'
         WHERE academic_term_id = $1 AND status <> 'archived'",
    )
    .bind(term.id)
    .execute(&mut *tx)
    .await?;

    let semester_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM academic_semesters WHERE academic_term_id = $1")
            .bind(term.id)
            .fetch_all(&mut *tx)
            .await?;

    // The term just archived no longer matches 'active', so this finds the
    // replacement term if one exists.
    let new_active = store::current_active_term(&mut *tx).await?.map(|t| t.id);

    let entities_affected = reset::on_term_archived(&mut tx, term.id, new_active).await?;
    let purge = retention::purge_for_term(&mut tx, term.id).await?;

    let mut notifications_purged = notify::purge_document_notifications(&mut tx, term.id).await?;
    for semester_id in &semester_ids {
        notifications_purged += notify::purge_event_notifications(&mut tx, *semester_id).await?;
    }

    tx.commit().await?;

    // Files go only after the rows are durably gone; a rollback above must
    // never have deleted a file.
    let file_errors = reclaim_files(files, &purge.file_keys).await;
    for e in &file_errors {
        warn!("Term {} archive: {e}", term.id);
    }

    info!(
        "Archived term {} ({}); {} semesters, {} entities, {} documents",
        term.id,
        term.school_year,
        semesters.rows_affected(),
        entities_affected,
        purge.documents_purged
    );

    Ok(Some(TermArchiveOutcome {
        term_id: term.id,
        school_year: term.school_year.clone(),
        reassigned_to: new_active,
        semesters_archived: semesters.rows_affected(),
        entities_affected,
        documents_purged: purge.documents_purged,
        roster_rows_purged: purge.roster_rows_purged,
        notifications_purged,
        files_reclaimed: purge.file_keys.len(),
    }))
}

/// Activates terms whose date range contains today. At most one term may be
/// active, so the first candidate (latest start date) wins and any further
/// candidate is rejected with a recorded error instead of silently creating
/// a second active term.
pub async fn activate_due_terms(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<ActivationReport, AppError> {
    // Terms are few; fetch them all and decide in one place.
    let candidates = sqlx::query_as::<_, AcademicTermRow>(
        "SELECT * FROM academic_terms ORDER BY start_date DESC",
    )
    .fetch_all(pool)
    .await?;

    let mut report = ActivationReport::default();
    for term in candidates {
        if term.status == term_status::ACTIVE
            || !within_range(today, term.start_date, term.end_date)
        {
            continue;
        }
        match activate_one(pool, &term).await {
            Ok(true) => report.activated += 1,
            Ok(false) => report.errors.push(format!(
                "term {} ({}) not activated: another term is already active",
                term.id, term.school_year
            )),
            Err(e) => {
                warn!("Activating term {} failed: {e}", term.id);
                report.errors.push(format!("term {}: {e}", term.id));
            }
        }
    }
    Ok(report)
}

async fn activate_one(pool: &PgPool, term: &AcademicTermRow) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;

    // Single-active-term invariant, checked inside the transaction.
    if store::count_active_terms(&mut *tx).await? > 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let guard = sqlx::query(
        "UPDATE academic_terms SET status = 'active' WHERE id = $1 AND status <> 'active'",
    )
    .bind(term.id)
    .execute(&mut *tx)
    .await?;
    if guard.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    reset::on_term_activated(&mut tx, term.id).await?;
    tx.commit().await?;

    info!("Activated term {} ({})", term.id, term.school_year);
    Ok(true)
}

/// Archives active semesters whose end date has passed and purges the event
/// notifications scoped to each one.
pub async fn archive_expired_semesters(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<SemesterArchiveReport, AppError> {
    let expired: Vec<Uuid> = sqlx::query_scalar(
        "SELECT id FROM academic_semesters WHERE status = 'active' AND end_date < $1",
    )
    .bind(today)
    .fetch_all(pool)
    .await?;

    let mut report = SemesterArchiveReport::default();
    for semester_id in expired {
        let result: Result<bool, AppError> = async {
            let mut tx = pool.begin().await?;
            let guard = sqlx::query(
                "UPDATE academic_semesters SET status = 'archived'
                 WHERE id = $1 AND status = 'active'",
            )
            .bind(semester_id)
            .execute(&mut *tx)
            .await?;
            if guard.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(false);
            }
            notify::purge_event_notifications(&mut tx, semester_id).await?;
            tx.commit().await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(true) => report.archived += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("Archiving semester {semester_id} failed: {e}");
                report.errors.push(format!("semester {semester_id}: {e}"));
            }
        }
    }
    Ok(report)
}

/// Activates semesters whose date range contains today. Archived semesters
/// are terminal and never come back.
pub async fn activate_due_semesters(pool: &PgPool, today: NaiveDate) -> Result<u64, AppError> {
    let activated =
        transition_semesters(pool, today, semester_status::INACTIVE, semester_status::ACTIVE)
            .await?;
    if activated > 0 {
        info!("Activated {activated} due semesters");
    }
    Ok(activated)
}

/// Demotes semesters that are marked active but have not started yet. Keeps
/// the three-state machine consistent when dates are edited after the fact.
/// Archived semesters stay archived, including future ones archived by a
/// term cascade.
pub async fn demote_future_semesters(pool: &PgPool, today: NaiveDate) -> Result<u64, AppError> {
    let demoted =
        transition_semesters(pool, today, semester_status::ACTIVE, semester_status::INACTIVE)
            .await?;
    if demoted > 0 {
        info!("Demoted {demoted} future semesters to inactive");
    }
    Ok(demoted)
}

/// Moves semesters currently in `from` whose date-derived status is `to`.
/// The per-row UPDATE is guarded on `from`, so a concurrent run that already
/// moved a row is a harmless no-op.
async fn transition_semesters(
    pool: &PgPool,
    today: NaiveDate,
    from: &str,
    to: &str,
) -> Result<u64, AppError> {
    let candidates = sqlx::query_as::<_, AcademicSemesterRow>(
        "SELECT * FROM academic_semesters WHERE status = $1",
    )
    .bind(from)
    .fetch_all(pool)
    .await?;

    let mut moved = 0;
    for semester in candidates {
        if semester_status_for(today, semester.start_date, semester.end_date) != to {
            continue;
        }
        let res = sqlx::query(
            "UPDATE academic_semesters SET status = $1 WHERE id = $2 AND status = $3",
        )
        .bind(to)
        .bind(semester.id)
        .bind(from)
        .execute(pool)
        .await?;
        moved += res.rows_affected();
    }
    Ok(moved)
}

/// The shared entry point behind both the login hook and the scheduled task.
/// Order matters: a term must archive before its replacement activates, and
/// term activation must precede the semester decisions that depend on it.
pub async fn run_hybrid_check(
    pool: &PgPool,
    files: &dyn FileStore,
    today: NaiveDate,
) -> Result<HybridCheckReport, AppError> {
    let mut report = HybridCheckReport::default();

    let archive = archive_expired_terms(pool, files, today).await?;
    report.terms_archived = archive.outcomes;
    report.errors.extend(archive.errors);

    let activation = activate_due_terms(pool, today).await?;
    report.terms_activated = activation.activated;
    report.errors.extend(activation.errors);

    let semesters = archive_expired_semesters(pool, today).await?;
    report.semesters_archived = semesters.archived;
    report.errors.extend(semesters.errors);

    report.semesters_activated = activate_due_semesters(pool, today).await?;
    report.semesters_demoted = demote_future_semesters(pool, today).await?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::testing as seed;
    use crate::lifecycle::testing::d;
    use crate::storage::testing::MemoryFileStore;

    #[sqlx::test]
    async fn expired_term_archives_with_semesters_and_files(pool: PgPool) {
        let term = seed::term(&pool, "2023-2024", d(2023, 8, 1), d(2024, 5, 31), "active").await;
        let sem =
            seed::semester(&pool, term, "2nd Semester", d(2024, 1, 8), d(2024, 5, 31), "active")
                .await;
        let org = seed::organization(&pool, "Robotics Club", Some(term)).await;
        seed::organization_document(&pool, org, Some(term), Some("docs/constitution.pdf")).await;
        seed::roster_row(&pool, Some(sem), "2021-00001").await;
        let files = MemoryFileStore::with_keys(&["docs/constitution.pdf"]);

        let report = archive_expired_terms(&pool, &files, d(2024, 6, 15))
            .await
            .unwrap();

        assert!(report.errors.is_empty());
        assert_eq!(report.outcomes.len(), 1);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.term_id, term);
        assert_eq!(outcome.semesters_archived, 1);
        assert_eq!(outcome.documents_purged, 1);
        assert_eq!(outcome.roster_rows_purged, 1);
        assert_eq!(outcome.files_reclaimed, 1);
        assert!(!files.contains("docs/constitution.pdf"));

        let term_status: String =
            sqlx::query_scalar("SELECT status FROM academic_terms WHERE id = $1")
                .bind(term)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(term_status, term_status::ARCHIVED);

        let sem_status: String =
            sqlx::query_scalar("SELECT status FROM academic_semesters WHERE id = $1")
                .bind(sem)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(sem_status, semester_status::ARCHIVED);
    }

    #[sqlx::test]
    async fn archive_pass_is_idempotent(pool: PgPool) {
        seed::term(&pool, "2023-2024", d(2023, 8, 1), d(2024, 5, 31), "active").await;
        let files = MemoryFileStore::default();
        let today = d(2024, 6, 15);

        let first = archive_expired_terms(&pool, &files, today).await.unwrap();
        assert_eq!(first.outcomes.len(), 1);

        let second = archive_expired_terms(&pool, &files, today).await.unwrap();
        assert!(second.outcomes.is_empty());
        assert!(second.errors.is_empty());
    }

    #[sqlx::test]
    async fn archive_without_replacement_unassigns_dependents(pool: PgPool) {
        let term = seed::term(&pool, "2023-2024", d(2023, 8, 1), d(2024, 5, 31), "active").await;
        let org = seed::organization(&pool, "Chess Club", Some(term)).await;
        let files = MemoryFileStore::default();

        archive_expired_terms(&pool, &files, d(2024, 6, 15))
            .await
            .unwrap();

        let (year, status, entity_type, adviser): (Option<Uuid>, String, String, Option<String>) =
            sqlx::query_as(
                "SELECT academic_year_id, status, entity_type, adviser_name
                 FROM organizations WHERE id = $1",
            )
            .bind(org)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(year, None);
        assert_eq!(status, "unrecognized");
        assert_eq!(entity_type, "old");
        assert_eq!(adviser, None);
    }

    #[sqlx::test]
    async fn archive_with_replacement_reassigns_dependents(pool: PgPool) {
        let old = seed::term(&pool, "2023-2024", d(2023, 8, 1), d(2024, 5, 31), "active").await;
        let replacement =
            seed::term(&pool, "2024-2025", d(2024, 6, 1), d(2025, 5, 31), "active").await;
        let org = seed::organization(&pool, "Debate Society", Some(old)).await;
        let files = MemoryFileStore::default();

        let report = archive_expired_terms(&pool, &files, d(2024, 6, 15))
            .await
            .unwrap();
        assert_eq!(report.outcomes[0].reassigned_to, Some(replacement));

        let (year, entity_type): (Option<Uuid>, String) = sqlx::query_as(
            "SELECT academic_year_id, entity_type FROM organizations WHERE id = $1",
        )
        .bind(org)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(year, Some(replacement));
        assert_eq!(entity_type, "old");
    }

    #[sqlx::test]
    async fn manual_archive_rejects_missing_and_archived_terms(pool: PgPool) {
        let files = MemoryFileStore::default();

        let missing = archive_term(&pool, &files, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));

        let term = seed::term(&pool, "2022-2023", d(2022, 8, 1), d(2023, 5, 31), "archived").await;
        let stale = archive_term(&pool, &files, term).await.unwrap_err();
        assert!(matches!(stale, AppError::AlreadyArchived(_)));
    }

    #[sqlx::test]
    async fn at_most_one_term_activates(pool: PgPool) {
        let today = d(2024, 9, 1);
        seed::term(&pool, "2024-2025", d(2024, 6, 1), d(2025, 5, 31), "archived").await;
        let later =
            seed::term(&pool, "2024-2025 (late start)", d(2024, 8, 1), d(2025, 5, 31), "archived")
                .await;

        let report = activate_due_terms(&pool, today).await.unwrap();
        assert_eq!(report.activated, 1);
        assert_eq!(report.errors.len(), 1);

        // The candidate with the latest start date wins the single slot.
        let active: Uuid =
            sqlx::query_scalar("SELECT id FROM academic_terms WHERE status = 'active'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(active, later);
    }

    #[sqlx::test]
    async fn semester_transitions_follow_the_calendar(pool: PgPool) {
        async fn status_of(pool: &PgPool, id: Uuid) -> String {
            sqlx::query_scalar("SELECT status FROM academic_semesters WHERE id = $1")
                .bind(id)
                .fetch_one(pool)
                .await
                .unwrap()
        }

        let today = d(2024, 9, 1);
        let term = seed::term(&pool, "2024-2025", d(2024, 6, 1), d(2025, 5, 31), "active").await;
        let due =
            seed::semester(&pool, term, "1st Semester", d(2024, 8, 1), d(2024, 12, 20), "inactive")
                .await;
        let future =
            seed::semester(&pool, term, "2nd Semester", d(2025, 1, 6), d(2025, 5, 31), "active")
                .await;
        let expired =
            seed::semester(&pool, term, "Summer", d(2024, 6, 1), d(2024, 7, 31), "active").await;
        let terminal =
            seed::semester(&pool, term, "Cancelled", d(2024, 8, 1), d(2024, 12, 20), "archived")
                .await;

        let archive = archive_expired_semesters(&pool, today).await.unwrap();
        assert_eq!(archive.archived, 1);
        assert_eq!(activate_due_semesters(&pool, today).await.unwrap(), 1);
        assert_eq!(demote_future_semesters(&pool, today).await.unwrap(), 1);

        assert_eq!(status_of(&pool, due).await, semester_status::ACTIVE);
        assert_eq!(status_of(&pool, future).await, semester_status::INACTIVE);
        assert_eq!(status_of(&pool, expired).await, semester_status::ARCHIVED);
        // Archived is terminal even when the date range says otherwise.
        assert_eq!(status_of(&pool, terminal).await, semester_status::ARCHIVED);
    }
}
