//! Shared lookups against the term/semester store. Generic over the executor
//! so the same queries run against the pool or inside a transaction.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::term::{AcademicSemesterRow, AcademicTermRow};

/// The currently active term, if any. The engine maintains at most one; if
/// drift ever produces more than one, the most recently started wins.
pub async fn current_active_term<'e, E>(exec: E) -> Result<Option<AcademicTermRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AcademicTermRow>(
        "SELECT * FROM academic_terms WHERE status = 'active' ORDER BY start_date DESC LIMIT 1",
    )
    .fetch_optional(exec)
    .await
}

pub async fn count_active_terms<'e, E>(exec: E) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM academic_terms WHERE status = 'active'")
        .fetch_one(exec)
        .await
}

pub async fn find_term<'e, E>(exec: E, id: Uuid) -> Result<Option<AcademicTermRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AcademicTermRow>("SELECT * FROM academic_terms WHERE id = $1")
        .bind(id)
        .fetch_optional(exec)
        .await
}

/// All currently active semesters. The invariant is at most one, but the
/// retention passes need to observe violations rather than assume.
pub async fn active_semesters<'e, E>(exec: E) -> Result<Vec<AcademicSemesterRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AcademicSemesterRow>(
        "SELECT * FROM academic_semesters WHERE status = 'active' ORDER BY start_date DESC",
    )
    .fetch_all(exec)
    .await
}

pub async fn semesters_of_term<'e, E>(
    exec: E,
    term_id: Uuid,
) -> Result<Vec<AcademicSemesterRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AcademicSemesterRow>(
        "SELECT * FROM academic_semesters WHERE academic_term_id = $1 ORDER BY start_date ASC",
    )
    .bind(term_id)
    .fetch_all(exec)
    .await
}

/// Resolves a semester to its owning term id.
pub async fn term_of_semester<'e, E>(
    exec: E,
    semester_id: Uuid,
) -> Result<Option<Uuid>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>("SELECT academic_term_id FROM academic_semesters WHERE id = $1")
        .bind(semester_id)
        .fetch_optional(exec)
        .await
}
