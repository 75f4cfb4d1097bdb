//! Dependent entity resetter.
//!
//! Organizations, councils and MIS coordinators are only valid relative to a
//! term. Whenever the active term changes they are reassigned (or unassigned)
//! here, their recognition is revoked, and officer identities are wiped so
//! every officer re-registers for the new term.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::lifecycle::store;
use crate::models::entity::role;

/// A placeholder that satisfies the NOT NULL + UNIQUE constraint on
/// `users.email` while being unguessable, so a retired account cannot be
/// logged into or re-claimed by guessing its address.
pub fn placeholder_email() -> String {
    format!("retired+{}@placeholder.invalid", Uuid::new_v4())
}

/// SQL fragment flipping the age flag: an entity that lives through a term
/// transition stops being `new`.
const AGE_FLIP: &str = "CASE WHEN entity_type = 'new' THEN 'old' ELSE entity_type END";

#[derive(Debug, Default, Serialize)]
pub struct DriftReport {
    pub reassigned: u64,
    pub unassigned: u64,
}

/// Runs after a term becomes active. Reassigns every dependent entity that is
/// unassigned, pinned to an archived term, or pinned to any other term, and
/// then wipes officer identity across the board: names, non-admin emails
/// (replaced with unique placeholders) and external identity links.
pub async fn on_term_activated(
    tx: &mut Transaction<'_, Postgres>,
    new_active_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let mut reassigned = 0;

    // IS DISTINCT FROM catches both NULL and any other term id; a reference
    // to an archived term can never equal the newly active id.
    let orgs = sqlx::query(&format!(
        "UPDATE organizations
         SET academic_year_id = $1, status = 'unrecognized', entity_type = {AGE_FLIP}
         WHERE academic_year_id IS DISTINCT FROM $1"
    ))
    .bind(new_active_id)
    .execute(&mut **tx)
    .await?;
    reassigned += orgs.rows_affected();

    let councils = sqlx::query(&format!(
        "UPDATE council
         SET academic_year_id = $1, status = 'unrecognized', entity_type = {AGE_FLIP}
         WHERE academic_year_id IS DISTINCT FROM $1"
    ))
    .bind(new_active_id)
    .execute(&mut **tx)
    .await?;
    reassigned += councils.rows_affected();

    let coordinators = sqlx::query(
        "UPDATE mis_coordinators
         SET academic_year_id = $1
         WHERE academic_year_id IS DISTINCT FROM $1",
    )
    .bind(new_active_id)
    .execute(&mut **tx)
    .await?;
    reassigned += coordinators.rows_affected();

    // Unconditional: officer identity never survives into a new term, even
    // for entities that were already pinned to the right id.
    clear_officer_names(tx).await?;
    retire_user_identities(tx).await?;

    info!("Term {new_active_id} activated; {reassigned} dependent entities reassigned");
    Ok(reassigned)
}

/// Runs after a term is archived. Entities pinned to the archived term move
/// to the replacement term when one is active, otherwise fall back to an
/// unassigned state with officer names cleared.
pub async fn on_term_archived(
    tx: &mut Transaction<'_, Postgres>,
    old_term_id: Uuid,
    new_active: Option<Uuid>,
) -> Result<u64, sqlx::Error> {
    let affected = match new_active {
        Some(new_id) => {
            let mut n = 0;
            let orgs = sqlx::query(&format!(
                "UPDATE organizations
                 SET academic_year_id = $1, status = 'unrecognized', entity_type = {AGE_FLIP}
                 WHERE academic_year_id = $2"
            ))
            .bind(new_id)
            .bind(old_term_id)
            .execute(&mut **tx)
            .await?;
            n += orgs.rows_affected();

            let councils = sqlx::query(&format!(
                "UPDATE council
                 SET academic_year_id = $1, status = 'unrecognized', entity_type = {AGE_FLIP}
                 WHERE academic_year_id = $2"
            ))
            .bind(new_id)
            .bind(old_term_id)
            .execute(&mut **tx)
            .await?;
            n += councils.rows_affected();

            let coordinators = sqlx::query(
                "UPDATE mis_coordinators SET academic_year_id = $1 WHERE academic_year_id = $2",
            )
            .bind(new_id)
            .bind(old_term_id)
            .execute(&mut **tx)
            .await?;
            n += coordinators.rows_affected();
            n
        }
        None => {
            let mut n = 0;
            let orgs = sqlx::query(&format!(
                "UPDATE organizations
                 SET academic_year_id = NULL, status = 'unrecognized',
                     entity_type = {AGE_FLIP},
                     adviser_name = NULL, president_name = NULL
                 WHERE academic_year_id = $1"
            ))
            .bind(old_term_id)
            .execute(&mut **tx)
            .await?;
            n += orgs.rows_affected();

            let councils = sqlx::query(&format!(
                "UPDATE council
                 SET academic_year_id = NULL, status = 'unrecognized',
                     entity_type = {AGE_FLIP},
                     adviser_name = NULL, president_name = NULL
                 WHERE academic_year_id = $1"
            ))
            .bind(old_term_id)
            .execute(&mut **tx)
            .await?;
            n += councils.rows_affected();

            let coordinators = sqlx::query(
                "UPDATE mis_coordinators
                 SET academic_year_id = NULL, coordinator_name = NULL
                 WHERE academic_year_id = $1",
            )
            .bind(old_term_id)
            .execute(&mut **tx)
            .await?;
            n += coordinators.rows_affected();
            n
        }
    };

    info!(
        "Term {old_term_id} archived; {affected} dependent entities moved to {:?}",
        new_active
    );
    Ok(affected)
}

/// Idempotent corrective pass, safe to run on every login. Recomputes the
/// active term and realigns every drifted dependent entity. Once everything
/// matches, the guarded predicates touch zero rows.
pub async fn sync_drift(pool: &PgPool) -> Result<DriftReport, AppError> {
    let mut tx = pool.begin().await?;
    let active = store::current_active_term(&mut *tx).await?;

    let report = match active {
        Some(term) => {
            let reassigned = realign_to(&mut tx, term.id).await?;
            DriftReport {
                reassigned,
                unassigned: 0,
            }
        }
        None => {
            let unassigned = unassign_all(&mut tx).await?;
            DriftReport {
                reassigned: 0,
                unassigned,
            }
        }
    };

    tx.commit().await?;
    if report.reassigned > 0 || report.unassigned > 0 {
        info!(
            "Drift sync realigned {} and unassigned {} dependent entities",
            report.reassigned, report.unassigned
        );
    }
    Ok(report)
}

/// Reassigns drifted entities to the active term. Unlike the activation
/// reset this touches only drifted rows and leaves correct ones alone.
async fn realign_to(tx: &mut Transaction<'_, Postgres>, active_id: Uuid) -> Result<u64, sqlx::Error> {
    let mut n = 0;

    let orgs = sqlx::query(&format!(
        "UPDATE organizations
         SET academic_year_id = $1, status = 'unrecognized', entity_type = {AGE_FLIP},
             adviser_name = NULL, president_name = NULL
         WHERE academic_year_id IS DISTINCT FROM $1"
    ))
    .bind(active_id)
    .execute(&mut **tx)
    .await?;
    n += orgs.rows_affected();

    let councils = sqlx::query(&format!(
        "UPDATE council
         SET academic_year_id = $1, status = 'unrecognized', entity_type = {AGE_FLIP},
             adviser_name = NULL, president_name = NULL
         WHERE academic_year_id IS DISTINCT FROM $1"
    ))
    .bind(active_id)
    .execute(&mut **tx)
    .await?;
    n += councils.rows_affected();

    let coordinators = sqlx::query(
        "UPDATE mis_coordinators
         SET academic_year_id = $1, coordinator_name = NULL
         WHERE academic_year_id IS DISTINCT FROM $1",
    )
    .bind(active_id)
    .execute(&mut **tx)
    .await?;
    n += coordinators.rows_affected();

    Ok(n)
}

/// No term is active: every entity still pinned to some term falls back to
/// the unassigned state with officer names cleared.
async fn unassign_all(tx: &mut Transaction<'_, Postgres>) -> Result<u64, sqlx::Error> {
    let mut n = 0;

    let orgs = sqlx::query(
        "UPDATE organizations
         SET academic_year_id = NULL, status = 'unrecognized',
             adviser_name = NULL, president_name = NULL
         WHERE academic_year_id IS NOT NULL",
    )
    .execute(&mut **tx)
    .await?;
    n += orgs.rows_affected();

    let councils = sqlx::query(
        "UPDATE council
         SET academic_year_id = NULL, status = 'unrecognized',
             adviser_name = NULL, president_name = NULL
         WHERE academic_year_id IS NOT NULL",
    )
    .execute(&mut **tx)
    .await?;
    n += councils.rows_affected();

    let coordinators = sqlx::query(
        "UPDATE mis_coordinators
         SET academic_year_id = NULL, coordinator_name = NULL
         WHERE academic_year_id IS NOT NULL",
    )
    .execute(&mut **tx)
    .await?;
    n += coordinators.rows_affected();

    Ok(n)
}

async fn clear_officer_names(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE organizations SET adviser_name = NULL, president_name = NULL")
        .execute(&mut **tx)
        .await?;
    sqlx::query("UPDATE council SET adviser_name = NULL, president_name = NULL")
        .execute(&mut **tx)
        .await?;
    sqlx::query("UPDATE mis_coordinators SET coordinator_name = NULL")
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Replaces every non-admin email with a unique placeholder and severs
/// external identity links for all users. Emails are rewritten row by row
/// because each placeholder must be unique.
async fn retire_user_identities(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
    let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE role <> $1")
        .bind(role::ADMIN)
        .fetch_all(&mut **tx)
        .await?;

    for id in &ids {
        sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
            .bind(placeholder_email())
            .bind(id)
            .execute(&mut **tx)
            .await?;
    }

    sqlx::query("UPDATE users SET google_id = NULL WHERE google_id IS NOT NULL")
        .execute(&mut **tx)
        .await?;

    info!("Retired {} non-admin user identities", ids.len());
    Ok(())
}
