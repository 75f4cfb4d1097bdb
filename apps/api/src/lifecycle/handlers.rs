use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::lifecycle::{engine, notify, store, trigger};
use crate::models::entity::{CouncilRow, MisCoordinatorRow, OrganizationRow};
use crate::models::notification::NotificationRow;
use crate::models::term::{AcademicSemesterRow, AcademicTermRow};
use crate::models::transient::StudentDataRow;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CurrentPeriodResponse {
    pub term: Option<AcademicTermRow>,
    pub semesters: Vec<AcademicSemesterRow>,
}

/// POST /api/v1/terms/:id/archive
/// Administrative manual archive of one term, with the full cascade.
pub async fn handle_archive_term(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<engine::TermArchiveOutcome>, AppError> {
    let outcome = engine::archive_term(&state.db, state.files.as_ref(), id).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/lifecycle/check
/// Runs the full consistency suite synchronously and returns the report.
/// Meant for operators and external schedulers that want the outcome.
pub async fn handle_run_checks(
    State(state): State<AppState>,
) -> Result<Json<trigger::FullCheckReport>, AppError> {
    let report = trigger::run_all_checks(&state).await?;
    Ok(Json(report))
}

/// GET /api/v1/lifecycle/current
/// The currently active term and its semesters, the source of truth every
/// other component scopes itself to.
pub async fn handle_current_period(
    State(state): State<AppState>,
) -> Result<Json<CurrentPeriodResponse>, AppError> {
    let term = store::current_active_term(&state.db).await?;
    let semesters = match &term {
        Some(term) => store::semesters_of_term(&state.db, term.id).await?,
        None => Vec::new(),
    };
    Ok(Json(CurrentPeriodResponse { term, semesters }))
}

/// POST /api/v1/notifications
/// Collaborator API used by the document and event approval flows. The rows
/// created here are what the cleanup passes later delete.
pub async fn handle_create_notification(
    State(state): State<AppState>,
    Json(req): Json<notify::NewNotification>,
) -> Result<Json<NotificationRow>, AppError> {
    let row = notify::create_notification(&state.db, req).await?;
    Ok(Json(row))
}

/// GET /api/v1/organizations
pub async fn handle_list_organizations(
    State(state): State<AppState>,
) -> Result<Json<Vec<OrganizationRow>>, AppError> {
    let rows = sqlx::query_as::<_, OrganizationRow>("SELECT * FROM organizations ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// GET /api/v1/council
pub async fn handle_list_councils(
    State(state): State<AppState>,
) -> Result<Json<Vec<CouncilRow>>, AppError> {
    let rows = sqlx::query_as::<_, CouncilRow>("SELECT * FROM council ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(rows))
}

/// GET /api/v1/mis-coordinators
pub async fn handle_list_coordinators(
    State(state): State<AppState>,
) -> Result<Json<Vec<MisCoordinatorRow>>, AppError> {
    let rows =
        sqlx::query_as::<_, MisCoordinatorRow>("SELECT * FROM mis_coordinators ORDER BY created_at")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(rows))
}

/// GET /api/v1/roster
/// Roster rows of the active semester. The retention enforcer guarantees
/// this is the only roster data that exists.
pub async fn handle_roster(
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentDataRow>>, AppError> {
    let active = store::active_semesters(&state.db).await?;
    let rows = match active.as_slice() {
        [only] => {
            sqlx::query_as::<_, StudentDataRow>(
                "SELECT * FROM student_data WHERE semester_id = $1 ORDER BY full_name",
            )
            .bind(only.id)
            .fetch_all(&state.db)
            .await?
        }
        _ => Vec::new(),
    };
    Ok(Json(rows))
}
